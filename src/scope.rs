use crate::models::ThreadBehavior;
use poise::serenity_prelude as serenity;
use tracing::debug;

/// Resolves the channel a message or command should be scoped to. With
/// `ThreadBehavior::Parent`, messages inside a thread count against the
/// parent channel's Truth Bullets; otherwise the thread is its own scope.
///
/// Both the chat-scan path and the explicit command path go through here so
/// the substitution logic lives in exactly one place.
pub async fn resolve_scope_channel(
    ctx: &serenity::Context,
    channel_id: serenity::ChannelId,
    behavior: ThreadBehavior,
) -> serenity::ChannelId {
    if behavior == ThreadBehavior::Distinct {
        return channel_id;
    }

    let parent = match channel_id.to_channel(ctx).await {
        Ok(serenity::Channel::Guild(channel)) if channel.thread_metadata.is_some() => {
            channel.parent_id
        }
        Ok(_) => None,
        Err(e) => {
            // Degrade to the message's own channel rather than dropping the event.
            debug!("Could not resolve channel {} for scoping: {}", channel_id, e);
            None
        }
    };

    effective_scope(channel_id, parent, behavior)
}

/// Pure core of the substitution: given the channel and, when the channel is
/// a thread, its parent, pick the effective scope id.
pub fn effective_scope(
    channel_id: serenity::ChannelId,
    thread_parent: Option<serenity::ChannelId>,
    behavior: ThreadBehavior,
) -> serenity::ChannelId {
    match (behavior, thread_parent) {
        (ThreadBehavior::Parent, Some(parent)) => parent,
        _ => channel_id,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ::serenity::model::id::ChannelId;

    #[test]
    fn test_parent_folds_thread_into_parent() {
        let thread = ChannelId::new(2);
        let parent = ChannelId::new(1);
        assert_eq!(
            effective_scope(thread, Some(parent), ThreadBehavior::Parent),
            parent
        );
    }

    #[test]
    fn test_distinct_keeps_thread_scope() {
        let thread = ChannelId::new(2);
        let parent = ChannelId::new(1);
        assert_eq!(
            effective_scope(thread, Some(parent), ThreadBehavior::Distinct),
            thread
        );
    }

    #[test]
    fn test_non_thread_channel_unchanged() {
        let channel = ChannelId::new(3);
        assert_eq!(
            effective_scope(channel, None, ThreadBehavior::Parent),
            channel
        );
    }
}
