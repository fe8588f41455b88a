pub mod bullets;
pub mod find;
pub mod investigation;

use crate::error::InvestigationError;
use crate::models::ThreadBehavior;
use crate::scope;
use crate::{Context, Error};
use chrono::{DateTime, NaiveDateTime, Utc};
use poise::serenity_prelude as serenity;

/// Renders a validation error back to the invoking user; systemic errors
/// propagate to the framework handler. Returns the success value when there
/// was one.
pub(crate) async fn reply_result<T>(
    ctx: &Context<'_>,
    result: Result<T, InvestigationError>,
) -> Result<Option<T>, Error> {
    match result {
        Ok(value) => Ok(Some(value)),
        Err(e) if e.user_facing() => {
            ctx.say(format!("❌ {e}")).await?;
            Ok(None)
        }
        Err(e) => Err(e.into()),
    }
}

/// The channel a management or find command operates on: an explicit channel
/// option if given, otherwise the invoking channel, both after thread-parent
/// substitution.
pub(crate) async fn command_scope_channel(
    ctx: &Context<'_>,
    channel: Option<&serenity::GuildChannel>,
    behavior: ThreadBehavior,
) -> serenity::ChannelId {
    match channel {
        Some(channel) => {
            let parent = channel
                .thread_metadata
                .is_some()
                .then_some(channel.parent_id)
                .flatten();
            scope::effective_scope(channel.id, parent, behavior)
        }
        None => scope::resolve_scope_channel(ctx.serenity_context(), ctx.channel_id(), behavior).await,
    }
}

/// The guild's configured thread behavior, defaulting to distinct scopes
/// when the guild has no config row yet.
pub(crate) fn thread_behavior_for(ctx: &Context<'_>, guild_id: &str) -> ThreadBehavior {
    ctx.data()
        .db
        .get_config(guild_id)
        .ok()
        .flatten()
        .map(|c| c.thread_behavior)
        .unwrap_or(ThreadBehavior::Distinct)
}

/// SQLite `datetime('now')` text as a Discord timestamp, falling back to the
/// raw text when it does not parse.
pub(crate) fn discord_timestamp(ts: &str) -> String {
    NaiveDateTime::parse_from_str(ts, "%Y-%m-%d %H:%M:%S")
        .map(|naive| DateTime::<Utc>::from_naive_utc_and_offset(naive, Utc))
        .map(|dt| format!("<t:{}:F>", dt.timestamp()))
        .unwrap_or_else(|_| ts.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_discord_timestamp_formats_sqlite_text() {
        let rendered = discord_timestamp("2026-01-02 03:04:05");
        assert!(rendered.starts_with("<t:") && rendered.ends_with(":F>"));

        // Unparseable input passes through untouched.
        assert_eq!(discord_timestamp("garbage"), "garbage");
    }
}
