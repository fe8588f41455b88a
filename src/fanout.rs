use crate::models::{GuildConfig, TruthBullet};
use crate::{discovery, Data, Error};
use poise::serenity_prelude as serenity;
use tracing::{info, warn};

const EMBED_COLOR: u32 = 0x5865F2;

/// Where a committed discovery is announced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    /// Hidden bullets go to the finder's DMs only; the reveal never touches
    /// a public channel.
    FinderOnly,
    /// Visible bullets reply at the origin and broadcast to the reveal
    /// channel.
    Public,
}

pub fn delivery_for(bullet: &TruthBullet) -> Delivery {
    if bullet.hidden {
        Delivery::FinderOnly
    } else {
        Delivery::Public
    }
}

fn dm_failure_notice(finder_id: serenity::UserId) -> String {
    format!(
        "📪 <@{}>, you found a Truth Bullet, but I couldn't DM you its contents. \
         Check your privacy settings.",
        finder_id
    )
}

/// Builds the revealed-clue embed shown wherever a discovery is announced.
pub fn reveal_embed(bullet: &TruthBullet, finder_name: &str) -> serenity::CreateEmbed {
    let mut embed = serenity::CreateEmbed::new()
        .title(format!("🔍 Truth Bullet: {}", bullet.trigger))
        .description(&bullet.description)
        .footer(serenity::CreateEmbedFooter::new(format!(
            "Found by {finder_name}"
        )))
        .color(EMBED_COLOR);
    if let Some(image) = bullet.image.as_deref() {
        embed = embed.image(image);
    }
    embed
}

/// Notification fan-out after a committed discovery. Everything here is
/// best-effort: the claim is already persisted and is never rolled back, so
/// platform failures are logged and swallowed. The one deliberate escalation
/// is an unreachable reveal channel, which disables the game.
pub async fn announce_discovery(
    ctx: &serenity::Context,
    data: &Data,
    bullet: &TruthBullet,
    finder: &serenity::User,
    origin: &serenity::Message,
    config: &GuildConfig,
) -> Result<(), Error> {
    let embed = reveal_embed(bullet, &finder.name);

    if delivery_for(bullet) == Delivery::FinderOnly {
        dm_finder(ctx, bullet, finder, origin, embed).await;
        return Ok(());
    }

    // Reply where the trigger fired.
    if let Err(e) = origin
        .channel_id
        .send_message(
            &ctx.http,
            serenity::CreateMessage::new()
                .embed(embed.clone())
                .reference_message(origin),
        )
        .await
    {
        warn!("Failed to reply with discovery reveal: {}", e);
    }

    broadcast_to_reveal_channel(ctx, data, bullet, origin, embed, config).await?;
    Ok(())
}

/// Posts the reveal to the configured broadcast channel with a jump link back
/// to the originating message. An unresolvable channel flips the game off and
/// clears the stale id; the discovery itself stays persisted.
async fn broadcast_to_reveal_channel(
    ctx: &serenity::Context,
    data: &Data,
    bullet: &TruthBullet,
    origin: &serenity::Message,
    embed: serenity::CreateEmbed,
    config: &GuildConfig,
) -> Result<(), Error> {
    let Some(channel_id) =
        discovery::parse_id(config.bullet_channel_id.as_deref()).map(serenity::ChannelId::new)
    else {
        return Ok(());
    };

    let reachable = matches!(
        channel_id.to_channel(ctx).await,
        Ok(serenity::Channel::Guild(_))
    );
    if !reachable {
        warn!(
            "Reveal channel {} in guild {} is unreachable; disabling Truth Bullets",
            channel_id, config.guild_id
        );
        data.db.disable_and_clear_channel(&config.guild_id)?;
        if let Ok(gid) = config.guild_id.parse::<u64>() {
            data.active_guilds.remove(gid);
        }
        return Ok(());
    }

    if let Err(e) = channel_id
        .send_message(
            &ctx.http,
            serenity::CreateMessage::new()
                .content(format!("Found here: {}", origin.link()))
                .embed(embed),
        )
        .await
    {
        warn!(
            "Failed to broadcast discovery of `{}` to channel {}: {}",
            bullet.trigger, channel_id, e
        );
    }
    Ok(())
}

/// Hidden bullets reveal only to their finder. A failed DM (closed DMs)
/// degrades to a short notice in the originating channel; hidden bullets
/// never hit the broadcast channel.
async fn dm_finder(
    ctx: &serenity::Context,
    bullet: &TruthBullet,
    finder: &serenity::User,
    origin: &serenity::Message,
    embed: serenity::CreateEmbed,
) {
    let dm = serenity::CreateMessage::new()
        .content(format!(
            "You found a hidden Truth Bullet! Found here: {}",
            origin.link()
        ))
        .embed(embed);

    match finder.direct_message(ctx, dm).await {
        Ok(_) => {
            info!(
                "Sent hidden Truth Bullet `{}` to {} via DM",
                bullet.trigger, finder.name
            );
        }
        Err(e) => {
            warn!("Could not DM {} a hidden Truth Bullet: {}", finder.name, e);
            if let Err(e) = origin
                .channel_id
                .say(&ctx.http, dm_failure_notice(finder.id))
                .await
            {
                warn!("Failed to post DM-failure notice: {}", e);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bullet(hidden: bool) -> TruthBullet {
        TruthBullet {
            id: 1,
            guild_id: "g".into(),
            channel_id: "c".into(),
            trigger: "Knife".into(),
            aliases: vec![],
            description: "a clue".into(),
            image: None,
            found: true,
            finder: Some("u1".into()),
            found_at: None,
            hidden,
        }
    }

    #[test]
    fn test_hidden_bullet_is_finder_only() {
        assert_eq!(delivery_for(&bullet(true)), Delivery::FinderOnly);
    }

    #[test]
    fn test_visible_bullet_goes_public() {
        assert_eq!(delivery_for(&bullet(false)), Delivery::Public);
    }

    #[test]
    fn test_dm_failure_notice_pings_the_finder() {
        let notice = dm_failure_notice(serenity::UserId::new(42));
        assert!(notice.contains("<@42>"));
        // The notice must not leak the clue itself.
        assert!(!notice.contains("Knife"));
    }
}
