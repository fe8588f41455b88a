use crate::{discovery, Data, Error};
use crate::models::GuildConfig;
use poise::serenity_prelude as serenity;
use std::time::Duration;
use tracing::{info, warn};

/// Pause between consecutive role grants so a large winner set stays under
/// the platform rate limiter. A plain sequential sleep is all this volume
/// needs.
const ROLE_GRANT_PAUSE: Duration = Duration::from_secs(1);

/// The winner set: every finder whose count equals the maximum. Ties all
/// win, including the degenerate single-winner case.
pub fn best_finders(counts: &[(String, i64)]) -> (i64, Vec<String>) {
    let max_count = counts.iter().map(|(_, c)| *c).max().unwrap_or(0);
    let winners = counts
        .iter()
        .filter(|(_, c)| *c == max_count)
        .map(|(finder, _)| finder.clone())
        .collect();
    (max_count, winners)
}

/// Runs after every successful discovery. When no unfound bullet remains in
/// the guild, tallies finders, announces, disables the game exactly once,
/// and grants the reward role to each winner.
pub async fn evaluate(
    ctx: &serenity::Context,
    data: &Data,
    guild_id: serenity::GuildId,
    config: &GuildConfig,
) -> Result<(), Error> {
    let gid = guild_id.to_string();
    if data.db.any_unfound_in_guild(&gid)? {
        return Ok(());
    }

    let counts = data.db.finder_counts(&gid)?;
    let (max_count, winners) = best_finders(&counts);

    // No reveal channel to announce in means the game just goes dark.
    let channel = discovery::parse_id(config.bullet_channel_id.as_deref())
        .map(serenity::ChannelId::new);
    let reachable = match channel {
        Some(channel) => matches!(
            channel.to_channel(ctx).await,
            Ok(serenity::Channel::Guild(_))
        ),
        None => false,
    };
    let Some(channel) = channel.filter(|_| reachable) else {
        warn!(
            "Reveal channel for guild {} is unreachable at completion; disabling Truth Bullets",
            guild_id
        );
        data.db.disable_and_clear_channel(&gid)?;
        data.active_guilds.remove(guild_id.get());
        return Ok(());
    };

    let announcement = if config.show_best_finders && !winners.is_empty() {
        let mentions: Vec<String> = winners.iter().map(|w| format!("<@{w}>")).collect();
        format!(
            "🎉 Every Truth Bullet has been found! Best finder(s) with **{}** bullet(s): {}",
            max_count,
            mentions.join(", ")
        )
    } else {
        "🎉 Every Truth Bullet has been found! The investigation is over.".to_string()
    };
    if let Err(e) = channel.say(&ctx.http, announcement).await {
        warn!("Failed to announce completion in guild {}: {}", guild_id, e);
    }

    data.db.set_bullets_enabled(&gid, false)?;
    data.active_guilds.remove(guild_id.get());
    info!("All Truth Bullets found in guild {}; game disabled", guild_id);

    grant_best_finder_roles(ctx, guild_id, config, &winners).await;
    Ok(())
}

/// Sequential, paced role grants. One member failing never stops the rest.
async fn grant_best_finder_roles(
    ctx: &serenity::Context,
    guild_id: serenity::GuildId,
    config: &GuildConfig,
    winners: &[String],
) {
    let Some(role_id) =
        discovery::parse_id(config.best_finder_role.as_deref()).map(serenity::RoleId::new)
    else {
        return;
    };

    let resolvable = guild_id
        .roles(&ctx.http)
        .await
        .map(|roles| roles.contains_key(&role_id))
        .unwrap_or(false);
    if !resolvable {
        warn!(
            "Best-finder role {} no longer exists in guild {}; skipping grants",
            role_id, guild_id
        );
        return;
    }

    for (i, winner) in winners.iter().enumerate() {
        if i > 0 {
            tokio::time::sleep(ROLE_GRANT_PAUSE).await;
        }
        let Ok(user_id) = winner.parse::<u64>() else {
            continue;
        };
        if let Err(e) = ctx
            .http
            .add_member_role(
                guild_id,
                serenity::UserId::new(user_id),
                role_id,
                Some("Best Truth Bullet finder"),
            )
            .await
        {
            warn!(
                "Failed to grant best-finder role to {} in guild {}: {}",
                user_id, guild_id, e
            );
        }
    }
}
