use super::reply_result;
use crate::{completion, discovery, fanout, scope};
use crate::{Context, Error};
use poise::serenity_prelude as serenity;
use tracing::info;

/// Manually fire a Truth Bullet by its exact trigger or alias
#[poise::command(slash_command, guild_only)]
pub async fn find(
    ctx: Context<'_>,
    #[description = "The exact trigger or alias"] trigger: String,
    #[description = "Credit a different member (managers only)"] finder: Option<serenity::User>,
) -> Result<(), Error> {
    let guild_id = ctx.guild_id().ok_or("Must be run in a guild")?;
    let gid = guild_id.to_string();

    let Some(config) = ctx.data().db.get_config(&gid)? else {
        ctx.say("❌ Truth Bullets are not set up in this server.")
            .await?;
        return Ok(());
    };
    if !config.bullets_enabled {
        ctx.say("❌ Truth Bullets are not enabled right now.").await?;
        return Ok(());
    }
    let Some(player_role) =
        discovery::parse_id(config.player_role.as_deref()).map(serenity::RoleId::new)
    else {
        ctx.say("❌ No player role is configured, so nothing can be found.")
            .await?;
        return Ok(());
    };

    // Crediting someone else is an administrative correction.
    let credited = match finder {
        Some(user) => {
            let can_override = ctx
                .author_member()
                .await
                .and_then(|m| m.permissions)
                .is_some_and(|p| p.manage_guild());
            if !can_override {
                ctx.say("❌ Only members with Manage Server can credit someone else.")
                    .await?;
                return Ok(());
            }
            user
        }
        None => ctx.author().clone(),
    };

    // The credited member must be an eligible player.
    let is_player = guild_id
        .member(ctx, credited.id)
        .await
        .map(|m| m.roles.contains(&player_role))
        .unwrap_or(false);
    if !is_player {
        ctx.say(format!(
            "❌ <@{}> does not have the player role.",
            credited.id
        ))
        .await?;
        return Ok(());
    }

    let scope_channel = scope::resolve_scope_channel(
        ctx.serenity_context(),
        ctx.channel_id(),
        config.thread_behavior,
    )
    .await;

    let Some(bullet) = reply_result(
        &ctx,
        discovery::claim_exact(
            &ctx.data().db,
            &gid,
            &scope_channel.to_string(),
            &trigger,
            &credited.id.to_string(),
        ),
    )
    .await?
    else {
        return Ok(());
    };

    info!(
        "Truth Bullet `{}` manually fired for {} in guild {}",
        bullet.trigger, credited.name, guild_id
    );

    // Acknowledge in the invoking context; the fan-out replies to this
    // message so both paths share one reveal protocol.
    let reply = ctx
        .send(poise::CreateReply::default().content(format!(
            "🔍 **{}** has been fired!",
            bullet.trigger
        )))
        .await?;
    let origin = reply.message().await?.into_owned();

    fanout::announce_discovery(
        ctx.serenity_context(),
        ctx.data(),
        &bullet,
        &credited,
        &origin,
        &config,
    )
    .await?;
    completion::evaluate(ctx.serenity_context(), ctx.data(), guild_id, &config).await?;
    Ok(())
}
