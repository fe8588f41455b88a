use super::{command_scope_channel, discord_timestamp, reply_result, thread_behavior_for};
use crate::models::NewBullet;
use crate::{Context, Error};
use poise::serenity_prelude as serenity;
use std::time::Duration;
use tracing::info;

/// How long the clear-all confirmation buttons stay live.
const CLEAR_CONFIRM_TIMEOUT: Duration = Duration::from_secs(60);

/// Manage this server's Truth Bullets
#[poise::command(
    slash_command,
    subcommands(
        "add",
        "edit",
        "rename",
        "remove",
        "clear",
        "list",
        "info",
        "unfind",
        "override_finder",
        "alias_add",
        "alias_remove"
    ),
    required_permissions = "MANAGE_GUILD",
    guild_only
)]
pub async fn bullet(_ctx: Context<'_>) -> Result<(), Error> {
    Ok(())
}

/// Register a new Truth Bullet
#[poise::command(slash_command)]
pub async fn add(
    ctx: Context<'_>,
    #[description = "The phrase that reveals this bullet"] trigger: String,
    #[description = "What is revealed when it is found"] description: String,
    #[description = "Channel to register it in (default: here)"] channel: Option<
        serenity::GuildChannel,
    >,
    #[description = "Optional image URL shown on reveal"] image: Option<String>,
    #[description = "Reveal only to the finder via DM"] hidden: Option<bool>,
) -> Result<(), Error> {
    let guild_id = ctx.guild_id().ok_or("Must be run in a guild")?.to_string();
    let behavior = thread_behavior_for(&ctx, &guild_id);
    let channel_id = command_scope_channel(&ctx, channel.as_ref(), behavior).await;

    let bullet = NewBullet {
        guild_id,
        channel_id: channel_id.to_string(),
        trigger: trigger.clone(),
        description,
        image,
        hidden: hidden.unwrap_or(false),
    };
    if reply_result(&ctx, ctx.data().db.create_bullet(&bullet))
        .await?
        .is_none()
    {
        return Ok(());
    }

    ctx.say(format!(
        "✅ Added Truth Bullet **{}** to <#{}>.",
        trigger, channel_id
    ))
    .await?;
    Ok(())
}

/// Edit a Truth Bullet's description, image, or visibility
#[poise::command(slash_command)]
pub async fn edit(
    ctx: Context<'_>,
    #[description = "Trigger or alias of the bullet to edit"] name: String,
    #[description = "New description"] description: Option<String>,
    #[description = "New image URL (use \"none\" to clear)"] image: Option<String>,
    #[description = "Reveal only to the finder via DM"] hidden: Option<bool>,
    #[description = "Channel the bullet lives in (default: here)"] channel: Option<
        serenity::GuildChannel,
    >,
) -> Result<(), Error> {
    if description.is_none() && image.is_none() && hidden.is_none() {
        ctx.say("❌ Please specify at least one field to change.")
            .await?;
        return Ok(());
    }

    let guild_id = ctx.guild_id().ok_or("Must be run in a guild")?.to_string();
    let behavior = thread_behavior_for(&ctx, &guild_id);
    let channel_id = command_scope_channel(&ctx, channel.as_ref(), behavior)
        .await
        .to_string();
    let db = &ctx.data().db;

    if let Some(description) = description.as_deref() {
        if reply_result(&ctx, db.set_description(&guild_id, &channel_id, &name, description))
            .await?
            .is_none()
        {
            return Ok(());
        }
    }
    if let Some(image) = image.as_deref() {
        let image = (!image.eq_ignore_ascii_case("none")).then_some(image);
        if reply_result(&ctx, db.set_image(&guild_id, &channel_id, &name, image))
            .await?
            .is_none()
        {
            return Ok(());
        }
    }
    if let Some(hidden) = hidden {
        if reply_result(&ctx, db.set_hidden(&guild_id, &channel_id, &name, hidden))
            .await?
            .is_none()
        {
            return Ok(());
        }
    }

    ctx.say(format!("✅ Updated Truth Bullet **{}**.", name))
        .await?;
    Ok(())
}

/// Rename a Truth Bullet's trigger
#[poise::command(slash_command)]
pub async fn rename(
    ctx: Context<'_>,
    #[description = "Current trigger or alias"] name: String,
    #[description = "New trigger"] new_trigger: String,
    #[description = "Channel the bullet lives in (default: here)"] channel: Option<
        serenity::GuildChannel,
    >,
) -> Result<(), Error> {
    let guild_id = ctx.guild_id().ok_or("Must be run in a guild")?.to_string();
    let behavior = thread_behavior_for(&ctx, &guild_id);
    let channel_id = command_scope_channel(&ctx, channel.as_ref(), behavior)
        .await
        .to_string();

    if reply_result(
        &ctx,
        ctx.data()
            .db
            .rename_bullet(&guild_id, &channel_id, &name, &new_trigger),
    )
    .await?
    .is_none()
    {
        return Ok(());
    }

    ctx.say(format!(
        "✅ Renamed Truth Bullet **{}** to **{}**.",
        name, new_trigger
    ))
    .await?;
    Ok(())
}

/// Delete a Truth Bullet
#[poise::command(slash_command)]
pub async fn remove(
    ctx: Context<'_>,
    #[description = "Trigger or alias of the bullet to delete"] name: String,
    #[description = "Channel the bullet lives in (default: here)"] channel: Option<
        serenity::GuildChannel,
    >,
) -> Result<(), Error> {
    let guild_id = ctx.guild_id().ok_or("Must be run in a guild")?.to_string();
    let behavior = thread_behavior_for(&ctx, &guild_id);
    let channel_id = command_scope_channel(&ctx, channel.as_ref(), behavior)
        .await
        .to_string();

    if reply_result(
        &ctx,
        ctx.data().db.delete_bullet(&guild_id, &channel_id, &name),
    )
    .await?
    .is_none()
    {
        return Ok(());
    }

    ctx.say(format!("🗑️ Deleted Truth Bullet **{}**.", name))
        .await?;
    Ok(())
}

/// Delete every Truth Bullet in this server
#[poise::command(slash_command)]
pub async fn clear(ctx: Context<'_>) -> Result<(), Error> {
    let guild_id = ctx.guild_id().ok_or("Must be run in a guild")?.to_string();

    let confirm_msg =
        "⚠️ This will delete **every** Truth Bullet in this server, found or not. This cannot be undone.";
    let reply = ctx
        .send(
            poise::CreateReply::default()
                .content(confirm_msg)
                .components(vec![serenity::CreateActionRow::Buttons(vec![
                    serenity::CreateButton::new("confirm_bullet_clear")
                        .label("Delete All")
                        .style(serenity::ButtonStyle::Danger),
                    serenity::CreateButton::new("cancel_bullet_clear")
                        .label("Cancel")
                        .style(serenity::ButtonStyle::Secondary),
                ])]),
        )
        .await?;

    let Some(interaction) = reply
        .message()
        .await?
        .await_component_interaction(ctx.serenity_context())
        .author_id(ctx.author().id)
        .timeout(CLEAR_CONFIRM_TIMEOUT)
        .await
    else {
        // Timeout: disable the buttons so a stale Delete All can't fire.
        reply
            .edit(
                ctx,
                poise::CreateReply::default()
                    .content("⌛ Confirmation timed out; nothing was deleted.")
                    .components(vec![]),
            )
            .await?;
        return Ok(());
    };

    let content = if interaction.data.custom_id == "confirm_bullet_clear" {
        let deleted = ctx.data().db.clear_guild_bullets(&guild_id)?;
        info!("Cleared {} Truth Bullets in guild {}", deleted, guild_id);
        format!("🗑️ Deleted **{}** Truth Bullet(s).", deleted)
    } else {
        "❌ Clear cancelled.".to_string()
    };
    interaction
        .create_response(
            ctx.serenity_context(),
            serenity::CreateInteractionResponse::UpdateMessage(
                serenity::CreateInteractionResponseMessage::new()
                    .content(content)
                    .components(vec![]),
            ),
        )
        .await?;
    Ok(())
}

/// List the Truth Bullets registered in a channel
#[poise::command(slash_command)]
pub async fn list(
    ctx: Context<'_>,
    #[description = "Channel to list (default: here)"] channel: Option<serenity::GuildChannel>,
) -> Result<(), Error> {
    let guild_id = ctx.guild_id().ok_or("Must be run in a guild")?.to_string();
    let behavior = thread_behavior_for(&ctx, &guild_id);
    let channel_id = command_scope_channel(&ctx, channel.as_ref(), behavior).await;

    let bullets = ctx
        .data()
        .db
        .list_bullets(&guild_id, &channel_id.to_string())?;
    if bullets.is_empty() {
        ctx.say("📭 No Truth Bullets are registered in that channel.")
            .await?;
        return Ok(());
    }

    let lines: Vec<String> = bullets
        .iter()
        .map(|b| {
            let marker = if b.found { "🟢" } else { "⚫" };
            let hidden = if b.hidden { " *(hidden)*" } else { "" };
            format!("{} **{}**{}", marker, b.trigger, hidden)
        })
        .collect();

    let embed = serenity::CreateEmbed::new()
        .title("🔍 Truth Bullets")
        .description(format!("In <#{}>:\n{}", channel_id, lines.join("\n")))
        .footer(serenity::CreateEmbedFooter::new(
            "🟢 found · ⚫ not yet found",
        ))
        .color(0x5865F2);
    ctx.send(poise::CreateReply::default().embed(embed).ephemeral(true))
        .await?;
    Ok(())
}

/// Show a Truth Bullet's full details
#[poise::command(slash_command)]
pub async fn info(
    ctx: Context<'_>,
    #[description = "Trigger or alias of the bullet"] name: String,
    #[description = "Channel the bullet lives in (default: here)"] channel: Option<
        serenity::GuildChannel,
    >,
) -> Result<(), Error> {
    let guild_id = ctx.guild_id().ok_or("Must be run in a guild")?.to_string();
    let behavior = thread_behavior_for(&ctx, &guild_id);
    let channel_id = command_scope_channel(&ctx, channel.as_ref(), behavior)
        .await
        .to_string();

    let Some(bullet) = reply_result(
        &ctx,
        ctx.data().db.get_bullet(&guild_id, &channel_id, &name),
    )
    .await?
    else {
        return Ok(());
    };

    let aliases = if bullet.aliases.is_empty() {
        "None".to_string()
    } else {
        bullet.aliases.join(", ")
    };
    let status = match (&bullet.finder, &bullet.found_at) {
        (Some(finder), Some(at)) => format!("Found by <@{}> at {}", finder, discord_timestamp(at)),
        _ => "Not yet found".to_string(),
    };

    let mut embed = serenity::CreateEmbed::new()
        .title(format!("🔍 {}", bullet.trigger))
        .description(&bullet.description)
        .field("Aliases", aliases, true)
        .field("Hidden", if bullet.hidden { "Yes" } else { "No" }, true)
        .field("Status", status, false)
        .color(0x5865F2);
    if let Some(image) = bullet.image.as_deref() {
        embed = embed.image(image);
    }

    ctx.send(poise::CreateReply::default().embed(embed).ephemeral(true))
        .await?;
    Ok(())
}

/// Reset a found Truth Bullet back to undiscovered
#[poise::command(slash_command)]
pub async fn unfind(
    ctx: Context<'_>,
    #[description = "Trigger or alias of the bullet"] name: String,
    #[description = "Channel the bullet lives in (default: here)"] channel: Option<
        serenity::GuildChannel,
    >,
) -> Result<(), Error> {
    let guild_id = ctx.guild_id().ok_or("Must be run in a guild")?.to_string();
    let behavior = thread_behavior_for(&ctx, &guild_id);
    let channel_id = command_scope_channel(&ctx, channel.as_ref(), behavior)
        .await
        .to_string();

    if reply_result(
        &ctx,
        ctx.data().db.unfind_bullet(&guild_id, &channel_id, &name),
    )
    .await?
    .is_none()
    {
        return Ok(());
    }

    ctx.say(format!(
        "✅ Truth Bullet **{}** is undiscovered again.",
        name
    ))
    .await?;
    Ok(())
}

/// Change who gets credit for a found Truth Bullet
#[poise::command(slash_command, rename = "override-finder")]
pub async fn override_finder(
    ctx: Context<'_>,
    #[description = "Trigger or alias of the bullet"] name: String,
    #[description = "Member to credit"] finder: serenity::User,
    #[description = "Channel the bullet lives in (default: here)"] channel: Option<
        serenity::GuildChannel,
    >,
) -> Result<(), Error> {
    let guild_id = ctx.guild_id().ok_or("Must be run in a guild")?.to_string();
    let behavior = thread_behavior_for(&ctx, &guild_id);
    let channel_id = command_scope_channel(&ctx, channel.as_ref(), behavior)
        .await
        .to_string();

    if reply_result(
        &ctx,
        ctx.data().db.override_finder(
            &guild_id,
            &channel_id,
            &name,
            &finder.id.to_string(),
        ),
    )
    .await?
    .is_none()
    {
        return Ok(());
    }

    ctx.say(format!(
        "✅ Truth Bullet **{}** is now credited to <@{}>.",
        name, finder.id
    ))
    .await?;
    Ok(())
}

/// Add an alias to a Truth Bullet
#[poise::command(slash_command, rename = "alias-add")]
pub async fn alias_add(
    ctx: Context<'_>,
    #[description = "Trigger or alias of the bullet"] name: String,
    #[description = "The alias to add"] alias: String,
    #[description = "Channel the bullet lives in (default: here)"] channel: Option<
        serenity::GuildChannel,
    >,
) -> Result<(), Error> {
    let guild_id = ctx.guild_id().ok_or("Must be run in a guild")?.to_string();
    let behavior = thread_behavior_for(&ctx, &guild_id);
    let channel_id = command_scope_channel(&ctx, channel.as_ref(), behavior)
        .await
        .to_string();

    if reply_result(
        &ctx,
        ctx.data().db.add_alias(&guild_id, &channel_id, &name, &alias),
    )
    .await?
    .is_none()
    {
        return Ok(());
    }

    ctx.say(format!("✅ Added alias **{}** to **{}**.", alias, name))
        .await?;
    Ok(())
}

/// Remove an alias from a Truth Bullet
#[poise::command(slash_command, rename = "alias-remove")]
pub async fn alias_remove(
    ctx: Context<'_>,
    #[description = "Trigger or alias of the bullet"] name: String,
    #[description = "The alias to remove"] alias: String,
    #[description = "Channel the bullet lives in (default: here)"] channel: Option<
        serenity::GuildChannel,
    >,
) -> Result<(), Error> {
    let guild_id = ctx.guild_id().ok_or("Must be run in a guild")?.to_string();
    let behavior = thread_behavior_for(&ctx, &guild_id);
    let channel_id = command_scope_channel(&ctx, channel.as_ref(), behavior)
        .await
        .to_string();

    if reply_result(
        &ctx,
        ctx.data()
            .db
            .remove_alias(&guild_id, &channel_id, &name, &alias),
    )
    .await?
    .is_none()
    {
        return Ok(());
    }

    ctx.say(format!("✅ Removed alias **{}** from **{}**.", alias, name))
        .await?;
    Ok(())
}
