use crate::models::{GuildConfig, InvestigationType, ThreadBehavior};
use crate::{Context, Error};
use poise::serenity_prelude as serenity;
use poise::ChoiceParameter as _;
use tracing::info;

/// Configure the investigation game for this server
#[poise::command(
    slash_command,
    subcommands(
        "setup",
        "enable",
        "disable",
        "mode",
        "threads",
        "show_finders",
        "status"
    ),
    required_permissions = "MANAGE_GUILD",
    guild_only
)]
pub async fn investigation(_ctx: Context<'_>) -> Result<(), Error> {
    Ok(())
}

/// Set the player role, reveal channel, and optional reward role
#[poise::command(slash_command)]
pub async fn setup(
    ctx: Context<'_>,
    #[description = "Role whose members can find Truth Bullets"] player_role: serenity::Role,
    #[description = "Channel where discoveries are broadcast"] bullet_channel: serenity::GuildChannel,
    #[description = "Role granted to the best finder(s) at the end"] best_finder_role: Option<
        serenity::Role,
    >,
) -> Result<(), Error> {
    let guild_id = ctx.guild_id().ok_or("Must be run in a guild")?;

    let mut config = ctx
        .data()
        .db
        .get_config(&guild_id.to_string())?
        .unwrap_or_else(|| GuildConfig::new(guild_id.to_string()));
    config.player_role = Some(player_role.id.to_string());
    config.bullet_channel_id = Some(bullet_channel.id.to_string());
    config.best_finder_role = best_finder_role.as_ref().map(|r| r.id.to_string());
    ctx.data().db.upsert_config(&config)?;
    sync_cache(&ctx, guild_id, &config);

    ctx.say(format!(
        "✅ Investigation configured: players need {}, discoveries go to <#{}>.",
        player_role, bullet_channel.id
    ))
    .await?;
    Ok(())
}

/// Turn Truth Bullet discovery on
#[poise::command(slash_command)]
pub async fn enable(ctx: Context<'_>) -> Result<(), Error> {
    let guild_id = ctx.guild_id().ok_or("Must be run in a guild")?;
    let Some(mut config) = ctx.data().db.get_config(&guild_id.to_string())? else {
        ctx.say("❌ Run `/investigation setup` first.").await?;
        return Ok(());
    };

    // Enabling is gated on a playable configuration.
    if config.player_role.is_none() || config.bullet_channel_id.is_none() {
        ctx.say("❌ A player role and a reveal channel must both be configured before enabling.")
            .await?;
        return Ok(());
    }

    config.bullets_enabled = true;
    ctx.data().db.upsert_config(&config)?;
    sync_cache(&ctx, guild_id, &config);
    info!("Truth Bullets enabled in guild {}", guild_id);

    ctx.say("✅ Truth Bullets are live. Happy hunting!").await?;
    Ok(())
}

/// Turn Truth Bullet discovery off
#[poise::command(slash_command)]
pub async fn disable(ctx: Context<'_>) -> Result<(), Error> {
    let guild_id = ctx.guild_id().ok_or("Must be run in a guild")?;
    let Some(mut config) = ctx.data().db.get_config(&guild_id.to_string())? else {
        ctx.say("❌ Run `/investigation setup` first.").await?;
        return Ok(());
    };

    config.bullets_enabled = false;
    ctx.data().db.upsert_config(&config)?;
    sync_cache(&ctx, guild_id, &config);
    info!("Truth Bullets disabled in guild {}", guild_id);

    ctx.say("✅ Truth Bullets are disabled.").await?;
    Ok(())
}

/// Choose between chat-scan and command-only discovery
#[poise::command(slash_command)]
pub async fn mode(
    ctx: Context<'_>,
    #[description = "How Truth Bullets are discovered"] investigation_type: InvestigationType,
) -> Result<(), Error> {
    let guild_id = ctx.guild_id().ok_or("Must be run in a guild")?;
    let Some(mut config) = ctx.data().db.get_config(&guild_id.to_string())? else {
        ctx.say("❌ Run `/investigation setup` first.").await?;
        return Ok(());
    };

    config.investigation_type = investigation_type;
    ctx.data().db.upsert_config(&config)?;
    sync_cache(&ctx, guild_id, &config);

    let note = match investigation_type {
        InvestigationType::Default => "messages are scanned for triggers",
        InvestigationType::CommandOnly => "bullets can only be found with `/find`",
    };
    ctx.say(format!("✅ Investigation mode updated: {note}."))
        .await?;
    Ok(())
}

/// Choose whether threads share their parent channel's bullets
#[poise::command(slash_command)]
pub async fn threads(
    ctx: Context<'_>,
    #[description = "How threads are scoped"] behavior: ThreadBehavior,
) -> Result<(), Error> {
    let guild_id = ctx.guild_id().ok_or("Must be run in a guild")?;
    let Some(mut config) = ctx.data().db.get_config(&guild_id.to_string())? else {
        ctx.say("❌ Run `/investigation setup` first.").await?;
        return Ok(());
    };

    config.thread_behavior = behavior;
    ctx.data().db.upsert_config(&config)?;

    let note = match behavior {
        ThreadBehavior::Distinct => "threads hold their own Truth Bullets",
        ThreadBehavior::Parent => "threads share their parent channel's Truth Bullets",
    };
    ctx.say(format!("✅ Thread behavior updated: {note}."))
        .await?;
    Ok(())
}

/// Choose whether the completion announcement names the winners
#[poise::command(slash_command, rename = "show-finders")]
pub async fn show_finders(
    ctx: Context<'_>,
    #[description = "Name the best finder(s) when the game ends"] show: bool,
) -> Result<(), Error> {
    let guild_id = ctx.guild_id().ok_or("Must be run in a guild")?;
    let Some(mut config) = ctx.data().db.get_config(&guild_id.to_string())? else {
        ctx.say("❌ Run `/investigation setup` first.").await?;
        return Ok(());
    };

    config.show_best_finders = show;
    ctx.data().db.upsert_config(&config)?;

    ctx.say(if show {
        "✅ The completion announcement will name the best finder(s)."
    } else {
        "✅ The completion announcement will stay anonymous."
    })
    .await?;
    Ok(())
}

/// Show the current investigation configuration
#[poise::command(slash_command)]
pub async fn status(ctx: Context<'_>) -> Result<(), Error> {
    let guild_id = ctx.guild_id().ok_or("Must be run in a guild")?;
    let Some(config) = ctx.data().db.get_config(&guild_id.to_string())? else {
        ctx.say("📭 No investigation configured. Run `/investigation setup`.")
            .await?;
        return Ok(());
    };

    let role = |id: &Option<String>| {
        id.as_deref()
            .map(|r| format!("<@&{r}>"))
            .unwrap_or_else(|| "Not set".to_string())
    };
    let channel = config
        .bullet_channel_id
        .as_deref()
        .map(|c| format!("<#{c}>"))
        .unwrap_or_else(|| "Not set".to_string());

    let embed = serenity::CreateEmbed::new()
        .title("🔍 Investigation Status")
        .field(
            "Bullets",
            if config.bullets_enabled {
                "Enabled"
            } else {
                "Disabled"
            },
            true,
        )
        .field("Mode", config.investigation_type.name(), true)
        .field("Threads", config.thread_behavior.name(), true)
        .field("Player role", role(&config.player_role), true)
        .field("Reveal channel", channel, true)
        .field("Best finder role", role(&config.best_finder_role), true)
        .field(
            "Announce winners",
            if config.show_best_finders { "Yes" } else { "No" },
            true,
        )
        .color(0x5865F2);

    ctx.send(poise::CreateReply::default().embed(embed).ephemeral(true))
        .await?;
    Ok(())
}

/// Keep the hot-path cache consistent with what was just persisted.
fn sync_cache(ctx: &Context<'_>, guild_id: serenity::GuildId, config: &GuildConfig) {
    if config.is_active() {
        ctx.data().active_guilds.insert(guild_id.get());
    } else {
        ctx.data().active_guilds.remove(guild_id.get());
    }
}
