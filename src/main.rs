use poise::serenity_prelude as serenity;
use tracing::{error, info, warn};
use veritas::commands::{bullets, find, investigation};
use veritas::{config::Config, Data};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::fmt::init();

    // Load configuration
    let config = Config::from_env()?;
    let discord_token = config.discord_token.clone();

    let framework = poise::Framework::builder()
        .options(poise::FrameworkOptions {
            commands: vec![
                bullets::bullet(),
                investigation::investigation(),
                find::find(),
            ],
            event_handler: |ctx, event, _framework, data| {
                Box::pin(async move {
                    match event {
                        serenity::FullEvent::Message { new_message } => {
                            if new_message.author.bot || new_message.author.system {
                                return Ok(());
                            }
                            if let Err(e) =
                                veritas::discovery::handle_message(ctx, new_message, data).await
                            {
                                error!("Error handling message for discovery: {}", e);
                            }
                        }
                        serenity::FullEvent::GuildDelete { incomplete, .. } => {
                            // An outage marks guilds unavailable without the
                            // bot actually leaving; only a real removal purges.
                            if !incomplete.unavailable {
                                let gid = incomplete.id.to_string();
                                data.active_guilds.remove(incomplete.id.get());
                                if let Err(e) = data.db.purge_guild(&gid) {
                                    warn!("Failed to purge data for guild {}: {}", gid, e);
                                } else {
                                    info!("Left guild {}; purged its investigation data", gid);
                                }
                            }
                        }
                        _ => {}
                    }
                    Ok(())
                })
            },
            ..Default::default()
        })
        .setup(|ctx, _ready, framework| {
            Box::pin(async move {
                info!("Bot is ready!");
                match config.dev_guild_id {
                    Some(guild_id) => {
                        poise::builtins::register_in_guild(
                            ctx,
                            &framework.options().commands,
                            serenity::GuildId::new(guild_id),
                        )
                        .await?;
                    }
                    None => {
                        poise::builtins::register_globally(ctx, &framework.options().commands)
                            .await?;
                    }
                }

                // Set bot status
                ctx.set_activity(Some(serenity::ActivityData::custom(&config.status_message)));

                let db = veritas::db::Database::new(&config.database_url)
                    .expect("Failed to open database");
                db.execute_init().expect("Failed to initialize database");

                // Seed the hot-path cache from the persisted configs.
                let active_guilds = veritas::active_guilds::ActiveGuilds::new();
                let active = db.active_guild_ids().expect("Failed to load active guilds");
                info!("Watching {} active guild(s) for triggers", active.len());
                active_guilds.seed(active);

                Ok(Data {
                    config,
                    db,
                    active_guilds,
                })
            })
        })
        .build();

    let intents = serenity::GatewayIntents::non_privileged()
        | serenity::GatewayIntents::MESSAGE_CONTENT
        | serenity::GatewayIntents::GUILD_MESSAGES;

    let mut client = serenity::ClientBuilder::new(&discord_token, intents)
        .framework(framework)
        .await
        .map_err(|e| anyhow::anyhow!("Failed to create client: {}", e))?;

    info!("Starting bot...");
    if let Err(why) = client.start().await {
        error!("Client error: {:?}", why);
    }

    Ok(())
}
