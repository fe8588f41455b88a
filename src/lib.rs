pub mod active_guilds;
pub mod commands;
pub mod completion;
pub mod config;
pub mod db;
pub mod discovery;
pub mod error;
pub mod fanout;
pub mod matching;
pub mod models;
pub mod scope;

/// Custom data passed to all commands and event handlers
pub struct Data {
    pub config: config::Config,
    pub db: db::Database,
    pub active_guilds: active_guilds::ActiveGuilds,
}

pub type Error = Box<dyn std::error::Error + Send + Sync>;
pub type Context<'a> = poise::Context<'a, Data, Error>;
