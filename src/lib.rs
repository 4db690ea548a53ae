//! Tunebot: a Discord bot that queues audio from YouTube and plays it into a
//! voice channel, one track at a time.

pub mod commands;
pub mod config;

use std::sync::Arc;

use commands::music::utils::music_manager::MusicManager;

pub type Error = Box<dyn std::error::Error + Send + Sync>;
pub type Context<'a> = poise::Context<'a, Data, Error>;
pub type CommandResult = Result<(), Error>;

/// User data, which is stored and accessible in all command invocations
pub struct Data {
    pub music: Arc<MusicManager>,
}
