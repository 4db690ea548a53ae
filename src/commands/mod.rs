//! This module aggregates all the command modules for the bot.

/// General purpose commands (help, health).
pub mod general;
/// Commands related to music playback.
pub mod music;

use crate::{Data, Error};

/// Every command the bot registers.
pub fn all() -> Vec<poise::Command<Data, Error>> {
    vec![
        general::help::help(),
        general::health::health(),
        music::play::play(),
        music::skip::skip(),
        music::queue::queue(),
        music::stop::stop(),
    ]
}
