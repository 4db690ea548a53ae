use poise::CreateReply;
use std::fmt::Display;

use crate::commands::music::audio_sources::TrackRequest;

pub const NOT_IN_VOICE_CHANNEL: &str = "You need to be in a voice channel to use this command!";
pub const NO_SEARCH_RESULTS: &str = "No search results found.";
pub const SKIPPED: &str = "Skipped the current song.";
pub const NOTHING_PLAYING: &str = "No song is currently playing.";
pub const QUEUE_EMPTY: &str = "The queue is empty.";
pub const QUEUE_DRAINED: &str = "Queue is empty. Use /play to add more songs!";
pub const STOPPED: &str = "Stopped playing and cleared the queue.";
pub const NOT_CONNECTED: &str = "The bot is not connected to a voice channel.";
pub const DISCONNECTED: &str = "Disconnected from the voice channel, the queue has been cleared.";
pub const HEALTHY: &str = "Bot is operational!";

pub const HELP: &str = "🎶 Commands:\n\
    /play: Play a song\n\
    /skip: Skip the current song\n\
    /queue: View the current queue\n\
    /stop: Clears queue, stops music and leaves the channel\n\
    /help: Help command\n\
    /health: Health command";

pub fn now_playing(track: &TrackRequest) -> String {
    format!("Now playing: {}", track.title)
}

pub fn added_to_queue(track: &TrackRequest) -> String {
    format!("Added to queue: {}", track.title)
}

pub fn download_failed(track: &TrackRequest, cause: &impl Display) -> String {
    format!("Failed to download {}: {}", track.title, cause)
}

pub fn playback_failed(track: &TrackRequest, cause: &impl Display) -> String {
    format!("Failed to play {} after multiple attempts: {}", track.title, cause)
}

pub fn command_failed(cause: &impl Display) -> String {
    format!("An error occurred: {}", cause)
}

/// Pending titles as a 1-indexed list, one per line
pub fn format_queue<S: AsRef<str>>(titles: &[S]) -> String {
    titles
        .iter()
        .enumerate()
        .map(|(index, title)| format!("{}. {}", index + 1, title.as_ref()))
        .collect::<Vec<_>>()
        .join("\n")
}

pub fn queue_listing<S: AsRef<str>>(titles: &[S]) -> String {
    if titles.is_empty() {
        QUEUE_EMPTY.to_string()
    } else {
        format!("Current queue:\n{}", format_queue(titles))
    }
}

pub fn reply(text: impl Into<String>) -> CreateReply {
    CreateReply::default().content(text).ephemeral(false)
}

pub fn ephemeral(text: impl Into<String>) -> CreateReply {
    CreateReply::default().content(text).ephemeral(true)
}
