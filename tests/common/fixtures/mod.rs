//! Sample tracks, ids and settings shared by the integration tests

use fake::Fake;
use fake::faker::lorem::en::Words;
use poise::serenity_prelude as serenity;
use rstest::fixture;
use serenity::model::id::{ChannelId, GuildId};
use std::time::Duration;
use tunebot::commands::music::audio_sources::{TrackRequest, watch_url};
use tunebot::config::PlaybackSettings;

pub const SAMPLE_GUILD_ID: u64 = 123456789;
pub const SAMPLE_CHANNEL_ID: u64 = 987654321;
pub const OTHER_CHANNEL_ID: u64 = 987654322;
pub const SAMPLE_VIDEO_ID: &str = "dQw4w9WgXcQ";

#[fixture]
pub fn guild_id() -> GuildId {
    GuildId::new(SAMPLE_GUILD_ID)
}

#[fixture]
pub fn channel_id() -> ChannelId {
    ChannelId::new(SAMPLE_CHANNEL_ID)
}

/// A track with a random title.
#[fixture]
pub fn track() -> TrackRequest {
    let words: Vec<String> = Words(2..5).fake();
    named(&words.join(" "))
}

/// A track whose reference and title are both derived from `title`.
pub fn named(title: &str) -> TrackRequest {
    TrackRequest::new(watch_url(&title.replace(' ', "_")), title)
}

/// Real timings, except a back-off short enough for tests on the wall clock.
#[fixture]
pub fn settings() -> PlaybackSettings {
    PlaybackSettings {
        retry_backoff: Duration::from_millis(10),
        ..PlaybackSettings::default()
    }
}
