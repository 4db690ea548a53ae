//! Startup configuration read from the environment.

use std::env;
use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

/// Errors raised while loading configuration. These are fatal at startup.
#[derive(Error, Debug, PartialEq)]
pub enum ConfigError {
    #[error("Missing required environment variable {0}")]
    Missing(&'static str),

    #[error("Invalid value for {name}: {value:?}")]
    Invalid { name: &'static str, value: String },
}

#[derive(Debug, Clone)]
pub struct Config {
    pub discord_token: String,
    pub download_dir: PathBuf,
    pub keep_downloads: bool,
    pub ytdlp_path: String,
    pub invidious_url: String,
    pub youtube_url: String,
}

impl Config {
    /// Load configuration from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration through an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let discord_token = lookup("DISCORD_TOKEN")
            .filter(|token| !token.trim().is_empty())
            .ok_or(ConfigError::Missing("DISCORD_TOKEN"))?;

        let keep_downloads = match lookup("KEEP_DOWNLOADS") {
            Some(value) => parse_bool("KEEP_DOWNLOADS", &value)?,
            None => false,
        };

        Ok(Self {
            discord_token,
            download_dir: lookup("DOWNLOAD_DIR")
                .unwrap_or_else(|| "downloads".to_string())
                .into(),
            keep_downloads,
            ytdlp_path: lookup("YTDLP_PATH").unwrap_or_else(|| "yt-dlp".to_string()),
            invidious_url: lookup("INVIDIOUS_URL")
                .unwrap_or_else(|| "https://yewtu.be".to_string()),
            youtube_url: lookup("YOUTUBE_URL")
                .unwrap_or_else(|| "https://www.youtube.com".to_string()),
        })
    }

    /// Returns a summary of the configuration that is safe to log (no token).
    pub fn summary(&self) -> String {
        format!(
            "downloads: {} (keep: {}), yt-dlp: {}, invidious: {}, search: {}",
            self.download_dir.display(),
            self.keep_downloads,
            self.ytdlp_path,
            self.invidious_url,
            self.youtube_url
        )
    }
}

fn parse_bool(name: &'static str, value: &str) -> Result<bool, ConfigError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" | "" => Ok(false),
        _ => Err(ConfigError::Invalid {
            name,
            value: value.to_string(),
        }),
    }
}

/// Timing and retry constants for the playback sequencer.
#[derive(Debug, Clone, Copy)]
pub struct PlaybackSettings {
    /// How many times a resource is handed to the voice sink before giving up.
    pub play_attempts: u32,
    /// Delay between two play attempts.
    pub retry_backoff: Duration,
    /// Completion poll interval, used when the sink cannot signal track ends.
    pub poll_interval: Duration,
}

impl Default for PlaybackSettings {
    fn default() -> Self {
        Self {
            play_attempts: 3,
            retry_backoff: Duration::from_secs(1),
            poll_interval: Duration::from_secs(5),
        }
    }
}
