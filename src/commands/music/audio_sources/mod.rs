//! This module defines the capability interface for extracting audio from a
//! video platform, plus its concrete implementations: `yt-dlp` as the primary
//! strategy and the Invidious API as the secondary one. It also holds the
//! free-text search used by the resolver.

/// Submodule implementing `AudioExtractor` on top of the Invidious REST API.
pub mod invidious;
/// Submodule implementing `SearchProvider` by scraping the YouTube results page.
pub mod search;
/// Submodule defining the `TrackRequest` struct shared by the whole music pipeline.
pub mod track_request;
/// Submodule implementing `AudioExtractor` with the `yt-dlp` command-line tool.
pub mod youtube;

use serenity::async_trait;
use std::path::{Path, PathBuf};
use thiserror::Error;
use url::Url;

pub use track_request::TrackRequest;

/// Errors raised by a single extraction or search collaborator.
#[derive(Error, Debug)]
pub enum ExtractionError {
    /// The external tool could not be launched or exited unsuccessfully.
    #[error("{tool} failed: {message}")]
    Tool { tool: &'static str, message: String },

    /// An HTTP request failed.
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// The collaborator answered, but with something we could not understand.
    #[error("unexpected response: {0}")]
    Parse(String),

    /// The reference does not identify a video this collaborator can handle.
    #[error("unsupported reference: {0}")]
    Unsupported(String),

    /// The collaborator offered no audio-only stream.
    #[error("no audio stream available")]
    NoAudioStream,

    /// Writing the downloaded audio to local storage failed.
    #[error("storage error: {0}")]
    Io(#[from] std::io::Error),
}

/// Narrow capability interface over a video-platform extraction backend.
#[async_trait]
pub trait AudioExtractor: Send + Sync {
    /// Short name used in logs.
    fn name(&self) -> &'static str;

    /// Looks up title and canonical reference without downloading anything.
    async fn resolve_metadata(&self, reference: &str) -> Result<TrackRequest, ExtractionError>;

    /// Downloads an audio-only stream for `reference`.
    ///
    /// `destination` is a unique path stem without extension; implementations
    /// pick the extension and return the full path of the written file.
    async fn fetch_audio_stream(
        &self,
        reference: &str,
        destination: &Path,
    ) -> Result<PathBuf, ExtractionError>;
}

/// Free-text search over the video platform.
#[async_trait]
pub trait SearchProvider: Send + Sync {
    /// Returns the identifier of the first result, or `None` when nothing matched.
    async fn first_video_id(&self, query: &str) -> Result<Option<String>, ExtractionError>;
}

/// Returns true when the input starts with a recognised URL scheme.
pub fn is_url(input: &str) -> bool {
    Url::parse(input).is_ok_and(|url| matches!(url.scheme(), "http" | "https"))
}

/// Builds the canonical watch-page URL for a video identifier.
pub fn watch_url(video_id: &str) -> String {
    format!("https://www.youtube.com/watch?v={}", video_id)
}

/// Extracts the video identifier from a YouTube watch, short or embed URL.
pub fn video_id(reference: &str) -> Option<String> {
    let url = Url::parse(reference).ok()?;
    let host = url.host_str()?.trim_start_matches("www.").trim_start_matches("m.");

    let id = match host {
        "youtu.be" => url.path_segments()?.next().map(str::to_string),
        "youtube.com" | "music.youtube.com" => {
            if url.path() == "/watch" {
                url.query_pairs()
                    .find(|(key, _)| key == "v")
                    .map(|(_, value)| value.into_owned())
            } else {
                let mut segments = url.path_segments()?;
                match segments.next() {
                    Some("shorts" | "embed" | "v" | "live") => segments.next().map(str::to_string),
                    _ => None,
                }
            }
        }
        _ => None,
    }?;

    (!id.is_empty()).then_some(id)
}
