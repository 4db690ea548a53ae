//! Implements the `AudioExtractor` trait against the Invidious REST API.
//! Used as the secondary strategy when `yt-dlp` fails: it selects its own
//! audio-only stream and downloads it directly over HTTP.

use futures::StreamExt;
use serde::Deserialize;
use serenity::async_trait;
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;
use tracing::{debug, info};

use super::{AudioExtractor, ExtractionError, TrackRequest, video_id, watch_url};

#[derive(Debug, Deserialize)]
struct InvidiousVideo {
    title: String,
    #[serde(rename = "lengthSeconds")]
    length_seconds: Option<u64>,
    #[serde(rename = "adaptiveFormats", default)]
    adaptive_formats: Vec<AdaptiveFormat>,
}

#[derive(Debug, Deserialize)]
struct AdaptiveFormat {
    url: String,
    #[serde(rename = "type")]
    format_type: String,
    container: Option<String>,
}

impl AdaptiveFormat {
    fn is_audio_only(&self) -> bool {
        self.format_type.starts_with("audio/")
    }

    /// File extension for the stream, from the container or the MIME type.
    fn extension(&self) -> String {
        self.container.clone().unwrap_or_else(|| {
            self.format_type
                .trim_start_matches("audio/")
                .split(';')
                .next()
                .unwrap_or("webm")
                .to_string()
        })
    }
}

/// The secondary extraction strategy, backed by an Invidious instance.
pub struct InvidiousExtractor {
    client: reqwest::Client,
    base_url: String,
}

impl InvidiousExtractor {
    pub fn new(client: reqwest::Client, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    async fn video(&self, reference: &str) -> Result<(String, InvidiousVideo), ExtractionError> {
        let id = video_id(reference)
            .ok_or_else(|| ExtractionError::Unsupported(reference.to_string()))?;

        let url = format!("{}/api/v1/videos/{}", self.base_url, id);
        debug!("Querying Invidious: {}", url);

        let video = self
            .client
            .get(&url)
            .send()
            .await?
            .error_for_status()?
            .json::<InvidiousVideo>()
            .await?;

        Ok((id, video))
    }
}

#[async_trait]
impl AudioExtractor for InvidiousExtractor {
    fn name(&self) -> &'static str {
        "invidious"
    }

    async fn resolve_metadata(&self, reference: &str) -> Result<TrackRequest, ExtractionError> {
        let (id, video) = self.video(reference).await?;

        let mut track = TrackRequest::new(watch_url(&id), video.title);
        if let Some(seconds) = video.length_seconds {
            track = track.with_duration(std::time::Duration::from_secs(seconds));
        }
        Ok(track)
    }

    async fn fetch_audio_stream(
        &self,
        reference: &str,
        destination: &Path,
    ) -> Result<PathBuf, ExtractionError> {
        let (_, video) = self.video(reference).await?;

        let format = video
            .adaptive_formats
            .iter()
            .find(|format| format.is_audio_only())
            .ok_or(ExtractionError::NoAudioStream)?;

        let path = destination.with_extension(format.extension());
        info!(
            "Downloading {} ({}) from Invidious to {}",
            video.title,
            format.format_type,
            path.display()
        );

        let response = self
            .client
            .get(&format.url)
            .send()
            .await?
            .error_for_status()?;

        let mut file = tokio::fs::File::create(&path).await?;
        let mut body = response.bytes_stream();
        while let Some(chunk) = body.next().await {
            file.write_all(&chunk?).await?;
        }
        file.flush().await?;

        Ok(path)
    }
}
