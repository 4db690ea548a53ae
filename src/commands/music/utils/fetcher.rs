//! Produces a local audio file for a track, falling back through a chain of
//! extraction strategies.

use chrono::Utc;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use thiserror::Error;
use tracing::{debug, error, info, warn};

use crate::commands::music::audio_sources::{AudioExtractor, ExtractionError, TrackRequest};

#[derive(Error, Debug)]
pub enum FetchError {
    #[error("{0}")]
    Exhausted(#[source] ExtractionError),

    #[error("no download strategy configured")]
    NoStrategies,

    #[error("could not prepare download directory: {0}")]
    Storage(#[from] std::io::Error),
}

/// A downloaded file ready for playback.
///
/// The file is deleted by [`LocalAudioResource::release`] unless downloads
/// are being retained.
#[derive(Debug, PartialEq, Eq)]
pub struct LocalAudioResource {
    path: PathBuf,
    strategy: &'static str,
    retain: bool,
}

impl LocalAudioResource {
    pub fn new(path: PathBuf, strategy: &'static str, retain: bool) -> Self {
        Self {
            path,
            strategy,
            retain,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Name of the strategy that produced the file.
    pub fn strategy(&self) -> &'static str {
        self.strategy
    }

    /// Deletes the file, unless downloads are retained.
    pub async fn release(self) {
        if self.retain {
            debug!("Keeping {}", self.path.display());
            return;
        }

        match tokio::fs::remove_file(&self.path).await {
            Ok(()) => debug!("Deleted {}", self.path.display()),
            Err(e) => warn!("Failed to delete {}: {}", self.path.display(), e),
        }
    }
}

pub struct Fetcher {
    strategies: Vec<Arc<dyn AudioExtractor>>,
    download_dir: PathBuf,
    retain_downloads: bool,
    sequence: AtomicU64,
}

impl Fetcher {
    /// `strategies` are tried in order; the first success wins.
    pub fn new(
        strategies: Vec<Arc<dyn AudioExtractor>>,
        download_dir: impl Into<PathBuf>,
        retain_downloads: bool,
    ) -> Self {
        Self {
            strategies,
            download_dir: download_dir.into(),
            retain_downloads,
            sequence: AtomicU64::new(0),
        }
    }

    /// A path stem no other fetch of this process will use.
    fn unique_stem(&self) -> PathBuf {
        let sequence = self.sequence.fetch_add(1, Ordering::Relaxed);
        self.download_dir
            .join(format!("{}-{}", Utc::now().timestamp_millis(), sequence))
    }

    pub async fn fetch(&self, track: &TrackRequest) -> Result<LocalAudioResource, FetchError> {
        tokio::fs::create_dir_all(&self.download_dir).await?;
        let destination = self.unique_stem();

        let mut last_error = None;
        for strategy in &self.strategies {
            match strategy
                .fetch_audio_stream(&track.reference, &destination)
                .await
            {
                Ok(path) => {
                    info!(
                        "Downloaded {} with {} to {}",
                        track.title,
                        strategy.name(),
                        path.display()
                    );
                    return Ok(LocalAudioResource::new(
                        path,
                        strategy.name(),
                        self.retain_downloads,
                    ));
                }
                Err(e) => {
                    error!(
                        "Error downloading {} with {}: {}",
                        track.title,
                        strategy.name(),
                        e
                    );
                    self.remove_partial(&destination).await;
                    last_error = Some(e);
                }
            }
        }

        Err(last_error.map_or(FetchError::NoStrategies, FetchError::Exhausted))
    }

    /// Deletes every `<stem>.*` file a failed strategy left behind.
    async fn remove_partial(&self, destination: &Path) {
        let Some(stem) = destination.file_name().and_then(|name| name.to_str()) else {
            return;
        };
        let prefix = format!("{}.", stem);

        let mut entries = match tokio::fs::read_dir(&self.download_dir).await {
            Ok(entries) => entries,
            Err(e) => {
                warn!("Failed to list {}: {}", self.download_dir.display(), e);
                return;
            }
        };

        while let Ok(Some(entry)) = entries.next_entry().await {
            let is_partial = entry
                .file_name()
                .to_str()
                .is_some_and(|name| name.starts_with(&prefix));
            if !is_partial {
                continue;
            }

            let path = entry.path();
            match tokio::fs::remove_file(&path).await {
                Ok(()) => debug!("Removed partial download {}", path.display()),
                Err(e) => warn!("Failed to delete {}: {}", path.display(), e),
            }
        }
    }
}
