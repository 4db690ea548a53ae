//! Turns user input (URL or free text) into a playable `TrackRequest`.

use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info};

use crate::commands::music::audio_sources::{
    AudioExtractor, ExtractionError, SearchProvider, TrackRequest, is_url, watch_url,
};

#[derive(Error, Debug)]
pub enum ResolveError {
    #[error("No search results found")]
    NoResults,

    #[error("Could not look up the track: {0}")]
    Extraction(#[from] ExtractionError),
}

/// Resolves input with a search provider and a metadata extractor.
/// No retries happen here; the caller decides what to do with a failure.
pub struct Resolver {
    search: Arc<dyn SearchProvider>,
    metadata: Arc<dyn AudioExtractor>,
}

impl Resolver {
    pub fn new(search: Arc<dyn SearchProvider>, metadata: Arc<dyn AudioExtractor>) -> Self {
        Self { search, metadata }
    }

    pub async fn resolve(&self, input: &str) -> Result<TrackRequest, ResolveError> {
        let input = input.trim();
        if input.is_empty() {
            return Err(ResolveError::NoResults);
        }

        let reference = if is_url(input) {
            input.to_string()
        } else {
            let id = self
                .search
                .first_video_id(input)
                .await?
                .ok_or(ResolveError::NoResults)?;
            debug!("Search {:?} resolved to video {}", input, id);
            watch_url(&id)
        };

        let track = self.metadata.resolve_metadata(&reference).await?;
        info!("Resolved {:?} to {} ({})", input, track.title, track.reference);
        Ok(track)
    }
}
