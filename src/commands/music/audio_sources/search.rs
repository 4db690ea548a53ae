//! Free-text search against the YouTube results page.

use regex::Regex;
use reqwest::Client;
use serenity::async_trait;
use std::sync::LazyLock;
use tracing::{debug, info};

use super::{ExtractionError, SearchProvider};

/// Matches video identifiers in watch links embedded in a results page.
static VIDEO_ID_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"watch\?v=(\S{11})").expect("video id pattern is valid")
});

/// Returns every video identifier found in a results page, in page order.
pub fn extract_video_ids(html: &str) -> Vec<String> {
    VIDEO_ID_REGEX
        .captures_iter(html)
        .filter_map(|captures| captures.get(1).map(|m| m.as_str().to_string()))
        .collect()
}

/// `SearchProvider` that scrapes `{base_url}/results?search_query=...`.
pub struct YoutubeSearch {
    client: Client,
    base_url: String,
}

impl YoutubeSearch {
    pub fn new(client: Client, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }
}

#[async_trait]
impl SearchProvider for YoutubeSearch {
    async fn first_video_id(&self, query: &str) -> Result<Option<String>, ExtractionError> {
        info!("Searching YouTube for: {}", query);

        let html = self
            .client
            .get(format!("{}/results", self.base_url))
            .query(&[("search_query", query)])
            .send()
            .await?
            .error_for_status()?
            .text()
            .await?;

        let first = extract_video_ids(&html).into_iter().next();
        debug!("First search result for {:?}: {:?}", query, first);
        Ok(first)
    }
}
