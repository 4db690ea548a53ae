//! Defines the `TrackRequest` struct, the unit the queue holds, and how it is
//! built from `yt-dlp --dump-json` output.

use std::fmt;
use std::process::Output;
use std::time::Duration;

use super::ExtractionError;

/// One user-requested song: a canonical reference plus a display title.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackRequest {
    /// Canonical URL of the source video.
    pub reference: String,
    /// Title shown to users.
    pub title: String,
    /// Length of the track, when the extractor reported one.
    pub duration: Option<Duration>,
}

impl TrackRequest {
    pub fn new(reference: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            reference: reference.into(),
            title: title.into(),
            duration: None,
        }
    }

    pub fn with_duration(mut self, duration: Duration) -> Self {
        self.duration = Some(duration);
        self
    }

    /// Parses a single `yt-dlp -j` JSON document.
    ///
    /// `fallback_reference` is used when the document carries no `webpage_url`.
    pub fn from_ytdlp_json(json: &str, fallback_reference: &str) -> Result<Self, ExtractionError> {
        let metadata: serde_json::Value = serde_json::from_str(json.trim()).map_err(|e| {
            ExtractionError::Parse(format!("Failed to parse video metadata: {}", e))
        })?;

        let title = metadata["title"]
            .as_str()
            .unwrap_or("Unknown Title")
            .to_string();

        let reference = metadata["webpage_url"]
            .as_str()
            .unwrap_or(fallback_reference)
            .to_string();

        let duration = metadata["duration"].as_f64().map(Duration::from_secs_f64);

        Ok(Self {
            reference,
            title,
            duration,
        })
    }
}

impl fmt::Display for TrackRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.title)
    }
}

/// Converts the raw output of a finished `yt-dlp -j` process.
impl TryFrom<(&Output, &str)> for TrackRequest {
    type Error = ExtractionError;

    fn try_from((output, reference): (&Output, &str)) -> Result<Self, Self::Error> {
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let message = stderr
                .lines()
                .rev()
                .find(|line| !line.trim().is_empty())
                .unwrap_or("exited unsuccessfully")
                .trim()
                .to_string();
            return Err(ExtractionError::Tool {
                tool: "yt-dlp",
                message,
            });
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        Self::from_ytdlp_json(&stdout, reference)
    }
}
