//! Implements the `AudioExtractor` trait with the `yt-dlp` command-line tool.
//! This is the primary strategy: metadata comes from `yt-dlp -j`, downloads are
//! transcoded to Opus at a fixed bitrate.

use serenity::async_trait;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use tokio::process::Command;
use tracing::{debug, info};

use super::{AudioExtractor, ExtractionError, TrackRequest};

/// Codec every download is transcoded to.
pub const AUDIO_FORMAT: &str = "opus";
/// Target audio quality handed to the transcoder.
pub const AUDIO_QUALITY: &str = "192K";

/// The primary extraction strategy, backed by `yt-dlp`.
pub struct YtDlpExtractor {
    program: String,
}

impl YtDlpExtractor {
    /// Creates an extractor that launches `program` (usually `yt-dlp`).
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }

    /// Arguments for a metadata-only lookup.
    fn metadata_args(reference: &str) -> Vec<OsString> {
        ["-j", "--no-playlist", "--skip-download", reference]
            .into_iter()
            .map(OsString::from)
            .collect()
    }

    /// Arguments for a best-audio download transcoded to the fixed codec.
    fn download_args(reference: &str, destination: &Path) -> Vec<OsString> {
        let mut template = destination.as_os_str().to_owned();
        template.push(".%(ext)s");

        let mut args: Vec<OsString> = [
            "--no-playlist",
            "--no-progress",
            "-f",
            "bestaudio/best",
            "-x",
            "--audio-format",
            AUDIO_FORMAT,
            "--audio-quality",
            AUDIO_QUALITY,
            "-o",
        ]
        .into_iter()
        .map(OsString::from)
        .collect();
        args.push(template);
        args.push(reference.into());
        args
    }

    fn command(&self, args: Vec<OsString>) -> Command {
        let mut command = Command::new(&self.program);
        command.args(args).kill_on_drop(true);
        command
    }

    fn launch_error(&self, e: std::io::Error) -> ExtractionError {
        ExtractionError::Tool {
            tool: "yt-dlp",
            message: format!("failed to launch {}: {}", self.program, e),
        }
    }
}

#[async_trait]
impl AudioExtractor for YtDlpExtractor {
    fn name(&self) -> &'static str {
        "yt-dlp"
    }

    async fn resolve_metadata(&self, reference: &str) -> Result<TrackRequest, ExtractionError> {
        info!("Fetching metadata for {} with yt-dlp", reference);

        let output = self
            .command(Self::metadata_args(reference))
            .output()
            .await
            .map_err(|e| self.launch_error(e))?;

        TrackRequest::try_from((&output, reference))
    }

    async fn fetch_audio_stream(
        &self,
        reference: &str,
        destination: &Path,
    ) -> Result<PathBuf, ExtractionError> {
        info!("Downloading {} with yt-dlp", reference);

        let output = self
            .command(Self::download_args(reference, destination))
            .output()
            .await
            .map_err(|e| self.launch_error(e))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(ExtractionError::Tool {
                tool: "yt-dlp",
                message: stderr.trim().lines().last().unwrap_or("download failed").to_string(),
            });
        }

        let path = destination.with_extension(AUDIO_FORMAT);
        if !tokio::fs::try_exists(&path).await? {
            return Err(ExtractionError::Tool {
                tool: "yt-dlp",
                message: format!("expected output {} was not written", path.display()),
            });
        }

        debug!("yt-dlp wrote {}", path.display());
        Ok(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_metadata_args_skip_download() {
        let args = YtDlpExtractor::metadata_args("https://youtu.be/abc");
        assert_eq!(
            args,
            vec!["-j", "--no-playlist", "--skip-download", "https://youtu.be/abc"]
        );
    }

    #[test]
    fn test_download_args_use_fixed_codec_and_template() {
        let args = YtDlpExtractor::download_args("https://youtu.be/abc", Path::new("/tmp/dl/17-3"));
        let args: Vec<String> = args
            .into_iter()
            .map(|a| a.to_string_lossy().into_owned())
            .collect();

        assert!(args.windows(2).any(|w| w == ["--audio-format", "opus"]));
        assert!(args.windows(2).any(|w| w == ["--audio-quality", "192K"]));
        assert!(args.windows(2).any(|w| w == ["-o", "/tmp/dl/17-3.%(ext)s"]));
        assert_eq!(args.last().map(String::as_str), Some("https://youtu.be/abc"));
    }

    #[tokio::test]
    async fn test_missing_binary_is_a_tool_error() {
        let extractor = YtDlpExtractor::new("/nonexistent/yt-dlp-binary");
        let result = extractor.resolve_metadata("https://youtu.be/abc").await;
        assert_matches!(result, Err(ExtractionError::Tool { tool: "yt-dlp", .. }));
    }
}
