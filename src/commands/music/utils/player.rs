//! Hands a local audio resource to the voice sink, retrying a bounded number
//! of times with a fixed back-off.

use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{error, info};

use super::fetcher::LocalAudioResource;
use super::voice::{SessionNotifier, VoiceError, VoiceSink};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PlayError {
    #[error("gave up after {attempts} attempts: {cause}")]
    Exhausted { attempts: u32, cause: VoiceError },

    #[error("playback is no longer wanted")]
    Abandoned,
}

pub struct Player {
    sink: Arc<dyn VoiceSink>,
    attempts: u32,
    backoff: Duration,
}

impl Player {
    pub fn new(sink: Arc<dyn VoiceSink>, attempts: u32, backoff: Duration) -> Self {
        Self {
            sink,
            attempts: attempts.max(1),
            backoff,
        }
    }

    /// Starts playback of `resource`. Returns as soon as the sink accepted it.
    ///
    /// Every attempt gets its own notifier from `on_finish`, so an error event
    /// from a rejected attempt never looks like the end of the accepted one.
    /// The accepted attempt's notifier is returned. When `on_finish` yields
    /// `None` the remaining attempts are abandoned.
    pub async fn play<F>(
        &self,
        resource: &LocalAudioResource,
        mut on_finish: F,
    ) -> Result<SessionNotifier, PlayError>
    where
        F: FnMut() -> Option<SessionNotifier>,
    {
        let mut attempt = 1;
        loop {
            let Some(notifier) = on_finish() else {
                info!("Abandoning playback of {}", resource.path().display());
                return Err(PlayError::Abandoned);
            };
            info!(
                "Attempting to play {} (Attempt {}/{})",
                resource.path().display(),
                attempt,
                self.attempts
            );

            match self.sink.play(resource, notifier.clone()).await {
                Ok(()) => {
                    info!("Successfully started playing {}", resource.path().display());
                    return Ok(notifier);
                }
                Err(cause) => {
                    error!(
                        "Error playing song (Attempt {}/{}): {}",
                        attempt, self.attempts, cause
                    );
                    if attempt >= self.attempts {
                        return Err(PlayError::Exhausted {
                            attempts: self.attempts,
                            cause,
                        });
                    }
                }
            }

            attempt += 1;
            tokio::time::sleep(self.backoff).await;
        }
    }
}
