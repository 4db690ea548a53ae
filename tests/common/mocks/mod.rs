//! Test doubles for the music collaborators

use async_trait::async_trait;
use mockall::mock;
use poise::serenity_prelude as serenity;
use serenity::model::id::{ChannelId, GuildId};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::{AtomicU32, Ordering};
use tokio::sync::{Notify, mpsc};

use tunebot::commands::music::audio_sources::{
    AudioExtractor, ExtractionError, SearchProvider, TrackRequest,
};
use tunebot::commands::music::utils::fetcher::LocalAudioResource;
use tunebot::commands::music::utils::voice::{
    SessionNotifier, VoiceBackend, VoiceError, VoiceSink,
};

mock! {
    pub Extractor {}

    #[async_trait]
    impl AudioExtractor for Extractor {
        fn name(&self) -> &'static str;
        async fn resolve_metadata(&self, reference: &str) -> Result<TrackRequest, ExtractionError>;
        async fn fetch_audio_stream(
            &self,
            reference: &str,
            destination: &Path,
        ) -> Result<PathBuf, ExtractionError>;
    }
}

mock! {
    pub Search {}

    #[async_trait]
    impl SearchProvider for Search {
        async fn first_video_id(&self, query: &str) -> Result<Option<String>, ExtractionError>;
    }
}

pub fn tool_error(message: &str) -> ExtractionError {
    ExtractionError::Tool {
        tool: "fake",
        message: message.to_string(),
    }
}

#[derive(Default)]
struct SinkState {
    channel: Option<ChannelId>,
    playing: bool,
    on_finish: Option<SessionNotifier>,
    on_disconnect: Option<SessionNotifier>,
    connects: u32,
    disconnects: u32,
}

/// A voice sink that plays nothing.
///
/// Each accepted play is reported on the channel returned by [`FakeSink::new`]
/// as the content of the played file, which [`FakeExtractor`] fills with the
/// track reference.
pub struct FakeSink {
    state: Mutex<SinkState>,
    plays: mpsc::UnboundedSender<String>,
    failures_left: AtomicU32,
    play_calls: AtomicU32,
    reports_completion: bool,
}

impl FakeSink {
    pub fn new() -> (Arc<Self>, mpsc::UnboundedReceiver<String>) {
        Self::build(0, true)
    }

    /// Rejects the first `failures` plays.
    pub fn failing(failures: u32) -> (Arc<Self>, mpsc::UnboundedReceiver<String>) {
        Self::build(failures, true)
    }

    /// Never signals completion; sessions must poll it.
    pub fn silent() -> (Arc<Self>, mpsc::UnboundedReceiver<String>) {
        Self::build(0, false)
    }

    fn build(failures: u32, reports_completion: bool) -> (Arc<Self>, mpsc::UnboundedReceiver<String>) {
        let (plays, rx) = mpsc::unbounded_channel();
        let sink = Self {
            state: Mutex::new(SinkState::default()),
            plays,
            failures_left: AtomicU32::new(failures),
            play_calls: AtomicU32::new(0),
            reports_completion,
        };
        (Arc::new(sink), rx)
    }

    /// Rejects the next play.
    pub fn reject_next(&self) {
        self.failures_left.store(1, Ordering::SeqCst);
    }

    pub fn play_calls(&self) -> u32 {
        self.play_calls.load(Ordering::SeqCst)
    }

    pub fn channel(&self) -> Option<ChannelId> {
        self.state.lock().unwrap().channel
    }

    pub fn connects(&self) -> u32 {
        self.state.lock().unwrap().connects
    }

    pub fn disconnects(&self) -> u32 {
        self.state.lock().unwrap().disconnects
    }

    /// The current track reaches its end.
    pub fn finish_current(&self) {
        let mut state = self.state.lock().unwrap();
        state.playing = false;
        let notifier = state.on_finish.take();
        if self.reports_completion {
            if let Some(notifier) = notifier {
                notifier.notify();
            }
        }
    }

    /// The platform drops the voice connection.
    pub fn drop_connection(&self) {
        let mut state = self.state.lock().unwrap();
        state.playing = false;
        state.on_finish = None;
        if let Some(notifier) = state.on_disconnect.take() {
            notifier.notify();
        }
    }
}

#[async_trait]
impl VoiceSink for FakeSink {
    async fn connect(
        &self,
        channel_id: ChannelId,
        on_disconnect: SessionNotifier,
    ) -> Result<(), VoiceError> {
        let mut state = self.state.lock().unwrap();
        state.channel = Some(channel_id);
        state.on_disconnect = Some(on_disconnect);
        state.connects += 1;
        Ok(())
    }

    async fn move_to(&self, channel_id: ChannelId) -> Result<(), VoiceError> {
        let mut state = self.state.lock().unwrap();
        if state.channel.is_none() {
            return Err(VoiceError::NotConnected);
        }
        state.channel = Some(channel_id);
        Ok(())
    }

    async fn play(
        &self,
        resource: &LocalAudioResource,
        on_finish: SessionNotifier,
    ) -> Result<(), VoiceError> {
        self.play_calls.fetch_add(1, Ordering::SeqCst);

        let failed = self
            .failures_left
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |left| left.checked_sub(1))
            .is_ok();
        if failed {
            // A track that errors out still fires its end handlers.
            if self.reports_completion {
                on_finish.notify();
            }
            return Err(VoiceError::Playback("sink closed".to_string()));
        }

        let label = std::fs::read_to_string(resource.path())
            .unwrap_or_else(|_| resource.path().display().to_string());

        let mut state = self.state.lock().unwrap();
        state.playing = true;
        state.on_finish = Some(on_finish);
        let _ = self.plays.send(label);
        Ok(())
    }

    async fn stop(&self) {
        self.finish_current();
    }

    async fn disconnect(&self) -> Result<(), VoiceError> {
        let mut state = self.state.lock().unwrap();
        if state.channel.take().is_none() {
            return Err(VoiceError::NotConnected);
        }
        state.playing = false;
        state.on_finish = None;
        state.on_disconnect = None;
        state.disconnects += 1;
        Ok(())
    }

    async fn is_playing(&self) -> bool {
        self.state.lock().unwrap().playing
    }

    fn reports_completion(&self) -> bool {
        self.reports_completion
    }
}

/// Hands out one shared [`FakeSink`] for every guild.
pub struct FakeBackend(pub Arc<FakeSink>);

impl VoiceBackend for FakeBackend {
    fn sink(&self, _: GuildId) -> Arc<dyn VoiceSink> {
        Arc::clone(&self.0) as Arc<dyn VoiceSink>
    }
}

/// Writes the track reference into the downloaded file, or fails for
/// references registered with [`FakeExtractor::failing_for`].
#[derive(Default)]
pub struct FakeExtractor {
    failing: HashSet<String>,
    gate: Option<Gate>,
}

/// Holds a download until the test releases it.
#[derive(Clone, Default)]
pub struct Gate {
    pub entered: Arc<Notify>,
    pub release: Arc<Notify>,
}

impl FakeExtractor {
    pub fn failing_for(references: &[&str]) -> Self {
        Self {
            failing: references.iter().map(|r| r.to_string()).collect(),
            gate: None,
        }
    }

    pub fn gated(gate: Gate) -> Self {
        Self {
            failing: HashSet::new(),
            gate: Some(gate),
        }
    }
}

#[async_trait]
impl AudioExtractor for FakeExtractor {
    fn name(&self) -> &'static str {
        "fake"
    }

    async fn resolve_metadata(&self, reference: &str) -> Result<TrackRequest, ExtractionError> {
        Ok(TrackRequest::new(reference, reference))
    }

    async fn fetch_audio_stream(
        &self,
        reference: &str,
        destination: &Path,
    ) -> Result<PathBuf, ExtractionError> {
        if let Some(gate) = &self.gate {
            gate.entered.notify_one();
            gate.release.notified().await;
        }

        if self.failing.contains(reference) {
            return Err(tool_error("video unavailable"));
        }

        let path = destination.with_extension("opus");
        tokio::fs::write(&path, reference).await?;
        Ok(path)
    }
}
