//! Per-guild playback state machine.
//!
//! A [`GuildSession`] owns the pending queue and decides what plays next.
//! It moves between three states:
//!
//! * `Idle`: nothing queued, nothing playing.
//! * `Advancing`: the previous track finished or failed; the next one is
//!   being fetched and handed to the player.
//! * `Playing`: a track occupies the voice output.
//!
//! Track completion arrives as [`SessionEvent`]s from the voice sink and is
//! consumed by a watcher task that only runs while the session is not idle.
//! Sinks that cannot report completion are polled instead.
//!
//! Every stop or platform disconnect bumps a generation counter. Work that
//! started under an older generation (an in-flight fetch, a pending retry,
//! a late finish event) is discarded and its files released when it
//! completes. The watcher is never aborted; it exits on its own once the
//! session is idle.

use poise::serenity_prelude as serenity;
use serenity::model::id::{ChannelId, GuildId};
use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::{Mutex, Notify, mpsc};
use tokio::time::{self, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::commands::music::audio_sources::TrackRequest;
use crate::config::PlaybackSettings;

use super::announcer::{Announcer, LogAnnouncer};
use super::fetcher::{Fetcher, LocalAudioResource};
use super::messages;
use super::music_manager::SessionError;
use super::player::Player;
use super::voice::{SessionEvent, SessionNotifier, VoiceSink};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaybackStatus {
    Idle,
    Advancing,
    Playing,
}

/// What happened to a track handed to [`GuildSession::enqueue`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Enqueued {
    /// The session was idle; playback was attempted right away.
    Started,
    /// Something is already playing; the track waits at `position` (1-based).
    Queued { position: usize },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipOutcome {
    Skipped,
    NothingPlaying,
}

/// The track currently being fetched or played.
struct Current {
    track: TrackRequest,
    /// Finish event of the accepted playback attempt.
    playback: Option<SessionEvent>,
    resource: Option<LocalAudioResource>,
}

struct SessionState {
    status: PlaybackStatus,
    queue: VecDeque<TrackRequest>,
    current: Option<Current>,
    channel: Option<ChannelId>,
    /// Set while a watcher task owns `events_rx`. Only that task clears it.
    watching: bool,
    announcer: Arc<dyn Announcer>,
}

pub struct GuildSession {
    guild_id: GuildId,
    sink: Arc<dyn VoiceSink>,
    fetcher: Arc<Fetcher>,
    player: Player,
    settings: PlaybackSettings,
    state: Mutex<SessionState>,
    /// Only changed while `state` is locked; read without it by retrying playback.
    generation: AtomicU64,
    play_ids: AtomicU64,
    wake: Notify,
    events_tx: mpsc::UnboundedSender<SessionEvent>,
    events_rx: Mutex<mpsc::UnboundedReceiver<SessionEvent>>,
}

impl GuildSession {
    pub fn new(
        guild_id: GuildId,
        sink: Arc<dyn VoiceSink>,
        fetcher: Arc<Fetcher>,
        settings: PlaybackSettings,
    ) -> Arc<Self> {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let player = Player::new(
            Arc::clone(&sink),
            settings.play_attempts,
            settings.retry_backoff,
        );

        Arc::new(Self {
            guild_id,
            sink,
            fetcher,
            player,
            settings,
            state: Mutex::new(SessionState {
                status: PlaybackStatus::Idle,
                queue: VecDeque::new(),
                current: None,
                channel: None,
                watching: false,
                announcer: Arc::new(LogAnnouncer),
            }),
            generation: AtomicU64::new(0),
            play_ids: AtomicU64::new(0),
            wake: Notify::new(),
            events_tx,
            events_rx: Mutex::new(events_rx),
        })
    }

    pub async fn status(&self) -> PlaybackStatus {
        self.state.lock().await.status
    }

    pub async fn channel(&self) -> Option<ChannelId> {
        self.state.lock().await.channel
    }

    pub async fn is_connected(&self) -> bool {
        self.channel().await.is_some()
    }

    /// Whether a completion watcher is running for this session.
    pub async fn is_watching(&self) -> bool {
        self.state.lock().await.watching
    }

    /// Titles of the pending tracks, in play order. Excludes the current track.
    pub async fn queue_titles(&self) -> Vec<String> {
        let state = self.state.lock().await;
        state.queue.iter().map(|track| track.title.clone()).collect()
    }

    pub async fn now_playing(&self) -> Option<TrackRequest> {
        let state = self.state.lock().await;
        state.current.as_ref().map(|current| current.track.clone())
    }

    /// Where messages from automatic advancement are sent.
    pub async fn set_announcer(&self, announcer: Arc<dyn Announcer>) {
        self.state.lock().await.announcer = announcer;
    }

    /// Connects to `channel_id`, or moves there if connected elsewhere.
    pub async fn join(&self, channel_id: ChannelId) -> Result<(), SessionError> {
        let mut state = self.state.lock().await;
        if state.status == PlaybackStatus::Idle {
            self.drain_stale_events(&mut state);
        }

        match state.channel {
            Some(current) if current == channel_id => {}
            Some(current) => {
                info!(
                    "Moving guild {} from channel {} to {}",
                    self.guild_id, current, channel_id
                );
                self.sink.move_to(channel_id).await?;
                state.channel = Some(channel_id);
            }
            None => {
                let on_disconnect = SessionNotifier::new(
                    self.events_tx.clone(),
                    SessionEvent::Disconnected {
                        generation: self.generation(),
                    },
                );
                self.sink.connect(channel_id, on_disconnect).await?;
                state.channel = Some(channel_id);
            }
        }

        Ok(())
    }

    /// Appends `track`. If the session was idle, plays it before returning and
    /// reports progress to `announcer`.
    pub async fn enqueue(
        self: &Arc<Self>,
        track: TrackRequest,
        announcer: &dyn Announcer,
    ) -> Result<Enqueued, SessionError> {
        let generation = {
            let mut state = self.state.lock().await;
            if state.channel.is_none() {
                return Err(SessionError::NotConnected);
            }

            info!("Queueing {} for guild {}", track.title, self.guild_id);
            state.queue.push_back(track);

            if state.status != PlaybackStatus::Idle {
                return Ok(Enqueued::Queued {
                    position: state.queue.len(),
                });
            }

            state.status = PlaybackStatus::Advancing;
            self.generation()
        };

        self.advance(generation, announcer).await;
        self.ensure_watcher().await;
        Ok(Enqueued::Started)
    }

    /// Ends the current playback, if any. The watcher then advances the queue.
    pub async fn skip(&self) -> SkipOutcome {
        if self.status().await != PlaybackStatus::Playing || !self.sink.is_playing().await {
            return SkipOutcome::NothingPlaying;
        }

        info!("Skipping current track in guild {}", self.guild_id);
        self.sink.stop().await;
        SkipOutcome::Skipped
    }

    /// Stops playback, clears the queue and disconnects.
    /// An advance still in flight notices the new generation and cleans up
    /// after itself.
    pub async fn stop(&self) -> Result<(), SessionError> {
        let resource = {
            let mut state = self.state.lock().await;
            if state.channel.is_none() {
                return Err(SessionError::NotConnected);
            }
            self.reset(&mut state)
        };

        self.wake.notify_one();
        self.sink.stop().await;
        if let Some(resource) = resource {
            resource.release().await;
        }
        self.sink.disconnect().await?;

        info!("Stopped playback for guild {}", self.guild_id);
        Ok(())
    }

    /// Fetches and plays pending tracks until one starts or the queue runs dry.
    /// A track that fails to download or play is announced and discarded.
    async fn advance(&self, generation: u64, announcer: &dyn Announcer) {
        loop {
            let track = {
                let mut state = self.state.lock().await;
                if state.status != PlaybackStatus::Advancing || self.generation() != generation {
                    return;
                }

                let Some(track) = state.queue.pop_front() else {
                    info!("No more tracks in queue for guild {}", self.guild_id);
                    state.status = PlaybackStatus::Idle;
                    state.current = None;
                    drop(state);
                    announcer.announce(messages::QUEUE_DRAINED.to_string()).await;
                    return;
                };

                state.current = Some(Current {
                    track: track.clone(),
                    playback: None,
                    resource: None,
                });
                track
            };

            info!("Advancing guild {} to {}", self.guild_id, track.title);

            let resource = match self.fetcher.fetch(&track).await {
                Ok(resource) => resource,
                Err(e) => {
                    if self.generation() != generation {
                        debug!("Session stopped while fetching {}, discarding", track.title);
                        return;
                    }
                    warn!("Discarding {} after failed download: {}", track.title, e);
                    announcer.announce(messages::download_failed(&track, &e)).await;
                    continue;
                }
            };

            if self.generation() != generation {
                debug!("Session stopped while fetching {}, discarding", track.title);
                resource.release().await;
                return;
            }

            let attempt = self
                .player
                .play(&resource, || self.notifier_for(generation))
                .await;
            let accepted = match attempt {
                Ok(accepted) => accepted,
                Err(e) => {
                    resource.release().await;
                    if self.generation() != generation {
                        debug!("Session stopped while starting {}, discarding", track.title);
                        return;
                    }
                    warn!("Discarding {} after failed playback: {}", track.title, e);
                    announcer.announce(messages::playback_failed(&track, &e)).await;
                    continue;
                }
            };

            let mut state = self.state.lock().await;
            if self.generation() != generation {
                drop(state);
                debug!("Session stopped while starting {}, discarding", track.title);
                self.sink.stop().await;
                resource.release().await;
                return;
            }

            state.status = PlaybackStatus::Playing;
            if let Some(current) = state.current.as_mut() {
                current.playback = Some(accepted.event());
                current.resource = Some(resource);
            }
            drop(state);

            announcer.announce(messages::now_playing(&track)).await;
            return;
        }
    }

    /// A fresh finish notifier for one playback attempt, or `None` once the
    /// session has moved past `generation`.
    fn notifier_for(&self, generation: u64) -> Option<SessionNotifier> {
        if self.generation() != generation {
            return None;
        }
        let play_id = self.play_ids.fetch_add(1, Ordering::Relaxed) + 1;
        Some(SessionNotifier::new(
            self.events_tx.clone(),
            SessionEvent::Finished { play_id },
        ))
    }

    /// Leaves `Playing` for `Advancing` if `event` belongs to the current playback.
    async fn finish(&self, event: SessionEvent, announcer: &dyn Announcer) {
        let (generation, resource) = {
            let mut state = self.state.lock().await;
            let is_current = state
                .current
                .as_ref()
                .is_some_and(|current| current.playback == Some(event));
            if state.status != PlaybackStatus::Playing || !is_current {
                debug!("Ignoring stale {:?}", event);
                return;
            }

            state.status = PlaybackStatus::Advancing;
            let resource = state.current.take().and_then(|current| current.resource);
            (self.generation(), resource)
        };

        if let Some(resource) = resource {
            resource.release().await;
        }

        self.advance(generation, announcer).await;
    }

    async fn handle_event(&self, event: SessionEvent, announcer: &dyn Announcer) {
        debug!("Guild {} received {:?}", self.guild_id, event);

        match event {
            SessionEvent::Finished { .. } => self.finish(event, announcer).await,
            SessionEvent::Disconnected { generation } => {
                let resource = {
                    let mut state = self.state.lock().await;
                    if self.generation() != generation || state.channel.is_none() {
                        return;
                    }
                    // The watcher handling this event exits on its next check.
                    self.reset(&mut state)
                };

                warn!("Voice connection dropped for guild {}", self.guild_id);
                self.sink.stop().await;
                if let Some(resource) = resource {
                    resource.release().await;
                }
                if let Err(e) = self.sink.disconnect().await {
                    debug!("Cleanup after disconnect in guild {}: {}", self.guild_id, e);
                }
                announcer.announce(messages::DISCONNECTED.to_string()).await;
            }
        }
    }

    /// Treats the current playback as finished if the sink stopped playing it.
    async fn poll(&self, announcer: &dyn Announcer) {
        let event = {
            let state = self.state.lock().await;
            match (&state.status, &state.current) {
                (PlaybackStatus::Playing, Some(Current { playback: Some(event), .. })) => *event,
                _ => return,
            }
        };

        if !self.sink.is_playing().await {
            self.finish(event, announcer).await;
        }
    }

    /// Starts the watcher unless it is already running or there is nothing to watch.
    async fn ensure_watcher(self: &Arc<Self>) {
        let mut state = self.state.lock().await;
        if state.status == PlaybackStatus::Idle || state.watching {
            return;
        }

        state.watching = true;
        let session = Arc::clone(self);
        tokio::spawn(async move { session.watch().await });
        info!("Started completion watcher for guild {}", self.guild_id);
    }

    async fn watch(self: Arc<Self>) {
        let mut events = self.events_rx.lock().await;
        let polling = !self.sink.reports_completion();

        let mut ticker = time::interval(self.settings.poll_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        ticker.reset();

        loop {
            let announcer = {
                let mut state = self.state.lock().await;
                if state.status == PlaybackStatus::Idle {
                    state.watching = false;
                    break;
                }
                Arc::clone(&state.announcer)
            };

            tokio::select! {
                event = events.recv() => match event {
                    Some(event) => self.handle_event(event, announcer.as_ref()).await,
                    None => {
                        self.state.lock().await.watching = false;
                        break;
                    }
                },
                _ = ticker.tick(), if polling => self.poll(announcer.as_ref()).await,
                _ = self.wake.notified() => {}
            }
        }

        info!("Completion watcher finished for guild {}", self.guild_id);
    }

    fn generation(&self) -> u64 {
        self.generation.load(Ordering::Acquire)
    }

    /// Returns to `Idle`, forgetting the queue and the connection.
    /// Hands back the file the caller still has to release.
    fn reset(&self, state: &mut SessionState) -> Option<LocalAudioResource> {
        self.generation.fetch_add(1, Ordering::AcqRel);
        state.status = PlaybackStatus::Idle;
        state.queue.clear();
        state.channel = None;
        state.current.take().and_then(|current| current.resource)
    }

    /// Applies events that arrived while nobody was watching.
    fn drain_stale_events(&self, state: &mut SessionState) {
        let Ok(mut events) = self.events_rx.try_lock() else {
            return;
        };

        while let Ok(event) = events.try_recv() {
            if event == (SessionEvent::Disconnected { generation: self.generation() })
                && state.channel.is_some()
            {
                warn!("Voice connection for guild {} dropped while idle", self.guild_id);
                state.channel = None;
                self.generation.fetch_add(1, Ordering::AcqRel);
            }
        }
    }
}
