//! The voice-output collaborator: a narrow `VoiceSink` interface plus its
//! songbird implementation.

use poise::serenity_prelude as serenity;
use serenity::async_trait;
use serenity::model::id::{ChannelId, GuildId};
use songbird::input::{File, Input};
use songbird::tracks::{PlayMode, Track, TrackHandle};
use songbird::{CoreEvent, Event, EventContext, Songbird, TrackEvent};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::{Mutex, mpsc};
use tracing::{debug, info, warn};

use super::fetcher::LocalAudioResource;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum VoiceError {
    #[error("Failed to join voice channel: {0}")]
    Join(String),

    #[error("Not connected to a voice channel")]
    NotConnected,

    #[error("Playback failed: {0}")]
    Playback(String),
}

/// Signals delivered from the voice collaborator back to a guild session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEvent {
    /// The playback started under `play_id` ended or errored.
    Finished { play_id: u64 },
    /// The platform dropped the connection made under `generation`.
    Disconnected { generation: u64 },
}

/// A pre-addressed event the sink fires when something happens.
#[derive(Debug, Clone)]
pub struct SessionNotifier {
    events: mpsc::UnboundedSender<SessionEvent>,
    event: SessionEvent,
}

impl SessionNotifier {
    pub fn new(events: mpsc::UnboundedSender<SessionEvent>, event: SessionEvent) -> Self {
        Self { events, event }
    }

    pub fn event(&self) -> SessionEvent {
        self.event
    }

    pub fn notify(&self) {
        // The receiver only goes away together with its session.
        let _ = self.events.send(self.event);
    }
}

/// One guild's audio output.
#[async_trait]
pub trait VoiceSink: Send + Sync {
    /// Joins `channel_id`; `on_disconnect` fires if the platform drops us.
    async fn connect(
        &self,
        channel_id: ChannelId,
        on_disconnect: SessionNotifier,
    ) -> Result<(), VoiceError>;

    /// Moves an existing connection to another channel.
    async fn move_to(&self, channel_id: ChannelId) -> Result<(), VoiceError>;

    /// Starts playing `resource`, replacing anything already playing.
    /// Returns once playback has started; `on_finish` fires when it ends.
    /// A rejected attempt may still fire `on_finish`.
    async fn play(
        &self,
        resource: &LocalAudioResource,
        on_finish: SessionNotifier,
    ) -> Result<(), VoiceError>;

    async fn stop(&self);

    async fn disconnect(&self) -> Result<(), VoiceError>;

    async fn is_playing(&self) -> bool;

    /// Whether `on_finish` is reliable. When false, sessions poll `is_playing`.
    fn reports_completion(&self) -> bool {
        true
    }
}

/// Hands out the sink for a guild.
pub trait VoiceBackend: Send + Sync {
    fn sink(&self, guild_id: GuildId) -> Arc<dyn VoiceSink>;
}

pub struct SongbirdBackend {
    manager: Arc<Songbird>,
}

impl SongbirdBackend {
    pub fn new(manager: Arc<Songbird>) -> Self {
        Self { manager }
    }
}

impl VoiceBackend for SongbirdBackend {
    fn sink(&self, guild_id: GuildId) -> Arc<dyn VoiceSink> {
        Arc::new(SongbirdSink {
            manager: Arc::clone(&self.manager),
            guild_id,
            current: Mutex::new(None),
        })
    }
}

/// `VoiceSink` over a songbird `Call`.
pub struct SongbirdSink {
    manager: Arc<Songbird>,
    guild_id: GuildId,
    current: Mutex<Option<TrackHandle>>,
}

#[async_trait]
impl VoiceSink for SongbirdSink {
    async fn connect(
        &self,
        channel_id: ChannelId,
        on_disconnect: SessionNotifier,
    ) -> Result<(), VoiceError> {
        let call = self
            .manager
            .join(self.guild_id, channel_id)
            .await
            .map_err(|e| VoiceError::Join(e.to_string()))?;

        let mut handler = call.lock().await;
        handler.remove_all_global_events();
        handler.add_global_event(
            Event::Core(CoreEvent::DriverDisconnect),
            DriverDisconnectNotifier {
                notifier: on_disconnect,
            },
        );

        info!("Joined voice channel {} in guild {}", channel_id, self.guild_id);
        Ok(())
    }

    async fn move_to(&self, channel_id: ChannelId) -> Result<(), VoiceError> {
        // Joining while already in a call moves the existing call.
        self.manager
            .join(self.guild_id, channel_id)
            .await
            .map_err(|e| VoiceError::Join(e.to_string()))?;

        info!("Moved to voice channel {} in guild {}", channel_id, self.guild_id);
        Ok(())
    }

    async fn play(
        &self,
        resource: &LocalAudioResource,
        on_finish: SessionNotifier,
    ) -> Result<(), VoiceError> {
        let call = self
            .manager
            .get(self.guild_id)
            .ok_or(VoiceError::NotConnected)?;

        let input: Input = File::new(resource.path().to_path_buf()).into();
        let track_handle = {
            let mut handler = call.lock().await;
            // Held paused until the end handlers are in place.
            handler.play_only(Track::from(input).pause())
        };

        let started = async {
            for event in [TrackEvent::End, TrackEvent::Error] {
                track_handle
                    .add_event(
                        Event::Track(event),
                        TrackEndNotifier {
                            notifier: on_finish.clone(),
                        },
                    )
                    .map_err(|e| VoiceError::Playback(e.to_string()))?;
            }
            track_handle
                .make_playable_async()
                .await
                .map_err(|e| VoiceError::Playback(e.to_string()))?;
            track_handle
                .play()
                .map_err(|e| VoiceError::Playback(e.to_string()))
        };

        if let Err(e) = started.await {
            let _ = track_handle.stop();
            return Err(e);
        }

        *self.current.lock().await = Some(track_handle);
        Ok(())
    }

    async fn stop(&self) {
        if let Some(call) = self.manager.get(self.guild_id) {
            call.lock().await.stop();
        }
        self.current.lock().await.take();
    }

    async fn disconnect(&self) -> Result<(), VoiceError> {
        self.current.lock().await.take();

        if self.manager.get(self.guild_id).is_none() {
            return Err(VoiceError::NotConnected);
        }

        self.manager
            .remove(self.guild_id)
            .await
            .map_err(|e| VoiceError::Join(e.to_string()))?;

        info!("Left voice channel in guild {}", self.guild_id);
        Ok(())
    }

    async fn is_playing(&self) -> bool {
        let track_handle = self.current.lock().await.clone();
        let Some(track_handle) = track_handle else {
            return false;
        };

        match track_handle.get_info().await {
            Ok(state) => matches!(state.playing, PlayMode::Play | PlayMode::Pause),
            Err(_) => false,
        }
    }
}

/// Event handler for when a track ends or errors
struct TrackEndNotifier {
    notifier: SessionNotifier,
}

#[async_trait]
impl songbird::EventHandler for TrackEndNotifier {
    async fn act(&self, ctx: &EventContext<'_>) -> Option<Event> {
        if let EventContext::Track(tracks) = ctx {
            for (state, _) in tracks.iter() {
                if let PlayMode::Errored(e) = &state.playing {
                    warn!("Track errored during playback: {:?}", e);
                }
            }
            debug!("Track ended: {:?}", self.notifier.event());
            self.notifier.notify();
        }
        None
    }
}

/// Event handler for when the voice driver loses its connection
struct DriverDisconnectNotifier {
    notifier: SessionNotifier,
}

#[async_trait]
impl songbird::EventHandler for DriverDisconnectNotifier {
    async fn act(&self, ctx: &EventContext<'_>) -> Option<Event> {
        if let EventContext::DriverDisconnect(data) = ctx {
            warn!("Voice driver disconnected: {:?}", data.reason);
            self.notifier.notify();
        }
        None
    }
}
