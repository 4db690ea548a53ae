use dashmap::DashMap;
use poise::serenity_prelude as serenity;
use serenity::client::Context;
use serenity::model::id::{ChannelId, GuildId};
use std::sync::Arc;
use thiserror::Error;
use tracing::info;

use crate::commands::music::audio_sources::invidious::InvidiousExtractor;
use crate::commands::music::audio_sources::search::YoutubeSearch;
use crate::commands::music::audio_sources::youtube::YtDlpExtractor;
use crate::commands::music::audio_sources::{AudioExtractor, SearchProvider};
use crate::config::{Config, PlaybackSettings};

use super::fetcher::Fetcher;
use super::resolver::Resolver;
use super::sequencer::GuildSession;
use super::voice::{VoiceBackend, VoiceError};

/// Errors that can occur during music operations
#[derive(Error, Debug)]
pub enum SessionError {
    #[error("Not in a guild")]
    NotInGuild,

    #[error("User is not in a voice channel")]
    UserNotInVoiceChannel,

    #[error("Not connected to a voice channel")]
    NotConnected,

    #[error(transparent)]
    Voice(#[from] VoiceError),
}

/// Result type for music operations
pub type MusicResult<T> = Result<T, SessionError>;

/// Owns one [`GuildSession`] per guild plus the collaborators they share.
pub struct MusicManager {
    sessions: DashMap<GuildId, Arc<GuildSession>>,
    backend: Arc<dyn VoiceBackend>,
    resolver: Resolver,
    fetcher: Arc<Fetcher>,
    settings: PlaybackSettings,
}

impl MusicManager {
    pub fn new(
        backend: Arc<dyn VoiceBackend>,
        resolver: Resolver,
        fetcher: Arc<Fetcher>,
        settings: PlaybackSettings,
    ) -> Self {
        Self {
            sessions: DashMap::new(),
            backend,
            resolver,
            fetcher,
            settings,
        }
    }

    /// Wires the production collaborators: yt-dlp first, Invidious as fallback,
    /// and the YouTube results page for free-text search.
    pub fn from_config(config: &Config, backend: Arc<dyn VoiceBackend>) -> Self {
        let client = reqwest::Client::new();

        let ytdlp: Arc<dyn AudioExtractor> =
            Arc::new(YtDlpExtractor::new(config.ytdlp_path.clone()));
        let invidious: Arc<dyn AudioExtractor> = Arc::new(InvidiousExtractor::new(
            client.clone(),
            config.invidious_url.clone(),
        ));
        let search: Arc<dyn SearchProvider> =
            Arc::new(YoutubeSearch::new(client, config.youtube_url.clone()));

        let resolver = Resolver::new(search, Arc::clone(&ytdlp));
        let fetcher = Fetcher::new(
            vec![ytdlp, invidious],
            config.download_dir.clone(),
            config.keep_downloads,
        );

        Self::new(
            backend,
            resolver,
            Arc::new(fetcher),
            PlaybackSettings::default(),
        )
    }

    /// The session for `guild_id`, created on first use.
    pub fn session(&self, guild_id: GuildId) -> Arc<GuildSession> {
        let session = self.sessions.entry(guild_id).or_insert_with(|| {
            info!("Creating playback session for guild {}", guild_id);
            GuildSession::new(
                guild_id,
                self.backend.sink(guild_id),
                Arc::clone(&self.fetcher),
                self.settings,
            )
        });
        Arc::clone(session.value())
    }

    pub fn existing_session(&self, guild_id: GuildId) -> Option<Arc<GuildSession>> {
        self.sessions
            .get(&guild_id)
            .map(|session| Arc::clone(session.value()))
    }

    pub fn resolver(&self) -> &Resolver {
        &self.resolver
    }

    /// Get the voice channel ID that the user is currently in
    pub fn get_user_voice_channel(
        ctx: &Context,
        guild_id: GuildId,
        user_id: serenity::UserId,
    ) -> MusicResult<ChannelId> {
        let guild = ctx.cache.guild(guild_id).ok_or(SessionError::NotInGuild)?;

        let voice_state = guild
            .voice_states
            .get(&user_id)
            .ok_or(SessionError::UserNotInVoiceChannel)?;

        voice_state
            .channel_id
            .ok_or(SessionError::UserNotInVoiceChannel)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::music::utils::fetcher::LocalAudioResource;
    use crate::commands::music::utils::voice::{SessionNotifier, VoiceSink};
    use ::serenity::async_trait;

    struct SilentSink;

    #[async_trait]
    impl VoiceSink for SilentSink {
        async fn connect(&self, _: ChannelId, _: SessionNotifier) -> Result<(), VoiceError> {
            Ok(())
        }

        async fn move_to(&self, _: ChannelId) -> Result<(), VoiceError> {
            Ok(())
        }

        async fn play(&self, _: &LocalAudioResource, _: SessionNotifier) -> Result<(), VoiceError> {
            Ok(())
        }

        async fn stop(&self) {}

        async fn disconnect(&self) -> Result<(), VoiceError> {
            Ok(())
        }

        async fn is_playing(&self) -> bool {
            false
        }
    }

    struct SilentBackend;

    impl VoiceBackend for SilentBackend {
        fn sink(&self, _: GuildId) -> Arc<dyn VoiceSink> {
            Arc::new(SilentSink)
        }
    }

    fn manager() -> MusicManager {
        let config = Config::from_lookup(|name| {
            (name == "DISCORD_TOKEN").then(|| "token".to_string())
        })
        .unwrap();
        MusicManager::from_config(&config, Arc::new(SilentBackend))
    }

    #[test]
    fn test_sessions_are_created_once_per_guild() {
        let manager = manager();
        let guild = GuildId::new(1);

        assert!(manager.existing_session(guild).is_none());

        let first = manager.session(guild);
        let second = manager.session(guild);
        assert!(Arc::ptr_eq(&first, &second));
        assert!(!Arc::ptr_eq(&first, &manager.session(GuildId::new(2))));
        assert!(manager.existing_session(guild).is_some());
    }

    #[tokio::test]
    async fn test_new_sessions_start_idle_and_disconnected() {
        let session = manager().session(GuildId::new(3));

        assert!(!session.is_connected().await);
        assert!(session.queue_titles().await.is_empty());
    }
}
