//! Where the sequencer sends its user-facing messages.

use poise::serenity_prelude as serenity;
use serenity::async_trait;
use serenity::model::id::ChannelId;
use std::sync::{Arc, Mutex};
use tracing::{info, warn};

/// Receives plain-text status messages produced while sequencing tracks.
#[async_trait]
pub trait Announcer: Send + Sync {
    async fn announce(&self, message: String);
}

/// Posts messages to the text channel a command was issued from.
pub struct ChannelAnnouncer {
    http: Arc<serenity::Http>,
    channel_id: ChannelId,
}

impl ChannelAnnouncer {
    pub fn new(http: Arc<serenity::Http>, channel_id: ChannelId) -> Self {
        Self { http, channel_id }
    }
}

#[async_trait]
impl Announcer for ChannelAnnouncer {
    async fn announce(&self, message: String) {
        if let Err(e) = self.channel_id.say(self.http.as_ref(), message).await {
            warn!("Failed to post to channel {}: {}", self.channel_id, e);
        }
    }
}

/// Only logs. Used until a session learns which channel to talk to.
#[derive(Default)]
pub struct LogAnnouncer;

#[async_trait]
impl Announcer for LogAnnouncer {
    async fn announce(&self, message: String) {
        info!("{}", message);
    }
}

/// Collects messages so a command can send them as its own reply.
#[derive(Default)]
pub struct Transcript {
    messages: Mutex<Vec<String>>,
}

impl Transcript {
    pub fn messages(&self) -> Vec<String> {
        self.messages
            .lock()
            .map(|messages| messages.clone())
            .unwrap_or_default()
    }

    /// All collected messages, one per line.
    pub fn into_message(self) -> String {
        self.messages
            .into_inner()
            .map(|messages| messages.join("\n"))
            .unwrap_or_default()
    }
}

#[async_trait]
impl Announcer for Transcript {
    async fn announce(&self, message: String) {
        if let Ok(mut messages) = self.messages.lock() {
            messages.push(message);
        }
    }
}
