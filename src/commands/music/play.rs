use super::*;
use crate::commands::music::utils::{
    announcer::{ChannelAnnouncer, Transcript},
    music_manager::MusicManager,
    resolver::ResolveError,
    sequencer::Enqueued,
};
use std::sync::Arc;
use tracing::{error, info};

/// Play a song
#[poise::command(slash_command, guild_only, category = "Music")]
pub async fn play(
    ctx: Context<'_>,
    #[description = "URL or search query"] song: String,
) -> CommandResult {
    info!("Received play command with query: {}", song);
    let guild_id = ctx.guild_id().ok_or(SessionError::NotInGuild)?;

    let user_id = ctx.author().id;
    let channel_id =
        match MusicManager::get_user_voice_channel(ctx.serenity_context(), guild_id, user_id) {
            Ok(channel_id) => channel_id,
            Err(_) => {
                ctx.send(messages::reply(messages::NOT_IN_VOICE_CHANNEL))
                    .await?;
                return Ok(());
            }
        };

    // Resolving and downloading can take a while
    ctx.defer().await?;

    let music = &ctx.data().music;
    let session = music.session(guild_id);

    if let Err(e) = session.join(channel_id).await {
        error!("Failed to join voice channel {}: {}", channel_id, e);
        ctx.send(messages::reply(messages::command_failed(&e)))
            .await?;
        return Ok(());
    }

    session
        .set_announcer(Arc::new(ChannelAnnouncer::new(
            ctx.serenity_context().http.clone(),
            ctx.channel_id(),
        )))
        .await;

    let track = match music.resolver().resolve(&song).await {
        Ok(track) => track,
        Err(ResolveError::NoResults) => {
            ctx.send(messages::reply(messages::NO_SEARCH_RESULTS))
                .await?;
            return Ok(());
        }
        Err(e) => {
            error!("Failed to resolve {:?}: {}", song, e);
            ctx.send(messages::reply(messages::command_failed(&e)))
                .await?;
            return Ok(());
        }
    };

    let transcript = Transcript::default();
    let text = match session.enqueue(track.clone(), &transcript).await {
        Ok(Enqueued::Started) => {
            let message = transcript.into_message();
            if message.is_empty() {
                // The session was stopped before playback began.
                messages::STOPPED.to_string()
            } else {
                message
            }
        }
        Ok(Enqueued::Queued { position }) => {
            info!("Queued {} at position {}", track.title, position);
            messages::added_to_queue(&track)
        }
        Err(e) => {
            error!("Failed to queue {}: {}", track.title, e);
            messages::command_failed(&e)
        }
    };
    ctx.send(messages::reply(text)).await?;

    Ok(())
}
