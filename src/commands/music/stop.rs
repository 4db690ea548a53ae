use super::*;
use tracing::error;

/// Clears queue, stops music and leaves the channel
#[poise::command(slash_command, guild_only, category = "Music")]
pub async fn stop(ctx: Context<'_>) -> CommandResult {
    let guild_id = ctx.guild_id().ok_or(SessionError::NotInGuild)?;

    let result = match ctx.data().music.existing_session(guild_id) {
        Some(session) => session.stop().await,
        None => Err(SessionError::NotConnected),
    };

    let text = match result {
        Ok(()) => messages::STOPPED.to_string(),
        Err(SessionError::NotConnected) => messages::NOT_CONNECTED.to_string(),
        Err(e) => {
            error!("Failed to stop playback in guild {}: {}", guild_id, e);
            messages::command_failed(&e)
        }
    };
    ctx.send(messages::reply(text)).await?;

    Ok(())
}
