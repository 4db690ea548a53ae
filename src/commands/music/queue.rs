use super::*;

/// View the current queue
#[poise::command(slash_command, guild_only, category = "Music")]
pub async fn queue(ctx: Context<'_>) -> CommandResult {
    let guild_id = ctx.guild_id().ok_or(SessionError::NotInGuild)?;

    let titles = match ctx.data().music.existing_session(guild_id) {
        Some(session) => session.queue_titles().await,
        None => Vec::new(),
    };

    ctx.send(messages::reply(messages::queue_listing(&titles)))
        .await?;

    Ok(())
}
