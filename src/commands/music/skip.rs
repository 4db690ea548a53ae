use super::*;
use crate::commands::music::utils::sequencer::SkipOutcome;

/// Skip the current song
#[poise::command(slash_command, guild_only, category = "Music")]
pub async fn skip(ctx: Context<'_>) -> CommandResult {
    let guild_id = ctx.guild_id().ok_or(SessionError::NotInGuild)?;

    let outcome = match ctx.data().music.existing_session(guild_id) {
        Some(session) => session.skip().await,
        None => SkipOutcome::NothingPlaying,
    };

    let text = match outcome {
        SkipOutcome::Skipped => messages::SKIPPED,
        SkipOutcome::NothingPlaying => messages::NOTHING_PLAYING,
    };
    ctx.send(messages::reply(text)).await?;

    Ok(())
}
