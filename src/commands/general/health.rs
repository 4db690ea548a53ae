use crate::commands::music::utils::messages;
use crate::{CommandResult, Context};

/// Health command
#[poise::command(slash_command, category = "General")]
pub async fn health(ctx: Context<'_>) -> CommandResult {
    ctx.send(messages::ephemeral(messages::HEALTHY)).await?;
    Ok(())
}
