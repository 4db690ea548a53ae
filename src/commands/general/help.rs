use crate::commands::music::utils::messages;
use crate::{CommandResult, Context};

/// Help command
#[poise::command(slash_command, category = "General")]
pub async fn help(ctx: Context<'_>) -> CommandResult {
    ctx.send(messages::ephemeral(messages::HELP)).await?;
    Ok(())
}
