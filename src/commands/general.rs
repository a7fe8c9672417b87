use crate::commands::{create_success_embed, CommandResult, Context};
use rust_i18n::t;

/// Simple ping command to check if the bot is responsive
#[poise::command(slash_command, prefix_command)]
pub async fn ping(ctx: Context<'_>) -> CommandResult {
    let latency = ctx.ping().await;
    ctx.send(poise::CreateReply::default().embed(create_success_embed(
        &t!("ping_command"),
        &t!("ping_response", latency = latency.as_millis()),
    )))
    .await?;
    Ok(())
}

/// Lists all the commands available.
#[poise::command(slash_command, prefix_command)]
pub async fn help(ctx: Context<'_>) -> CommandResult {
    let lines: Vec<String> = ctx
        .framework()
        .options()
        .commands
        .iter()
        .filter(|command| !command.hide_in_help)
        .map(|command| {
            format!(
                "`{}` {}",
                command.name,
                command.description.as_deref().unwrap_or_default()
            )
        })
        .collect();

    ctx.send(
        poise::CreateReply::default()
            .embed(create_success_embed(&t!("help_title"), &lines.join("\n")))
            .ephemeral(true),
    )
    .await?;
    Ok(())
}
