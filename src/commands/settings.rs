use crate::commands::{create_success_embed, CommandResult, Context};
use crate::database::RequestChannel;
use crate::error::command_error;
use rust_i18n::t;

/// Longest prefix a guild may configure
pub const MAX_PREFIX_LENGTH: usize = 8;

/// Change the default prefix for message commands.
#[poise::command(
    slash_command,
    prefix_command,
    guild_only,
    required_permissions = "MANAGE_GUILD"
)]
pub async fn prefix(
    ctx: Context<'_>,
    #[description = "Set the new prefix, leave empty to show the current one."]
    new_prefix: Option<String>,
) -> CommandResult {
    let guild_id = ctx
        .guild_id()
        .ok_or_else(|| command_error(&t!("guild_only")))?
        .get();
    let store = &ctx.data().store;

    let Some(new_prefix) = new_prefix else {
        let current = match store.get_settings(guild_id).await?.prefix {
            Some(prefix) => prefix,
            None => ctx.data().settings.read().await.prefix.clone(),
        };
        ctx.say(t!("prefix_is", prefix = current)).await?;
        return Ok(());
    };

    let new_prefix = new_prefix.trim().to_string();
    if new_prefix.chars().count() > MAX_PREFIX_LENGTH {
        return Err(command_error(&t!(
            "prefix_too_long",
            max = MAX_PREFIX_LENGTH
        )));
    }

    let mut settings = store.get_settings(guild_id).await?;
    settings.prefix = Some(new_prefix.clone());
    store.update_settings(guild_id, settings).await?;

    ctx.send(poise::CreateReply::default().embed(create_success_embed(
        &t!("settings_title"),
        &t!("prefix_updated", prefix = new_prefix),
    )))
    .await?;
    Ok(())
}

/// Manage the music request channel of this server.
#[poise::command(
    slash_command,
    prefix_command,
    guild_only,
    required_permissions = "MANAGE_GUILD",
    subcommands("request_channel_set", "request_channel_clear")
)]
pub async fn request_channel(_ctx: Context<'_>) -> CommandResult {
    Ok(())
}

/// Use this channel as the music request channel.
#[poise::command(slash_command, prefix_command, guild_only, rename = "set")]
pub async fn request_channel_set(ctx: Context<'_>) -> CommandResult {
    let guild_id = ctx
        .guild_id()
        .ok_or_else(|| command_error(&t!("guild_only")))?
        .get();
    let channel_id = ctx.channel_id().get();
    let store = &ctx.data().store;

    let mut settings = store.get_settings(guild_id).await?;
    settings.music_request_channel = Some(RequestChannel {
        text_channel_id: channel_id,
    });
    store.update_settings(guild_id, settings).await?;

    ctx.send(poise::CreateReply::default().embed(create_success_embed(
        &t!("settings_title"),
        &t!("request_channel_set", channel = channel_id),
    )))
    .await?;
    Ok(())
}

/// Stop treating messages as music requests.
#[poise::command(slash_command, prefix_command, guild_only, rename = "clear")]
pub async fn request_channel_clear(ctx: Context<'_>) -> CommandResult {
    let guild_id = ctx
        .guild_id()
        .ok_or_else(|| command_error(&t!("guild_only")))?
        .get();
    let store = &ctx.data().store;

    let mut settings = store.get_settings(guild_id).await?;
    if settings.music_request_channel.take().is_none() {
        return Err(command_error(&t!("request_channel_missing")));
    }
    store.update_settings(guild_id, settings).await?;

    ctx.send(poise::CreateReply::default().embed(create_success_embed(
        &t!("settings_title"),
        &t!("request_channel_cleared"),
    )))
    .await?;
    Ok(())
}
