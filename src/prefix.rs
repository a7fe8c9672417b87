use crate::commands::CommandContext;
use crate::error::Error;
use futures::future::BoxFuture;
use poise::serenity_prelude as serenity;

/// Compute the prefix a message has to carry to be read as a command.
///
/// The base prefix is the guild override when set, otherwise the default.
/// Owners and trusted users may drop a configured prefix entirely: as long
/// as the base prefix is non-empty and their message does not already start
/// with it, the effective prefix is `""`.
pub fn effective_prefix(
    content: &str,
    guild_prefix: Option<&str>,
    default_prefix: &str,
    is_owner: bool,
    is_trusted: bool,
) -> String {
    let base = guild_prefix.unwrap_or(default_prefix);

    if !base.is_empty() && !content.starts_with(base) && (is_owner || is_trusted) {
        return String::new();
    }

    base.to_string()
}

/// Prefix hook for the poise framework.
///
/// Splits the message into `(prefix, rest)` using [`effective_prefix`].
pub fn stripped_prefix<'a>(
    _ctx: &'a serenity::Context,
    msg: &'a serenity::Message,
    data: &'a CommandContext,
) -> BoxFuture<'a, Result<Option<(&'a str, &'a str)>, Error>> {
    Box::pin(async move {
        let Some(guild_id) = msg.guild_id else {
            return Ok(None);
        };

        let guild = data.store.get_settings(guild_id.get()).await?;
        let prefix = {
            let settings = data.settings.read().await;
            let is_owner = settings.owner_bypass && data.owners.contains(&msg.author.id);
            effective_prefix(
                &msg.content,
                guild.prefix.as_deref(),
                &settings.prefix,
                is_owner,
                settings.is_trusted(msg.author.id.get()),
            )
        };

        Ok(split_prefix(&msg.content, &prefix))
    })
}

/// Split `content` after `prefix`, borrowing both halves from `content`
pub fn split_prefix<'a>(content: &'a str, prefix: &str) -> Option<(&'a str, &'a str)> {
    if content.starts_with(prefix) {
        Some(content.split_at(prefix.len()))
    } else {
        None
    }
}
