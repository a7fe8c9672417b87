use crate::error::BotResult;
use poise::serenity_prelude as serenity;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// How long notices stay visible in a channel before they are removed
pub const NOTICE_TTL: Duration = Duration::from_secs(10);

/// Post a message and delete it again after `ttl`.
///
/// Used wherever the bot talks in a request channel, which is kept free of
/// anything but the current requests.
pub async fn send_transient(
    http: &Arc<serenity::Http>,
    channel_id: serenity::ChannelId,
    text: &str,
    ttl: Duration,
) -> BotResult<()> {
    let message = channel_id.say(http, text).await?;

    let http = Arc::clone(http);
    tokio::spawn(async move {
        tokio::time::sleep(ttl).await;
        if let Err(e) = message.delete(&http).await {
            debug!("Transient message {} already gone: {}", message.id, e);
        }
    });

    Ok(())
}
