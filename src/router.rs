//! Routing of inbound guild messages.
//!
//! Every message goes through the same steps, and the first step that
//! applies ends routing:
//!
//! 1. messages from bots or outside a guild are ignored;
//! 2. a direct mention of the bot is answered with the current prefix
//!    (this step does not end routing);
//! 3. messages in the guild's music request channel are turned into `play`
//!    invocations and then deleted;
//! 4. anything else goes to normal command processing.

use crate::config::SharedSettings;
use crate::database::GuildSettings;
use crate::error::{BotResult, Error};
use crate::prefix::effective_prefix;
use async_trait::async_trait;
use futures::FutureExt;
use rust_i18n::t;
use std::any::Any;
use std::panic::AssertUnwindSafe;
use tracing::{debug, error, warn};

/// Command run for messages in a request channel
pub const PLAY_COMMAND: &str = "play";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attachment {
    pub url: String,
}

/// Platform-independent view of an inbound message
#[derive(Debug, Clone, Default)]
pub struct InboundMessage {
    pub id: u64,
    pub author_id: u64,
    pub author_is_bot: bool,
    pub guild_id: Option<u64>,
    pub channel_id: u64,
    pub content: String,
    pub attachments: Vec<Attachment>,
    /// Users mentioned in `content` itself, see [`raw_mentions`]
    pub raw_mentions: Vec<u64>,
    pub mention_everyone: bool,
}

/// User ids of the `<@id>` and `<@!id>` tokens in `content`, in order.
/// Role (`<@&id>`) and channel tokens are skipped.
pub fn raw_mentions(content: &str) -> Vec<u64> {
    let mut ids = Vec::new();
    let mut rest = content;
    while let Some(start) = rest.find("<@") {
        rest = &rest[start + 2..];
        let body = rest.strip_prefix('!').unwrap_or(rest);
        let digits = body
            .find(|c: char| !c.is_ascii_digit())
            .unwrap_or(body.len());
        if digits > 0 && body[digits..].starts_with('>') {
            if let Ok(id) = body[..digits].parse() {
                ids.push(id);
            }
        }
    }
    ids
}

/// Where a message ended up
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    /// Dropped by the filter
    Ignored,
    /// Consumed by the request channel shortcut
    Shortcut,
    /// Handed to normal command processing
    Commands,
}

/// Everything the router needs from the chat platform
#[async_trait]
pub trait MessageGateway: Send + Sync {
    /// Id of the bot user, once known
    fn bot_id(&self) -> Option<u64>;

    /// Whether the user is an owner of the application
    fn is_owner(&self, user_id: u64) -> bool;

    async fn guild_settings(&self, guild_id: u64) -> BotResult<GuildSettings>;

    /// Reply in the message's channel
    async fn say(&self, message: &InboundMessage, text: &str) -> BotResult<()>;

    /// Invoke a command by name with `query` as its argument
    async fn invoke(&self, command: &str, message: &InboundMessage, query: &str) -> BotResult<()>;

    /// Report a failed invocation back to the author
    async fn notify_failure(&self, message: &InboundMessage, text: &str) -> BotResult<()>;

    async fn delete(&self, message: &InboundMessage) -> BotResult<()>;

    /// Run the message through the command framework
    async fn process_commands(&self, message: &InboundMessage) -> BotResult<()>;
}

pub struct MessageRouter {
    settings: SharedSettings,
}

impl MessageRouter {
    pub fn new(settings: SharedSettings) -> Self {
        Self { settings }
    }

    pub async fn route<G>(&self, gateway: &G, message: &InboundMessage) -> BotResult<Route>
    where
        G: MessageGateway + ?Sized,
    {
        let Some(guild_id) = message.guild_id else {
            return Ok(Route::Ignored);
        };
        if message.author_is_bot {
            return Ok(Route::Ignored);
        }

        let guild = gateway.guild_settings(guild_id).await?;

        if self.mentions_bot(gateway, message) {
            self.announce_prefix(gateway, message, &guild).await;
        }

        if guild.request_channel_id() == Some(message.channel_id) {
            self.run_shortcut(gateway, message).await;
            return Ok(Route::Shortcut);
        }

        gateway.process_commands(message).await?;
        Ok(Route::Commands)
    }

    fn mentions_bot<G>(&self, gateway: &G, message: &InboundMessage) -> bool
    where
        G: MessageGateway + ?Sized,
    {
        match gateway.bot_id() {
            Some(bot_id) => !message.mention_everyone && message.raw_mentions.contains(&bot_id),
            None => false,
        }
    }

    async fn announce_prefix<G>(&self, gateway: &G, message: &InboundMessage, guild: &GuildSettings)
    where
        G: MessageGateway + ?Sized,
    {
        let prefix = {
            let settings = self.settings.read().await;
            effective_prefix(
                &message.content,
                guild.prefix.as_deref(),
                &settings.prefix,
                settings.owner_bypass && gateway.is_owner(message.author_id),
                settings.is_trusted(message.author_id),
            )
        };

        let reply = if prefix.is_empty() {
            t!("prefix_not_set").to_string()
        } else {
            t!("prefix_is", prefix = prefix).to_string()
        };

        if let Err(e) = gateway.say(message, &reply).await {
            warn!("Failed to announce prefix in channel {}: {}", message.channel_id, e);
        }
    }

    async fn run_shortcut<G>(&self, gateway: &G, message: &InboundMessage)
    where
        G: MessageGateway + ?Sized,
    {
        let deletion = PendingDeletion::new(message);

        let outcome = AssertUnwindSafe(invoke_play(gateway, message))
            .catch_unwind()
            .await;
        let failure = match outcome {
            Ok(Ok(())) => None,
            Ok(Err(e)) => Some(e),
            Err(panic) => Some(Error::Other(panic_message(panic))),
        };

        if let Some(e) = failure {
            debug!("Request in channel {} failed: {:?}", message.channel_id, e);
            if let Err(notify_err) = gateway.notify_failure(message, &e.to_string()).await {
                error!("Failed to report request failure: {}", notify_err);
            }
        }

        deletion.complete(gateway).await;
    }
}

async fn invoke_play<G>(gateway: &G, message: &InboundMessage) -> BotResult<()>
where
    G: MessageGateway + ?Sized,
{
    if !message.content.is_empty() {
        return gateway.invoke(PLAY_COMMAND, message, &message.content).await;
    }

    for attachment in &message.attachments {
        gateway.invoke(PLAY_COMMAND, message, &attachment.url).await?;
    }
    Ok(())
}

fn panic_message(panic: Box<dyn Any + Send>) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else {
        "the command panicked".to_string()
    }
}

/// Obligation to delete a request message once its invocation has run
#[must_use]
struct PendingDeletion<'a> {
    message: &'a InboundMessage,
    done: bool,
}

impl<'a> PendingDeletion<'a> {
    fn new(message: &'a InboundMessage) -> Self {
        Self {
            message,
            done: false,
        }
    }

    async fn complete<G>(mut self, gateway: &G)
    where
        G: MessageGateway + ?Sized,
    {
        self.done = true;
        if let Err(e) = gateway.delete(self.message).await {
            warn!("Failed to delete request message {}: {}", self.message.id, e);
        }
    }
}

impl Drop for PendingDeletion<'_> {
    fn drop(&mut self) {
        if !self.done {
            warn!(
                "Request message {} was left in channel {}: routing was cancelled",
                self.message.id, self.message.channel_id
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Settings;
    use crate::database::RequestChannel;
    use crate::error::command_error;
    use serde_json::json;
    use std::sync::{Arc, Mutex};
    use tokio::sync::RwLock;

    #[test]
    fn test_raw_mentions_from_content() {
        assert_eq!(raw_mentions("<@1> hi <@!22>"), vec![1, 22]);
        assert_eq!(raw_mentions("<@&5> <#6> <@> <@7"), Vec::<u64>::new());
        assert_eq!(raw_mentions("<<@3>>"), vec![3]);
        assert!(raw_mentions("thanks").is_empty());
    }

    const BOT: u64 = 1;
    const GUILD: u64 = 10;
    const REQUEST_CHANNEL: u64 = 100;
    const OTHER_CHANNEL: u64 = 200;

    #[derive(Debug, Clone, PartialEq)]
    enum Call {
        Say(String),
        Invoke(String, String),
        Notify(String),
        Delete(u64),
        Process,
    }

    #[derive(Default)]
    struct RecordingGateway {
        guild: GuildSettings,
        calls: Mutex<Vec<Call>>,
        fail_invoke: bool,
        panic_invoke: bool,
    }

    impl RecordingGateway {
        fn calls(&self) -> Vec<Call> {
            self.calls.lock().unwrap().clone()
        }

        fn push(&self, call: Call) {
            self.calls.lock().unwrap().push(call);
        }
    }

    #[async_trait]
    impl MessageGateway for RecordingGateway {
        fn bot_id(&self) -> Option<u64> {
            Some(BOT)
        }

        fn is_owner(&self, _user_id: u64) -> bool {
            false
        }

        async fn guild_settings(&self, _guild_id: u64) -> BotResult<GuildSettings> {
            Ok(self.guild.clone())
        }

        async fn say(&self, _message: &InboundMessage, text: &str) -> BotResult<()> {
            self.push(Call::Say(text.to_string()));
            Ok(())
        }

        async fn invoke(&self, command: &str, _message: &InboundMessage, query: &str) -> BotResult<()> {
            self.push(Call::Invoke(command.to_string(), query.to_string()));
            if self.panic_invoke {
                panic!("voicelink exploded");
            }
            if self.fail_invoke {
                return Err(command_error("No tracks found"));
            }
            Ok(())
        }

        async fn notify_failure(&self, _message: &InboundMessage, text: &str) -> BotResult<()> {
            self.push(Call::Notify(text.to_string()));
            Ok(())
        }

        async fn delete(&self, message: &InboundMessage) -> BotResult<()> {
            self.push(Call::Delete(message.id));
            Ok(())
        }

        async fn process_commands(&self, _message: &InboundMessage) -> BotResult<()> {
            self.push(Call::Process);
            Ok(())
        }
    }

    fn router(prefix: &str) -> MessageRouter {
        let settings = Settings::from_document(json!({ "prefix": prefix })).unwrap();
        MessageRouter::new(Arc::new(RwLock::new(settings)))
    }

    fn request_guild() -> GuildSettings {
        GuildSettings {
            music_request_channel: Some(RequestChannel {
                text_channel_id: REQUEST_CHANNEL,
            }),
            ..Default::default()
        }
    }

    fn message(channel_id: u64, content: &str) -> InboundMessage {
        InboundMessage {
            id: 555,
            author_id: 42,
            guild_id: Some(GUILD),
            channel_id,
            content: content.to_string(),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_bot_author_is_ignored() {
        let gateway = RecordingGateway {
            guild: request_guild(),
            ..Default::default()
        };
        let mut msg = message(REQUEST_CHANNEL, "lofi beats");
        msg.author_is_bot = true;

        let route = router("?").route(&gateway, &msg).await.unwrap();

        assert_eq!(route, Route::Ignored);
        assert!(gateway.calls().is_empty());
    }

    #[tokio::test]
    async fn test_message_without_guild_is_ignored() {
        let gateway = RecordingGateway::default();
        let mut msg = message(OTHER_CHANNEL, "?play x");
        msg.guild_id = None;

        let route = router("?").route(&gateway, &msg).await.unwrap();

        assert_eq!(route, Route::Ignored);
        assert!(gateway.calls().is_empty());
    }

    #[tokio::test]
    async fn test_request_channel_text_plays_once_then_deletes() {
        let gateway = RecordingGateway {
            guild: request_guild(),
            ..Default::default()
        };

        let route = router("?")
            .route(&gateway, &message(REQUEST_CHANNEL, "lofi beats"))
            .await
            .unwrap();

        assert_eq!(route, Route::Shortcut);
        assert_eq!(
            gateway.calls(),
            vec![
                Call::Invoke("play".to_string(), "lofi beats".to_string()),
                Call::Delete(555),
            ]
        );
    }

    #[tokio::test]
    async fn test_request_channel_attachments_play_in_order() {
        let gateway = RecordingGateway {
            guild: request_guild(),
            ..Default::default()
        };
        let mut msg = message(REQUEST_CHANNEL, "");
        msg.attachments = vec![
            Attachment {
                url: "https://cdn.example/a.mp3".to_string(),
            },
            Attachment {
                url: "https://cdn.example/b.mp3".to_string(),
            },
        ];

        let route = router("?").route(&gateway, &msg).await.unwrap();

        assert_eq!(route, Route::Shortcut);
        assert_eq!(
            gateway.calls(),
            vec![
                Call::Invoke("play".to_string(), "https://cdn.example/a.mp3".to_string()),
                Call::Invoke("play".to_string(), "https://cdn.example/b.mp3".to_string()),
                Call::Delete(555),
            ]
        );
    }

    #[tokio::test]
    async fn test_empty_request_is_still_deleted() {
        let gateway = RecordingGateway {
            guild: request_guild(),
            ..Default::default()
        };

        let route = router("?")
            .route(&gateway, &message(REQUEST_CHANNEL, ""))
            .await
            .unwrap();

        assert_eq!(route, Route::Shortcut);
        assert_eq!(gateway.calls(), vec![Call::Delete(555)]);
    }

    #[tokio::test]
    async fn test_failed_request_is_reported_and_deleted() {
        let gateway = RecordingGateway {
            guild: request_guild(),
            fail_invoke: true,
            ..Default::default()
        };

        let route = router("?")
            .route(&gateway, &message(REQUEST_CHANNEL, "lofi beats"))
            .await
            .unwrap();

        assert_eq!(route, Route::Shortcut);
        assert_eq!(
            gateway.calls(),
            vec![
                Call::Invoke("play".to_string(), "lofi beats".to_string()),
                Call::Notify("No tracks found".to_string()),
                Call::Delete(555),
            ]
        );
    }

    #[tokio::test]
    async fn test_panicking_request_is_reported_and_deleted() {
        let gateway = RecordingGateway {
            guild: request_guild(),
            panic_invoke: true,
            ..Default::default()
        };

        let route = router("?")
            .route(&gateway, &message(REQUEST_CHANNEL, "lofi beats"))
            .await
            .unwrap();

        assert_eq!(route, Route::Shortcut);
        let calls = gateway.calls();
        assert_eq!(calls.len(), 3);
        assert!(matches!(&calls[1], Call::Notify(text) if text.contains("voicelink exploded")));
        assert_eq!(calls[2], Call::Delete(555));
    }

    #[tokio::test]
    async fn test_other_channel_falls_back_to_commands() {
        let gateway = RecordingGateway {
            guild: request_guild(),
            ..Default::default()
        };

        let route = router("?")
            .route(&gateway, &message(OTHER_CHANNEL, "?play lofi"))
            .await
            .unwrap();

        assert_eq!(route, Route::Commands);
        assert_eq!(gateway.calls(), vec![Call::Process]);
    }

    #[tokio::test]
    async fn test_mention_announces_prefix_and_continues() {
        let gateway = RecordingGateway::default();
        let mut msg = message(OTHER_CHANNEL, "<@1>");
        msg.raw_mentions = vec![BOT];

        let route = router("?").route(&gateway, &msg).await.unwrap();

        assert_eq!(route, Route::Commands);
        assert_eq!(
            gateway.calls(),
            vec![Call::Say("My prefix is `?`".to_string()), Call::Process]
        );
    }

    #[tokio::test]
    async fn test_mention_without_prefix() {
        let gateway = RecordingGateway::default();
        let mut msg = message(OTHER_CHANNEL, "<@1>");
        msg.raw_mentions = vec![BOT];

        router("").route(&gateway, &msg).await.unwrap();

        assert_eq!(
            gateway.calls()[0],
            Call::Say("I don't have a bot prefix set.".to_string())
        );
    }

    #[tokio::test]
    async fn test_mention_everyone_is_not_announced() {
        let gateway = RecordingGateway::default();
        let mut msg = message(OTHER_CHANNEL, "@everyone <@1>");
        msg.raw_mentions = vec![BOT];
        msg.mention_everyone = true;

        router("?").route(&gateway, &msg).await.unwrap();

        assert_eq!(gateway.calls(), vec![Call::Process]);
    }

    #[tokio::test]
    async fn test_mention_in_request_channel_announces_and_plays() {
        let gateway = RecordingGateway {
            guild: request_guild(),
            ..Default::default()
        };
        let mut msg = message(REQUEST_CHANNEL, "<@1> lofi");
        msg.raw_mentions = vec![BOT];

        let route = router("?").route(&gateway, &msg).await.unwrap();

        assert_eq!(route, Route::Shortcut);
        assert_eq!(
            gateway.calls(),
            vec![
                Call::Say("My prefix is `?`".to_string()),
                Call::Invoke("play".to_string(), "<@1> lofi".to_string()),
                Call::Delete(555),
            ]
        );
    }
}
