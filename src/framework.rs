//! Serenity side of message routing.
//!
//! [`RoutingFramework`] sits in front of the poise framework. Message events
//! go through the [`MessageRouter`] first and only reach poise when the
//! router falls back to normal command processing; every other event is
//! passed to poise untouched.

use crate::commands::CommandContext;
use crate::config::SharedSettings;
use crate::database::{GuildSettings, SettingsStore};
use crate::error::{command_error, BotResult, Error};
use crate::router::{
    raw_mentions, Attachment, InboundMessage, MessageGateway, MessageRouter, Route,
};
use crate::shortcut::{ShortcutContext, ShortcutRegistry};
use crate::translator::Translator;
use crate::utils::messages::{send_transient, NOTICE_TTL};
use async_trait::async_trait;
use poise::serenity_prelude as serenity;
use ::serenity::framework::Framework;
use std::sync::Arc;
use tracing::{debug, error, info};

/// Services the routing layer needs besides the poise framework
pub struct RoutingServices {
    pub settings: SharedSettings,
    pub store: Arc<dyn SettingsStore>,
    pub shortcuts: ShortcutRegistry,
    pub translator: Arc<Translator>,
}

pub struct RoutingFramework {
    inner: poise::Framework<CommandContext, Error>,
    router: MessageRouter,
    services: RoutingServices,
}

impl RoutingFramework {
    pub fn new(inner: poise::Framework<CommandContext, Error>, services: RoutingServices) -> Self {
        Self {
            inner,
            router: MessageRouter::new(Arc::clone(&services.settings)),
            services,
        }
    }

    async fn on_message(&self, ctx: serenity::Context, new_message: serenity::Message) {
        let inbound = InboundMessage::from(&new_message);
        let gateway = SerenityGateway {
            ctx: &ctx,
            message: &new_message,
            framework: self,
        };

        match self.router.route(&gateway, &inbound).await {
            Ok(Route::Ignored) => {}
            Ok(route) => debug!("Message {} routed to {:?}", inbound.id, route),
            Err(e) => error!("Failed to route message {}: {}", inbound.id, e),
        }
    }

    async fn on_ready(&self, ready: &serenity::Ready) {
        info!("------------------");
        info!("Logged in as {}", ready.user.name);
        info!("Bot ID: {}", ready.user.id);
        info!("------------------");
        info!("Vocard Version: {}", env!("CARGO_PKG_VERSION"));
        info!("------------------");

        self.services.settings.write().await.client_id = Some(ready.user.id.get());
        self.services.translator.reset().await;
    }
}

#[async_trait]
impl Framework for RoutingFramework {
    async fn init(&mut self, client: &serenity::Client) {
        self.inner.init(client).await;
    }

    async fn dispatch(&self, ctx: serenity::Context, event: serenity::FullEvent) {
        match event {
            serenity::FullEvent::Message { new_message } => {
                self.on_message(ctx, new_message).await;
            }
            serenity::FullEvent::Ready { data_about_bot } => {
                // Poise runs its setup on the first ready, which needs the
                // locale table still populated
                let ready = data_about_bot.clone();
                self.inner
                    .dispatch(ctx, serenity::FullEvent::Ready { data_about_bot })
                    .await;
                self.on_ready(&ready).await;
            }
            event => self.inner.dispatch(ctx, event).await,
        }
    }
}

impl From<&serenity::Message> for InboundMessage {
    fn from(msg: &serenity::Message) -> Self {
        Self {
            id: msg.id.get(),
            author_id: msg.author.id.get(),
            author_is_bot: msg.author.bot,
            guild_id: msg.guild_id.map(|id| id.get()),
            channel_id: msg.channel_id.get(),
            content: msg.content.clone(),
            attachments: msg
                .attachments
                .iter()
                .map(|attachment| Attachment {
                    url: attachment.url.clone(),
                })
                .collect(),
            raw_mentions: raw_mentions(&msg.content),
            mention_everyone: msg.mention_everyone,
        }
    }
}

/// [`MessageGateway`] for one message received from Discord
struct SerenityGateway<'a> {
    ctx: &'a serenity::Context,
    message: &'a serenity::Message,
    framework: &'a RoutingFramework,
}

#[async_trait]
impl MessageGateway for SerenityGateway<'_> {
    fn bot_id(&self) -> Option<u64> {
        Some(self.ctx.cache.current_user().id.get())
    }

    fn is_owner(&self, user_id: u64) -> bool {
        self.framework
            .inner
            .options()
            .owners
            .contains(&serenity::UserId::new(user_id))
    }

    async fn guild_settings(&self, guild_id: u64) -> BotResult<GuildSettings> {
        self.framework.services.store.get_settings(guild_id).await
    }

    async fn say(&self, message: &InboundMessage, text: &str) -> BotResult<()> {
        serenity::ChannelId::new(message.channel_id)
            .say(self.ctx, text)
            .await?;
        Ok(())
    }

    async fn invoke(&self, command: &str, message: &InboundMessage, query: &str) -> BotResult<()> {
        let shortcut = self
            .framework
            .services
            .shortcuts
            .get(command)
            .ok_or_else(|| command_error(&format!("Command `{}` is not available", command)))?;

        let ctx = ShortcutContext {
            http: &self.ctx.http,
            message,
        };
        shortcut.invoke(ctx, query).await
    }

    async fn notify_failure(&self, message: &InboundMessage, text: &str) -> BotResult<()> {
        send_transient(
            &self.ctx.http,
            serenity::ChannelId::new(message.channel_id),
            text,
            NOTICE_TTL,
        )
        .await
    }

    async fn delete(&self, message: &InboundMessage) -> BotResult<()> {
        serenity::ChannelId::new(message.channel_id)
            .delete_message(self.ctx, serenity::MessageId::new(message.id))
            .await?;
        Ok(())
    }

    async fn process_commands(&self, _message: &InboundMessage) -> BotResult<()> {
        self.framework
            .inner
            .dispatch(
                self.ctx.clone(),
                serenity::FullEvent::Message {
                    new_message: self.message.clone(),
                },
            )
            .await;
        Ok(())
    }
}
