use crate::config::SharedSettings;
use crate::database::{DatabaseHandle, SettingsStore};
use crate::error::BotResult;
use crate::translator::Translator;
use crate::voicelink::Voicelink;
use poise::serenity_prelude as serenity;
use std::collections::HashSet;
use std::sync::Arc;

// Export submodules
pub mod general;
pub mod music;
pub mod settings;

/// Color of error embeds
pub const ERROR_COLOR: u32 = 0xE74C3C;
/// Color of success embeds
pub const SUCCESS_COLOR: u32 = 0x2ECC71;

/// Shared context for all commands
pub struct CommandContext {
    pub settings: SharedSettings,
    pub store: Arc<dyn SettingsStore>,
    pub database: DatabaseHandle,
    pub translator: Arc<Translator>,
    pub voicelink: Arc<dyn Voicelink>,
    /// Application owners, copied from the framework once it is set up
    pub owners: HashSet<serenity::UserId>,
}

impl std::fmt::Debug for CommandContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CommandContext")
            .field("database", &self.database)
            .field("owners", &self.owners)
            .finish()
    }
}

/// Type alias for command result
pub type CommandResult = BotResult<()>;

/// Type alias for poise context
pub type Context<'a> = poise::Context<'a, CommandContext, crate::error::Error>;

/// Type alias for a poise command over our context
pub type Command = poise::Command<CommandContext, crate::error::Error>;

/// Create an embed reporting a failure
pub fn create_error_embed(title: &str, description: &str) -> serenity::CreateEmbed {
    serenity::CreateEmbed::new()
        .title(title)
        .description(description)
        .color(ERROR_COLOR)
}

/// Create an embed reporting success
pub fn create_success_embed(title: &str, description: &str) -> serenity::CreateEmbed {
    serenity::CreateEmbed::new()
        .title(title)
        .description(description)
        .color(SUCCESS_COLOR)
}
