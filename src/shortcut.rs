use crate::error::BotResult;
use crate::router::InboundMessage;
use async_trait::async_trait;
use poise::serenity_prelude as serenity;
use std::collections::HashMap;
use std::sync::Arc;

/// What a shortcut invocation gets to work with
pub struct ShortcutContext<'a> {
    pub http: &'a Arc<serenity::Http>,
    pub message: &'a InboundMessage,
}

/// A command that can be run straight from a plain message
#[async_trait]
pub trait ShortcutCommand: Send + Sync {
    async fn invoke(&self, ctx: ShortcutContext<'_>, query: &str) -> BotResult<()>;
}

/// Shortcut commands by name
#[derive(Clone, Default)]
pub struct ShortcutRegistry {
    commands: HashMap<String, Arc<dyn ShortcutCommand>>,
}

impl ShortcutRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: &str, command: Arc<dyn ShortcutCommand>) {
        self.commands.insert(name.to_string(), command);
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn ShortcutCommand>> {
        self.commands.get(name).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.commands.contains_key(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.commands.keys().map(String::as_str)
    }
}

impl std::fmt::Debug for ShortcutRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut names: Vec<&str> = self.names().collect();
        names.sort_unstable();
        f.debug_struct("ShortcutRegistry").field("commands", &names).finish()
    }
}
