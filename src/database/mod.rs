//! Per-guild settings and user records.
//!
//! Documents live in two Redis hashes, `<database>:Settings` and
//! `<database>:Users`, keyed by guild or user id and stored as JSON.

mod actor;

pub use actor::{Database, DatabaseActor, DatabaseHandle};

use crate::error::BotResult;
use crate::utils::loose;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Collection names
pub mod collections {
    pub const SETTINGS: &str = "Settings";
    pub const USERS: &str = "Users";
}

/// Redis key of a collection inside a database namespace
pub fn collection_key(database: &str, collection: &str) -> String {
    format!("{}:{}", database, collection)
}

/// Settings record of one guild
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GuildSettings {
    /// Prefix override for this guild
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prefix: Option<String>,
    /// Channel whose plain messages are treated as play requests
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub music_request_channel: Option<RequestChannel>,
    /// Fields owned by other modules, kept as they are
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestChannel {
    #[serde(deserialize_with = "loose::value")]
    pub text_channel_id: u64,
}

impl GuildSettings {
    /// The request channel id, if one is configured
    pub fn request_channel_id(&self) -> Option<u64> {
        self.music_request_channel
            .as_ref()
            .map(|channel| channel.text_channel_id)
    }
}

/// Storage used for guild settings lookups
#[async_trait]
pub trait SettingsStore: Send + Sync {
    /// Settings of a guild; a guild without a record gets the defaults
    async fn get_settings(&self, guild_id: u64) -> BotResult<GuildSettings>;

    /// Replace the settings record of a guild
    async fn update_settings(&self, guild_id: u64, settings: GuildSettings) -> BotResult<()>;
}

#[async_trait]
impl SettingsStore for DatabaseHandle {
    async fn get_settings(&self, guild_id: u64) -> BotResult<GuildSettings> {
        DatabaseHandle::get_settings(self, guild_id).await
    }

    async fn update_settings(&self, guild_id: u64, settings: GuildSettings) -> BotResult<()> {
        DatabaseHandle::update_settings(self, guild_id, settings).await
    }
}
