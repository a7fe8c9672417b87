use async_trait::async_trait;
use serde_json::json;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use vocard::database::{GuildSettings, RequestChannel, SettingsStore};
use vocard::error::BotResult;
use vocard::prefix::{effective_prefix, split_prefix};

/// Mock implementation of the settings store for testing
#[derive(Debug, Clone, Default)]
pub struct MockSettingsStore {
    data: Arc<Mutex<HashMap<u64, GuildSettings>>>,
}

impl MockSettingsStore {
    /// Create a new mock store
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SettingsStore for MockSettingsStore {
    async fn get_settings(&self, guild_id: u64) -> BotResult<GuildSettings> {
        Ok(self
            .data
            .lock()
            .await
            .get(&guild_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn update_settings(&self, guild_id: u64, settings: GuildSettings) -> BotResult<()> {
        self.data.lock().await.insert(guild_id, settings);
        Ok(())
    }
}

/// Prefix as the command framework would compute it for a message
async fn prefix_for(store: &dyn SettingsStore, guild_id: u64, content: &str, trusted: bool) -> String {
    let guild = store.get_settings(guild_id).await.unwrap();
    effective_prefix(content, guild.prefix.as_deref(), "?", false, trusted)
}

#[tokio::test]
async fn test_unknown_guild_gets_defaults() {
    let store = MockSettingsStore::new();

    let settings = store.get_settings(1).await.unwrap();

    assert_eq!(settings, GuildSettings::default());
    assert_eq!(prefix_for(&store, 1, "?play", false).await, "?");
}

#[tokio::test]
async fn test_guild_prefix_override() {
    let store = MockSettingsStore::new();
    store
        .update_settings(
            1,
            GuildSettings {
                prefix: Some("!".to_string()),
                ..Default::default()
            },
        )
        .await
        .unwrap();

    assert_eq!(prefix_for(&store, 1, "!play", false).await, "!");
    assert_eq!(prefix_for(&store, 2, "?play", false).await, "?");
}

#[tokio::test]
async fn test_trusted_user_strips_nothing() {
    let store = MockSettingsStore::new();

    let prefix = prefix_for(&store, 1, "play lofi", true).await;

    assert_eq!(prefix, "");
    assert_eq!(split_prefix("play lofi", &prefix), Some(("", "play lofi")));
    assert_eq!(split_prefix("?play", "!"), None);
}

#[tokio::test]
async fn test_update_keeps_unknown_fields() {
    let store = MockSettingsStore::new();
    let mut settings: GuildSettings = serde_json::from_value(json!({
        "prefix": "!",
        "volume": 80,
        "music_request_channel": { "text_channel_id": "100" }
    }))
    .unwrap();
    assert_eq!(settings.request_channel_id(), Some(100));

    settings.music_request_channel = Some(RequestChannel {
        text_channel_id: 200,
    });
    store.update_settings(1, settings).await.unwrap();

    let stored = store.get_settings(1).await.unwrap();
    assert_eq!(stored.request_channel_id(), Some(200));
    assert_eq!(stored.extra.get("volume"), Some(&json!(80)));
}
