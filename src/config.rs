use crate::error::{config_error, env_error, BotResult};
use crate::utils::loose;
use dotenvy::dotenv;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::RwLock;

/// Default location of the settings document
pub const SETTINGS_PATH: &str = "settings.json";

/// Settings shared between the router, the commands and the ready handler
pub type SharedSettings = Arc<RwLock<Settings>>;

/// Resolve `${NAME}` placeholders against the process environment
pub fn resolve_env(document: Value) -> BotResult<Value> {
    resolve(document, &|name| env::var(name).ok())
}

/// Replace every `${NAME}` string in `document` with `lookup(NAME)`.
///
/// Objects keep their keys and arrays keep their order. Any other scalar is
/// returned untouched. A placeholder whose variable is unset fails the whole
/// resolution; nothing is partially substituted.
pub fn resolve<F>(document: Value, lookup: &F) -> BotResult<Value>
where
    F: Fn(&str) -> Option<String>,
{
    match document {
        Value::Object(map) => map
            .into_iter()
            .map(|(key, value)| resolve(value, lookup).map(|value| (key, value)))
            .collect::<BotResult<Map<String, Value>>>()
            .map(Value::Object),
        Value::Array(items) => items
            .into_iter()
            .map(|item| resolve(item, lookup))
            .collect::<BotResult<Vec<Value>>>()
            .map(Value::Array),
        Value::String(text) => match placeholder_name(&text) {
            Some(name) => lookup(name)
                .map(Value::String)
                .ok_or_else(|| env_error(name)),
            None => Ok(Value::String(text)),
        },
        other => Ok(other),
    }
}

fn placeholder_name(text: &str) -> Option<&str> {
    text.strip_prefix("${")?.strip_suffix('}')
}

/// Main configuration structure for the bot
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    /// Discord bot token
    #[serde(default)]
    pub token: String,
    /// Bot user id, filled in on every ready event
    #[serde(skip)]
    pub client_id: Option<u64>,
    /// Database (key namespace) holding the Settings and Users collections
    #[serde(default)]
    pub database_name: String,
    /// Redis connection string
    #[serde(default)]
    pub database_url: String,
    /// Default command prefix, empty for prefix-less commands
    #[serde(default)]
    pub prefix: String,
    /// Users allowed to run commands without a prefix
    #[serde(default, deserialize_with = "loose::list")]
    pub bot_access_user: Vec<u64>,
    /// Whether application owners get the same prefix bypass as trusted users
    #[serde(default = "default_true", deserialize_with = "loose::value")]
    pub owner_bypass: bool,
    #[serde(default)]
    pub ipc_client: IpcSettings,
    #[serde(default)]
    pub logging: LoggingSettings,
    /// Build version the command tree was last synced for
    #[serde(default, deserialize_with = "loose::option")]
    pub version: Option<String>,
    /// Presence shown once the bot is ready, `""` leaves the presence alone
    #[serde(default, deserialize_with = "loose::option")]
    pub activity: Option<String>,
}

/// Dashboard connection parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IpcSettings {
    #[serde(default, deserialize_with = "loose::value")]
    pub enable: bool,
    #[serde(default = "default_ipc_host")]
    pub host: String,
    #[serde(default = "default_ipc_port", deserialize_with = "loose::value")]
    pub port: u16,
    #[serde(default)]
    pub password: String,
    #[serde(default, deserialize_with = "loose::value")]
    pub secure: bool,
    /// Seconds between heartbeats
    #[serde(default = "default_heartbeat", deserialize_with = "loose::value")]
    pub heartbeat: u64,
}

impl Default for IpcSettings {
    fn default() -> Self {
        Self {
            enable: false,
            host: default_ipc_host(),
            port: default_ipc_port(),
            password: String::new(),
            secure: false,
            heartbeat: default_heartbeat(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingSettings {
    #[serde(default)]
    pub file: LogFileSettings,
    /// Per-target levels, e.g. `{"vocard": "info", "serenity": "warn"}`
    #[serde(default)]
    pub level: BTreeMap<String, String>,
    /// Number of rotated log files to keep
    #[serde(
        default = "default_max_history",
        rename = "max-history",
        deserialize_with = "loose::value"
    )]
    pub max_history: usize,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            file: LogFileSettings::default(),
            level: BTreeMap::new(),
            max_history: default_max_history(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogFileSettings {
    #[serde(default = "default_true", deserialize_with = "loose::value")]
    pub enable: bool,
    #[serde(default = "default_log_path")]
    pub path: String,
}

impl Default for LogFileSettings {
    fn default() -> Self {
        Self {
            enable: true,
            path: default_log_path(),
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_ipc_host() -> String {
    "127.0.0.1".to_string()
}

fn default_ipc_port() -> u16 {
    8000
}

fn default_heartbeat() -> u64 {
    30
}

fn default_max_history() -> usize {
    30
}

fn default_log_path() -> String {
    "./logs".to_string()
}

impl Settings {
    /// Build settings from an already resolved document
    pub fn from_document(document: Value) -> BotResult<Self> {
        Ok(serde_json::from_value(document)?)
    }

    /// Database name and URL, both required before connecting
    pub fn database_credentials(&self) -> BotResult<(&str, &str)> {
        let name = self.database_name.trim();
        let url = self.database_url.trim();
        if name.is_empty() || url.is_empty() {
            return Err(config_error(
                "database_name and database_url cannot be empty in the settings file",
            ));
        }
        Ok((name, url))
    }

    /// Check whether a user is on the trusted list
    pub fn is_trusted(&self, user_id: u64) -> bool {
        self.bot_access_user.contains(&user_id)
    }
}

/// On-disk format of a settings file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    Json,
    Toml,
}

impl Format {
    fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|ext| ext.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("toml") => Format::Toml,
            _ => Format::Json,
        }
    }
}

/// The settings document on disk
#[derive(Debug, Clone)]
pub struct SettingsFile {
    path: PathBuf,
    format: Format,
}

impl SettingsFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let format = Format::from_path(&path);
        Self { path, format }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load configuration: `.env` first, then the file, then placeholders
    pub fn load(&self) -> BotResult<Settings> {
        // Load .env file if it exists
        dotenv().ok();

        let raw = self.read_raw()?;
        Settings::from_document(resolve_env(raw)?)
    }

    /// Read the document without resolving placeholders
    pub fn read_raw(&self) -> BotResult<Value> {
        let content = fs::read_to_string(&self.path).map_err(|e| {
            config_error(&format!("Cannot read {}: {}", self.path.display(), e))
        })?;

        match self.format {
            Format::Json => Ok(serde_json::from_str(&content)?),
            Format::Toml => Ok(toml::from_str(&content)?),
        }
    }

    /// Merge top-level keys into the file and write it back.
    ///
    /// Works on the unresolved document so placeholders stay placeholders.
    pub fn update(&self, new_data: Map<String, Value>) -> BotResult<()> {
        let mut document = self.read_raw()?;
        let root = document
            .as_object_mut()
            .ok_or_else(|| config_error("The settings document must be a mapping"))?;

        for (key, value) in new_data {
            root.insert(key, value);
        }

        let content = match self.format {
            Format::Json => serde_json::to_string_pretty(&document)?,
            Format::Toml => toml::to_string_pretty(&document)?,
        };
        fs::write(&self.path, content)?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::collections::HashMap;

    fn lookup_from(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| vars.get(name).cloned()
    }

    #[test]
    fn test_resolve_substitutes_nested_placeholders() {
        let lookup = lookup_from(&[("TOKEN", "abc"), ("OWNER", "42")]);
        let document = json!({
            "token": "${TOKEN}",
            "bot_access_user": ["${OWNER}", 7],
            "ipc_client": { "password": "${TOKEN}", "enable": false }
        });

        let resolved = resolve(document, &lookup).unwrap();

        assert_eq!(
            resolved,
            json!({
                "token": "abc",
                "bot_access_user": ["42", 7],
                "ipc_client": { "password": "abc", "enable": false }
            })
        );
    }

    #[test]
    fn test_resolve_fails_on_unset_variable() {
        let lookup = lookup_from(&[("TOKEN", "abc")]);
        let document = json!({ "token": "${TOKEN}", "nested": ["${MISSING}"] });

        let err = resolve(document, &lookup).unwrap_err();

        match err {
            crate::error::Error::Environment(message) => assert!(message.contains("MISSING")),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_resolve_without_placeholders_is_identity() {
        let lookup = lookup_from(&[]);
        let document = json!({
            "prefix": "?",
            "price": "$5",
            "partial": "${NOT_CLOSED",
            "embedded": "x${Y}",
            "list": [1, 2.5, true, null],
            "empty": {}
        });

        let resolved = resolve(document.clone(), &lookup).unwrap();

        assert_eq!(resolved, document);
    }

    #[test]
    fn test_empty_placeholder_name_is_unset() {
        let lookup = lookup_from(&[]);
        assert!(resolve(json!("${}"), &lookup).is_err());
    }

    #[test]
    fn test_resolve_preserves_key_order() {
        let lookup = lookup_from(&[("A", "1")]);
        let document = json!({ "zeta": "${A}", "alpha": 1, "mid": 2 });

        let resolved = resolve(document, &lookup).unwrap();
        let keys: Vec<&String> = resolved.as_object().unwrap().keys().collect();

        assert_eq!(keys, vec!["zeta", "alpha", "mid"]);
    }

    #[test]
    fn test_settings_defaults_and_loose_values() {
        let settings = Settings::from_document(json!({
            "token": "t",
            "database_name": "Vocard",
            "database_url": "redis://127.0.0.1:6379",
            "prefix": "?",
            "bot_access_user": ["123", 456],
            "ipc_client": { "enable": "true", "port": "8443" },
            "logging": { "max-history": "7", "level": { "vocard": "debug" } }
        }))
        .unwrap();

        assert_eq!(settings.bot_access_user, vec![123, 456]);
        assert!(settings.owner_bypass);
        assert!(settings.ipc_client.enable);
        assert_eq!(settings.ipc_client.port, 8443);
        assert_eq!(settings.ipc_client.heartbeat, 30);
        assert_eq!(settings.logging.max_history, 7);
        assert!(settings.logging.file.enable);
        assert_eq!(settings.logging.file.path, "./logs");
        assert!(settings.version.is_none());
        assert!(settings.is_trusted(123));
        assert!(!settings.is_trusted(1));
    }

    #[test]
    fn test_blank_activity_and_version_are_absent() {
        let blank = Settings::from_document(json!({
            "activity": "",
            "version": "  "
        }))
        .unwrap();
        assert!(blank.activity.is_none());
        assert!(blank.version.is_none());

        let set = Settings::from_document(json!({
            "activity": " Vocard ",
            "version": "1.2.0"
        }))
        .unwrap();
        assert_eq!(set.activity.as_deref(), Some("Vocard"));
        assert_eq!(set.version.as_deref(), Some("1.2.0"));
    }

    #[test]
    fn test_database_credentials_required() {
        let settings = Settings::from_document(json!({ "database_name": "Vocard" })).unwrap();
        assert!(settings.database_credentials().is_err());

        let settings = Settings::from_document(json!({
            "database_name": "Vocard",
            "database_url": "redis://localhost"
        }))
        .unwrap();
        assert_eq!(
            settings.database_credentials().unwrap(),
            ("Vocard", "redis://localhost")
        );
    }

    #[test]
    fn test_update_keeps_placeholders_in_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        fs::write(&path, r#"{"token": "${VOCARD_TEST_TOKEN}", "version": "0.0.1"}"#).unwrap();

        let file = SettingsFile::new(&path);
        let mut patch = Map::new();
        patch.insert("version".to_string(), json!("9.9.9"));
        file.update(patch).unwrap();

        let raw = file.read_raw().unwrap();
        assert_eq!(raw["token"], "${VOCARD_TEST_TOKEN}");
        assert_eq!(raw["version"], "9.9.9");
    }

    #[test]
    fn test_toml_settings_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.toml");
        fs::write(
            &path,
            "prefix = \"!\"\nversion = \"0.0.1\"\n\n[ipc_client]\nenable = false\n",
        )
        .unwrap();

        let file = SettingsFile::new(&path);
        let mut patch = Map::new();
        patch.insert("version".to_string(), json!("0.2.0"));
        file.update(patch).unwrap();

        let settings = Settings::from_document(file.read_raw().unwrap()).unwrap();
        assert_eq!(settings.prefix, "!");
        assert_eq!(settings.version.as_deref(), Some("0.2.0"));
        assert!(!settings.ipc_client.enable);
    }
}
