//! Localized command text.
//!
//! The [`Translator`] owns the locale table loaded from `local_langs/` and
//! the log of keys that a known locale could not translate. Both are reset
//! on every ready event by the startup sequence.

use crate::commands::CommandContext;
use crate::error::{BotResult, Error};
use futures::future::BoxFuture;
use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::Path;
use tokio::sync::{Mutex, RwLock};
use tracing::{info, warn};

/// Directory holding one `<locale>.json` file per supported locale
pub const LOCAL_LANGS_DIR: &str = "local_langs";

/// Locale identifier to (message key to translated text)
pub type LocaleTable = HashMap<String, HashMap<String, String>>;

/// Locale identifier to keys missing in that locale, in first-seen order
pub type MissingTranslations = BTreeMap<String, Vec<String>>;

#[derive(Debug, Default)]
pub struct Translator {
    locales: RwLock<LocaleTable>,
    missing: Mutex<MissingTranslations>,
}

impl Translator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a translator over an in-memory table
    pub fn with_locales(locales: LocaleTable) -> Self {
        Self {
            locales: RwLock::new(locales),
            missing: Mutex::new(MissingTranslations::new()),
        }
    }

    /// Load every `*.json` file in `dir` into the locale table.
    ///
    /// Each file is a flat object of source string to translation; the file
    /// stem is the locale id (`zh-TW.json` -> `zh-TW`). Returns the number
    /// of locales loaded.
    pub async fn load(&self, dir: impl AsRef<Path>) -> BotResult<usize> {
        let dir = dir.as_ref();
        let entries = fs::read_dir(dir).map_err(|e| {
            Error::Translation(format!("Cannot read {}: {}", dir.display(), e))
        })?;

        let mut table = LocaleTable::new();
        for entry in entries {
            let path = entry?.path();
            if path.extension().and_then(|ext| ext.to_str()) != Some("json") {
                continue;
            }
            let Some(locale) = path.file_stem().and_then(|stem| stem.to_str()) else {
                continue;
            };

            let content = fs::read_to_string(&path)?;
            let strings: HashMap<String, String> = serde_json::from_str(&content).map_err(|e| {
                Error::Translation(format!("Invalid language file {}: {}", path.display(), e))
            })?;
            table.insert(locale.to_string(), strings);
        }

        let count = table.len();
        *self.locales.write().await = table;
        info!("Loaded {} command locales from {}", count, dir.display());

        Ok(count)
    }

    /// Translate `key` for `locale`.
    ///
    /// An unknown locale yields `None` and is not recorded. A known locale
    /// without the key yields `None` and records the key once.
    pub async fn translate(&self, key: &str, locale: &str) -> Option<String> {
        let lookup = {
            let locales = self.locales.read().await;
            let strings = locales.get(locale)?;
            strings.get(key).cloned()
        };

        if lookup.is_none() {
            self.record_missing(locale, key).await;
        }

        lookup
    }

    // Check and insert happen under one guard so concurrent lookups of the
    // same pair record it once.
    async fn record_missing(&self, locale: &str, key: &str) {
        let mut missing = self.missing.lock().await;
        let keys = missing.entry(locale.to_string()).or_default();
        if !keys.iter().any(|k| k == key) {
            keys.push(key.to_string());
        }
    }

    /// Known locale ids, sorted
    pub async fn locales(&self) -> Vec<String> {
        let mut locales: Vec<String> = self.locales.read().await.keys().cloned().collect();
        locales.sort();
        locales
    }

    /// Snapshot of the missing-translation log
    pub async fn missing(&self) -> MissingTranslations {
        self.missing.lock().await.clone()
    }

    /// Log one warning per locale with outstanding missing keys
    pub async fn flush_missing(&self) {
        let missing = self.missing.lock().await;
        for (locale, keys) in missing.iter().filter(|(_, keys)| !keys.is_empty()) {
            warn!(
                "Missing translation for \"{}\" in \"{}\"",
                keys.join(", "),
                locale
            );
        }
    }

    /// Drop both tables; called on every ready event
    pub async fn reset(&self) {
        self.locales.write().await.clear();
        self.missing.lock().await.clear();
    }
}

/// Fill the name and description localizations of `commands` (and their
/// subcommands and parameters) for every loaded locale.
pub fn apply_translations<'a>(
    commands: &'a mut [poise::Command<CommandContext, Error>],
    translator: &'a Translator,
) -> BoxFuture<'a, ()> {
    Box::pin(async move {
        let locales = translator.locales().await;

        for command in commands.iter_mut() {
            for locale in &locales {
                if let Some(name) = translator.translate(&command.name, locale).await {
                    command.name_localizations.insert(locale.clone(), name);
                }
                if let Some(description) = command.description.clone() {
                    if let Some(text) = translator.translate(&description, locale).await {
                        command
                            .description_localizations
                            .insert(locale.clone(), text);
                    }
                }

                for parameter in command.parameters.iter_mut() {
                    if let Some(name) = translator.translate(&parameter.name, locale).await {
                        parameter.name_localizations.insert(locale.clone(), name);
                    }
                    if let Some(description) = parameter.description.clone() {
                        if let Some(text) = translator.translate(&description, locale).await {
                            parameter
                                .description_localizations
                                .insert(locale.clone(), text);
                        }
                    }
                }
            }

            apply_translations(&mut command.subcommands, translator).await;
        }
    })
}
