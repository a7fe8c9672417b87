#[macro_use]
extern crate rust_i18n;

pub mod commands;
pub mod config;
pub mod database;
pub mod error;
pub mod framework;
pub mod ipc;
pub mod logging;
pub mod modules;
pub mod prefix;
pub mod router;
pub mod shortcut;
pub mod shutdown;
pub mod startup;
pub mod translator;
pub mod utils;
pub mod voicelink;
pub mod web;

// Initialize i18n
i18n!("locales", fallback = "en");
