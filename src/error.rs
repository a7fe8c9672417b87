use miette::Diagnostic;
use thiserror::Error;

/// Main error type for the application
#[derive(Debug, Error, Diagnostic)]
pub enum Error {
    #[error("Discord API error: {0}")]
    #[diagnostic(code(vocard::discord_api))]
    DiscordApi(#[from] serenity::Error),

    #[error("Poise framework error: {0}")]
    #[diagnostic(code(vocard::poise))]
    Poise(#[from] Box<dyn std::error::Error + Send + Sync>),

    #[error("Environment error: {0}")]
    #[diagnostic(
        code(vocard::environment),
        help("export the variable or add it to .env before starting the bot")
    )]
    Environment(String),

    #[error("Configuration error: {0}")]
    #[diagnostic(code(vocard::config))]
    Config(String),

    #[error("Database error: {0}")]
    #[diagnostic(code(vocard::database))]
    Database(String),

    #[error("Translation error: {0}")]
    #[diagnostic(code(vocard::translation))]
    Translation(String),

    #[error("Module error: {0}")]
    #[diagnostic(code(vocard::module))]
    Module(String),

    #[error("IPC error: {0}")]
    #[diagnostic(code(vocard::ipc))]
    Ipc(String),

    /// User-facing command failure; the message is shown as is
    #[error("{0}")]
    #[diagnostic(code(vocard::command))]
    Command(String),

    #[error(transparent)]
    #[diagnostic(code(vocard::io))]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    #[diagnostic(code(vocard::serialization))]
    Serialization(String),

    #[error("Other error: {0}")]
    #[diagnostic(code(vocard::other))]
    Other(String),
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Serialization(err.to_string())
    }
}

// Implement From for TOML serialization errors
impl From<toml::ser::Error> for Error {
    fn from(err: toml::ser::Error) -> Self {
        Error::Serialization(err.to_string())
    }
}

// Implement From for TOML deserialization errors
impl From<toml::de::Error> for Error {
    fn from(err: toml::de::Error) -> Self {
        Error::Serialization(err.to_string())
    }
}

impl From<redis::RedisError> for Error {
    fn from(err: redis::RedisError) -> Self {
        Error::Database(err.to_string())
    }
}

impl From<reqwest::Error> for Error {
    fn from(err: reqwest::Error) -> Self {
        Error::Ipc(err.to_string())
    }
}

impl From<url::ParseError> for Error {
    fn from(err: url::ParseError) -> Self {
        Error::Ipc(err.to_string())
    }
}

/// Type alias for Result with our Error type
pub type BotResult<T> = Result<T, Error>;

/// Helper to create environment errors
pub fn env_error(var: &str) -> Error {
    Error::Environment(format!("Environment variable {} not set!", var))
}

/// Helper to create configuration errors
pub fn config_error(message: &str) -> Error {
    Error::Config(message.to_string())
}

/// Helper to create database errors
pub fn database_error(message: &str) -> Error {
    Error::Database(message.to_string())
}

/// Helper to create module errors
pub fn module_error(message: &str) -> Error {
    Error::Module(message.to_string())
}

/// Helper to create IPC errors
pub fn ipc_error(message: &str) -> Error {
    Error::Ipc(message.to_string())
}

/// Helper to create user-facing command errors
pub fn command_error(message: &str) -> Error {
    Error::Command(message.to_string())
}

/// Helper to create other errors
pub fn other_error(message: &str) -> Error {
    Error::Other(message.to_string())
}
