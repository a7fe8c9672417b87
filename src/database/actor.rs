use super::{collection_key, collections, GuildSettings};
use crate::error::{database_error, BotResult};
use redis::aio::ConnectionManager;
use redis::{AsyncCommands, Client as RedisClient};
use serde_json::Value;
use tokio::sync::mpsc;
use tracing::info;

/// Commands that can be sent to the database actor
pub enum DatabaseCommand {
    GetSettings(u64, mpsc::Sender<BotResult<GuildSettings>>),
    UpdateSettings(u64, GuildSettings, mpsc::Sender<BotResult<()>>),
    GetUser(u64, mpsc::Sender<BotResult<Option<Value>>>),
    UpdateUser(u64, Value, mpsc::Sender<BotResult<()>>),
    Ping(mpsc::Sender<BotResult<()>>),
    Shutdown,
}

/// Connection entry point
pub struct Database;

impl Database {
    /// Open the connection, verify it answers `PING`, and spawn the actor
    pub async fn connect(name: &str, url: &str) -> BotResult<DatabaseHandle> {
        let client = RedisClient::open(url)
            .map_err(|e| database_error(&format!("Invalid database URL: {}", e)))?;
        let connection = ConnectionManager::new(client)
            .await
            .map_err(|e| database_error(&format!("Failed to connect to database: {}", e)))?;

        let (mut actor, handle) = DatabaseActor::new(name, connection);

        // Verify reachability before handing the connection out
        actor.ping().await?;
        info!("Successfully connected to [{}] database!", name);

        tokio::spawn(async move {
            actor.run().await;
        });

        Ok(handle)
    }
}

/// Handle for communicating with the database actor
#[derive(Clone)]
pub struct DatabaseHandle {
    command_tx: mpsc::Sender<DatabaseCommand>,
}

impl std::fmt::Debug for DatabaseHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DatabaseHandle")
            .field("closed", &self.command_tx.is_closed())
            .finish()
    }
}

impl DatabaseHandle {
    /// Create a handle with no actor behind it; every call fails
    pub fn empty() -> Self {
        let (command_tx, _) = mpsc::channel(32);
        Self { command_tx }
    }

    async fn request<T>(
        &self,
        command: impl FnOnce(mpsc::Sender<BotResult<T>>) -> DatabaseCommand,
    ) -> BotResult<T> {
        let (response_tx, mut response_rx) = mpsc::channel(1);
        self.command_tx
            .send(command(response_tx))
            .await
            .map_err(|e| database_error(&format!("Actor mailbox error: {}", e)))?;

        response_rx
            .recv()
            .await
            .ok_or_else(|| database_error("Response channel closed"))?
    }

    /// Get the settings record of a guild
    pub async fn get_settings(&self, guild_id: u64) -> BotResult<GuildSettings> {
        self.request(|tx| DatabaseCommand::GetSettings(guild_id, tx))
            .await
    }

    /// Replace the settings record of a guild
    pub async fn update_settings(&self, guild_id: u64, settings: GuildSettings) -> BotResult<()> {
        self.request(|tx| DatabaseCommand::UpdateSettings(guild_id, settings, tx))
            .await
    }

    /// Get a user record
    pub async fn get_user(&self, user_id: u64) -> BotResult<Option<Value>> {
        self.request(|tx| DatabaseCommand::GetUser(user_id, tx))
            .await
    }

    /// Replace a user record
    pub async fn update_user(&self, user_id: u64, record: Value) -> BotResult<()> {
        self.request(|tx| DatabaseCommand::UpdateUser(user_id, record, tx))
            .await
    }

    /// Check that the database still answers
    pub async fn ping(&self) -> BotResult<()> {
        self.request(DatabaseCommand::Ping).await
    }

    /// Shutdown the actor
    pub async fn shutdown(&self) -> BotResult<()> {
        let _ = self.command_tx.send(DatabaseCommand::Shutdown).await;
        Ok(())
    }
}

/// The database actor that processes messages
pub struct DatabaseActor {
    connection: ConnectionManager,
    settings_key: String,
    users_key: String,
    command_rx: mpsc::Receiver<DatabaseCommand>,
}

impl DatabaseActor {
    /// Create a new actor over an open connection and return its handle
    pub fn new(name: &str, connection: ConnectionManager) -> (Self, DatabaseHandle) {
        let (command_tx, command_rx) = mpsc::channel(32);

        let actor = Self {
            connection,
            settings_key: collection_key(name, collections::SETTINGS),
            users_key: collection_key(name, collections::USERS),
            command_rx,
        };

        (actor, DatabaseHandle { command_tx })
    }

    /// Start the actor's processing loop
    pub async fn run(&mut self) {
        info!("Database actor started");

        while let Some(cmd) = self.command_rx.recv().await {
            match cmd {
                DatabaseCommand::GetSettings(guild_id, response_tx) => {
                    let result = self.get_settings(guild_id).await;
                    let _ = response_tx.send(result).await;
                }
                DatabaseCommand::UpdateSettings(guild_id, settings, response_tx) => {
                    let result = self.update_settings(guild_id, &settings).await;
                    let _ = response_tx.send(result).await;
                }
                DatabaseCommand::GetUser(user_id, response_tx) => {
                    let result = self.get_user(user_id).await;
                    let _ = response_tx.send(result).await;
                }
                DatabaseCommand::UpdateUser(user_id, record, response_tx) => {
                    let result = self.update_user(user_id, &record).await;
                    let _ = response_tx.send(result).await;
                }
                DatabaseCommand::Ping(response_tx) => {
                    let result = self.ping().await;
                    let _ = response_tx.send(result).await;
                }
                DatabaseCommand::Shutdown => {
                    info!("Database actor shutting down");
                    break;
                }
            }
        }

        info!("Database actor shut down");
    }

    async fn ping(&mut self) -> BotResult<()> {
        let _: String = redis::cmd("PING").query_async(&mut self.connection).await?;
        Ok(())
    }

    async fn get_settings(&mut self, guild_id: u64) -> BotResult<GuildSettings> {
        let record: Option<String> = self.connection.hget(&self.settings_key, guild_id).await?;

        match record {
            Some(json) => Ok(serde_json::from_str(&json)?),
            None => Ok(GuildSettings::default()),
        }
    }

    async fn update_settings(&mut self, guild_id: u64, settings: &GuildSettings) -> BotResult<()> {
        let json = serde_json::to_string(settings)?;
        () = self
            .connection
            .hset(&self.settings_key, guild_id, json)
            .await?;
        Ok(())
    }

    async fn get_user(&mut self, user_id: u64) -> BotResult<Option<Value>> {
        let record: Option<String> = self.connection.hget(&self.users_key, user_id).await?;

        record
            .map(|json| serde_json::from_str(&json).map_err(Into::into))
            .transpose()
    }

    async fn update_user(&mut self, user_id: u64, record: &Value) -> BotResult<()> {
        () = self
            .connection
            .hset(&self.users_key, user_id, record.to_string())
            .await?;
        Ok(())
    }
}
