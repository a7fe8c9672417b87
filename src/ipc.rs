use crate::config::IpcSettings;
use crate::error::{ipc_error, BotResult};
use reqwest::header::AUTHORIZATION;
use reqwest::Client;
use serde_json::json;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use url::Url;

const HANDSHAKE_PATH: &str = "/api/bot/handshake";
const HEARTBEAT_PATH: &str = "/api/bot/heartbeat";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Client for the web dashboard
pub struct IpcClient {
    settings: IpcSettings,
    client: Client,
    heartbeat: Mutex<Option<JoinHandle<()>>>,
}

impl IpcClient {
    pub fn new(settings: IpcSettings) -> BotResult<Self> {
        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| ipc_error(&format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            settings,
            client,
            heartbeat: Mutex::new(None),
        })
    }

    pub fn is_enabled(&self) -> bool {
        self.settings.enable
    }

    /// Absolute URL of a dashboard endpoint
    pub fn endpoint(&self, path: &str) -> BotResult<Url> {
        let scheme = if self.settings.secure { "https" } else { "http" };
        let base = Url::parse(&format!(
            "{}://{}:{}",
            scheme, self.settings.host, self.settings.port
        ))?;
        Ok(base.join(path)?)
    }

    /// Authenticate with the dashboard and start the heartbeat.
    ///
    /// Does nothing when the client is disabled.
    pub async fn connect(&self) -> BotResult<()> {
        if !self.is_enabled() {
            debug!("IPC client disabled, not connecting");
            return Ok(());
        }

        let url = self.endpoint(HANDSHAKE_PATH)?;
        self.post(url.clone()).await?;
        info!("Connected to dashboard at {}", url);

        let interval = Duration::from_secs(self.settings.heartbeat.max(1));
        let heartbeat_url = self.endpoint(HEARTBEAT_PATH)?;
        let client = self.client.clone();
        let password = self.settings.password.clone();

        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            // First tick completes immediately
            ticker.tick().await;
            loop {
                ticker.tick().await;
                if let Err(e) = send(&client, heartbeat_url.clone(), &password).await {
                    warn!("Dashboard heartbeat failed: {}", e);
                }
            }
        });

        if let Some(previous) = self.heartbeat.lock().await.replace(handle) {
            previous.abort();
        }
        Ok(())
    }

    /// Stop the heartbeat task
    pub async fn shutdown(&self) {
        if let Some(handle) = self.heartbeat.lock().await.take() {
            handle.abort();
            info!("IPC client stopped");
        }
    }

    async fn post(&self, url: Url) -> BotResult<()> {
        send(&self.client, url, &self.settings.password).await
    }
}

async fn send(client: &Client, url: Url, password: &str) -> BotResult<()> {
    let response = client
        .post(url)
        .header(AUTHORIZATION, password)
        .json(&json!({ "version": env!("CARGO_PKG_VERSION") }))
        .send()
        .await?;

    if !response.status().is_success() {
        let status = response.status();
        let body = response
            .text()
            .await
            .unwrap_or_else(|_| "Could not read error response".to_string());
        return Err(ipc_error(&format!("HTTP {} - {}", status, body)));
    }

    Ok(())
}
