use crate::error::BotResult;
use axum::{routing::get, Router};
use std::net::SocketAddr;
use tokio::task::JoinHandle;
use tracing::{error, info};

/// Port used when `PORT` is unset or invalid
pub const DEFAULT_PORT: u16 = 10000;

async fn index_handler() -> &'static str {
    "Bot is running!"
}

/// Routes of the liveness endpoint
pub fn router() -> Router {
    Router::new().route("/", get(index_handler))
}

/// Port from the `PORT` environment variable
pub fn port_from_env() -> u16 {
    std::env::var("PORT")
        .ok()
        .and_then(|p| p.parse::<u16>().ok())
        .unwrap_or(DEFAULT_PORT)
}

/// Bind the liveness endpoint on all interfaces and serve it in the background
pub async fn start(port: u16) -> BotResult<JoinHandle<()>> {
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("Liveness endpoint listening on {}", addr);

    Ok(tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, router()).await {
            error!("Liveness endpoint stopped: {}", e);
        }
    }))
}
