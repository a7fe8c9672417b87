use crate::database::DatabaseHandle;
use crate::ipc::IpcClient;
use std::sync::Arc;
use tokio::sync::oneshot;
use tracing::{error, info};

#[cfg(unix)]
use tokio::signal::unix::{signal, SignalKind};

/// Wait for a termination signal, then stop the background services
pub async fn handle_signals(
    shutdown_send: oneshot::Sender<()>,
    database: DatabaseHandle,
    ipc: Arc<IpcClient>,
) {
    // Wait for a termination signal
    wait_for_signal().await;

    ipc.shutdown().await;

    // Shut down database actor
    if let Err(e) = database.shutdown().await {
        error!("Error shutting down database actor: {:?}", e);
    } else {
        info!("Database actor shut down successfully");
    }

    // Send shutdown signal to main task
    let _ = shutdown_send.send(());
}

#[cfg(unix)]
async fn wait_for_signal() {
    // Handle SIGTERM (sent by the hosting platform when stopping the service)
    match signal(SignalKind::terminate()) {
        Ok(mut sigterm) => {
            tokio::select! {
                _ = sigterm.recv() => {
                    info!("Received SIGTERM signal, initiating graceful shutdown");
                }
                _ = wait_for_ctrl_c() => {}
            }
        }
        Err(e) => {
            error!("Failed to create SIGTERM signal handler: {}", e);
            wait_for_ctrl_c().await;
        }
    }
}

#[cfg(not(unix))]
async fn wait_for_signal() {
    wait_for_ctrl_c().await;
}

async fn wait_for_ctrl_c() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => info!("Received Ctrl+C signal, initiating graceful shutdown"),
        Err(e) => {
            error!("Failed to listen for Ctrl+C: {}", e);
            // Without a signal source, only the client ending stops the bot
            std::future::pending::<()>().await;
        }
    }
}
