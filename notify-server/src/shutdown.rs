//! Signal handling for graceful shutdown.

use tokio::signal::unix::{SignalKind, signal};
use tokio::sync::watch;
use tokio::task::JoinHandle;

/// Completes when SIGTERM or SIGINT (Ctrl+C) is received.
///
/// A signal whose handler cannot be installed is logged and never fires.
pub async fn shutdown_signal() {
    tokio::select! {
        _ = wait_for(SignalKind::terminate(), "SIGTERM") => {
            tracing::info!("Received SIGTERM, initiating graceful shutdown");
        }
        _ = wait_for(SignalKind::interrupt(), "SIGINT") => {
            tracing::info!("Received SIGINT, initiating graceful shutdown");
        }
    }
}

async fn wait_for(kind: SignalKind, name: &'static str) {
    match signal(kind) {
        Ok(mut stream) => {
            stream.recv().await;
        }
        Err(e) => {
            tracing::error!(signal = name, error = %e, "Failed to install signal handler");
            std::future::pending::<()>().await;
        }
    }
}

/// Tell every worker to stop and wait for the in-flight ticks to finish.
pub async fn stop_workers(shutdown_tx: watch::Sender<bool>, handles: Vec<JoinHandle<()>>) {
    // Workers that already exited have dropped their receivers.
    let _ = shutdown_tx.send(true);

    for handle in handles {
        if let Err(e) = handle.await {
            tracing::error!(error = %e, "Delivery worker task failed");
        }
    }
    tracing::info!("All delivery workers stopped");
}
