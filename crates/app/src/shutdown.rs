//! Graceful shutdown signal handling

use std::io;

use thiserror::Error;
use tokio::{signal, sync::watch};

#[derive(Debug, Error)]
pub enum ShutdownSignalError {
    #[error("failed to install Ctrl+C handler: {0}")]
    CtrlC(#[source] io::Error),

    #[cfg(unix)]
    #[error("failed to install SIGTERM handler: {0}")]
    SigTerm(#[source] io::Error),
}

/// A shutdown flag shared by background tasks. Receivers see `true` once shutdown starts.
pub fn channel() -> (watch::Sender<bool>, watch::Receiver<bool>) {
    watch::channel(false)
}

/// Resolve once `shutdown` flips to `true` or every sender is gone.
pub async fn requested(shutdown: &mut watch::Receiver<bool>) {
    // An error means the sender dropped, which also ends the task.
    let _closed = shutdown.wait_for(|stop| *stop).await;
}

/// Wait for Ctrl+C or SIGTERM, then notify every receiver.
///
/// # Errors
///
/// Returns an error if a signal handler cannot be installed.
pub async fn listen(notify: watch::Sender<bool>) -> Result<(), ShutdownSignalError> {
    let ctrl_c = async { signal::ctrl_c().await.map_err(ShutdownSignalError::CtrlC) };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .map_err(ShutdownSignalError::SigTerm)?
            .recv()
            .await;
        Ok::<(), ShutdownSignalError>(())
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<Result<(), ShutdownSignalError>>();

    tokio::select! {
        result = ctrl_c => {
            result?;
            tracing::info!("ctrl_c signal received");
        }
        result = terminate => {
            result?;
            tracing::info!("terminate signal received");
        }
    };

    notify.send_replace(true);

    Ok(())
}
