//! Shutdown signalling for the run loops.

use std::future::Future;
use tokio::sync::watch;
use tracing::{info, warn};

/// Spawn a task that flips the returned flag to `true` once `signal`
/// completes.
pub fn shutdown_on<F>(signal: F) -> watch::Receiver<bool>
where
    F: Future<Output = std::io::Result<()>> + Send + 'static,
{
    let (tx, rx) = watch::channel(false);
    tokio::spawn(async move {
        match signal.await {
            Ok(()) => info!("Shutdown requested"),
            Err(e) => warn!(error = %e, "Signal listener failed; shutting down"),
        }
        let _ = tx.send(true);
    });
    rx
}

/// Shutdown flag driven by Ctrl-C.
pub fn ctrl_c() -> watch::Receiver<bool> {
    shutdown_on(tokio::signal::ctrl_c())
}
