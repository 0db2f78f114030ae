use std::future::Future;
use std::io;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Wait for `signal` and return its name. If the handler could not be
/// installed, log it and never resolve.
async fn named_signal<F>(name: &'static str, signal: F) -> &'static str
where
    F: Future<Output = io::Result<()>>,
{
    match signal.await {
        Ok(()) => name,
        Err(e) => {
            warn!("Cannot listen for {}: {}", name, e);
            std::future::pending().await
        }
    }
}

#[cfg(unix)]
async fn sigterm() -> io::Result<()> {
    use tokio::signal::unix::{signal, SignalKind};

    signal(SignalKind::terminate())?.recv().await;
    Ok(())
}

#[cfg(not(unix))]
async fn sigterm() -> io::Result<()> {
    std::future::pending().await
}

/// Resolves on the first SIGINT (Ctrl+C) or SIGTERM.
pub async fn shutdown_signal() {
    let received = tokio::select! {
        name = named_signal("SIGINT", tokio::signal::ctrl_c()) => name,
        name = named_signal("SIGTERM", sigterm()) => name,
    };
    info!("Received {}", received);
}

/// Cancel `cancel` once `trigger` resolves. Returns early if the token is
/// cancelled by someone else first.
pub async fn watch<F>(trigger: F, cancel: CancellationToken)
where
    F: Future<Output = ()>,
{
    tokio::select! {
        _ = trigger => {
            info!("Shutting down...");
            cancel.cancel();
        }
        _ = cancel.cancelled() => {}
    }
}

/// Spawn the watcher that turns process signals into cancellation.
pub fn spawn_watcher(cancel: CancellationToken) -> JoinHandle<()> {
    tokio::spawn(watch(shutdown_signal(), cancel))
}
