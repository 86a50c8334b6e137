// src/engine/signals.rs

use tokio::task::JoinHandle;
use tracing::{info, warn};

use super::session::{SessionHandle, ShutdownReason};

/// Forward the first Ctrl-C (or SIGTERM on unix) to the session as a quit
/// request.
pub fn spawn_signal_listener(handle: SessionHandle) -> JoinHandle<()> {
    tokio::spawn(async move {
        let Some(signal) = wait_for_termination().await else {
            return;
        };
        info!(signal, "termination signal received");
        if handle.quit(ShutdownReason::Signal(signal)).await.is_err() {
            warn!(signal, "session already finished; ignoring signal");
        }
    })
}

#[cfg(unix)]
async fn wait_for_termination() -> Option<&'static str> {
    use tokio::signal::unix::{SignalKind, signal};

    let mut sigterm = match signal(SignalKind::terminate()) {
        Ok(s) => s,
        Err(e) => {
            warn!(error = %e, "failed to listen for SIGTERM; only Ctrl-C will stop the session");
            return ctrl_c().await;
        }
    };

    tokio::select! {
        sig = ctrl_c() => sig,
        _ = sigterm.recv() => Some("SIGTERM"),
    }
}

#[cfg(not(unix))]
async fn wait_for_termination() -> Option<&'static str> {
    ctrl_c().await
}

async fn ctrl_c() -> Option<&'static str> {
    match tokio::signal::ctrl_c().await {
        Ok(()) => Some("SIGINT"),
        Err(e) => {
            warn!(error = %e, "failed to listen for Ctrl-C");
            None
        }
    }
}
