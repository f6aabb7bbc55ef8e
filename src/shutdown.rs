//! Process shutdown coordination.
//!
//! [`ShutdownSignal`] resolves once on Ctrl-C, SIGTERM or a programmatic
//! [`trigger`](ShutdownSignal::trigger). Clones share the same state, so the
//! HTTP server and the bus can each wait on their own copy.

use tokio::sync::watch;
use tracing::{error, info};

#[derive(Clone)]
pub struct ShutdownSignal {
    sender: watch::Sender<bool>,
}

impl Default for ShutdownSignal {
    fn default() -> Self {
        Self::new()
    }
}

impl ShutdownSignal {
    pub fn new() -> Self {
        let (sender, _) = watch::channel(false);
        Self { sender }
    }

    /// Trigger shutdown manually (tests, programmatic stop).
    pub fn trigger(&self) {
        info!("shutdown triggered programmatically");
        self.sender.send_replace(true);
    }

    pub fn is_shutdown(&self) -> bool {
        *self.sender.borrow()
    }

    /// Resolve once shutdown has been triggered.
    pub async fn recv(&self) {
        let mut receiver = self.sender.subscribe();
        // Err means the sender is gone, which only happens when every clone
        // has been dropped; treat it as shutdown.
        let _ = receiver.wait_for(|stopped| *stopped).await;
    }

    /// Wait for Ctrl-C or SIGTERM (or a manual trigger), then notify every
    /// clone.
    pub async fn listen_for_signals(&self) {
        tokio::select! {
            _ = ctrl_c() => info!("received Ctrl-C, initiating graceful shutdown"),
            _ = terminate() => info!("received SIGTERM, initiating graceful shutdown"),
            _ = self.recv() => {}
        }
        self.sender.send_replace(true);
    }
}

async fn ctrl_c() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!(error = %e, "failed to install Ctrl-C handler");
        std::future::pending::<()>().await;
    }
}

#[cfg(unix)]
async fn terminate() {
    use tokio::signal::unix::{signal, SignalKind};

    match signal(SignalKind::terminate()) {
        Ok(mut stream) => {
            stream.recv().await;
        }
        Err(e) => {
            error!(error = %e, "failed to install SIGTERM handler");
            std::future::pending::<()>().await;
        }
    }
}

#[cfg(not(unix))]
async fn terminate() {
    std::future::pending::<()>().await;
}
