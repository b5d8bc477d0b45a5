//! OS signal handling.
//!
//! # Design Decisions
//! - Uses Tokio's signal handling (async-safe)
//! - SIGTERM and Ctrl+C trigger graceful shutdown
//! - SIGHUP triggers a config reload, not shutdown

use std::sync::Arc;

use crate::config::ConfigHolder;
use crate::lifecycle::shutdown::Shutdown;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignalEvent {
    Shutdown,
    Reload,
}

/// Registered signal streams.
pub struct Signals {
    #[cfg(unix)]
    terminate: tokio::signal::unix::Signal,
    #[cfg(unix)]
    hangup: tokio::signal::unix::Signal,
}

impl Signals {
    pub fn new() -> std::io::Result<Self> {
        #[cfg(unix)]
        {
            use tokio::signal::unix::{signal, SignalKind};
            Ok(Self {
                terminate: signal(SignalKind::terminate())?,
                hangup: signal(SignalKind::hangup())?,
            })
        }
        #[cfg(not(unix))]
        {
            Ok(Self {})
        }
    }

    pub async fn recv(&mut self) -> SignalEvent {
        #[cfg(unix)]
        {
            tokio::select! {
                _ = tokio::signal::ctrl_c() => SignalEvent::Shutdown,
                _ = self.terminate.recv() => SignalEvent::Shutdown,
                _ = self.hangup.recv() => SignalEvent::Reload,
            }
        }
        #[cfg(not(unix))]
        {
            let _ = tokio::signal::ctrl_c().await;
            SignalEvent::Shutdown
        }
    }
}

/// Reload on SIGHUP; trigger `shutdown` on the first termination signal.
pub async fn handle_signals(mut signals: Signals, shutdown: Shutdown, holder: Arc<ConfigHolder>) {
    let mut stopped = shutdown.subscribe();
    loop {
        let event = tokio::select! {
            event = signals.recv() => event,
            _ = stopped.recv() => return,
        };
        match event {
            SignalEvent::Reload => {
                tracing::info!("SIGHUP received, reloading configuration");
                if let Err(e) = holder.reload().await {
                    tracing::warn!(error = %e, "Reload on SIGHUP failed");
                }
            }
            SignalEvent::Shutdown => {
                tracing::info!("Shutdown signal received");
                shutdown.trigger();
                return;
            }
        }
    }
}
