//! Service startup.

use std::sync::Arc;

use thiserror::Error;
use tokio::net::TcpListener;

use crate::config::watcher::{reload_on_change, ConfigWatcher};
use crate::config::{ConfigError, ConfigHolder};
use crate::http::{AppState, HttpServer};
use crate::jobs::JobRegistry;
use crate::lifecycle::shutdown::Shutdown;
use crate::lifecycle::signals::{handle_signals, Signals};
use crate::observability::{logging, metrics};
use crate::security::{AdmissionControl, AllowListError};
use crate::storage::BootstrapOptions;

#[derive(Debug, Error)]
pub enum StartupError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Logging(#[from] logging::LoggingError),

    #[error("invalid allow-list: {0}")]
    AllowList(#[from] AllowListError),

    #[error("failed to bind {address}: {source}")]
    Bind {
        address: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to watch configuration file: {0}")]
    Watch(#[from] notify::Error),

    #[error("failed to register signal handlers: {0}")]
    Signals(#[source] std::io::Error),

    #[error("server error: {0}")]
    Serve(#[source] std::io::Error),
}

/// Command-line settings.
#[derive(Debug, Clone)]
pub struct StartupOptions {
    /// Path or URL of the configuration document.
    pub config: String,
    /// Treat `config` as a storage pointer.
    pub remote: bool,
    /// Overrides `service.http.address` when set.
    pub host: Option<String>,
    /// Overrides `service.http.port` when set.
    pub port: Option<u16>,
}

/// Load the configuration and serve until a shutdown signal arrives.
pub async fn run(options: StartupOptions) -> Result<(), StartupError> {
    let holder = Arc::new(ConfigHolder::load(&options.config, options.remote, &BootstrapOptions::default()).await?);
    let config = holder.snapshot();

    logging::init_logging(&config.service.logger)?;
    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        location = %holder.accessor().location(),
        "backup-service starting"
    );

    let prometheus = match metrics::install_recorder() {
        Ok(handle) => Some(handle),
        Err(e) => {
            tracing::warn!(error = %e, "Metrics recorder not installed");
            None
        }
    };

    let mut http = config.service.http.clone();
    if let Some(host) = options.host {
        http.address = host;
    }
    if let Some(port) = options.port {
        http.port = port;
    }

    let admission = Arc::new(AdmissionControl::new(&http.rate)?);
    let address = http.bind_address();
    let listener = TcpListener::bind(&address)
        .await
        .map_err(|source| StartupError::Bind { address, source })?;

    let shutdown = Shutdown::new();

    // Dropping the watcher handle stops notifications.
    let _watcher = match holder.accessor().local_path() {
        Some(path) => {
            let (watcher, changes) = ConfigWatcher::new(path);
            let handle = watcher.run()?;
            tokio::spawn(reload_on_change(changes, holder.clone(), shutdown.subscribe()));
            Some(handle)
        }
        None => None,
    };

    let signals = Signals::new().map_err(StartupError::Signals)?;
    tokio::spawn(handle_signals(signals, shutdown.clone(), holder.clone()));

    let state = AppState {
        holder,
        jobs: Arc::new(JobRegistry::new()),
        admission,
        metrics: prometheus,
    };
    let server = HttpServer::new(state, &http);
    let result = server.run(listener, &shutdown).await;

    shutdown.trigger();
    result.map_err(StartupError::Serve)?;

    tracing::info!("Shutdown complete");
    Ok(())
}
