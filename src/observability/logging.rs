//! Structured logging.
//!
//! # Responsibilities
//! - Initialize the global tracing subscriber from the `service.logger` block
//! - PLAIN (human) or JSON (machine) line format
//!
//! # Design Decisions
//! - `RUST_LOG`, when set, replaces the configured level entirely
//! - Initialization failures are returned, never panicked on

use tracing_subscriber::filter::ParseError;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::{SubscriberInitExt, TryInitError};
use tracing_subscriber::{EnvFilter, Layer};

use thiserror::Error;

use crate::config::model::{LogFormat, LogLevel, LoggerConfig};

#[derive(Debug, Error)]
pub enum LoggingError {
    #[error("invalid log filter {directive:?}: {source}")]
    Filter {
        directive: String,
        #[source]
        source: ParseError,
    },

    #[error("failed to install log subscriber: {0}")]
    Install(#[from] TryInitError),
}

fn level_directive(level: LogLevel) -> &'static str {
    match level {
        LogLevel::Trace => "trace",
        LogLevel::Debug => "debug",
        LogLevel::Info => "info",
        LogLevel::Warn => "warn",
        LogLevel::Error => "error",
    }
}

/// Filter directive for `config`, honouring `env_override` (the value of `RUST_LOG`).
pub fn filter_directive(config: &LoggerConfig, env_override: Option<&str>) -> String {
    match env_override.map(str::trim).filter(|v| !v.is_empty()) {
        Some(directive) => directive.to_string(),
        None => level_directive(config.level).to_string(),
    }
}

/// Build the filter for `config`.
pub fn build_filter(config: &LoggerConfig, env_override: Option<&str>) -> Result<EnvFilter, LoggingError> {
    let directive = filter_directive(config, env_override);
    EnvFilter::try_new(&directive).map_err(|source| LoggingError::Filter { directive, source })
}

/// Install the global subscriber.
pub fn init_logging(config: &LoggerConfig) -> Result<(), LoggingError> {
    let env_override = std::env::var(EnvFilter::DEFAULT_ENV).ok();
    let filter = build_filter(config, env_override.as_deref())?;

    let layer = tracing_subscriber::fmt::layer();
    let layer = match config.format {
        LogFormat::Plain => layer.boxed(),
        LogFormat::Json => layer.json().boxed(),
    };

    tracing_subscriber::registry()
        .with(layer.with_filter(filter))
        .try_init()?;

    tracing::debug!(level = %config.level, format = %config.format, "Logging initialized");
    Ok(())
}
