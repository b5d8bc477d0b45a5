//! Configuration persistence subsystem.
//!
//! # Data Flow
//! ```text
//! (location, remote flag)
//!     → bootstrap.rs (pick the backend)
//!         remote = false: http(s) URL → HttpAccessor, else LocalFileAccessor
//!         remote = true:  fetch storage pointer → decode → validate
//!                         → StoreProvider::open → StorageAccessor
//!     → ConfigAccessor::read() → bytes → config::loader
//!
//! On mutation:
//!     config::loader encodes → ConfigAccessor::write() (same backend)
//! ```
//!
//! # Design Decisions
//! - Closed set of backends behind one enum; the resolver is the only constructor
//! - Object storage is reached through the `ObjectStore` trait so cloud clients stay outside the crate
//! - Network calls carry their own deadline; a timeout is an error, never a partial read
//! - The local file lock is internal; callers never see it

pub mod bootstrap;
pub mod http;
pub mod local;
pub mod object;

use std::path::Path;
use std::time::Duration;

use thiserror::Error;

use crate::config::codec::Format;

pub use bootstrap::{resolve, BootstrapError, BootstrapOptions};
pub use http::HttpAccessor;
pub use local::LocalFileAccessor;
pub use object::{LocalObjectStore, LocalStoreProvider, ObjectStore, StorageAccessor, StoreProvider};

/// Default deadline for a single backend operation.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Errors raised by configuration backends.
#[derive(Debug, Error)]
pub enum AccessorError {
    #[error("invalid location {location:?}: {reason}")]
    InvalidLocation { location: String, reason: String },

    #[error("{location}: not found")]
    NotFound { location: String },

    #[error("{location}: {source}")]
    Io {
        location: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{url}: request failed: {source}")]
    Http {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("{url}: unexpected HTTP status {status}")]
    Status { url: String, status: u16 },

    #[error("{location}: timed out after {after:?}")]
    Timeout { location: String, after: Duration },

    #[error("{location}: {operation} is not supported by this backend")]
    Unsupported {
        location: String,
        operation: &'static str,
    },
}

impl AccessorError {
    pub(crate) fn io(location: impl Into<String>, source: std::io::Error) -> Self {
        let location = location.into();
        if source.kind() == std::io::ErrorKind::NotFound {
            AccessorError::NotFound { location }
        } else {
            AccessorError::Io { location, source }
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, AccessorError::NotFound { .. })
    }

    /// Whether retrying the same call may succeed.
    pub fn is_transient(&self) -> bool {
        match self {
            AccessorError::Http { .. } | AccessorError::Timeout { .. } => true,
            AccessorError::Status { status, .. } => *status >= 500 || *status == 429,
            _ => false,
        }
    }
}

/// A configuration backend.
#[derive(Debug)]
pub enum ConfigAccessor {
    Local(LocalFileAccessor),
    Http(HttpAccessor),
    Storage(StorageAccessor),
}

impl ConfigAccessor {
    /// Read the whole configuration blob.
    pub async fn read(&self) -> Result<Vec<u8>, AccessorError> {
        match self {
            ConfigAccessor::Local(accessor) => accessor.read().await,
            ConfigAccessor::Http(accessor) => accessor.read().await,
            ConfigAccessor::Storage(accessor) => accessor.read().await,
        }
    }

    /// Replace the configuration blob.
    pub async fn write(&self, bytes: &[u8]) -> Result<(), AccessorError> {
        match self {
            ConfigAccessor::Local(accessor) => accessor.write(bytes).await,
            ConfigAccessor::Http(accessor) => accessor.write(bytes).await,
            ConfigAccessor::Storage(accessor) => accessor.write(bytes).await,
        }
    }

    /// Human-readable location, used in error messages and logs.
    pub fn location(&self) -> String {
        match self {
            ConfigAccessor::Local(accessor) => accessor.path().display().to_string(),
            ConfigAccessor::Http(accessor) => accessor.url().to_string(),
            ConfigAccessor::Storage(accessor) => accessor.location(),
        }
    }

    /// Serialization format of the blob behind this backend.
    pub fn format(&self) -> Format {
        match self {
            ConfigAccessor::Local(accessor) => Format::for_location(&accessor.path().to_string_lossy()),
            ConfigAccessor::Http(accessor) => Format::for_location(accessor.url().path()),
            ConfigAccessor::Storage(accessor) => Format::for_location(accessor.key()),
        }
    }

    /// File path, when the configuration lives on the local filesystem.
    pub fn local_path(&self) -> Option<&Path> {
        match self {
            ConfigAccessor::Local(accessor) => Some(accessor.path()),
            _ => None,
        }
    }

    pub fn is_writable(&self) -> bool {
        !matches!(self, ConfigAccessor::Http(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_found_is_distinguished() {
        let err = AccessorError::io("conf.yml", std::io::Error::from(std::io::ErrorKind::NotFound));
        assert!(err.is_not_found());

        let err = AccessorError::io("conf.yml", std::io::Error::from(std::io::ErrorKind::PermissionDenied));
        assert!(matches!(err, AccessorError::Io { .. }));
    }

    #[test]
    fn test_transient_errors() {
        let status = |status| AccessorError::Status {
            url: "http://host/conf.yml".into(),
            status,
        };
        assert!(status(503).is_transient());
        assert!(status(429).is_transient());
        assert!(!status(404).is_transient());
        assert!(AccessorError::Timeout {
            location: "x".into(),
            after: Duration::from_secs(1)
        }
        .is_transient());
        assert!(!AccessorError::NotFound { location: "x".into() }.is_transient());
    }

    #[test]
    fn test_format_follows_location() {
        let json = ConfigAccessor::Local(LocalFileAccessor::new("conf/config.json").unwrap());
        assert_eq!(json.format(), Format::Json);
        assert!(json.local_path().is_some());
        assert!(json.is_writable());

        let url = url::Url::parse("https://host/conf.yml?token=abc").unwrap();
        let http = ConfigAccessor::Http(HttpAccessor::new(url, DEFAULT_TIMEOUT, Default::default()).unwrap());
        assert_eq!(http.format(), Format::Yaml);
        assert!(http.local_path().is_none());
        assert!(!http.is_writable());
    }
}
