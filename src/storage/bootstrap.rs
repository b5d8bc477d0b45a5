//! Backend selection.
//!
//! Without the remote flag the location itself is the configuration: an
//! `http`/`https` URL is fetched, anything else is a local file. With the
//! remote flag the location holds a storage-pointer document, a single
//! storage entry with no wrapping key, which names where the real
//! configuration lives.

use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use url::Url;

use crate::config::codec::CodecError;
use crate::config::convert::{ConvertError, Converter};
use crate::config::schema::StorageDto;
use crate::config::validation::{validate_storage, ValidationError};
use crate::resilience::RetryPolicy;
use crate::storage::object::{LocalStoreProvider, StorageAccessor, StoreProvider};
use crate::storage::{AccessorError, ConfigAccessor, HttpAccessor, LocalFileAccessor, DEFAULT_TIMEOUT};

/// Name used for the storage-pointer entity in error messages.
const POINTER_NAME: &str = "storage-pointer";

#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error("bootstrap: cannot open {location:?}: {source}")]
    Open {
        location: String,
        #[source]
        source: AccessorError,
    },

    #[error("bootstrap: failed to load storage pointer from {location}: {source}")]
    Load {
        location: String,
        #[source]
        source: AccessorError,
    },

    #[error("bootstrap: failed to decode storage pointer from {location}: {source}")]
    Decode {
        location: String,
        #[source]
        source: CodecError,
    },

    #[error("bootstrap: invalid storage pointer in {location}: {source}")]
    Validate {
        location: String,
        #[source]
        source: ValidationError,
    },

    #[error("bootstrap: invalid storage pointer in {location}: {source}")]
    Convert {
        location: String,
        #[source]
        source: ConvertError,
    },
}

/// Knobs for backend construction.
#[derive(Clone)]
pub struct BootstrapOptions {
    /// Deadline for each network or object-store operation.
    pub timeout: Duration,
    /// Retry policy for HTTP fetches.
    pub retry: RetryPolicy,
    /// Opens object stores named by storage pointers.
    pub provider: Arc<dyn StoreProvider>,
}

impl Default for BootstrapOptions {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_TIMEOUT,
            retry: RetryPolicy::default(),
            provider: Arc::new(LocalStoreProvider),
        }
    }
}

impl std::fmt::Debug for BootstrapOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BootstrapOptions")
            .field("timeout", &self.timeout)
            .field("retry", &self.retry)
            .finish_non_exhaustive()
    }
}

/// `Some(url)` when `location` is an absolute http(s) URL.
pub fn http_url(location: &str) -> Option<Url> {
    Url::parse(location)
        .ok()
        .filter(|url| matches!(url.scheme(), "http" | "https"))
}

fn direct(location: &str, options: &BootstrapOptions) -> Result<ConfigAccessor, AccessorError> {
    match http_url(location) {
        Some(url) => Ok(ConfigAccessor::Http(HttpAccessor::new(url, options.timeout, options.retry)?)),
        None => Ok(ConfigAccessor::Local(LocalFileAccessor::new(location)?)),
    }
}

/// Pick the backend for `location`.
pub async fn resolve(location: &str, remote: bool, options: &BootstrapOptions) -> Result<ConfigAccessor, BootstrapError> {
    let pointer = direct(location, options).map_err(|source| BootstrapError::Open {
        location: location.to_string(),
        source,
    })?;

    if !remote {
        tracing::debug!(location, backend = backend_name(&pointer), "Configuration backend selected");
        return Ok(pointer);
    }

    let bytes = pointer.read().await.map_err(|source| BootstrapError::Load {
        location: location.to_string(),
        source,
    })?;

    let dto: StorageDto = pointer.format().decode(&bytes).map_err(|source| BootstrapError::Decode {
        location: location.to_string(),
        source,
    })?;

    validate_storage(POINTER_NAME, &dto).map_err(|source| BootstrapError::Validate {
        location: location.to_string(),
        source,
    })?;

    let storage = Converter::default()
        .storage(POINTER_NAME, &dto)
        .map_err(|source| BootstrapError::Convert {
            location: location.to_string(),
            source,
        })?;

    let accessor = StorageAccessor::for_storage(&storage, options.provider.as_ref(), options.timeout).map_err(
        |source| BootstrapError::Open {
            location: storage.path().to_string(),
            source,
        },
    )?;

    tracing::info!(
        pointer = location,
        storage_type = %storage.storage_type(),
        location = %accessor.location(),
        "Remote configuration backend selected"
    );
    Ok(ConfigAccessor::Storage(accessor))
}

fn backend_name(accessor: &ConfigAccessor) -> &'static str {
    match accessor {
        ConfigAccessor::Local(_) => "local",
        ConfigAccessor::Http(_) => "http",
        ConfigAccessor::Storage(_) => "storage",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::codec::Format;

    #[tokio::test]
    async fn test_direct_selection() {
        let options = BootstrapOptions::default();

        let accessor = resolve("conf/config.yml", false, &options).await.unwrap();
        assert!(matches!(accessor, ConfigAccessor::Local(_)));

        let accessor = resolve("https://config.example/config.yml", false, &options).await.unwrap();
        assert!(matches!(accessor, ConfigAccessor::Http(_)));

        let accessor = resolve("ftp://config.example/config.yml", false, &options).await.unwrap();
        assert!(matches!(accessor, ConfigAccessor::Local(_)));
    }

    #[tokio::test]
    async fn test_empty_location_is_rejected() {
        let err = resolve("", false, &BootstrapOptions::default()).await.unwrap_err();
        assert!(matches!(
            err,
            BootstrapError::Open {
                source: AccessorError::InvalidLocation { .. },
                ..
            }
        ));
    }

    #[tokio::test]
    async fn test_remote_pointer_to_local_file() {
        let dir = tempfile::tempdir().unwrap();
        let config_path = dir.path().join("config.json");
        tokio::fs::write(&config_path, br#"{"storage": {}}"#).await.unwrap();

        let pointer_path = dir.path().join("pointer.yml");
        let pointer = format!("type: local\npath: {}\n", config_path.display());
        tokio::fs::write(&pointer_path, pointer).await.unwrap();

        let accessor = resolve(&pointer_path.to_string_lossy(), true, &BootstrapOptions::default())
            .await
            .unwrap();
        assert!(matches!(accessor, ConfigAccessor::Storage(_)));
        assert_eq!(accessor.format(), Format::Json);
        assert_eq!(accessor.read().await.unwrap(), br#"{"storage": {}}"#);
    }

    #[tokio::test]
    async fn test_remote_errors_name_the_stage() {
        let dir = tempfile::tempdir().unwrap();
        let options = BootstrapOptions::default();

        let missing = dir.path().join("missing.yml");
        let err = resolve(&missing.to_string_lossy(), true, &options).await.unwrap_err();
        assert!(matches!(err, BootstrapError::Load { .. }));

        let garbage = dir.path().join("garbage.yml");
        tokio::fs::write(&garbage, "type: [unterminated").await.unwrap();
        let err = resolve(&garbage.to_string_lossy(), true, &options).await.unwrap_err();
        assert!(matches!(err, BootstrapError::Decode { .. }));

        let no_region = dir.path().join("s3.yml");
        tokio::fs::write(&no_region, "type: aws-s3\npath: s3://bucket/config.yml\n").await.unwrap();
        let err = resolve(&no_region.to_string_lossy(), true, &options).await.unwrap_err();
        assert!(matches!(err, BootstrapError::Validate { .. }));
        assert!(err.to_string().contains("s3-region"));

        let s3 = dir.path().join("s3-ok.yml");
        tokio::fs::write(&s3, "type: aws-s3\npath: s3://bucket/config.yml\ns3-region: us-east-1\n")
            .await
            .unwrap();
        let err = resolve(&s3.to_string_lossy(), true, &options).await.unwrap_err();
        assert!(matches!(
            err,
            BootstrapError::Open {
                source: AccessorError::Unsupported { .. },
                ..
            }
        ));
    }
}
