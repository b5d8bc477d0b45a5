//! Storage-backed configuration access.
//!
//! A [`Storage`] descriptor names a backend and the object holding the
//! configuration document. The backend itself is reached through the
//! [`ObjectStore`] trait; [`StoreProvider`] builds one from a descriptor.
//! The crate ships a filesystem store; cloud stores are supplied by the
//! embedding service.

use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use crate::config::model::Storage;
use crate::storage::AccessorError;

/// Minimal get/put interface over a storage backend.
#[async_trait]
pub trait ObjectStore: Send + Sync + fmt::Debug {
    async fn get(&self, key: &str) -> Result<Vec<u8>, AccessorError>;

    async fn put(&self, key: &str, bytes: &[u8]) -> Result<(), AccessorError>;

    /// Short backend description for logs, e.g. `local` or `s3://bucket`.
    fn describe(&self) -> String;
}

/// Builds an [`ObjectStore`] for a storage descriptor.
pub trait StoreProvider: Send + Sync {
    fn open(&self, storage: &Storage) -> Result<Arc<dyn ObjectStore>, AccessorError>;
}

/// Filesystem store. Keys are paths, resolved against `root` when set.
#[derive(Debug, Clone, Default)]
pub struct LocalObjectStore {
    root: Option<PathBuf>,
}

impl LocalObjectStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: Some(root.into()),
        }
    }

    fn resolve(&self, key: &str) -> PathBuf {
        match &self.root {
            Some(root) => root.join(key.trim_start_matches('/')),
            None => PathBuf::from(key),
        }
    }
}

#[async_trait]
impl ObjectStore for LocalObjectStore {
    async fn get(&self, key: &str) -> Result<Vec<u8>, AccessorError> {
        let path = self.resolve(key);
        tokio::fs::read(&path)
            .await
            .map_err(|e| AccessorError::io(path.display().to_string(), e))
    }

    async fn put(&self, key: &str, bytes: &[u8]) -> Result<(), AccessorError> {
        let path = self.resolve(key);
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| AccessorError::io(parent.display().to_string(), e))?;
        }
        tokio::fs::write(&path, bytes)
            .await
            .map_err(|e| AccessorError::io(path.display().to_string(), e))
    }

    fn describe(&self) -> String {
        match &self.root {
            Some(root) => format!("local:{}", root.display()),
            None => "local".to_string(),
        }
    }
}

/// Provider that only knows the local filesystem.
#[derive(Debug, Clone, Copy, Default)]
pub struct LocalStoreProvider;

impl StoreProvider for LocalStoreProvider {
    fn open(&self, storage: &Storage) -> Result<Arc<dyn ObjectStore>, AccessorError> {
        match storage {
            Storage::Local { .. } => Ok(Arc::new(LocalObjectStore::default())),
            other => Err(AccessorError::Unsupported {
                location: other.path().to_string(),
                operation: "object storage access without a configured provider",
            }),
        }
    }
}

/// Reads and writes the configuration as one object of a store.
#[derive(Debug, Clone)]
pub struct StorageAccessor {
    store: Arc<dyn ObjectStore>,
    key: String,
    timeout: Duration,
}

impl StorageAccessor {
    pub fn new(store: Arc<dyn ObjectStore>, key: impl Into<String>, timeout: Duration) -> Self {
        Self {
            store,
            key: key.into(),
            timeout,
        }
    }

    /// Accessor for the object named by `storage.path()`.
    pub fn for_storage(
        storage: &Storage,
        provider: &dyn StoreProvider,
        timeout: Duration,
    ) -> Result<Self, AccessorError> {
        let key = storage.path();
        if key.is_empty() {
            return Err(AccessorError::InvalidLocation {
                location: String::new(),
                reason: "storage path is empty".to_string(),
            });
        }
        Ok(Self::new(provider.open(storage)?, key, timeout))
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn location(&self) -> String {
        format!("{}:{}", self.store.describe(), self.key)
    }

    pub async fn read(&self) -> Result<Vec<u8>, AccessorError> {
        match tokio::time::timeout(self.timeout, self.store.get(&self.key)).await {
            Ok(result) => result,
            Err(_) => Err(AccessorError::Timeout {
                location: self.location(),
                after: self.timeout,
            }),
        }
    }

    pub async fn write(&self, bytes: &[u8]) -> Result<(), AccessorError> {
        match tokio::time::timeout(self.timeout, self.store.put(&self.key, bytes)).await {
            Ok(result) => result,
            Err(_) => Err(AccessorError::Timeout {
                location: self.location(),
                after: self.timeout,
            }),
        }
    }
}
