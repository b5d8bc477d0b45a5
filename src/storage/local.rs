//! Local file backend.

use std::path::{Path, PathBuf};

use tokio::sync::Mutex;

use crate::storage::AccessorError;

/// Reads and writes one configuration file.
///
/// Reads and writes through the same accessor are serialised. Other
/// processes writing the file are not coordinated with.
#[derive(Debug)]
pub struct LocalFileAccessor {
    path: PathBuf,
    lock: Mutex<()>,
}

impl LocalFileAccessor {
    pub fn new(path: impl Into<PathBuf>) -> Result<Self, AccessorError> {
        let path = path.into();
        if path.as_os_str().is_empty() {
            return Err(AccessorError::InvalidLocation {
                location: String::new(),
                reason: "configuration file path is empty".to_string(),
            });
        }
        Ok(Self {
            path,
            lock: Mutex::new(()),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub async fn read(&self) -> Result<Vec<u8>, AccessorError> {
        let _guard = self.lock.lock().await;
        tokio::fs::read(&self.path)
            .await
            .map_err(|e| AccessorError::io(self.path.display().to_string(), e))
    }

    /// Replace the file contents. The new contents are written to a sibling
    /// temporary file and renamed into place.
    pub async fn write(&self, bytes: &[u8]) -> Result<(), AccessorError> {
        let _guard = self.lock.lock().await;
        let location = self.path.display().to_string();

        let mut tmp = self.path.clone().into_os_string();
        tmp.push(".tmp");
        let tmp = PathBuf::from(tmp);

        tokio::fs::write(&tmp, bytes)
            .await
            .map_err(|e| AccessorError::io(location.clone(), e))?;
        if let Err(e) = tokio::fs::rename(&tmp, &self.path).await {
            let _ = tokio::fs::remove_file(&tmp).await;
            return Err(AccessorError::io(location, e));
        }

        tracing::debug!(path = %self.path.display(), bytes = bytes.len(), "Configuration file written");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_empty_path_is_configuration_error() {
        let err = LocalFileAccessor::new("").unwrap_err();
        assert!(matches!(err, AccessorError::InvalidLocation { .. }));
    }

    #[tokio::test]
    async fn test_read_write() {
        let dir = tempfile::tempdir().unwrap();
        let accessor = LocalFileAccessor::new(dir.path().join("config.yml")).unwrap();

        assert!(accessor.read().await.unwrap_err().is_not_found());

        accessor.write(b"service: {}\n").await.unwrap();
        assert_eq!(accessor.read().await.unwrap(), b"service: {}\n");

        accessor.write(b"storage: {}\n").await.unwrap();
        assert_eq!(accessor.read().await.unwrap(), b"storage: {}\n");
        assert!(!dir.path().join("config.yml.tmp").exists());
    }

    #[tokio::test]
    async fn test_failed_rename_removes_temporary_file() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("config.yml");
        // A non-empty directory in the way makes the rename fail.
        std::fs::create_dir(&target).unwrap();
        std::fs::write(target.join("keep"), b"x").unwrap();

        let accessor = LocalFileAccessor::new(&target).unwrap();
        assert!(accessor.write(b"service: {}\n").await.is_err());
        assert!(!dir.path().join("config.yml.tmp").exists());
    }

    #[tokio::test]
    async fn test_concurrent_writes_never_interleave() {
        let dir = tempfile::tempdir().unwrap();
        let accessor = Arc::new(LocalFileAccessor::new(dir.path().join("config.json")).unwrap());

        let a = vec![b'a'; 64 * 1024];
        let b = vec![b'b'; 64 * 1024];

        let mut handles = Vec::new();
        for i in 0..16 {
            let accessor = accessor.clone();
            let payload = if i % 2 == 0 { a.clone() } else { b.clone() };
            handles.push(tokio::spawn(async move {
                accessor.write(&payload).await.unwrap();
                let read = accessor.read().await.unwrap();
                assert!(read.iter().all(|c| *c == read[0]));
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        let content = accessor.read().await.unwrap();
        assert_eq!(content.len(), 64 * 1024);
    }
}
