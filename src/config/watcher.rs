//! Configuration file watcher for hot reload.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use notify::{Config, Event, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::{broadcast, mpsc};

use crate::config::holder::ConfigHolder;

/// Quiet period after a change before reloading; editors often write in several steps.
const DEBOUNCE: Duration = Duration::from_millis(250);

/// A watcher that monitors the configuration file for changes.
pub struct ConfigWatcher {
    path: PathBuf,
    change_tx: mpsc::UnboundedSender<()>,
}

impl ConfigWatcher {
    /// Create a new ConfigWatcher.
    ///
    /// Returns the watcher and a receiver that yields one item per detected change.
    pub fn new(path: &Path) -> (Self, mpsc::UnboundedReceiver<()>) {
        let (change_tx, change_rx) = mpsc::unbounded_channel();

        (
            Self {
                path: path.to_path_buf(),
                change_tx,
            },
            change_rx,
        )
    }

    /// Start watching. The returned handle must be kept alive.
    ///
    /// The parent directory is watched rather than the file, so the watch
    /// survives the file being replaced by rename.
    pub fn run(self) -> Result<RecommendedWatcher, notify::Error> {
        let tx = self.change_tx.clone();
        let file_name = self.path.file_name().map(|name| name.to_os_string());
        let directory = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };

        let mut watcher = RecommendedWatcher::new(
            move |res: notify::Result<Event>| match res {
                Ok(event) => {
                    let relevant = event.kind.is_modify() || event.kind.is_create();
                    let ours = event
                        .paths
                        .iter()
                        .any(|p| p.file_name().map(|n| n.to_os_string()) == file_name);
                    if relevant && ours {
                        let _ = tx.send(());
                    }
                }
                Err(e) => tracing::error!("Watch error: {:?}", e),
            },
            Config::default().with_poll_interval(Duration::from_secs(2)),
        )?;

        watcher.watch(&directory, RecursiveMode::NonRecursive)?;

        tracing::info!(path = ?self.path, "Config watcher started");
        Ok(watcher)
    }
}

/// Reload `holder` whenever a change arrives, until shutdown.
pub async fn reload_on_change(
    mut changes: mpsc::UnboundedReceiver<()>,
    holder: Arc<ConfigHolder>,
    mut shutdown: broadcast::Receiver<()>,
) {
    loop {
        tokio::select! {
            change = changes.recv() => {
                if change.is_none() {
                    break;
                }
                tokio::time::sleep(DEBOUNCE).await;
                while changes.try_recv().is_ok() {}

                tracing::info!("Config file change detected, reloading...");
                if let Err(e) = holder.reload().await {
                    tracing::error!("Failed to reload config: {}. Keeping current configuration.", e);
                }
            }
            _ = shutdown.recv() => break,
        }
    }
    tracing::debug!("Config watcher stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lifecycle::shutdown::Shutdown;
    use crate::storage::BootstrapOptions;

    const DOCUMENT: &str = "storage:\n  local:\n    type: local\n    path: /a\n";

    #[tokio::test]
    async fn test_change_triggers_reload() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.yml");
        tokio::fs::write(&path, DOCUMENT).await.unwrap();

        let holder = Arc::new(
            ConfigHolder::load(&path.to_string_lossy(), false, &BootstrapOptions::default())
                .await
                .unwrap(),
        );
        let shutdown = Shutdown::new();
        let (watcher, changes) = ConfigWatcher::new(&path);
        let task = tokio::spawn(reload_on_change(changes, holder.clone(), shutdown.subscribe()));

        // Drive the channel directly; filesystem notification latency varies by platform.
        watcher.change_tx.send(()).unwrap();
        tokio::fs::write(&path, format!("{DOCUMENT}  other:\n    type: local\n    path: /b\n"))
            .await
            .unwrap();
        watcher.change_tx.send(()).unwrap();

        let mut reloaded = false;
        for _ in 0..50 {
            tokio::time::sleep(Duration::from_millis(50)).await;
            if holder.snapshot().storage.len() == 2 {
                reloaded = true;
                break;
            }
        }
        assert!(reloaded);

        shutdown.trigger();
        task.await.unwrap();
    }

    #[tokio::test]
    async fn test_invalid_change_keeps_snapshot() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.yml");
        tokio::fs::write(&path, DOCUMENT).await.unwrap();

        let holder = Arc::new(
            ConfigHolder::load(&path.to_string_lossy(), false, &BootstrapOptions::default())
                .await
                .unwrap(),
        );
        let before = holder.snapshot();
        let shutdown = Shutdown::new();
        let (watcher, changes) = ConfigWatcher::new(&path);
        let task = tokio::spawn(reload_on_change(changes, holder.clone(), shutdown.subscribe()));

        tokio::fs::write(&path, "storage:\n  local:\n    type: tape\n").await.unwrap();
        watcher.change_tx.send(()).unwrap();
        tokio::time::sleep(DEBOUNCE * 3).await;

        assert!(Arc::ptr_eq(&before, &holder.snapshot()));
        drop(watcher);
        shutdown.trigger();
        task.await.unwrap();
    }
}
