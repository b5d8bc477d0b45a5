//! The active configuration.
//!
//! Readers take an `Arc<Config>` snapshot and keep it for as long as they
//! need; a reload or edit builds a complete new snapshot and swaps the
//! pointer. Writers are serialised so two edits cannot interleave their
//! read-modify-write cycles. A failed reload or edit leaves the previous
//! snapshot active.

use std::sync::Arc;

use arc_swap::ArcSwap;
use thiserror::Error;
use tokio::sync::Mutex;

use crate::config::convert::Converter;
use crate::config::edit::EditError;
use crate::config::loader::{self, ConfigError};
use crate::config::model::Config;
use crate::config::schema::ConfigDto;
use crate::observability::metrics;
use crate::storage::{BootstrapOptions, ConfigAccessor};

#[derive(Debug, Error)]
pub enum UpdateError {
    #[error(transparent)]
    Edit(#[from] EditError),

    #[error(transparent)]
    Config(#[from] ConfigError),
}

pub struct ConfigHolder {
    current: ArcSwap<Config>,
    accessor: ConfigAccessor,
    converter: Converter,
    writer: Mutex<()>,
}

impl ConfigHolder {
    pub fn new(config: Config, accessor: ConfigAccessor, converter: Converter) -> Self {
        Self {
            current: ArcSwap::from_pointee(config),
            accessor,
            converter,
            writer: Mutex::new(()),
        }
    }

    /// Run the startup pipeline and hold its result.
    pub async fn load(location: &str, remote: bool, options: &BootstrapOptions) -> Result<Self, ConfigError> {
        let (config, accessor) = loader::load(location, remote, options).await?;
        Ok(Self::new(config, accessor, Converter::new(options.retry)))
    }

    /// The active snapshot.
    pub fn snapshot(&self) -> Arc<Config> {
        self.current.load_full()
    }

    pub fn accessor(&self) -> &ConfigAccessor {
        &self.accessor
    }

    pub fn converter(&self) -> &Converter {
        &self.converter
    }

    /// The active snapshot as a transport document, defaults materialised.
    pub fn document(&self) -> Result<ConfigDto, ConfigError> {
        self.converter
            .to_dto(&self.snapshot())
            .map_err(|source| ConfigError::Convert {
                location: self.accessor.location(),
                source,
            })
    }

    /// Re-read the backend and swap in the result.
    pub async fn reload(&self) -> Result<Arc<Config>, ConfigError> {
        let _guard = self.writer.lock().await;

        let result = loader::load_from(&self.accessor, &self.converter).await;
        metrics::record_config_reload(result.is_ok());

        match result {
            Ok(loaded) => {
                let config = Arc::new(loaded.config);
                self.current.store(config.clone());
                tracing::info!(location = %self.accessor.location(), "Configuration reloaded");
                Ok(config)
            }
            Err(e) => {
                tracing::error!(stage = e.stage(), error = %e, "Reload failed, keeping current configuration");
                Err(e)
            }
        }
    }

    /// Validate, convert and persist `document`, then make it active.
    pub async fn apply(&self, document: ConfigDto) -> Result<Arc<Config>, ConfigError> {
        let _guard = self.writer.lock().await;
        self.apply_locked(&document).await
    }

    /// Edit the active document in place and apply the result.
    pub async fn update<F>(&self, edit: F) -> Result<Arc<Config>, UpdateError>
    where
        F: FnOnce(&mut ConfigDto) -> Result<(), EditError>,
    {
        let _guard = self.writer.lock().await;

        let mut document = self.document()?;
        edit(&mut document)?;
        Ok(self.apply_locked(&document).await?)
    }

    /// Make an already prepared snapshot active without persisting it.
    pub fn install(&self, config: Config) -> Arc<Config> {
        let config = Arc::new(config);
        self.current.store(config.clone());
        config
    }

    async fn apply_locked(&self, document: &ConfigDto) -> Result<Arc<Config>, ConfigError> {
        let location = self.accessor.location();
        let result = async {
            let config = loader::prepare(document, &self.converter, &location)?;
            loader::persist(&self.accessor, document).await?;
            Ok::<_, ConfigError>(config)
        }
        .await;
        metrics::record_config_reload(result.is_ok());

        let config = Arc::new(result?);
        self.current.store(config.clone());
        tracing::info!(location = %location, routines = config.backup_routines.len(), "Configuration applied");
        Ok(config)
    }
}

impl std::fmt::Debug for ConfigHolder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConfigHolder")
            .field("location", &self.accessor.location())
            .field("routines", &self.snapshot().backup_routines.len())
            .finish_non_exhaustive()
    }
}
