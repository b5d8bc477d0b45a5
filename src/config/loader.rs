//! Load/validate/convert pipeline and write-back.

use thiserror::Error;

use crate::config::codec::CodecError;
use crate::config::convert::{ConvertError, Converter};
use crate::config::model::Config;
use crate::config::schema::ConfigDto;
use crate::config::validation::{validate_config, ValidationError};
use crate::observability::metrics;
use crate::storage::{resolve, AccessorError, BootstrapError, BootstrapOptions, ConfigAccessor};

/// Error type for the configuration pipeline. Each variant names its stage.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error(transparent)]
    Bootstrap(#[from] BootstrapError),

    #[error("load: failed to read {location}: {source}")]
    Read {
        location: String,
        #[source]
        source: AccessorError,
    },

    #[error("decode: {location}: {source}")]
    Decode {
        location: String,
        #[source]
        source: CodecError,
    },

    #[error("validate: {location}: {source}")]
    Validation {
        location: String,
        #[source]
        source: ValidationError,
    },

    #[error("convert: {location}: {source}")]
    Convert {
        location: String,
        #[source]
        source: ConvertError,
    },

    #[error("encode: {location}: {source}")]
    Encode {
        location: String,
        #[source]
        source: CodecError,
    },

    #[error("write: failed to persist {location}: {source}")]
    Write {
        location: String,
        #[source]
        source: AccessorError,
    },
}

impl ConfigError {
    pub fn stage(&self) -> &'static str {
        match self {
            ConfigError::Bootstrap(_) => "bootstrap",
            ConfigError::Read { .. } => "load",
            ConfigError::Decode { .. } => "decode",
            ConfigError::Validation { .. } => "validate",
            ConfigError::Convert { .. } => "convert",
            ConfigError::Encode { .. } => "encode",
            ConfigError::Write { .. } => "write",
        }
    }

    /// The violated rule, when validation failed.
    pub fn validation_error(&self) -> Option<&ValidationError> {
        match self {
            ConfigError::Validation { source, .. } => Some(source),
            _ => None,
        }
    }
}

/// A decoded document together with its runtime form.
#[derive(Debug, Clone)]
pub struct Loaded {
    pub document: ConfigDto,
    pub config: Config,
}

/// Resolve the backend for `location` and run the pipeline through it.
///
/// The accessor is returned so edits can be written back to the same backend.
pub async fn load(
    location: &str,
    remote: bool,
    options: &BootstrapOptions,
) -> Result<(Config, ConfigAccessor), ConfigError> {
    let result = async {
        let accessor = resolve(location, remote, options).await?;
        let loaded = load_from(&accessor, &Converter::new(options.retry)).await?;
        Ok::<_, ConfigError>((loaded.config, accessor))
    }
    .await;

    metrics::record_config_load(result.is_ok());
    match &result {
        Ok((config, accessor)) => tracing::info!(
            location = %accessor.location(),
            clusters = config.aerospike_clusters.len(),
            storage = config.storage.len(),
            policies = config.backup_policies.len(),
            routines = config.backup_routines.len(),
            "Configuration loaded"
        ),
        Err(e) => tracing::error!(location, stage = e.stage(), error = %e, "Configuration load failed"),
    }
    result
}

/// Read, decode, validate and convert through an existing accessor.
pub async fn load_from(accessor: &ConfigAccessor, converter: &Converter) -> Result<Loaded, ConfigError> {
    let bytes = accessor.read().await.map_err(|source| ConfigError::Read {
        location: accessor.location(),
        source,
    })?;
    decode(accessor, &bytes, converter)
}

fn decode(accessor: &ConfigAccessor, bytes: &[u8], converter: &Converter) -> Result<Loaded, ConfigError> {
    let document: ConfigDto = accessor.format().decode(bytes).map_err(|source| ConfigError::Decode {
        location: accessor.location(),
        source,
    })?;
    let config = prepare(&document, converter, &accessor.location())?;
    Ok(Loaded { document, config })
}

/// Validate and convert a document. Nothing is converted unless validation passes.
pub fn prepare(document: &ConfigDto, converter: &Converter, location: &str) -> Result<Config, ConfigError> {
    validate_config(document).map_err(|source| ConfigError::Validation {
        location: location.to_string(),
        source,
    })?;
    converter.to_runtime(document).map_err(|source| ConfigError::Convert {
        location: location.to_string(),
        source,
    })
}

/// Encode `document` and write it through `accessor`.
pub async fn persist(accessor: &ConfigAccessor, document: &ConfigDto) -> Result<(), ConfigError> {
    let bytes = accessor.format().encode(document).map_err(|source| ConfigError::Encode {
        location: accessor.location(),
        source,
    })?;
    accessor.write(&bytes).await.map_err(|source| ConfigError::Write {
        location: accessor.location(),
        source,
    })?;

    tracing::info!(location = %accessor.location(), bytes = bytes.len(), "Configuration persisted");
    Ok(())
}

/// Convert a runtime snapshot back to a document and persist it.
pub async fn write_back(accessor: &ConfigAccessor, config: &Config, converter: &Converter) -> Result<ConfigDto, ConfigError> {
    let document = converter.to_dto(config).map_err(|source| ConfigError::Convert {
        location: accessor.location(),
        source,
    })?;
    persist(accessor, &document).await?;
    Ok(document)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::LocalFileAccessor;

    const VALID: &str = r#"
aerospike-clusters:
  clusterA:
    seed-nodes: [{ host-name: localhost, port: 3000 }]
storage:
  local:
    type: local
    path: /var/backups
backup-policies:
  policy: {}
backup-routines:
  daily:
    backup-policy: policy
    source-cluster: clusterA
    storage: local
    interval-cron: "@daily"
"#;

    async fn accessor_with(dir: &tempfile::TempDir, name: &str, content: &str) -> ConfigAccessor {
        let path = dir.path().join(name);
        tokio::fs::write(&path, content).await.unwrap();
        ConfigAccessor::Local(LocalFileAccessor::new(path).unwrap())
    }

    #[tokio::test]
    async fn test_load_from_local_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.yml");
        tokio::fs::write(&path, VALID).await.unwrap();

        let (config, accessor) = load(&path.to_string_lossy(), false, &BootstrapOptions::default())
            .await
            .unwrap();
        assert_eq!(config.backup_routines.len(), 1);
        assert_eq!(accessor.local_path(), Some(path.as_path()));
    }

    #[tokio::test]
    async fn test_stage_attribution() {
        let dir = tempfile::tempdir().unwrap();
        let converter = Converter::default();

        let missing = ConfigAccessor::Local(LocalFileAccessor::new(dir.path().join("missing.yml")).unwrap());
        let err = load_from(&missing, &converter).await.unwrap_err();
        assert_eq!(err.stage(), "load");
        assert!(err.to_string().contains("missing.yml"));

        let garbage = accessor_with(&dir, "garbage.json", "{ nope").await;
        assert_eq!(load_from(&garbage, &converter).await.unwrap_err().stage(), "decode");

        let invalid = accessor_with(&dir, "invalid.yml", &VALID.replace("clusterA:", "clusterB:")).await;
        let err = load_from(&invalid, &converter).await.unwrap_err();
        assert_eq!(err.stage(), "validate");
        assert!(err.validation_error().is_some());
    }

    #[tokio::test]
    async fn test_persist_then_reload() {
        let dir = tempfile::tempdir().unwrap();
        let accessor = accessor_with(&dir, "config.json", "{}").await;
        let converter = Converter::default();

        let document: ConfigDto = serde_yaml::from_str(VALID).unwrap();
        let config = prepare(&document, &converter, "inline").unwrap();
        let written = write_back(&accessor, &config, &converter).await.unwrap();

        let reloaded = load_from(&accessor, &converter).await.unwrap();
        assert_eq!(reloaded.document, written);
        assert_eq!(reloaded.document.backup_routines, document.backup_routines);
    }
}
