//! Conversion between the transport document and the runtime model.
//!
//! Transport → runtime applies defaults, types every enumeration and
//! replaces names with `Arc` handles. Entities without references
//! (clusters, storage, policies, secret agents) are built first; routines
//! last. Runtime → transport is the inverse and materialises defaults
//! explicitly; fields of storage types other than the selected one are
//! dropped.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;

use crate::config::model::{
    AerospikeCluster, AuthMode, BackupPolicy, BackupRoutine, CompressionMode, CompressionPolicy,
    Config, ConnectionType, Credentials, EncryptionKey, EncryptionMode, EncryptionPolicy,
    ExistsAction, GcpStorage, HttpServerConfig, LogFormat, LogLevel, LoggerConfig,
    NamespaceMapping, PartitionRange, RateLimiterConfig, RemoveFiles, RestorePolicy, S3LogLevel,
    S3Storage, SecretAgent, SeedNode, ServiceConfig, Storage, StorageType, TlsConfig,
};
use crate::config::schedule::CronSchedule;
use crate::config::schema::{
    AerospikeClusterDto, BackupPolicyDto, BackupRoutineDto, CompressionPolicyDto, ConfigDto,
    CredentialsDto, EncryptionPolicyDto, HttpServerDto, LoggerDto, PartitionRangeDto,
    RateLimiterDto, RestoreNamespaceDto, RestorePolicyDto, RetryPolicyDto, SecretAgentDto,
    SeedNodeDto, ServiceDto, StorageDto, TlsDto,
};
use crate::config::validation::EntityKind;
use crate::resilience::RetryPolicy;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConvertError {
    #[error("{kind} {name:?}: field {field}: {reason}")]
    InvalidValue {
        kind: EntityKind,
        name: String,
        field: &'static str,
        reason: String,
    },

    #[error("backup routine {routine:?}: {target} {reference:?} does not exist")]
    UnknownReference {
        routine: String,
        target: EntityKind,
        reference: String,
    },

    #[error("backup routine {routine:?}: referenced {target} is not registered in this configuration")]
    DanglingHandle { routine: String, target: EntityKind },
}

/// Transport ⇄ runtime converter.
///
/// Carries the retry policy used wherever a document omits one.
#[derive(Debug, Clone, Copy, Default)]
pub struct Converter {
    default_retry: RetryPolicy,
}

/// Convert with the built-in defaults.
pub fn to_runtime(dto: &ConfigDto) -> Result<Config, ConvertError> {
    Converter::default().to_runtime(dto)
}

/// Inverse of [`to_runtime`].
pub fn to_dto(config: &Config) -> Result<ConfigDto, ConvertError> {
    Converter::default().to_dto(config)
}

struct Field<'a> {
    kind: EntityKind,
    name: &'a str,
}

impl Field<'_> {
    fn error(&self, field: &'static str, reason: impl Into<String>) -> ConvertError {
        ConvertError::InvalidValue {
            kind: self.kind,
            name: self.name.to_string(),
            field,
            reason: reason.into(),
        }
    }

    fn int<T: TryFrom<i64>>(&self, field: &'static str, value: i64) -> Result<T, ConvertError> {
        T::try_from(value).map_err(|_| self.error(field, format!("{value} is out of range")))
    }

    fn opt_int<T: TryFrom<i64>>(&self, field: &'static str, value: Option<i64>) -> Result<Option<T>, ConvertError> {
        value.map(|v| self.int(field, v)).transpose()
    }

    fn millis(&self, field: &'static str, value: Option<i64>) -> Result<Option<Duration>, ConvertError> {
        Ok(self.opt_int::<u64>(field, value)?.map(Duration::from_millis))
    }

    fn enumeration<T>(
        &self,
        field: &'static str,
        value: Option<&str>,
        parse: fn(&str) -> Option<T>,
        default: T,
    ) -> Result<T, ConvertError> {
        match value {
            None => Ok(default),
            Some(text) => parse(text).ok_or_else(|| self.error(field, format!("unknown value {text:?}"))),
        }
    }

    fn required(&self, field: &'static str, value: Option<&String>) -> Result<String, ConvertError> {
        value.cloned().ok_or_else(|| self.error(field, "is required"))
    }
}

fn millis_of(duration: Option<Duration>) -> Option<i64> {
    duration.map(|d| i64::try_from(d.as_millis()).unwrap_or(i64::MAX))
}

fn flag(value: bool) -> Option<bool> {
    Some(value)
}

impl Converter {
    pub fn new(default_retry: RetryPolicy) -> Self {
        Self { default_retry }
    }

    pub fn default_retry(&self) -> RetryPolicy {
        self.default_retry
    }

    pub fn to_runtime(&self, dto: &ConfigDto) -> Result<Config, ConvertError> {
        let service = self.service(&dto.service)?;

        let aerospike_clusters = dto
            .aerospike_clusters
            .iter()
            .map(|(name, c)| Ok((name.clone(), Arc::new(self.cluster(name, c)?))))
            .collect::<Result<BTreeMap<_, _>, ConvertError>>()?;
        let storage = dto
            .storage
            .iter()
            .map(|(name, s)| Ok((name.clone(), Arc::new(self.storage(name, s)?))))
            .collect::<Result<BTreeMap<_, _>, ConvertError>>()?;
        let backup_policies = dto
            .backup_policies
            .iter()
            .map(|(name, p)| Ok((name.clone(), Arc::new(self.backup_policy(name, p)?))))
            .collect::<Result<BTreeMap<_, _>, ConvertError>>()?;
        let secret_agents = dto
            .secret_agents
            .iter()
            .map(|(name, a)| Ok((name.clone(), Arc::new(self.secret_agent(name, a)?))))
            .collect::<Result<BTreeMap<_, _>, ConvertError>>()?;

        let mut config = Config {
            service,
            aerospike_clusters,
            storage,
            backup_policies,
            backup_routines: BTreeMap::new(),
            secret_agents,
        };

        for (name, routine) in &dto.backup_routines {
            let converted = self.routine(name, routine, &config)?;
            config.backup_routines.insert(name.clone(), Arc::new(converted));
        }

        Ok(config)
    }

    pub fn service(&self, dto: &ServiceDto) -> Result<ServiceConfig, ConvertError> {
        let f = Field {
            kind: EntityKind::Service,
            name: "http",
        };
        let http = &dto.http;
        let rate = match &http.rate {
            Some(rate) => RateLimiterConfig {
                tps: f.opt_int("rate.tps", rate.tps)?.unwrap_or(RateLimiterConfig::DEFAULT_TPS),
                size: f.opt_int("rate.size", rate.size)?.unwrap_or(RateLimiterConfig::DEFAULT_SIZE),
                white_list: rate.white_list.clone(),
            },
            None => RateLimiterConfig::default(),
        };

        let http = HttpServerConfig {
            address: http
                .address
                .clone()
                .unwrap_or_else(|| HttpServerConfig::DEFAULT_ADDRESS.to_string()),
            port: f.opt_int("port", http.port)?.unwrap_or(HttpServerConfig::DEFAULT_PORT),
            context_path: http
                .context_path
                .clone()
                .unwrap_or_else(|| HttpServerConfig::DEFAULT_CONTEXT_PATH.to_string()),
            timeout: f.millis("timeout", http.timeout)?.filter(|d| !d.is_zero()),
            rate,
        };

        let f = Field {
            kind: EntityKind::Service,
            name: "logger",
        };
        let defaults = LoggerConfig::default();
        let logger = LoggerConfig {
            level: f.enumeration("level", dto.logger.level.as_deref(), LogLevel::parse, defaults.level)?,
            format: f.enumeration("format", dto.logger.format.as_deref(), LogFormat::parse, defaults.format)?,
        };

        Ok(ServiceConfig { http, logger })
    }

    pub fn cluster(&self, name: &str, dto: &AerospikeClusterDto) -> Result<AerospikeCluster, ConvertError> {
        let f = Field {
            kind: EntityKind::Cluster,
            name,
        };

        let seed_nodes = dto
            .seed_nodes
            .iter()
            .map(|node| {
                Ok(SeedNode {
                    host: node.host_name.clone(),
                    port: f.int("seed-nodes.port", node.port)?,
                    tls_name: node.tls_name.clone(),
                })
            })
            .collect::<Result<Vec<_>, ConvertError>>()?;

        let credentials = dto
            .credentials
            .as_ref()
            .map(|c| {
                Ok(Credentials {
                    user: c.user.clone(),
                    password: c.password.clone(),
                    password_path: c.password_path.as_ref().map(PathBuf::from),
                    auth_mode: f.enumeration(
                        "credentials.auth-mode",
                        c.auth_mode.as_deref(),
                        AuthMode::parse,
                        AuthMode::Internal,
                    )?,
                })
            })
            .transpose()?;

        let tls = dto.tls.as_ref().map(|t| TlsConfig {
            ca_file: t.ca_file.as_ref().map(PathBuf::from),
            cert_file: t.cert_file.as_ref().map(PathBuf::from),
            key_file: t.key_file.as_ref().map(PathBuf::from),
            name: t.name.clone(),
        });

        Ok(AerospikeCluster {
            label: dto.label.clone(),
            seed_nodes,
            conn_timeout: f.millis("conn-timeout", dto.conn_timeout)?,
            use_services_alternate: dto.use_services_alternate.unwrap_or(false),
            credentials,
            tls,
            max_parallel_scans: f.opt_int("max-parallel-scans", dto.max_parallel_scans)?,
        })
    }

    pub fn storage(&self, name: &str, dto: &StorageDto) -> Result<Storage, ConvertError> {
        let f = Field {
            kind: EntityKind::Storage,
            name,
        };
        let type_tag = f.required("type", dto.storage_type.as_ref())?;
        let storage_type =
            StorageType::parse(&type_tag).ok_or_else(|| f.error("type", format!("unknown value {type_tag:?}")))?;
        let path = f.required("path", dto.path.as_ref())?;

        Ok(match storage_type {
            StorageType::Local => Storage::Local {
                path: PathBuf::from(path),
            },
            StorageType::AwsS3 => Storage::S3(S3Storage {
                path,
                region: f.required("s3-region", dto.s3_region.as_ref())?,
                profile: dto.s3_profile.clone(),
                endpoint_override: dto.s3_endpoint_override.clone(),
                log_level: dto
                    .s3_log_level
                    .as_deref()
                    .map(|level| {
                        S3LogLevel::parse(level)
                            .ok_or_else(|| f.error("s3-log-level", format!("unknown value {level:?}")))
                    })
                    .transpose()?,
                min_part_size: f.opt_int("min-part-size", dto.min_part_size)?,
                max_async_connections: f.opt_int("max-async-connections", dto.max_async_connections)?,
            }),
            StorageType::GcpStorage => Storage::Gcp(GcpStorage {
                path,
                endpoint_override: dto.endpoint_override.clone(),
            }),
        })
    }

    pub fn backup_policy(&self, name: &str, dto: &BackupPolicyDto) -> Result<BackupPolicy, ConvertError> {
        let f = Field {
            kind: EntityKind::BackupPolicy,
            name,
        };

        Ok(BackupPolicy {
            parallel: f.opt_int("parallel", dto.parallel)?,
            socket_timeout: f.millis("socket-timeout", dto.socket_timeout)?,
            total_timeout: f.millis("total-timeout", dto.total_timeout)?,
            max_retries: f.opt_int("max-retries", dto.max_retries)?,
            retry_delay: f.millis("retry-delay", dto.retry_delay)?,
            records_per_second: f.opt_int("records-per-second", dto.records_per_second)?,
            bandwidth: f.opt_int("bandwidth", dto.bandwidth)?,
            file_limit: f.opt_int("file-limit", dto.file_limit)?,
            remove_files: f.enumeration(
                "remove-files",
                dto.remove_files.as_deref(),
                RemoveFiles::parse,
                RemoveFiles::KeepAll,
            )?,
            no_records: dto.no_records.unwrap_or(false),
            no_indexes: dto.no_indexes.unwrap_or(false),
            no_udfs: dto.no_udfs.unwrap_or(false),
            sealed: dto.sealed.unwrap_or(false),
            encryption: encryption(&f, dto.encryption.as_ref())?,
            compression: compression(&f, dto.compression.as_ref())?,
            retry_policy: self.retry_policy(&f, dto.retry_policy.as_ref())?,
        })
    }

    pub fn secret_agent(&self, name: &str, dto: &SecretAgentDto) -> Result<SecretAgent, ConvertError> {
        let f = Field {
            kind: EntityKind::SecretAgent,
            name,
        };
        let connection = f.required("connection-type", dto.connection_type.as_ref())?;

        Ok(SecretAgent {
            connection_type: ConnectionType::parse(&connection)
                .ok_or_else(|| f.error("connection-type", format!("unknown value {connection:?}")))?,
            address: f.required("address", dto.address.as_ref())?,
            port: f.opt_int("port", dto.port)?,
            timeout: f.millis("timeout", dto.timeout)?,
            ca_file_content: dto.ca_file_content.clone(),
            is_base64: dto.is_base64.unwrap_or(false),
        })
    }

    /// Resolve a routine against the already converted entities of `config`.
    pub fn routine(&self, name: &str, dto: &BackupRoutineDto, config: &Config) -> Result<BackupRoutine, ConvertError> {
        let f = Field {
            kind: EntityKind::BackupRoutine,
            name,
        };
        let unknown = |target, reference: &str| ConvertError::UnknownReference {
            routine: name.to_string(),
            target,
            reference: reference.to_string(),
        };

        let backup_policy = config
            .backup_policies
            .get(&dto.backup_policy)
            .cloned()
            .ok_or_else(|| unknown(EntityKind::BackupPolicy, &dto.backup_policy))?;
        let source_cluster = config
            .aerospike_clusters
            .get(&dto.source_cluster)
            .cloned()
            .ok_or_else(|| unknown(EntityKind::Cluster, &dto.source_cluster))?;
        let storage = config
            .storage
            .get(&dto.storage)
            .cloned()
            .ok_or_else(|| unknown(EntityKind::Storage, &dto.storage))?;
        let secret_agent = dto
            .secret_agent
            .as_ref()
            .map(|agent| {
                config
                    .secret_agents
                    .get(agent)
                    .cloned()
                    .ok_or_else(|| unknown(EntityKind::SecretAgent, agent))
            })
            .transpose()?;

        let cron = |field, expression: &str| {
            CronSchedule::parse(expression).map_err(|e| f.error(field, e.to_string()))
        };

        Ok(BackupRoutine {
            backup_policy,
            source_cluster,
            storage,
            secret_agent,
            interval_cron: cron("interval-cron", &dto.interval_cron)?,
            incr_interval_cron: dto
                .incr_interval_cron
                .as_deref()
                .map(|expression| cron("incr-interval-cron", expression))
                .transpose()?,
            namespaces: dto.namespaces.clone(),
            set_list: dto.set_list.clone(),
            bin_list: dto.bin_list.clone(),
            prefer_racks: dto
                .prefer_racks
                .iter()
                .map(|rack| f.int("prefer-racks", *rack))
                .collect::<Result<_, _>>()?,
            partition_list: dto
                .partition_list
                .iter()
                .map(|range| {
                    Ok(PartitionRange {
                        begin: f.int("partition-list.begin", range.begin)?,
                        count: f.int("partition-list.count", range.count)?,
                    })
                })
                .collect::<Result<_, ConvertError>>()?,
        })
    }

    /// Convert a restore request's policy.
    pub fn restore_policy(&self, dto: &RestorePolicyDto) -> Result<RestorePolicy, ConvertError> {
        let f = Field {
            kind: EntityKind::RestorePolicy,
            name: "restore",
        };

        let exists_action = match (dto.replace.unwrap_or(false), dto.unique.unwrap_or(false)) {
            (true, true) => return Err(f.error("replace", "replace and unique are mutually exclusive")),
            (true, false) => ExistsAction::Replace,
            (false, true) => ExistsAction::CreateOnly,
            (false, false) => ExistsAction::Update,
        };

        let namespace = dto
            .namespace
            .as_ref()
            .map(|ns| {
                Ok(NamespaceMapping {
                    source: f.required("namespace.source", ns.source.as_ref())?,
                    destination: f.required("namespace.destination", ns.destination.as_ref())?,
                })
            })
            .transpose()?;

        Ok(RestorePolicy {
            parallel: f.opt_int("parallel", dto.parallel)?,
            no_records: dto.no_records.unwrap_or(false),
            no_indexes: dto.no_indexes.unwrap_or(false),
            no_udfs: dto.no_udfs.unwrap_or(false),
            timeout: f.millis("timeout", dto.timeout)?,
            batch_size: f.opt_int("batch-size", dto.batch_size)?,
            max_async_batches: f.opt_int("max-async-batches", dto.max_async_batches)?,
            disable_batch_writes: dto.disable_batch_writes.unwrap_or(false),
            bandwidth: f.opt_int("bandwidth", dto.bandwidth)?,
            tps: f.opt_int("tps", dto.tps)?,
            namespace,
            set_list: dto.set_list.clone(),
            bin_list: dto.bin_list.clone(),
            exists_action,
            no_generation: dto.no_generation.unwrap_or(false),
            encryption: encryption(&f, dto.encryption.as_ref())?,
            compression: compression(&f, dto.compression.as_ref())?,
            retry_policy: self.retry_policy(&f, dto.retry_policy.as_ref())?,
        })
    }

    fn retry_policy(&self, f: &Field<'_>, dto: Option<&RetryPolicyDto>) -> Result<RetryPolicy, ConvertError> {
        let Some(dto) = dto else {
            return Ok(self.default_retry);
        };
        let base: u64 = f.int("retry-policy.base-timeout", dto.base_timeout)?;
        Ok(RetryPolicy::new(
            Duration::from_millis(base),
            dto.multiplier,
            f.int("retry-policy.max-retries", dto.max_retries)?,
        ))
    }

    pub fn to_dto(&self, config: &Config) -> Result<ConfigDto, ConvertError> {
        let mut backup_routines = BTreeMap::new();
        for (name, routine) in &config.backup_routines {
            backup_routines.insert(name.clone(), routine_dto(name, routine, config)?);
        }

        Ok(ConfigDto {
            service: service_dto(&config.service),
            aerospike_clusters: config
                .aerospike_clusters
                .iter()
                .map(|(name, c)| (name.clone(), cluster_dto(c)))
                .collect(),
            storage: config
                .storage
                .iter()
                .map(|(name, s)| (name.clone(), storage_dto(s)))
                .collect(),
            backup_policies: config
                .backup_policies
                .iter()
                .map(|(name, p)| (name.clone(), backup_policy_dto(p)))
                .collect(),
            backup_routines,
            secret_agents: config
                .secret_agents
                .iter()
                .map(|(name, a)| (name.clone(), secret_agent_dto(a)))
                .collect(),
        })
    }
}

fn encryption(f: &Field<'_>, dto: Option<&EncryptionPolicyDto>) -> Result<EncryptionPolicy, ConvertError> {
    let Some(dto) = dto else {
        return Ok(EncryptionPolicy::none());
    };
    let mode = f.enumeration("encryption.mode", dto.mode.as_deref(), EncryptionMode::parse, EncryptionMode::None)?;
    if mode == EncryptionMode::None {
        return Ok(EncryptionPolicy::none());
    }

    let key = if let Some(file) = &dto.key_file {
        EncryptionKey::File(PathBuf::from(file))
    } else if let Some(env) = &dto.key_env {
        EncryptionKey::Env(env.clone())
    } else if let Some(secret) = &dto.key_secret {
        EncryptionKey::Secret(secret.clone())
    } else {
        return Err(f.error("encryption", format!("mode {mode} requires a key source")));
    };

    Ok(EncryptionPolicy { mode, key: Some(key) })
}

fn compression(f: &Field<'_>, dto: Option<&CompressionPolicyDto>) -> Result<CompressionPolicy, ConvertError> {
    let Some(dto) = dto else {
        return Ok(CompressionPolicy::none());
    };
    Ok(CompressionPolicy {
        mode: f.enumeration("compression.mode", dto.mode.as_deref(), CompressionMode::parse, CompressionMode::None)?,
        level: f.opt_int("compression.level", dto.level)?.unwrap_or(0),
    })
}

fn service_dto(service: &ServiceConfig) -> ServiceDto {
    let http = &service.http;
    ServiceDto {
        http: HttpServerDto {
            address: Some(http.address.clone()),
            port: Some(i64::from(http.port)),
            context_path: Some(http.context_path.clone()),
            timeout: millis_of(http.timeout),
            rate: Some(RateLimiterDto {
                tps: Some(i64::from(http.rate.tps)),
                size: Some(i64::from(http.rate.size)),
                white_list: http.rate.white_list.clone(),
            }),
        },
        logger: LoggerDto {
            level: Some(service.logger.level.to_string()),
            format: Some(service.logger.format.to_string()),
        },
    }
}

fn cluster_dto(cluster: &AerospikeCluster) -> AerospikeClusterDto {
    AerospikeClusterDto {
        label: cluster.label.clone(),
        seed_nodes: cluster
            .seed_nodes
            .iter()
            .map(|node| SeedNodeDto {
                host_name: node.host.clone(),
                port: i64::from(node.port),
                tls_name: node.tls_name.clone(),
            })
            .collect(),
        conn_timeout: millis_of(cluster.conn_timeout),
        use_services_alternate: flag(cluster.use_services_alternate),
        credentials: cluster.credentials.as_ref().map(|c| CredentialsDto {
            user: c.user.clone(),
            password: c.password.clone(),
            password_path: c.password_path.as_ref().map(|p| p.display().to_string()),
            auth_mode: Some(c.auth_mode.to_string()),
        }),
        tls: cluster.tls.as_ref().map(|t| TlsDto {
            ca_file: t.ca_file.as_ref().map(|p| p.display().to_string()),
            cert_file: t.cert_file.as_ref().map(|p| p.display().to_string()),
            key_file: t.key_file.as_ref().map(|p| p.display().to_string()),
            name: t.name.clone(),
        }),
        max_parallel_scans: cluster.max_parallel_scans.map(i64::from),
    }
}

fn storage_dto(storage: &Storage) -> StorageDto {
    let mut dto = StorageDto {
        storage_type: Some(storage.storage_type().to_string()),
        ..Default::default()
    };
    match storage {
        Storage::Local { path } => {
            dto.path = Some(path.display().to_string());
        }
        Storage::S3(s3) => {
            dto.path = Some(s3.path.clone());
            dto.s3_region = Some(s3.region.clone());
            dto.s3_profile = s3.profile.clone();
            dto.s3_endpoint_override = s3.endpoint_override.clone();
            dto.s3_log_level = s3.log_level.map(|level| level.to_string());
            dto.min_part_size = s3.min_part_size.map(|size| i64::try_from(size).unwrap_or(i64::MAX));
            dto.max_async_connections = s3.max_async_connections.map(i64::from);
        }
        Storage::Gcp(gcp) => {
            dto.path = Some(gcp.path.clone());
            dto.endpoint_override = gcp.endpoint_override.clone();
        }
    }
    dto
}

fn encryption_dto(policy: &EncryptionPolicy) -> EncryptionPolicyDto {
    let mut dto = EncryptionPolicyDto {
        mode: Some(policy.mode.to_string()),
        ..Default::default()
    };
    match &policy.key {
        Some(EncryptionKey::File(path)) => dto.key_file = Some(path.display().to_string()),
        Some(EncryptionKey::Env(name)) => dto.key_env = Some(name.clone()),
        Some(EncryptionKey::Secret(secret)) => dto.key_secret = Some(secret.clone()),
        None => {}
    }
    dto
}

fn compression_dto(policy: &CompressionPolicy) -> CompressionPolicyDto {
    CompressionPolicyDto {
        mode: Some(policy.mode.to_string()),
        level: Some(i64::from(policy.level)),
    }
}

fn retry_policy_dto(policy: &RetryPolicy) -> RetryPolicyDto {
    RetryPolicyDto {
        base_timeout: i64::try_from(policy.base_timeout().as_millis()).unwrap_or(i64::MAX),
        multiplier: policy.multiplier,
        max_retries: i64::from(policy.max_retries),
    }
}

fn backup_policy_dto(policy: &BackupPolicy) -> BackupPolicyDto {
    BackupPolicyDto {
        parallel: policy.parallel.map(i64::from),
        socket_timeout: millis_of(policy.socket_timeout),
        total_timeout: millis_of(policy.total_timeout),
        max_retries: policy.max_retries.map(i64::from),
        retry_delay: millis_of(policy.retry_delay),
        records_per_second: policy.records_per_second.map(i64::from),
        bandwidth: policy.bandwidth.map(|b| i64::try_from(b).unwrap_or(i64::MAX)),
        file_limit: policy.file_limit.map(|l| i64::try_from(l).unwrap_or(i64::MAX)),
        remove_files: Some(policy.remove_files.to_string()),
        no_records: flag(policy.no_records),
        no_indexes: flag(policy.no_indexes),
        no_udfs: flag(policy.no_udfs),
        sealed: flag(policy.sealed),
        encryption: Some(encryption_dto(&policy.encryption)),
        compression: Some(compression_dto(&policy.compression)),
        retry_policy: Some(retry_policy_dto(&policy.retry_policy)),
    }
}

fn secret_agent_dto(agent: &SecretAgent) -> SecretAgentDto {
    SecretAgentDto {
        connection_type: Some(agent.connection_type.to_string()),
        address: Some(agent.address.clone()),
        port: agent.port.map(i64::from),
        timeout: millis_of(agent.timeout),
        ca_file_content: agent.ca_file_content.clone(),
        is_base64: flag(agent.is_base64),
    }
}

fn routine_dto(name: &str, routine: &BackupRoutine, config: &Config) -> Result<BackupRoutineDto, ConvertError> {
    let dangling = |target| ConvertError::DanglingHandle {
        routine: name.to_string(),
        target,
    };

    let secret_agent = routine
        .secret_agent
        .as_ref()
        .map(|agent| {
            config
                .secret_agent_name(agent)
                .map(str::to_string)
                .ok_or_else(|| dangling(EntityKind::SecretAgent))
        })
        .transpose()?;

    Ok(BackupRoutineDto {
        backup_policy: config
            .policy_name(&routine.backup_policy)
            .ok_or_else(|| dangling(EntityKind::BackupPolicy))?
            .to_string(),
        source_cluster: config
            .cluster_name(&routine.source_cluster)
            .ok_or_else(|| dangling(EntityKind::Cluster))?
            .to_string(),
        storage: config
            .storage_name(&routine.storage)
            .ok_or_else(|| dangling(EntityKind::Storage))?
            .to_string(),
        secret_agent,
        interval_cron: routine.interval_cron.as_str().to_string(),
        incr_interval_cron: routine.incr_interval_cron.as_ref().map(|c| c.as_str().to_string()),
        namespaces: routine.namespaces.clone(),
        set_list: routine.set_list.clone(),
        bin_list: routine.bin_list.clone(),
        prefer_racks: routine.prefer_racks.iter().map(|rack| i64::from(*rack)).collect(),
        partition_list: routine
            .partition_list
            .iter()
            .map(|range| PartitionRangeDto {
                begin: i64::from(range.begin),
                count: i64::from(range.count),
            })
            .collect(),
    })
}

/// Inverse of [`Converter::restore_policy`].
pub fn restore_policy_dto(policy: &RestorePolicy) -> RestorePolicyDto {
    RestorePolicyDto {
        parallel: policy.parallel.map(i64::from),
        no_records: flag(policy.no_records),
        no_indexes: flag(policy.no_indexes),
        no_udfs: flag(policy.no_udfs),
        timeout: millis_of(policy.timeout),
        batch_size: policy.batch_size.map(i64::from),
        max_async_batches: policy.max_async_batches.map(i64::from),
        disable_batch_writes: flag(policy.disable_batch_writes),
        bandwidth: policy.bandwidth.map(|b| i64::try_from(b).unwrap_or(i64::MAX)),
        tps: policy.tps.map(i64::from),
        namespace: policy.namespace.as_ref().map(|ns| RestoreNamespaceDto {
            source: Some(ns.source.clone()),
            destination: Some(ns.destination.clone()),
        }),
        set_list: policy.set_list.clone(),
        bin_list: policy.bin_list.clone(),
        replace: flag(policy.exists_action == ExistsAction::Replace),
        unique: flag(policy.exists_action == ExistsAction::CreateOnly),
        no_generation: flag(policy.no_generation),
        encryption: Some(encryption_dto(&policy.encryption)),
        compression: Some(compression_dto(&policy.compression)),
        retry_policy: Some(retry_policy_dto(&policy.retry_policy)),
    }
}
