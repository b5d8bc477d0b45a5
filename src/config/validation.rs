//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Per-entity checks: ranges, non-empty strings, enum membership,
//!   mutually exclusive flags, cron grammar, encryption/compression consistency
//! - Referential integrity: routines reference existing policies, clusters,
//!   storage and secret agents
//!
//! # Design Decisions
//! - Returns the first failure; every error names the entity and the rule
//! - Maps are ordered by name, so the first failure is stable across runs
//! - Per-entity pass runs over the whole document before the cross-reference pass
//! - Cross-reference rules live only in `validate_references`
//! - Validation is a pure function: &ConfigDto → Result<(), ValidationError>

use std::fmt;

use base64::Engine;
use thiserror::Error;

use crate::config::model::{
    AuthMode, CompressionMode, ConnectionType, EncryptionMode, LogFormat, LogLevel, RemoveFiles,
    S3LogLevel, StorageType, MAX_RACK, MIN_PART_SIZE, PARTITION_COUNT,
};
use crate::config::schedule::CronSchedule;
use crate::config::schema::{
    AerospikeClusterDto, BackupPolicyDto, BackupRoutineDto, CompressionPolicyDto, ConfigDto,
    EncryptionPolicyDto, RestorePolicyDto, RetryPolicyDto, SecretAgentDto, ServiceDto, StorageDto,
};
use crate::security::allow_list::AllowList;

/// Kind of entity a validation error refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntityKind {
    Service,
    Cluster,
    Storage,
    BackupPolicy,
    BackupRoutine,
    SecretAgent,
    RestorePolicy,
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            EntityKind::Service => "service",
            EntityKind::Cluster => "cluster",
            EntityKind::Storage => "storage",
            EntityKind::BackupPolicy => "backup policy",
            EntityKind::BackupRoutine => "backup routine",
            EntityKind::SecretAgent => "secret agent",
            EntityKind::RestorePolicy => "restore policy",
        };
        f.write_str(text)
    }
}

/// A violated configuration rule.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationError {
    #[error("{kind} name must not be empty")]
    EmptyName { kind: EntityKind },

    #[error("{kind} {name:?}: {field} {reason}")]
    InvalidField {
        kind: EntityKind,
        name: String,
        field: String,
        reason: String,
    },

    #[error("{kind} {name:?}: invalid cron expression {expression:?} in {field}: {reason}")]
    InvalidCron {
        kind: EntityKind,
        name: String,
        field: &'static str,
        expression: String,
        reason: String,
    },

    #[error("{kind} {name:?}: {reason}")]
    Contradiction {
        kind: EntityKind,
        name: String,
        reason: String,
    },

    #[error("{kind} {name:?}: {target} {reference:?} not found")]
    ReferenceNotFound {
        kind: EntityKind,
        name: String,
        target: EntityKind,
        reference: String,
    },

    #[error(
        "backup routine {routine:?}: set-list has {sets} entries but cluster {cluster:?} \
         allows at most {max} parallel scans"
    )]
    TooManySets {
        routine: String,
        cluster: String,
        sets: usize,
        max: i64,
    },
}

impl ValidationError {
    /// Name of the entity the error is attributed to, if any.
    pub fn entity_name(&self) -> Option<&str> {
        match self {
            ValidationError::EmptyName { .. } => None,
            ValidationError::InvalidField { name, .. }
            | ValidationError::InvalidCron { name, .. }
            | ValidationError::Contradiction { name, .. }
            | ValidationError::ReferenceNotFound { name, .. } => Some(name),
            ValidationError::TooManySets { routine, .. } => Some(routine),
        }
    }
}

pub type ValidationResult = Result<(), ValidationError>;

/// Error constructor bound to one entity.
struct Scope<'a> {
    kind: EntityKind,
    name: &'a str,
}

impl<'a> Scope<'a> {
    fn new(kind: EntityKind, name: &'a str) -> Self {
        Self { kind, name }
    }

    fn invalid(&self, field: impl Into<String>, reason: impl Into<String>) -> ValidationError {
        ValidationError::InvalidField {
            kind: self.kind,
            name: self.name.to_string(),
            field: field.into(),
            reason: reason.into(),
        }
    }

    fn contradiction(&self, reason: impl Into<String>) -> ValidationError {
        ValidationError::Contradiction {
            kind: self.kind,
            name: self.name.to_string(),
            reason: reason.into(),
        }
    }

    fn missing(&self, target: EntityKind, reference: &str) -> ValidationError {
        ValidationError::ReferenceNotFound {
            kind: self.kind,
            name: self.name.to_string(),
            target,
            reference: reference.to_string(),
        }
    }

    fn non_empty(&self, field: &str, value: &str) -> ValidationResult {
        if value.trim().is_empty() {
            return Err(self.invalid(field, "must not be empty"));
        }
        Ok(())
    }

    fn required(&self, field: &str, value: Option<&str>) -> ValidationResult {
        match value {
            Some(v) => self.non_empty(field, v),
            None => Err(self.invalid(field, "is required")),
        }
    }

    fn positive(&self, field: &str, value: Option<i64>) -> ValidationResult {
        match value {
            Some(v) if v <= 0 => Err(self.invalid(field, format!("must be positive, got {v}"))),
            _ => Ok(()),
        }
    }

    fn non_negative(&self, field: &str, value: Option<i64>) -> ValidationResult {
        match value {
            Some(v) if v < 0 => Err(self.invalid(field, format!("must not be negative, got {v}"))),
            _ => Ok(()),
        }
    }

    fn port(&self, field: &str, value: i64) -> ValidationResult {
        if !(1..=65535).contains(&value) {
            return Err(self.invalid(field, format!("must be in [1, 65535], got {value}")));
        }
        Ok(())
    }

    fn one_of<T>(
        &self,
        field: &str,
        value: &str,
        parse: fn(&str) -> Option<T>,
        variants: &[&str],
    ) -> ValidationResult {
        if parse(value).is_none() {
            return Err(self.invalid(
                field,
                format!("must be one of {}, got {value:?}", variants.join(", ")),
            ));
        }
        Ok(())
    }

    fn cron(&self, field: &'static str, expression: &str) -> ValidationResult {
        CronSchedule::parse(expression)
            .map(|_| ())
            .map_err(|e| ValidationError::InvalidCron {
                kind: self.kind,
                name: self.name.to_string(),
                field,
                expression: expression.to_string(),
                reason: e.to_string(),
            })
    }

    fn entries_non_empty(&self, field: &str, values: &[String]) -> ValidationResult {
        for (i, value) in values.iter().enumerate() {
            self.non_empty(&format!("{field}[{i}]"), value)?;
        }
        Ok(())
    }
}

fn check_name(kind: EntityKind, name: &str) -> ValidationResult {
    if name.trim().is_empty() {
        return Err(ValidationError::EmptyName { kind });
    }
    Ok(())
}

/// Validate the whole document: every entity, then every cross reference.
pub fn validate_config(config: &ConfigDto) -> ValidationResult {
    validate_service(&config.service)?;

    for (name, cluster) in &config.aerospike_clusters {
        check_name(EntityKind::Cluster, name)?;
        validate_cluster(name, cluster)?;
    }
    for (name, storage) in &config.storage {
        check_name(EntityKind::Storage, name)?;
        validate_storage(name, storage)?;
    }
    for (name, policy) in &config.backup_policies {
        check_name(EntityKind::BackupPolicy, name)?;
        validate_backup_policy(name, policy)?;
    }
    for (name, agent) in &config.secret_agents {
        check_name(EntityKind::SecretAgent, name)?;
        validate_secret_agent(name, agent)?;
    }
    for (name, routine) in &config.backup_routines {
        check_name(EntityKind::BackupRoutine, name)?;
        validate_routine(name, routine)?;
    }

    for (name, routine) in &config.backup_routines {
        validate_references(name, routine, config)?;
    }

    Ok(())
}

pub fn validate_service(service: &ServiceDto) -> ValidationResult {
    let scope = Scope::new(EntityKind::Service, "http");
    let http = &service.http;

    if let Some(address) = &http.address {
        scope.non_empty("address", address)?;
    }
    if let Some(port) = http.port {
        scope.port("port", port)?;
    }
    if let Some(path) = &http.context_path {
        if !path.starts_with('/') {
            return Err(scope.invalid("context-path", format!("must start with '/', got {path:?}")));
        }
    }
    scope.non_negative("timeout", http.timeout)?;

    if let Some(rate) = &http.rate {
        scope.positive("rate.tps", rate.tps)?;
        scope.positive("rate.size", rate.size)?;
        AllowList::new(&rate.white_list).map_err(|e| scope.invalid("rate.white-list", e.to_string()))?;
    }

    let scope = Scope::new(EntityKind::Service, "logger");
    if let Some(level) = &service.logger.level {
        scope.one_of("level", level, LogLevel::parse, LogLevel::VARIANTS)?;
    }
    if let Some(format) = &service.logger.format {
        scope.one_of("format", format, LogFormat::parse, LogFormat::VARIANTS)?;
    }

    Ok(())
}

pub fn validate_cluster(name: &str, cluster: &AerospikeClusterDto) -> ValidationResult {
    let scope = Scope::new(EntityKind::Cluster, name);

    if cluster.seed_nodes.is_empty() {
        return Err(scope.invalid("seed-nodes", "must contain at least one node"));
    }
    for (i, node) in cluster.seed_nodes.iter().enumerate() {
        scope.non_empty(&format!("seed-nodes[{i}].host-name"), &node.host_name)?;
        scope.port(&format!("seed-nodes[{i}].port"), node.port)?;
    }

    scope.non_negative("conn-timeout", cluster.conn_timeout)?;
    scope.positive("max-parallel-scans", cluster.max_parallel_scans)?;

    if let Some(credentials) = &cluster.credentials {
        if let Some(mode) = &credentials.auth_mode {
            scope.one_of("credentials.auth-mode", mode, AuthMode::parse, AuthMode::VARIANTS)?;
        }
        if credentials.password.is_some() && credentials.password_path.is_some() {
            return Err(scope.contradiction("credentials: password and password-path are mutually exclusive"));
        }
    }

    Ok(())
}

/// Validate one storage entry. Also used for bootstrap storage-pointer documents.
pub fn validate_storage(name: &str, storage: &StorageDto) -> ValidationResult {
    let scope = Scope::new(EntityKind::Storage, name);

    scope.required("type", storage.storage_type.as_deref())?;
    let type_tag = storage.storage_type.as_deref().unwrap_or_default();
    scope.one_of("type", type_tag, StorageType::parse, StorageType::VARIANTS)?;

    match StorageType::parse(type_tag) {
        Some(StorageType::Local) => {
            scope.required("path", storage.path.as_deref())?;
        }
        Some(StorageType::AwsS3) => {
            scope.required("path", storage.path.as_deref())?;
            scope.required("s3-region", storage.s3_region.as_deref())?;
            if let Some(level) = &storage.s3_log_level {
                scope.one_of("s3-log-level", level, S3LogLevel::parse, S3LogLevel::VARIANTS)?;
            }
            if let Some(size) = storage.min_part_size {
                if size < MIN_PART_SIZE as i64 {
                    return Err(scope.invalid(
                        "min-part-size",
                        format!("must be at least {MIN_PART_SIZE} bytes, got {size}"),
                    ));
                }
            }
            scope.positive("max-async-connections", storage.max_async_connections)?;
        }
        Some(StorageType::GcpStorage) => {
            scope.required("path", storage.path.as_deref())?;
        }
        None => {}
    }

    Ok(())
}

pub fn validate_backup_policy(name: &str, policy: &BackupPolicyDto) -> ValidationResult {
    let scope = Scope::new(EntityKind::BackupPolicy, name);

    scope.positive("parallel", policy.parallel)?;
    scope.non_negative("socket-timeout", policy.socket_timeout)?;
    scope.non_negative("total-timeout", policy.total_timeout)?;
    scope.non_negative("max-retries", policy.max_retries)?;
    scope.non_negative("retry-delay", policy.retry_delay)?;
    scope.non_negative("records-per-second", policy.records_per_second)?;
    scope.non_negative("bandwidth", policy.bandwidth)?;
    scope.positive("file-limit", policy.file_limit)?;

    if let Some(mode) = &policy.remove_files {
        scope.one_of("remove-files", mode, RemoveFiles::parse, RemoveFiles::VARIANTS)?;
    }
    if let Some(encryption) = &policy.encryption {
        validate_encryption(&scope, encryption)?;
    }
    if let Some(compression) = &policy.compression {
        validate_compression(&scope, compression)?;
    }
    if let Some(retry) = &policy.retry_policy {
        validate_retry_policy(&scope, retry)?;
    }

    Ok(())
}

fn validate_encryption(scope: &Scope<'_>, encryption: &EncryptionPolicyDto) -> ValidationResult {
    scope.required("encryption.mode", encryption.mode.as_deref())?;
    let mode = encryption.mode.as_deref().unwrap_or_default();
    scope.one_of("encryption.mode", mode, EncryptionMode::parse, EncryptionMode::VARIANTS)?;

    let sources = [&encryption.key_file, &encryption.key_env, &encryption.key_secret]
        .iter()
        .filter(|source| source.is_some())
        .count();

    match EncryptionMode::parse(mode) {
        Some(EncryptionMode::None) if sources > 0 => Err(scope.contradiction(
            "encryption: mode NONE must not specify key-file, key-env or key-secret",
        )),
        Some(EncryptionMode::Aes128 | EncryptionMode::Aes256) if sources != 1 => {
            Err(scope.contradiction(format!(
                "encryption: mode {mode} requires exactly one of key-file, key-env or key-secret, got {sources}"
            )))
        }
        _ => Ok(()),
    }
}

fn validate_compression(scope: &Scope<'_>, compression: &CompressionPolicyDto) -> ValidationResult {
    scope.required("compression.mode", compression.mode.as_deref())?;
    let mode = compression.mode.as_deref().unwrap_or_default();
    scope.one_of("compression.mode", mode, CompressionMode::parse, CompressionMode::VARIANTS)?;

    if let Some(level) = compression.level {
        if !(-1..=22).contains(&level) {
            return Err(scope.invalid("compression.level", format!("must be in [-1, 22], got {level}")));
        }
    }

    Ok(())
}

fn validate_retry_policy(scope: &Scope<'_>, retry: &RetryPolicyDto) -> ValidationResult {
    if retry.base_timeout <= 0 {
        return Err(scope.invalid(
            "retry-policy.base-timeout",
            format!("must be positive, got {}", retry.base_timeout),
        ));
    }
    if !retry.multiplier.is_finite() || retry.multiplier < 1.0 {
        return Err(scope.invalid(
            "retry-policy.multiplier",
            format!("must be at least 1, got {}", retry.multiplier),
        ));
    }
    if retry.max_retries < 0 {
        return Err(scope.invalid(
            "retry-policy.max-retries",
            format!("must not be negative, got {}", retry.max_retries),
        ));
    }
    Ok(())
}

/// Validate a routine's own fields. References are checked by `validate_references`.
pub fn validate_routine(name: &str, routine: &BackupRoutineDto) -> ValidationResult {
    let scope = Scope::new(EntityKind::BackupRoutine, name);

    scope.non_empty("backup-policy", &routine.backup_policy)?;
    scope.non_empty("source-cluster", &routine.source_cluster)?;
    scope.non_empty("storage", &routine.storage)?;

    scope.cron("interval-cron", &routine.interval_cron)?;
    if let Some(incremental) = &routine.incr_interval_cron {
        scope.cron("incr-interval-cron", incremental)?;
    }

    scope.entries_non_empty("namespaces", &routine.namespaces)?;
    scope.entries_non_empty("set-list", &routine.set_list)?;
    scope.entries_non_empty("bin-list", &routine.bin_list)?;

    for (i, rack) in routine.prefer_racks.iter().enumerate() {
        if !(0..=MAX_RACK as i64).contains(rack) {
            return Err(scope.invalid(
                format!("prefer-racks[{i}]"),
                format!("must be in [0, {MAX_RACK}], got {rack}"),
            ));
        }
    }

    let partitions = PARTITION_COUNT as i64;
    for (i, range) in routine.partition_list.iter().enumerate() {
        let field = format!("partition-list[{i}]");
        if !(0..partitions).contains(&range.begin) {
            return Err(scope.invalid(
                field,
                format!("begin must be in [0, {}], got {}", partitions - 1, range.begin),
            ));
        }
        if range.count < 1 || range.count > partitions - range.begin {
            return Err(scope.invalid(
                field,
                format!(
                    "count must be at least 1 and end within {partitions} partitions, got begin {} count {}",
                    range.begin, range.count
                ),
            ));
        }
    }

    Ok(())
}

pub fn validate_secret_agent(name: &str, agent: &SecretAgentDto) -> ValidationResult {
    let scope = Scope::new(EntityKind::SecretAgent, name);

    scope.required("connection-type", agent.connection_type.as_deref())?;
    let connection = agent.connection_type.as_deref().unwrap_or_default();
    scope.one_of("connection-type", connection, ConnectionType::parse, ConnectionType::VARIANTS)?;

    scope.required("address", agent.address.as_deref())?;

    if ConnectionType::parse(connection) == Some(ConnectionType::Tcp) {
        match agent.port {
            Some(port) => scope.port("port", port)?,
            None => return Err(scope.invalid("port", "is required for tcp connections")),
        }
    }
    scope.non_negative("timeout", agent.timeout)?;

    if agent.is_base64.unwrap_or(false) {
        if let Some(content) = &agent.ca_file_content {
            base64::engine::general_purpose::STANDARD
                .decode(content.trim())
                .map_err(|e| scope.invalid("ca-file-content", format!("is not valid base64: {e}")))?;
        }
    }

    Ok(())
}

/// Cross-reference checks for one routine, with the whole document in scope.
pub fn validate_references(name: &str, routine: &BackupRoutineDto, config: &ConfigDto) -> ValidationResult {
    let scope = Scope::new(EntityKind::BackupRoutine, name);

    let policy = config
        .backup_policies
        .get(&routine.backup_policy)
        .ok_or_else(|| scope.missing(EntityKind::BackupPolicy, &routine.backup_policy))?;

    let cluster = config
        .aerospike_clusters
        .get(&routine.source_cluster)
        .ok_or_else(|| scope.missing(EntityKind::Cluster, &routine.source_cluster))?;

    if let Some(max) = cluster.max_parallel_scans {
        if routine.set_list.len() as i64 > max {
            return Err(ValidationError::TooManySets {
                routine: name.to_string(),
                cluster: routine.source_cluster.clone(),
                sets: routine.set_list.len(),
                max,
            });
        }
    }

    if !config.storage.contains_key(&routine.storage) {
        return Err(scope.missing(EntityKind::Storage, &routine.storage));
    }

    if let Some(agent) = &routine.secret_agent {
        scope.non_empty("secret-agent", agent)?;
        if !config.secret_agents.contains_key(agent) {
            return Err(scope.missing(EntityKind::SecretAgent, agent));
        }
    }

    if policy.sealed.unwrap_or(false) && (!routine.namespaces.is_empty() || !routine.set_list.is_empty()) {
        return Err(scope.contradiction(format!(
            "backup policy {:?} is sealed; namespaces and set-list cannot be overridden",
            routine.backup_policy
        )));
    }

    Ok(())
}

/// Validate a restore request's policy.
pub fn validate_restore_policy(name: &str, policy: &RestorePolicyDto) -> ValidationResult {
    let scope = Scope::new(EntityKind::RestorePolicy, name);

    scope.positive("parallel", policy.parallel)?;
    scope.non_negative("timeout", policy.timeout)?;
    scope.positive("batch-size", policy.batch_size)?;
    scope.positive("max-async-batches", policy.max_async_batches)?;
    scope.non_negative("bandwidth", policy.bandwidth)?;
    scope.non_negative("tps", policy.tps)?;

    if policy.replace.unwrap_or(false) && policy.unique.unwrap_or(false) {
        return Err(scope.contradiction("replace and unique are mutually exclusive"));
    }

    if let Some(namespace) = &policy.namespace {
        scope.required("namespace.source", namespace.source.as_deref())?;
        scope.required("namespace.destination", namespace.destination.as_deref())?;
    }

    scope.entries_non_empty("set-list", &policy.set_list)?;
    scope.entries_non_empty("bin-list", &policy.bin_list)?;

    if let Some(encryption) = &policy.encryption {
        validate_encryption(&scope, encryption)?;
    }
    if let Some(compression) = &policy.compression {
        validate_compression(&scope, compression)?;
    }
    if let Some(retry) = &policy.retry_policy {
        validate_retry_policy(&scope, retry)?;
    }

    Ok(())
}
