//! Configuration schema definitions (transport shape).
//!
//! These types mirror the configuration document one-to-one. Almost every
//! field is optional and numbers are signed, so that out-of-range values are
//! reported by validation with the entity name instead of failing decoding.
//! The only fields required at the wire level are a seed node's host and
//! port, and a routine's policy/cluster/storage references and full-backup cron.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Root configuration document.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct ConfigDto {
    /// Service-level settings (HTTP server, logger).
    pub service: ServiceDto,

    /// Source clusters keyed by name.
    pub aerospike_clusters: BTreeMap<String, AerospikeClusterDto>,

    /// Storage destinations keyed by name.
    pub storage: BTreeMap<String, StorageDto>,

    /// Backup policies keyed by name.
    pub backup_policies: BTreeMap<String, BackupPolicyDto>,

    /// Scheduled backup routines keyed by name.
    pub backup_routines: BTreeMap<String, BackupRoutineDto>,

    /// Secret agent endpoints keyed by name.
    #[serde(rename = "secret-agent")]
    pub secret_agents: BTreeMap<String, SecretAgentDto>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct ServiceDto {
    pub http: HttpServerDto,
    pub logger: LoggerDto,
}

/// Administrative HTTP server settings.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct HttpServerDto {
    /// Bind address (default "0.0.0.0").
    #[serde(skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,

    /// Bind port (default 8080).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub port: Option<i64>,

    /// Prefix for all API routes (default "/").
    #[serde(skip_serializing_if = "Option::is_none")]
    pub context_path: Option<String>,

    /// Request timeout in milliseconds; 0 disables it.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timeout: Option<i64>,

    /// Admission control for mutation endpoints.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rate: Option<RateLimiterDto>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct RateLimiterDto {
    /// Sustained requests per second per client.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tps: Option<i64>,

    /// Burst size per client.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub size: Option<i64>,

    /// Addresses or CIDR prefixes that bypass the limiter.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub white_list: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct LoggerDto {
    /// TRACE, DEBUG, INFO, WARN or ERROR.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub level: Option<String>,

    /// PLAIN or JSON.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub format: Option<String>,
}

/// A source cluster.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct AerospikeClusterDto {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,

    pub seed_nodes: Vec<SeedNodeDto>,

    /// Connection timeout in milliseconds.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub conn_timeout: Option<i64>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub use_services_alternate: Option<bool>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub credentials: Option<CredentialsDto>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub tls: Option<TlsDto>,

    /// Upper bound on concurrently scanned sets.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_parallel_scans: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct SeedNodeDto {
    pub host_name: String,

    pub port: i64,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tls_name: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct CredentialsDto {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,

    /// File holding the password; exclusive with `password`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub password_path: Option<String>,

    /// INTERNAL, EXTERNAL, EXTERNAL_INSECURE or PKI.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub auth_mode: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct TlsDto {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ca_file: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub cert_file: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub key_file: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

/// A storage destination, discriminated by `type`.
///
/// Fields belonging to a type other than the selected one are ignored.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct StorageDto {
    /// local, aws-s3 or gcp-storage.
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub storage_type: Option<String>,

    /// Directory for local storage, `s3://bucket/prefix` or `bucket/prefix` otherwise.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub s3_region: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub s3_profile: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub s3_endpoint_override: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub s3_log_level: Option<String>,

    /// Multipart upload part size in bytes.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min_part_size: Option<i64>,

    /// Connection pool size for the object-storage client.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_async_connections: Option<i64>,

    /// Endpoint override for gcp-storage.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub endpoint_override: Option<String>,
}

/// Backup tuning bundle reused by routines.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct BackupPolicyDto {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parallel: Option<i64>,

    /// Socket timeout in milliseconds.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub socket_timeout: Option<i64>,

    /// Total scan timeout in milliseconds.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_timeout: Option<i64>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_retries: Option<i64>,

    /// Delay between scan retries in milliseconds.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retry_delay: Option<i64>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub records_per_second: Option<i64>,

    /// Bandwidth throttle in bytes per second.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bandwidth: Option<i64>,

    /// Maximum size of one backup file in MiB.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file_limit: Option<i64>,

    /// KeepAll, RemoveAll or RemoveIncremental.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub remove_files: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub no_records: Option<bool>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub no_indexes: Option<bool>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub no_udfs: Option<bool>,

    /// When true, routines may not override namespaces or sets.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sealed: Option<bool>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub encryption: Option<EncryptionPolicyDto>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub compression: Option<CompressionPolicyDto>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub retry_policy: Option<RetryPolicyDto>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct EncryptionPolicyDto {
    /// NONE, AES128 or AES256.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mode: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub key_file: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub key_env: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub key_secret: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct CompressionPolicyDto {
    /// NONE or ZSTD.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mode: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub level: Option<i64>,
}

/// Backoff settings. Missing fields read as zero and fail validation.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct RetryPolicyDto {
    /// Initial delay in milliseconds.
    pub base_timeout: i64,

    pub multiplier: f64,

    pub max_retries: i64,
}

/// A scheduled backup routine. References are by name.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct BackupRoutineDto {
    pub backup_policy: String,

    pub source_cluster: String,

    pub storage: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub secret_agent: Option<String>,

    /// Cron expression for full backups.
    pub interval_cron: String,

    /// Cron expression for incremental backups.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub incr_interval_cron: Option<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub namespaces: Vec<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub set_list: Vec<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub bin_list: Vec<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub prefer_racks: Vec<i64>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub partition_list: Vec<PartitionRangeDto>,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct PartitionRangeDto {
    pub begin: i64,

    #[serde(default = "default_partition_count")]
    pub count: i64,
}

fn default_partition_count() -> i64 {
    1
}

/// External secret-retrieval endpoint.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct SecretAgentDto {
    /// tcp or unix.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub connection_type: Option<String>,

    /// Host name, or socket path for unix connections.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub port: Option<i64>,

    /// Timeout in milliseconds.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timeout: Option<i64>,

    /// Inline CA certificate.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ca_file_content: Option<String>,

    /// Whether `ca-file-content` is base64 encoded.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_base64: Option<bool>,
}

/// Restore tuning supplied with a restore request.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct RestorePolicyDto {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parallel: Option<i64>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub no_records: Option<bool>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub no_indexes: Option<bool>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub no_udfs: Option<bool>,

    /// Total timeout in milliseconds.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timeout: Option<i64>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub batch_size: Option<i64>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_async_batches: Option<i64>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub disable_batch_writes: Option<bool>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub bandwidth: Option<i64>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub tps: Option<i64>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub namespace: Option<RestoreNamespaceDto>,

    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub set_list: Vec<String>,

    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub bin_list: Vec<String>,

    /// Overwrite existing records entirely; exclusive with `unique`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub replace: Option<bool>,

    /// Only write records that do not exist yet; exclusive with `replace`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unique: Option<bool>,

    /// Ignore record generation when writing.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub no_generation: Option<bool>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub encryption: Option<EncryptionPolicyDto>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub compression: Option<CompressionPolicyDto>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub retry_policy: Option<RetryPolicyDto>,
}

/// Namespace remapping for restores.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct RestoreNamespaceDto {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub destination: Option<String>,
}
