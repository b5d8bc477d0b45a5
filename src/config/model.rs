//! Runtime configuration model.
//!
//! The runtime shape is fully resolved: defaults are applied, enumerations
//! are typed, and routines hold `Arc` handles to the entities they use
//! instead of names. A `Config` is an immutable snapshot; edits produce a
//! new one.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use base64::Engine;
use chrono::{DateTime, Utc};

use crate::config::schedule::CronSchedule;
use crate::resilience::RetryPolicy;

/// Highest rack id accepted in `prefer-racks`.
pub const MAX_RACK: u32 = 1_000_000;

/// Number of partitions in a namespace.
pub const PARTITION_COUNT: u32 = 4096;

/// Minimum multipart upload part size accepted by object storage (5 MiB).
pub const MIN_PART_SIZE: u64 = 5 * 1024 * 1024;

/// Declares a string-valued enumeration with its wire spellings.
macro_rules! wire_enum {
    ($(#[$meta:meta])* $name:ident { $($variant:ident => $text:literal),+ $(,)? }) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        pub enum $name {
            $($variant),+
        }

        impl $name {
            /// All accepted spellings, in declaration order.
            pub const VARIANTS: &'static [&'static str] = &[$($text),+];

            /// Parse the wire spelling (exact match).
            pub fn parse(value: &str) -> Option<Self> {
                match value {
                    $($text => Some(Self::$variant),)+
                    _ => None,
                }
            }

            pub fn as_str(&self) -> &'static str {
                match self {
                    $(Self::$variant => $text),+
                }
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }
    };
}

wire_enum!(
    /// Log verbosity.
    LogLevel {
        Trace => "TRACE",
        Debug => "DEBUG",
        Info => "INFO",
        Warn => "WARN",
        Error => "ERROR",
    }
);

wire_enum!(
    /// Log line format.
    LogFormat {
        Plain => "PLAIN",
        Json => "JSON",
    }
);

wire_enum!(
    /// Cluster authentication mode.
    AuthMode {
        Internal => "INTERNAL",
        External => "EXTERNAL",
        ExternalInsecure => "EXTERNAL_INSECURE",
        Pki => "PKI",
    }
);

wire_enum!(
    /// Storage backend type tag.
    StorageType {
        Local => "local",
        AwsS3 => "aws-s3",
        GcpStorage => "gcp-storage",
    }
);

wire_enum!(
    /// Log level of the object-storage client.
    S3LogLevel {
        Off => "OFF",
        Fatal => "FATAL",
        Error => "ERROR",
        Warn => "WARN",
        Info => "INFO",
        Debug => "DEBUG",
        Trace => "TRACE",
    }
);

wire_enum!(
    /// What happens to existing backup files when a full backup starts.
    RemoveFiles {
        KeepAll => "KeepAll",
        RemoveAll => "RemoveAll",
        RemoveIncremental => "RemoveIncremental",
    }
);

wire_enum!(
    /// Backup file encryption.
    EncryptionMode {
        None => "NONE",
        Aes128 => "AES128",
        Aes256 => "AES256",
    }
);

wire_enum!(
    /// Backup file compression.
    CompressionMode {
        None => "NONE",
        Zstd => "ZSTD",
    }
);

wire_enum!(
    /// Transport used to reach a secret agent.
    ConnectionType {
        Tcp => "tcp",
        Unix => "unix",
    }
);

/// A validated, fully resolved configuration snapshot.
#[derive(Debug, Clone, Default)]
pub struct Config {
    pub service: ServiceConfig,
    pub aerospike_clusters: BTreeMap<String, Arc<AerospikeCluster>>,
    pub storage: BTreeMap<String, Arc<Storage>>,
    pub backup_policies: BTreeMap<String, Arc<BackupPolicy>>,
    pub backup_routines: BTreeMap<String, Arc<BackupRoutine>>,
    pub secret_agents: BTreeMap<String, Arc<SecretAgent>>,
}

impl Config {
    /// Name under which `cluster` is registered in this snapshot.
    pub fn cluster_name(&self, cluster: &Arc<AerospikeCluster>) -> Option<&str> {
        name_of(&self.aerospike_clusters, cluster)
    }

    pub fn storage_name(&self, storage: &Arc<Storage>) -> Option<&str> {
        name_of(&self.storage, storage)
    }

    pub fn policy_name(&self, policy: &Arc<BackupPolicy>) -> Option<&str> {
        name_of(&self.backup_policies, policy)
    }

    pub fn secret_agent_name(&self, agent: &Arc<SecretAgent>) -> Option<&str> {
        name_of(&self.secret_agents, agent)
    }

    /// Routines that back up `cluster`.
    pub fn routines_for_cluster<'a>(
        &'a self,
        cluster: &'a Arc<AerospikeCluster>,
    ) -> impl Iterator<Item = (&'a str, &'a Arc<BackupRoutine>)> + 'a {
        self.backup_routines
            .iter()
            .filter(move |(_, routine)| Arc::ptr_eq(&routine.source_cluster, cluster))
            .map(|(name, routine)| (name.as_str(), routine))
    }
}

fn name_of<'a, T>(map: &'a BTreeMap<String, Arc<T>>, target: &Arc<T>) -> Option<&'a str> {
    map.iter()
        .find(|(_, entry)| Arc::ptr_eq(entry, target))
        .map(|(name, _)| name.as_str())
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ServiceConfig {
    pub http: HttpServerConfig,
    pub logger: LoggerConfig,
}

#[derive(Debug, Clone, PartialEq)]
pub struct HttpServerConfig {
    pub address: String,
    pub port: u16,
    pub context_path: String,
    /// Request timeout; `None` disables it.
    pub timeout: Option<Duration>,
    pub rate: RateLimiterConfig,
}

impl HttpServerConfig {
    pub const DEFAULT_ADDRESS: &'static str = "0.0.0.0";
    pub const DEFAULT_PORT: u16 = 8080;
    pub const DEFAULT_CONTEXT_PATH: &'static str = "/";

    /// `address:port` for binding.
    pub fn bind_address(&self) -> String {
        if self.address.contains(':') {
            format!("[{}]:{}", self.address, self.port)
        } else {
            format!("{}:{}", self.address, self.port)
        }
    }
}

impl Default for HttpServerConfig {
    fn default() -> Self {
        Self {
            address: Self::DEFAULT_ADDRESS.to_string(),
            port: Self::DEFAULT_PORT,
            context_path: Self::DEFAULT_CONTEXT_PATH.to_string(),
            timeout: None,
            rate: RateLimiterConfig::default(),
        }
    }
}

/// Admission control settings for mutation endpoints.
#[derive(Debug, Clone, PartialEq)]
pub struct RateLimiterConfig {
    /// Tokens added per second.
    pub tps: u32,
    /// Bucket capacity.
    pub size: u32,
    pub white_list: Vec<String>,
}

impl RateLimiterConfig {
    pub const DEFAULT_TPS: u32 = 1024;
    pub const DEFAULT_SIZE: u32 = 1024;
}

impl Default for RateLimiterConfig {
    fn default() -> Self {
        Self {
            tps: Self::DEFAULT_TPS,
            size: Self::DEFAULT_SIZE,
            white_list: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct LoggerConfig {
    pub level: LogLevel,
    pub format: LogFormat,
}

impl Default for LoggerConfig {
    fn default() -> Self {
        Self {
            level: LogLevel::Debug,
            format: LogFormat::Plain,
        }
    }
}

/// A source cluster.
#[derive(Debug, Clone, PartialEq)]
pub struct AerospikeCluster {
    pub label: Option<String>,
    pub seed_nodes: Vec<SeedNode>,
    pub conn_timeout: Option<Duration>,
    pub use_services_alternate: bool,
    pub credentials: Option<Credentials>,
    pub tls: Option<TlsConfig>,
    pub max_parallel_scans: Option<u32>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SeedNode {
    pub host: String,
    pub port: u16,
    pub tls_name: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Credentials {
    pub user: Option<String>,
    pub password: Option<String>,
    pub password_path: Option<PathBuf>,
    pub auth_mode: AuthMode,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct TlsConfig {
    pub ca_file: Option<PathBuf>,
    pub cert_file: Option<PathBuf>,
    pub key_file: Option<PathBuf>,
    pub name: Option<String>,
}

/// A storage destination.
#[derive(Debug, Clone, PartialEq)]
pub enum Storage {
    Local { path: PathBuf },
    S3(S3Storage),
    Gcp(GcpStorage),
}

impl Storage {
    pub fn storage_type(&self) -> StorageType {
        match self {
            Storage::Local { .. } => StorageType::Local,
            Storage::S3(_) => StorageType::AwsS3,
            Storage::Gcp(_) => StorageType::GcpStorage,
        }
    }

    /// Root path within the backend.
    pub fn path(&self) -> &str {
        match self {
            Storage::Local { path } => path.to_str().unwrap_or_default(),
            Storage::S3(s3) => &s3.path,
            Storage::Gcp(gcp) => &gcp.path,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct S3Storage {
    pub path: String,
    pub region: String,
    pub profile: Option<String>,
    pub endpoint_override: Option<String>,
    pub log_level: Option<S3LogLevel>,
    pub min_part_size: Option<u64>,
    pub max_async_connections: Option<u32>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct GcpStorage {
    pub path: String,
    pub endpoint_override: Option<String>,
}

/// Backup tuning shared by routines.
#[derive(Debug, Clone, PartialEq)]
pub struct BackupPolicy {
    pub parallel: Option<u32>,
    pub socket_timeout: Option<Duration>,
    pub total_timeout: Option<Duration>,
    pub max_retries: Option<u32>,
    pub retry_delay: Option<Duration>,
    pub records_per_second: Option<u32>,
    pub bandwidth: Option<u64>,
    pub file_limit: Option<u64>,
    pub remove_files: RemoveFiles,
    pub no_records: bool,
    pub no_indexes: bool,
    pub no_udfs: bool,
    pub sealed: bool,
    pub encryption: EncryptionPolicy,
    pub compression: CompressionPolicy,
    pub retry_policy: RetryPolicy,
}

#[derive(Debug, Clone, PartialEq)]
pub struct EncryptionPolicy {
    pub mode: EncryptionMode,
    /// Present iff `mode` is not `None`.
    pub key: Option<EncryptionKey>,
}

impl EncryptionPolicy {
    pub fn none() -> Self {
        Self {
            mode: EncryptionMode::None,
            key: None,
        }
    }
}

/// Where the encryption key comes from.
#[derive(Debug, Clone, PartialEq)]
pub enum EncryptionKey {
    File(PathBuf),
    Env(String),
    Secret(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct CompressionPolicy {
    pub mode: CompressionMode,
    pub level: i32,
}

impl CompressionPolicy {
    pub fn none() -> Self {
        Self {
            mode: CompressionMode::None,
            level: 0,
        }
    }
}

/// A scheduled backup routine with resolved references.
#[derive(Debug, Clone)]
pub struct BackupRoutine {
    pub backup_policy: Arc<BackupPolicy>,
    pub source_cluster: Arc<AerospikeCluster>,
    pub storage: Arc<Storage>,
    pub secret_agent: Option<Arc<SecretAgent>>,
    pub interval_cron: CronSchedule,
    pub incr_interval_cron: Option<CronSchedule>,
    pub namespaces: Vec<String>,
    pub set_list: Vec<String>,
    pub bin_list: Vec<String>,
    pub prefer_racks: Vec<u32>,
    pub partition_list: Vec<PartitionRange>,
}

impl BackupRoutine {
    pub fn next_full_backup(&self, after: DateTime<Utc>) -> Option<DateTime<Utc>> {
        self.interval_cron.next_after(after)
    }

    pub fn next_incremental_backup(&self, after: DateTime<Utc>) -> Option<DateTime<Utc>> {
        self.incr_interval_cron
            .as_ref()
            .and_then(|cron| cron.next_after(after))
    }
}

/// A contiguous run of partitions, `begin..begin + count`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PartitionRange {
    pub begin: u16,
    pub count: u16,
}

/// An external secret-retrieval endpoint.
#[derive(Debug, Clone, PartialEq)]
pub struct SecretAgent {
    pub connection_type: ConnectionType,
    pub address: String,
    pub port: Option<u16>,
    pub timeout: Option<Duration>,
    pub ca_file_content: Option<String>,
    pub is_base64: bool,
}

impl SecretAgent {
    /// The CA certificate bytes, decoding base64 when flagged.
    pub fn ca_certificate(&self) -> Option<Result<Vec<u8>, base64::DecodeError>> {
        self.ca_file_content.as_ref().map(|content| {
            if self.is_base64 {
                base64::engine::general_purpose::STANDARD.decode(content.trim())
            } else {
                Ok(content.clone().into_bytes())
            }
        })
    }
}

/// How restored records interact with existing ones.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ExistsAction {
    /// Merge bins into existing records.
    #[default]
    Update,
    /// Overwrite existing records entirely.
    Replace,
    /// Fail the write when the record already exists.
    CreateOnly,
}

/// Restore tuning for one restore request.
#[derive(Debug, Clone, PartialEq)]
pub struct RestorePolicy {
    pub parallel: Option<u32>,
    pub no_records: bool,
    pub no_indexes: bool,
    pub no_udfs: bool,
    pub timeout: Option<Duration>,
    pub batch_size: Option<u32>,
    pub max_async_batches: Option<u32>,
    pub disable_batch_writes: bool,
    pub bandwidth: Option<u64>,
    pub tps: Option<u32>,
    pub namespace: Option<NamespaceMapping>,
    pub set_list: Vec<String>,
    pub bin_list: Vec<String>,
    pub exists_action: ExistsAction,
    pub no_generation: bool,
    pub encryption: EncryptionPolicy,
    pub compression: CompressionPolicy,
    pub retry_policy: RetryPolicy,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NamespaceMapping {
    pub source: String,
    pub destination: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wire_enum_round_trip() {
        for text in RemoveFiles::VARIANTS {
            let parsed = RemoveFiles::parse(text).unwrap();
            assert_eq!(parsed.as_str(), *text);
        }
        assert_eq!(EncryptionMode::parse("aes128"), None);
        assert_eq!(StorageType::parse("aws-s3"), Some(StorageType::AwsS3));
    }

    #[test]
    fn test_bind_address() {
        let mut http = HttpServerConfig::default();
        assert_eq!(http.bind_address(), "0.0.0.0:8080");

        http.address = "::1".to_string();
        assert_eq!(http.bind_address(), "[::1]:8080");
    }

    #[test]
    fn test_ca_certificate_decoding() {
        let mut agent = SecretAgent {
            connection_type: ConnectionType::Tcp,
            address: "agent".to_string(),
            port: Some(5000),
            timeout: None,
            ca_file_content: Some("aGVsbG8=".to_string()),
            is_base64: true,
        };
        assert_eq!(agent.ca_certificate().unwrap().unwrap(), b"hello");

        agent.is_base64 = false;
        assert_eq!(agent.ca_certificate().unwrap().unwrap(), b"aGVsbG8=");

        agent.ca_file_content = None;
        assert!(agent.ca_certificate().is_none());
    }
}
