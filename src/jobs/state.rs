use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobKind {
    Full,
    Incremental,
}

impl JobKind {
    pub fn as_str(self) -> &'static str {
        match self {
            JobKind::Full => "full",
            JobKind::Incremental => "incremental",
        }
    }
}

impl std::fmt::Display for JobKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Written once, when a backup artifact completes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct BackupMetadata {
    /// When the backup started.
    pub created: DateTime<Utc>,
    /// Lower bound of modified records for an incremental backup.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub from: Option<DateTime<Utc>>,
    pub namespace: String,
    pub record_count: u64,
    pub byte_count: u64,
    pub file_count: u64,
    pub secondary_index_count: u64,
    pub udf_count: u64,
}

/// Progress of a job in flight.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct RunningJob {
    pub total_records: u64,
    pub done_records: u64,
    pub start_time: DateTime<Utc>,
    /// 0..=100
    pub percentage_done: u8,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub estimated_end_time: Option<DateTime<Utc>>,
}

/// The jobs currently running for one routine.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct CurrentBackups {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub full: Option<RunningJob>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub incremental: Option<RunningJob>,
}

impl CurrentBackups {
    pub fn is_idle(&self) -> bool {
        self.full.is_none() && self.incremental.is_none()
    }

    pub fn slot_mut(&mut self, kind: JobKind) -> &mut Option<RunningJob> {
        match kind {
            JobKind::Full => &mut self.full,
            JobKind::Incremental => &mut self.incremental,
        }
    }
}
