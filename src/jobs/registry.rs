//! Running jobs, keyed by routine and kind.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use thiserror::Error;

use crate::jobs::state::{CurrentBackups, JobKind};
use crate::jobs::tracker::JobTracker;
use crate::observability::metrics;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum JobError {
    #[error("{kind} backup for routine {routine:?} is already running")]
    AlreadyRunning { routine: String, kind: JobKind },
}

type JobKey = (String, JobKind);

#[derive(Debug, Default)]
pub struct JobRegistry {
    jobs: DashMap<JobKey, Arc<JobTracker>>,
}

impl JobRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claim the `kind` slot of `routine`. The slot is freed when the handle drops.
    pub fn start(
        self: &Arc<Self>,
        routine: &str,
        kind: JobKind,
        start_time: DateTime<Utc>,
    ) -> Result<JobHandle, JobError> {
        let key = (routine.to_string(), kind);
        let tracker = match self.jobs.entry(key.clone()) {
            Entry::Occupied(_) => {
                return Err(JobError::AlreadyRunning {
                    routine: routine.to_string(),
                    kind,
                })
            }
            Entry::Vacant(slot) => {
                let tracker = Arc::new(JobTracker::new(start_time));
                slot.insert(tracker.clone());
                tracker
            }
        };

        self.publish(kind);
        tracing::info!(routine = %routine, kind = %kind, "Backup job started");

        Ok(JobHandle {
            registry: self.clone(),
            key,
            tracker,
        })
    }

    pub fn current(&self, routine: &str) -> CurrentBackups {
        let mut current = CurrentBackups::default();
        for kind in [JobKind::Full, JobKind::Incremental] {
            if let Some(tracker) = self.jobs.get(&(routine.to_string(), kind)) {
                *current.slot_mut(kind) = Some(tracker.snapshot());
            }
        }
        current
    }

    /// Every routine with at least one job in flight.
    pub fn all(&self) -> BTreeMap<String, CurrentBackups> {
        let mut all: BTreeMap<String, CurrentBackups> = BTreeMap::new();
        for entry in self.jobs.iter() {
            let (routine, kind) = entry.key();
            *all.entry(routine.clone()).or_default().slot_mut(*kind) = Some(entry.value().snapshot());
        }
        all
    }

    pub fn running(&self, kind: JobKind) -> usize {
        self.jobs.iter().filter(|entry| entry.key().1 == kind).count()
    }

    fn finish(&self, key: &JobKey) {
        if self.jobs.remove(key).is_some() {
            self.publish(key.1);
            tracing::info!(routine = %key.0, kind = %key.1, "Backup job finished");
        }
    }

    fn publish(&self, kind: JobKind) {
        metrics::set_running_jobs(kind.as_str(), self.running(kind));
    }
}

/// Ownership of one running job slot.
#[derive(Debug)]
pub struct JobHandle {
    registry: Arc<JobRegistry>,
    key: JobKey,
    tracker: Arc<JobTracker>,
}

impl JobHandle {
    pub fn tracker(&self) -> &JobTracker {
        &self.tracker
    }

    pub fn routine(&self) -> &str {
        &self.key.0
    }

    pub fn kind(&self) -> JobKind {
        self.key.1
    }
}

impl Drop for JobHandle {
    fn drop(&mut self) {
        self.registry.finish(&self.key);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_one_job_per_kind_per_routine() {
        let registry = Arc::new(JobRegistry::new());
        let now = Utc::now();

        let full = registry.start("daily", JobKind::Full, now).unwrap();
        let _incr = registry.start("daily", JobKind::Incremental, now).unwrap();
        let _other = registry.start("hourly", JobKind::Full, now).unwrap();

        let err = registry.start("daily", JobKind::Full, now).unwrap_err();
        assert_eq!(
            err,
            JobError::AlreadyRunning {
                routine: "daily".into(),
                kind: JobKind::Full
            }
        );
        assert_eq!(registry.running(JobKind::Full), 2);

        drop(full);
        assert!(registry.start("daily", JobKind::Full, now).is_ok());
    }

    #[test]
    fn test_current_reflects_tracker_progress() {
        let registry = Arc::new(JobRegistry::new());
        assert!(registry.current("daily").is_idle());

        let job = registry.start("daily", JobKind::Incremental, Utc::now()).unwrap();
        job.tracker().set_total(4);
        job.tracker().add_done(1);

        let current = registry.current("daily");
        assert!(current.full.is_none());
        assert_eq!(current.incremental.as_ref().unwrap().percentage_done, 25);

        let all = registry.all();
        assert_eq!(all.len(), 1);
        assert_eq!(all["daily"].incremental.as_ref().unwrap().done_records, 1);

        drop(job);
        assert!(registry.current("daily").is_idle());
        assert!(registry.all().is_empty());
    }
}
