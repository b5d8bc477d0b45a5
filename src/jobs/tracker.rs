//! Lock-free progress counters for one job.

use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{DateTime, TimeDelta, Utc};

use crate::jobs::state::RunningJob;

#[derive(Debug)]
pub struct JobTracker {
    start_time: DateTime<Utc>,
    total: AtomicU64,
    done: AtomicU64,
}

impl JobTracker {
    pub fn new(start_time: DateTime<Utc>) -> Self {
        Self {
            start_time,
            total: AtomicU64::new(0),
            done: AtomicU64::new(0),
        }
    }

    pub fn start_time(&self) -> DateTime<Utc> {
        self.start_time
    }

    /// Set once the engine knows how many records the scan will visit.
    pub fn set_total(&self, total: u64) {
        self.total.store(total, Ordering::Relaxed);
    }

    pub fn add_done(&self, records: u64) {
        self.done.fetch_add(records, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> RunningJob {
        self.snapshot_at(Utc::now())
    }

    pub fn snapshot_at(&self, now: DateTime<Utc>) -> RunningJob {
        let total = self.total.load(Ordering::Relaxed);
        let done = self.done.load(Ordering::Relaxed);

        RunningJob {
            total_records: total,
            done_records: done,
            start_time: self.start_time,
            percentage_done: percentage(done, total),
            estimated_end_time: self.estimate_end(done, total, now),
        }
    }

    /// Linear extrapolation from the rate so far.
    fn estimate_end(&self, done: u64, total: u64, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
        if done == 0 || total == 0 {
            return None;
        }
        let elapsed = (now - self.start_time).num_milliseconds();
        if elapsed <= 0 {
            return None;
        }
        let projected = elapsed as f64 * total as f64 / done as f64;
        let projected = TimeDelta::try_milliseconds(projected as i64)?;
        self.start_time.checked_add_signed(projected)
    }
}

fn percentage(done: u64, total: u64) -> u8 {
    if total == 0 {
        return 0;
    }
    let pct = (u128::from(done) * 100 / u128::from(total)).min(100);
    pct as u8
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn start() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap()
    }

    #[test]
    fn test_progress_and_estimate() {
        let tracker = JobTracker::new(start());
        tracker.set_total(1000);
        tracker.add_done(200);
        tracker.add_done(50);

        let job = tracker.snapshot_at(start() + TimeDelta::seconds(10));
        assert_eq!(job.done_records, 250);
        assert_eq!(job.percentage_done, 25);
        assert_eq!(job.estimated_end_time, Some(start() + TimeDelta::seconds(40)));
    }

    #[test]
    fn test_no_estimate_before_progress() {
        let tracker = JobTracker::new(start());
        let job = tracker.snapshot_at(start() + TimeDelta::seconds(5));
        assert_eq!(job.percentage_done, 0);
        assert_eq!(job.estimated_end_time, None);

        tracker.set_total(10);
        assert_eq!(tracker.snapshot_at(start() + TimeDelta::seconds(5)).estimated_end_time, None);
    }

    #[test]
    fn test_percentage_is_capped() {
        let tracker = JobTracker::new(start());
        tracker.set_total(10);
        tracker.add_done(15);
        assert_eq!(tracker.snapshot_at(start() + TimeDelta::seconds(1)).percentage_done, 100);
    }

    #[test]
    fn test_concurrent_updates() {
        let tracker = std::sync::Arc::new(JobTracker::new(start()));
        tracker.set_total(8000);

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let tracker = tracker.clone();
                std::thread::spawn(move || {
                    for _ in 0..1000 {
                        tracker.add_done(1);
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(tracker.snapshot().percentage_done, 100);
    }
}
