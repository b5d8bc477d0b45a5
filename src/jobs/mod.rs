//! Job state model.
//!
//! The execution engine owns the running jobs and writes their progress;
//! the API layer only reads snapshots.
//!
//! # Data Flow
//! ```text
//! engine starts a job
//!     → registry.rs (one full + one incremental slot per routine)
//!     → tracker.rs (atomic counters, updated as records are written)
//!     → state.rs RunningJob / CurrentBackups (serializable snapshots)
//!     → API
//!
//! job completes
//!     → handle dropped, slot freed
//!     → state.rs BackupMetadata written alongside the artifact
//! ```

pub mod registry;
pub mod state;
pub mod tracker;

pub use registry::{JobError, JobHandle, JobRegistry};
pub use state::{BackupMetadata, CurrentBackups, JobKind, RunningJob};
pub use tracker::JobTracker;
