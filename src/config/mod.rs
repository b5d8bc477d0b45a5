//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config document (YAML/JSON) behind a storage backend
//!     → codec.rs (decode to schema::ConfigDto)
//!     → validation.rs (per-entity pass, then cross-reference pass)
//!     → convert.rs (defaults, typed enums, names → Arc handles)
//!     → model::Config (validated, immutable)
//!     → holder.rs (ArcSwap; readers take snapshots)
//!
//! On edit (HTTP mutation):
//!     holder.document() → edit.rs (add/update/delete by name)
//!     → validation.rs → convert.rs
//!     → codec.rs encode → storage backend write
//!     → atomic swap of Arc<Config>
//!
//! On file change:
//!     watcher.rs detects change
//!     → loader.rs reruns the pipeline
//!     → atomic swap, or keep the current snapshot on failure
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded; changes produce a new snapshot
//! - Validation separates syntactic (serde) from semantic checks
//! - Nothing is converted unless the whole document validates

pub mod codec;
pub mod convert;
pub mod edit;
pub mod holder;
pub mod loader;
pub mod model;
pub mod schedule;
pub mod schema;
pub mod validation;
pub mod watcher;

pub use holder::ConfigHolder;
pub use loader::ConfigError;
pub use model::Config;
pub use schema::ConfigDto;
