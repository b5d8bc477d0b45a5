//! Resilience subsystem.
//!
//! # Data Flow
//! ```text
//! retry-policy (document, optional)
//!     → validation (base-timeout > 0, multiplier >= 1, max-retries >= 0)
//!     → convert (absent → RetryPolicy::default())
//!     → retries.rs (attempt loop)
//!     → backoff.rs (base * multiplier^attempt)
//! ```
//!
//! # Design Decisions
//! - Backoff is deterministic; no jitter
//! - The default policy is a value threaded through conversion, not a global
//! - Every network call made through a policy also has its own deadline

pub mod backoff;
pub mod retries;

pub use retries::RetryPolicy;
