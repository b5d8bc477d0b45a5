//! Security subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming mutation request:
//!     → admission.rs (client host from the remote address)
//!     → allow_list.rs (exact address or CIDR prefix match)
//!     → rate_limit.rs (per-client token bucket, only if not allow-listed)
//!     → Pass to the handler, or 429 / 403
//! ```
//!
//! # Design Decisions
//! - Fail closed: an address that does not parse is rejected
//! - Buckets are created lazily and swept when idle
//! - Limits are fixed when the service starts

pub mod admission;
pub mod allow_list;
pub mod rate_limit;

pub use admission::{admission_middleware, AdmissionControl, AdmissionError};
pub use allow_list::{AllowList, AllowListError};
pub use rate_limit::RateLimiter;
