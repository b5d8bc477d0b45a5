//! HTTP API subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum router under the context path, trace + timeout layers)
//!     → security::admission (mutation routes only)
//!     → handlers.rs (read snapshot, or edit through the ConfigHolder)
//!     → JSON / plain-text response
//! ```

pub mod handlers;
pub mod server;

pub use server::{AppState, HttpServer};
