//! Control-plane configuration layer for an Aerospike backup service.

pub mod config;
pub mod http;
pub mod jobs;
pub mod lifecycle;
pub mod observability;
pub mod resilience;
pub mod security;
pub mod storage;

pub use config::{Config, ConfigDto, ConfigHolder};
pub use http::HttpServer;
pub use lifecycle::Shutdown;
