//! Domain types for the gateway.
//!
//! Configuration, the error taxonomy, the API key registry, and the
//! response cache. Nothing in here performs I/O.

pub mod cache;
pub mod config;
pub mod error;
pub mod registry;
pub mod types;

// Re-exports for convenience
pub use cache::{CachedResponse, ResponseCache};
pub use config::{ConfigError, GatewayConfig};
pub use error::{ApiError, ApiResult, GatewayError, UpstreamError};
pub use registry::{constant_time_compare, origin_host, ApiKeyRegistry};
pub use types::*;
