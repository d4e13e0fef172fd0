// Allow missing docs for internal items
#![allow(missing_docs)]

//! Feed gateway - a read-only HTTP front for a social page's posts.
//!
//! Browser widgets call `GET /api/posts`; the gateway authorizes the caller,
//! applies a per-caller budget, serves from a short-lived cache, and only on
//! a miss asks the Graph API for the page profile and recent posts.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────┐
//! │                          FEED GATEWAY                             │
//! ├──────────────────────────────────────────────────────────────────┤
//! │   GET /api/posts          GET / , /widget.js , /health , /metrics │
//! │         │                              │                          │
//! │  ┌──────┴──────────────────────────────┴──────┐                   │
//! │  │          Tracing → CORS                     │                   │
//! │  └──────┬──────────────────────────────────────┘                   │
//! │  ┌──────┴──────────────┐                                          │
//! │  │ Authorize → RateLimit│                                          │
//! │  └──────┬──────────────┘                                          │
//! │  ┌──────┴──────────────┐     ┌────────────────────┐               │
//! │  │    ResponseCache     │◄───►│   get_posts handler │               │
//! │  └─────────────────────┘     └─────────┬──────────┘               │
//! │                                        │ miss                     │
//! │                              ┌─────────┴──────────┐               │
//! │                              │  UpstreamClient     │               │
//! │                              │  (GraphClient)      │               │
//! │                              └─────────┬──────────┘               │
//! └────────────────────────────────────────┼─────────────────────────┘
//!                                          ▼
//!                                   Graph API (HTTPS)
//! ```
//!
//! # Usage
//!
//! ```ignore
//! use feed_gateway::{ApiGatewayService, GatewayConfig, GraphClient};
//! use std::sync::Arc;
//!
//! let config = GatewayConfig::default();
//! let upstream = Arc::new(GraphClient::new(&config.upstream));
//! let service = ApiGatewayService::new(config, upstream)?;
//! service.serve(shutdown_signal()).await?;
//! ```
//!
//! # Security
//!
//! - API keys are bound to one origin domain and compared in constant time
//! - The page id is restricted to `[A-Za-z0-9._-]` before it reaches an upstream URL
//! - The upstream access token never appears in logs or error messages
//! - Per-caller token buckets; `X-Forwarded-For` only behind a trusted proxy

#![warn(clippy::all)]
#![deny(unsafe_code)]

pub mod adapters;
pub mod assets;
pub mod domain;
pub mod middleware;
pub mod ports;
pub mod router;
pub mod service;

// Re-exports for public API
pub use adapters::GraphClient;
pub use domain::config::GatewayConfig;
pub use domain::error::{ApiError, ApiResult, GatewayError, UpstreamError};
pub use domain::types::*;
pub use domain::{ApiKeyRegistry, ResponseCache};
pub use middleware::{GatewayMetrics, MiddlewareStack};
pub use ports::{ManualTimeSource, SystemTimeSource, TimeSource, UpstreamClient};
pub use router::AppState;
pub use service::{build_router, ApiGatewayService, Stage, READ_PIPELINE};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
