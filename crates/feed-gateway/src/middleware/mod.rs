//! Middleware stack for the feed gateway.
//!
//! Layer order on `/api` routes: Tracing → CORS → Auth → RateLimit → Handler.
//! Public routes (`/`, `/widget.js`, `/health`, `/metrics`) only see Tracing
//! and CORS.

pub mod auth;
pub mod cors;
pub mod metrics;
pub mod rate_limit;
pub mod tracing;

pub use auth::{AdmittedKey, AuthLayer, AuthMode, Authorizer, API_KEY_HEADER};
pub use cors::create_cors_layer;
pub use metrics::{GatewayMetrics, RequestTimer};
pub use rate_limit::{caller_identity, cleanup_task, RateLimitLayer, RateLimitState};
pub use self::tracing::TracingLayer;

use crate::domain::config::GatewayConfig;
use crate::domain::ConfigError;
use std::sync::Arc;
use tower_http::cors::CorsLayer;

/// Middleware stack builder
#[derive(Clone)]
pub struct MiddlewareStack {
    pub tracing: TracingLayer,
    pub cors: CorsLayer,
    pub auth: AuthLayer,
    pub rate_limit: RateLimitLayer,
    pub metrics: Arc<GatewayMetrics>,
}

impl MiddlewareStack {
    /// Create middleware stack from gateway config
    pub fn from_config(config: &GatewayConfig) -> Result<Self, ConfigError> {
        Self::with_metrics(config, Arc::new(GatewayMetrics::new()))
    }

    /// Create middleware stack sharing existing metrics
    pub fn with_metrics(
        config: &GatewayConfig,
        metrics: Arc<GatewayMetrics>,
    ) -> Result<Self, ConfigError> {
        let registry = config.auth.registry()?;

        Ok(Self {
            tracing: TracingLayer::new(Arc::clone(&metrics)),
            cors: create_cors_layer(&config.cors, &registry),
            auth: AuthLayer::new(Authorizer::new(registry, &config.cors), Arc::clone(&metrics)),
            rate_limit: RateLimitLayer::new(config.rate_limit.clone(), Arc::clone(&metrics)),
            metrics,
        })
    }

    /// Get shared metrics
    pub fn metrics(&self) -> Arc<GatewayMetrics> {
        Arc::clone(&self.metrics)
    }

    /// Get rate limit state for cleanup task
    pub fn rate_limit_state(&self) -> Arc<RateLimitState> {
        self.rate_limit.state()
    }

    /// Get the authorizer chosen at startup
    pub fn authorizer(&self) -> Arc<Authorizer> {
        self.auth.authorizer()
    }
}
