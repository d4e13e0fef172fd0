//! CORS middleware.
//!
//! Wrapper around tower-http CORS. With API keys configured the allowed
//! origins are derived from the key registry; otherwise the configured list
//! is used as-is.

use crate::domain::config::CorsConfig;
use crate::domain::ApiKeyRegistry;
use axum::http::{header, HeaderName, HeaderValue, Method};
use std::time::Duration;
use tower_http::cors::{AllowOrigin, Any, CorsLayer as TowerCorsLayer};

use super::auth::API_KEY_HEADER;

/// Resolve the origin policy without building the layer.
pub fn allowed_origins(config: &CorsConfig, registry: &ApiKeyRegistry) -> Option<Vec<String>> {
    if !registry.is_empty() {
        return Some(registry.allowed_origins());
    }
    if config.is_wildcard() {
        return None;
    }
    Some(
        config
            .allowed_origins
            .iter()
            .map(|o| o.trim().trim_end_matches('/').to_string())
            .collect(),
    )
}

/// Create CORS layer from gateway config
pub fn create_cors_layer(config: &CorsConfig, registry: &ApiKeyRegistry) -> TowerCorsLayer {
    let origin = match allowed_origins(config, registry) {
        None => AllowOrigin::from(Any),
        Some(origins) => {
            let origins: Vec<HeaderValue> = origins
                .iter()
                .filter_map(|o| HeaderValue::from_str(o).ok())
                .collect();
            AllowOrigin::list(origins)
        }
    };

    TowerCorsLayer::new()
        .allow_origin(origin)
        .allow_methods([Method::GET, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, HeaderName::from_static(API_KEY_HEADER)])
        .expose_headers([
            HeaderName::from_static("x-cache"),
            header::RETRY_AFTER,
            HeaderName::from_static("x-request-id"),
        ])
        .max_age(Duration::from_secs(config.max_age))
}
