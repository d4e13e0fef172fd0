//! Gateway configuration from environment variables.
//!
//! # Environment Variables
//!
//! - `FB_ACCESS_TOKEN`: Page access token (required for upstream calls)
//! - `FB_PAGE_ID`: Default page id
//! - `FB_GRAPH_BASE_URL`: Versioned Graph API base URL
//! - `FEED_API_KEYS`: `key:domain[,key:domain...]`
//! - `CORS_ORIGINS`: Comma-separated origins (default: `*`)
//! - `FEED_CACHE_TTL`: Cache TTL, e.g. `300`, `5m` (default: 300s)
//! - `FEED_HOST` / `FEED_PORT`: Bind address (default: 0.0.0.0:8000)
//! - `FEED_RATE_LIMIT_PER_MINUTE`: Requests per caller per minute (default: 60)
//! - `FEED_TRUST_FORWARDED_FOR`: Take the caller address from `X-Forwarded-For`
//! - `FEED_METRICS_ENABLED`: Route `GET /metrics`

use feed_gateway::domain::config::parse_duration;
use feed_gateway::domain::ConfigError;
use feed_gateway::GatewayConfig;
use std::env;
use std::time::Duration;

/// Build the gateway configuration from the process environment
pub fn from_env() -> Result<GatewayConfig, ConfigError> {
    from_lookup(|name| env::var(name).ok())
}

/// Build the gateway configuration from any variable lookup.
///
/// Unset and blank variables keep their defaults; malformed values are errors.
pub fn from_lookup<F>(lookup: F) -> Result<GatewayConfig, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let var = |name: &str| {
        lookup(name)
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
    };

    let mut config = GatewayConfig::default();

    if let Some(token) = var("FB_ACCESS_TOKEN") {
        config.upstream.access_token = Some(token);
    }
    if let Some(page_id) = var("FB_PAGE_ID") {
        config.upstream.default_page_id = Some(page_id);
    }
    if let Some(base_url) = var("FB_GRAPH_BASE_URL") {
        config.upstream.base_url = base_url;
    }

    if let Some(keys) = var("FEED_API_KEYS") {
        config.auth.api_keys = keys;
    }
    if let Some(origins) = var("CORS_ORIGINS") {
        config.cors.allowed_origins = origins
            .split(',')
            .map(str::trim)
            .filter(|o| !o.is_empty())
            .map(str::to_string)
            .collect();
    }

    if let Some(ttl) = var("FEED_CACHE_TTL") {
        config.cache.ttl = parse_duration(&ttl)
            .map_err(|e| ConfigError::Invalid(format!("FEED_CACHE_TTL: {}", e)))?;
    }

    if let Some(host) = var("FEED_HOST") {
        config.http.host = host
            .parse()
            .map_err(|_| ConfigError::Invalid(format!("FEED_HOST: '{}' is not an IP address", host)))?;
    }
    if let Some(port) = var("FEED_PORT") {
        config.http.port = port
            .parse()
            .map_err(|_| ConfigError::Invalid(format!("FEED_PORT: '{}' is not a port", port)))?;
    }

    if let Some(limit) = var("FEED_RATE_LIMIT_PER_MINUTE") {
        config.rate_limit.requests_per_window = limit.parse().map_err(|_| {
            ConfigError::Invalid(format!("FEED_RATE_LIMIT_PER_MINUTE: '{}' is not a number", limit))
        })?;
        config.rate_limit.window = Duration::from_secs(60);
    }
    if let Some(flag) = var("FEED_TRUST_FORWARDED_FOR") {
        config.rate_limit.trust_forwarded_for = parse_flag("FEED_TRUST_FORWARDED_FOR", &flag)?;
    }
    if let Some(flag) = var("FEED_METRICS_ENABLED") {
        config.metrics.enabled = parse_flag("FEED_METRICS_ENABLED", &flag)?;
    }

    config.validate()?;
    Ok(config)
}

/// Parse `true/false`, `1/0`, `yes/no`, `on/off`
pub fn parse_flag(name: &str, value: &str) -> Result<bool, ConfigError> {
    match value.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        other => Err(ConfigError::Invalid(format!(
            "{}: '{}' is not a boolean",
            name, other
        ))),
    }
}
