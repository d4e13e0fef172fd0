//! Gateway configuration with validation.
//!
//! The gateway treats configuration as already-parsed input; the runtime
//! binary is responsible for building it from the environment.

use super::registry::ApiKeyRegistry;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::time::Duration;

/// Default Graph API base URL (versioned).
pub const DEFAULT_GRAPH_BASE_URL: &str = "https://graph.facebook.com/v19.0";

/// Longest accepted cache TTL (7 days)
pub const MAX_CACHE_TTL: Duration = Duration::from_secs(7 * 24 * 60 * 60);
/// Longest accepted rate limit window (1 day)
pub const MAX_RATE_LIMIT_WINDOW: Duration = Duration::from_secs(24 * 60 * 60);
/// Longest accepted upstream timeout
pub const MAX_UPSTREAM_TIMEOUT: Duration = Duration::from_secs(5 * 60);

/// Main gateway configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct GatewayConfig {
    /// HTTP server configuration
    pub http: HttpConfig,
    /// API key registry configuration
    pub auth: AuthConfig,
    /// CORS configuration (used only when no API keys are configured)
    pub cors: CorsConfig,
    /// Response cache configuration
    pub cache: CacheConfig,
    /// Rate limiting configuration
    pub rate_limit: RateLimitConfig,
    /// Upstream Graph API configuration
    pub upstream: UpstreamConfig,
    /// Metrics endpoint configuration
    pub metrics: MetricsConfig,
}

impl GatewayConfig {
    /// Validate configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.rate_limit.requests_per_window == 0 {
            return Err(ConfigError::InvalidRateLimit(
                "requests_per_window cannot be 0".into(),
            ));
        }

        if self.rate_limit.window.is_zero() {
            return Err(ConfigError::InvalidRateLimit("window cannot be 0".into()));
        }

        if self.rate_limit.window > MAX_RATE_LIMIT_WINDOW {
            return Err(ConfigError::InvalidRateLimit(format!(
                "window cannot exceed {}s",
                MAX_RATE_LIMIT_WINDOW.as_secs()
            )));
        }

        if self.cache.ttl.is_zero() {
            return Err(ConfigError::InvalidCache("ttl cannot be 0".into()));
        }

        if self.cache.ttl > MAX_CACHE_TTL {
            return Err(ConfigError::InvalidCache(format!(
                "ttl cannot exceed {}s",
                MAX_CACHE_TTL.as_secs()
            )));
        }

        if self.upstream.timeout.is_zero() {
            return Err(ConfigError::InvalidUpstream("timeout cannot be 0".into()));
        }

        if self.upstream.timeout > MAX_UPSTREAM_TIMEOUT {
            return Err(ConfigError::InvalidUpstream(format!(
                "timeout cannot exceed {}s",
                MAX_UPSTREAM_TIMEOUT.as_secs()
            )));
        }

        let base = self.upstream.base_url.trim();
        if !(base.starts_with("https://") || base.starts_with("http://")) {
            return Err(ConfigError::InvalidUpstream(format!(
                "base_url must be an http(s) URL, got '{}'",
                base
            )));
        }

        // Surface registry errors at startup rather than on first request
        self.auth.registry()?;

        Ok(())
    }

    /// Get HTTP server bind address
    pub fn http_addr(&self) -> SocketAddr {
        SocketAddr::new(self.http.host, self.http.port)
    }
}

/// HTTP server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    /// Bind address
    pub host: IpAddr,
    /// Port (default: 8000)
    pub port: u16,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            host: IpAddr::V4(Ipv4Addr::new(0, 0, 0, 0)),
            port: 8000,
        }
    }
}

/// API key configuration
#[derive(Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    /// Raw registry string: `key:domain[,key:domain...]` (empty = no keys)
    pub api_keys: String,
}

impl AuthConfig {
    /// Parse the configured registry
    pub fn registry(&self) -> Result<ApiKeyRegistry, ConfigError> {
        ApiKeyRegistry::parse(&self.api_keys)
    }
}

impl fmt::Debug for AuthConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let count = self
            .api_keys
            .split(',')
            .filter(|p| !p.trim().is_empty())
            .count();
        f.debug_struct("AuthConfig")
            .field("api_keys", &format_args!("<{} entries>", count))
            .finish()
    }
}

/// CORS configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CorsConfig {
    /// Allowed origins ("*" for all)
    pub allowed_origins: Vec<String>,
    /// Max age for preflight cache in seconds
    pub max_age: u64,
}

impl Default for CorsConfig {
    fn default() -> Self {
        Self {
            allowed_origins: vec!["*".to_string()],
            max_age: 600,
        }
    }
}

impl CorsConfig {
    /// Whether every origin is allowed
    pub fn is_wildcard(&self) -> bool {
        self.allowed_origins.is_empty() || self.allowed_origins.iter().any(|o| o == "*")
    }
}

/// Response cache configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Freshness window applied to every entry
    #[serde(with = "humantime_serde")]
    pub ttl: Duration,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            ttl: Duration::from_secs(300),
        }
    }
}

/// Rate limiting configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RateLimitConfig {
    /// Requests admitted per caller per window
    pub requests_per_window: u32,
    /// Window length
    #[serde(with = "humantime_serde")]
    pub window: Duration,
    /// Enable rate limiting
    pub enabled: bool,
    /// Take the caller address from `X-Forwarded-For` (only behind a trusted proxy)
    pub trust_forwarded_for: bool,
    /// How often idle buckets are dropped
    #[serde(with = "humantime_serde")]
    pub cleanup_interval: Duration,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            requests_per_window: 60,
            window: Duration::from_secs(60),
            enabled: true,
            trust_forwarded_for: false,
            cleanup_interval: Duration::from_secs(60),
        }
    }
}

/// Upstream Graph API configuration
#[derive(Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct UpstreamConfig {
    /// Versioned API base URL
    pub base_url: String,
    /// Page access token (None = misconfigured)
    pub access_token: Option<String>,
    /// Page used when the request carries no `page_id`
    pub default_page_id: Option<String>,
    /// Per-request timeout
    #[serde(with = "humantime_serde")]
    pub timeout: Duration,
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_GRAPH_BASE_URL.to_string(),
            access_token: None,
            default_page_id: None,
            timeout: Duration::from_secs(10),
        }
    }
}

impl fmt::Debug for UpstreamConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UpstreamConfig")
            .field("base_url", &self.base_url)
            .field(
                "access_token",
                &self.access_token.as_ref().map(|_| "<redacted>"),
            )
            .field("default_page_id", &self.default_page_id)
            .field("timeout", &self.timeout)
            .finish()
    }
}

/// Metrics endpoint configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct MetricsConfig {
    /// Route `GET /metrics`
    pub enabled: bool,
}

/// Configuration errors
#[derive(Debug, Clone, thiserror::Error)]
pub enum ConfigError {
    /// Invalid rate limiting configuration
    #[error("invalid rate limit: {0}")]
    InvalidRateLimit(String),
    /// Invalid cache configuration
    #[error("invalid cache: {0}")]
    InvalidCache(String),
    /// Invalid upstream configuration
    #[error("invalid upstream: {0}")]
    InvalidUpstream(String),
    /// Malformed API key registry
    #[error("invalid API keys: {0}")]
    InvalidApiKeys(String),
    /// General configuration error
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Parse `30s`, `500ms`, `5m` or plain seconds.
pub fn parse_duration(s: &str) -> Result<Duration, &'static str> {
    let s = s.trim();
    if let Some(ms) = s.strip_suffix("ms") {
        ms.trim()
            .parse::<u64>()
            .map(Duration::from_millis)
            .map_err(|_| "invalid milliseconds")
    } else if let Some(secs) = s.strip_suffix('s') {
        secs.trim()
            .parse::<u64>()
            .map(Duration::from_secs)
            .map_err(|_| "invalid seconds")
    } else if let Some(mins) = s.strip_suffix('m') {
        mins.trim()
            .parse::<u64>()
            .map_err(|_| "invalid minutes")?
            .checked_mul(60)
            .map(Duration::from_secs)
            .ok_or("minutes out of range")
    } else {
        s.parse::<u64>()
            .map(Duration::from_secs)
            .map_err(|_| "invalid duration format")
    }
}

/// Humantime serde module for Duration serialization
mod humantime_serde {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        if duration.subsec_millis() != 0 {
            serializer.serialize_str(&format!("{}ms", duration.as_millis()))
        } else {
            serializer.serialize_str(&format!("{}s", duration.as_secs()))
        }
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        super::parse_duration(&s).map_err(serde::de::Error::custom)
    }
}
