//! Gateway error types and the upstream error taxonomy.
//!
//! Every failure below the HTTP boundary ends up as exactly one [`ApiError`],
//! which renders as `{ "error": "<message>" }` with a fixed status code.

use axum::{
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use std::fmt;

/// Upstream (Graph API) error codes used for classification.
pub mod codes {
    /// Application / user / page request limits.
    pub const RATE_LIMIT: [i64; 4] = [4, 17, 32, 613];
    /// Unknown object or unsupported request.
    pub const UNKNOWN_RESOURCE: i64 = 100;
    /// Invalid or expired access token.
    pub const INVALID_TOKEN: i64 = 190;
    /// Permission denied (single code).
    pub const PERMISSION_DENIED: i64 = 10;
    /// Permission errors occupy the whole 2xx range.
    pub const PERMISSION_RANGE: std::ops::RangeInclusive<i64> = 200..=299;
}

/// Message used when the upstream error object carries none.
pub const DEFAULT_UPSTREAM_MESSAGE: &str = "Unknown upstream API error";

/// Message returned to callers for failures whose detail must stay in the logs.
pub const INTERNAL_MESSAGE: &str = "Internal server error";

/// Failure reported by an [`UpstreamClient`](crate::ports::UpstreamClient).
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum UpstreamError {
    /// Upstream throttled the access token or application
    #[error("{0}")]
    RateLimited(String),
    /// Requested resource does not exist upstream
    #[error("{0}")]
    ResourceNotFound(String),
    /// Access token rejected (invalid or expired)
    #[error("{0}")]
    Unauthenticated(String),
    /// Access token lacks the required permission
    #[error("{0}")]
    Forbidden(String),
    /// Local precondition failed before any network call
    #[error("{0}")]
    Misconfigured(String),
    /// Any other upstream error object
    #[error("{0}")]
    Unknown(String),
    /// Network failure, timeout, or an undecodable upstream body
    #[error("upstream transport failure: {0}")]
    Transport(String),
}

impl UpstreamError {
    /// Classify an upstream error object by its numeric code.
    pub fn classify(code: i64, message: Option<String>) -> Self {
        let message = message
            .filter(|m| !m.is_empty())
            .unwrap_or_else(|| DEFAULT_UPSTREAM_MESSAGE.to_string());

        if codes::RATE_LIMIT.contains(&code) {
            Self::RateLimited(message)
        } else if code == codes::UNKNOWN_RESOURCE {
            Self::ResourceNotFound(message)
        } else if code == codes::INVALID_TOKEN {
            Self::Unauthenticated(message)
        } else if code == codes::PERMISSION_DENIED || codes::PERMISSION_RANGE.contains(&code) {
            Self::Forbidden(message)
        } else {
            Self::Unknown(message)
        }
    }

    /// Short tag used as a structured log field.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::RateLimited(_) => "upstream_rate_limited",
            Self::ResourceNotFound(_) => "resource_not_found",
            Self::Unauthenticated(_) => "upstream_unauthenticated",
            Self::Forbidden(_) => "upstream_forbidden",
            Self::Misconfigured(_) => "misconfigured",
            Self::Unknown(_) => "upstream_unknown",
            Self::Transport(_) => "internal_unexpected",
        }
    }
}

/// Caller-facing error with an HTTP status and a safe message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiError {
    /// HTTP status code
    pub status: StatusCode,
    /// Message placed in the `error` field of the envelope
    pub message: String,
    /// Seconds until the caller may retry (429 only)
    pub retry_after_secs: Option<u64>,
}

impl ApiError {
    /// Create a new API error
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
            retry_after_secs: None,
        }
    }

    /// Missing, unknown, or origin-mismatched API key
    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::new(StatusCode::UNAUTHORIZED, message)
    }

    /// Disallowed origin or insufficient upstream permission
    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::new(StatusCode::FORBIDDEN, message)
    }

    /// Resource not found upstream
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, message)
    }

    /// Query parameters failed validation
    pub fn invalid_params(message: impl Into<String>) -> Self {
        Self::new(StatusCode::UNPROCESSABLE_ENTITY, message)
    }

    /// Local rate limit exceeded
    pub fn rate_limited(retry_after_secs: u64) -> Self {
        Self {
            status: StatusCode::TOO_MANY_REQUESTS,
            message: "Rate limit exceeded".to_string(),
            retry_after_secs: Some(retry_after_secs),
        }
    }

    /// Local misconfiguration (missing credentials or resource id)
    pub fn misconfigured(message: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, message)
    }

    /// Unrecognized upstream error
    pub fn bad_gateway(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_GATEWAY, message)
    }

    /// Unexpected internal failure; detail is never echoed
    pub fn internal() -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, INTERNAL_MESSAGE)
    }
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.status.as_u16(), self.message)
    }
}

impl std::error::Error for ApiError {}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = Json(serde_json::json!({ "error": self.message }));
        let mut response = (self.status, body).into_response();

        let headers = response.headers_mut();
        headers.insert(header::CACHE_CONTROL, HeaderValue::from_static("no-store"));
        if let Some(secs) = self.retry_after_secs {
            headers.insert(header::RETRY_AFTER, HeaderValue::from(secs));
        }

        response
    }
}

/// Result type for request handling
pub type ApiResult<T> = Result<T, ApiError>;

/// Gateway-level errors (startup and serving, not per request)
#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    /// Configuration error
    #[error("configuration error: {0}")]
    Config(String),

    /// Server socket bind error
    #[error("server bind error: {0}")]
    Bind(String),

    /// Server stopped with an I/O error
    #[error("server error: {0}")]
    Serve(String),
}
