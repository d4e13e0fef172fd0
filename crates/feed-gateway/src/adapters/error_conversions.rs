//! Mapping from the upstream taxonomy to caller-visible errors.
//!
//! Each upstream failure maps to exactly one status. Transport failures
//! carry internal detail, so the caller only sees a generic message.

use crate::domain::{ApiError, UpstreamError};
use axum::http::StatusCode;

impl From<UpstreamError> for ApiError {
    fn from(e: UpstreamError) -> Self {
        match e {
            UpstreamError::RateLimited(msg) => ApiError::new(StatusCode::TOO_MANY_REQUESTS, msg),
            UpstreamError::ResourceNotFound(msg) => ApiError::not_found(msg),
            // An invalid page token is fixed by the operator, not the caller.
            UpstreamError::Unauthenticated(msg) => ApiError::misconfigured(msg),
            UpstreamError::Forbidden(msg) => ApiError::forbidden(msg),
            UpstreamError::Misconfigured(msg) => ApiError::misconfigured(msg),
            UpstreamError::Unknown(msg) => ApiError::bad_gateway(msg),
            UpstreamError::Transport(_) => ApiError::internal(),
        }
    }
}
