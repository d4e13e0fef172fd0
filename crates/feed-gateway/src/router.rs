//! Request handlers for the read endpoints.

use crate::domain::{
    validate_page_size, validate_resource_id, ApiError, ApiResult, CachedResponse, PostsResponse,
    ResourceKey, ResponseCache, UpstreamError, DEFAULT_PAGE_SIZE,
};
use crate::middleware::GatewayMetrics;
use crate::ports::UpstreamClient;
use axum::{
    extract::{rejection::QueryRejection, Query, State},
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use bytes::Bytes;
use serde::Deserialize;
use std::sync::Arc;
use tracing::{debug, error, warn};

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub cache: Arc<ResponseCache>,
    pub upstream: Arc<dyn UpstreamClient>,
    pub metrics: Arc<GatewayMetrics>,
    /// Page served when the request names none
    pub default_page_id: Option<String>,
}

/// Query string of `GET /api/posts`
#[derive(Debug, Deserialize)]
pub struct PostsQuery {
    pub page_id: Option<String>,
    pub limit: Option<u32>,
}

/// Whether a response was replayed from the cache
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheStatus {
    Hit,
    Miss,
}

impl CacheStatus {
    fn as_str(self) -> &'static str {
        match self {
            Self::Hit => "HIT",
            Self::Miss => "MISS",
        }
    }
}

/// `GET /api/posts`
///
/// Cache lookup, then both upstream reads concurrently, then cache store.
/// Runs after the authorization and rate-limit layers.
pub async fn get_posts(
    State(state): State<AppState>,
    query: Result<Query<PostsQuery>, QueryRejection>,
) -> ApiResult<Response> {
    let Query(query) = query.map_err(|rejection| {
        ApiError::invalid_params(format!("Invalid query parameters: {}", rejection.body_text()))
    })?;

    let key = resolve_key(&query, state.default_page_id.as_deref())?;

    if let Some(hit) = state.cache.lookup(&key) {
        state.metrics.record_cache_hit();
        debug!(key = %key, max_age = hit.max_age_secs(), "Cache hit");
        return Ok(posts_response(hit, CacheStatus::Hit));
    }
    state.metrics.record_cache_miss();
    debug!(key = %key, "Cache miss");

    let upstream = &state.upstream;
    let (page, posts) = tokio::try_join!(
        upstream.fetch_page_profile(key.resource_id()),
        upstream.fetch_recent_items(key.resource_id(), key.page_size()),
    )
    .map_err(|e| {
        state.metrics.record_upstream_failure();
        upstream_failure(&key, e)
    })?;

    let payload = serde_json::to_vec(&PostsResponse { page, posts }).map_err(|e| {
        error!(key = %key, error = %e, "Failed to serialize response");
        ApiError::internal()
    })?;

    let stored = state.cache.store(key, Bytes::from(payload));
    Ok(posts_response(stored, CacheStatus::Miss))
}

/// Validate the query and build the cache key.
///
/// An absent or blank `page_id` falls back to the configured default.
fn resolve_key(query: &PostsQuery, default_page_id: Option<&str>) -> ApiResult<ResourceKey> {
    let limit = validate_page_size(query.limit.unwrap_or(DEFAULT_PAGE_SIZE))
        .map_err(ApiError::invalid_params)?;

    let requested = query
        .page_id
        .as_deref()
        .map(str::trim)
        .filter(|id| !id.is_empty());

    let page_id = match (requested, default_page_id) {
        (Some(id), _) => validate_resource_id(id).map_err(ApiError::invalid_params)?,
        (None, Some(id)) => validate_resource_id(id).map_err(|e| {
            error!(kind = "misconfigured", error = %e, "Configured default page id is invalid");
            ApiError::misconfigured("Configured page id is invalid")
        })?,
        (None, None) => {
            error!(kind = "misconfigured", "No page id in query and no default configured");
            return Err(ApiError::misconfigured("Page id is not configured"));
        }
    };

    Ok(ResourceKey::new(page_id, limit))
}

fn upstream_failure(key: &ResourceKey, e: UpstreamError) -> ApiError {
    match &e {
        UpstreamError::Transport(detail) => {
            error!(key = %key, error = %detail, "Upstream transport failure");
        }
        other => {
            warn!(key = %key, kind = other.kind(), error = %other, "Upstream request failed");
        }
    }
    ApiError::from(e)
}

fn posts_response(cached: CachedResponse, status: CacheStatus) -> Response {
    let cache_control = format!("public, max-age={}", cached.max_age_secs());
    (
        StatusCode::OK,
        [
            (
                header::CONTENT_TYPE,
                HeaderValue::from_static("application/json"),
            ),
            (
                header::CACHE_CONTROL,
                HeaderValue::from_str(&cache_control)
                    .unwrap_or_else(|_| HeaderValue::from_static("no-store")),
            ),
            (
                header::HeaderName::from_static("x-cache"),
                HeaderValue::from_static(status.as_str()),
            ),
        ],
        cached.payload,
    )
        .into_response()
}

/// `GET /health`
pub async fn health_check() -> impl IntoResponse {
    Json(serde_json::json!({ "status": "ok" }))
}

/// `GET /metrics`
pub async fn metrics_snapshot(State(state): State<AppState>) -> impl IntoResponse {
    let mut snapshot = state.metrics.to_json();
    snapshot["cache"]["entries"] = serde_json::json!(state.cache.len());
    Json(snapshot)
}
