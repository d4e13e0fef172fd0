//! Authorization middleware: API key and origin binding.
//!
//! The mode is chosen once at startup and never changes:
//!
//! - **Open**: no keys and a wildcard CORS list; every request passes.
//! - **OriginOnly**: no keys but an explicit CORS list; a present `Origin`
//!   must be on the list (403 otherwise).
//! - **Enforced**: a valid `X-API-Key` is required, and a present `Origin`
//!   must match the key's registered domain (401 otherwise).
//!
//! Preflight requests always pass; CORS answers them.

use crate::domain::config::CorsConfig;
use crate::domain::registry::origin_host;
use crate::domain::{ApiError, ApiKeyRegistry};
use crate::middleware::metrics::GatewayMetrics;
use axum::{
    body::Body,
    http::{header, HeaderMap, Method, Request},
    response::{IntoResponse, Response},
};
use std::collections::HashSet;
use std::sync::Arc;
use tower::{Layer, Service};
use tracing::{debug, warn};

/// Header carrying the caller's API key.
pub const API_KEY_HEADER: &str = "x-api-key";

/// Request extension set when the Authorizer admitted a registered key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdmittedKey(pub String);

/// Authorization mode, fixed for the process lifetime.
#[derive(Debug, Clone)]
pub enum AuthMode {
    Open,
    OriginOnly { allowed: HashSet<String> },
    Enforced(Arc<ApiKeyRegistry>),
}

/// Per-request authorization decision.
#[derive(Debug, Clone)]
pub struct Authorizer {
    mode: AuthMode,
}

impl Authorizer {
    /// Select the mode from the registry and CORS allow-list.
    pub fn new(registry: ApiKeyRegistry, cors: &CorsConfig) -> Self {
        let mode = if !registry.is_empty() {
            debug!(keys = registry.len(), "API key enforcement enabled");
            AuthMode::Enforced(Arc::new(registry))
        } else if !cors.is_wildcard() {
            let allowed = cors
                .allowed_origins
                .iter()
                .map(|o| normalize_origin(o))
                .collect::<HashSet<_>>();
            warn!(
                origins = allowed.len(),
                "No API keys configured; falling back to origin allow-list"
            );
            AuthMode::OriginOnly { allowed }
        } else {
            warn!("No API keys configured; /api endpoints are open to every caller");
            AuthMode::Open
        };
        Self { mode }
    }

    pub fn mode(&self) -> &AuthMode {
        &self.mode
    }

    pub fn mode_name(&self) -> &'static str {
        match self.mode {
            AuthMode::Open => "open",
            AuthMode::OriginOnly { .. } => "origin-only",
            AuthMode::Enforced(_) => "enforced",
        }
    }

    /// Decide whether a request may proceed.
    ///
    /// Returns the admitted key in enforced mode, `None` otherwise.
    pub fn authorize(&self, headers: &HeaderMap) -> Result<Option<AdmittedKey>, ApiError> {
        match &self.mode {
            AuthMode::Open => Ok(None),
            AuthMode::OriginOnly { allowed } => {
                if let Some(origin) = headers.get(header::ORIGIN) {
                    let origin = origin.to_str().map(normalize_origin).unwrap_or_default();
                    if !allowed.contains(&origin) {
                        warn!(origin = %origin, "Rejected request from origin not on allow-list");
                        return Err(ApiError::forbidden("Origin not allowed"));
                    }
                }
                Ok(None)
            }
            AuthMode::Enforced(registry) => {
                let key = match headers.get(API_KEY_HEADER) {
                    None => {
                        warn!(reason = "missing_key", "Rejected unauthenticated request");
                        return Err(ApiError::unauthorized("Missing API key"));
                    }
                    Some(value) => value.to_str().unwrap_or_default().trim(),
                };
                if key.is_empty() {
                    warn!(reason = "missing_key", "Rejected unauthenticated request");
                    return Err(ApiError::unauthorized("Missing API key"));
                }

                let domain = registry.domain_for(key).ok_or_else(|| {
                    warn!(reason = "unknown_key", "Rejected unauthenticated request");
                    ApiError::unauthorized("Invalid API key")
                })?;

                if let Some(origin) = headers.get(header::ORIGIN) {
                    let host = origin.to_str().ok().and_then(origin_host);
                    if host.as_deref() != Some(domain) {
                        warn!(
                            reason = "origin_mismatch",
                            origin = ?origin,
                            registered = domain,
                            "Rejected request with origin not bound to key"
                        );
                        return Err(ApiError::unauthorized(
                            "Origin not allowed for this API key",
                        ));
                    }
                }

                Ok(Some(AdmittedKey(key.to_string())))
            }
        }
    }
}

/// Lowercase and drop a trailing slash so literal origins compare reliably.
fn normalize_origin(origin: &str) -> String {
    origin.trim().trim_end_matches('/').to_ascii_lowercase()
}

/// Authorization layer
#[derive(Clone)]
pub struct AuthLayer {
    authorizer: Arc<Authorizer>,
    metrics: Arc<GatewayMetrics>,
}

impl AuthLayer {
    pub fn new(authorizer: Authorizer, metrics: Arc<GatewayMetrics>) -> Self {
        Self {
            authorizer: Arc::new(authorizer),
            metrics,
        }
    }

    pub fn authorizer(&self) -> Arc<Authorizer> {
        Arc::clone(&self.authorizer)
    }
}

impl<S> Layer<S> for AuthLayer {
    type Service = AuthService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        AuthService {
            inner,
            authorizer: Arc::clone(&self.authorizer),
            metrics: Arc::clone(&self.metrics),
        }
    }
}

/// Authorization service
#[derive(Clone)]
pub struct AuthService<S> {
    inner: S,
    authorizer: Arc<Authorizer>,
    metrics: Arc<GatewayMetrics>,
}

impl<S> Service<Request<Body>> for AuthService<S>
where
    S: Service<Request<Body>, Response = Response> + Clone + Send + 'static,
    S::Future: Send,
{
    type Response = Response;
    type Error = S::Error;
    type Future = std::pin::Pin<
        Box<dyn std::future::Future<Output = Result<Self::Response, Self::Error>> + Send>,
    >;

    fn poll_ready(
        &mut self,
        cx: &mut std::task::Context<'_>,
    ) -> std::task::Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, mut req: Request<Body>) -> Self::Future {
        let authorizer = Arc::clone(&self.authorizer);
        let metrics = Arc::clone(&self.metrics);
        let mut inner = self.inner.clone();

        Box::pin(async move {
            if req.method() == Method::OPTIONS {
                return inner.call(req).await;
            }

            match authorizer.authorize(req.headers()) {
                Ok(Some(admitted)) => {
                    req.extensions_mut().insert(admitted);
                    inner.call(req).await
                }
                Ok(None) => inner.call(req).await,
                Err(rejection) => {
                    metrics.record_auth_rejection();
                    Ok(rejection.into_response())
                }
            }
        })
    }
}
