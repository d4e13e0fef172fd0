//! Rate limiting middleware using a token bucket per caller.
//!
//! A caller is the admitted API key when the authorizer admitted one, and the
//! client address otherwise. Buckets hold `requests_per_window` tokens and
//! refill continuously over `window`.

use crate::domain::config::RateLimitConfig;
use crate::domain::{ApiError, CallerIdentity};
use crate::middleware::auth::{AdmittedKey, API_KEY_HEADER};
use crate::middleware::metrics::GatewayMetrics;
use axum::{
    body::Body,
    extract::ConnectInfo,
    http::Request,
    response::{IntoResponse, Response},
};
use dashmap::DashMap;
use governor::{
    clock::{Clock, DefaultClock},
    state::{InMemoryState, NotKeyed},
    Quota, RateLimiter,
};
use std::net::SocketAddr;
use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tower::{Layer, Service};
use tracing::{debug, warn};

/// Token bucket entry for one caller
struct TokenBucket {
    limiter: RateLimiter<NotKeyed, InMemoryState, DefaultClock>,
    /// Last access time (for cleanup)
    last_access: Instant,
}

impl TokenBucket {
    fn new(quota: Quota) -> Self {
        Self {
            limiter: RateLimiter::direct(quota),
            last_access: Instant::now(),
        }
    }

    fn check(&mut self) -> Result<(), Duration> {
        self.last_access = Instant::now();
        match self.limiter.check() {
            Ok(_) => Ok(()),
            Err(not_until) => Err(not_until.wait_time_from(DefaultClock::default().now())),
        }
    }
}

/// Build the bucket quota: `requests_per_window` tokens, one refilled every
/// `window / requests_per_window`.
fn quota_for(config: &RateLimitConfig) -> Quota {
    let burst = NonZeroU32::new(config.requests_per_window).unwrap_or(NonZeroU32::MIN);
    let period = config.window / burst.get();
    Quota::with_period(period)
        .unwrap_or_else(|| Quota::per_second(burst))
        .allow_burst(burst)
}

/// Rate limiter state shared across requests
pub struct RateLimitState {
    buckets: DashMap<CallerIdentity, TokenBucket>,
    quota: Quota,
    config: RateLimitConfig,
}

impl RateLimitState {
    pub fn new(config: RateLimitConfig) -> Self {
        Self {
            buckets: DashMap::new(),
            quota: quota_for(&config),
            config,
        }
    }

    /// Take one token for `caller`, or return how long until one is available
    pub fn check(&self, caller: &CallerIdentity) -> Result<(), Duration> {
        if !self.config.enabled {
            return Ok(());
        }

        let mut bucket = self.buckets.entry(caller.clone()).or_insert_with(|| {
            debug!(caller = %caller, "Creating new rate limit bucket");
            TokenBucket::new(self.quota)
        });
        bucket.check()
    }

    /// Drop buckets idle for longer than `max_age`
    pub fn cleanup(&self, max_age: Duration) {
        let now = Instant::now();
        self.buckets.retain(|caller, bucket| {
            let age = now.duration_since(bucket.last_access);
            if age > max_age {
                debug!(caller = %caller, age_secs = age.as_secs(), "Removing stale rate limit bucket");
                false
            } else {
                true
            }
        });
    }

    /// Get number of tracked callers
    pub fn bucket_count(&self) -> usize {
        self.buckets.len()
    }

    pub fn config(&self) -> &RateLimitConfig {
        &self.config
    }
}

/// Rate limit layer
#[derive(Clone)]
pub struct RateLimitLayer {
    state: Arc<RateLimitState>,
    metrics: Arc<GatewayMetrics>,
}

impl RateLimitLayer {
    pub fn new(config: RateLimitConfig, metrics: Arc<GatewayMetrics>) -> Self {
        Self {
            state: Arc::new(RateLimitState::new(config)),
            metrics,
        }
    }

    pub fn state(&self) -> Arc<RateLimitState> {
        Arc::clone(&self.state)
    }
}

impl<S> Layer<S> for RateLimitLayer {
    type Service = RateLimitService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        RateLimitService {
            inner,
            state: Arc::clone(&self.state),
            metrics: Arc::clone(&self.metrics),
        }
    }
}

/// Rate limit service
#[derive(Clone)]
pub struct RateLimitService<S> {
    inner: S,
    state: Arc<RateLimitState>,
    metrics: Arc<GatewayMetrics>,
}

impl<S> Service<Request<Body>> for RateLimitService<S>
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

    fn call(&mut self, req: Request<Body>) -> Self::Future {
        let state = Arc::clone(&self.state);
        let metrics = Arc::clone(&self.metrics);
        let mut inner = self.inner.clone();

        Box::pin(async move {
            let caller = caller_identity(&req, state.config().trust_forwarded_for);

            match state.check(&caller) {
                Ok(()) => inner.call(req).await,
                Err(wait) => {
                    let retry_after_secs = retry_after_secs(wait);
                    warn!(
                        caller = %caller,
                        retry_after_secs = retry_after_secs,
                        "Rate limit exceeded"
                    );
                    metrics.record_rate_limit_rejection();
                    Ok(ApiError::rate_limited(retry_after_secs).into_response())
                }
            }
        })
    }
}

/// Whole seconds until the next token, never less than one
fn retry_after_secs(wait: Duration) -> u64 {
    let millis = wait.as_millis() as u64;
    millis.div_ceil(1000).max(1)
}

/// Resolve who is calling.
///
/// A presented API key wins over the network address, so distinct keys behind
/// one address get distinct buckets. `X-Forwarded-For` is only honoured when the gateway sits behind a trusted
/// proxy; otherwise any client could pick its own bucket.
pub fn caller_identity<B>(req: &Request<B>, trust_forwarded_for: bool) -> CallerIdentity {
    if let Some(AdmittedKey(key)) = req.extensions().get::<AdmittedKey>() {
        return CallerIdentity::Key(key.clone());
    }

    let presented = req
        .headers()
        .get(API_KEY_HEADER)
        .and_then(|h| h.to_str().ok())
        .map(str::trim)
        .filter(|key| !key.is_empty());
    if let Some(key) = presented {
        return CallerIdentity::Key(key.to_string());
    }

    if trust_forwarded_for {
        let forwarded = req
            .headers()
            .get("x-forwarded-for")
            .and_then(|h| h.to_str().ok())
            .and_then(|v| v.split(',').next())
            .map(str::trim)
            .filter(|ip| !ip.is_empty());
        if let Some(ip) = forwarded {
            return CallerIdentity::Address(ip.to_string());
        }
    }

    if let Some(ConnectInfo(addr)) = req.extensions().get::<ConnectInfo<SocketAddr>>() {
        return CallerIdentity::Address(addr.ip().to_string());
    }

    CallerIdentity::Address("unknown".to_string())
}

/// Background task to clean up stale rate limit buckets
pub async fn cleanup_task(state: Arc<RateLimitState>, interval: Duration, max_age: Duration) {
    let mut cleanup_interval = tokio::time::interval(interval);
    cleanup_interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

    loop {
        cleanup_interval.tick().await;
        state.cleanup(max_age);
    }
}
