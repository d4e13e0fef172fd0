//! Feed gateway service - router composition and server lifecycle.

use crate::assets;
use crate::domain::config::GatewayConfig;
use crate::domain::error::GatewayError;
use crate::domain::ResponseCache;
use crate::middleware::{cleanup_task, GatewayMetrics, MiddlewareStack};
use crate::ports::UpstreamClient;
use crate::router::{get_posts, health_check, metrics_snapshot, AppState};
use axum::{routing::get, Router};
use std::future::Future;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tower::ServiceBuilder;
use tracing::{info, warn};

/// One step of a `GET /api/posts` request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Cors,
    Authorize,
    RateLimit,
    CacheLookup,
    Upstream,
    CacheStore,
}

/// Order in which a read request passes through the gateway.
///
/// The first three stages are tower layers composed in [`build_router`];
/// the rest run inside [`get_posts`]. A rejection at any stage ends the
/// request with a single error response.
pub const READ_PIPELINE: [Stage; 6] = [
    Stage::Cors,
    Stage::Authorize,
    Stage::RateLimit,
    Stage::CacheLookup,
    Stage::Upstream,
    Stage::CacheStore,
];

/// Compose the full router from handler state and middleware.
pub fn build_router(state: AppState, stack: &MiddlewareStack, metrics_enabled: bool) -> Router {
    // Authorize runs before RateLimit; ServiceBuilder applies the first layer outermost
    let protected = ServiceBuilder::new()
        .layer(stack.auth.clone())
        .layer(stack.rate_limit.clone());

    let api = Router::new()
        .route("/api/posts", get(get_posts))
        .route_layer(protected);

    let mut public = Router::new()
        .route("/", get(assets::demo_page))
        .route("/widget.js", get(assets::widget_script))
        .route("/health", get(health_check));
    if metrics_enabled {
        public = public.route("/metrics", get(metrics_snapshot));
    }

    api.merge(public)
        .layer(
            ServiceBuilder::new()
                .layer(stack.tracing.clone())
                .layer(stack.cors.clone()),
        )
        .with_state(state)
}

/// Feed gateway service state
pub struct ApiGatewayService {
    config: GatewayConfig,
    upstream: Arc<dyn UpstreamClient>,
    cache: Arc<ResponseCache>,
    stack: MiddlewareStack,
    upstream_released: AtomicBool,
}

impl ApiGatewayService {
    /// Create a new gateway service
    pub fn new(config: GatewayConfig, upstream: Arc<dyn UpstreamClient>) -> Result<Self, GatewayError> {
        let cache = Arc::new(ResponseCache::new(config.cache.ttl));
        Self::with_cache(config, upstream, cache)
    }

    /// Create a gateway service around an existing cache
    pub fn with_cache(
        config: GatewayConfig,
        upstream: Arc<dyn UpstreamClient>,
        cache: Arc<ResponseCache>,
    ) -> Result<Self, GatewayError> {
        config
            .validate()
            .map_err(|e| GatewayError::Config(e.to_string()))?;

        let stack =
            MiddlewareStack::from_config(&config).map_err(|e| GatewayError::Config(e.to_string()))?;

        info!(
            auth_mode = stack.authorizer().mode_name(),
            cache_ttl_secs = config.cache.ttl.as_secs(),
            requests_per_window = config.rate_limit.requests_per_window,
            window_secs = config.rate_limit.window.as_secs(),
            "Feed gateway configured"
        );

        Ok(Self {
            config,
            upstream,
            cache,
            stack,
            upstream_released: AtomicBool::new(false),
        })
    }

    /// Build the router serving every endpoint
    pub fn router(&self) -> Router {
        let state = AppState {
            cache: Arc::clone(&self.cache),
            upstream: Arc::clone(&self.upstream),
            metrics: self.stack.metrics(),
            default_page_id: self.config.upstream.default_page_id.clone(),
        };
        build_router(state, &self.stack, self.config.metrics.enabled)
    }

    /// Bind the configured address and serve until `shutdown` resolves.
    ///
    /// The upstream pool is released once the server has drained.
    pub async fn serve<F>(&self, shutdown: F) -> Result<(), GatewayError>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let addr = self.config.http_addr();
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|e| GatewayError::Bind(format!("{}: {}", addr, e)))?;
        self.serve_on(listener, shutdown).await
    }

    /// Serve on an already bound listener.
    pub async fn serve_on<F>(&self, listener: TcpListener, shutdown: F) -> Result<(), GatewayError>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let local_addr = listener
            .local_addr()
            .map_err(|e| GatewayError::Bind(e.to_string()))?;

        let cleanup = self.start_cleanup_task();
        let app = self.router();

        info!(addr = %local_addr, "Feed gateway listening");
        let result = axum::serve(
            listener,
            app.into_make_service_with_connect_info::<SocketAddr>(),
        )
        .with_graceful_shutdown(shutdown)
        .await
        .map_err(|e| GatewayError::Serve(e.to_string()));

        cleanup.abort();
        self.shutdown().await;
        info!("Feed gateway stopped");
        result
    }

    /// Release upstream resources; later calls are no-ops
    pub async fn shutdown(&self) {
        if self.upstream_released.swap(true, Ordering::SeqCst) {
            return;
        }
        self.upstream.shutdown().await;
    }

    /// Get metrics
    pub fn metrics(&self) -> Arc<GatewayMetrics> {
        self.stack.metrics()
    }

    pub fn cache(&self) -> Arc<ResponseCache> {
        Arc::clone(&self.cache)
    }

    /// Start background cleanup of idle rate-limit buckets
    fn start_cleanup_task(&self) -> JoinHandle<()> {
        let state = self.stack.rate_limit_state();
        let interval = self.config.rate_limit.cleanup_interval;
        // A bucket idle for a whole window is full again, so dropping it is invisible
        let max_age = self.config.rate_limit.window;
        if interval.is_zero() {
            warn!("Rate limit cleanup disabled (zero interval)");
            return tokio::spawn(async {});
        }
        tokio::spawn(async move { cleanup_task(state, interval, max_age).await })
    }
}
