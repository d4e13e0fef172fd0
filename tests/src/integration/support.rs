//! Shared fixtures: a scripted upstream and a router harness with a manual clock.

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{HeaderMap, Request, StatusCode};
use axum::Router;
use bytes::Bytes;
use feed_gateway::{
    ApiGatewayService, GatewayConfig, GatewayMetrics, Item, ManualTimeSource, Profile,
    ResponseCache, UpstreamClient, UpstreamError,
};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tower::ServiceExt;

/// Upstream double returning scripted results and counting calls.
pub struct FakeUpstream {
    profile: Mutex<Result<Profile, UpstreamError>>,
    items: Mutex<Result<Vec<Item>, UpstreamError>>,
    profile_calls: AtomicUsize,
    items_calls: AtomicUsize,
    last_limit: Mutex<Option<u32>>,
    shutdowns: AtomicUsize,
}

impl FakeUpstream {
    /// A page with `count` posts available
    pub fn with_posts(count: usize) -> Self {
        let items = (1..=count)
            .map(|n| Item {
                id: format!("123_{}", n),
                message: format!("post {}", n),
                created_time: format!("2024-05-0{}T10:00:00+0000", n % 9 + 1),
                full_picture: None,
                permalink_url: format!("https://www.facebook.com/123/posts/{}", n),
            })
            .collect();
        Self::new(Ok(sample_profile()), Ok(items))
    }

    pub fn new(
        profile: Result<Profile, UpstreamError>,
        items: Result<Vec<Item>, UpstreamError>,
    ) -> Self {
        Self {
            profile: Mutex::new(profile),
            items: Mutex::new(items),
            profile_calls: AtomicUsize::new(0),
            items_calls: AtomicUsize::new(0),
            last_limit: Mutex::new(None),
            shutdowns: AtomicUsize::new(0),
        }
    }

    /// Both reads fail with `error`
    pub fn failing(error: UpstreamError) -> Self {
        Self::new(Err(error.clone()), Err(error))
    }

    /// Replace the scripted profile result
    pub fn set_profile(&self, profile: Result<Profile, UpstreamError>) {
        *self.profile.lock() = profile;
    }

    pub fn profile_calls(&self) -> usize {
        self.profile_calls.load(Ordering::SeqCst)
    }

    pub fn items_calls(&self) -> usize {
        self.items_calls.load(Ordering::SeqCst)
    }

    pub fn last_limit(&self) -> Option<u32> {
        *self.last_limit.lock()
    }

    pub fn shutdowns(&self) -> usize {
        self.shutdowns.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl UpstreamClient for FakeUpstream {
    async fn fetch_page_profile(&self, resource_id: &str) -> Result<Profile, UpstreamError> {
        self.profile_calls.fetch_add(1, Ordering::SeqCst);
        self.profile.lock().clone().map(|mut p| {
            p.id = resource_id.to_string();
            p
        })
    }

    async fn fetch_recent_items(
        &self,
        _resource_id: &str,
        limit: u32,
    ) -> Result<Vec<Item>, UpstreamError> {
        self.items_calls.fetch_add(1, Ordering::SeqCst);
        *self.last_limit.lock() = Some(limit);
        self.items
            .lock()
            .clone()
            .map(|items| items.into_iter().take(limit as usize).collect())
    }

    async fn shutdown(&self) {
        self.shutdowns.fetch_add(1, Ordering::SeqCst);
    }
}

pub fn sample_profile() -> Profile {
    Profile {
        id: "123".into(),
        name: "Corner Bakery".into(),
        picture_url: "https://cdn.example/bakery.jpg".into(),
    }
}

/// Default test configuration: open mode, page `123`, metrics on.
pub fn open_config() -> GatewayConfig {
    let mut config = GatewayConfig::default();
    config.upstream.default_page_id = Some("123".into());
    config.metrics.enabled = true;
    config
}

/// Enforced mode with two keys.
pub fn enforced_config() -> GatewayConfig {
    let mut config = open_config();
    config.auth.api_keys = "key-a:example.com,key-b:localhost:3000".into();
    config
}

/// Router plus handles on everything a test wants to observe.
pub struct Harness {
    pub router: Router,
    pub service: ApiGatewayService,
    pub upstream: Arc<FakeUpstream>,
    pub clock: Arc<ManualTimeSource>,
    pub cache: Arc<ResponseCache>,
    pub metrics: Arc<GatewayMetrics>,
}

impl Harness {
    pub fn new(config: GatewayConfig, upstream: FakeUpstream) -> Self {
        let upstream = Arc::new(upstream);
        let clock = Arc::new(ManualTimeSource::new());
        let cache = Arc::new(ResponseCache::with_time_source(
            config.cache.ttl,
            clock.clone(),
        ));
        let service = ApiGatewayService::with_cache(config, upstream.clone(), Arc::clone(&cache))
            .expect("valid test configuration");
        let router = service.router();
        let metrics = service.metrics();

        Self {
            router,
            service,
            upstream,
            clock,
            cache,
            metrics,
        }
    }

    /// `GET uri` with no extra headers
    pub async fn get(&self, uri: &str) -> TestResponse {
        self.get_with(uri, &[]).await
    }

    /// `GET uri` with the given headers
    pub async fn get_with(&self, uri: &str, headers: &[(&str, &str)]) -> TestResponse {
        let mut builder = Request::builder().method("GET").uri(uri);
        for (name, value) in headers {
            builder = builder.header(*name, *value);
        }
        self.send(builder.body(Body::empty()).expect("valid request"))
            .await
    }

    pub async fn send(&self, request: Request<Body>) -> TestResponse {
        let response = self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("router is infallible");
        let status = response.status();
        let headers = response.headers().clone();
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("body collects");
        TestResponse {
            status,
            headers,
            body,
        }
    }
}

/// Collected response
#[derive(Debug)]
pub struct TestResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Bytes,
}

impl TestResponse {
    pub fn json(&self) -> serde_json::Value {
        serde_json::from_slice(&self.body).expect("JSON body")
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    /// The `error` field of the error envelope
    pub fn error_message(&self) -> String {
        self.json()["error"]
            .as_str()
            .expect("error envelope")
            .to_string()
    }
}
