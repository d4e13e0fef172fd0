//! # Read Pipeline Flows
//!
//! `GET /api/posts` end to end in open mode: cache behaviour, query
//! validation, and upstream error mapping.

#[cfg(test)]
mod tests {
    use super::super::support::{open_config, FakeUpstream, Harness};
    use axum::http::StatusCode;
    use feed_gateway::UpstreamError;
    use std::time::Duration;

    // =============================================================================
    // CACHE
    // =============================================================================

    #[tokio::test]
    async fn test_miss_then_hit_is_byte_identical() {
        let h = Harness::new(open_config(), FakeUpstream::with_posts(5));

        let first = h.get("/api/posts?page_id=123&limit=3").await;
        assert_eq!(first.status, StatusCode::OK);
        assert_eq!(first.header("x-cache"), Some("MISS"));
        assert_eq!(first.header("cache-control"), Some("public, max-age=300"));
        assert_eq!(first.header("content-type"), Some("application/json"));

        h.clock.advance(Duration::from_secs(100));
        let second = h.get("/api/posts?page_id=123&limit=3").await;
        assert_eq!(second.status, StatusCode::OK);
        assert_eq!(second.header("x-cache"), Some("HIT"));
        assert_eq!(second.header("cache-control"), Some("public, max-age=200"));
        assert_eq!(first.body, second.body);

        assert_eq!(h.upstream.profile_calls(), 1);
        assert_eq!(h.upstream.items_calls(), 1);
    }

    #[tokio::test]
    async fn test_expired_entry_triggers_one_refetch() {
        let h = Harness::new(open_config(), FakeUpstream::with_posts(5));

        h.get("/api/posts?limit=2").await;
        h.clock.advance(Duration::from_secs(300));

        let refreshed = h.get("/api/posts?limit=2").await;
        assert_eq!(refreshed.header("x-cache"), Some("MISS"));
        assert_eq!(h.upstream.items_calls(), 2);

        let again = h.get("/api/posts?limit=2").await;
        assert_eq!(again.header("x-cache"), Some("HIT"));
        assert_eq!(h.upstream.items_calls(), 2);
    }

    #[tokio::test]
    async fn test_limits_do_not_share_entries() {
        let h = Harness::new(open_config(), FakeUpstream::with_posts(5));

        let three = h.get("/api/posts?limit=3").await;
        let four = h.get("/api/posts?limit=4").await;

        assert_eq!(three.header("x-cache"), Some("MISS"));
        assert_eq!(four.header("x-cache"), Some("MISS"));
        assert_eq!(three.json()["posts"].as_array().unwrap().len(), 3);
        assert_eq!(four.json()["posts"].as_array().unwrap().len(), 4);
        assert_eq!(h.upstream.items_calls(), 2);
        assert_eq!(h.cache.len(), 2);
    }

    #[tokio::test]
    async fn test_success_body_shape() {
        let h = Harness::new(open_config(), FakeUpstream::with_posts(5));

        let response = h.get("/api/posts").await;
        let body = response.json();

        assert_eq!(body["page"]["id"], "123");
        assert_eq!(body["page"]["name"], "Corner Bakery");
        assert_eq!(body["page"]["picture_url"], "https://cdn.example/bakery.jpg");
        let posts = body["posts"].as_array().unwrap();
        assert_eq!(posts.len(), 5);
        assert_eq!(posts[0]["message"], "post 1");
        assert!(posts[0]["full_picture"].is_null());
        assert_eq!(h.upstream.last_limit(), Some(5));
    }

    // =============================================================================
    // QUERY VALIDATION
    // =============================================================================

    #[tokio::test]
    async fn test_invalid_queries_rejected_before_upstream() {
        let h = Harness::new(open_config(), FakeUpstream::with_posts(5));

        for uri in [
            "/api/posts?limit=0",
            "/api/posts?limit=21",
            "/api/posts?limit=abc",
            "/api/posts?limit=-1",
            "/api/posts?page_id=me%2Faccounts",
            "/api/posts?page_id=..",
        ] {
            let response = h.get(uri).await;
            assert_eq!(response.status, StatusCode::UNPROCESSABLE_ENTITY, "{}", uri);
            assert_eq!(response.header("cache-control"), Some("no-store"));
            assert!(!response.error_message().is_empty());
        }

        assert_eq!(h.upstream.profile_calls(), 0);
        assert!(h.cache.is_empty());
    }

    #[tokio::test]
    async fn test_missing_page_id_is_server_error() {
        let mut config = open_config();
        config.upstream.default_page_id = None;
        let h = Harness::new(config, FakeUpstream::with_posts(1));

        let response = h.get("/api/posts").await;
        assert_eq!(response.status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(response.error_message(), "Page id is not configured");

        // A page named in the query still works
        let named = h.get("/api/posts?page_id=456").await;
        assert_eq!(named.status, StatusCode::OK);
        assert_eq!(named.json()["page"]["id"], "456");
    }

    // =============================================================================
    // UPSTREAM ERROR MAPPING
    // =============================================================================

    #[tokio::test]
    async fn test_upstream_errors_map_to_status() {
        let cases = [
            (
                UpstreamError::Forbidden("(#200) Requires pages_read_engagement".into()),
                StatusCode::FORBIDDEN,
                "(#200) Requires pages_read_engagement",
            ),
            (
                UpstreamError::Unauthenticated("Error validating access token".into()),
                StatusCode::INTERNAL_SERVER_ERROR,
                "Error validating access token",
            ),
            (
                UpstreamError::ResourceNotFound("Unsupported get request".into()),
                StatusCode::NOT_FOUND,
                "Unsupported get request",
            ),
            (
                UpstreamError::RateLimited("Application request limit reached".into()),
                StatusCode::TOO_MANY_REQUESTS,
                "Application request limit reached",
            ),
            (
                UpstreamError::Unknown("Something odd".into()),
                StatusCode::BAD_GATEWAY,
                "Something odd",
            ),
            (
                UpstreamError::Misconfigured("upstream access token is not configured".into()),
                StatusCode::INTERNAL_SERVER_ERROR,
                "upstream access token is not configured",
            ),
            (
                UpstreamError::Transport("connection reset by 10.1.2.3".into()),
                StatusCode::INTERNAL_SERVER_ERROR,
                "Internal server error",
            ),
        ];

        for (error, status, message) in cases {
            let h = Harness::new(open_config(), FakeUpstream::failing(error));
            let response = h.get("/api/posts").await;

            assert_eq!(response.status, status);
            assert_eq!(response.error_message(), message);
            assert_eq!(response.header("cache-control"), Some("no-store"));
            assert!(response.header("x-cache").is_none());
        }
    }

    #[tokio::test]
    async fn test_partial_failure_is_not_cached() {
        let h = Harness::new(open_config(), FakeUpstream::with_posts(3));
        h.upstream
            .set_profile(Err(UpstreamError::Forbidden("no access".into())));

        let failed = h.get("/api/posts").await;
        assert_eq!(failed.status, StatusCode::FORBIDDEN);
        assert_eq!(failed.json(), serde_json::json!({ "error": "no access" }));
        assert!(h.cache.is_empty());

        h.upstream.set_profile(Ok(super::super::support::sample_profile()));
        let recovered = h.get("/api/posts").await;
        assert_eq!(recovered.status, StatusCode::OK);
        assert_eq!(recovered.header("x-cache"), Some("MISS"));
        assert_eq!(h.upstream.profile_calls(), 2);
    }

    // =============================================================================
    // PUBLIC ROUTES
    // =============================================================================

    #[tokio::test]
    async fn test_health() {
        let h = Harness::new(open_config(), FakeUpstream::with_posts(1));
        let response = h.get("/health").await;

        assert_eq!(response.status, StatusCode::OK);
        assert_eq!(response.json(), serde_json::json!({ "status": "ok" }));
        assert!(response.header("x-request-id").is_some());
    }

    #[tokio::test]
    async fn test_widget_and_demo_templated() {
        let h = Harness::new(open_config(), FakeUpstream::with_posts(1));

        let widget = h
            .get_with(
                "/widget.js",
                &[("host", "feed.example.com"), ("x-forwarded-proto", "https")],
            )
            .await;
        assert_eq!(widget.status, StatusCode::OK);
        assert_eq!(
            widget.header("cache-control"),
            Some("no-cache, no-store, must-revalidate")
        );
        let script = String::from_utf8(widget.body.to_vec()).unwrap();
        assert!(script.contains("https://feed.example.com"));
        assert!(!script.contains("__BASE_URL__"));

        let demo = h.get_with("/", &[("host", "localhost:8000")]).await;
        assert_eq!(demo.status, StatusCode::OK);
        let html = String::from_utf8(demo.body.to_vec()).unwrap();
        assert!(html.contains("http://localhost:8000/widget.js"));
    }

    #[tokio::test]
    async fn test_metrics_route() {
        let h = Harness::new(open_config(), FakeUpstream::with_posts(2));
        h.get("/api/posts").await;
        h.get("/api/posts").await;

        let response = h.get("/metrics").await;
        assert_eq!(response.status, StatusCode::OK);
        let metrics = response.json();
        assert_eq!(metrics["cache"]["hits"], 1);
        assert_eq!(metrics["cache"]["misses"], 1);
        assert_eq!(metrics["cache"]["entries"], 1);
        assert_eq!(metrics["requests"]["success"], 2);
    }

    #[tokio::test]
    async fn test_metrics_route_disabled() {
        let mut config = open_config();
        config.metrics.enabled = false;
        let h = Harness::new(config, FakeUpstream::with_posts(1));

        assert_eq!(h.get("/metrics").await.status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_request_id_echoed() {
        let h = Harness::new(open_config(), FakeUpstream::with_posts(1));
        let response = h
            .get_with("/api/posts", &[("x-request-id", "req-42")])
            .await;
        assert_eq!(response.header("x-request-id"), Some("req-42"));
    }

    #[tokio::test]
    async fn test_shutdown_releases_upstream_once() {
        let h = Harness::new(open_config(), FakeUpstream::with_posts(1));
        h.service.shutdown().await;
        h.service.shutdown().await;
        assert_eq!(h.upstream.shutdowns(), 1);
    }
}
