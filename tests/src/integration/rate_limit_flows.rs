//! # Rate Limit Flows
//!
//! Per-caller budgets through the composed router.

#[cfg(test)]
mod tests {
    use super::super::support::{enforced_config, open_config, FakeUpstream, Harness};
    use axum::http::StatusCode;
    use std::sync::atomic::Ordering;

    #[tokio::test]
    async fn test_sixty_first_request_is_limited() {
        let h = Harness::new(enforced_config(), FakeUpstream::with_posts(3));

        for n in 0..60 {
            let response = h.get_with("/api/posts", &[("x-api-key", "key-a")]).await;
            assert_eq!(response.status, StatusCode::OK, "request {}", n + 1);
        }

        let limited = h.get_with("/api/posts", &[("x-api-key", "key-a")]).await;
        assert_eq!(limited.status, StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(limited.error_message(), "Rate limit exceeded");
        assert_eq!(limited.header("cache-control"), Some("no-store"));
        let retry_after: u64 = limited.header("retry-after").unwrap().parse().unwrap();
        assert!((1..=60).contains(&retry_after));

        // Another key has its own budget
        let other = h.get_with("/api/posts", &[("x-api-key", "key-b")]).await;
        assert_eq!(other.status, StatusCode::OK);

        assert_eq!(h.metrics.rate_limit_rejected.load(Ordering::Relaxed), 1);
    }

    #[tokio::test]
    async fn test_limited_request_skips_cache_and_upstream() {
        let mut config = enforced_config();
        config.rate_limit.requests_per_window = 2;
        let h = Harness::new(config, FakeUpstream::with_posts(3));

        h.get_with("/api/posts", &[("x-api-key", "key-a")]).await;
        h.get_with("/api/posts", &[("x-api-key", "key-a")]).await;
        let hits_before = h.metrics.cache_hits.load(Ordering::Relaxed);

        let limited = h.get_with("/api/posts", &[("x-api-key", "key-a")]).await;
        assert_eq!(limited.status, StatusCode::TOO_MANY_REQUESTS);
        assert!(limited.header("x-cache").is_none());
        assert_eq!(h.metrics.cache_hits.load(Ordering::Relaxed), hits_before);
        assert_eq!(h.upstream.profile_calls(), 1);
    }

    #[tokio::test]
    async fn test_unauthenticated_requests_never_reach_the_limiter() {
        let mut config = enforced_config();
        config.rate_limit.requests_per_window = 1;
        let h = Harness::new(config, FakeUpstream::with_posts(3));

        for _ in 0..5 {
            let response = h.get_with("/api/posts", &[("x-api-key", "key-z")]).await;
            assert_eq!(response.status, StatusCode::UNAUTHORIZED);
        }
        assert_eq!(h.metrics.rate_limit_rejected.load(Ordering::Relaxed), 0);

        let admitted = h.get_with("/api/posts", &[("x-api-key", "key-a")]).await;
        assert_eq!(admitted.status, StatusCode::OK);
    }

    #[tokio::test]
    async fn test_keys_from_one_address_have_independent_budgets() {
        let mut config = open_config();
        config.rate_limit.requests_per_window = 1;
        let h = Harness::new(config, FakeUpstream::with_posts(3));

        let first = h.get_with("/api/posts", &[("x-api-key", "key-one")]).await;
        let second = h.get_with("/api/posts", &[("x-api-key", "key-two")]).await;
        assert_eq!(first.status, StatusCode::OK);
        assert_eq!(second.status, StatusCode::OK);

        let repeat = h.get_with("/api/posts", &[("x-api-key", "key-one")]).await;
        assert_eq!(repeat.status, StatusCode::TOO_MANY_REQUESTS);

        // Keyless callers fall back to the address bucket
        let keyless = h.get("/api/posts").await;
        assert_eq!(keyless.status, StatusCode::OK);
    }

    #[tokio::test]
    async fn test_forwarded_for_only_when_trusted() {
        let mut config = open_config();
        config.rate_limit.requests_per_window = 1;
        config.rate_limit.trust_forwarded_for = true;
        let trusted = Harness::new(config.clone(), FakeUpstream::with_posts(1));

        for ip in ["203.0.113.1", "203.0.113.2", "203.0.113.3"] {
            let response = trusted
                .get_with("/api/posts", &[("x-forwarded-for", ip)])
                .await;
            assert_eq!(response.status, StatusCode::OK, "{}", ip);
        }

        config.rate_limit.trust_forwarded_for = false;
        let untrusted = Harness::new(config, FakeUpstream::with_posts(1));
        let first = untrusted
            .get_with("/api/posts", &[("x-forwarded-for", "203.0.113.1")])
            .await;
        let second = untrusted
            .get_with("/api/posts", &[("x-forwarded-for", "203.0.113.2")])
            .await;
        assert_eq!(first.status, StatusCode::OK);
        assert_eq!(second.status, StatusCode::TOO_MANY_REQUESTS);
    }

    #[tokio::test]
    async fn test_public_routes_are_not_limited() {
        let mut config = open_config();
        config.rate_limit.requests_per_window = 1;
        let h = Harness::new(config, FakeUpstream::with_posts(1));

        for _ in 0..5 {
            assert_eq!(h.get("/health").await.status, StatusCode::OK);
        }
    }
}
