//! Outbound ports for the gateway.

use crate::domain::{Item, Profile, UpstreamError};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::time::{Duration, Instant};

/// Read-only access to the upstream page API.
///
/// Implementations normalize successful responses and classify failures;
/// they never retry.
#[async_trait]
pub trait UpstreamClient: Send + Sync {
    /// Fetch the page profile for `resource_id`
    async fn fetch_page_profile(&self, resource_id: &str) -> Result<Profile, UpstreamError>;

    /// Fetch the `limit` most recent items for `resource_id`
    async fn fetch_recent_items(
        &self,
        resource_id: &str,
        limit: u32,
    ) -> Result<Vec<Item>, UpstreamError>;

    /// Release the outbound connection pool (called once at teardown)
    async fn shutdown(&self) {}
}

/// Monotonic time source trait for testability
pub trait TimeSource: Send + Sync {
    fn now(&self) -> Instant;
}

/// System monotonic clock
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemTimeSource;

impl TimeSource for SystemTimeSource {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

/// Manually advanced clock for tests and simulations
#[derive(Debug)]
pub struct ManualTimeSource {
    now: Mutex<Instant>,
}

impl ManualTimeSource {
    pub fn new() -> Self {
        Self {
            now: Mutex::new(Instant::now()),
        }
    }

    /// Move the clock forward by `by`
    pub fn advance(&self, by: Duration) {
        *self.now.lock() += by;
    }
}

impl Default for ManualTimeSource {
    fn default() -> Self {
        Self::new()
    }
}

impl TimeSource for ManualTimeSource {
    fn now(&self) -> Instant {
        *self.now.lock()
    }
}
