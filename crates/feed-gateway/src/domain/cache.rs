//! Response cache keyed by [`ResourceKey`].
//!
//! Entries hold the serialized response body so a hit replays the exact bytes
//! produced by the miss that stored it. There is no background sweep: an
//! expired entry is removed when its key is next looked up or overwritten.

use super::config::MAX_CACHE_TTL;
use super::types::ResourceKey;
use crate::ports::{SystemTimeSource, TimeSource};
use bytes::Bytes;
use dashmap::DashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::debug;

/// Stored response body with its expiry.
#[derive(Debug, Clone)]
struct CacheEntry {
    payload: Bytes,
    expires_at: Instant,
}

/// A fresh cache hit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CachedResponse {
    /// Serialized response body
    pub payload: Bytes,
    /// Time left before the entry expires
    pub remaining: Duration,
}

impl CachedResponse {
    /// Remaining freshness in whole seconds (floored)
    pub fn max_age_secs(&self) -> u64 {
        self.remaining.as_secs()
    }
}

/// Process-local, time-bounded response store.
pub struct ResponseCache {
    entries: DashMap<ResourceKey, CacheEntry>,
    ttl: Duration,
    clock: Arc<dyn TimeSource>,
}

impl ResponseCache {
    /// Create a cache using the system monotonic clock
    pub fn new(ttl: Duration) -> Self {
        Self::with_time_source(ttl, Arc::new(SystemTimeSource))
    }

    /// Create a cache with an injected time source.
    ///
    /// `ttl` is capped at [`MAX_CACHE_TTL`].
    pub fn with_time_source(ttl: Duration, clock: Arc<dyn TimeSource>) -> Self {
        Self {
            entries: DashMap::new(),
            ttl: ttl.min(MAX_CACHE_TTL),
            clock,
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Return the entry for `key` if it is still fresh.
    ///
    /// Missing and expired entries are indistinguishable to the caller; an
    /// expired entry is evicted as part of the lookup.
    pub fn lookup(&self, key: &ResourceKey) -> Option<CachedResponse> {
        let now = self.clock.now();

        if let Some(entry) = self.entries.get(key) {
            if now < entry.expires_at {
                return Some(CachedResponse {
                    payload: entry.payload.clone(),
                    remaining: entry.expires_at - now,
                });
            }
        }

        // Re-check under the shard write lock so a concurrent fresh store
        // is never removed.
        if self
            .entries
            .remove_if(key, |_, entry| now >= entry.expires_at)
            .is_some()
        {
            debug!(key = %key, "Evicted expired cache entry");
        }
        None
    }

    /// Store `payload` under `key`, replacing any previous entry.
    pub fn store(&self, key: ResourceKey, payload: Bytes) -> CachedResponse {
        let expires_at = self.clock.now() + self.ttl;
        self.entries.insert(
            key,
            CacheEntry {
                payload: payload.clone(),
                expires_at,
            },
        );
        CachedResponse {
            payload,
            remaining: self.ttl,
        }
    }

    /// Number of entries held, fresh or not
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
