//! # Feed Gateway Benchmarks
//!
//! Hot-path costs paid on every `/api/posts` request:
//!
//! | Path | Target |
//! |------|--------|
//! | Cache hit lookup | < 1µs |
//! | API key lookup (constant-time scan) | < 1µs for 100 keys |
//! | Origin host extraction | < 1µs |

use bytes::Bytes;
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use feed_gateway::domain::origin_host;
use feed_gateway::{ApiKeyRegistry, ResourceKey, ResponseCache};
use std::time::Duration;

fn bench_cache_lookup(c: &mut Criterion) {
    let mut group = c.benchmark_group("response-cache");

    let cache = ResponseCache::new(Duration::from_secs(300));
    for limit in 1..=20 {
        cache.store(
            ResourceKey::new("123", limit),
            Bytes::from(vec![b'x'; 4096]),
        );
    }

    let hit = ResourceKey::new("123", 5);
    group.bench_function("lookup_hit", |b| b.iter(|| black_box(cache.lookup(&hit))));

    let miss = ResourceKey::new("456", 5);
    group.bench_function("lookup_miss", |b| b.iter(|| black_box(cache.lookup(&miss))));

    group.finish();
}

fn bench_key_lookup(c: &mut Criterion) {
    let mut group = c.benchmark_group("api-key-registry");

    for size in [1usize, 10, 100] {
        let raw = (0..size)
            .map(|i| format!("key-{:04}:site{}.example", i, i))
            .collect::<Vec<_>>()
            .join(",");
        let registry = ApiKeyRegistry::parse(&raw).expect("valid registry");
        let last = format!("key-{:04}", size - 1);

        group.bench_with_input(BenchmarkId::new("domain_for", size), &last, |b, key| {
            b.iter(|| black_box(registry.domain_for(key)))
        });
    }

    group.finish();
}

fn bench_origin_host(c: &mut Criterion) {
    c.bench_function("origin_host", |b| {
        b.iter(|| black_box(origin_host(black_box("https://Shop.Example.com:8443"))))
    });
}

criterion_group!(benches, bench_cache_lookup, bench_key_lookup, bench_origin_host);
criterion_main!(benches);
