//! Micro-operation benchmarks for the cache facade.
//!
//! Run with: `cargo bench --bench ops`
//!
//! Measures per-operation latency (nanoseconds) for the read path, the
//! locked and dirty write paths, and per-key lock acquisition under
//! identical conditions.

use std::hint::black_box;
use std::time::{Duration, Instant};

use criterion::{Criterion, Throughput, criterion_group, criterion_main};
use lockcache::{Cache, CacheBuilder, Ttl, TtlCheck};

const WARM_KEYS: u64 = 16_384;
const OPS: u64 = 100_000;

fn plain_cache() -> Cache<u64, u64> {
    CacheBuilder::new()
        .ttl_check_interval(TtlCheck::Disabled)
        .build()
        .unwrap()
}

fn ttl_cache() -> Cache<u64, u64> {
    CacheBuilder::new()
        .ttl_check_interval(TtlCheck::Every(Duration::from_secs(1)))
        .global_ttl(Ttl::After(Duration::from_secs(600)))
        .time_size(8)
        .build()
        .unwrap()
}

// ============================================================================
// Get Hit Latency (ns/op)
// ============================================================================

fn bench_get_hit(c: &mut Criterion) {
    let mut group = c.benchmark_group("get_hit_ns");
    group.throughput(Throughput::Elements(OPS));

    group.bench_function("lock_free_get", |b| {
        b.iter_custom(|iters| {
            let cache = plain_cache();
            for i in 0..WARM_KEYS {
                cache.put(i, i);
            }
            let start = Instant::now();
            for _ in 0..iters {
                for i in 0..OPS {
                    let key = i % WARM_KEYS;
                    black_box(cache.get(&key));
                }
            }
            start.elapsed()
        })
    });

    group.finish();
}

// ============================================================================
// Write Latency (ns/op)
// ============================================================================

fn bench_writes(c: &mut Criterion) {
    let mut group = c.benchmark_group("write_ns");
    group.throughput(Throughput::Elements(OPS));

    group.bench_function("put_locked", |b| {
        b.iter_custom(|iters| {
            let cache = plain_cache();
            let start = Instant::now();
            for _ in 0..iters {
                for i in 0..OPS {
                    cache.put(i % WARM_KEYS, i);
                }
            }
            start.elapsed()
        })
    });

    group.bench_function("dirty_put", |b| {
        b.iter_custom(|iters| {
            let cache = plain_cache();
            let start = Instant::now();
            for _ in 0..iters {
                for i in 0..OPS {
                    cache.dirty_put(i % WARM_KEYS, i);
                }
            }
            start.elapsed()
        })
    });

    group.bench_function("put_with_ttl", |b| {
        b.iter_custom(|iters| {
            let cache = ttl_cache();
            let start = Instant::now();
            for _ in 0..iters {
                for i in 0..OPS {
                    cache.put(i % WARM_KEYS, i);
                }
            }
            start.elapsed()
        })
    });

    group.bench_function("update_locked", |b| {
        b.iter_custom(|iters| {
            let cache = plain_cache();
            for i in 0..WARM_KEYS {
                cache.put(i, 0);
            }
            let start = Instant::now();
            for _ in 0..iters {
                for i in 0..OPS {
                    cache
                        .update(i % WARM_KEYS, |current| {
                            Ok::<u64, std::convert::Infallible>(
                                current.copied().unwrap_or(0) + 1,
                            )
                        })
                        .unwrap();
                }
            }
            start.elapsed()
        })
    });

    group.finish();
}

// ============================================================================
// Per-Key Lock Acquisition (ns/op)
// ============================================================================

fn bench_isolated(c: &mut Criterion) {
    let mut group = c.benchmark_group("isolated_ns");
    group.throughput(Throughput::Elements(OPS));

    group.bench_function("uncontended", |b| {
        b.iter_custom(|iters| {
            let cache = plain_cache();
            let start = Instant::now();
            for _ in 0..iters {
                for i in 0..OPS {
                    black_box(cache.isolated(i % WARM_KEYS, || ()));
                }
            }
            start.elapsed()
        })
    });

    group.bench_function("reentrant", |b| {
        b.iter_custom(|iters| {
            let cache = plain_cache();
            let start = Instant::now();
            for _ in 0..iters {
                for i in 0..OPS {
                    let key = i % WARM_KEYS;
                    black_box(cache.isolated(key, || cache.isolated(key, || ())));
                }
            }
            start.elapsed()
        })
    });

    group.finish();
}

criterion_group!(benches, bench_get_hit, bench_writes, bench_isolated);
criterion_main!(benches);
