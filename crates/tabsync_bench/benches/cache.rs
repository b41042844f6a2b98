//! Cache operation benchmarks.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use tabsync_bench::{application_ids, random_payload};
use tabsync_core::{CacheConfig, CommandKind, RecordIndex, SyncCache};

/// Benchmark fresh upserts at increasing cache sizes.
fn bench_upsert(c: &mut Criterion) {
    let mut group = c.benchmark_group("upsert");

    for count in [100usize, 1_000, 10_000] {
        let ids = application_ids(count);
        let payloads: Vec<String> = (0..count).map(|_| random_payload(6)).collect();

        group.throughput(Throughput::Elements(count as u64));
        group.bench_with_input(BenchmarkId::new("insert", count), &count, |b, &count| {
            b.iter(|| {
                let cache = SyncCache::new(CacheConfig::default());
                for i in 0..count {
                    cache
                        .upsert(
                            "NODE",
                            RecordIndex::new(i as u32 + 1),
                            payloads[i].as_str(),
                            Some(ids[i].as_str()),
                            Some("s1"),
                            CommandKind::Indexed,
                        )
                        .unwrap();
                }
                black_box(cache.len());
            });
        });
    }
    group.finish();
}

/// Benchmark the idempotent re-upsert path (the common no-change case).
fn bench_upsert_unchanged(c: &mut Criterion) {
    let cache = SyncCache::new(CacheConfig::default());
    let payload = random_payload(6);
    cache
        .upsert(
            "NODE",
            RecordIndex::new(1),
            payload.as_str(),
            Some("a1"),
            Some("s1"),
            CommandKind::Indexed,
        )
        .unwrap();

    c.bench_function("upsert_unchanged", |b| {
        b.iter(|| {
            let outcome = cache
                .upsert(
                    "NODE",
                    RecordIndex::new(1),
                    payload.as_str(),
                    Some("a1"),
                    Some("s1"),
                    CommandKind::Indexed,
                )
                .unwrap();
            black_box(outcome);
        });
    });
}

/// Benchmark index resolution against a populated allocator.
fn bench_resolve_index(c: &mut Criterion) {
    let mut group = c.benchmark_group("resolve_index");

    group.bench_function("fresh_identity", |b| {
        let cache = SyncCache::new(CacheConfig::default());
        cache.reserve_existing("BEAM", 1..=10_000).unwrap();
        let mut next = 0u64;
        b.iter(|| {
            next += 1;
            let index = cache
                .resolve_index("BEAM", &format!("resolve-{next}"))
                .unwrap();
            black_box(index);
        });
    });

    group.bench_function("repeat_identity", |b| {
        let cache = SyncCache::new(CacheConfig::default());
        cache.resolve_index("BEAM", "stable").unwrap();
        b.iter(|| {
            let index = cache.resolve_index("BEAM", "stable").unwrap();
            black_box(index);
        });
    });

    group.finish();
}

/// Benchmark batch identity lookups.
fn bench_lookup_indices(c: &mut Criterion) {
    let cache = tabsync_testkit::fixtures::cache_with_nodes(10_000);
    let ids: Vec<String> = (1..=1_000u32)
        .map(tabsync_testkit::fixtures::node_app_id)
        .collect();
    let id_refs: Vec<&str> = ids.iter().map(String::as_str).collect();

    let mut group = c.benchmark_group("lookup_indices");
    group.throughput(Throughput::Elements(id_refs.len() as u64));
    group.bench_function("batch_1000", |b| {
        b.iter(|| {
            let found = cache.lookup_indices("NODE", &id_refs).unwrap();
            black_box(found);
        });
    });
    group.finish();
}

criterion_group!(
    benches,
    bench_upsert,
    bench_upsert_unchanged,
    bench_resolve_index,
    bench_lookup_indices
);
criterion_main!(benches);
