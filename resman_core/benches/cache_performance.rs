//! Cache Performance Benchmarks
//!
//! These benchmarks cover the synchronous paths that run between snapshot and
//! remote call, where a slow cache directly adds to perceived latency.

use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};
use resman_core::{
    CacheData, CacheKey, CacheStore, KeySelector, RecordId, ResourceRecord, SnapshotManager,
};
use std::hint::black_box;
use std::sync::Arc;

/// Store holding `lists` list views and `details` detail views of "limits"
/// plus the same amount of unrelated "users" entries
fn seeded_store(lists: usize, details: usize) -> Arc<CacheStore> {
    let store = Arc::new(CacheStore::new());
    for resource_type in ["limits", "users"] {
        for page in 0..lists {
            let records = (0..20)
                .map(|n| record((page * 20 + n) as i64))
                .collect();
            store.set(
                CacheKey::list(resource_type, [("page", page.to_string())]),
                CacheData::List(records),
            );
        }
        for id in 0..details {
            store.set(
                CacheKey::detail(resource_type, id as i64),
                CacheData::Item(record(id as i64)),
            );
        }
    }
    store
}

fn record(id: i64) -> ResourceRecord {
    ResourceRecord::new()
        .with_id(&RecordId::Num(id))
        .with("name", format!("limit-{id}"))
        .with("active", true)
}

/// Benchmark prefix queries over growing stores
fn bench_prefix_query(c: &mut Criterion) {
    let mut group = c.benchmark_group("prefix_query");

    for &size in &[10usize, 100, 1000] {
        let store = seeded_store(size, size);
        let prefix = CacheKey::list_prefix("limits");
        group.bench_with_input(BenchmarkId::new("list_prefix", size), &size, |b, _| {
            b.iter(|| black_box(store.query_by_prefix(&prefix)));
        });
    }

    group.finish();
}

/// Benchmark snapshot capture and restore of one resource type
fn bench_snapshot_roundtrip(c: &mut Criterion) {
    let mut group = c.benchmark_group("snapshot");

    for &size in &[10usize, 100, 1000] {
        let store = seeded_store(size, size);
        let manager = SnapshotManager::new(Arc::clone(&store));
        let selectors = [
            KeySelector::prefix(CacheKey::list_prefix("limits")),
            KeySelector::exact(CacheKey::detail("limits", 1)),
        ];

        group.bench_with_input(BenchmarkId::new("capture", size), &size, |b, _| {
            b.iter(|| black_box(manager.capture_selectors(&selectors)));
        });
        group.bench_with_input(BenchmarkId::new("capture_restore", size), &size, |b, _| {
            b.iter(|| {
                let snapshot = manager.capture_selectors(&selectors);
                manager.restore(black_box(snapshot));
            });
        });
    }

    group.finish();
}

/// Benchmark marking a list prefix stale
fn bench_mark_stale(c: &mut Criterion) {
    let store = seeded_store(100, 100);
    let selector = KeySelector::prefix(CacheKey::list_prefix("limits"));

    c.bench_function("mark_stale_list_prefix", |b| {
        b.iter(|| black_box(store.mark_stale(&selector)));
    });
}

criterion_group!(
    benches,
    bench_prefix_query,
    bench_snapshot_roundtrip,
    bench_mark_stale
);

criterion_main!(benches);
