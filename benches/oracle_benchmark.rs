//! Oracle hot-path benchmarks.
//!
//! Covers the pieces every unauthorized query touches:
//! - deferred transform append, flatten and apply
//! - sliding-window rank insertion
//! - full keyed and unkeyed queries
//! - dataset construction and corruption

#![allow(missing_docs)]

use std::sync::Arc;

use criterion::{BenchmarkId, Criterion, Throughput, black_box, criterion_group, criterion_main};

use tarnish::algebra::RankTracker;
use tarnish::dataset::{CorruptionPipeline, LineSetBuilder};
use tarnish::oracle::{DeferredTransform, Intensity, RowOpBatch};
use tarnish::util::{DetRng, digest_parts};
use tarnish::{AccessKey, DataSource, Gf4Vec, new_oracle};

// ============================================================================
// Transform benchmarks
// ============================================================================

fn bench_transform(c: &mut Criterion) {
    let mut group = c.benchmark_group("transform");

    let batches: Vec<RowOpBatch> = (0u32..64)
        .map(|i| RowOpBatch::generate(&digest_parts(&[&i.to_le_bytes()]), Intensity::Major))
        .collect();

    for &threshold in &[1usize, 8, 32] {
        group.bench_with_input(
            BenchmarkId::new("extend_batches", threshold),
            &threshold,
            |b, &threshold| {
                b.iter(|| {
                    let mut t = DeferredTransform::new(threshold);
                    for batch in &batches {
                        t.extend(black_box(batch));
                    }
                    t
                });
            },
        );

        // Apply with a half-full pending log
        let mut t = DeferredTransform::new(threshold);
        for op in batches[0].ops().iter().take(threshold / 2) {
            t.append(*op);
        }
        let v = Gf4Vec::from_raw(0x00ab_cdef);
        group.bench_with_input(BenchmarkId::new("apply", threshold), &threshold, |b, _| {
            b.iter(|| black_box(&t).apply(black_box(v)));
        });
    }

    group.finish();
}

// ============================================================================
// Rank benchmarks
// ============================================================================

fn bench_rank(c: &mut Criterion) {
    let mut group = c.benchmark_group("rank");

    let mut rng = DetRng::new(42);
    let vectors: Vec<Gf4Vec> = (0..1024).map(|_| Gf4Vec::from_raw(rng.next_u32())).collect();
    group.throughput(Throughput::Elements(vectors.len() as u64));

    for &window in &[16usize, 64, 256] {
        group.bench_with_input(BenchmarkId::new("add", window), &window, |b, &window| {
            b.iter(|| {
                let mut tracker = RankTracker::new(window, 8);
                for &v in &vectors {
                    black_box(tracker.add(v));
                }
            });
        });
    }

    group.finish();
}

// ============================================================================
// Query benchmarks
// ============================================================================

fn bench_query(c: &mut Criterion) {
    let mut group = c.benchmark_group("query");

    let set = LineSetBuilder::new().real(100).decoy(100).seed(7).build().unwrap();
    let dataset = Arc::new(CorruptionPipeline::standard(7).run(set.dataset, &set.adjacency));
    let adjacency = Arc::new(set.adjacency);
    let key = AccessKey::from_seed(99);
    let len = dataset.len();
    group.throughput(Throughput::Elements(1));

    group.bench_function("keyed", |b| {
        let mut oracle = new_oracle(dataset.clone(), adjacency.clone(), key, b"bench").unwrap();
        let mut k = 0usize;
        b.iter(|| {
            k = k.wrapping_add(1);
            black_box(oracle.query(k * 617 % len, Some(&key)).unwrap())
        });
    });

    group.bench_function("unkeyed_wide", |b| {
        let mut oracle = new_oracle(dataset.clone(), adjacency.clone(), key, b"bench").unwrap();
        let mut k = 0usize;
        b.iter(|| {
            k = k.wrapping_add(1);
            black_box(oracle.query(k * 617 % len, None).unwrap())
        });
    });

    group.bench_function("unkeyed_narrow", |b| {
        let mut oracle = new_oracle(dataset.clone(), adjacency.clone(), key, b"bench").unwrap();
        let mut k = 0usize;
        b.iter(|| {
            k = k.wrapping_add(1);
            black_box(oracle.query(500 + k % 8, None).unwrap())
        });
    });

    group.finish();
}

// ============================================================================
// Dataset benchmarks
// ============================================================================

fn bench_dataset(c: &mut Criterion) {
    let mut group = c.benchmark_group("dataset");
    group.sample_size(20);

    for &lines in &[50usize, 200] {
        group.throughput(Throughput::Elements((lines * 2 * 5) as u64));
        group.bench_with_input(BenchmarkId::new("build_and_corrupt", lines), &lines, |b, &lines| {
            b.iter(|| {
                let set = LineSetBuilder::new()
                    .real(lines)
                    .decoy(lines)
                    .seed(3)
                    .build()
                    .unwrap();
                CorruptionPipeline::standard(3).run(set.dataset, &set.adjacency)
            });
        });
    }

    group.finish();
}

criterion_group!(
    benches,
    bench_transform,
    bench_rank,
    bench_query,
    bench_dataset
);
criterion_main!(benches);
