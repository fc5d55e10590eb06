//! Vector index benchmarks
//!
//! Run with: cargo bench --bench vector_index
//!
//! - vector_register: one session inserting N vectors, per graph size
//! - vector_search_exact: full scan top-k
//! - vector_search_approximate: graph search across candidate breadths

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::time::Duration;
use strata_engine::{collect_all, DistanceMetric, RawVector, VectorIndex, VectorOptions};
use strata_storage::PageStore;

// ============================================================================
// Utilities
// ============================================================================

/// Fixed seed for reproducible benchmarks
const BENCH_SEED: u64 = 0xDEADBEEF_CAFEBABE;

const DIMENSION: usize = 128;

fn random_vectors(count: usize, dimension: usize) -> Vec<Vec<f32>> {
    let mut rng = StdRng::seed_from_u64(BENCH_SEED);
    (0..count)
        .map(|_| (0..dimension).map(|_| rng.gen_range(-1.0f32..1.0)).collect())
        .collect()
}

fn options() -> VectorOptions {
    VectorOptions::new(16, 64).metric(DistanceMetric::Euclidean)
}

/// Store holding field "emb" populated with `vectors`
fn populated_store(index: &VectorIndex, vectors: &[Vec<f32>]) -> PageStore {
    let store = PageStore::new();
    let mut txn = store.begin_write();
    index.create_field(&mut txn, "emb", options()).unwrap();
    let mut registration = index.open_registration(&mut txn, "emb").unwrap();
    for (i, v) in vectors.iter().enumerate() {
        registration.register_f32(i as u64 + 1, v).unwrap();
    }
    registration.commit().unwrap();
    txn.commit().unwrap();
    store
}

// ============================================================================
// Registration
// ============================================================================

fn vector_register(c: &mut Criterion) {
    let mut group = c.benchmark_group("vector_register");
    group.measurement_time(Duration::from_secs(10));
    let index = VectorIndex::default();

    for count in [100usize, 1_000] {
        let vectors = random_vectors(count, DIMENSION);
        group.throughput(Throughput::Elements(count as u64));
        group.bench_with_input(BenchmarkId::from_parameter(count), &vectors, |b, vectors| {
            b.iter(|| {
                let store = PageStore::new();
                let mut txn = store.begin_write();
                index.create_field(&mut txn, "emb", options()).unwrap();
                let mut registration = index.open_registration(&mut txn, "emb").unwrap();
                for (i, v) in vectors.iter().enumerate() {
                    registration.register_f32(i as u64 + 1, v).unwrap();
                }
                black_box(registration.commit().unwrap());
                txn.rollback();
            });
        });
    }
    group.finish();
}

// ============================================================================
// Search
// ============================================================================

fn vector_search_exact(c: &mut Criterion) {
    let mut group = c.benchmark_group("vector_search_exact");
    let index = VectorIndex::default();
    let vectors = random_vectors(5_000, DIMENSION);
    let store = populated_store(&index, &vectors);
    let query = RawVector::from_f32(&vectors[42]).into_bytes();

    for k in [1usize, 10, 100] {
        group.bench_with_input(BenchmarkId::new("k", k), &k, |b, &k| {
            let read = store.begin_read();
            b.iter(|| {
                let mut search = index.exact_nearest(&read, "emb", k, &query, -1.0).unwrap();
                black_box(collect_all(&mut search))
            });
        });
    }
    group.finish();
}

fn vector_search_approximate(c: &mut Criterion) {
    let mut group = c.benchmark_group("vector_search_approximate");
    let index = VectorIndex::default();
    let vectors = random_vectors(5_000, DIMENSION);
    let store = populated_store(&index, &vectors);
    let query = RawVector::from_f32(&vectors[42]).into_bytes();

    for breadth in [16usize, 64, 256] {
        group.bench_with_input(BenchmarkId::new("breadth", breadth), &breadth, |b, &breadth| {
            let read = store.begin_read();
            b.iter(|| {
                let mut search = index
                    .approximate_nearest(&read, "emb", breadth, &query, -1.0)
                    .unwrap()
                    .limit(10);
                black_box(collect_all(&mut search))
            });
        });
    }
    group.finish();
}

criterion_group!(
    name = vector_register_benches;
    config = Criterion::default().sample_size(10);
    targets = vector_register,
);

criterion_group!(
    name = vector_search_benches;
    config = Criterion::default().sample_size(50);
    targets =
        vector_search_exact,
        vector_search_approximate,
);

criterion_main!(vector_register_benches, vector_search_benches);
