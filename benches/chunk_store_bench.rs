//! Benchmarks for the Chunked Object Store's hot paths: hashing, chunked
//! write/read, and deep integrity verification, across sizes that straddle
//! the chunk boundary.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use tempfile::TempDir;

use lob_core::hash::Sha1Hash;
use lob_core::store::{ChunkedObjectStore, CHUNK_SIZE};

fn filler_bytes(len: usize, seed: u8) -> Vec<u8> {
    (0..len).map(|i| (i as u8).wrapping_mul(31).wrapping_add(seed)).collect()
}

fn bench_hash_computation(c: &mut Criterion) {
    let mut group = c.benchmark_group("hash_computation");

    for size in [1_000usize, 100_000, 1_000_000] {
        let data = filler_bytes(size, 1);

        group.throughput(Throughput::Bytes(size as u64));
        group.bench_with_input(BenchmarkId::from_parameter(size), &data, |b, data| {
            b.iter(|| Sha1Hash::compute(black_box(data)));
        });
    }

    group.finish();
}

/// Write then read a freshly-stored LOB, at sizes below one chunk, exactly
/// one chunk, and spanning two.
fn bench_store_and_retrieve(c: &mut Criterion) {
    let mut group = c.benchmark_group("store_and_retrieve");

    let sizes: &[(&str, usize)] =
        &[("quarter_chunk", CHUNK_SIZE as usize / 4), ("one_chunk", CHUNK_SIZE as usize), ("two_chunks_plus", CHUNK_SIZE as usize + 4096)];

    for (label, size) in sizes {
        let data = filler_bytes(*size, 2);
        group.throughput(Throughput::Bytes(*size as u64));

        group.bench_with_input(BenchmarkId::new("store", label), &data, |b, data| {
            b.iter_batched(
                || TempDir::new().unwrap(),
                |dir| {
                    let store = ChunkedObjectStore::new(dir.path(), None).unwrap();
                    black_box(store.store(&[], data.as_slice()).unwrap());
                },
                criterion::BatchSize::LargeInput,
            );
        });

        let dir = TempDir::new().unwrap();
        let store = ChunkedObjectStore::new(dir.path(), None).unwrap();
        let info = store.store(&[], data.as_slice()).unwrap();

        group.bench_with_input(BenchmarkId::new("retrieve", label), &info.sha, |b, sha| {
            b.iter(|| {
                let mut out = Vec::with_capacity(*size);
                store.retrieve(black_box(sha), &mut out, false, None).unwrap();
                black_box(&out);
            });
        });
    }

    group.finish();
}

/// Shallow vs. deep `check_files`, where deep re-hashes every chunk on disk.
fn bench_check_files(c: &mut Criterion) {
    let mut group = c.benchmark_group("check_files");

    for size in [CHUNK_SIZE as usize / 4, CHUNK_SIZE as usize * 2] {
        let data = filler_bytes(size, 3);
        let dir = TempDir::new().unwrap();
        let store = ChunkedObjectStore::new(dir.path(), None).unwrap();
        let info = store.store(&[], data.as_slice()).unwrap();

        group.throughput(Throughput::Bytes(size as u64));

        group.bench_with_input(BenchmarkId::new("shallow", size), &info.sha, |b, sha| {
            b.iter(|| black_box(store.check_files(black_box(sha), false).unwrap()));
        });

        group.bench_with_input(BenchmarkId::new("deep", size), &info.sha, |b, sha| {
            b.iter(|| black_box(store.check_files(black_box(sha), true).unwrap()));
        });
    }

    group.finish();
}

/// Dedup path: storing the same content twice should be cheap the second
/// time, since every chunk already exists on disk.
fn bench_dedup_store(c: &mut Criterion) {
    let mut group = c.benchmark_group("dedup_store");
    let data = filler_bytes(CHUNK_SIZE as usize * 2, 4);
    group.throughput(Throughput::Bytes(data.len() as u64));

    let dir = TempDir::new().unwrap();
    let store = ChunkedObjectStore::new(dir.path(), None).unwrap();
    store.store(&[], data.as_slice()).unwrap();

    group.bench_function("store_existing", |b| {
        b.iter(|| black_box(store.store(&[], data.as_slice()).unwrap()));
    });

    group.finish();
}

criterion_group!(benches, bench_hash_computation, bench_store_and_retrieve, bench_check_files, bench_dedup_store);
criterion_main!(benches);
