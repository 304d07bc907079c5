//! Database operation benchmarks.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use rand::Rng;
use ssikv_bench::utils::{generate_keys, generate_pairs, random_data};
use ssikv_core::KeyValueDb;

/// Benchmark single key writes, waiting for each to be applied.
fn bench_single_write(c: &mut Criterion) {
    let mut group = c.benchmark_group("single_write");

    for size in [64, 256, 1024, 4096].iter() {
        group.throughput(Throughput::Bytes(*size as u64));
        group.bench_with_input(BenchmarkId::from_parameter(size), size, |b, &size| {
            let db = KeyValueDb::open_in_memory().unwrap();
            let data = random_data(size);
            let mut counter = 0u64;

            b.iter(|| {
                counter += 1;
                let handle = db
                    .put_or_update(|txn| {
                        txn.put_or_update(format!("key-{counter}"), black_box(data.clone()))
                    })
                    .unwrap();
                handle.wait().unwrap();
            });
        });
    }
    group.finish();
}

/// Benchmark batch writes.
fn bench_batch_write(c: &mut Criterion) {
    let mut group = c.benchmark_group("batch_write");

    for batch_size in [10, 100, 1000].iter() {
        group.throughput(Throughput::Elements(*batch_size as u64));
        group.bench_with_input(
            BenchmarkId::from_parameter(batch_size),
            batch_size,
            |b, &batch_size| {
                let db = KeyValueDb::open_in_memory().unwrap();
                let pairs = generate_pairs(batch_size, 256);

                b.iter(|| {
                    let handle = db
                        .put_or_update(|txn| {
                            for (key, value) in &pairs {
                                txn.put_or_update(key.clone(), black_box(value.clone()))?;
                            }
                            Ok(())
                        })
                        .unwrap();
                    handle.wait().unwrap();
                });
            },
        );
    }
    group.finish();
}

/// Benchmark single key reads.
fn bench_single_read(c: &mut Criterion) {
    let mut group = c.benchmark_group("single_read");

    for size in [64, 256, 1024, 4096].iter() {
        group.throughput(Throughput::Bytes(*size as u64));
        group.bench_with_input(BenchmarkId::from_parameter(size), size, |b, &size| {
            let db = KeyValueDb::open_in_memory().unwrap();
            db.put_or_update(|txn| txn.put_or_update("HDD", random_data(size)))
                .unwrap()
                .wait()
                .unwrap();

            b.iter(|| {
                let result = db.get(|txn| txn.get(black_box("HDD"))).unwrap();
                black_box(result);
            });
        });
    }
    group.finish();
}

/// Benchmark reads from a populated database.
fn bench_read_populated(c: &mut Criterion) {
    let mut group = c.benchmark_group("read_populated");

    for key_count in [100, 1000, 10000].iter() {
        group.bench_with_input(
            BenchmarkId::from_parameter(key_count),
            key_count,
            |b, &count| {
                let db = KeyValueDb::open_in_memory().unwrap();
                let keys = generate_keys(count);

                db.put_or_update(|txn| {
                    for key in &keys {
                        txn.put_or_update(key.clone(), random_data(256))?;
                    }
                    Ok(())
                })
                .unwrap()
                .wait()
                .unwrap();

                let mut rng = rand::thread_rng();

                b.iter(|| {
                    let idx = rng.gen_range(0..keys.len());
                    let result = db.get(|txn| txn.get(black_box(&keys[idx]))).unwrap();
                    black_box(result);
                });
            },
        );
    }
    group.finish();
}

/// Benchmark read-modify-write transactions on one key.
fn bench_read_modify_write(c: &mut Criterion) {
    c.bench_function("read_modify_write", |b| {
        let db = KeyValueDb::open_in_memory().unwrap();

        b.iter(|| {
            let handle = db
                .put_or_update(|txn| {
                    let current = txn.get("counter").map(|value| value.len()).unwrap_or(0);
                    txn.put_or_update("counter", vec![0u8; (current + 1) % 64])
                })
                .unwrap();
            handle.wait().unwrap();
        });
    });
}

/// Benchmark snapshot overhead (empty readonly transaction).
fn bench_snapshot_overhead(c: &mut Criterion) {
    c.bench_function("snapshot_overhead", |b| {
        let db = KeyValueDb::open_in_memory().unwrap();

        b.iter(|| {
            let txn = db.begin_readonly().unwrap();
            black_box(txn.begin_timestamp());
            txn.finish();
        });
    });
}

criterion_group!(
    benches,
    bench_single_write,
    bench_batch_write,
    bench_single_read,
    bench_read_populated,
    bench_read_modify_write,
    bench_snapshot_overhead,
);

criterion_main!(benches);
