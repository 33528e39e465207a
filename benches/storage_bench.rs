//! Benchmarks for the tickstore storage engine
//!
//! Run with: cargo bench

use criterion::{black_box, criterion_group, criterion_main, Criterion, Throughput};
use tempfile::tempdir;
use tickstore::{codec, EngineConfig, Point, StorageEngine};

fn create_test_points(count: usize) -> Vec<Point> {
    (0..count)
        .map(|i| Point::with_timestamp("AAPL", 100.0 + i as f64 * 0.01, i as i64 * 1000))
        .collect()
}

fn bench_codec(c: &mut Criterion) {
    let mut group = c.benchmark_group("codec");

    for size in [100, 1000, 10000] {
        let points = create_test_points(size);

        group.throughput(Throughput::Elements(size as u64));

        group.bench_function(format!("compress_{}", size), |b| {
            b.iter(|| codec::compress_points(black_box(&points)).unwrap())
        });

        let compressed = codec::compress_points(&points).unwrap();

        group.bench_function(format!("decompress_{}", size), |b| {
            b.iter(|| codec::decompress_points(black_box(&compressed)).unwrap())
        });
    }

    group.finish();
}

fn bench_engine(c: &mut Criterion) {
    let mut group = c.benchmark_group("engine");

    group.bench_function("write_single", |b| {
        b.iter_custom(|iters| {
            let dir = tempdir().unwrap();
            let engine = StorageEngine::new(EngineConfig::new(dir.path())).unwrap();

            let start = std::time::Instant::now();
            for i in 0..iters {
                let point = Point::with_timestamp("AAPL", 100.0, i as i64);
                engine.write_point(black_box(point));
            }
            start.elapsed()
        });
    });

    group.bench_function("write_batch_1000", |b| {
        b.iter_custom(|iters| {
            let dir = tempdir().unwrap();
            let engine = StorageEngine::new(EngineConfig::new(dir.path())).unwrap();

            let start = std::time::Instant::now();
            for i in 0..iters {
                let base = i as i64 * 1_000_000_000;
                let points: Vec<Point> = (0..1000)
                    .map(|j| Point::with_timestamp("AAPL", j as f64, base + j * 1000))
                    .collect();
                engine.write_batch(black_box(points));
            }
            start.elapsed()
        });
    });

    group.bench_function("read_range_after_flush", |b| {
        b.iter_custom(|iters| {
            let dir = tempdir().unwrap();
            let engine = StorageEngine::new(EngineConfig::new(dir.path())).unwrap();

            engine.write_batch(create_test_points(10_000));
            engine.flush();

            let start = std::time::Instant::now();
            for _ in 0..iters {
                let points = engine
                    .read_range(black_box("AAPL"), 0, 10_000 * 1000)
                    .unwrap();
                black_box(points);
            }
            start.elapsed()
        });
    });

    group.finish();
}

criterion_group!(benches, bench_codec, bench_engine);
criterion_main!(benches);
