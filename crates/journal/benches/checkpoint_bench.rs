//! Write path, checkpoint and recovery benchmarks for the reference engine

use criterion::{black_box, criterion_group, criterion_main, BatchSize, BenchmarkId, Criterion};
use walround_journal::{recover, Engine, EngineConfig};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use tempfile::TempDir;
use wr_core::{StorageSession, TableWriter};

fn random_pairs(count: usize) -> Vec<(String, String)> {
    let mut rng = ChaCha8Rng::seed_from_u64(42);
    (0..count)
        .map(|i| {
            let value: u64 = rng.gen();
            (format!("key.bench.{}", i), format!("value.{:016x}", value))
        })
        .collect()
}

fn populated_engine(pairs: &[(String, String)]) -> (TempDir, Engine) {
    let temp_dir = TempDir::new().unwrap();
    let mut engine = Engine::open(temp_dir.path(), EngineConfig::default()).unwrap();
    for (key, value) in pairs {
        engine.insert(key, value).unwrap();
    }
    (temp_dir, engine)
}

fn bench_insert(c: &mut Criterion) {
    let pairs = random_pairs(10_000);

    c.bench_function("insert_10k", |b| {
        b.iter_batched(
            || {
                let temp_dir = TempDir::new().unwrap();
                let engine = Engine::open(temp_dir.path(), EngineConfig::default()).unwrap();
                (temp_dir, engine)
            },
            |(_temp_dir, mut engine)| {
                for (key, value) in &pairs {
                    engine.insert(key, value).unwrap();
                }
                black_box(engine.last_lsn())
            },
            BatchSize::PerIteration,
        );
    });
}

fn bench_checkpoint(c: &mut Criterion) {
    let mut group = c.benchmark_group("checkpoint");

    for size in [1_000usize, 10_000, 50_000] {
        let pairs = random_pairs(size);
        group.bench_with_input(BenchmarkId::from_parameter(size), &pairs, |b, pairs| {
            let (_temp_dir, mut engine) = populated_engine(pairs);
            b.iter(|| black_box(engine.checkpoint().unwrap()));
        });
    }

    group.finish();
}

fn bench_recover(c: &mut Criterion) {
    let pairs = random_pairs(20_000);
    let (temp_dir, mut engine) = populated_engine(&pairs);
    engine.checkpoint().unwrap();
    for (key, value) in pairs.iter().take(5_000) {
        engine.insert(key, &format!("{}.updated", value)).unwrap();
    }
    drop(engine);

    c.bench_function("recover_snapshot_plus_5k_records", |b| {
        b.iter(|| black_box(recover(temp_dir.path()).unwrap().last_lsn));
    });
}

criterion_group!(benches, bench_insert, bench_checkpoint, bench_recover);
criterion_main!(benches);
