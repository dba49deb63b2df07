//! Throughput Benchmark for FlashKV
//!
//! Measures the storage engine and the command dispatcher under a few
//! representative workloads.

use bytes::Bytes;
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use flashkv::commands::CommandHandler;
use flashkv::storage::StorageEngine;
use std::sync::Arc;
use std::time::Duration;

fn bench_strings(c: &mut Criterion) {
    let engine = Arc::new(StorageEngine::new());
    for i in 0..100_000 {
        engine.set(
            Bytes::from(format!("key:{}", i)),
            Bytes::from(format!("value:{}", i)),
        );
    }

    let mut group = c.benchmark_group("strings");
    group.throughput(Throughput::Elements(1));

    for size in [16usize, 1024, 64 * 1024] {
        let value = Bytes::from("x".repeat(size));
        group.bench_with_input(BenchmarkId::new("set", size), &value, |b, value| {
            let mut i = 0u64;
            b.iter(|| {
                engine.set(Bytes::from(format!("set:{}", i % 10_000)), value.clone());
                i += 1;
            });
        });
    }

    group.bench_function("get_existing", |b| {
        let mut i = 0u64;
        b.iter(|| {
            let key = format!("key:{}", i % 100_000);
            black_box(engine.get(key.as_bytes()));
            i += 1;
        });
    });

    group.bench_function("get_missing", |b| {
        let mut i = 0u64;
        b.iter(|| {
            let key = format!("missing:{}", i);
            black_box(engine.get(key.as_bytes()));
            i += 1;
        });
    });

    group.bench_function("incr", |b| {
        let key = Bytes::from("counter");
        b.iter(|| black_box(engine.incr(&key)));
    });

    group.finish();
}

fn bench_collections(c: &mut Criterion) {
    let engine = StorageEngine::new();

    let mut group = c.benchmark_group("collections");
    group.throughput(Throughput::Elements(1));

    group.bench_function("lpush_rpop", |b| {
        let key = Bytes::from("queue");
        b.iter(|| {
            engine.lpush(&key, vec![Bytes::from("job")]);
            black_box(engine.rpop(&key));
        });
    });

    group.bench_function("hset_hget", |b| {
        let key = Bytes::from("user:1");
        let mut i = 0u64;
        b.iter(|| {
            let field = Bytes::from(format!("field:{}", i % 64));
            engine.hset(&key, field.clone(), Bytes::from("v"));
            black_box(engine.hget(&key, &field));
            i += 1;
        });
    });

    let board = Bytes::from("leaderboard");
    for i in 0..10_000 {
        engine.zadd(&board, i as f64, Bytes::from(format!("player:{}", i)));
    }

    group.bench_function("zadd_update", |b| {
        let mut i = 0u64;
        b.iter(|| {
            let member = Bytes::from(format!("player:{}", i % 10_000));
            black_box(engine.zadd(&board, (i % 997) as f64, member));
            i += 1;
        });
    });

    group.bench_function("zrange_top_10", |b| {
        b.iter(|| black_box(engine.zrange(&board, -10, -1)));
    });

    group.finish();
}

fn bench_dispatch(c: &mut Criterion) {
    let handler = CommandHandler::new(Arc::new(StorageEngine::new()));
    let set = vec![
        Bytes::from("SET"),
        Bytes::from("greeting"),
        Bytes::from("hello"),
    ];
    let get = vec![Bytes::from("get"), Bytes::from("greeting")];

    let mut group = c.benchmark_group("dispatch");
    group.throughput(Throughput::Elements(2));
    group.bench_function("set_get", |b| {
        b.iter(|| {
            black_box(handler.execute(&set));
            black_box(handler.execute(&get));
        });
    });
    group.finish();
}

fn bench_concurrent(c: &mut Criterion) {
    let mut group = c.benchmark_group("concurrent");
    group.measurement_time(Duration::from_secs(10));

    for threads in [2usize, 4, 8] {
        group.throughput(Throughput::Elements((threads * 1000) as u64));
        group.bench_with_input(BenchmarkId::from_parameter(threads), &threads, |b, &n| {
            let engine = Arc::new(StorageEngine::new());
            b.iter(|| {
                let handles: Vec<_> = (0..n)
                    .map(|t| {
                        let engine = Arc::clone(&engine);
                        std::thread::spawn(move || {
                            for i in 0..1000 {
                                let key = Bytes::from(format!("t{}:k{}", t, i % 100));
                                engine.set(key.clone(), Bytes::from("v"));
                                black_box(engine.get(&key));
                            }
                        })
                    })
                    .collect();
                for handle in handles {
                    let _ = handle.join();
                }
            });
        });
    }

    group.finish();
}

fn bench_keyspace(c: &mut Criterion) {
    let engine = StorageEngine::new();
    for i in 0..10_000 {
        engine.set(Bytes::from(format!("user:{}", i)), Bytes::from("user_data"));
        engine.set(Bytes::from(format!("session:{}", i)), Bytes::from("s"));
    }

    let mut group = c.benchmark_group("keyspace");

    group.bench_function("keys_pattern", |b| {
        b.iter(|| black_box(engine.keys(Some(&b"user:*"[..]))));
    });

    group.bench_function("keys_all", |b| {
        b.iter(|| black_box(engine.keys(None)));
    });

    group.bench_function("expire_persist", |b| {
        b.iter(|| {
            engine.expire(b"user:1", Duration::from_secs(3600));
            black_box(engine.persist(b"user:1"));
        });
    });

    group.bench_function("cleanup_nothing_expired", |b| {
        b.iter(|| black_box(engine.cleanup_expired()));
    });

    group.finish();
}

criterion_group!(
    benches,
    bench_strings,
    bench_collections,
    bench_dispatch,
    bench_concurrent,
    bench_keyspace,
);
criterion_main!(benches);
