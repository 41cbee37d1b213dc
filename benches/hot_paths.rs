//! Hot path benchmarks for profiling-driven optimization.
//!
//! Run with: `cargo bench --bench hot_paths`
//! Compare baselines: `cargo bench --bench hot_paths -- --baseline main`
//!
//! Every mutating call is a full load-merge-save cycle, so these measure the
//! pieces that dominate it: CSV encode/decode with type inference, the
//! upsert merge, and row-engine evaluation.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use rowdb::storage::codec;
use rowdb::{Database, Frame, Params, Row, Scalar};

fn table(rows: usize, offset: usize) -> Frame {
    Frame::from_rows((0..rows).map(|i| {
        let id = (i + offset) as i64;
        Row::new()
            .with("id", id)
            .with("name", format!("user-{}", id))
            .with("amount", id as f64 * 1.25)
            .with("day", format!("2024-01-{:02}", id % 28 + 1))
    }))
}

/// Benchmark codec::encode and codec::decode - every save and load
fn bench_codec(c: &mut Criterion) {
    let mut group = c.benchmark_group("codec");

    for rows in [100, 1_000, 10_000] {
        let frame = table(rows, 0);
        let bytes = codec::encode(&frame).unwrap();
        group.throughput(Throughput::Elements(rows as u64));

        group.bench_with_input(BenchmarkId::new("encode", rows), &frame, |b, frame| {
            b.iter(|| codec::encode(black_box(frame)).unwrap())
        });
        group.bench_with_input(BenchmarkId::new("decode", rows), &bytes, |b, bytes| {
            b.iter(|| codec::decode(black_box(bytes)).unwrap())
        });
    }

    group.finish();
}

/// Benchmark insert_data against an in-memory store - merge plus codec
fn bench_upsert(c: &mut Criterion) {
    let mut group = c.benchmark_group("upsert");

    for existing in [1_000, 10_000] {
        // Half the batch updates existing keys, half appends new ones
        let batch = table(200, existing - 100);
        group.throughput(Throughput::Elements(200));

        group.bench_function(BenchmarkId::new("half_overlap", existing), |b| {
            let mut db = Database::in_memory();
            db.register_table("bench", &["id"]).unwrap();
            db.insert_data("bench", &table(existing, 0)).unwrap();
            b.iter(|| db.insert_data("bench", black_box(&batch)).unwrap())
        });
    }

    group.finish();
}

/// Benchmark query evaluation - load, filter and group
fn bench_query(c: &mut Criterion) {
    let mut group = c.benchmark_group("query");

    let mut db = Database::in_memory();
    db.register_table("bench", &["id"]).unwrap();
    db.insert_data("bench", &table(10_000, 0)).unwrap();

    let mut params = Params::new();
    params.insert("min".to_string(), Scalar::Float(1000.0));

    group.throughput(Throughput::Elements(10_000));
    group.bench_function("filter_group_10000", |b| {
        b.iter(|| {
            db.query(
                black_box(
                    "SELECT day, SUM(amount) AS total, COUNT(*) AS n \
                     FROM bench WHERE amount > $min GROUP BY day",
                ),
                &params,
            )
            .unwrap()
        })
    });
    group.bench_function("filter_sort_limit_10000", |b| {
        b.iter(|| {
            db.query(
                black_box("SELECT * FROM bench WHERE amount > $min ORDER BY amount DESC LIMIT 10"),
                &params,
            )
            .unwrap()
        })
    });

    group.finish();
}

criterion_group!(benches, bench_codec, bench_upsert, bench_query);
criterion_main!(benches);
