//! Normalizer throughput benchmarks.
//!
//! Every poll of the log list normalizes a full page, so batch throughput
//! bounds how large a page the dashboard can refresh every two seconds.
//!
//! # Groups
//!
//! | Group | What it measures |
//! |-------|-----------------|
//! | `shapes` | One record of each shape: plain, bracketed, structured, system |
//! | `batch` | A mixed page of 50, 500 and 5000 records |
//!
//! # Viewing results
//!
//! ```sh
//! cargo bench --bench normalization_bench
//! open target/criterion/report/index.html
//! ```

use std::hint::black_box;

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use loglens_core::normalizer::{normalize, normalize_batch};
use loglens_core::RawLogRecord;
use serde_json::{json, Value};

fn shapes() -> Vec<(&'static str, Value)> {
    vec![
        ("plain", json!({"id": 1, "message": "payment declined", "level": "error", "user_id": "user7", "service_id": "svc-billing"})),
        ("bracketed", json!({"id": 2, "message": "[user42] [svc-auth] login ok", "level": "info"})),
        (
            "structured",
            json!({"id": 3, "message": r#"{"message":"db timeout","level":"critical","user_id":"user9","service_id":"svc-orders"}"#}),
        ),
        ("system", json!({"id": 4, "message": "kernel: eth0 link up", "log_type": "system", "hostname": "web-1"})),
    ]
}

fn shapes_bench(c: &mut Criterion) {
    let mut group = c.benchmark_group("shapes");
    group.throughput(Throughput::Elements(1));

    for (name, value) in shapes() {
        let record = RawLogRecord::from_json(&value);
        group.bench_with_input(BenchmarkId::from_parameter(name), &record, |b, record| {
            b.iter(|| black_box(normalize(black_box(record))))
        });
    }
    group.finish();
}

fn batch_bench(c: &mut Criterion) {
    let mut group = c.benchmark_group("batch");
    let corpus: Vec<Value> = shapes().into_iter().map(|(_, v)| v).collect();

    for size in [50usize, 500, 5000] {
        let page: Vec<Value> = corpus.iter().cycle().take(size).cloned().collect();
        group.throughput(Throughput::Elements(size as u64));
        group.bench_with_input(BenchmarkId::from_parameter(size), &page, |b, page| {
            b.iter(|| black_box(normalize_batch(black_box(page))))
        });
    }
    group.finish();
}

criterion_group!(benches, shapes_bench, batch_bench);
criterion_main!(benches);
