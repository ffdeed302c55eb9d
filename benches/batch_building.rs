//! Benchmarks for batch building
//!
//! This benchmark measures:
//! - Packing throughput for uniformly sized items
//! - Packing with frequent oversized items that need truncation

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};

use ai_batch_pipeline::batch::{BatchLimits, DynamicBatchBuilder};
use ai_batch_pipeline::types::Item;
use chrono::{Duration, TimeZone, Utc};

fn items(n: usize, every_nth_oversized: Option<usize>) -> Vec<Item> {
    let epoch = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
    (0..n)
        .map(|i| {
            let len = match every_nth_oversized {
                Some(k) if i % k == 0 => 60_000,
                _ => 800 + (i * 37) % 2_400,
            };
            Item::new(
                i as i64,
                format!("Post {}", i),
                "x".repeat(len),
                epoch + Duration::seconds(i as i64),
            )
        })
        .collect()
}

fn bench_uniform(c: &mut Criterion) {
    let builder = DynamicBatchBuilder::new(
        BatchLimits::default()
            .with_max_tokens_per_request(8_000)
            .with_max_batch_size(20),
    );
    let mut group = c.benchmark_group("build_uniform");
    for n in [100usize, 1_000, 10_000] {
        let input = items(n, None);
        group.throughput(Throughput::Elements(n as u64));
        group.bench_with_input(BenchmarkId::from_parameter(n), &input, |b, input| {
            b.iter(|| black_box(builder.build(black_box(input.clone()))))
        });
    }
    group.finish();
}

fn bench_truncation(c: &mut Criterion) {
    let builder = DynamicBatchBuilder::new(
        BatchLimits::default()
            .with_max_tokens_per_request(8_000)
            .with_truncation_buffer_tokens(500),
    );
    let input = items(1_000, Some(10));
    c.bench_function("build_with_oversized_items", |b| {
        b.iter(|| black_box(builder.build(black_box(input.clone()))))
    });
}

criterion_group!(benches, bench_uniform, bench_truncation);
criterion_main!(benches);
