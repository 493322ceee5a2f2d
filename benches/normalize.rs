//! Phone Normalization Benchmarks
//!
//! Cost of canonicalizing single numbers and mixed batches.

use clientbook::descriptor::{Numbers, PhoneValue};
use clientbook::phone::{normalize, normalize_batch};
use criterion::{black_box, criterion_group, criterion_main, Criterion};

fn bench_normalize_single(c: &mut Criterion) {
    let integer = PhoneValue::from(79_991_234_567_u64);
    let formatted = PhoneValue::from("+7 (999) 123-45-67");

    c.bench_function("normalize_integer", |b| b.iter(|| normalize(black_box(&integer))));
    c.bench_function("normalize_formatted_text", |b| b.iter(|| normalize(black_box(&formatted))));
}

fn bench_normalize_batch(c: &mut Criterion) {
    let batch: Numbers = (0..100_u64)
        .map(|i| {
            if i % 10 == 0 {
                PhoneValue::from(i)
            } else {
                PhoneValue::from(9_990_000_000 + i)
            }
        })
        .collect::<Vec<_>>()
        .into();

    c.bench_function("normalize_batch_100", |b| b.iter(|| normalize_batch(black_box(&batch))));
}

criterion_group!(benches, bench_normalize_single, bench_normalize_batch);
criterion_main!(benches);
