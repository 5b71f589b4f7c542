//! Fiber propagation benchmarks

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use fiber_channel::*;
use ndarray::Array2;

fn benchmark_propagate_receiver_batch(c: &mut Criterion) {
    let mut channel = FiberChannel::new(FiberParams::default(), 1).unwrap();
    // One receiver update: 30 mini-batches of 64 sweeps over 16 messages
    let batch = Array2::from_shape_fn((2, 30 * 64 * 16), |(r, c)| {
        0.01 * ((c % 16) as f64 - 7.5 + r as f64)
    });

    c.bench_function("fiber_propagate_30720_symbols", |b| {
        b.iter(|| black_box(channel.transmit(batch.view()).unwrap()))
    });
}

fn benchmark_normalize(c: &mut Criterion) {
    let batch = Array2::from_shape_fn((2, 16 * 640), |(r, c)| (c as f64).sin() + r as f64);

    c.bench_function("normalize_10240_symbols", |b| {
        b.iter(|| black_box(normalize(batch.view()).unwrap()))
    });
}

criterion_group!(benches, benchmark_propagate_receiver_batch, benchmark_normalize);
criterion_main!(benches);
