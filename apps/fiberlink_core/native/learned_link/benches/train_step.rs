//! Training step benchmarks

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use learned_link::{LinkConfig, QuantizationCodec, Trainer};

fn bench_config() -> LinkConfig {
    LinkConfig {
        noise_seed: Some(7),
        ..LinkConfig::default()
    }
}

fn benchmark_receiver_phase(c: &mut Criterion) {
    let config = bench_config();
    let sweeps = config.batch_r;
    let mut trainer = Trainer::new(config).unwrap();

    c.bench_function("receiver_phase_30x64_sweeps", |b| {
        b.iter(|| black_box(trainer.receiver_phase(sweeps).unwrap()))
    });
}

fn benchmark_transmitter_step(c: &mut Criterion) {
    let config = bench_config().with_num_bits(3);
    let sweeps = config.batch_t;
    let mut trainer = Trainer::new(config).unwrap();

    c.bench_function("transmitter_step_64_sweeps_3bit", |b| {
        b.iter(|| black_box(trainer.transmitter_step(sweeps).unwrap()))
    });
}

fn benchmark_codec_round_trip(c: &mut Criterion) {
    let codec = QuantizationCodec::new(5).unwrap();
    let values: Vec<f64> = (0..1024).map(|i| i as f64 / 1023.0).collect();

    c.bench_function("codec_round_trip_1024", |b| {
        b.iter(|| black_box(codec.round_trip(&values).unwrap()))
    });
}

criterion_group!(
    benches,
    benchmark_receiver_phase,
    benchmark_transmitter_step,
    benchmark_codec_round_trip
);
criterion_main!(benches);
