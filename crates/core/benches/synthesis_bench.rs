// Performance benchmarks for stimulus synthesis
//
// Run with: cargo bench --bench synthesis_bench

use calibrate_core::domain::dsp::{lfilter, sosfilt, Butterworth};
use calibrate_core::domain::stimulus::{synthesize_noise, synthesize_tone, white_noise};
use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::hint::black_box;

fn bench_tone(c: &mut Criterion) {
    let mut group = c.benchmark_group("synthesize_tone");

    for duration in [0.1, 1.0, 10.0].iter() {
        group.bench_with_input(BenchmarkId::from_parameter(duration), duration, |b, &d| {
            b.iter(|| black_box(synthesize_tone(1000.0, 1.0, d, 44100.0)));
        });
    }

    group.finish();
}

fn bench_noise(c: &mut Criterion) {
    let mut group = c.benchmark_group("synthesize_noise");

    for duration in [0.1, 1.0].iter() {
        group.bench_with_input(BenchmarkId::from_parameter(duration), duration, |b, &d| {
            let mut rng = StdRng::seed_from_u64(0);
            b.iter(|| {
                black_box(synthesize_noise(1000.0, 1.0 / 3.0, 0.18, 0.0, d, 44100.0, &mut rng))
            });
        });
    }

    group.finish();
}

fn bench_butterworth(c: &mut Criterion) {
    c.bench_function("butterworth_design_order_6", |b| {
        b.iter(|| black_box(Butterworth::high_pass(6, black_box(0.04)).design()));
    });

    let coeffs = match Butterworth::low_pass(6, 0.05).design() {
        Ok(coeffs) => coeffs,
        Err(e) => panic!("filter design failed: {}", e),
    };
    let input = white_noise(44100, &mut StdRng::seed_from_u64(1));

    c.bench_function("lfilter_order_6_44100_samples", |b| {
        b.iter(|| {
            let mut signal = input.clone();
            black_box(lfilter(&coeffs, &mut signal))
        });
    });

    let sections = match Butterworth::low_pass(6, 0.05).sections() {
        Ok(sections) => sections,
        Err(e) => panic!("filter design failed: {}", e),
    };

    c.bench_function("sosfilt_order_6_44100_samples", |b| {
        b.iter(|| {
            let mut signal = input.clone();
            black_box(sosfilt(&sections, &mut signal))
        });
    });
}

criterion_group!(benches, bench_tone, bench_noise, bench_butterworth);
criterion_main!(benches);
