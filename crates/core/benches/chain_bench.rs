// Performance benchmarks for the EQ chain
//
// Run with: cargo bench --bench chain_bench

use bellcurve_core::domain::{ChainSettings, ChainUpdate, Equalizer, ParameterStore, Slope};
use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::hint::black_box;
use std::sync::Arc;

const SAMPLE_RATE: f64 = 48000.0;

fn noise(len: usize) -> Vec<f32> {
    let mut rng = StdRng::seed_from_u64(7);
    (0..len).map(|_| rng.gen_range(-1.0..1.0)).collect()
}

fn steep_settings(slope: Slope) -> ChainSettings {
    ChainSettings {
        low_cut_freq: 80.0,
        low_cut_slope: slope,
        peak_freq: 2500.0,
        peak_gain_in_decibels: 6.0,
        peak_quality: 1.4,
        high_cut_freq: 12000.0,
        high_cut_slope: slope,
    }
}

fn bench_coefficient_update(c: &mut Criterion) {
    let mut group = c.benchmark_group("chain_update");

    for slope in Slope::ALL {
        let settings = steep_settings(slope);
        group.bench_with_input(
            BenchmarkId::from_parameter(slope.db_per_octave()),
            &settings,
            |b, settings| {
                b.iter(|| black_box(ChainUpdate::compute(black_box(settings), SAMPLE_RATE)));
            },
        );
    }

    group.finish();
}

fn bench_process_block(c: &mut Criterion) {
    let mut group = c.benchmark_group("process_block_stereo");

    for block_size in [64, 256, 512, 1024] {
        let store = Arc::new(ParameterStore::with_settings(&steep_settings(Slope::Db48)));
        let mut eq = Equalizer::new(store);
        if eq.prepare(SAMPLE_RATE, block_size).is_err() {
            continue;
        }

        let source = noise(block_size);
        let mut left = source.clone();
        let mut right = source.clone();

        group.bench_with_input(
            BenchmarkId::from_parameter(block_size),
            &block_size,
            |b, &block_size| {
                b.iter(|| {
                    left.copy_from_slice(&source);
                    right.copy_from_slice(&source);
                    eq.process_block(
                        &mut [left.as_mut_slice(), right.as_mut_slice()],
                        black_box(block_size),
                    );
                    black_box(left[0]);
                });
            },
        );
    }

    group.finish();
}

fn bench_magnitude_query(c: &mut Criterion) {
    let update = ChainUpdate::compute(&steep_settings(Slope::Db48), SAMPLE_RATE);

    c.bench_function("magnitude_query_256_points", |b| {
        b.iter(|| {
            let total: f64 = (0..256)
                .map(|i| 20.0 * 1000.0_f64.powf(i as f64 / 255.0))
                .map(|freq| update.magnitude_at(freq, SAMPLE_RATE))
                .sum();
            black_box(total)
        });
    });
}

criterion_group!(
    benches,
    bench_coefficient_update,
    bench_process_block,
    bench_magnitude_query
);
criterion_main!(benches);
