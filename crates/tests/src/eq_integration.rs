//! Integration tests for the EQ pipeline
//!
//! These tests drive the public surface end to end: parameter store →
//! coefficient design → per-channel processing, and the controller /
//! renderer handoff across threads.

use bellcurve_core::domain::coeffs::gain_to_db;
use bellcurve_core::domain::{
    butterworth, Channel, ChainSettings, ChainUpdate, ChannelProcessor, CutKind, Equalizer,
    ParameterId, ParameterSource, ParameterStore, Slope,
};
use bellcurve_infra::split;
use proptest::prelude::*;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

const SAMPLE_RATE: f64 = 44100.0;
const BLOCK_SIZE: usize = 512;

fn prepared(settings: ChainSettings) -> Equalizer {
    let mut eq = Equalizer::new(Arc::new(ParameterStore::with_settings(&settings)));
    eq.prepare(SAMPLE_RATE, BLOCK_SIZE).unwrap();
    eq
}

fn generate_noise(seed: u64, num_samples: usize) -> Vec<f32> {
    let mut rng = StdRng::seed_from_u64(seed);
    (0..num_samples).map(|_| rng.gen_range(-1.0..1.0)).collect()
}

/// Process a stereo signal block by block; returns (left, right)
fn render_stereo(eq: &mut Equalizer, input: &[f32]) -> (Vec<f32>, Vec<f32>) {
    let mut left_out = Vec::with_capacity(input.len());
    let mut right_out = Vec::with_capacity(input.len());

    for chunk in input.chunks(BLOCK_SIZE) {
        let mut left = chunk.to_vec();
        let mut right = chunk.to_vec();
        eq.process_block(&mut [left.as_mut_slice(), right.as_mut_slice()], chunk.len());
        left_out.extend_from_slice(&left);
        right_out.extend_from_slice(&right);
    }

    (left_out, right_out)
}

fn extreme_settings() -> Vec<ChainSettings> {
    let mut all = Vec::new();
    for slope in Slope::ALL {
        for (freq, gain, quality) in [
            (20.0, 24.0, 10.0),
            (20000.0, 24.0, 0.1),
            (20.0, -24.0, 0.1),
            (20000.0, -24.0, 10.0),
        ] {
            all.push(ChainSettings {
                low_cut_freq: freq,
                low_cut_slope: slope,
                peak_freq: freq,
                peak_gain_in_decibels: gain,
                peak_quality: quality,
                high_cut_freq: 20020.0 - freq,
                high_cut_slope: slope,
            });
        }
    }
    all
}

// ============================================================================
// RESPONSE SCENARIOS
// ============================================================================

#[test]
fn test_flat_peak_reads_zero_db() {
    let eq = prepared(ChainSettings {
        peak_freq: 1000.0,
        peak_gain_in_decibels: 0.0,
        peak_quality: 1.0,
        ..Default::default()
    });

    let db = eq.query_magnitude_response_db(1000.0);
    assert!(db.abs() < 0.1, "response at 1 kHz was {db} dB");
}

#[test]
fn test_gentle_low_cut_leaves_top_end_alone() {
    let eq = prepared(ChainSettings {
        low_cut_freq: 20.0,
        low_cut_slope: Slope::Db12,
        ..Default::default()
    });

    let low_cut = eq.processor().chain(Channel::Left).low_cut();
    assert_eq!(low_cut.enabled_count(), 1);

    let db = gain_to_db(low_cut.magnitude_at(20000.0, SAMPLE_RATE));
    assert!(db.abs() < 1.0, "low-cut attenuation at 20 kHz was {db} dB");
}

#[test]
fn test_steep_low_cut_attenuation() {
    let eq = prepared(ChainSettings {
        low_cut_freq: 1000.0,
        low_cut_slope: Slope::Db48,
        ..Default::default()
    });

    assert_eq!(
        eq.processor().chain(Channel::Left).low_cut().enabled_count(),
        4
    );

    let at_100 = eq.query_magnitude_response_db(100.0);
    assert!(at_100 <= -48.0, "response at 100 Hz was {at_100} dB");

    let octave_below = eq.query_magnitude_response_db(500.0);
    assert!(
        (octave_below + 48.0).abs() < 2.0,
        "response one octave below cutoff was {octave_below} dB"
    );
}

#[test]
fn test_high_cut_slot_is_wired() {
    let eq = prepared(ChainSettings {
        high_cut_freq: 2000.0,
        high_cut_slope: Slope::Db24,
        ..Default::default()
    });

    let chain = eq.processor().chain(Channel::Right);
    assert_eq!(chain.high_cut().enabled_count(), 2);
    assert!(eq.query_magnitude_response_db(8000.0) < -40.0);
    assert!(eq.query_magnitude_response_db(200.0).abs() < 0.5);
}

#[test]
fn test_every_slope_enables_its_stage_prefix() {
    for slope in Slope::ALL {
        let coeffs = butterworth(500.0, SAMPLE_RATE, slope.order(), CutKind::HighPass);
        assert_eq!(coeffs.len(), slope.index() as usize + 1);

        let eq = prepared(ChainSettings {
            low_cut_freq: 500.0,
            low_cut_slope: slope,
            ..Default::default()
        });
        let stages = eq.processor().chain(Channel::Left).low_cut().stages();
        for (i, stage) in stages.iter().enumerate() {
            assert_eq!(stage.is_bypassed(), i >= coeffs.len());
        }
    }
}

// ============================================================================
// PROCESSING PROPERTIES
// ============================================================================

#[test]
fn test_update_is_idempotent() {
    let settings = ChainSettings {
        low_cut_freq: 120.0,
        low_cut_slope: Slope::Db36,
        peak_freq: 4000.0,
        peak_gain_in_decibels: -7.5,
        peak_quality: 3.0,
        high_cut_freq: 11000.0,
        high_cut_slope: Slope::Db24,
    };

    let mut processor = ChannelProcessor::new();
    processor.prepare(SAMPLE_RATE, BLOCK_SIZE).unwrap();

    let first = processor.update(&settings);
    let after_first = processor.chain(Channel::Left).clone();
    let second = processor.update(&settings);

    assert_eq!(first, second);
    assert_eq!(processor.chain(Channel::Left), &after_first);
    assert_eq!(processor.chain(Channel::Right), &after_first);
}

#[test]
fn test_silence_in_silence_out() {
    for settings in extreme_settings() {
        let mut eq = prepared(settings);
        let (left, right) = render_stereo(&mut eq, &vec![0.0; 4 * BLOCK_SIZE]);
        assert!(left.iter().chain(right.iter()).all(|&s| s == 0.0));
    }
}

#[test]
fn test_ten_seconds_of_noise_stay_finite() {
    let input = generate_noise(42, 10 * SAMPLE_RATE as usize);

    let steepest_and_gentlest = extreme_settings()
        .into_iter()
        .filter(|s| matches!(s.low_cut_slope, Slope::Db12 | Slope::Db48));

    for settings in steepest_and_gentlest {
        let mut eq = prepared(settings);
        let (left, right) = render_stereo(&mut eq, &input);

        assert!(
            left.iter().chain(right.iter()).all(|s| s.is_finite()),
            "non-finite output for {settings:?}"
        );
        assert_eq!(left, right);
    }
}

#[test]
fn test_stereo_channels_have_independent_state() {
    let mut eq = prepared(ChainSettings {
        peak_freq: 500.0,
        peak_gain_in_decibels: 10.0,
        ..Default::default()
    });

    let noise = generate_noise(3, BLOCK_SIZE);
    let mut left = noise.clone();
    let mut right = vec![0.0; BLOCK_SIZE];
    eq.process_block(&mut [left.as_mut_slice(), right.as_mut_slice()], BLOCK_SIZE);

    assert!(right.iter().all(|&s| s == 0.0));

    // Same input on a fresh equalizer gives the same left output
    let mut fresh = prepared(eq.get_chain_settings());
    let mut again = noise.clone();
    fresh.process_block(&mut [again.as_mut_slice()], BLOCK_SIZE);
    assert_eq!(left, again);
}

#[test]
fn test_extra_channels_are_untouched() {
    let mut eq = prepared(ChainSettings {
        peak_gain_in_decibels: 12.0,
        ..Default::default()
    });

    let noise = generate_noise(9, BLOCK_SIZE);
    let mut left = noise.clone();
    let mut right = noise.clone();
    let mut third = noise.clone();
    eq.process_block(
        &mut [left.as_mut_slice(), right.as_mut_slice(), third.as_mut_slice()],
        BLOCK_SIZE,
    );

    assert_ne!(left, noise);
    assert_eq!(third, noise);
}

#[test]
fn test_parameter_change_applies_at_next_block() {
    let store = Arc::new(ParameterStore::new());
    let mut eq = Equalizer::new(store.clone());
    eq.prepare(SAMPLE_RATE, BLOCK_SIZE).unwrap();

    assert!(eq.query_magnitude_response_db(2000.0).abs() < 0.1);

    store.set(ParameterId::PeakFreq, 2000.0);
    store.set(ParameterId::PeakGain, 6.0);
    // Nothing changes until a block boundary
    assert!(eq.query_magnitude_response_db(2000.0).abs() < 0.1);

    let mut left = vec![0.0; BLOCK_SIZE];
    eq.process_block(&mut [left.as_mut_slice()], BLOCK_SIZE);
    assert!((eq.query_magnitude_response_db(2000.0) - 6.0).abs() < 0.1);
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(16))]

    #[test]
    fn prop_in_range_settings_never_produce_nan(
        low_cut in 20.0f32..20000.0,
        high_cut in 20.0f32..20000.0,
        peak_freq in 20.0f32..20000.0,
        gain in -24.0f32..24.0,
        quality in 0.1f32..10.0,
        low_slope in 0u8..4,
        high_slope in 0u8..4,
        seed in any::<u64>(),
    ) {
        let settings = ChainSettings {
            low_cut_freq: low_cut,
            low_cut_slope: Slope::from_index(low_slope).unwrap(),
            peak_freq,
            peak_gain_in_decibels: gain,
            peak_quality: quality,
            high_cut_freq: high_cut,
            high_cut_slope: Slope::from_index(high_slope).unwrap(),
        };

        let update = ChainUpdate::compute(&settings, SAMPLE_RATE);
        prop_assert!(update.is_finite());
        prop_assert_eq!(update, ChainUpdate::compute(&settings, SAMPLE_RATE));

        let mut eq = prepared(settings);
        let (left, _) = render_stereo(&mut eq, &generate_noise(seed, SAMPLE_RATE as usize / 2));
        prop_assert!(left.iter().all(|s| s.is_finite()));
    }
}

// ============================================================================
// CONTROLLER / RENDERER HANDOFF
// ============================================================================

#[test]
fn test_renderer_converges_on_latest_settings() {
    let store = Arc::new(ParameterStore::new());
    let (mut controller, mut renderer) = split(store.clone(), SAMPLE_RATE, 256, 2).unwrap();

    let audio = thread::spawn(move || {
        let noise = generate_noise(11, 256);
        for _ in 0..200 {
            let mut left = noise.clone();
            let mut right = noise.clone();
            renderer.process_block(&mut [left.as_mut_slice(), right.as_mut_slice()], 256);
            assert!(left.iter().all(|s| s.is_finite()));
            thread::sleep(Duration::from_micros(200));
        }
        renderer
    });

    for step in 0..50 {
        store.set(ParameterId::PeakFreq, 100.0 + step as f32 * 200.0);
        store.set(ParameterId::PeakGain, (step % 24) as f32 - 12.0);
        controller.tick();
        thread::sleep(Duration::from_micros(500));
    }

    let mut renderer = audio.join().unwrap();

    // Flush whatever the last ticks left behind
    while controller.tick() || controller.has_backlog() {
        let mut left = vec![0.0; 16];
        renderer.process_block(&mut [left.as_mut_slice()], 16);
    }
    let mut left = vec![0.0; 16];
    renderer.process_block(&mut [left.as_mut_slice()], 16);

    let expected = ChainUpdate::compute(&store.chain_settings(), SAMPLE_RATE);
    assert_eq!(renderer.current(), expected);
    assert_eq!(controller.latest(), expected);
}
