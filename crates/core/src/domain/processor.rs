//! Per-channel processing and coefficient update orchestration
//!
//! - [`ChainUpdate`]: everything a chain needs from one settings snapshot
//! - [`ChannelProcessor`]: one [`FilterChain`] per channel, kept in sync
//! - [`Equalizer`]: the host-facing entry points (prepare / process / query)
//!
//! Nothing on the per-block path allocates, locks or logs.

use crate::domain::audio::{validate_sample_rate, Channel, Result};
use crate::domain::coeffs::{
    butterworth, cascade_magnitude, gain_to_db, BiquadCoeffs, CutCoefficients, CutKind,
};
use crate::domain::filter::FilterChain;
use crate::domain::response::ResponseCurve;
use crate::domain::settings::{ChainSettings, ParameterSource, ParameterStore};
use std::sync::Arc;
use tracing::{debug, info, trace};

/// Sample rate assumed until `prepare` is called
pub const DEFAULT_SAMPLE_RATE: f64 = 44100.0;

// ============================================================================
// CHAIN UPDATE
// ============================================================================

/// Coefficients derived from one settings snapshot
///
/// Plain `Copy` data: both channels receive their own copy, and the
/// real-time handoff moves it between threads without allocating.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ChainUpdate {
    pub low_cut: CutCoefficients,
    pub peak: BiquadCoeffs,
    pub high_cut: CutCoefficients,
}

impl Default for ChainUpdate {
    fn default() -> Self {
        Self::compute(&ChainSettings::default(), DEFAULT_SAMPLE_RATE)
    }
}

impl ChainUpdate {
    /// Run the coefficient calculator for every slot
    #[must_use]
    pub fn compute(settings: &ChainSettings, sample_rate: f64) -> Self {
        Self {
            low_cut: make_low_cut_filter(settings, sample_rate),
            peak: make_peak_filter(settings, sample_rate),
            high_cut: make_high_cut_filter(settings, sample_rate),
        }
    }

    pub fn is_finite(&self) -> bool {
        self.low_cut.is_finite() && self.peak.is_finite() && self.high_cut.is_finite()
    }

    /// Coefficients of the stages this update enables, in processing order
    pub fn stages(&self) -> impl Iterator<Item = &BiquadCoeffs> + '_ {
        self.low_cut
            .iter()
            .chain(std::iter::once(&self.peak))
            .chain(self.high_cut.iter())
    }

    /// Cumulative linear magnitude at `freq`
    pub fn magnitude_at(&self, freq: f64, sample_rate: f64) -> f64 {
        cascade_magnitude(self.stages(), freq, sample_rate)
    }

    /// Load this update into a chain
    pub fn apply_to(&self, chain: &mut FilterChain) {
        chain.low_cut_mut().apply(&self.low_cut);
        chain.peak_mut().set_coeffs(self.peak);
        chain.peak_mut().set_bypassed(false);
        chain.high_cut_mut().apply(&self.high_cut);
    }
}

pub fn make_peak_filter(settings: &ChainSettings, sample_rate: f64) -> BiquadCoeffs {
    BiquadCoeffs::peak(
        sample_rate,
        settings.peak_freq as f64,
        settings.peak_quality as f64,
        settings.peak_gain_in_decibels as f64,
    )
}

pub fn make_low_cut_filter(settings: &ChainSettings, sample_rate: f64) -> CutCoefficients {
    butterworth(
        settings.low_cut_freq as f64,
        sample_rate,
        settings.low_cut_slope.order(),
        CutKind::HighPass,
    )
}

pub fn make_high_cut_filter(settings: &ChainSettings, sample_rate: f64) -> CutCoefficients {
    butterworth(
        settings.high_cut_freq as f64,
        sample_rate,
        settings.high_cut_slope.order(),
        CutKind::LowPass,
    )
}

// ============================================================================
// CHANNEL PROCESSOR
// ============================================================================

/// Left/right filter chains driven from the same coefficient updates
///
/// Chains never share state: each one receives a value copy of the update.
#[derive(Debug, Clone)]
pub struct ChannelProcessor {
    chains: [FilterChain; Channel::COUNT],
    sample_rate: f64,
    max_block_size: usize,
    prepared: bool,
}

impl Default for ChannelProcessor {
    fn default() -> Self {
        Self::new()
    }
}

impl ChannelProcessor {
    pub fn new() -> Self {
        Self {
            chains: std::array::from_fn(|_| FilterChain::new()),
            sample_rate: DEFAULT_SAMPLE_RATE,
            max_block_size: 0,
            prepared: false,
        }
    }

    /// Record the stream format and clear all filter state
    pub fn prepare(&mut self, sample_rate: f64, max_block_size: usize) -> Result<()> {
        self.sample_rate = validate_sample_rate(sample_rate)?;
        self.max_block_size = max_block_size;
        self.reset();
        self.prepared = true;

        debug!(
            sample_rate = self.sample_rate,
            max_block_size, "Channel processor prepared"
        );
        Ok(())
    }

    pub fn is_prepared(&self) -> bool {
        self.prepared
    }

    pub fn sample_rate(&self) -> f64 {
        self.sample_rate
    }

    pub fn max_block_size(&self) -> usize {
        self.max_block_size
    }

    pub fn chain(&self, channel: Channel) -> &FilterChain {
        &self.chains[channel.index()]
    }

    /// Push the same update into every channel's chain
    ///
    /// Updates with non-finite coefficients are rejected and the chains
    /// keep their previous configuration. Returns whether it was applied.
    pub fn apply(&mut self, update: &ChainUpdate) -> bool {
        if !update.is_finite() {
            return false;
        }

        for chain in &mut self.chains {
            update.apply_to(chain);
        }
        true
    }

    /// Compute coefficients for `settings` at the current rate and apply them
    pub fn update(&mut self, settings: &ChainSettings) -> ChainUpdate {
        let update = ChainUpdate::compute(settings, self.sample_rate);
        self.apply(&update);
        update
    }

    /// Filter every channel of `buffer` in place
    ///
    /// Channel 0 runs through the left chain, channel 1 through the right
    /// chain; further channels are left untouched. Before `prepare` the
    /// buffer passes through unmodified.
    pub fn process_block(&mut self, buffer: &mut [&mut [f32]], num_samples: usize) {
        if !self.prepared {
            return;
        }

        for (chain, channel) in self.chains.iter_mut().zip(buffer.iter_mut()) {
            let n = num_samples.min(channel.len());
            chain.process(&mut channel[..n]);
        }
    }

    /// Cumulative magnitude of the current chain at `freq`
    ///
    /// Both chains always carry identical coefficients, so the left one
    /// stands for both.
    pub fn magnitude_response(&self, freq: f64) -> f64 {
        self.chain(Channel::Left).magnitude_at(freq, self.sample_rate)
    }

    pub fn reset(&mut self) {
        for chain in &mut self.chains {
            chain.reset();
        }
    }
}

// ============================================================================
// EQUALIZER
// ============================================================================

/// Host-facing EQ: parameter store + channel processor
///
/// Recomputes coefficients from a fresh settings snapshot at the start of
/// every block, so parameter changes land at block boundaries only.
#[derive(Debug)]
pub struct Equalizer {
    store: Arc<ParameterStore>,
    processor: ChannelProcessor,
}

impl Equalizer {
    pub fn new(store: Arc<ParameterStore>) -> Self {
        Self {
            store,
            processor: ChannelProcessor::new(),
        }
    }

    pub fn store(&self) -> &Arc<ParameterStore> {
        &self.store
    }

    pub fn processor(&self) -> &ChannelProcessor {
        &self.processor
    }

    /// Read the current parameter values
    pub fn get_chain_settings(&self) -> ChainSettings {
        self.store.chain_settings()
    }

    /// Reset chain state for a new stream format and load current settings
    ///
    /// Must be called before [`process_block`](Self::process_block).
    pub fn prepare(&mut self, sample_rate: f64, max_block_size: usize) -> Result<()> {
        self.processor.prepare(sample_rate, max_block_size)?;
        let settings = self.get_chain_settings();
        self.processor.update(&settings);

        info!(
            sample_rate,
            max_block_size,
            low_cut = settings.low_cut_freq,
            peak = settings.peak_freq,
            high_cut = settings.high_cut_freq,
            "Equalizer prepared"
        );
        Ok(())
    }

    /// Real-time entry point: snapshot, update both chains, filter in place
    pub fn process_block(&mut self, buffer: &mut [&mut [f32]], num_samples: usize) {
        if !self.processor.is_prepared() {
            return;
        }

        let settings = self.store.chain_settings();
        self.processor.update(&settings);
        self.processor.process_block(buffer, num_samples);
    }

    /// Notification hook for the parameter collaborator
    pub fn on_parameter_changed(&self) {
        self.store.on_parameter_changed();
    }

    /// Linear magnitude of the current chain at `frequency`
    pub fn query_magnitude_response(&self, frequency: f64) -> f64 {
        self.processor.magnitude_response(frequency)
    }

    pub fn query_magnitude_response_db(&self, frequency: f64) -> f64 {
        gain_to_db(self.query_magnitude_response(frequency))
    }

    /// Resample the response curve if parameters changed since the last call
    ///
    /// Intended for a UI timer: bursts of parameter changes between two
    /// ticks produce one curve. The curve reflects the latest settings even
    /// if no block has been processed since they changed.
    pub fn response_curve_if_changed(
        &self,
        points: usize,
        min_freq: f64,
        max_freq: f64,
    ) -> Option<ResponseCurve> {
        if !self.store.take_pending_update() {
            return None;
        }

        let sample_rate = self.processor.sample_rate();
        let update = ChainUpdate::compute(&self.get_chain_settings(), sample_rate);
        trace!(points, "Resampling response curve");

        Some(ResponseCurve::sample(points, min_freq, max_freq, |freq| {
            update.magnitude_at(freq, sample_rate)
        }))
    }
}
