//! Filter stages and the per-channel filter chain
//!
//! A [`FilterChain`] is a fixed cascade of three slots:
//! low-cut (up to 4 biquads) → peak (1 biquad) → high-cut (up to 4 biquads).
//! Every stage is pre-allocated; changing the slope only flips bypass flags.

use crate::domain::coeffs::{cascade_magnitude, BiquadCoeffs, CutCoefficients, MAX_CUT_STAGES};

// ============================================================================
// FILTER STAGE
// ============================================================================

/// One bypassable second-order section with its own delay registers
///
/// A bypassed stage passes input through and leaves its registers alone,
/// so re-enabling it resumes from the state it had.
#[derive(Debug, Clone, PartialEq)]
pub struct FilterStage {
    coeffs: BiquadCoeffs,
    bypassed: bool,
    // Previous input samples (x[n-1], x[n-2])
    x1: f32,
    x2: f32,
    // Previous output samples (y[n-1], y[n-2])
    y1: f32,
    y2: f32,
}

impl Default for FilterStage {
    fn default() -> Self {
        Self::new(BiquadCoeffs::default())
    }
}

impl FilterStage {
    /// Create an enabled stage with the given coefficients
    pub fn new(coeffs: BiquadCoeffs) -> Self {
        Self {
            coeffs,
            bypassed: false,
            x1: 0.0,
            x2: 0.0,
            y1: 0.0,
            y2: 0.0,
        }
    }

    pub fn coeffs(&self) -> &BiquadCoeffs {
        &self.coeffs
    }

    /// Replace the coefficients, keeping the delay registers
    pub fn set_coeffs(&mut self, coeffs: BiquadCoeffs) {
        self.coeffs = coeffs;
    }

    pub fn is_bypassed(&self) -> bool {
        self.bypassed
    }

    pub fn set_bypassed(&mut self, bypassed: bool) {
        self.bypassed = bypassed;
    }

    /// Process a single sample
    #[inline]
    pub fn process_sample(&mut self, x: f32) -> f32 {
        if self.bypassed {
            return x;
        }

        let c = &self.coeffs;
        // Direct Form I: y[n] = b0*x[n] + b1*x[n-1] + b2*x[n-2]
        //                        - a1*y[n-1] - a2*y[n-2]
        let y = c.b0 * x + c.b1 * self.x1 + c.b2 * self.x2 - c.a1 * self.y1 - c.a2 * self.y2;
        let y = flush_denormal(y);

        self.x2 = self.x1;
        self.x1 = x;
        self.y2 = self.y1;
        self.y1 = y;

        y
    }

    /// Process a buffer of samples in place
    pub fn process(&mut self, buffer: &mut [f32]) {
        for sample in buffer.iter_mut() {
            *sample = self.process_sample(*sample);
        }
    }

    /// Whether all delay registers are zero
    pub fn is_cleared(&self) -> bool {
        self.x1 == 0.0 && self.x2 == 0.0 && self.y1 == 0.0 && self.y2 == 0.0
    }

    /// Clear the delay registers
    pub fn reset(&mut self) {
        self.x1 = 0.0;
        self.x2 = 0.0;
        self.y1 = 0.0;
        self.y2 = 0.0;
    }
}

/// Zero values below the normal f32 range
///
/// A decaying tail would otherwise park the feedback registers on
/// subnormals, which are slow on most FPUs.
#[inline]
fn flush_denormal(x: f32) -> f32 {
    if x.abs() < f32::MIN_POSITIVE {
        0.0
    } else {
        x
    }
}

// ============================================================================
// CUT FILTER
// ============================================================================

/// Four stackable stages of a low-cut or high-cut slot
#[derive(Debug, Clone, PartialEq)]
pub struct CutFilter {
    stages: [FilterStage; MAX_CUT_STAGES],
}

impl Default for CutFilter {
    fn default() -> Self {
        Self::new()
    }
}

impl CutFilter {
    /// Create a cut filter with every stage bypassed
    pub fn new() -> Self {
        let mut filter = Self {
            stages: std::array::from_fn(|_| FilterStage::default()),
        };
        filter.apply(&CutCoefficients::default());
        filter
    }

    /// Load `coeffs` into the first `coeffs.len()` stages and bypass the rest
    ///
    /// Coefficients are written before a stage is enabled, and the bypass
    /// flag of unused stages is set before anything else touches them.
    pub fn apply(&mut self, coeffs: &CutCoefficients) {
        let active = coeffs.len();

        for stage in &mut self.stages[active..] {
            stage.set_bypassed(true);
        }

        for (stage, c) in self.stages.iter_mut().zip(coeffs.iter()) {
            stage.set_coeffs(*c);
            stage.set_bypassed(false);
        }
    }

    pub fn stage(&self, index: usize) -> Option<&FilterStage> {
        self.stages.get(index)
    }

    pub fn stages(&self) -> &[FilterStage] {
        &self.stages
    }

    /// Number of stages currently in the signal path
    pub fn enabled_count(&self) -> usize {
        self.stages.iter().filter(|s| !s.is_bypassed()).count()
    }

    /// Coefficients of the enabled stages, in processing order
    pub fn enabled_coeffs(&self) -> impl Iterator<Item = &BiquadCoeffs> + '_ {
        self.stages
            .iter()
            .filter(|s| !s.is_bypassed())
            .map(FilterStage::coeffs)
    }

    #[inline]
    pub fn process_sample(&mut self, x: f32) -> f32 {
        self.stages
            .iter_mut()
            .fold(x, |acc, stage| stage.process_sample(acc))
    }

    pub fn magnitude_at(&self, freq: f64, sample_rate: f64) -> f64 {
        cascade_magnitude(self.enabled_coeffs(), freq, sample_rate)
    }

    pub fn reset(&mut self) {
        for stage in &mut self.stages {
            stage.reset();
        }
    }
}

// ============================================================================
// FILTER CHAIN
// ============================================================================

/// Slot of the chain, in processing order
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChainPosition {
    LowCut,
    Peak,
    HighCut,
}

/// Mono cascade low-cut → peak → high-cut
#[derive(Debug, Clone, PartialEq, Default)]
pub struct FilterChain {
    low_cut: CutFilter,
    peak: FilterStage,
    high_cut: CutFilter,
}

impl FilterChain {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn low_cut(&self) -> &CutFilter {
        &self.low_cut
    }

    pub fn low_cut_mut(&mut self) -> &mut CutFilter {
        &mut self.low_cut
    }

    pub fn peak(&self) -> &FilterStage {
        &self.peak
    }

    pub fn peak_mut(&mut self) -> &mut FilterStage {
        &mut self.peak
    }

    pub fn high_cut(&self) -> &CutFilter {
        &self.high_cut
    }

    pub fn high_cut_mut(&mut self) -> &mut CutFilter {
        &mut self.high_cut
    }

    /// Whether any stage of the slot is in the signal path
    pub fn is_active(&self, position: ChainPosition) -> bool {
        match position {
            ChainPosition::LowCut => self.low_cut.enabled_count() > 0,
            ChainPosition::Peak => !self.peak.is_bypassed(),
            ChainPosition::HighCut => self.high_cut.enabled_count() > 0,
        }
    }

    /// Coefficients of every enabled stage, in processing order
    pub fn enabled_coeffs(&self) -> impl Iterator<Item = &BiquadCoeffs> + '_ {
        let peak = (!self.peak.is_bypassed()).then(|| self.peak.coeffs());

        self.low_cut
            .enabled_coeffs()
            .chain(peak)
            .chain(self.high_cut.enabled_coeffs())
    }

    /// Process a single sample through all three slots
    ///
    /// A non-finite result flushes the chain state and passes the input
    /// through instead.
    #[inline]
    pub fn process_sample(&mut self, x: f32) -> f32 {
        let y = self.low_cut.process_sample(x);
        let y = self.peak.process_sample(y);
        let y = self.high_cut.process_sample(y);

        if y.is_finite() {
            y
        } else {
            self.reset();
            x
        }
    }

    /// Process a mono buffer in place
    pub fn process(&mut self, buffer: &mut [f32]) {
        for sample in buffer.iter_mut() {
            *sample = self.process_sample(*sample);
        }
    }

    /// Cumulative linear magnitude of the enabled stages at `freq`
    pub fn magnitude_at(&self, freq: f64, sample_rate: f64) -> f64 {
        cascade_magnitude(self.enabled_coeffs(), freq, sample_rate)
    }

    /// Clear every stage's delay registers
    pub fn reset(&mut self) {
        self.low_cut.reset();
        self.peak.reset();
        self.high_cut.reset();
    }
}
