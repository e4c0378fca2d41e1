//! Biquad coefficient design
//!
//! Pure functions turning user-facing parameters into second-order section
//! coefficients:
//! - Peaking (bell) filter for the mid band
//! - High-order Butterworth high/low-pass, decomposed into cascaded biquads
//!
//! Design math runs in f64; the stored coefficients are f32 like the
//! processing path.

use num_complex::Complex64;
use std::f64::consts::PI;

/// Maximum number of cascaded sections in a cut filter (48 dB/oct)
pub const MAX_CUT_STAGES: usize = 4;

/// Lowest frequency handed to the design formulas (Hz)
const MIN_DESIGN_FREQ: f64 = 1.0;

/// Highest design frequency as a fraction of the sample rate
const MAX_DESIGN_FREQ_RATIO: f64 = 0.499;

/// Smallest Q handed to the design formulas
const MIN_DESIGN_Q: f64 = 0.01;

/// Floor used when converting a magnitude to decibels
pub const MAGNITUDE_FLOOR_DB: f64 = -240.0;

/// Biquad filter coefficients
///
/// Direct Form I, with a0 normalised to 1.0.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BiquadCoeffs {
    /// Numerator coefficients
    pub b0: f32,
    pub b1: f32,
    pub b2: f32,
    /// Denominator coefficients (a0 is normalized to 1.0)
    pub a1: f32,
    pub a2: f32,
}

impl Default for BiquadCoeffs {
    fn default() -> Self {
        // Unity gain (no filtering)
        Self {
            b0: 1.0,
            b1: 0.0,
            b2: 0.0,
            a1: 0.0,
            a2: 0.0,
        }
    }
}

impl BiquadCoeffs {
    /// Normalise raw (b0, b1, b2, a0, a1, a2) by a0
    fn normalized(b0: f64, b1: f64, b2: f64, a0: f64, a1: f64, a2: f64) -> Self {
        Self {
            b0: (b0 / a0) as f32,
            b1: (b1 / a0) as f32,
            b2: (b2 / a0) as f32,
            a1: (a1 / a0) as f32,
            a2: (a2 / a0) as f32,
        }
    }

    /// Calculate coefficients for a peaking (bell) filter
    ///
    /// # Parameters
    /// - `sample_rate`: Audio sample rate in Hz
    /// - `freq`: Centre frequency in Hz, guarded into (0, sample_rate / 2)
    /// - `quality`: Q factor, guarded to a positive value
    /// - `gain_db`: Boost/cut in decibels, `gain = 10^(gain_db / 20)`
    #[must_use]
    pub fn peak(sample_rate: f64, freq: f64, quality: f64, gain_db: f64) -> Self {
        let freq = guard_frequency(freq, sample_rate);
        let quality = guard_quality(quality);
        let gain_db = if gain_db.is_finite() { gain_db } else { 0.0 };

        let gain = db_to_gain(gain_db);
        let a = gain.sqrt();
        let w0 = 2.0 * PI * freq / sample_rate;
        let cos_w0 = w0.cos();
        let alpha = w0.sin() / (2.0 * quality);

        Self::normalized(
            1.0 + alpha * a,
            -2.0 * cos_w0,
            1.0 - alpha * a,
            1.0 + alpha / a,
            -2.0 * cos_w0,
            1.0 - alpha / a,
        )
    }

    /// Second-order high-pass section with the given Q
    #[must_use]
    pub fn high_pass(sample_rate: f64, freq: f64, quality: f64) -> Self {
        let (c1, a1, a2) = Self::pass_denominator(sample_rate, freq, quality);
        Self::from_prenormalized(c1, -2.0 * c1, c1, a1, a2)
    }

    /// Second-order low-pass section with the given Q
    #[must_use]
    pub fn low_pass(sample_rate: f64, freq: f64, quality: f64) -> Self {
        let n = prewarp(guard_frequency(freq, sample_rate), sample_rate);
        let n_sq = n * n;
        let (c1, a1, a2) = Self::pass_denominator(sample_rate, freq, quality);
        Self::from_prenormalized(c1 * n_sq, 2.0 * c1 * n_sq, c1 * n_sq, a1, a2)
    }

    /// Shared bilinear-transform denominator of the pass sections
    ///
    /// Returns `(c1, a1, a2)` where `c1 = 1 / a0`.
    fn pass_denominator(sample_rate: f64, freq: f64, quality: f64) -> (f64, f64, f64) {
        let n = prewarp(guard_frequency(freq, sample_rate), sample_rate);
        let n_sq = n * n;
        let inv_q = 1.0 / guard_quality(quality);
        let c1 = 1.0 / (1.0 + inv_q * n + n_sq);

        (c1, c1 * 2.0 * (n_sq - 1.0), c1 * (1.0 - inv_q * n + n_sq))
    }

    fn from_prenormalized(b0: f64, b1: f64, b2: f64, a1: f64, a2: f64) -> Self {
        Self {
            b0: b0 as f32,
            b1: b1 as f32,
            b2: b2 as f32,
            a1: a1 as f32,
            a2: a2 as f32,
        }
    }

    /// True when every coefficient is a finite number
    pub fn is_finite(&self) -> bool {
        [self.b0, self.b1, self.b2, self.a1, self.a2]
            .iter()
            .all(|c| c.is_finite())
    }

    /// Complex frequency response H(e^jw) at `freq`
    pub fn response_at(&self, freq: f64, sample_rate: f64) -> Complex64 {
        let w = 2.0 * PI * freq / sample_rate;
        let z_inv = Complex64::from_polar(1.0, -w);
        let z_inv_2 = z_inv * z_inv;

        let num = Complex64::new(self.b0 as f64, 0.0)
            + z_inv * self.b1 as f64
            + z_inv_2 * self.b2 as f64;
        let den = Complex64::new(1.0, 0.0) + z_inv * self.a1 as f64 + z_inv_2 * self.a2 as f64;

        num / den
    }

    /// Linear magnitude |H(e^jw)| at `freq`
    pub fn magnitude_at(&self, freq: f64, sample_rate: f64) -> f64 {
        self.response_at(freq, sample_rate).norm()
    }
}

// ============================================================================
// CUT FILTER DESIGN
// ============================================================================

/// Which side of the spectrum a cut filter removes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CutKind {
    /// Low-cut: high-pass response
    HighPass,
    /// High-cut: low-pass response
    LowPass,
}

/// Up to [`MAX_CUT_STAGES`] section coefficients of one cut filter
///
/// Fixed capacity so it can be copied across threads without touching
/// the allocator.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CutCoefficients {
    stages: [BiquadCoeffs; MAX_CUT_STAGES],
    len: usize,
}

impl Default for CutCoefficients {
    fn default() -> Self {
        Self {
            stages: [BiquadCoeffs::default(); MAX_CUT_STAGES],
            len: 0,
        }
    }
}

impl CutCoefficients {
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn as_slice(&self) -> &[BiquadCoeffs] {
        &self.stages[..self.len]
    }

    pub fn iter(&self) -> std::slice::Iter<'_, BiquadCoeffs> {
        self.as_slice().iter()
    }

    pub fn is_finite(&self) -> bool {
        self.iter().all(BiquadCoeffs::is_finite)
    }
}

impl<'a> IntoIterator for &'a CutCoefficients {
    type Item = &'a BiquadCoeffs;
    type IntoIter = std::slice::Iter<'a, BiquadCoeffs>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

/// Design an `order`-th order Butterworth cut filter as `order / 2` biquads
///
/// Section `i` realises one conjugate pole pair of the prototype, with
/// `Q_i = 1 / (2 cos((2i + 1) pi / (2 order)))`. Sections come back in
/// ascending `i`.
///
/// # Panics
/// If `order` is not a positive even number of at most `2 * MAX_CUT_STAGES`.
/// The order is always derived from a [`Slope`](crate::domain::Slope), so
/// anything else is a bug in the caller.
#[must_use]
pub fn butterworth(cutoff: f64, sample_rate: f64, order: usize, kind: CutKind) -> CutCoefficients {
    assert!(
        order > 0 && order % 2 == 0 && order / 2 <= MAX_CUT_STAGES,
        "Butterworth order must be a positive even number <= {}, got {order}",
        2 * MAX_CUT_STAGES
    );

    let mut coeffs = CutCoefficients {
        len: order / 2,
        ..Default::default()
    };

    for (i, stage) in coeffs.stages[..order / 2].iter_mut().enumerate() {
        let angle = (2 * i + 1) as f64 * PI / (2 * order) as f64;
        let quality = 1.0 / (2.0 * angle.cos());

        *stage = match kind {
            CutKind::HighPass => BiquadCoeffs::high_pass(sample_rate, cutoff, quality),
            CutKind::LowPass => BiquadCoeffs::low_pass(sample_rate, cutoff, quality),
        };
    }

    coeffs
}

// ============================================================================
// HELPERS
// ============================================================================

/// Keep a design frequency strictly inside (0, Nyquist)
pub fn guard_frequency(freq: f64, sample_rate: f64) -> f64 {
    let max = sample_rate * MAX_DESIGN_FREQ_RATIO;
    if freq.is_nan() {
        return MIN_DESIGN_FREQ.min(max);
    }
    freq.clamp(MIN_DESIGN_FREQ.min(max), max)
}

/// Keep a Q factor positive and finite
pub fn guard_quality(quality: f64) -> f64 {
    if quality.is_finite() {
        quality.max(MIN_DESIGN_Q)
    } else {
        1.0
    }
}

#[inline]
fn prewarp(freq: f64, sample_rate: f64) -> f64 {
    (PI * freq / sample_rate).tan()
}

/// Convert decibels to a linear gain factor
pub fn db_to_gain(db: f64) -> f64 {
    10.0_f64.powf(db / 20.0)
}

/// Convert a linear magnitude to decibels, floored at [`MAGNITUDE_FLOOR_DB`]
pub fn gain_to_db(gain: f64) -> f64 {
    if gain > 0.0 {
        (20.0 * gain.log10()).max(MAGNITUDE_FLOOR_DB)
    } else {
        MAGNITUDE_FLOOR_DB
    }
}

/// Product of the magnitudes of a cascade of sections at `freq`
pub fn cascade_magnitude<'a, I>(stages: I, freq: f64, sample_rate: f64) -> f64
where
    I: IntoIterator<Item = &'a BiquadCoeffs>,
{
    stages
        .into_iter()
        .map(|c| c.magnitude_at(freq, sample_rate))
        .product()
}
