//! Chain settings and the parameter store they are read from
//!
//! The parameter store is owned by whoever hosts the EQ (a plugin wrapper,
//! a UI, the CLI). The DSP side never holds on to it: it takes a
//! [`ChainSettings`] snapshot once per update point and works from that copy.
//!
//! All values are stored in atomics so that the control surface can write
//! while the audio thread reads, without locks.

use crate::domain::audio::{AudioError, Result};
use std::fmt;
use std::str::FromStr;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU8, Ordering};
use std::sync::Arc;
use tracing::trace;

/// Parameter ranges and defaults
///
/// Writes through [`ParameterStore`] are clamped to these ranges, which is
/// what keeps the coefficient calculator away from degenerate input.
pub mod params {
    /// Frequency range shared by the cut and peak filters (Hz)
    pub const FREQ_MIN: f32 = 20.0;
    pub const FREQ_MAX: f32 = 20000.0;
    pub const FREQ_STEP: f32 = 1.0;

    /// Knob skew of the frequency ranges (below 1 widens the low end)
    pub const LOW_CUT_FREQ_SKEW: f32 = 0.25;
    pub const HIGH_CUT_FREQ_SKEW: f32 = 1.5;
    pub const PEAK_FREQ_SKEW: f32 = 0.25;

    /// Peak gain range (dB)
    pub const GAIN_MIN: f32 = -24.0;
    pub const GAIN_MAX: f32 = 24.0;
    pub const GAIN_STEP: f32 = 0.5;

    /// Peak quality range
    pub const Q_MIN: f32 = 0.1;
    pub const Q_MAX: f32 = 10.0;
    pub const Q_STEP: f32 = 0.05;

    pub const DEFAULT_LOW_CUT_FREQ: f32 = 20.0;
    pub const DEFAULT_HIGH_CUT_FREQ: f32 = 20000.0;
    pub const DEFAULT_PEAK_FREQ: f32 = 750.0;
    pub const DEFAULT_PEAK_GAIN: f32 = 0.0;
    pub const DEFAULT_PEAK_QUALITY: f32 = 1.0;
}

// ============================================================================
// SLOPE
// ============================================================================

/// Cut filter steepness
///
/// Each step adds one cascaded second-order section, i.e. 12 dB/octave.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Slope {
    #[default]
    Db12,
    Db24,
    Db36,
    Db48,
}

impl Slope {
    pub const ALL: [Slope; 4] = [Slope::Db12, Slope::Db24, Slope::Db36, Slope::Db48];

    /// Choice index as exposed by the parameter layout (0..=3)
    pub fn index(self) -> u8 {
        match self {
            Slope::Db12 => 0,
            Slope::Db24 => 1,
            Slope::Db36 => 2,
            Slope::Db48 => 3,
        }
    }

    pub fn from_index(index: u8) -> Result<Self> {
        Self::ALL
            .get(index as usize)
            .copied()
            .ok_or(AudioError::InvalidSlope(index))
    }

    /// Number of enabled biquad stages
    pub fn stage_count(self) -> usize {
        self.index() as usize + 1
    }

    /// Butterworth filter order
    pub fn order(self) -> usize {
        2 * self.stage_count()
    }

    pub fn db_per_octave(self) -> u32 {
        12 * self.stage_count() as u32
    }
}

impl fmt::Display for Slope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} db/Oct", self.db_per_octave())
    }
}

impl FromStr for Slope {
    type Err = AudioError;

    /// Accepts `12`, `24`, `36`, `48`, optionally followed by `db` or `db/oct`
    fn from_str(s: &str) -> Result<Self> {
        let lowered = s.trim().to_ascii_lowercase();
        let digits = lowered
            .trim_end_matches("/oct")
            .trim_end_matches("db")
            .trim();

        match digits {
            "12" => Ok(Slope::Db12),
            "24" => Ok(Slope::Db24),
            "36" => Ok(Slope::Db36),
            "48" => Ok(Slope::Db48),
            _ => Err(AudioError::InvalidConfiguration(format!(
                "slope must be one of 12, 24, 36, 48 (dB/oct), got '{s}'"
            ))),
        }
    }
}

// ============================================================================
// CHAIN SETTINGS
// ============================================================================

/// Point-in-time copy of every user parameter the chain depends on
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ChainSettings {
    pub low_cut_freq: f32,
    pub high_cut_freq: f32,
    pub peak_freq: f32,
    pub peak_gain_in_decibels: f32,
    pub peak_quality: f32,
    pub low_cut_slope: Slope,
    pub high_cut_slope: Slope,
}

impl Default for ChainSettings {
    fn default() -> Self {
        Self {
            low_cut_freq: params::DEFAULT_LOW_CUT_FREQ,
            high_cut_freq: params::DEFAULT_HIGH_CUT_FREQ,
            peak_freq: params::DEFAULT_PEAK_FREQ,
            peak_gain_in_decibels: params::DEFAULT_PEAK_GAIN,
            peak_quality: params::DEFAULT_PEAK_QUALITY,
            low_cut_slope: Slope::default(),
            high_cut_slope: Slope::default(),
        }
    }
}

impl ChainSettings {
    /// Return a copy with every value forced into its parameter range
    ///
    /// NaN falls back to the parameter default.
    #[must_use]
    pub fn clamped(self) -> Self {
        Self {
            low_cut_freq: ParameterId::LowCutFreq.range().clamp(self.low_cut_freq),
            high_cut_freq: ParameterId::HighCutFreq.range().clamp(self.high_cut_freq),
            peak_freq: ParameterId::PeakFreq.range().clamp(self.peak_freq),
            peak_gain_in_decibels: ParameterId::PeakGain
                .range()
                .clamp(self.peak_gain_in_decibels),
            peak_quality: ParameterId::PeakQuality.range().clamp(self.peak_quality),
            low_cut_slope: self.low_cut_slope,
            high_cut_slope: self.high_cut_slope,
        }
    }
}

/// Read access to the current parameter values
///
/// This is the only thing the DSP side needs from the parameter storage.
pub trait ParameterSource: Send + Sync {
    /// Take a snapshot of the current parameter values
    fn chain_settings(&self) -> ChainSettings;
}

impl ParameterSource for ChainSettings {
    fn chain_settings(&self) -> ChainSettings {
        *self
    }
}

impl<T: ParameterSource + ?Sized> ParameterSource for Arc<T> {
    fn chain_settings(&self) -> ChainSettings {
        (**self).chain_settings()
    }
}

// ============================================================================
// PARAMETER LAYOUT
// ============================================================================

/// Identifier of an automatable parameter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ParameterId {
    LowCutFreq,
    HighCutFreq,
    PeakFreq,
    PeakGain,
    PeakQuality,
    LowCutSlope,
    HighCutSlope,
}

/// Inclusive range with a snapping step
///
/// `skew` shapes the mapping to a `0..=1` control position: 1 is linear,
/// smaller values give more of the travel to the bottom of the range.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ParameterRange {
    pub min: f32,
    pub max: f32,
    pub step: f32,
    pub default: f32,
    pub skew: f32,
}

impl ParameterRange {
    /// Clamp into range without snapping
    pub fn clamp(&self, value: f32) -> f32 {
        if value.is_nan() {
            self.default
        } else {
            value.clamp(self.min, self.max)
        }
    }

    /// Clamp into range and snap to the nearest step
    pub fn snap(&self, value: f32) -> f32 {
        let clamped = self.clamp(value);
        let steps = ((clamped - self.min) / self.step).round();
        (self.min + steps * self.step).clamp(self.min, self.max)
    }

    /// Control position of a plain value
    pub fn to_normalised(&self, value: f32) -> f32 {
        let proportion = ((self.clamp(value) - self.min) / (self.max - self.min)).clamp(0.0, 1.0);
        if self.skew == 1.0 {
            proportion
        } else {
            proportion.powf(self.skew)
        }
    }

    /// Plain value at a control position, snapped to the step
    pub fn from_normalised(&self, normalised: f32) -> f32 {
        if normalised.is_nan() {
            return self.default;
        }

        let mut proportion = normalised.clamp(0.0, 1.0);
        if self.skew != 1.0 && proportion > 0.0 {
            proportion = (proportion.ln() / self.skew).exp();
        }
        self.snap(self.min + (self.max - self.min) * proportion)
    }
}

impl ParameterId {
    pub const ALL: [ParameterId; 7] = [
        ParameterId::LowCutFreq,
        ParameterId::HighCutFreq,
        ParameterId::PeakFreq,
        ParameterId::PeakGain,
        ParameterId::PeakQuality,
        ParameterId::LowCutSlope,
        ParameterId::HighCutSlope,
    ];

    /// Stable string id used by hosts and the CLI
    pub fn as_str(&self) -> &'static str {
        match self {
            ParameterId::LowCutFreq => "LowCut Freq",
            ParameterId::HighCutFreq => "HighCut Freq",
            ParameterId::PeakFreq => "Peak Freq",
            ParameterId::PeakGain => "Peak Gain",
            ParameterId::PeakQuality => "Peak Quality",
            ParameterId::LowCutSlope => "LowCut Slope",
            ParameterId::HighCutSlope => "HighCut Slope",
        }
    }

    pub fn parse(id: &str) -> Result<Self> {
        Self::ALL
            .iter()
            .copied()
            .find(|p| p.as_str().eq_ignore_ascii_case(id.trim()))
            .ok_or_else(|| AudioError::UnknownParameter(id.to_string()))
    }

    pub fn is_choice(&self) -> bool {
        matches!(self, ParameterId::LowCutSlope | ParameterId::HighCutSlope)
    }

    pub fn range(&self) -> ParameterRange {
        use params::*;

        match self {
            ParameterId::LowCutFreq => ParameterRange {
                min: FREQ_MIN,
                max: FREQ_MAX,
                step: FREQ_STEP,
                default: DEFAULT_LOW_CUT_FREQ,
                skew: LOW_CUT_FREQ_SKEW,
            },
            ParameterId::HighCutFreq => ParameterRange {
                min: FREQ_MIN,
                max: FREQ_MAX,
                step: FREQ_STEP,
                default: DEFAULT_HIGH_CUT_FREQ,
                skew: HIGH_CUT_FREQ_SKEW,
            },
            ParameterId::PeakFreq => ParameterRange {
                min: FREQ_MIN,
                max: FREQ_MAX,
                step: FREQ_STEP,
                default: DEFAULT_PEAK_FREQ,
                skew: PEAK_FREQ_SKEW,
            },
            ParameterId::PeakGain => ParameterRange {
                min: GAIN_MIN,
                max: GAIN_MAX,
                step: GAIN_STEP,
                default: DEFAULT_PEAK_GAIN,
                skew: 1.0,
            },
            ParameterId::PeakQuality => ParameterRange {
                min: Q_MIN,
                max: Q_MAX,
                step: Q_STEP,
                default: DEFAULT_PEAK_QUALITY,
                skew: 1.0,
            },
            ParameterId::LowCutSlope | ParameterId::HighCutSlope => ParameterRange {
                min: 0.0,
                max: 3.0,
                step: 1.0,
                default: 0.0,
                skew: 1.0,
            },
        }
    }
}

impl fmt::Display for ParameterId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// PARAMETER STORE
// ============================================================================

/// f32 stored as its bit pattern
#[derive(Debug)]
struct AtomicF32(AtomicU32);

impl AtomicF32 {
    fn new(value: f32) -> Self {
        Self(AtomicU32::new(value.to_bits()))
    }

    fn load(&self) -> f32 {
        f32::from_bits(self.0.load(Ordering::Relaxed))
    }

    fn store(&self, value: f32) {
        self.0.store(value.to_bits(), Ordering::Relaxed);
    }
}

/// Lock-free parameter storage with a coalesced change flag
///
/// Every write raises the pending-update flag. Consumers call
/// [`take_pending_update`](Self::take_pending_update) once per tick, so a
/// burst of writes collapses into a single recompute.
#[derive(Debug)]
pub struct ParameterStore {
    low_cut_freq: AtomicF32,
    high_cut_freq: AtomicF32,
    peak_freq: AtomicF32,
    peak_gain: AtomicF32,
    peak_quality: AtomicF32,
    low_cut_slope: AtomicU8,
    high_cut_slope: AtomicU8,
    pending_update: AtomicBool,
}

impl Default for ParameterStore {
    fn default() -> Self {
        Self::new()
    }
}

impl ParameterStore {
    /// Create a store holding the default parameter layout
    ///
    /// The pending flag starts raised so the first consumer tick computes
    /// coefficients.
    pub fn new() -> Self {
        Self::with_settings(&ChainSettings::default())
    }

    pub fn with_settings(settings: &ChainSettings) -> Self {
        let settings = settings.clamped();
        Self {
            low_cut_freq: AtomicF32::new(settings.low_cut_freq),
            high_cut_freq: AtomicF32::new(settings.high_cut_freq),
            peak_freq: AtomicF32::new(settings.peak_freq),
            peak_gain: AtomicF32::new(settings.peak_gain_in_decibels),
            peak_quality: AtomicF32::new(settings.peak_quality),
            low_cut_slope: AtomicU8::new(settings.low_cut_slope.index()),
            high_cut_slope: AtomicU8::new(settings.high_cut_slope.index()),
            pending_update: AtomicBool::new(true),
        }
    }

    /// Current value of a parameter in plain units (slopes as choice index)
    pub fn get(&self, id: ParameterId) -> f32 {
        match id {
            ParameterId::LowCutFreq => self.low_cut_freq.load(),
            ParameterId::HighCutFreq => self.high_cut_freq.load(),
            ParameterId::PeakFreq => self.peak_freq.load(),
            ParameterId::PeakGain => self.peak_gain.load(),
            ParameterId::PeakQuality => self.peak_quality.load(),
            ParameterId::LowCutSlope => self.low_cut_slope.load(Ordering::Relaxed) as f32,
            ParameterId::HighCutSlope => self.high_cut_slope.load(Ordering::Relaxed) as f32,
        }
    }

    /// Write a parameter in plain units
    ///
    /// The value is clamped and snapped to the parameter step, slope choices
    /// included. Returns the value actually stored. Use
    /// [`try_set`](Self::try_set) to reject out-of-range slope indices.
    pub fn set(&self, id: ParameterId, value: f32) -> f32 {
        let stored = id.range().snap(value);

        match id {
            ParameterId::LowCutFreq => self.low_cut_freq.store(stored),
            ParameterId::HighCutFreq => self.high_cut_freq.store(stored),
            ParameterId::PeakFreq => self.peak_freq.store(stored),
            ParameterId::PeakGain => self.peak_gain.store(stored),
            ParameterId::PeakQuality => self.peak_quality.store(stored),
            ParameterId::LowCutSlope => self.low_cut_slope.store(stored as u8, Ordering::Relaxed),
            ParameterId::HighCutSlope => {
                self.high_cut_slope.store(stored as u8, Ordering::Relaxed)
            }
        }

        trace!(parameter = %id, requested = value, stored, "Parameter written");
        self.on_parameter_changed();
        stored
    }

    /// Current value of a parameter as a `0..=1` control position
    pub fn get_normalised(&self, id: ParameterId) -> f32 {
        id.range().to_normalised(self.get(id))
    }

    /// Write a parameter from a `0..=1` control position
    pub fn set_normalised(&self, id: ParameterId, normalised: f32) -> f32 {
        self.set(id, id.range().from_normalised(normalised))
    }

    /// Write a parameter, rejecting slope choices outside `0..=3`
    ///
    /// Choice values are rounded to the nearest index first. On error the
    /// store is left untouched and the pending flag is not raised.
    pub fn try_set(&self, id: ParameterId, value: f32) -> Result<f32> {
        if id.is_choice() {
            choice_index(value)?;
        }
        Ok(self.set(id, value))
    }

    /// Write a parameter by its string id
    pub fn set_by_name(&self, id: &str, value: f32) -> Result<f32> {
        let id = ParameterId::parse(id)?;
        self.try_set(id, value)
    }

    pub fn set_low_cut_slope(&self, slope: Slope) {
        self.set(ParameterId::LowCutSlope, slope.index() as f32);
    }

    pub fn set_high_cut_slope(&self, slope: Slope) {
        self.set(ParameterId::HighCutSlope, slope.index() as f32);
    }

    /// Replace every parameter at once, raising the flag a single time
    pub fn apply_settings(&self, settings: &ChainSettings) {
        let settings = settings.clamped();
        self.low_cut_freq.store(settings.low_cut_freq);
        self.high_cut_freq.store(settings.high_cut_freq);
        self.peak_freq.store(settings.peak_freq);
        self.peak_gain.store(settings.peak_gain_in_decibels);
        self.peak_quality.store(settings.peak_quality);
        self.low_cut_slope
            .store(settings.low_cut_slope.index(), Ordering::Relaxed);
        self.high_cut_slope
            .store(settings.high_cut_slope.index(), Ordering::Relaxed);
        self.on_parameter_changed();
    }

    /// Notification hook for the parameter collaborator
    pub fn on_parameter_changed(&self) {
        self.pending_update.store(true, Ordering::Release);
    }

    /// Test-and-clear the pending-update flag
    pub fn take_pending_update(&self) -> bool {
        self.pending_update.swap(false, Ordering::AcqRel)
    }

    pub fn has_pending_update(&self) -> bool {
        self.pending_update.load(Ordering::Acquire)
    }

    fn slope(cell: &AtomicU8) -> Slope {
        // Writes are clamped to 0..=3, so the fallback is unreachable in practice
        Slope::from_index(cell.load(Ordering::Relaxed)).unwrap_or_default()
    }
}

/// Slope index named by a raw choice value
fn choice_index(value: f32) -> Result<u8> {
    let rounded = value.round();
    let index = if (0.0..=f32::from(u8::MAX)).contains(&rounded) {
        rounded as u8
    } else {
        u8::MAX
    };
    Slope::from_index(index).map(Slope::index)
}

impl ParameterSource for ParameterStore {
    fn chain_settings(&self) -> ChainSettings {
        ChainSettings {
            low_cut_freq: self.low_cut_freq.load(),
            high_cut_freq: self.high_cut_freq.load(),
            peak_freq: self.peak_freq.load(),
            peak_gain_in_decibels: self.peak_gain.load(),
            peak_quality: self.peak_quality.load(),
            low_cut_slope: Self::slope(&self.low_cut_slope),
            high_cut_slope: Self::slope(&self.high_cut_slope),
        }
    }
}
