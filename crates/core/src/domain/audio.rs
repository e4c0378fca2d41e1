//! Audio format abstractions and domain errors
//!
//! This module defines the error type shared by the EQ core and the
//! sample-rate / channel vocabulary used by the processor and configuration.

use thiserror::Error;

/// Lowest sample rate the processor can be prepared at
pub const MIN_SAMPLE_RATE: f64 = 1000.0;

/// Errors that can occur in the EQ core
///
/// None of these ever cross the real-time boundary: the audio path
/// falls back to passthrough instead of returning an error.
#[derive(Debug, Error, PartialEq)]
pub enum AudioError {
    /// Invalid format or engine configuration
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// A parameter id that the store does not know about
    #[error("Unknown parameter: {0}")]
    UnknownParameter(String),

    /// Slope choice index outside 0..=3
    #[error("Invalid slope index: {0}")]
    InvalidSlope(u8),
}

pub type Result<T> = std::result::Result<T, AudioError>;

/// Validate a raw sample rate coming from a host, the command line or a
/// configuration file
pub fn validate_sample_rate(hz: f64) -> Result<f64> {
    if hz.is_finite() && hz >= MIN_SAMPLE_RATE {
        Ok(hz)
    } else {
        Err(AudioError::InvalidConfiguration(format!(
            "sample rate must be a finite value >= {MIN_SAMPLE_RATE} Hz, got {hz}"
        )))
    }
}

/// Audio channel of a stereo buffer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Channel {
    Left,
    Right,
}

impl Channel {
    /// Number of channels the processor keeps a filter chain for
    pub const COUNT: usize = 2;

    pub fn index(self) -> usize {
        match self {
            Channel::Left => 0,
            Channel::Right => 1,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sample_rate_validation() {
        assert_eq!(validate_sample_rate(44100.0), Ok(44100.0));
        assert_eq!(validate_sample_rate(MIN_SAMPLE_RATE), Ok(MIN_SAMPLE_RATE));
        assert!(validate_sample_rate(0.0).is_err());
        assert!(validate_sample_rate(999.0).is_err());
        assert!(validate_sample_rate(f64::NAN).is_err());
        assert!(validate_sample_rate(f64::INFINITY).is_err());
        assert!(validate_sample_rate(-48000.0).is_err());
    }

    #[test]
    fn test_channel_index() {
        assert_eq!(Channel::Left.index(), 0);
        assert_eq!(Channel::Right.index(), 1);
        assert_eq!(Channel::COUNT, 2);
    }
}
