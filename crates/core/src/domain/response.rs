//! Sampled magnitude response for visualisation

use crate::domain::coeffs::gain_to_db;
use serde::Serialize;

/// Magnitude response sampled at log-spaced frequencies
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResponseCurve {
    /// Sample frequencies in Hz, ascending
    pub frequencies: Vec<f64>,
    /// Magnitude at each frequency in dB
    pub magnitudes_db: Vec<f64>,
}

impl ResponseCurve {
    /// Sample `magnitude` (linear gain) at `points` log-spaced frequencies
    pub fn sample<F>(points: usize, min_freq: f64, max_freq: f64, magnitude: F) -> Self
    where
        F: Fn(f64) -> f64,
    {
        let frequencies = log_spaced_frequencies(points, min_freq, max_freq);
        let magnitudes_db = frequencies
            .iter()
            .map(|&freq| gain_to_db(magnitude(freq)))
            .collect();

        Self {
            frequencies,
            magnitudes_db,
        }
    }

    pub fn len(&self) -> usize {
        self.frequencies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frequencies.is_empty()
    }

    /// (frequency, dB) pairs
    pub fn points(&self) -> impl Iterator<Item = (f64, f64)> + '_ {
        self.frequencies
            .iter()
            .copied()
            .zip(self.magnitudes_db.iter().copied())
    }

    pub fn min_db(&self) -> f64 {
        self.magnitudes_db.iter().copied().fold(f64::INFINITY, f64::min)
    }

    pub fn max_db(&self) -> f64 {
        self.magnitudes_db
            .iter()
            .copied()
            .fold(f64::NEG_INFINITY, f64::max)
    }

    /// Magnitude at the sample closest to `freq` on a log axis
    pub fn nearest_db(&self, freq: f64) -> Option<f64> {
        let target = freq.max(f64::MIN_POSITIVE).ln();
        self.points()
            .min_by(|(a, _), (b, _)| {
                (a.ln() - target)
                    .abs()
                    .total_cmp(&(b.ln() - target).abs())
            })
            .map(|(_, db)| db)
    }
}

/// `points` frequencies spaced evenly on a log axis from `min_freq` to `max_freq`
pub fn log_spaced_frequencies(points: usize, min_freq: f64, max_freq: f64) -> Vec<f64> {
    match points {
        0 => Vec::new(),
        1 => vec![min_freq],
        _ => {
            let ratio = max_freq / min_freq;
            let last = (points - 1) as f64;
            (0..points)
                .map(|i| min_freq * ratio.powf(i as f64 / last))
                .collect()
        }
    }
}
