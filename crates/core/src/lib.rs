//! Bellcurve core: a cascaded parametric EQ
//!
//! Low-cut → peak → high-cut biquad cascade per channel, designed from a
//! lock-free parameter store and evaluated for magnitude display.

pub mod domain;

pub use domain::*;
