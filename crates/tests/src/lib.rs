//! Cross-crate integration tests for Bellcurve

#[cfg(test)]
mod eq_integration;
