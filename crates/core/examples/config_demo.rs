//! Example demonstrating engine configuration and the EQ response
//!
//! Run with: cargo run --package bellcurve-core --example config_demo

use bellcurve_core::domain::{
    AppConfig, Equalizer, ParameterId, ParameterSource, ParameterStore, Slope,
};
use std::sync::Arc;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter("bellcurve_core=debug,info")
        .init();

    println!("=== Bellcurve Configuration Demo ===\n");

    // 1. Save and reload the default configuration
    println!("1. Saving default configuration...");
    let config_path = std::env::temp_dir().join("bellcurve_demo_config.toml");
    AppConfig::default().save_to_file(&config_path).await?;
    let config = AppConfig::load_from_file(&config_path).await?;
    println!(
        "   ✓ Loaded: {} Hz, {} frame blocks, {} ms ticks",
        config.engine.sample_rate, config.engine.max_block_size, config.engine.update_interval_ms
    );

    // 2. Shape the EQ through the parameter store
    println!("\n2. Setting parameters...");
    let store = Arc::new(ParameterStore::new());
    store.set(ParameterId::LowCutFreq, 80.0);
    store.set_low_cut_slope(Slope::Db24);
    store.set(ParameterId::PeakFreq, 3000.0);
    store.set(ParameterId::PeakGain, 4.5);
    store.set(ParameterId::HighCutFreq, 14000.0);
    println!("   ✓ {:?}", store.chain_settings());

    // 3. Prepare and print the response curve
    println!("\n3. Response curve:");
    let mut eq = Equalizer::new(store);
    eq.prepare(config.engine.sample_rate as f64, config.engine.max_block_size)?;

    let response = &config.response;
    if let Some(curve) = eq.response_curve_if_changed(12, response.min_freq, response.max_freq) {
        for (freq, db) in curve.points() {
            println!("   {freq:>8.1} Hz  {db:>7.2} dB");
        }
    }

    tokio::fs::remove_file(&config_path).await?;
    println!("\n=== Demo Complete ===");
    Ok(())
}
