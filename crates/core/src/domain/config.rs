//! Configuration management for Bellcurve
//!
//! This module provides:
//! - Engine configuration (stream format, control-task timing, handoff depth)
//! - Response-curve sampling configuration for visualisation
//! - TOML load/save and validation
//!
//! Only the engine is configured here. EQ parameter values live in the
//! [`ParameterStore`](crate::domain::settings::ParameterStore) and are never
//! written to disk.

use crate::domain::audio::{validate_sample_rate, MIN_SAMPLE_RATE};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use tokio::fs;
use tracing::{debug, info, instrument};

pub type Result<T> = std::result::Result<T, ConfigError>;

/// Errors that can occur during configuration operations
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parsing error: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("TOML serialization error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Stream format and real-time handoff settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Sample rate in Hz
    pub sample_rate: u32,

    /// Largest block the host will pass to `process_block`
    pub max_block_size: usize,

    /// Control task tick interval in milliseconds
    pub update_interval_ms: u64,

    /// Depth of the controller → renderer snapshot channel
    pub channel_capacity: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            sample_rate: 48000,
            max_block_size: 512,
            update_interval_ms: 30,
            channel_capacity: 4,
        }
    }
}

impl EngineConfig {
    pub fn update_interval(&self) -> Duration {
        Duration::from_millis(self.update_interval_ms)
    }
}

/// How the magnitude response is sampled for display
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResponseConfig {
    /// Number of log-spaced sample points
    pub points: usize,

    /// Lowest frequency in Hz
    pub min_freq: f64,

    /// Highest frequency in Hz
    pub max_freq: f64,
}

impl Default for ResponseConfig {
    fn default() -> Self {
        Self {
            points: 256,
            min_freq: 20.0,
            max_freq: 20000.0,
        }
    }
}

/// Complete Bellcurve configuration
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub engine: EngineConfig,
    pub response: ResponseConfig,
}

impl AppConfig {
    /// Load configuration from TOML file
    ///
    /// Missing sections and keys take their default values.
    #[instrument(skip(path))]
    pub async fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        info!(path = %path.display(), "Loading configuration");

        let contents = fs::read_to_string(path).await?;
        let config: Self = toml::from_str(&contents)?;
        config.validate()?;

        debug!("Configuration loaded successfully");
        Ok(config)
    }

    /// Load from `path` if it exists, otherwise return the defaults
    pub async fn load_or_default<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if fs::try_exists(path).await? {
            Self::load_from_file(path).await
        } else {
            info!(path = %path.display(), "Config file not found, using defaults");
            Ok(Self::default())
        }
    }

    /// Save configuration to TOML file
    #[instrument(skip(self, path))]
    pub async fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        info!(path = %path.display(), "Saving configuration");

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await?;
        }

        let toml_str = toml::to_string_pretty(self)?;
        fs::write(path, toml_str).await?;

        debug!("Configuration saved successfully");
        Ok(())
    }

    /// Reject values the engine cannot run with
    pub fn validate(&self) -> Result<()> {
        let engine = &self.engine;
        if validate_sample_rate(engine.sample_rate as f64).is_err() {
            return Err(ConfigError::Invalid(format!(
                "engine.sample_rate must be >= {MIN_SAMPLE_RATE} Hz, got {}",
                engine.sample_rate
            )));
        }
        if engine.max_block_size == 0 {
            return Err(ConfigError::Invalid(
                "engine.max_block_size must be > 0".to_string(),
            ));
        }
        if engine.update_interval_ms == 0 {
            return Err(ConfigError::Invalid(
                "engine.update_interval_ms must be > 0".to_string(),
            ));
        }
        if engine.channel_capacity == 0 {
            return Err(ConfigError::Invalid(
                "engine.channel_capacity must be > 0".to_string(),
            ));
        }

        let response = &self.response;
        if response.points == 0 {
            return Err(ConfigError::Invalid("response.points must be > 0".to_string()));
        }
        if !(response.min_freq > 0.0 && response.min_freq < response.max_freq) {
            return Err(ConfigError::Invalid(format!(
                "response frequency span must be increasing and positive, got {}..{}",
                response.min_freq, response.max_freq
            )));
        }

        Ok(())
    }

    /// Default config file location
    ///
    /// `~/.config/bellcurve/config.toml` on Linux,
    /// `%APPDATA%\bellcurve\config.toml` on Windows
    pub fn default_config_path() -> Result<PathBuf> {
        dirs::config_dir()
            .map(|p| p.join("bellcurve").join("config.toml"))
            .ok_or_else(|| ConfigError::Invalid("Could not determine config directory".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_config_serialization() {
        let config = AppConfig::default();

        let toml_str = toml::to_string_pretty(&config).unwrap();
        let parsed: AppConfig = toml::from_str(&toml_str).unwrap();

        assert_eq!(config, parsed);
    }

    #[test]
    fn test_defaults() {
        let config = AppConfig::default();
        assert_eq!(config.engine.sample_rate, 48000);
        assert_eq!(config.engine.max_block_size, 512);
        assert_eq!(config.engine.update_interval(), Duration::from_millis(30));
        assert_eq!(config.engine.channel_capacity, 4);
        assert_eq!(config.response.points, 256);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_file_uses_defaults() {
        let parsed: AppConfig = toml::from_str("[engine]\nsample_rate = 96000\n").unwrap();
        assert_eq!(parsed.engine.sample_rate, 96000);
        assert_eq!(parsed.engine.max_block_size, 512);
        assert_eq!(parsed.response, ResponseConfig::default());
    }

    #[test]
    fn test_validation_rejects_bad_values() {
        let mut config = AppConfig::default();
        config.engine.sample_rate = 0;
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));

        let mut config = AppConfig::default();
        config.engine.sample_rate = 500;
        assert!(config.validate().is_err());

        let mut config = AppConfig::default();
        config.engine.channel_capacity = 0;
        assert!(config.validate().is_err());

        let mut config = AppConfig::default();
        config.response.min_freq = 20000.0;
        config.response.max_freq = 20.0;
        assert!(config.validate().is_err());

        let mut config = AppConfig::default();
        config.response.points = 0;
        assert!(config.validate().is_err());
    }

    #[tokio::test]
    async fn test_save_and_load_config() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("nested").join("config.toml");

        let mut config = AppConfig::default();
        config.engine.sample_rate = 44100;
        config.response.points = 64;
        config.save_to_file(&config_path).await.unwrap();

        assert!(config_path.exists());

        let loaded = AppConfig::load_from_file(&config_path).await.unwrap();
        assert_eq!(loaded, config);
    }

    #[tokio::test]
    async fn test_load_rejects_invalid_file() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("config.toml");
        tokio::fs::write(&config_path, "[engine]\nmax_block_size = 0\n")
            .await
            .unwrap();

        let result = AppConfig::load_from_file(&config_path).await;
        assert!(matches!(result, Err(ConfigError::Invalid(_))));
    }

    #[tokio::test]
    async fn test_load_rejects_malformed_toml() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("config.toml");
        tokio::fs::write(&config_path, "engine = [").await.unwrap();

        let result = AppConfig::load_from_file(&config_path).await;
        assert!(matches!(result, Err(ConfigError::TomlParse(_))));
    }

    #[tokio::test]
    async fn test_missing_file_falls_back_to_defaults() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("absent.toml");

        let config = AppConfig::load_or_default(&config_path).await.unwrap();
        assert_eq!(config, AppConfig::default());
    }

    #[test]
    fn test_default_config_path() {
        if let Ok(path) = AppConfig::default_config_path() {
            assert!(path.ends_with("bellcurve/config.toml"));
        }
    }
}
