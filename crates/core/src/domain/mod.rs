//! Domain entities and business rules

pub mod audio;
pub mod coeffs;
pub mod config;
pub mod filter;
pub mod processor;
pub mod response;
pub mod settings;

// Re-export specific items to avoid ambiguous glob imports
pub use audio::{validate_sample_rate, AudioError, Channel, MIN_SAMPLE_RATE};
pub use coeffs::{butterworth, BiquadCoeffs, CutCoefficients, CutKind, MAX_CUT_STAGES};
pub use config::{AppConfig, ConfigError, EngineConfig, ResponseConfig};
pub use filter::{ChainPosition, CutFilter, FilterChain, FilterStage};
pub use processor::{ChainUpdate, ChannelProcessor, Equalizer};
pub use response::ResponseCurve;
pub use settings::{
    params, ChainSettings, ParameterId, ParameterRange, ParameterSource, ParameterStore, Slope,
};
