//! Configuration error types.

use thiserror::Error;

/// Errors that can occur during configuration loading and validation.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Port value is outside valid range (1-65535).
    #[error("invalid port '{value}': must be between 1 and 65535")]
    InvalidPort { value: String },

    /// Port string could not be parsed as a number.
    #[error("failed to parse port '{value}': {source}")]
    PortParseError {
        value: String,
        #[source]
        source: std::num::ParseIntError,
    },

    /// Bind address string could not be parsed.
    #[error("failed to parse bind address '{value}': {source}")]
    InvalidBindAddr {
        value: String,
        #[source]
        source: std::net::AddrParseError,
    },

    /// A numeric variable could not be parsed.
    #[error("failed to parse {name}='{value}': {source}")]
    InvalidNumber {
        name: &'static str,
        value: String,
        #[source]
        source: std::num::ParseIntError,
    },

    /// A numeric variable parsed but is out of range.
    #[error("{name} must be greater than zero, got {value}")]
    MustBePositive { name: &'static str, value: usize },

    /// `DEVICE` named an unknown backend.
    #[error("unknown device '{value}': expected one of cpu, cuda, metal")]
    UnknownDevice { value: String },

    /// `TORCH_DTYPE` named an unknown precision.
    #[error("unknown dtype '{value}': expected one of float16, bfloat16, float32")]
    UnknownDtype { value: String },

    /// `MODEL_NAMES` resolved to an empty list.
    #[error("no model names configured")]
    NoModels,

    /// `BATCH_SIZES` has a different length than `MODEL_NAMES`.
    #[error("BATCH_SIZES has {batch_sizes} entries but MODEL_NAMES has {models}")]
    BatchSizeMismatch { models: usize, batch_sizes: usize },
}
