use std::path::PathBuf;
use thiserror::Error;

use crate::embedding::error::EmbeddingError;

#[derive(Debug, Error)]
pub enum RerankerError {
    #[error("no reranker checkpoint (config, tokenizer, safetensors) under {path}")]
    ModelNotFound { path: PathBuf },

    #[error("could not load Qwen3 reranker weights: {reason}")]
    ModelLoadFailed { reason: String },

    #[error("cannot use {device} for inference: {reason}")]
    DeviceUnavailable { device: String, reason: String },

    #[error("relevance scoring failed: {reason}")]
    InferenceFailed { reason: String },

    #[error("could not tokenize prompt: {reason}")]
    TokenizationFailed { reason: String },

    #[error("bad reranker settings: {reason}")]
    InvalidConfig { reason: String },

    #[error("token '{token}' is not a single vocabulary entry")]
    MissingToken { token: String },

    #[error("max_length {max_length} leaves no room for the document after {reserved} template tokens")]
    NoTokenBudget { max_length: usize, reserved: usize },
}

impl From<candle_core::Error> for RerankerError {
    fn from(err: candle_core::Error) -> Self {
        RerankerError::InferenceFailed {
            reason: err.to_string(),
        }
    }
}

impl From<std::io::Error> for RerankerError {
    fn from(err: std::io::Error) -> Self {
        RerankerError::ModelLoadFailed {
            reason: err.to_string(),
        }
    }
}

impl From<EmbeddingError> for RerankerError {
    fn from(err: EmbeddingError) -> Self {
        match err {
            EmbeddingError::DeviceUnavailable { device, reason } => {
                RerankerError::DeviceUnavailable { device, reason }
            }
            EmbeddingError::ModelNotFound { path } => RerankerError::ModelNotFound { path },
            EmbeddingError::ModelResolutionFailed { .. } | EmbeddingError::ModelLoadFailed { .. } => {
                RerankerError::ModelLoadFailed {
                    reason: err.to_string(),
                }
            }
            EmbeddingError::TokenizationFailed { reason } => {
                RerankerError::TokenizationFailed { reason }
            }
            _ => RerankerError::InferenceFailed {
                reason: err.to_string(),
            },
        }
    }
}
