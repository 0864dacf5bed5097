use std::path::PathBuf;
use thiserror::Error;

/// Failures of the embedder and the loading helpers shared with the reranker.
#[derive(Debug, Error)]
pub enum EmbeddingError {
    #[error("no embedding checkpoint (config, tokenizer, safetensors) under {path}")]
    ModelNotFound { path: PathBuf },

    #[error("failed to resolve model '{model}': {reason}")]
    ModelResolutionFailed { model: String, reason: String },

    #[error("could not load Qwen3 embedding weights: {reason}")]
    ModelLoadFailed { reason: String },

    #[error("cannot use {device} for inference: {reason}")]
    DeviceUnavailable { device: String, reason: String },

    #[error("embedding forward pass failed: {reason}")]
    InferenceFailed { reason: String },

    #[error("could not tokenize input: {reason}")]
    TokenizationFailed { reason: String },

    #[error("bad embedder settings: {reason}")]
    InvalidConfig { reason: String },
}

impl From<candle_core::Error> for EmbeddingError {
    fn from(err: candle_core::Error) -> Self {
        EmbeddingError::InferenceFailed {
            reason: err.to_string(),
        }
    }
}

impl From<std::io::Error> for EmbeddingError {
    fn from(err: std::io::Error) -> Self {
        EmbeddingError::ModelLoadFailed {
            reason: err.to_string(),
        }
    }
}
