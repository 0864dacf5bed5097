use thiserror::Error;

use crate::config::ConfigError;
use crate::embedding::{EmbeddingError, RerankerError};
use crate::rerank::RerankError;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("model '{model}' is not served (available: {available})")]
    ModelNotFound { model: String, available: String },

    #[error("model '{model}' does not support {operation}")]
    UnsupportedOperation {
        model: String,
        operation: &'static str,
    },

    #[error("model is required when {count} {kind} engines are served")]
    AmbiguousModel { kind: &'static str, count: usize },

    #[error("input must contain at least one text")]
    EmptyInput,

    #[error("invalid engine configuration: {0}")]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Embedding(#[from] EmbeddingError),

    #[error(transparent)]
    Reranker(#[from] RerankerError),

    #[error(transparent)]
    Rerank(#[from] RerankError),

    #[error("engine task failed: {reason}")]
    TaskFailed { reason: String },
}

impl EngineError {
    /// Returns `true` if the caller's request (not the engine) is at fault.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            EngineError::ModelNotFound { .. }
                | EngineError::UnsupportedOperation { .. }
                | EngineError::AmbiguousModel { .. }
                | EngineError::EmptyInput
        )
    }
}

impl From<tokio::task::JoinError> for EngineError {
    fn from(err: tokio::task::JoinError) -> Self {
        EngineError::TaskFailed {
            reason: err.to_string(),
        }
    }
}

pub type EngineResult<T> = Result<T, EngineError>;
