use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use thiserror::Error;

use crate::engine::EngineError;
use crate::rerank::RerankError;

/// Coarse error category reported in the job error envelope.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorType {
    InvalidRequestError,
    InternalError,
}

impl ErrorType {
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorType::InvalidRequestError => "invalid_request_error",
            ErrorType::InternalError => "internal_error",
        }
    }
}

#[derive(Debug, Error)]
pub enum JobError {
    #[error("Missing required field: {field}")]
    MissingField { field: &'static str },

    #[error("Unknown route: {route}")]
    UnknownRoute { route: String },

    #[error("Invalid input: {reason}")]
    InvalidInput { reason: String },

    #[error("{0}")]
    Engine(#[from] EngineError),

    #[error("{0}")]
    Rerank(#[from] RerankError),

    #[error("failed to encode job output: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("job task failed: {reason}")]
    TaskFailed { reason: String },
}

impl JobError {
    pub fn error_type(&self) -> ErrorType {
        match self {
            JobError::MissingField { .. }
            | JobError::UnknownRoute { .. }
            | JobError::InvalidInput { .. } => ErrorType::InvalidRequestError,
            JobError::Engine(e) if e.is_client_error() => ErrorType::InvalidRequestError,
            JobError::Engine(_)
            | JobError::Rerank(_)
            | JobError::Serialization(_)
            | JobError::TaskFailed { .. } => ErrorType::InternalError,
        }
    }

    /// `{"error": {"message": ..., "type": ...}}`
    pub fn to_envelope(&self) -> Value {
        json!({
            "error": {
                "message": self.to_string(),
                "type": self.error_type().as_str(),
            }
        })
    }
}

impl From<tokio::task::JoinError> for JobError {
    fn from(err: tokio::task::JoinError) -> Self {
        JobError::TaskFailed {
            reason: err.to_string(),
        }
    }
}

pub type JobResult<T> = Result<T, JobError>;
