use thiserror::Error;

use crate::embedding::RerankerError;

#[derive(Debug, Error)]
pub enum RerankError {
    #[error("reranker error: {0}")]
    Reranker(#[from] RerankerError),

    #[error("model returned {actual} scores for {expected} documents")]
    ScoreCountMismatch { expected: usize, actual: usize },
}
