//! Serverless job dispatch.
//!
//! [`JobRequest`] decodes a job input; [`RerankerWorker`] and
//! [`EngineWorker`] run it and collapse any failure into the error envelope.

pub mod engine_worker;
pub mod error;
pub mod handler;
pub mod request;
pub mod reranker_worker;

#[cfg(test)]
mod tests;

pub use engine_worker::EngineWorker;
pub use error::{ErrorType, JobError, JobResult};
pub use handler::JobHandler;
pub use request::{EmbedJob, JobRequest, RerankJob, is_embeddings_route, normalize_route};
pub use reranker_worker::RerankerWorker;

use serde_json::{Value, json};

/// Sample rerank job used by `--test-job` and smoke tests.
pub fn sample_rerank_job() -> Value {
    json!({
        "query": "What product has the best warranty?",
        "documents": [
            "Product A comes with a comprehensive 2-year warranty covering all parts and labor",
            "Product B includes a lifetime warranty but only covers manufacturing defects",
            "Product C has a 90-day limited warranty with no coverage for wear and tear",
            "Product D offers extended warranty options up to 5 years for additional cost",
            "Product E provides 1-year standard warranty with free shipping for repairs"
        ],
        "return_documents": true,
        "top_k": 3
    })
}
