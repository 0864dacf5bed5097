//! Rerank orchestration: prompt formatting, batch scoring, ordering.
//!
//! [`RerankService`] turns a [`RerankRequest`] into one batched call to a
//! [`RelevanceModel`] and returns results sorted by score with a stable
//! index tie-break, so identical inputs always produce identical output.

pub mod error;
pub mod model;
pub mod types;


pub use error::RerankError;
#[cfg(any(test, feature = "mock"))]
pub use model::MockRelevanceModel;
pub use model::RelevanceModel;
pub use types::{RerankRequest, RerankResponse, ScoredResult};

use std::sync::Arc;

use tracing::debug;

use crate::embedding::reranker::format_instruction;

/// Shared handle over a loaded relevance model.
#[derive(Clone)]
pub struct RerankService {
    model: Arc<dyn RelevanceModel>,
}

impl std::fmt::Debug for RerankService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RerankService")
            .field("model", &self.model.model_id())
            .finish()
    }
}

impl RerankService {
    pub fn new(model: Arc<dyn RelevanceModel>) -> Self {
        Self { model }
    }

    pub fn model_id(&self) -> &str {
        self.model.model_id()
    }

    /// Scores every document against the query in one batch and orders them.
    pub fn rerank(&self, request: &RerankRequest) -> Result<RerankResponse, RerankError> {
        let results = if request.documents.is_empty() {
            vec![]
        } else {
            self.score_documents(request)?
        };

        Ok(RerankResponse {
            results,
            model: self.model.model_id().to_string(),
            query: request.query.clone(),
        })
    }

    /// Tokens the request's prompts consume.
    pub fn prompt_tokens(&self, request: &RerankRequest) -> usize {
        self.model.count_tokens(&build_prompts(request))
    }

    fn score_documents(&self, request: &RerankRequest) -> Result<Vec<ScoredResult>, RerankError> {
        let prompts = build_prompts(request);

        debug!(
            documents = prompts.len(),
            top_k = ?request.top_k,
            "Scoring rerank batch"
        );

        let scores = self.model.score(&prompts)?;
        if scores.len() != prompts.len() {
            return Err(RerankError::ScoreCountMismatch {
                expected: prompts.len(),
                actual: scores.len(),
            });
        }

        let mut results: Vec<ScoredResult> = scores
            .into_iter()
            .zip(&request.documents)
            .enumerate()
            .map(|(index, (score, doc))| ScoredResult {
                index,
                score,
                document: request.return_documents.then(|| doc.clone()),
            })
            .collect();

        sort_by_relevance(&mut results);

        if let Some(top_k) = request.top_k {
            results.truncate(top_k);
        }

        Ok(results)
    }
}

fn build_prompts(request: &RerankRequest) -> Vec<String> {
    request
        .documents
        .iter()
        .map(|doc| format_instruction(request.instruction.as_deref(), &request.query, doc))
        .collect()
}

/// Score descending; equal scores keep ascending original index.
pub fn sort_by_relevance(results: &mut [ScoredResult]) {
    results.sort_by(|a, b| b.score.total_cmp(&a.score).then(a.index.cmp(&b.index)));
}
