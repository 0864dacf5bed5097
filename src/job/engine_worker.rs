use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use tracing::debug;

use super::error::{JobError, JobResult};
use super::handler::JobHandler;
use super::request::{EmbedJob, JobRequest, RerankJob};
use crate::engine::EngineArray;

/// Job handler over an [`EngineArray`] (embeddings and rerank).
#[derive(Debug, Clone)]
pub struct EngineWorker {
    engines: Arc<EngineArray>,
    max_concurrency: usize,
}

impl EngineWorker {
    pub fn new(engines: Arc<EngineArray>, max_concurrency: usize) -> Self {
        Self {
            engines,
            max_concurrency,
        }
    }

    pub fn engines(&self) -> &Arc<EngineArray> {
        &self.engines
    }

    async fn embed(&self, job: EmbedJob) -> JobResult<Value> {
        let model = job.model.ok_or(JobError::MissingField { field: "model" })?;

        let response = self
            .engines
            .embed(
                &model,
                job.input,
                job.instruction.as_deref(),
                job.prompt_type.as_deref(),
            )
            .await?;

        // The OpenAI proxy expects a list of response chunks.
        if job.openai_route.is_some() {
            Ok(Value::Array(vec![serde_json::to_value(response)?]))
        } else {
            Ok(serde_json::to_value(response)?)
        }
    }

    async fn rerank(&self, job: RerankJob) -> JobResult<Value> {
        let mut response = self
            .engines
            .rerank(
                job.model.as_deref(),
                &job.query,
                job.documents,
                job.return_documents,
            )
            .await?;

        if let Some(top_k) = job.top_k {
            response.results.truncate(top_k);
        }

        Ok(serde_json::to_value(response)?)
    }
}

#[async_trait]
impl JobHandler for EngineWorker {
    async fn dispatch(&self, input: Value) -> JobResult<Value> {
        let request = JobRequest::parse(&input)?;
        debug!(operation = request.operation(), "Dispatching job");

        match request {
            JobRequest::ListModels => Ok(serde_json::to_value(self.engines.openai_models())?),
            JobRequest::Embed(job) => self.embed(job).await,
            JobRequest::Rerank(job) => self.rerank(job).await,
        }
    }

    fn max_concurrency(&self) -> usize {
        self.max_concurrency
    }
}
