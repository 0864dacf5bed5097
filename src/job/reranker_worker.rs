use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use tracing::{debug, info};

use super::error::{JobError, JobResult};
use super::handler::JobHandler;
use super::request::{JobRequest, RerankJob, is_embeddings_route};
use crate::config::Config;
use crate::constants::{RERANKER_MODEL_CREATED, RERANKER_MODEL_OWNER};
use crate::embedding::utils::served_model_name;
use crate::embedding::{Reranker, RerankerConfig, RerankerError};
use crate::engine::{ModelCard, ModelList};
use crate::rerank::{RerankRequest, RerankService};

/// Job handler serving a single reranker.
#[derive(Debug, Clone)]
pub struct RerankerWorker {
    service: RerankService,
    max_concurrency: usize,
}

impl RerankerWorker {
    pub fn new(service: RerankService, max_concurrency: usize) -> Self {
        Self {
            service,
            max_concurrency,
        }
    }

    /// Loads the reranker named by `MODEL_NAME`. Fails at startup, never per request.
    pub fn from_config(config: &Config) -> Result<Self, RerankerError> {
        let reranker = Reranker::load(RerankerConfig::from_config(config))?;
        info!(model = %reranker.model_id(), "Reranker worker ready");
        Ok(Self::new(
            RerankService::new(Arc::new(reranker)),
            config.max_concurrency,
        ))
    }

    pub fn service(&self) -> &RerankService {
        &self.service
    }

    fn models(&self) -> ModelList {
        ModelList::new(vec![ModelCard {
            id: served_model_name(self.service.model_id()),
            object: "model".to_string(),
            owned_by: RERANKER_MODEL_OWNER.to_string(),
            created: RERANKER_MODEL_CREATED,
            backend: None,
        }])
    }

    async fn rerank(&self, job: RerankJob) -> JobResult<Value> {
        let mut request = RerankRequest::new(job.query, job.documents)
            .with_return_documents(job.return_documents);
        request.instruction = job.instruction;
        request.top_k = job.top_k;

        let service = self.service.clone();
        let response = tokio::task::spawn_blocking(move || service.rerank(&request)).await??;

        Ok(serde_json::to_value(response)?)
    }
}

#[async_trait]
impl JobHandler for RerankerWorker {
    async fn dispatch(&self, input: Value) -> JobResult<Value> {
        // The embeddings route does not exist here, whatever its body holds.
        if let Some(route) = JobRequest::openai_route(&input).filter(|r| is_embeddings_route(r)) {
            return Err(JobError::UnknownRoute {
                route: route.to_string(),
            });
        }

        let request = JobRequest::parse(&input)?;
        debug!(operation = request.operation(), "Dispatching job");

        match request {
            JobRequest::ListModels => Ok(serde_json::to_value(self.models())?),
            JobRequest::Rerank(job) => self.rerank(job).await,
            JobRequest::Embed(_) => Err(JobError::InvalidInput {
                reason: "this worker serves rerank requests only".to_string(),
            }),
        }
    }

    fn max_concurrency(&self) -> usize {
        self.max_concurrency
    }
}
