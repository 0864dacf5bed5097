//! Named model engines behind a start/stop lifecycle.
//!
//! Engines are loaded together on [`EngineArray::start`] and dropped on
//! [`EngineArray::stop`]. Transitions are serialised by one async mutex, so
//! concurrent starters never load the weights twice. Inference runs on the
//! blocking pool; the loaded models are shared read-only between requests.

pub mod error;
pub mod instruction;
pub mod types;

#[cfg(test)]
mod tests;

pub use error::{EngineError, EngineResult};
pub use instruction::{apply_instruction, embedding_prefix};
pub use types::{
    EmbeddingInput, EmbeddingObject, EmbeddingResponse, EngineKind, EngineOptions,
    EngineRerankResponse, EngineSpec, EngineState, ModelCard, ModelList, RerankObject, Usage,
};

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::embedding::utils::served_model_name;
use crate::embedding::{Embedder, EmbedderConfig, Reranker, RerankerConfig};
use crate::rerank::{RerankRequest, RerankService};

const OWNED_BY: &str = "embrank";
const BACKEND: &str = "candle";

enum LoadedEngine {
    Embedding(Arc<Embedder>),
    Rerank(RerankService),
}

impl LoadedEngine {
    fn kind(&self) -> EngineKind {
        match self {
            LoadedEngine::Embedding(_) => EngineKind::Embedding,
            LoadedEngine::Rerank(_) => EngineKind::Rerank,
        }
    }
}

/// Engines keyed by served model name.
pub struct EngineArray {
    specs: Vec<EngineSpec>,
    options: EngineOptions,
    engines: RwLock<HashMap<String, Arc<LoadedEngine>>>,
    state: RwLock<EngineState>,
    transition: Mutex<()>,
}

impl std::fmt::Debug for EngineArray {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EngineArray")
            .field("models", &self.list_models())
            .field("state", &self.state())
            .finish()
    }
}

impl EngineArray {
    /// Creates a stopped array; nothing is loaded until [`start`](Self::start).
    pub fn new(specs: Vec<EngineSpec>, options: EngineOptions) -> Self {
        Self {
            specs,
            options,
            engines: RwLock::new(HashMap::new()),
            state: RwLock::new(EngineState::Stopped),
            transition: Mutex::new(()),
        }
    }

    /// Array for `MODEL_NAMES` / `BATCH_SIZES`.
    pub fn from_config(config: &Config) -> EngineResult<Self> {
        Ok(Self::new(
            EngineSpec::from_config(config)?,
            EngineOptions::from_config(config),
        ))
    }

    pub fn state(&self) -> EngineState {
        *self.state.read()
    }

    pub fn is_running(&self) -> bool {
        self.state() == EngineState::Running
    }

    pub fn specs(&self) -> &[EngineSpec] {
        &self.specs
    }

    /// Served model names in configuration order.
    pub fn list_models(&self) -> Vec<String> {
        self.specs.iter().map(|spec| spec.name.clone()).collect()
    }

    /// OpenAI model list for the served engines.
    pub fn openai_models(&self) -> ModelList {
        let created = chrono::Utc::now().timestamp();
        ModelList::new(
            self.specs
                .iter()
                .map(|spec| ModelCard {
                    id: spec.name.clone(),
                    object: "model".to_string(),
                    owned_by: OWNED_BY.to_string(),
                    created,
                    backend: Some(BACKEND.to_string()),
                })
                .collect(),
        )
    }

    /// Loads every engine. No-op when already running.
    pub async fn start(&self) -> EngineResult<()> {
        let _guard = self.transition.lock().await;

        if self.state() == EngineState::Running {
            return Ok(());
        }

        *self.state.write() = EngineState::Starting;
        info!(engines = self.specs.len(), "Starting engine array");

        let specs = self.specs.clone();
        let options = self.options.clone();
        let loaded = tokio::task::spawn_blocking(move || load_engines(&specs, &options))
            .await
            .map_err(EngineError::from)
            .and_then(|result| result);

        match loaded {
            Ok(engines) => {
                *self.engines.write() = engines;
                *self.state.write() = EngineState::Running;
                info!("Engine array running");
                Ok(())
            }
            Err(e) => {
                *self.state.write() = EngineState::Stopped;
                warn!(error = %e, "Engine array failed to start");
                Err(e)
            }
        }
    }

    /// Drops every engine. No-op when already stopped.
    pub async fn stop(&self) {
        let _guard = self.transition.lock().await;

        if self.state() == EngineState::Stopped {
            return;
        }

        *self.state.write() = EngineState::Stopping;
        self.engines.write().clear();
        *self.state.write() = EngineState::Stopped;
        info!("Engine array stopped");
    }

    /// Embeds `inputs` with the named engine (OpenAI embedding envelope).
    pub async fn embed(
        &self,
        model: &str,
        inputs: Vec<String>,
        instruction: Option<&str>,
        prompt_type: Option<&str>,
    ) -> EngineResult<EmbeddingResponse> {
        if inputs.is_empty() {
            return Err(EngineError::EmptyInput);
        }
        self.ensure_running().await?;

        let name = served_model_name(model);
        let embedder = match self.engine(&name)?.as_ref() {
            LoadedEngine::Embedding(embedder) => Arc::clone(embedder),
            LoadedEngine::Rerank(_) => {
                return Err(EngineError::UnsupportedOperation {
                    model: name,
                    operation: "embeddings",
                });
            }
        };

        let texts = apply_instruction(inputs, instruction, prompt_type);
        debug!(model = %name, inputs = texts.len(), "Embedding request");

        let embeddings = tokio::task::spawn_blocking(move || embedder.embed(&texts)).await??;

        Ok(EmbeddingResponse {
            object: "list".to_string(),
            data: embeddings
                .vectors
                .into_iter()
                .enumerate()
                .map(|(index, embedding)| EmbeddingObject {
                    object: "embedding".to_string(),
                    embedding,
                    index,
                })
                .collect(),
            model: name,
            usage: Usage::new(embeddings.prompt_tokens),
            id: response_id(),
            created: chrono::Utc::now().timestamp(),
        })
    }

    /// Reranks `docs` against `query` with the named (or sole) rerank engine.
    pub async fn rerank(
        &self,
        model: Option<&str>,
        query: &str,
        docs: Vec<String>,
        return_docs: bool,
    ) -> EngineResult<EngineRerankResponse> {
        if docs.is_empty() {
            return Err(EngineError::EmptyInput);
        }
        self.ensure_running().await?;

        let name = match model {
            Some(model) => served_model_name(model),
            None => self.sole_engine(EngineKind::Rerank)?,
        };
        let service = match self.engine(&name)?.as_ref() {
            LoadedEngine::Rerank(service) => service.clone(),
            LoadedEngine::Embedding(_) => {
                return Err(EngineError::UnsupportedOperation {
                    model: name,
                    operation: "rerank",
                });
            }
        };

        let request = RerankRequest::new(query, docs).with_return_documents(return_docs);
        debug!(model = %name, documents = request.documents.len(), "Rerank request");

        let (response, prompt_tokens) = tokio::task::spawn_blocking(move || {
            service
                .rerank(&request)
                .map(|response| (response, service.prompt_tokens(&request)))
        })
        .await??;

        Ok(EngineRerankResponse {
            object: "rerank".to_string(),
            results: response
                .results
                .into_iter()
                .map(|result| RerankObject {
                    relevance_score: result.score,
                    index: result.index,
                    document: result.document,
                })
                .collect(),
            model: name,
            usage: Usage::new(prompt_tokens),
            id: response_id(),
            created: chrono::Utc::now().timestamp(),
        })
    }

    async fn ensure_running(&self) -> EngineResult<()> {
        if self.is_running() {
            return Ok(());
        }
        self.start().await
    }

    fn engine(&self, name: &str) -> EngineResult<Arc<LoadedEngine>> {
        self.engines
            .read()
            .get(name)
            .cloned()
            .ok_or_else(|| EngineError::ModelNotFound {
                model: name.to_string(),
                available: self.list_models().join(", "),
            })
    }

    fn sole_engine(&self, kind: EngineKind) -> EngineResult<String> {
        let mut matching = self.specs.iter().filter(|spec| spec.kind == kind);
        match (matching.next(), matching.next()) {
            (Some(spec), None) => Ok(spec.name.clone()),
            _ => Err(EngineError::AmbiguousModel {
                kind: kind.as_str(),
                count: self.specs.iter().filter(|spec| spec.kind == kind).count(),
            }),
        }
    }
}

fn load_engines(
    specs: &[EngineSpec],
    options: &EngineOptions,
) -> EngineResult<HashMap<String, Arc<LoadedEngine>>> {
    let mut engines = HashMap::with_capacity(specs.len());

    for spec in specs {
        info!(
            model = %spec.path,
            name = %spec.name,
            kind = spec.kind.as_str(),
            batch_size = spec.batch_size,
            stub = spec.stub,
            "Loading engine"
        );

        let engine = match spec.kind {
            EngineKind::Embedding => {
                let config = EmbedderConfig {
                    model: spec.path.clone(),
                    max_length: options.max_length,
                    batch_size: spec.batch_size,
                    device: options.device,
                    precision: options.precision,
                    hf_home: options.hf_home.clone(),
                    testing_stub: spec.stub,
                };
                LoadedEngine::Embedding(Arc::new(Embedder::load(config)?))
            }
            EngineKind::Rerank => {
                let config = RerankerConfig {
                    model: spec.path.clone(),
                    max_length: options.max_length,
                    device: options.device,
                    precision: options.precision,
                    hf_home: options.hf_home.clone(),
                    testing_stub: spec.stub,
                };
                LoadedEngine::Rerank(RerankService::new(Arc::new(Reranker::load(config)?)))
            }
        };

        debug!(name = %spec.name, kind = engine.kind().as_str(), "Engine loaded");
        engines.insert(spec.name.clone(), Arc::new(engine));
    }

    Ok(engines)
}

fn response_id() -> String {
    format!("embrank-{}", uuid::Uuid::new_v4())
}
