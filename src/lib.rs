//! Embrank library crate (used by the server and integration tests).
//!
//! # Public API Surface
//!
//! ## Configuration
//! - [`Config`], [`ConfigError`] - Environment-driven settings
//!
//! ## Model Adapters
//! - [`Reranker`], [`RerankerConfig`] - Qwen3 yes/no relevance scoring
//! - [`Embedder`], [`EmbedderConfig`] - Qwen3 last-token embeddings
//!
//! ## Orchestration
//! - [`RerankService`], [`RelevanceModel`] - Prompt formatting, scoring, ordering
//! - [`EngineArray`] - Named engines behind an idempotent start/stop lifecycle
//! - [`RerankerWorker`], [`EngineWorker`], [`JobHandler`] - Job dispatch
//!
//! ## Storage
//! - [`ModelVolume`] - Container-to-volume model persistence
//!
//! ## Test/Mock Support
//! Mock implementations are available behind `#[cfg(any(test, feature = "mock"))]`.

pub mod config;
pub mod constants;
pub mod embedding;
pub mod engine;
pub mod job;
pub mod persistence;
pub mod rerank;

pub use config::{Config, ConfigError, DevicePreference, Precision};
pub use embedding::{
    Embedder, EmbedderConfig, Embeddings, EmbeddingError, Reranker, RerankerConfig, RerankerError,
    STUB_EMBEDDING_DIM,
};
pub use engine::{
    EmbeddingInput, EmbeddingResponse, EngineArray, EngineError, EngineKind, EngineOptions,
    EngineRerankResponse, EngineSpec, EngineState, ModelCard, ModelList, Usage,
};
pub use job::{
    EngineWorker, ErrorType, JobError, JobHandler, JobRequest, RerankerWorker, sample_rerank_job,
};
pub use persistence::{CopyOutcome, ModelVolume, PersistenceError};
#[cfg(any(test, feature = "mock"))]
pub use rerank::MockRelevanceModel;
pub use rerank::{
    RelevanceModel, RerankError, RerankRequest, RerankResponse, RerankService, ScoredResult,
};
