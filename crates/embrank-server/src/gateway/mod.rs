//! HTTP surfaces (Axum) for the model servers, the orchestrating gateway
//! and the job worker.
//!
//! Each surface has its own state type and router constructor; the binary
//! picks one per process.

#![allow(missing_docs)]

pub mod embedding;
pub mod error;
pub mod proxy;
pub mod reranker;
pub mod state;
pub mod upstream;
pub mod worker;


use axum::{
    Router,
    routing::{get, post},
};
use tower::limit::ConcurrencyLimitLayer;
use tower_http::trace::TraceLayer;

pub use error::GatewayError;
pub use state::{EmbeddingState, ProxyState, RerankerState, WorkerState};
pub use upstream::{UpstreamClient, UpstreamError};

/// `GET /health`, `POST /embed`.
pub fn create_embedding_router(state: EmbeddingState) -> Router {
    Router::new()
        .route("/health", get(embedding::health_handler))
        .route("/embed", post(embedding::embed_handler))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// `GET /health`, `POST /rerank`.
pub fn create_reranker_router(state: RerankerState) -> Router {
    Router::new()
        .route("/health", get(reranker::health_handler))
        .route("/rerank", post(reranker::rerank_handler))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

pub fn create_gateway_router(state: ProxyState) -> Router {
    Router::new()
        .route("/health", get(proxy::health_handler))
        .route("/v1/models", get(proxy::models_handler))
        .route("/v1/embeddings", post(proxy::embeddings_handler))
        .route("/v1/rerank", post(proxy::rerank_handler))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// `POST /runsync`, `GET /health`. In-flight jobs are capped at the handler's
/// concurrency hint.
pub fn create_worker_router(state: WorkerState) -> Router {
    let limit = state.handler.max_concurrency().max(1);

    Router::new()
        .route("/health", get(worker::health_handler))
        .route("/runsync", post(worker::runsync_handler))
        .layer(ConcurrencyLimitLayer::new(limit))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
