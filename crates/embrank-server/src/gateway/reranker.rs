//! Reranker model server (`/health`, `/rerank`).

use axum::{
    Json,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};
use tracing::instrument;

use embrank::RerankRequest;
use embrank::constants::DEFAULT_SERVER_TOP_K;

use super::embedding::ModelHealth;
use super::error::GatewayError;
use super::state::RerankerState;

fn default_top_k() -> usize {
    DEFAULT_SERVER_TOP_K
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerRerankRequest {
    pub query: String,
    pub documents: Vec<String>,
    #[serde(default = "default_top_k")]
    pub top_k: usize,
}

/// `(index, score)` pairs, best first.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerRerankResponse {
    pub results: Vec<(usize, f32)>,
}

#[instrument(skip(state))]
pub async fn health_handler(State(state): State<RerankerState>) -> Response {
    match (state.service(), state.device.get()) {
        (Some(_), Some(device)) => (
            StatusCode::OK,
            Json(ModelHealth::healthy(&state.model_name, device)),
        )
            .into_response(),
        _ => (StatusCode::SERVICE_UNAVAILABLE, Json(ModelHealth::loading())).into_response(),
    }
}

#[instrument(
    skip(state, request),
    fields(documents = request.documents.len(), top_k = request.top_k)
)]
pub async fn rerank_handler(
    State(state): State<RerankerState>,
    Json(request): Json<ServerRerankRequest>,
) -> Result<Json<ServerRerankResponse>, GatewayError> {
    let service = state.service().ok_or(GatewayError::ModelNotLoaded)?;

    let request = RerankRequest::new(request.query, request.documents)
        .with_return_documents(false)
        .with_top_k(request.top_k);

    let response = tokio::task::spawn_blocking(move || service.rerank(&request))
        .await?
        .map_err(|e| GatewayError::RerankFailed(e.to_string()))?;

    Ok(Json(ServerRerankResponse {
        results: response
            .results
            .into_iter()
            .map(|r| (r.index, r.score))
            .collect(),
    }))
}
