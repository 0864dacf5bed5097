//! Embedding model server (`/health`, `/embed`).

use axum::{
    Json,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use embrank::embedding::device::device_label;

use super::error::GatewayError;
use super::state::EmbeddingState;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelHealth {
    pub status: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub device: Option<String>,
}

impl ModelHealth {
    pub fn loading() -> Self {
        Self {
            status: "loading".to_string(),
            model: None,
            device: None,
        }
    }

    pub fn healthy(model: &str, device: &str) -> Self {
        Self {
            status: "healthy".to_string(),
            model: Some(model.to_string()),
            device: Some(device.to_string()),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbedRequest {
    pub texts: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbedResponse {
    pub embeddings: Vec<Vec<f32>>,
}

#[instrument(skip(state))]
pub async fn health_handler(State(state): State<EmbeddingState>) -> Response {
    match state.embedder() {
        Some(embedder) => (
            StatusCode::OK,
            Json(ModelHealth::healthy(&state.model_name, device_label(embedder.device()))),
        )
            .into_response(),
        None => (StatusCode::SERVICE_UNAVAILABLE, Json(ModelHealth::loading())).into_response(),
    }
}

#[instrument(skip(state, request), fields(texts = request.texts.len()))]
pub async fn embed_handler(
    State(state): State<EmbeddingState>,
    Json(request): Json<EmbedRequest>,
) -> Result<Json<EmbedResponse>, GatewayError> {
    let embedder = state.embedder().ok_or(GatewayError::ModelNotLoaded)?;

    let embeddings = tokio::task::spawn_blocking(move || embedder.embed(&request.texts))
        .await?
        .map_err(|e| GatewayError::EmbeddingFailed(e.to_string()))?;

    debug!(vectors = embeddings.vectors.len(), "Embedded batch");

    Ok(Json(EmbedResponse {
        embeddings: embeddings.vectors,
    }))
}
