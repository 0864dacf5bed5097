//! Orchestrating gateway: forwards to the embedding and reranker servers
//! and reshapes their replies into OpenAI-style envelopes.

use axum::{Json, extract::State};
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use embrank::EmbeddingInput;
use embrank::constants::{DEFAULT_EMBEDDING_MODEL, DEFAULT_RERANKER_MODEL, DEFAULT_SERVER_TOP_K};

use super::error::GatewayError;
use super::state::ProxyState;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceUrls {
    pub embedding: String,
    pub reranker: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayHealth {
    pub status: String,
    pub services: ServiceUrls,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayModel {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayModels {
    pub data: Vec<GatewayModel>,
}

/// `/v1/embeddings` body. OpenAI clients send `input`; older callers send `texts`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GatewayEmbeddingRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub input: Option<EmbeddingInput>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub texts: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
}

impl GatewayEmbeddingRequest {
    fn into_parts(self) -> Result<(Vec<String>, String), GatewayError> {
        let model = self
            .model
            .unwrap_or_else(|| DEFAULT_EMBEDDING_MODEL.to_string());
        let texts = match (self.input, self.texts) {
            (Some(input), _) => input.into_vec(),
            (None, Some(texts)) => texts,
            (None, None) => {
                return Err(GatewayError::InvalidRequest(
                    "either `input` or `texts` is required".to_string(),
                ));
            }
        };
        Ok((texts, model))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayEmbedding {
    pub object: String,
    pub embedding: Vec<f32>,
    pub index: usize,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct EstimatedUsage {
    pub prompt_tokens: usize,
    pub total_tokens: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayEmbeddingResponse {
    pub object: String,
    pub data: Vec<GatewayEmbedding>,
    pub model: String,
    pub usage: EstimatedUsage,
}

fn default_top_k() -> usize {
    DEFAULT_SERVER_TOP_K
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayRerankRequest {
    pub query: String,
    pub documents: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(default = "default_top_k")]
    pub top_k: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayRerankResponse {
    pub results: Vec<(usize, f32)>,
    pub model: String,
}

/// Synthetic token estimate: whitespace words times two.
pub fn estimate_usage(texts: &[String]) -> EstimatedUsage {
    let words: usize = texts.iter().map(|t| t.split_whitespace().count()).sum();
    EstimatedUsage {
        prompt_tokens: words * 2,
        total_tokens: words * 2,
    }
}

#[instrument(skip(state))]
pub async fn health_handler(State(state): State<ProxyState>) -> Json<GatewayHealth> {
    Json(GatewayHealth {
        status: "healthy".to_string(),
        services: ServiceUrls {
            embedding: state.upstream.embedding_url().to_string(),
            reranker: state.upstream.reranker_url().to_string(),
        },
    })
}

#[instrument]
pub async fn models_handler() -> Json<GatewayModels> {
    Json(GatewayModels {
        data: vec![
            GatewayModel {
                id: DEFAULT_EMBEDDING_MODEL.to_string(),
                kind: "embedding".to_string(),
            },
            GatewayModel {
                id: DEFAULT_RERANKER_MODEL.to_string(),
                kind: "reranker".to_string(),
            },
        ],
    })
}

#[instrument(skip(state, request))]
pub async fn embeddings_handler(
    State(state): State<ProxyState>,
    Json(request): Json<GatewayEmbeddingRequest>,
) -> Result<Json<GatewayEmbeddingResponse>, GatewayError> {
    let (texts, model) = request.into_parts()?;
    let reply = state.upstream.embed(&texts).await?;

    debug!(
        texts = texts.len(),
        vectors = reply.embeddings.len(),
        "Forwarded embedding request"
    );

    let data = reply
        .embeddings
        .into_iter()
        .enumerate()
        .map(|(index, embedding)| GatewayEmbedding {
            object: "embedding".to_string(),
            embedding,
            index,
        })
        .collect();

    Ok(Json(GatewayEmbeddingResponse {
        object: "list".to_string(),
        data,
        model,
        usage: estimate_usage(&texts),
    }))
}

#[instrument(
    skip(state, request),
    fields(documents = request.documents.len(), top_k = request.top_k)
)]
pub async fn rerank_handler(
    State(state): State<ProxyState>,
    Json(request): Json<GatewayRerankRequest>,
) -> Result<Json<GatewayRerankResponse>, GatewayError> {
    let reply = state
        .upstream
        .rerank(&request.query, &request.documents, request.top_k)
        .await?;

    Ok(Json(GatewayRerankResponse {
        results: reply.results,
        model: request
            .model
            .unwrap_or_else(|| DEFAULT_RERANKER_MODEL.to_string()),
    }))
}
