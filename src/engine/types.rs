use serde::{Deserialize, Serialize};

use crate::config::{Config, ConfigError, DevicePreference, Precision};
use crate::embedding::utils::served_model_name;

use std::path::PathBuf;

/// What an engine serves.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EngineKind {
    Embedding,
    Rerank,
}

impl EngineKind {
    /// Rerank if the model identifier mentions "rerank" (case-insensitive).
    pub fn infer(model: &str) -> Self {
        if model.to_lowercase().contains("rerank") {
            EngineKind::Rerank
        } else {
            EngineKind::Embedding
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            EngineKind::Embedding => "embedding",
            EngineKind::Rerank => "rerank",
        }
    }
}

/// One engine in the array.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineSpec {
    /// Served name (last path component of `path`).
    pub name: String,
    pub kind: EngineKind,
    /// Hub id or local directory.
    pub path: String,
    pub batch_size: usize,
    /// Load a deterministic stub instead of weights.
    pub stub: bool,
}

impl EngineSpec {
    pub fn new<S: Into<String>>(path: S, batch_size: usize) -> Self {
        let path = path.into();
        Self {
            name: served_model_name(&path),
            kind: EngineKind::infer(&path),
            batch_size,
            path,
            stub: false,
        }
    }

    pub fn with_stub(mut self, stub: bool) -> Self {
        self.stub = stub;
        self
    }

    /// Specs for `MODEL_NAMES` paired with `BATCH_SIZES`.
    pub fn from_config(config: &Config) -> Result<Vec<Self>, ConfigError> {
        config.validate()?;
        Ok(config
            .model_names
            .iter()
            .zip(&config.batch_sizes)
            .map(|(path, &batch_size)| Self::new(path.as_str(), batch_size))
            .collect())
    }
}

/// Settings shared by every engine in an array.
#[derive(Debug, Clone)]
pub struct EngineOptions {
    pub device: DevicePreference,
    pub precision: Precision,
    pub max_length: usize,
    pub hf_home: Option<PathBuf>,
}

impl Default for EngineOptions {
    fn default() -> Self {
        let config = Config::default();
        Self::from_config(&config)
    }
}

impl EngineOptions {
    pub fn from_config(config: &Config) -> Self {
        Self {
            device: config.device,
            precision: config.precision,
            max_length: config.max_length,
            hf_home: config.hf_home.clone(),
        }
    }
}

/// Lifecycle of an [`EngineArray`](super::EngineArray).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineState {
    Stopped,
    Starting,
    Running,
    Stopping,
}

/// A single text or a batch, as accepted by OpenAI-style `input` fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum EmbeddingInput {
    Single(String),
    Batch(Vec<String>),
}

impl EmbeddingInput {
    pub fn into_vec(self) -> Vec<String> {
        match self {
            EmbeddingInput::Single(text) => vec![text],
            EmbeddingInput::Batch(texts) => texts,
        }
    }
}

impl From<Vec<String>> for EmbeddingInput {
    fn from(texts: Vec<String>) -> Self {
        EmbeddingInput::Batch(texts)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Usage {
    pub prompt_tokens: usize,
    pub total_tokens: usize,
}

impl Usage {
    pub fn new(prompt_tokens: usize) -> Self {
        Self {
            prompt_tokens,
            total_tokens: prompt_tokens,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmbeddingObject {
    pub object: String,
    pub embedding: Vec<f32>,
    pub index: usize,
}

/// OpenAI `/v1/embeddings` response body.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmbeddingResponse {
    pub object: String,
    pub data: Vec<EmbeddingObject>,
    pub model: String,
    pub usage: Usage,
    pub id: String,
    pub created: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RerankObject {
    pub relevance_score: f32,
    pub index: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub document: Option<String>,
}

/// Engine-array rerank response body.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineRerankResponse {
    pub object: String,
    pub results: Vec<RerankObject>,
    pub model: String,
    pub usage: Usage,
    pub id: String,
    pub created: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelCard {
    pub id: String,
    pub object: String,
    pub owned_by: String,
    pub created: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub backend: Option<String>,
}

/// OpenAI `/v1/models` response body.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelList {
    pub object: String,
    pub data: Vec<ModelCard>,
}

impl ModelList {
    pub fn new(data: Vec<ModelCard>) -> Self {
        Self {
            object: "list".to_string(),
            data,
        }
    }
}
