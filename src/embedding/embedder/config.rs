use std::path::PathBuf;

use crate::config::{Config, DevicePreference, Precision};
use crate::constants::{DEFAULT_BATCH_SIZE, DEFAULT_EMBEDDING_MODEL, DEFAULT_MAX_LENGTH};

/// Output dimension of stub embeddings (matches Qwen3-Embedding-0.6B).
pub const STUB_EMBEDDING_DIM: usize = 1024;

#[derive(Debug, Clone)]
/// Configuration for [`Embedder`](super::Embedder).
pub struct EmbedderConfig {
    /// Hub id or local directory of the embedding checkpoint.
    pub model: String,
    /// Max tokens per input; longer inputs are truncated.
    pub max_length: usize,
    /// Inputs per forward pass.
    pub batch_size: usize,
    pub device: DevicePreference,
    pub precision: Precision,
    pub hf_home: Option<PathBuf>,
    /// If true, run in deterministic stub mode (no model files required).
    pub testing_stub: bool,
}

impl Default for EmbedderConfig {
    fn default() -> Self {
        Self {
            model: DEFAULT_EMBEDDING_MODEL.to_string(),
            max_length: DEFAULT_MAX_LENGTH,
            batch_size: DEFAULT_BATCH_SIZE,
            device: DevicePreference::Auto,
            precision: Precision::Float16,
            hf_home: None,
            testing_stub: false,
        }
    }
}

impl EmbedderConfig {
    /// Creates a config for a hub id or model directory.
    pub fn new<S: Into<String>>(model: S) -> Self {
        Self {
            model: model.into(),
            ..Default::default()
        }
    }

    /// Creates a stub config (no model files; produces deterministic embeddings).
    pub fn stub() -> Self {
        Self {
            testing_stub: true,
            ..Default::default()
        }
    }

    /// Embedding server settings from process configuration (`MODEL_NAME`).
    pub fn from_config(config: &Config) -> Self {
        Self {
            model: config.model_name.clone(),
            max_length: config.max_length,
            batch_size: config.batch_sizes.first().copied().unwrap_or(DEFAULT_BATCH_SIZE),
            device: config.device,
            precision: config.precision,
            hf_home: config.hf_home.clone(),
            testing_stub: false,
        }
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size;
        self
    }

    /// Validates required fields.
    pub fn validate(&self) -> Result<(), crate::embedding::EmbeddingError> {
        use crate::embedding::EmbeddingError;

        if !self.testing_stub && self.model.trim().is_empty() {
            return Err(EmbeddingError::InvalidConfig {
                reason: "model is required (stubbing is disabled)".to_string(),
            });
        }

        if self.max_length == 0 || self.batch_size == 0 {
            return Err(EmbeddingError::InvalidConfig {
                reason: "max_length and batch_size must be greater than zero".to_string(),
            });
        }

        Ok(())
    }
}
