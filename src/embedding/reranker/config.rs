use std::path::PathBuf;

use crate::config::{Config, DevicePreference, Precision};
use crate::constants::{DEFAULT_MAX_LENGTH, DEFAULT_RERANKER_MODEL};

#[derive(Debug, Clone)]
pub struct RerankerConfig {
    /// Hub id or local directory of the reranker checkpoint.
    pub model: String,

    /// Token budget per scored sequence, prefix and suffix included.
    pub max_length: usize,

    pub device: DevicePreference,

    pub precision: Precision,

    pub hf_home: Option<PathBuf>,

    /// If true, score with a deterministic lexical heuristic (no model files required).
    pub testing_stub: bool,
}

impl Default for RerankerConfig {
    fn default() -> Self {
        Self {
            model: DEFAULT_RERANKER_MODEL.to_string(),
            max_length: DEFAULT_MAX_LENGTH,
            device: DevicePreference::Auto,
            precision: Precision::Float16,
            hf_home: None,
            testing_stub: false,
        }
    }
}

impl RerankerConfig {
    pub fn new<S: Into<String>>(model: S) -> Self {
        Self {
            model: model.into(),
            ..Default::default()
        }
    }

    pub fn stub() -> Self {
        Self {
            testing_stub: true,
            ..Default::default()
        }
    }

    /// Builds the reranker settings from process configuration (`MODEL_NAME`).
    pub fn from_config(config: &Config) -> Self {
        Self {
            model: config.model_name.clone(),
            max_length: config.max_length,
            device: config.device,
            precision: config.precision,
            hf_home: config.hf_home.clone(),
            testing_stub: false,
        }
    }

    pub fn with_max_length(mut self, max_length: usize) -> Self {
        self.max_length = max_length;
        self
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.model.trim().is_empty() {
            return Err("model cannot be empty".to_string());
        }

        if self.max_length == 0 {
            return Err("max_length must be greater than zero".to_string());
        }

        Ok(())
    }
}
