//! Thin wrappers over the candle Qwen3 implementations.
//!
//! Requests are independent full-sequence passes, never incremental decoding,
//! so neither wrapper may carry KV state from one pass into the next.

use candle::{DType, Device, Result, Tensor};
use candle_core as candle;
use candle_nn::VarBuilder;
use candle_transformers::models::qwen3::{Config, Model, ModelForCausalLM};

use super::utils::ModelFiles;


fn read_config(files: &ModelFiles) -> Result<Config> {
    let raw = std::fs::read_to_string(&files.config)?;
    serde_json::from_str(&raw)
        .map_err(|e| candle::Error::Msg(format!("Failed to parse config: {}", e)))
}

fn var_builder(files: &ModelFiles, dtype: DType, device: &Device) -> Result<VarBuilder<'static>> {
    // SAFETY: the weight files are treated as read-only for the process lifetime.
    unsafe { VarBuilder::from_mmaped_safetensors(&files.weights, dtype, device) }
}

/// Causal LM head used by the reranker (last-position logits only).
pub struct Qwen3Scorer {
    model: ModelForCausalLM,
    config: Config,
}

impl Qwen3Scorer {
    pub fn load(files: &ModelFiles, dtype: DType, device: &Device) -> Result<Self> {
        let config = read_config(files)?;
        let vb = var_builder(files, dtype, device)?;
        Self::new(config, vb)
    }

    pub fn new(config: Config, vb: VarBuilder) -> Result<Self> {
        let model = ModelForCausalLM::new(&config, vb)?;
        Ok(Self { model, config })
    }

    /// `input_ids: [batch, seq]` → logits `[batch, vocab]` at the final position.
    pub fn last_logits(&mut self, input_ids: &Tensor) -> Result<Tensor> {
        self.model.clear_kv_cache();
        let logits = self.model.forward(input_ids, 0)?;
        self.model.clear_kv_cache();
        logits.squeeze(1)
    }

    pub fn config(&self) -> &Config {
        &self.config
    }
}

/// Base transformer used by the embedder (final hidden states).
///
/// `Model` exposes no way to reset its KV cache, so the loaded model is kept
/// pristine and every pass runs on a clone. Weights are shared between clones.
pub struct Qwen3Encoder {
    model: Model,
    config: Config,
}

impl Qwen3Encoder {
    pub fn load(files: &ModelFiles, dtype: DType, device: &Device) -> Result<Self> {
        let config = read_config(files)?;
        let vb = var_builder(files, dtype, device)?;

        // Embedding checkpoints are exported without the `model.` prefix the
        // candle implementation expects.
        let vb = if vb.contains_tensor("model.embed_tokens.weight") {
            vb
        } else {
            vb.rename_f(|name: &str| name.strip_prefix("model.").unwrap_or(name).to_string())
        };

        Self::new(config, vb)
    }

    pub fn new(config: Config, vb: VarBuilder) -> Result<Self> {
        let model = Model::new(&config, vb)?;
        Ok(Self { model, config })
    }

    /// `input_ids: [batch, seq]` → hidden states `[batch, seq, hidden]`.
    pub fn hidden_states(&self, input_ids: &Tensor) -> Result<Tensor> {
        self.model.clone().forward(input_ids, 0)
    }

    pub fn config(&self) -> &Config {
        &self.config
    }
}
