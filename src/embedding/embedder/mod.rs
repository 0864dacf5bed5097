//! Qwen3 text embedder (last-token pooling, L2-normalised).
//!
//! Use [`EmbedderConfig::stub`] for tests/examples without model files.

/// Embedder configuration.
pub mod config;


pub use config::{EmbedderConfig, STUB_EMBEDDING_DIM};

use std::sync::Arc;

use candle_core::{DType, Device, IndexOp, Tensor};
use tokenizers::Tokenizer;
use tracing::{debug, info, warn};

use crate::embedding::device::{effective_dtype, select_device};
use crate::embedding::error::EmbeddingError;
use crate::embedding::qwen3::Qwen3Encoder;
use crate::embedding::reranker::group_by_length;
use crate::embedding::utils::{load_tokenizer, resolve_model_files};

enum EmbedderBackend {
    Model {
        model: Arc<Qwen3Encoder>,
        tokenizer: Arc<Tokenizer>,
        hidden_size: usize,
    },
    Stub,
}

/// Result of one embedding call.
#[derive(Debug, Clone, PartialEq)]
pub struct Embeddings {
    /// One vector per input, in input order.
    pub vectors: Vec<Vec<f32>>,
    /// Tokens consumed across all inputs.
    pub prompt_tokens: usize,
}

/// Embedding generator (supports stub mode).
pub struct Embedder {
    backend: EmbedderBackend,
    config: EmbedderConfig,
    device: Device,
}

impl std::fmt::Debug for Embedder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Embedder")
            .field(
                "backend",
                &match &self.backend {
                    EmbedderBackend::Model { .. } => format!("Model({:?})", self.device),
                    EmbedderBackend::Stub => format!("Stub({:?})", self.device),
                },
            )
            .field("model", &self.config.model)
            .field("max_length", &self.config.max_length)
            .finish()
    }
}

impl Embedder {
    /// Loads the embedder from a config (stub mode is supported).
    pub fn load(config: EmbedderConfig) -> Result<Self, EmbeddingError> {
        config.validate()?;

        let device = select_device(config.device)?;
        debug!(?device, "Selected compute device for embedder");

        if config.testing_stub {
            warn!("Embedder running in STUB mode (testing only)");
            return Ok(Self {
                backend: EmbedderBackend::Stub,
                config,
                device,
            });
        }

        let files = resolve_model_files(&config.model, config.hf_home.as_deref())?;

        let tokenizer = load_tokenizer(&files.tokenizer).map_err(|e| {
            EmbeddingError::TokenizationFailed {
                reason: format!("Failed to load tokenizer: {}", e),
            }
        })?;

        let dtype = effective_dtype(config.precision, &device);
        let model = Qwen3Encoder::load(&files, dtype, &device).map_err(|e| {
            EmbeddingError::ModelLoadFailed {
                reason: format!("Failed to load Qwen3 model: {}", e),
            }
        })?;
        let hidden_size = model.config().hidden_size;

        info!(
            model = %config.model,
            hidden_size,
            num_layers = model.config().num_hidden_layers,
            max_length = config.max_length,
            ?dtype,
            "Embedding model loaded successfully"
        );

        Ok(Self {
            backend: EmbedderBackend::Model {
                model: Arc::new(model),
                tokenizer: Arc::new(tokenizer),
                hidden_size,
            },
            config,
            device,
        })
    }

    /// Embeds a batch of texts; output order matches input order.
    pub fn embed(&self, texts: &[String]) -> Result<Embeddings, EmbeddingError> {
        if texts.is_empty() {
            return Ok(Embeddings {
                vectors: vec![],
                prompt_tokens: 0,
            });
        }

        match &self.backend {
            EmbedderBackend::Model {
                model,
                tokenizer,
                hidden_size,
            } => self.embed_with_model(texts, model, tokenizer, *hidden_size),
            EmbedderBackend::Stub => Ok(self.embed_stub(texts)),
        }
    }

    fn embed_with_model(
        &self,
        texts: &[String],
        model: &Qwen3Encoder,
        tokenizer: &Tokenizer,
        hidden_size: usize,
    ) -> Result<Embeddings, EmbeddingError> {
        let sequences = texts
            .iter()
            .map(|text| {
                let encoding = tokenizer.encode(text.as_str(), true).map_err(|e| {
                    EmbeddingError::TokenizationFailed {
                        reason: e.to_string(),
                    }
                })?;
                Ok(truncate_keeping_tail(
                    encoding.get_ids(),
                    encoding.get_special_tokens_mask(),
                    self.config.max_length,
                ))
            })
            .collect::<Result<Vec<_>, EmbeddingError>>()?;

        let prompt_tokens = sequences.iter().map(Vec::len).sum();
        let mut vectors = vec![vec![0.0f32; hidden_size]; sequences.len()];

        for (len, positions) in group_by_length(&sequences) {
            // Empty encodings keep the zero vector.
            if len == 0 {
                continue;
            }

            for chunk in positions.chunks(self.config.batch_size) {
                let flat: Vec<u32> = chunk
                    .iter()
                    .flat_map(|&i| sequences[i].iter().copied())
                    .collect();
                let input_ids =
                    Tensor::new(flat.as_slice(), &self.device)?.reshape((chunk.len(), len))?;

                debug!(batch = chunk.len(), seq_len = len, "Embedding forward pass");

                let hidden = model.hidden_states(&input_ids)?;
                let pooled = hidden.i((.., len - 1, ..))?.to_dtype(DType::F32)?;
                let rows = pooled.to_vec2::<f32>()?;

                for (&pos, row) in chunk.iter().zip(rows) {
                    vectors[pos] = l2_normalize(row);
                }
            }
        }

        Ok(Embeddings {
            vectors,
            prompt_tokens,
        })
    }

    fn embed_stub(&self, texts: &[String]) -> Embeddings {
        use std::hash::{DefaultHasher, Hash, Hasher};

        let vectors = texts
            .iter()
            .map(|text| {
                let mut hasher = DefaultHasher::new();
                text.hash(&mut hasher);
                let mut state = hasher.finish();

                let mut embedding = Vec::with_capacity(STUB_EMBEDDING_DIM);
                for _ in 0..STUB_EMBEDDING_DIM {
                    state = state.wrapping_mul(6364136223846793005).wrapping_add(1);
                    let value = ((state >> 32) as f32 / u32::MAX as f32) * 2.0 - 1.0;
                    embedding.push(value);
                }
                l2_normalize(embedding)
            })
            .collect();

        let prompt_tokens = texts.iter().map(|t| t.split_whitespace().count()).sum();

        Embeddings {
            vectors,
            prompt_tokens,
        }
    }

    /// Returns the output embedding dimension.
    pub fn embedding_dim(&self) -> usize {
        match &self.backend {
            EmbedderBackend::Model { hidden_size, .. } => *hidden_size,
            EmbedderBackend::Stub => STUB_EMBEDDING_DIM,
        }
    }

    /// Returns `true` if running in stub mode.
    pub fn is_stub(&self) -> bool {
        matches!(self.backend, EmbedderBackend::Stub)
    }

    /// Model identifier this embedder was loaded from.
    pub fn model_id(&self) -> &str {
        &self.config.model
    }

    pub fn device(&self) -> &Device {
        &self.device
    }

    /// Returns the embedder configuration.
    pub fn config(&self) -> &EmbedderConfig {
        &self.config
    }
}

/// Truncates to `max_length` tokens, keeping the trailing special tokens the
/// pooled position reads from.
fn truncate_keeping_tail(ids: &[u32], special_mask: &[u32], max_length: usize) -> Vec<u32> {
    if ids.len() <= max_length {
        return ids.to_vec();
    }

    let tail = special_mask
        .iter()
        .rev()
        .take_while(|&&special| special == 1)
        .count()
        .min(max_length);
    let body = max_length - tail;

    let mut truncated = Vec::with_capacity(max_length);
    truncated.extend_from_slice(&ids[..body]);
    truncated.extend_from_slice(&ids[ids.len() - tail..]);
    truncated
}

fn l2_normalize(mut embedding: Vec<f32>) -> Vec<f32> {
    let norm: f32 = embedding.iter().map(|x| x * x).sum::<f32>().sqrt();

    if norm > 0.0 {
        for x in &mut embedding {
            *x /= norm;
        }
    }

    embedding
}
