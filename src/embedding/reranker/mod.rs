pub mod config;
pub mod error;
pub mod prompt;


pub use config::RerankerConfig;
pub use error::RerankerError;
pub use prompt::{PromptTemplate, format_instruction, group_by_length};

use std::sync::Arc;

use candle_core::{DType, Device, Tensor};
use parking_lot::Mutex;
use tokenizers::Tokenizer;
use tracing::{debug, info, warn};

use crate::constants::{DEFAULT_BATCH_SIZE, RERANK_PREFIX, RERANK_SUFFIX, TOKEN_NO, TOKEN_YES};
use crate::embedding::device::{effective_dtype, select_device};
use crate::embedding::qwen3::Qwen3Scorer;
use crate::embedding::utils::{load_tokenizer, resolve_model_files};

enum RerankerBackend {
    Model {
        model: Arc<Mutex<Qwen3Scorer>>,
        tokenizer: Arc<Tokenizer>,
        template: PromptTemplate,
        yes_id: u32,
        no_id: u32,
    },
    Stub,
}

/// Yes/no relevance scorer over a Qwen3 causal LM (supports stub mode).
///
/// Loaded once at startup and shared read-only by every request.
pub struct Reranker {
    backend: RerankerBackend,
    config: RerankerConfig,
    device: Device,
}

impl std::fmt::Debug for Reranker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Reranker")
            .field("device", &format!("{:?}", self.device))
            .field("config", &self.config)
            .field("model_loaded", &self.is_model_loaded())
            .finish()
    }
}

impl Reranker {
    /// Loads the reranker. Any failure here is a startup error; callers should not retry.
    pub fn load(config: RerankerConfig) -> Result<Self, RerankerError> {
        if let Err(msg) = config.validate() {
            return Err(RerankerError::InvalidConfig { reason: msg });
        }

        let device = select_device(config.device)?;
        debug!(?device, "Selected compute device for reranker");

        if config.testing_stub {
            warn!("Reranker running in STUB mode (testing only)");
            return Ok(Self {
                backend: RerankerBackend::Stub,
                config,
                device,
            });
        }

        info!(
            model = %config.model,
            max_length = config.max_length,
            "Loading reranker model"
        );

        let files = resolve_model_files(&config.model, config.hf_home.as_deref())?;

        let tokenizer = load_tokenizer(&files.tokenizer).map_err(|e| {
            RerankerError::ModelLoadFailed {
                reason: format!("Failed to load tokenizer: {}", e),
            }
        })?;

        let yes_id = token_id(&tokenizer, TOKEN_YES)?;
        let no_id = token_id(&tokenizer, TOKEN_NO)?;
        let template = PromptTemplate::new(
            encode_plain(&tokenizer, RERANK_PREFIX)?,
            encode_plain(&tokenizer, RERANK_SUFFIX)?,
        );
        template.body_budget(config.max_length)?;

        let dtype = effective_dtype(config.precision, &device);
        let model = Qwen3Scorer::load(&files, dtype, &device).map_err(|e| {
            RerankerError::ModelLoadFailed {
                reason: format!("Failed to load Qwen3 model: {}", e),
            }
        })?;

        info!(
            hidden_size = model.config().hidden_size,
            num_layers = model.config().num_hidden_layers,
            ?dtype,
            yes_id,
            no_id,
            "Reranker model loaded successfully"
        );

        Ok(Self {
            backend: RerankerBackend::Model {
                model: Arc::new(Mutex::new(model)),
                tokenizer: Arc::new(tokenizer),
                template,
                yes_id,
                no_id,
            },
            config,
            device,
        })
    }

    pub fn stub() -> Result<Self, RerankerError> {
        Self::load(RerankerConfig::stub())
    }

    /// Scores formatted prompts; output order matches input order.
    pub fn score(&self, prompts: &[String]) -> Result<Vec<f32>, RerankerError> {
        if prompts.is_empty() {
            return Ok(vec![]);
        }

        debug!(
            batch = prompts.len(),
            model_loaded = self.is_model_loaded(),
            "Scoring prompt batch"
        );

        match &self.backend {
            RerankerBackend::Model {
                model,
                tokenizer,
                template,
                yes_id,
                no_id,
            } => self.score_with_model(prompts, model, tokenizer, template, *yes_id, *no_id),
            RerankerBackend::Stub => Ok(prompts.iter().map(|p| stub_score(p)).collect()),
        }
    }

    fn score_with_model(
        &self,
        prompts: &[String],
        model: &Arc<Mutex<Qwen3Scorer>>,
        tokenizer: &Tokenizer,
        template: &PromptTemplate,
        yes_id: u32,
        no_id: u32,
    ) -> Result<Vec<f32>, RerankerError> {
        let budget = template.body_budget(self.config.max_length)?;

        let sequences = prompts
            .iter()
            .map(|prompt| Ok(template.wrap(&encode_plain(tokenizer, prompt)?, budget)))
            .collect::<Result<Vec<_>, RerankerError>>()?;

        let mut scores = vec![0.0f32; sequences.len()];

        for (len, positions) in group_by_length(&sequences) {
            for chunk in positions.chunks(DEFAULT_BATCH_SIZE) {
                let flat: Vec<u32> = chunk
                    .iter()
                    .flat_map(|&i| sequences[i].iter().copied())
                    .collect();
                let input_ids = Tensor::new(flat.as_slice(), &self.device)?.reshape((chunk.len(), len))?;

                let logits = model.lock().last_logits(&input_ids)?;
                let chunk_scores = yes_probabilities(&logits, yes_id, no_id)?;

                for (&pos, score) in chunk.iter().zip(chunk_scores) {
                    scores[pos] = score;
                }
            }
        }

        Ok(scores)
    }

    /// Tokens the scored sequences consume (whitespace words in stub mode).
    pub fn count_tokens(&self, prompts: &[String]) -> usize {
        match &self.backend {
            RerankerBackend::Model {
                tokenizer,
                template,
                ..
            } => prompts
                .iter()
                .map(|prompt| {
                    let body = match tokenizer.encode(prompt.as_str(), false) {
                        Ok(enc) => enc.get_ids().len(),
                        Err(e) => {
                            warn!(
                                error = %e,
                                "Tokenizer failed while counting usage, using word count"
                            );
                            prompt.split_whitespace().count()
                        }
                    };
                    (body + template.reserved()).min(self.config.max_length)
                })
                .sum(),
            RerankerBackend::Stub => prompts.iter().map(|p| p.split_whitespace().count()).sum(),
        }
    }

    pub fn is_model_loaded(&self) -> bool {
        matches!(self.backend, RerankerBackend::Model { .. })
    }

    /// Model identifier this reranker was loaded from.
    pub fn model_id(&self) -> &str {
        &self.config.model
    }

    pub fn config(&self) -> &RerankerConfig {
        &self.config
    }

    pub fn device(&self) -> &Device {
        &self.device
    }
}

/// Per-row `P(yes)` from final-position logits `[batch, vocab]`.
pub fn yes_probabilities(
    logits: &Tensor,
    yes_id: u32,
    no_id: u32,
) -> candle_core::Result<Vec<f32>> {
    let logits = logits.to_dtype(DType::F32)?;
    let no = logits.narrow(1, no_id as usize, 1)?;
    let yes = logits.narrow(1, yes_id as usize, 1)?;
    let pair = Tensor::cat(&[&no, &yes], 1)?;
    let log_probs = candle_nn::ops::log_softmax(&pair, 1)?;
    log_probs.narrow(1, 1, 1)?.squeeze(1)?.exp()?.to_vec1::<f32>()
}

fn token_id(tokenizer: &Tokenizer, token: &str) -> Result<u32, RerankerError> {
    tokenizer
        .token_to_id(token)
        .ok_or_else(|| RerankerError::MissingToken {
            token: token.to_string(),
        })
}

fn encode_plain(tokenizer: &Tokenizer, text: &str) -> Result<Vec<u32>, RerankerError> {
    tokenizer
        .encode(text, false)
        .map(|enc| enc.get_ids().to_vec())
        .map_err(|e| RerankerError::TokenizationFailed {
            reason: e.to_string(),
        })
}

/// Splits a formatted prompt back into its query and document parts.
fn split_prompt(prompt: &str) -> (&str, &str) {
    let after_query = prompt
        .split_once("<Query>: ")
        .map(|(_, rest)| rest)
        .unwrap_or(prompt);
    match after_query.split_once("\n<Document>: ") {
        Some((query, document)) => (query, document),
        None => (after_query, ""),
    }
}

/// Deterministic lexical-overlap score in [0, 1] used in stub mode.
fn stub_score(prompt: &str) -> f32 {
    use std::collections::HashSet;

    const STOP_WORDS: &[&str] = &[
        "a", "an", "the", "is", "are", "was", "were", "be", "been", "have", "has", "had", "do",
        "does", "did", "will", "would", "could", "should", "can", "to", "of", "in", "for", "on",
        "with", "at", "by", "from", "as", "into", "and", "but", "if", "or", "what", "which",
        "who", "how", "this", "that", "these", "those", "it", "its",
    ];

    let (query, document) = split_prompt(prompt);

    let words = |text: &str| -> HashSet<String> {
        text.to_lowercase()
            .split(|c: char| !c.is_alphanumeric())
            .filter(|w| !w.is_empty() && !STOP_WORDS.contains(w))
            .map(str::to_string)
            .collect()
    };

    let query_words = words(query);
    let document_words = words(document);

    if query_words.is_empty() {
        let len_ratio = (query.len().min(document.len()) as f32)
            / (query.len().max(document.len()).max(1) as f32);
        return len_ratio * 0.3;
    }

    let matches = query_words.intersection(&document_words).count();
    let recall = matches as f32 / query_words.len() as f32;

    let union = query_words.union(&document_words).count();
    let jaccard = if union > 0 {
        matches as f32 / union as f32
    } else {
        0.0
    };

    let base_score = 0.6 * recall + 0.4 * jaccard;

    let normalized = 1.0 / (1.0 + (-8.0 * (base_score - 0.5)).exp());

    normalized.clamp(0.0, 1.0)
}
