//! Cross-cutting, shared constants.
//!
//! Prompt scaffolding strings must match the reranker's chat template byte for byte.

/// Default reranker model identifier (Hugging Face Hub id).
pub const DEFAULT_RERANKER_MODEL: &str = "Qwen/Qwen3-Reranker-0.6B";

/// Default embedding model identifier (Hugging Face Hub id).
pub const DEFAULT_EMBEDDING_MODEL: &str = "Qwen/Qwen3-Embedding-0.6B";

/// Default maximum token length per scored sequence (prefix and suffix included).
pub const DEFAULT_MAX_LENGTH: usize = 8192;

/// Default concurrency hint reported to the job runtime.
pub const DEFAULT_MAX_CONCURRENCY: usize = 10;

/// Default per-engine batch size.
pub const DEFAULT_BATCH_SIZE: usize = 32;

/// Default `top_k` of the standalone reranker HTTP server.
pub const DEFAULT_SERVER_TOP_K: usize = 10;

/// Instruction used when a rerank or query-embedding request does not carry one.
pub const DEFAULT_INSTRUCTION: &str =
    "Given a web search query, retrieve relevant passages that answer the query";

/// Chat prefix prepended to every reranker prompt.
pub const RERANK_PREFIX: &str = "<|im_start|>system\nJudge whether the Document meets the requirements based on the Query and the Instruct provided. Note that the answer can only be \"yes\" or \"no\".<|im_end|>\n<|im_start|>user\n";

/// Chat suffix appended to every reranker prompt.
pub const RERANK_SUFFIX: &str = "<|im_end|>\n<|im_start|>assistant\n<think>\n\n</think>\n\n";

/// Vocabulary token for a positive relevance judgement.
pub const TOKEN_YES: &str = "yes";

/// Vocabulary token for a negative relevance judgement.
pub const TOKEN_NO: &str = "no";

/// `created` timestamp advertised for the reranker in `/v1/models`.
pub const RERANKER_MODEL_CREATED: i64 = 1_754_341_335;

/// Owner advertised for the reranker in `/v1/models`.
pub const RERANKER_MODEL_OWNER: &str = "qwen";

/// Mount point of the persistent network volume.
pub const VOLUME_PATH: &str = "/runpod-volume";

/// Directory baked into the container image holding model weights.
pub const CONTAINER_MODELS_PATH: &str = "/models";

/// Model directories kept in sync between the container and the volume.
pub const PERSISTED_MODEL_DIRS: [&str; 2] = ["Qwen3-Embedding-0.6B", "Qwen3-Reranker-0.6B"];

/// Default embedding backend URL used by the gateway.
pub const DEFAULT_EMBEDDING_SERVICE_URL: &str = "http://embedding:8001";

/// Default reranker backend URL used by the gateway.
pub const DEFAULT_RERANKER_SERVICE_URL: &str = "http://reranker:8002";

/// Timeout applied to every outbound gateway request.
pub const UPSTREAM_TIMEOUT_SECS: u64 = 30;

/// Health polls attempted per backend before gateway startup fails.
pub const UPSTREAM_HEALTH_RETRIES: u32 = 30;

/// Delay between backend health polls.
pub const UPSTREAM_HEALTH_INTERVAL_SECS: u64 = 2;
