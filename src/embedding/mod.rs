//! Model adapters.
//!
//! - [`reranker`] scores formatted (instruction, query, document) prompts.
//! - [`embedder`] produces L2-normalised text embeddings.

/// Device selection (CPU / Metal / CUDA).
pub mod device;
/// Qwen3 embedder.
pub mod embedder;
mod error;
/// Qwen3 model wrappers shared by both adapters.
pub mod qwen3;
/// Yes/no reranker.
pub mod reranker;
/// Tokenizer/model loading helpers.
pub mod utils;

pub use embedder::{Embedder, EmbedderConfig, Embeddings, STUB_EMBEDDING_DIM};
pub use error::EmbeddingError;
pub use reranker::{Reranker, RerankerConfig, RerankerError};
