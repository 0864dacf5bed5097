use serde::{Deserialize, Serialize};

fn default_true() -> bool {
    true
}

/// A query and the candidate documents to order by relevance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RerankRequest {
    pub query: String,
    pub documents: Vec<String>,
    /// Task instruction; the web-search default is used when absent.
    #[serde(default)]
    pub instruction: Option<String>,
    /// Echo each document's text in its result.
    #[serde(default = "default_true")]
    pub return_documents: bool,
    /// Keep only the best `top_k` results (clamped to the document count).
    #[serde(default)]
    pub top_k: Option<usize>,
}

impl RerankRequest {
    pub fn new<Q: Into<String>>(query: Q, documents: Vec<String>) -> Self {
        Self {
            query: query.into(),
            documents,
            instruction: None,
            return_documents: true,
            top_k: None,
        }
    }

    pub fn with_instruction<S: Into<String>>(mut self, instruction: S) -> Self {
        self.instruction = Some(instruction.into());
        self
    }

    pub fn with_top_k(mut self, top_k: usize) -> Self {
        self.top_k = Some(top_k);
        self
    }

    pub fn with_return_documents(mut self, return_documents: bool) -> Self {
        self.return_documents = return_documents;
        self
    }
}

/// One scored document. `index` is its position in the request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoredResult {
    pub index: usize,
    pub score: f32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub document: Option<String>,
}

/// Results sorted by score descending (ties by ascending index).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RerankResponse {
    pub results: Vec<ScoredResult>,
    pub model: String,
    pub query: String,
}
