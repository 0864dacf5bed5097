//! Prompt scaffolding for the yes/no relevance judgement.

use std::collections::BTreeMap;

use crate::constants::DEFAULT_INSTRUCTION;

use super::error::RerankerError;

/// Formats one instruction/query/document triple into the judged text.
pub fn format_instruction(instruction: Option<&str>, query: &str, document: &str) -> String {
    let instruction = instruction.unwrap_or(DEFAULT_INSTRUCTION);
    format!("<Instruct>: {instruction}\n<Query>: {query}\n<Document>: {document}")
}

/// Token-level chat framing wrapped around every judged text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromptTemplate {
    prefix: Vec<u32>,
    suffix: Vec<u32>,
}

impl PromptTemplate {
    pub fn new(prefix: Vec<u32>, suffix: Vec<u32>) -> Self {
        Self { prefix, suffix }
    }

    /// Tokens reserved for the fixed prefix and suffix.
    pub fn reserved(&self) -> usize {
        self.prefix.len() + self.suffix.len()
    }

    /// Tokens left for the judged text under `max_length`.
    pub fn body_budget(&self, max_length: usize) -> Result<usize, RerankerError> {
        match max_length.checked_sub(self.reserved()) {
            Some(budget) if budget > 0 => Ok(budget),
            _ => Err(RerankerError::NoTokenBudget {
                max_length,
                reserved: self.reserved(),
            }),
        }
    }

    /// Truncates `body` to `budget` tokens and wraps it in prefix/suffix.
    pub fn wrap(&self, body: &[u32], budget: usize) -> Vec<u32> {
        let body = &body[..body.len().min(budget)];
        let mut ids = Vec::with_capacity(self.prefix.len() + body.len() + self.suffix.len());
        ids.extend_from_slice(&self.prefix);
        ids.extend_from_slice(body);
        ids.extend_from_slice(&self.suffix);
        ids
    }
}

/// Groups sequence positions by token length, preserving input order within each group.
///
/// The candle Qwen3 forward has no padding mask, so sequences are only ever
/// batched with others of identical length; scores stay exact.
pub fn group_by_length(sequences: &[Vec<u32>]) -> BTreeMap<usize, Vec<usize>> {
    let mut groups: BTreeMap<usize, Vec<usize>> = BTreeMap::new();
    for (idx, seq) in sequences.iter().enumerate() {
        groups.entry(seq.len()).or_default().push(idx);
    }
    groups
}
