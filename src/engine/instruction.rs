//! Query instruction prefixes for embedding inputs.

use crate::constants::DEFAULT_INSTRUCTION;

/// Prefix for an embedding input, if any.
///
/// An explicit instruction wins; `prompt_type = "query"` uses the default
/// web-search instruction; documents and unknown types are embedded as-is.
pub fn embedding_prefix(instruction: Option<&str>, prompt_type: Option<&str>) -> Option<String> {
    match (instruction.filter(|i| !i.is_empty()), prompt_type) {
        (Some(instruction), _) => Some(format!("Instruct: {instruction}\nQuery: ")),
        (None, Some("query")) => Some(format!("Instruct: {DEFAULT_INSTRUCTION}\nQuery: ")),
        _ => None,
    }
}

/// Applies [`embedding_prefix`] to every input.
pub fn apply_instruction(
    inputs: Vec<String>,
    instruction: Option<&str>,
    prompt_type: Option<&str>,
) -> Vec<String> {
    match embedding_prefix(instruction, prompt_type) {
        Some(prefix) => inputs
            .into_iter()
            .map(|text| format!("{prefix}{text}"))
            .collect(),
        None => inputs,
    }
}
