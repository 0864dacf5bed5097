//! Job input decoding.
//!
//! A job input is either an OpenAI-proxied call (`openai_route` +
//! `openai_input`) or a native mapping whose fields pick the operation.

use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::Value;

use super::error::{JobError, JobResult};
use crate::engine::EmbeddingInput;

const ROUTE_MODELS: &str = "/v1/models";
const ROUTE_EMBEDDINGS: &str = "/v1/embeddings";
const ROUTE_RERANK: &str = "/v1/rerank";

/// A decoded, validated job.
#[derive(Debug, Clone, PartialEq)]
pub enum JobRequest {
    ListModels,
    Embed(EmbedJob),
    Rerank(RerankJob),
}

#[derive(Debug, Clone, PartialEq)]
pub struct EmbedJob {
    pub model: Option<String>,
    pub input: Vec<String>,
    pub instruction: Option<String>,
    pub prompt_type: Option<String>,
    /// Route the job arrived on, for OpenAI-proxied calls.
    pub openai_route: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RerankJob {
    pub model: Option<String>,
    pub query: String,
    pub documents: Vec<String>,
    pub instruction: Option<String>,
    pub return_documents: bool,
    pub top_k: Option<usize>,
}

#[derive(Debug, Default, Deserialize)]
struct ExtraBody {
    instruction: Option<String>,
    prompt_type: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct OpenAiInput {
    model: Option<String>,
    input: Option<EmbeddingInput>,
    query: Option<String>,
    documents: Option<Vec<String>>,
    return_documents: Option<bool>,
    top_k: Option<usize>,
    #[serde(default)]
    extra_body: ExtraBody,
}

#[derive(Debug, Default, Deserialize)]
struct NativeInput {
    model: Option<String>,
    input: Option<EmbeddingInput>,
    query: Option<String>,
    documents: Option<Vec<String>>,
    docs: Option<Vec<String>>,
    return_documents: Option<bool>,
    return_docs: Option<bool>,
    instruction: Option<String>,
    prompt_type: Option<String>,
    top_k: Option<usize>,
}

impl JobRequest {
    /// Decodes a job `input` mapping.
    pub fn parse(input: &Value) -> JobResult<Self> {
        let Some(fields) = input.as_object() else {
            return Err(JobError::InvalidInput {
                reason: format!("expected an object, got {input}"),
            });
        };

        match fields.get("openai_route") {
            Some(Value::Null) | None => Self::parse_native(input),
            Some(Value::String(route)) => {
                let body = fields.get("openai_input").cloned().unwrap_or(Value::Null);
                Self::parse_openai(route, body)
            }
            Some(other) => Err(JobError::UnknownRoute {
                route: other.to_string(),
            }),
        }
    }

    /// The `openai_route` of a proxied job, before any body validation.
    pub fn openai_route(input: &Value) -> Option<&str> {
        input.get("openai_route").and_then(Value::as_str)
    }

    /// Short operation name for logging.
    pub fn operation(&self) -> &'static str {
        match self {
            JobRequest::ListModels => "list_models",
            JobRequest::Embed(_) => "embed",
            JobRequest::Rerank(_) => "rerank",
        }
    }

    fn parse_openai(route: &str, body: Value) -> JobResult<Self> {
        let normalized = normalize_route(route);

        if normalized == ROUTE_MODELS {
            return Ok(JobRequest::ListModels);
        }
        if normalized != ROUTE_EMBEDDINGS && normalized != ROUTE_RERANK {
            return Err(JobError::UnknownRoute {
                route: route.to_string(),
            });
        }

        if body.is_null() {
            return Err(JobError::MissingField {
                field: "openai_input",
            });
        }
        let body: OpenAiInput = decode(body)?;

        if normalized == ROUTE_EMBEDDINGS {
            let input = non_empty_input(body.input)?;
            let model = body.model.filter(|m| !m.is_empty()).ok_or(JobError::MissingField {
                field: "model",
            })?;
            return Ok(JobRequest::Embed(EmbedJob {
                model: Some(model),
                input,
                instruction: body.extra_body.instruction,
                prompt_type: body.extra_body.prompt_type,
                openai_route: Some(route.to_string()),
            }));
        }

        Ok(JobRequest::Rerank(RerankJob {
            model: body.model,
            query: required_query(body.query)?,
            documents: required_documents(body.documents)?,
            instruction: body.extra_body.instruction,
            return_documents: body.return_documents.unwrap_or(true),
            top_k: body.top_k,
        }))
    }

    fn parse_native(input: &Value) -> JobResult<Self> {
        let native: NativeInput = decode(input.clone())?;

        let has_query = native.query.as_deref().is_some_and(|q| !q.is_empty());
        let documents = native.documents.or(native.docs);

        if has_query {
            return Ok(JobRequest::Rerank(RerankJob {
                model: native.model,
                query: required_query(native.query)?,
                documents: required_documents(documents)?,
                instruction: native.instruction,
                return_documents: native.return_documents.or(native.return_docs).unwrap_or(true),
                top_k: native.top_k,
            }));
        }

        if native.input.is_some() {
            return Ok(JobRequest::Embed(EmbedJob {
                model: native.model,
                input: non_empty_input(native.input)?,
                instruction: native.instruction,
                prompt_type: native.prompt_type,
                openai_route: None,
            }));
        }

        if documents.is_some() {
            return Err(JobError::MissingField { field: "query" });
        }

        Err(JobError::InvalidInput {
            reason: "expected `query` (rerank), `input` (embeddings) or `openai_route`"
                .to_string(),
        })
    }
}

pub fn is_embeddings_route(route: &str) -> bool {
    normalize_route(route) == ROUTE_EMBEDDINGS
}

/// Maps `/openai/v1/...` onto `/v1/...`.
pub fn normalize_route(route: &str) -> &str {
    route.strip_prefix("/openai").unwrap_or(route)
}

fn decode<T: DeserializeOwned>(value: Value) -> JobResult<T> {
    serde_json::from_value(value).map_err(|e| JobError::InvalidInput {
        reason: e.to_string(),
    })
}

fn required_query(query: Option<String>) -> JobResult<String> {
    query
        .filter(|q| !q.is_empty())
        .ok_or(JobError::MissingField { field: "query" })
}

fn required_documents(documents: Option<Vec<String>>) -> JobResult<Vec<String>> {
    documents
        .filter(|d| !d.is_empty())
        .ok_or(JobError::MissingField { field: "documents" })
}

fn non_empty_input(input: Option<EmbeddingInput>) -> JobResult<Vec<String>> {
    input
        .map(EmbeddingInput::into_vec)
        .filter(|texts| !texts.is_empty())
        .ok_or(JobError::MissingField { field: "input" })
}
