use std::sync::Arc;

use serde_json::{Value, json};

use super::*;
use crate::embedding::Reranker;
use crate::engine::{EngineArray, EngineOptions, EngineSpec};
use crate::rerank::{MockRelevanceModel, RerankService};

fn stub_reranker_worker() -> RerankerWorker {
    let service = RerankService::new(Arc::new(Reranker::stub().unwrap()));
    RerankerWorker::new(service, 4)
}

fn mock_reranker_worker(model: MockRelevanceModel) -> RerankerWorker {
    RerankerWorker::new(RerankService::new(Arc::new(model)), 4)
}

fn stub_engine_worker() -> EngineWorker {
    let engines = EngineArray::new(
        vec![
            EngineSpec::new("/models/Qwen3-Embedding-0.6B", 8).with_stub(true),
            EngineSpec::new("/models/Qwen3-Reranker-0.6B", 8).with_stub(true),
        ],
        EngineOptions::default(),
    );
    EngineWorker::new(Arc::new(engines), 6)
}

fn error_type(output: &Value) -> &str {
    output["error"]["type"].as_str().unwrap_or_default()
}

fn error_message(output: &Value) -> &str {
    output["error"]["message"].as_str().unwrap_or_default()
}

#[test]
fn test_parse_native_rerank_aliases() {
    let request = JobRequest::parse(&json!({
        "query": "q",
        "docs": ["a", "b"],
        "return_docs": false,
        "top_k": 1,
        "model": "m"
    }))
    .unwrap();

    assert_eq!(
        request,
        JobRequest::Rerank(RerankJob {
            model: Some("m".to_string()),
            query: "q".to_string(),
            documents: vec!["a".to_string(), "b".to_string()],
            instruction: None,
            return_documents: false,
            top_k: Some(1),
        })
    );
}

#[test]
fn test_parse_native_prefers_documents_over_docs() {
    let request = JobRequest::parse(&json!({
        "query": "q",
        "documents": ["primary"],
        "docs": ["alias"]
    }))
    .unwrap();

    let JobRequest::Rerank(job) = request else {
        panic!("expected rerank");
    };
    assert_eq!(job.documents, vec!["primary".to_string()]);
    assert!(job.return_documents);
}

#[test]
fn test_parse_native_embed() {
    let request = JobRequest::parse(&json!({
        "input": "hello",
        "model": "Qwen3-Embedding-0.6B",
        "prompt_type": "query"
    }))
    .unwrap();

    let JobRequest::Embed(job) = request else {
        panic!("expected embed");
    };
    assert_eq!(job.input, vec!["hello".to_string()]);
    assert_eq!(job.prompt_type.as_deref(), Some("query"));
    assert_eq!(job.openai_route, None);
}

#[test]
fn test_parse_openai_routes() {
    assert_eq!(
        JobRequest::parse(&json!({"openai_route": "/v1/models"})).unwrap(),
        JobRequest::ListModels
    );
    assert_eq!(
        JobRequest::parse(&json!({"openai_route": "/openai/v1/models"})).unwrap(),
        JobRequest::ListModels
    );

    let request = JobRequest::parse(&json!({
        "openai_route": "/v1/rerank",
        "openai_input": {
            "query": "q",
            "documents": ["a"],
            "extra_body": {"instruction": "Find code"}
        }
    }))
    .unwrap();
    let JobRequest::Rerank(job) = request else {
        panic!("expected rerank");
    };
    assert_eq!(job.instruction.as_deref(), Some("Find code"));
    assert!(job.return_documents);

    let request = JobRequest::parse(&json!({
        "openai_route": "/openai/v1/embeddings",
        "openai_input": {
            "model": "Qwen3-Embedding-0.6B",
            "input": ["a", "b"],
            "extra_body": {"prompt_type": "document"}
        }
    }))
    .unwrap();
    let JobRequest::Embed(job) = request else {
        panic!("expected embed");
    };
    assert_eq!(job.input.len(), 2);
    assert_eq!(job.openai_route.as_deref(), Some("/openai/v1/embeddings"));
}

#[test]
fn test_parse_errors() {
    let cases = [
        (json!({"documents": ["a"]}), "Missing required field: query"),
        (json!({"query": "q"}), "Missing required field: documents"),
        (json!({"query": "q", "documents": []}), "Missing required field: documents"),
        (json!({"nothing": true}), "Invalid input"),
        (json!(["not", "an", "object"]), "Invalid input"),
        (json!({"openai_route": "/v2/chat"}), "Unknown route: /v2/chat"),
        (json!({"openai_route": ""}), "Unknown route: "),
        (
            json!({"openai_route": "/v1/embeddings", "openai_input": {"input": "x"}}),
            "Missing required field: model",
        ),
        (
            json!({"openai_route": "/v1/embeddings"}),
            "Missing required field: openai_input",
        ),
        (
            json!({"openai_route": "/v1/rerank", "openai_input": {"documents": ["a"]}}),
            "Missing required field: query",
        ),
    ];

    for (input, expected) in cases {
        let err = JobRequest::parse(&input).unwrap_err();
        assert_eq!(err.error_type(), ErrorType::InvalidRequestError, "{input}");
        assert!(err.to_string().starts_with(expected), "{input}: {err}");
    }
}

#[test]
fn test_normalize_route() {
    assert_eq!(normalize_route("/openai/v1/rerank"), "/v1/rerank");
    assert_eq!(normalize_route("/v1/rerank"), "/v1/rerank");
}

#[tokio::test]
async fn test_reranker_worker_warranty_job() {
    let worker = stub_reranker_worker();
    let output = worker.handle(sample_rerank_job()).await;

    let results = output["results"].as_array().unwrap();
    assert_eq!(results.len(), 3);
    for result in results {
        assert!(result.get("index").is_some());
        assert!(result.get("score").is_some());
        assert!(result.get("document").is_some());
    }
    let scores: Vec<f64> = results.iter().map(|r| r["score"].as_f64().unwrap()).collect();
    assert!(scores.windows(2).all(|w| w[0] >= w[1]));
    assert_eq!(output["query"], "What product has the best warranty?");
}

#[tokio::test]
async fn test_reranker_worker_models() {
    let worker = stub_reranker_worker();
    let output = worker.handle(json!({"openai_route": "/v1/models"})).await;

    assert_eq!(output["object"], "list");
    assert_eq!(output["data"][0]["id"], "Qwen3-Reranker-0.6B");
    assert_eq!(output["data"][0]["owned_by"], "qwen");
    assert_eq!(output["data"][0]["created"], 1_754_341_335);
}

#[tokio::test]
async fn test_reranker_worker_rejects_embeddings_route() {
    let worker = stub_reranker_worker();
    let output = worker
        .handle(json!({
            "openai_route": "/v1/embeddings",
            "openai_input": {"model": "m", "input": "x"}
        }))
        .await;

    assert_eq!(error_type(&output), "invalid_request_error");
    assert_eq!(error_message(&output), "Unknown route: /v1/embeddings");
}

#[tokio::test]
async fn test_reranker_worker_rejects_embeddings_route_before_body() {
    let worker = stub_reranker_worker();
    let cases = [
        json!({"openai_route": "/v1/embeddings"}),
        json!({"openai_route": "/v1/embeddings", "openai_input": {"input": "x"}}),
        json!({"openai_route": "/openai/v1/embeddings", "openai_input": 7}),
    ];

    for input in cases {
        let route = input["openai_route"].as_str().unwrap().to_string();
        let output = worker.handle(input).await;
        assert_eq!(error_type(&output), "invalid_request_error");
        assert_eq!(error_message(&output), format!("Unknown route: {route}"));
    }
}

#[tokio::test]
async fn test_reranker_worker_missing_query_envelope() {
    let worker = stub_reranker_worker();
    let output = worker.handle(json!({"documents": ["a"]})).await;

    assert_eq!(error_type(&output), "invalid_request_error");
    assert_eq!(error_message(&output), "Missing required field: query");
}

#[tokio::test]
async fn test_model_failure_is_internal_error() {
    let worker = mock_reranker_worker(MockRelevanceModel::failing("out of memory"));
    let output = worker.handle(json!({"query": "q", "documents": ["a"]})).await;

    assert_eq!(error_type(&output), "internal_error");
    assert!(error_message(&output).contains("out of memory"));
}

#[tokio::test]
async fn test_model_panic_is_internal_error() {
    let worker = mock_reranker_worker(MockRelevanceModel::panicking("kernel crashed"));
    let output = worker.handle(json!({"query": "q", "documents": ["a"]})).await;

    assert_eq!(error_type(&output), "internal_error");

    let followup = worker.handle(json!({"openai_route": "/v1/models"})).await;
    assert_eq!(followup["object"], "list");
}

struct PanickingHandler;

#[async_trait::async_trait]
impl JobHandler for PanickingHandler {
    async fn dispatch(&self, input: Value) -> JobResult<Value> {
        if input.get("boom").is_some() {
            panic!("dispatch blew up");
        }
        Ok(json!({"ok": true}))
    }

    fn max_concurrency(&self) -> usize {
        1
    }
}

#[tokio::test]
async fn test_dispatch_panic_becomes_envelope() {
    let handler = PanickingHandler;

    let output = handler.handle(json!({"boom": true})).await;
    assert_eq!(error_type(&output), "internal_error");
    assert_eq!(error_message(&output), "job task failed: dispatch blew up");

    let output = handler.handle(json!({})).await;
    assert_eq!(output, json!({"ok": true}));
}

#[tokio::test]
async fn test_worker_survives_failures() {
    let worker = mock_reranker_worker(MockRelevanceModel::with_scores(vec![0.1, 0.9]));

    let bad = worker.handle(json!({"query": "q"})).await;
    assert!(bad.get("error").is_some());

    let good = worker.handle(json!({"query": "q", "documents": ["a", "b"]})).await;
    assert_eq!(good["results"][0]["index"], 1);
    assert_eq!(worker.max_concurrency(), 4);
}

#[tokio::test]
async fn test_engine_worker_models() {
    let worker = stub_engine_worker();
    let output = worker.handle(json!({"openai_route": "/v1/models"})).await;

    let ids: Vec<&str> = output["data"]
        .as_array()
        .unwrap()
        .iter()
        .map(|m| m["id"].as_str().unwrap())
        .collect();
    assert_eq!(ids, vec!["Qwen3-Embedding-0.6B", "Qwen3-Reranker-0.6B"]);
    assert_eq!(worker.max_concurrency(), 6);
}

#[tokio::test]
async fn test_engine_worker_openai_embeddings_wrapped() {
    let worker = stub_engine_worker();
    let output = worker
        .handle(json!({
            "openai_route": "/v1/embeddings",
            "openai_input": {"model": "Qwen3-Embedding-0.6B", "input": ["a", "b"]}
        }))
        .await;

    let chunks = output.as_array().expect("list of responses");
    assert_eq!(chunks.len(), 1);
    assert_eq!(chunks[0]["object"], "list");
    assert_eq!(chunks[0]["data"].as_array().unwrap().len(), 2);
    assert!(chunks[0]["usage"]["prompt_tokens"].as_u64().is_some());
}

#[tokio::test]
async fn test_engine_worker_native_embed() {
    let worker = stub_engine_worker();
    let output = worker
        .handle(json!({"input": "hello", "model": "Qwen3-Embedding-0.6B"}))
        .await;

    assert_eq!(output["data"][0]["object"], "embedding");
    assert_eq!(output["data"][0]["embedding"].as_array().unwrap().len(), 1024);
}

#[tokio::test]
async fn test_engine_worker_native_embed_requires_model() {
    let worker = stub_engine_worker();
    let output = worker.handle(json!({"input": "hello"})).await;

    assert_eq!(error_type(&output), "invalid_request_error");
    assert_eq!(error_message(&output), "Missing required field: model");
}

#[tokio::test]
async fn test_engine_worker_native_rerank() {
    let worker = stub_engine_worker();
    let output = worker
        .handle(json!({
            "query": "rust language",
            "docs": ["python snakes", "rust language guide", "rust"],
            "return_docs": true,
            "top_k": 2,
            "model": "Qwen3-Reranker-0.6B"
        }))
        .await;

    let results = output["results"].as_array().unwrap();
    assert_eq!(results.len(), 2);
    assert!(results[0].get("relevance_score").is_some());
    assert!(results[0].get("document").is_some());
    assert_eq!(output["object"], "rerank");
}

#[tokio::test]
async fn test_engine_worker_unknown_model() {
    let worker = stub_engine_worker();
    let output = worker
        .handle(json!({"input": "hello", "model": "missing-model"}))
        .await;

    assert_eq!(error_type(&output), "invalid_request_error");
    assert!(error_message(&output).contains("missing-model"));
}
