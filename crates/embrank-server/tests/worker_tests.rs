mod common;

use std::sync::Arc;

use reqwest::StatusCode;
use serde_json::json;

use common::harness::{spawn_worker, stub_engine_worker, stub_reranker_worker};
use common::http_client::TestClient;
use embrank::sample_rerank_job;

#[tokio::test]
async fn test_sample_job_through_reranker_worker() {
    let worker = spawn_worker(Arc::new(stub_reranker_worker(4).unwrap()))
        .await
        .unwrap();
    let client = TestClient::new(worker.url());

    let (status, body) = client
        .post_json("/runsync", &json!({"input": sample_rerank_job()}))
        .await
        .unwrap();

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "COMPLETED");

    let results = body["output"]["results"].as_array().unwrap();
    assert_eq!(results.len(), 3);
    for pair in results.windows(2) {
        assert!(pair[0]["score"].as_f64().unwrap() >= pair[1]["score"].as_f64().unwrap());
    }
    for result in results {
        assert!(result.get("index").is_some());
        assert!(result["document"].as_str().unwrap().contains("warranty"));
    }
}

#[tokio::test]
async fn test_reranker_worker_models_and_unknown_route() {
    let worker = spawn_worker(Arc::new(stub_reranker_worker(4).unwrap()))
        .await
        .unwrap();
    let client = TestClient::new(worker.url());

    let (_, models) = client
        .post_json("/runsync", &json!({"input": {"openai_route": "/v1/models"}}))
        .await
        .unwrap();
    assert_eq!(models["output"]["data"][0]["owned_by"], "qwen");
    assert_eq!(models["output"]["data"][0]["created"], 1754341335);

    let (_, unknown) = client
        .post_json(
            "/runsync",
            &json!({"input": {"openai_route": "/v1/chat/completions", "openai_input": {}}}),
        )
        .await
        .unwrap();
    assert_eq!(unknown["output"]["error"]["type"], "invalid_request_error");
    assert_eq!(
        unknown["output"]["error"]["message"],
        "Unknown route: /v1/chat/completions"
    );
}

#[tokio::test]
async fn test_engine_worker_serves_all_routes() {
    let worker = spawn_worker(Arc::new(stub_engine_worker(6))).await.unwrap();
    let client = TestClient::new(worker.url());

    let (_, health) = client.get_json("/health").await.unwrap();
    assert_eq!(health["max_concurrency"], 6);

    let (_, models) = client
        .post_json("/runsync", &json!({"input": {"openai_route": "/openai/v1/models"}}))
        .await
        .unwrap();
    let ids: Vec<&str> = models["output"]["data"]
        .as_array()
        .unwrap()
        .iter()
        .map(|card| card["id"].as_str().unwrap())
        .collect();
    assert_eq!(ids, vec!["Qwen3-Embedding-0.6B", "Qwen3-Reranker-0.6B"]);

    let (_, embedded) = client
        .post_json(
            "/runsync",
            &json!({"input": {
                "openai_route": "/v1/embeddings",
                "openai_input": {"model": "Qwen3-Embedding-0.6B", "input": "hello world"}
            }}),
        )
        .await
        .unwrap();
    let chunk = &embedded["output"][0];
    assert_eq!(chunk["object"], "list");
    assert_eq!(chunk["data"].as_array().unwrap().len(), 1);

    let (_, reranked) = client
        .post_json(
            "/runsync",
            &json!({"input": {
                "query": "warranty",
                "docs": ["two year warranty", "free shipping", "lifetime warranty"],
                "model": "Qwen3-Reranker-0.6B",
                "return_docs": false,
                "top_k": 2
            }}),
        )
        .await
        .unwrap();
    let results = reranked["output"]["results"].as_array().unwrap();
    assert_eq!(results.len(), 2);
    assert!(results.iter().all(|r| r.get("document").is_none()));
}

#[tokio::test]
async fn test_engine_worker_unknown_model_is_client_error() {
    let worker = spawn_worker(Arc::new(stub_engine_worker(2))).await.unwrap();
    let client = TestClient::new(worker.url());

    let (status, body) = client
        .post_json(
            "/runsync",
            &json!({"input": {"input": ["text"], "model": "missing-model"}}),
        )
        .await
        .unwrap();

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["output"]["error"]["type"], "invalid_request_error");
    assert!(
        body["output"]["error"]["message"]
            .as_str()
            .unwrap()
            .contains("missing-model")
    );
}
