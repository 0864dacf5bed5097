use std::sync::Arc;

use super::*;

fn stub_array() -> EngineArray {
    EngineArray::new(
        vec![
            EngineSpec::new("/models/Qwen3-Embedding-0.6B", 8).with_stub(true),
            EngineSpec::new("/models/Qwen3-Reranker-0.6B", 8).with_stub(true),
        ],
        EngineOptions::default(),
    )
}

fn texts(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

#[test]
fn test_kind_inference() {
    assert_eq!(EngineKind::infer("Qwen/Qwen3-Reranker-0.6B"), EngineKind::Rerank);
    assert_eq!(EngineKind::infer("BAAI/bge-RERANKER-base"), EngineKind::Rerank);
    assert_eq!(EngineKind::infer("Qwen/Qwen3-Embedding-0.6B"), EngineKind::Embedding);
}

#[test]
fn test_spec_served_name() {
    let spec = EngineSpec::new("/models/Qwen3-Embedding-0.6B", 16);
    assert_eq!(spec.name, "Qwen3-Embedding-0.6B");
    assert_eq!(spec.path, "/models/Qwen3-Embedding-0.6B");
    assert_eq!(spec.batch_size, 16);
    assert!(!spec.stub);
}

#[test]
fn test_specs_from_config() {
    let config = crate::config::Config {
        model_names: texts(&["a/Qwen3-Embedding-0.6B", "b/Qwen3-Reranker-0.6B"]),
        batch_sizes: vec![4, 2],
        ..Default::default()
    };

    let specs = EngineSpec::from_config(&config).unwrap();
    assert_eq!(specs[0].batch_size, 4);
    assert_eq!(specs[1].kind, EngineKind::Rerank);

    let mismatched = crate::config::Config {
        batch_sizes: vec![4],
        ..config
    };
    assert!(EngineSpec::from_config(&mismatched).is_err());
}

#[test]
fn test_embedding_prefix() {
    assert_eq!(
        embedding_prefix(Some("Find code"), Some("document")).as_deref(),
        Some("Instruct: Find code\nQuery: ")
    );
    assert_eq!(
        embedding_prefix(None, Some("query")).as_deref(),
        Some(
            "Instruct: Given a web search query, retrieve relevant passages that answer the query\nQuery: "
        )
    );
    assert_eq!(embedding_prefix(None, Some("document")), None);
    assert_eq!(embedding_prefix(Some(""), None), None);
    assert_eq!(embedding_prefix(None, None), None);
}

#[test]
fn test_apply_instruction() {
    let out = apply_instruction(texts(&["a", "b"]), Some("X"), None);
    assert_eq!(out, texts(&["Instruct: X\nQuery: a", "Instruct: X\nQuery: b"]));

    let out = apply_instruction(texts(&["a"]), None, Some("document"));
    assert_eq!(out, texts(&["a"]));
}

#[test]
fn test_embedding_input_forms() {
    let single: EmbeddingInput = serde_json::from_str(r#""hello""#).unwrap();
    assert_eq!(single.into_vec(), texts(&["hello"]));

    let batch: EmbeddingInput = serde_json::from_str(r#"["a", "b"]"#).unwrap();
    assert_eq!(batch.into_vec(), texts(&["a", "b"]));
}

#[tokio::test]
async fn test_start_stop_idempotent() {
    let array = stub_array();
    assert_eq!(array.state(), EngineState::Stopped);

    array.start().await.unwrap();
    array.start().await.unwrap();
    assert!(array.is_running());

    array.stop().await;
    array.stop().await;
    assert_eq!(array.state(), EngineState::Stopped);
}

#[tokio::test]
async fn test_concurrent_start() {
    let array = Arc::new(stub_array());

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let array = Arc::clone(&array);
            tokio::spawn(async move { array.start().await })
        })
        .collect();

    for handle in handles {
        handle.await.unwrap().unwrap();
    }
    assert!(array.is_running());
}

#[tokio::test]
async fn test_start_failure_returns_to_stopped() {
    let array = EngineArray::new(
        vec![EngineSpec::new("/nonexistent/embrank/Qwen3-Embedding-0.6B", 4)],
        EngineOptions::default(),
    );

    assert!(array.start().await.is_err());
    assert_eq!(array.state(), EngineState::Stopped);
}

#[tokio::test]
async fn test_list_and_openai_models() {
    let array = stub_array();
    assert_eq!(
        array.list_models(),
        texts(&["Qwen3-Embedding-0.6B", "Qwen3-Reranker-0.6B"])
    );

    let models = serde_json::to_value(array.openai_models()).unwrap();
    assert_eq!(models["object"], "list");
    assert_eq!(models["data"][1]["id"], "Qwen3-Reranker-0.6B");
    assert_eq!(models["data"][0]["object"], "model");
}

#[tokio::test]
async fn test_embed_auto_starts() {
    let array = stub_array();

    let response = array
        .embed("Qwen3-Embedding-0.6B", texts(&["a", "b"]), None, None)
        .await
        .unwrap();

    assert!(array.is_running());
    assert_eq!(response.object, "list");
    assert_eq!(response.data.len(), 2);
    assert_eq!(response.data[1].index, 1);
    assert_eq!(response.model, "Qwen3-Embedding-0.6B");
    assert!(response.id.starts_with("embrank-"));
}

#[tokio::test]
async fn test_embed_accepts_full_identifier() {
    let array = stub_array();
    let response = array
        .embed("/models/Qwen3-Embedding-0.6B", texts(&["a"]), None, None)
        .await
        .unwrap();
    assert_eq!(response.data.len(), 1);
}

#[tokio::test]
async fn test_embed_instruction_changes_vector() {
    let array = stub_array();
    let plain = array
        .embed("Qwen3-Embedding-0.6B", texts(&["rust"]), None, Some("document"))
        .await
        .unwrap();
    let query = array
        .embed("Qwen3-Embedding-0.6B", texts(&["rust"]), None, Some("query"))
        .await
        .unwrap();

    assert_ne!(plain.data[0].embedding, query.data[0].embedding);
}

#[tokio::test]
async fn test_embed_errors() {
    let array = stub_array();

    let err = array.embed("unknown", texts(&["a"]), None, None).await.unwrap_err();
    assert!(matches!(err, EngineError::ModelNotFound { .. }));
    assert!(err.is_client_error());

    let err = array
        .embed("Qwen3-Reranker-0.6B", texts(&["a"]), None, None)
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::UnsupportedOperation { .. }));

    let err = array
        .embed("Qwen3-Embedding-0.6B", vec![], None, None)
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::EmptyInput));
}

#[tokio::test]
async fn test_rerank_envelope() {
    let array = stub_array();

    let response = array
        .rerank(
            Some("Qwen3-Reranker-0.6B"),
            "rust language",
            texts(&["python snakes", "rust language guide"]),
            true,
        )
        .await
        .unwrap();

    assert_eq!(response.object, "rerank");
    assert_eq!(response.results.len(), 2);
    assert_eq!(response.results[0].index, 1);
    assert_eq!(
        response.results[0].document.as_deref(),
        Some("rust language guide")
    );
    assert!(response.usage.prompt_tokens > 0);
}

#[tokio::test]
async fn test_rerank_without_documents_field() {
    let array = stub_array();
    let response = array
        .rerank(None, "q", texts(&["a", "b"]), false)
        .await
        .unwrap();

    assert_eq!(response.model, "Qwen3-Reranker-0.6B");
    assert!(response.results.iter().all(|r| r.document.is_none()));

    let json = serde_json::to_value(&response).unwrap();
    assert!(json["results"][0].get("document").is_none());
}

#[tokio::test]
async fn test_rerank_model_required_when_ambiguous() {
    let array = EngineArray::new(
        vec![
            EngineSpec::new("a/Qwen3-Reranker-0.6B", 4).with_stub(true),
            EngineSpec::new("b/bge-reranker-base", 4).with_stub(true),
        ],
        EngineOptions::default(),
    );

    let err = array.rerank(None, "q", texts(&["a"]), true).await.unwrap_err();
    assert!(matches!(
        err,
        EngineError::AmbiguousModel {
            kind: "rerank",
            count: 2
        }
    ));
}
