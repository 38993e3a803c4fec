//! Integration tests for embedding generation on both backends

use bigdaddyg_bridge::backends::Provider;
use bigdaddyg_bridge::bridge::Bridge;
use bigdaddyg_bridge::config::Config;
use bigdaddyg_bridge::error::AppError;
use bigdaddyg_bridge::router::ChatService;
use serde_json::json;
use wiremock::matchers::{body_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

async fn bridge(orchestra_url: &str, ollama_url: &str) -> Bridge {
    let mut config = Config::default();
    config.backends.orchestra_url = orchestra_url.to_string();
    config.backends.ollama_url = ollama_url.to_string();
    config.catalog.include_platform_paths = false;
    config.catalog.remote_discovery = false;
    Bridge::initialize(config).await.expect("bridge should initialize")
}

#[tokio::test]
async fn test_ollama_embeddings_use_prompt_field() {
    let ollama = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/embeddings"))
        .and(body_json(json!({"model": "nomic-embed-text", "prompt": "hello world"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "embedding": [0.25, -0.5, 1.0]
        })))
        .expect(1)
        .mount(&ollama)
        .await;

    let bridge = bridge("http://127.0.0.1:9", &ollama.uri()).await;
    let result = bridge
        .chat()
        .generate_embeddings("hello world", Some("nomic-embed-text"))
        .await
        .expect("embeddings should succeed");

    assert_eq!(result.embedding, vec![0.25, -0.5, 1.0]);
    assert_eq!(result.model, "nomic-embed-text");
    assert_eq!(result.provider, Provider::Ollama);
}

#[tokio::test]
async fn test_orchestra_embeddings_accept_openai_shape() {
    let orchestra = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/embeddings"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": [{"embedding": [1.0, 2.0]}]
        })))
        .expect(1)
        .mount(&orchestra)
        .await;

    let bridge = bridge(&orchestra.uri(), "http://127.0.0.1:9").await;
    let result = bridge
        .chat()
        .generate_embeddings("hello", Some("bigdaddyg-embed"))
        .await
        .expect("embeddings should succeed");

    assert_eq!(result.embedding, vec![1.0, 2.0]);
    assert_eq!(result.provider, Provider::Orchestra);
}

#[tokio::test]
async fn test_embedding_failure_names_model_and_provider() {
    let orchestra = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/embeddings"))
        .respond_with(ResponseTemplate::new(503).set_body_string("warming up"))
        .mount(&orchestra)
        .await;

    let bridge = bridge(&orchestra.uri(), "http://127.0.0.1:9").await;
    let err = bridge
        .chat()
        .generate_embeddings("hello", Some("bigdaddyg:latest"))
        .await
        .expect_err("503 must fail");

    match err {
        AppError::EmbeddingFailed {
            model,
            provider,
            reason,
        } => {
            assert_eq!(model, "bigdaddyg:latest");
            assert_eq!(provider, "orchestra");
            assert!(reason.contains("503"), "{reason}");
        }
        other => panic!("expected EmbeddingFailed, got {other:?}"),
    }
}

#[tokio::test]
async fn test_empty_vector_is_a_failure() {
    let ollama = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/embeddings"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"embedding": []})))
        .mount(&ollama)
        .await;

    let bridge = bridge("http://127.0.0.1:9", &ollama.uri()).await;
    let err = bridge
        .chat()
        .generate_embeddings("hello", Some("llama3"))
        .await
        .expect_err("empty embedding must fail");
    assert!(matches!(err, AppError::EmbeddingFailed { .. }));
}

#[tokio::test]
async fn test_blank_input_rejected_without_backend_call() {
    let bridge = bridge("http://127.0.0.1:9", "http://127.0.0.1:9").await;
    let err = bridge
        .chat()
        .generate_embeddings("  ", None)
        .await
        .expect_err("blank input");
    assert!(matches!(err, AppError::Validation(_)));
}
