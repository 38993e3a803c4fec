//! End-to-end tests of the HTTP API through the full axum router

use axum::{
    Router,
    body::Body,
    http::{Request, StatusCode},
};
use bigdaddyg_bridge::bridge::Bridge;
use bigdaddyg_bridge::config::Config;
use bigdaddyg_bridge::handlers::{self, AppState};
use bigdaddyg_bridge::middleware::REQUEST_ID_HEADER;
use serde_json::{Value, json};
use std::sync::Arc;
use tower::ServiceExt;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

async fn app_for(ollama_url: &str) -> Router {
    let mut config = Config::default();
    config.backends.orchestra_url = "http://127.0.0.1:9".to_string();
    config.backends.ollama_url = ollama_url.to_string();
    config.catalog.include_platform_paths = false;
    config.catalog.remote_discovery = false;
    config.agents.max_agents = 1;
    let bridge = Bridge::initialize(config).await.expect("bridge");
    handlers::app(AppState::new(Arc::new(bridge)))
}

fn post_json(uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .expect("request")
}

fn get(uri: &str) -> Request<Body> {
    Request::builder()
        .uri(uri)
        .body(Body::empty())
        .expect("request")
}

async fn body_json(response: axum::response::Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("body");
    serde_json::from_slice(&bytes).expect("json body")
}

async fn body_text(response: axum::response::Response) -> String {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("body");
    String::from_utf8(bytes.to_vec()).expect("utf-8 body")
}

#[tokio::test]
async fn test_health_echoes_request_id() {
    let app = app_for("http://127.0.0.1:9").await;
    let id = "6f1c7a3e-2f43-4a8e-9d57-0e4f3c6a9b21";

    let response = app
        .oneshot(
            Request::builder()
                .uri("/health")
                .header(REQUEST_ID_HEADER, id)
                .body(Body::empty())
                .expect("request"),
        )
        .await
        .expect("response");

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response
            .headers()
            .get(REQUEST_ID_HEADER)
            .and_then(|v| v.to_str().ok()),
        Some(id)
    );
    let body = body_json(response).await;
    assert_eq!(body["status"], "OK");
    assert_eq!(body["backends"]["orchestra"], false);
}

#[tokio::test]
async fn test_chat_round_trip_and_cache_stats() {
    let ollama = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/generate"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "response": "hi there",
            "done": true
        })))
        .expect(1)
        .mount(&ollama)
        .await;
    let app = app_for(&ollama.uri()).await;

    for _ in 0..2 {
        let response = app
            .clone()
            .oneshot(post_json("/chat", json!({"message": "hello", "model": "llama3"})))
            .await
            .expect("response");
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["content"], "hi there");
        assert_eq!(body["provider"], "ollama");
    }

    let stats = body_json(app.clone().oneshot(get("/cache")).await.expect("response")).await;
    assert_eq!(stats, json!({"hits": 1, "misses": 1, "entries": 1}));

    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method("DELETE")
                .uri("/cache")
                .body(Body::empty())
                .expect("request"),
        )
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::NO_CONTENT);
}

#[tokio::test]
async fn test_chat_validation_and_backend_errors() {
    let app = app_for("http://127.0.0.1:9").await;

    let response = app
        .clone()
        .oneshot(post_json("/chat", json!({"message": "  "})))
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let response = app
        .oneshot(post_json("/chat", json!({"message": "hello"})))
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
    let body = body_json(response).await;
    let error = body["error"].as_str().unwrap_or_default();
    assert!(error.contains("bigdaddyg:latest"), "{error}");
    assert!(error.contains("orchestra"), "{error}");
}

#[tokio::test]
async fn test_chat_stream_ends_with_done_sentinel() {
    let ollama = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/generate"))
        .respond_with(ResponseTemplate::new(200).set_body_string(concat!(
            "{\"response\":\"a\",\"done\":false}\n",
            "{\"response\":\"b\",\"done\":true}\n",
        )))
        .mount(&ollama)
        .await;
    let app = app_for(&ollama.uri()).await;

    let response = app
        .oneshot(post_json("/chat/stream", json!({"message": "hi", "model": "llama3"})))
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response
            .headers()
            .get("content-type")
            .and_then(|v| v.to_str().ok()),
        Some("text/event-stream")
    );

    let text = body_text(response).await;
    let data: Vec<&str> = text
        .lines()
        .filter_map(|line| line.strip_prefix("data: "))
        .collect();
    assert_eq!(
        data,
        vec![
            r#"{"content":"a","done":false}"#,
            r#"{"content":"b","done":true}"#,
            "[DONE]"
        ]
    );
}

#[tokio::test]
async fn test_agent_lifecycle_over_http() {
    let app = app_for("http://127.0.0.1:9").await;

    let response = app
        .clone()
        .oneshot(post_json("/agents", json!({"name": "reviewer", "model": "llama3"})))
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::CREATED);
    let agent = body_json(response).await;
    assert_eq!(agent["slot"], 0);
    assert_eq!(agent["status"], "initializing");

    let response = app
        .clone()
        .oneshot(post_json("/agents", json!({})))
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);

    let listing = body_json(app.clone().oneshot(get("/agents")).await.expect("response")).await;
    assert_eq!(listing["capacity"], 1);
    assert_eq!(listing["available"], 0);
    assert_eq!(listing["slots"][0]["current_task"]["type"], "initialize");

    let id = agent["id"].as_str().expect("agent id");
    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method("DELETE")
                .uri(format!("/agents/{}", id))
                .body(Body::empty())
                .expect("request"),
        )
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::OK);

    let response = app
        .oneshot(post_json("/agents/slots/7/tasks", json!({"type": "chat", "message": "hi"})))
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_models_and_metrics_endpoints() {
    let app = app_for("http://127.0.0.1:9").await;

    let models = body_json(app.clone().oneshot(get("/models")).await.expect("response")).await;
    assert_eq!(models["total"], 0);

    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/models/refresh")
                .body(Body::empty())
                .expect("request"),
        )
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["total"], 0);

    let response = app.oneshot(get("/metrics")).await.expect("response");
    assert_eq!(response.status(), StatusCode::OK);
    assert!(body_text(response).await.contains("bigdaddyg_catalog_models"));
}

#[tokio::test]
async fn test_unrecognized_task_type_is_sent_as_chat() {
    let ollama = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/generate"))
        .and(wiremock::matchers::body_partial_json(json!({
            "model": "llama3",
            "prompt": "explain this"
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "response": "explained",
            "done": true
        })))
        .expect(1)
        .mount(&ollama)
        .await;
    let app = app_for(&ollama.uri()).await;

    let response = app
        .clone()
        .oneshot(post_json("/agents", json!({"model": "llama3"})))
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::CREATED);

    let response = app
        .oneshot(post_json(
            "/agents/slots/0/tasks",
            json!({"type": "analysis", "message": "explain this"}),
        ))
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["content"], "explained");
}
