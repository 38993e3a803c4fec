//! HTTP request handlers for the bridge API

use crate::bridge::Bridge;
use crate::middleware::request_id_middleware;
use axum::{
    Router, middleware,
    routing::{delete, get, post},
};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

pub mod agents;
pub mod cache;
pub mod chat;
pub mod health;
pub mod metrics;
pub mod models;

/// Application state shared across all handlers
#[derive(Clone)]
pub struct AppState {
    bridge: Arc<Bridge>,
}

impl AppState {
    pub fn new(bridge: Arc<Bridge>) -> Self {
        Self { bridge }
    }

    pub fn bridge(&self) -> &Bridge {
        &self.bridge
    }
}

/// Every route with request-id and trace layers applied
pub fn app(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health::handler))
        .route("/metrics", get(metrics::handler))
        .route("/models", get(models::list))
        .route("/models/refresh", post(models::refresh))
        .route("/models/pull", post(models::pull))
        .route("/models/remove", post(models::remove))
        .route("/chat", post(chat::handler))
        .route("/chat/stream", post(chat::stream_handler))
        .route("/embeddings", post(chat::embeddings_handler))
        .route("/agents", get(agents::list).post(agents::create))
        .route("/agents/{id}", delete(agents::remove))
        .route("/agents/slots/{slot}/tasks", post(agents::assign_task))
        .route("/cache", get(cache::stats).delete(cache::clear))
        .with_state(state)
        .layer(middleware::from_fn(request_id_middleware))
        .layer(TraceLayer::new_for_http())
}
