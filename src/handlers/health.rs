//! Health check endpoint
//!
//! Always answers 200; backend reachability is reported, not enforced.

use crate::backends::BackendStatus;
use crate::handlers::AppState;
use axum::{Json, extract::State};
use serde::Serialize;

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub backends: BackendStatus,
    pub catalog_models: usize,
    pub active_agents: usize,
}

pub async fn handler(State(state): State<AppState>) -> Json<HealthResponse> {
    let bridge = state.bridge();
    let backends = bridge.check_backends().await;

    Json(HealthResponse {
        status: "OK",
        backends,
        catalog_models: bridge.catalog().len(),
        active_agents: bridge.agents().active_count(),
    })
}
