//! Model catalog and lifecycle endpoints
//!
//! - `GET /models` lists the catalog in registration order
//! - `POST /models/refresh` rebuilds it from every discovery source
//! - `POST /models/pull`, `POST /models/remove` run the local model store CLI
//!   and rebuild the catalog after a successful command

use crate::backends::CommandOutcome;
use crate::catalog::{BuildReport, ModelInfo};
use crate::handlers::AppState;
use axum::{Json, extract::State, http::StatusCode};
use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize)]
pub struct ModelsResponse {
    pub models: Vec<ModelInfo>,
    pub total: usize,
}

#[derive(Debug, Deserialize)]
pub struct ModelCommandRequest {
    pub model: String,
}

pub async fn list(State(state): State<AppState>) -> Json<ModelsResponse> {
    let models = state.bridge().catalog().list();
    tracing::debug!(total_models = models.len(), "Listing model catalog");
    Json(ModelsResponse {
        total: models.len(),
        models,
    })
}

pub async fn refresh(State(state): State<AppState>) -> Json<BuildReport> {
    Json(state.bridge().rebuild_catalog().await)
}

pub async fn pull(
    State(state): State<AppState>,
    Json(request): Json<ModelCommandRequest>,
) -> (StatusCode, Json<CommandOutcome>) {
    let outcome = state.bridge().lifecycle().pull(&request.model).await;
    finish_command(&state, outcome).await
}

pub async fn remove(
    State(state): State<AppState>,
    Json(request): Json<ModelCommandRequest>,
) -> (StatusCode, Json<CommandOutcome>) {
    let outcome = state.bridge().lifecycle().remove(&request.model).await;
    finish_command(&state, outcome).await
}

/// Failed commands answer 502 with the outcome as the body
async fn finish_command(
    state: &AppState,
    outcome: CommandOutcome,
) -> (StatusCode, Json<CommandOutcome>) {
    if outcome.success {
        state.bridge().rebuild_catalog().await;
        (StatusCode::OK, Json(outcome))
    } else {
        (StatusCode::BAD_GATEWAY, Json(outcome))
    }
}
