//! Result cache inspection

use crate::cache::CacheStats;
use crate::handlers::AppState;
use axum::{Json, extract::State, http::StatusCode};

pub async fn stats(State(state): State<AppState>) -> Json<CacheStats> {
    Json(state.bridge().chat().stats())
}

pub async fn clear(State(state): State<AppState>) -> StatusCode {
    state.bridge().chat().clear();
    StatusCode::NO_CONTENT
}
