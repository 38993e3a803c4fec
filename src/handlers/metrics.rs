//! Prometheus metrics endpoint

use axum::{extract::State, http::StatusCode};

use crate::handlers::AppState;

/// Metrics in Prometheus text format
///
/// ```bash
/// curl http://localhost:3000/metrics
/// # HELP bigdaddyg_backend_requests_total Total backend calls by provider, operation and outcome
/// # TYPE bigdaddyg_backend_requests_total counter
/// bigdaddyg_backend_requests_total{operation="chat",outcome="success",provider="ollama"} 3
/// ```
pub async fn handler(State(state): State<AppState>) -> (StatusCode, String) {
    match state.bridge().metrics().gather() {
        Ok(output) => (StatusCode::OK, output),
        Err(e) => {
            tracing::error!(error = %e, "Failed to gather metrics for Prometheus scraping");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("Failed to gather metrics: {}", e),
            )
        }
    }
}
