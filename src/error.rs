//! Error types for the bridge
//!
//! All errors implement `IntoResponse` for Axum handlers.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;

/// Main error type for the application
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Failed to read config file {path}: {source}")]
    ConfigFileRead {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config file {path}: {source}")]
    ConfigParseFailed {
        path: String,
        #[source]
        source: toml::de::Error,
    },

    #[error("Invalid configuration in {path}: {reason}")]
    ConfigValidationFailed { path: String, reason: String },

    #[error("Invalid request: {0}")]
    Validation(String),

    /// The selected backend could not serve a chat request for `model`
    #[error("Model '{model}' is unavailable via {provider}: {reason}")]
    ModelUnavailable {
        model: String,
        provider: String,
        reason: String,
    },

    #[error("Embedding generation failed for '{model}' via {provider}: {reason}")]
    EmbeddingFailed {
        model: String,
        provider: String,
        reason: String,
    },

    #[error("Agent capacity exceeded: all {max} agent slots are in use")]
    AgentCapacityExceeded { max: usize },

    #[error("Agent slot {slot} is busy running another task")]
    AgentBusy { slot: usize },

    #[error("Agent not found: {0}")]
    AgentNotFound(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = match &self {
            Self::Validation(_) => StatusCode::BAD_REQUEST,
            Self::Config(_)
            | Self::ConfigFileRead { .. }
            | Self::ConfigParseFailed { .. }
            | Self::ConfigValidationFailed { .. } => StatusCode::INTERNAL_SERVER_ERROR,
            Self::ModelUnavailable { .. } | Self::EmbeddingFailed { .. } => {
                StatusCode::BAD_GATEWAY
            }
            Self::AgentCapacityExceeded { .. } => StatusCode::SERVICE_UNAVAILABLE,
            Self::AgentBusy { .. } => StatusCode::CONFLICT,
            Self::AgentNotFound(_) => StatusCode::NOT_FOUND,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        let body = Json(serde_json::json!({
            "error": self.to_string(),
        }));

        (status, body).into_response()
    }
}

/// Convenience type alias for Results
pub type AppResult<T> = Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_model_unavailable_names_model_and_provider() {
        let err = AppError::ModelUnavailable {
            model: "bigdaddyg:latest".to_string(),
            provider: "orchestra".to_string(),
            reason: "connection refused".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "Model 'bigdaddyg:latest' is unavailable via orchestra: connection refused"
        );
    }

    #[test]
    fn test_capacity_error_message() {
        let err = AppError::AgentCapacityExceeded { max: 200 };
        assert_eq!(
            err.to_string(),
            "Agent capacity exceeded: all 200 agent slots are in use"
        );
    }

    #[test]
    fn test_validation_error_response_status() {
        let response = AppError::Validation("test".to_string()).into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn test_model_unavailable_response_status() {
        let response = AppError::ModelUnavailable {
            model: "llama3".to_string(),
            provider: "ollama".to_string(),
            reason: "HTTP 500".to_string(),
        }
        .into_response();
        assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
    }

    #[test]
    fn test_agent_errors_response_status() {
        assert_eq!(
            AppError::AgentCapacityExceeded { max: 1 }
                .into_response()
                .status(),
            StatusCode::SERVICE_UNAVAILABLE
        );
        assert_eq!(
            AppError::AgentBusy { slot: 0 }.into_response().status(),
            StatusCode::CONFLICT
        );
        assert_eq!(
            AppError::AgentNotFound("x".to_string())
                .into_response()
                .status(),
            StatusCode::NOT_FOUND
        );
    }

    #[test]
    fn test_internal_error_response_status() {
        let response = AppError::Internal("test".to_string()).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
