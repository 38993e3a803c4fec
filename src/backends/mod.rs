//! HTTP backends and the model lifecycle CLI
//!
//! Two backends serve chat and embeddings:
//! - **Orchestra** (primary): OpenAI-chat-shaped local service, SSE-like streaming
//! - **Ollama** (secondary): native generate API, NDJSON streaming
//!
//! Which one serves a request depends only on the model name, see
//! [`Provider::for_model`].

pub mod lifecycle;
pub mod ollama;
pub mod orchestra;
pub mod stream;

pub use lifecycle::{CommandOutcome, ModelLifecycle, sanitize_model_identifier};
pub use ollama::OllamaClient;
pub use orchestra::OrchestraClient;
pub use stream::{ChunkStream, NdjsonDecoder, SseDecoder, StreamChunk};

use crate::error::AppError;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Model-name prefix reserved for the primary backend (matched case-insensitively)
pub const PRIMARY_MODEL_PREFIX: &str = "bigdaddyg";

/// Backend that serves a request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    Orchestra,
    Ollama,
}

impl Provider {
    /// Route a model name to its backend
    ///
    /// Names starting with [`PRIMARY_MODEL_PREFIX`] in any case go to
    /// Orchestra; everything else goes to Ollama.
    pub fn for_model(model: &str) -> Self {
        if has_primary_prefix(model) {
            Self::Orchestra
        } else {
            Self::Ollama
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Orchestra => "orchestra",
            Self::Ollama => "ollama",
        }
    }
}

impl std::fmt::Display for Provider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Whether `model` carries the primary backend's prefix
pub fn has_primary_prefix(model: &str) -> bool {
    model
        .get(..PRIMARY_MODEL_PREFIX.len())
        .is_some_and(|head| head.eq_ignore_ascii_case(PRIMARY_MODEL_PREFIX))
}

/// Connectivity of both backends
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct BackendStatus {
    pub orchestra: bool,
    pub ollama: bool,
}

/// Join a base URL and an absolute path without doubling slashes
pub(crate) fn endpoint_url(base_url: &str, path: &str) -> String {
    format!("{}{}", base_url.trim_end_matches('/'), path)
}

pub(crate) fn model_unavailable(
    model: &str,
    provider: Provider,
    reason: impl Into<String>,
) -> AppError {
    AppError::ModelUnavailable {
        model: model.to_string(),
        provider: provider.as_str().to_string(),
        reason: reason.into(),
    }
}

/// Send a streaming request, bounding only the wait for response headers
///
/// The body is read without a deadline so long generations are not cut off.
pub(crate) async fn open_stream(
    request: reqwest::RequestBuilder,
    header_timeout: std::time::Duration,
    model: &str,
    provider: Provider,
) -> Result<reqwest::Response, AppError> {
    match tokio::time::timeout(header_timeout, request.send()).await {
        Ok(Ok(response)) => Ok(response),
        Ok(Err(e)) => Err(model_unavailable(model, provider, e.to_string())),
        Err(_) => Err(model_unavailable(
            model,
            provider,
            format!(
                "no response headers within {}s",
                header_timeout.as_secs_f64()
            ),
        )),
    }
}

pub(crate) fn embedding_failed(
    model: &str,
    provider: Provider,
    reason: impl Into<String>,
) -> AppError {
    AppError::EmbeddingFailed {
        model: model.to_string(),
        provider: provider.as_str().to_string(),
        reason: reason.into(),
    }
}

/// Embedding vector from any of the common response shapes
///
/// Accepts `embedding`, `embeddings[0]` and `data[0].embedding`.
pub(crate) fn extract_embedding(body: &Value) -> Option<Vec<f32>> {
    let vector = body
        .get("embedding")
        .or_else(|| body.get("embeddings").and_then(|e| e.get(0)))
        .or_else(|| body.pointer("/data/0/embedding"))?
        .as_array()?;

    vector
        .iter()
        .map(|v| v.as_f64().map(|f| f as f32))
        .collect::<Option<Vec<f32>>>()
        .filter(|v| !v.is_empty())
}

/// Short description of a non-2xx response for error messages
pub(crate) async fn describe_error_response(response: reqwest::Response) -> String {
    let status = response.status();
    match response.text().await {
        Ok(body) if !body.trim().is_empty() => {
            let body: String = body.trim().chars().take(200).collect();
            format!("HTTP {}: {}", status, body)
        }
        _ => format!("HTTP {}", status),
    }
}
