//! Client for the primary ("Orchestra") backend
//!
//! Speaks an OpenAI-chat-like dialect on `POST /api/chat`. Responses may
//! carry the text in several places, see [`extract_content`].

use super::stream::{ChunkStream, SseDecoder, decode_stream};
use super::{
    Provider, describe_error_response, embedding_failed, endpoint_url, extract_embedding,
    model_unavailable, open_stream,
};
use crate::config::BackendsConfig;
use crate::error::AppResult;
use crate::metrics::Metrics;
use crate::router::{ChatRequest, ChatResult, EmbeddingResult, Usage};
use serde_json::{Value, json};
use std::sync::Arc;
use std::time::Duration;

const PROVIDER: Provider = Provider::Orchestra;

/// HTTP client for the primary backend
#[derive(Clone)]
pub struct OrchestraClient {
    http: reqwest::Client,
    base_url: String,
    request_timeout: Duration,
    probe_timeout: Duration,
    metrics: Option<Arc<Metrics>>,
}

impl OrchestraClient {
    pub fn new(
        http: reqwest::Client,
        base_url: impl Into<String>,
        request_timeout: Duration,
        probe_timeout: Duration,
    ) -> Self {
        Self {
            http,
            base_url: base_url.into(),
            request_timeout,
            probe_timeout,
            metrics: None,
        }
    }

    pub fn from_config(config: &BackendsConfig, http: reqwest::Client) -> Self {
        Self::new(
            http,
            config.orchestra_url.clone(),
            config.request_timeout(),
            config.probe_timeout(),
        )
    }

    /// Count skipped stream frames in `metrics`
    pub fn with_metrics(mut self, metrics: Arc<Metrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Whether `GET /health` answers 2xx within the probe timeout
    pub async fn health(&self) -> bool {
        let url = endpoint_url(&self.base_url, "/health");
        match self.http.get(&url).timeout(self.probe_timeout).send().await {
            Ok(response) => {
                let healthy = response.status().is_success();
                tracing::debug!(url = %url, status = %response.status(), healthy, "Orchestra probe completed");
                healthy
            }
            Err(e) => {
                tracing::debug!(url = %url, error = %e, "Orchestra probe failed");
                false
            }
        }
    }

    pub async fn chat(&self, model: &str, request: &ChatRequest) -> AppResult<ChatResult> {
        let url = endpoint_url(&self.base_url, "/api/chat");
        let response = self
            .http
            .post(&url)
            .timeout(self.request_timeout)
            .json(&chat_payload(model, request, false))
            .send()
            .await
            .map_err(|e| model_unavailable(model, PROVIDER, e.to_string()))?;

        if !response.status().is_success() {
            let reason = describe_error_response(response).await;
            return Err(model_unavailable(model, PROVIDER, reason));
        }

        let body: Value = response
            .json()
            .await
            .map_err(|e| model_unavailable(model, PROVIDER, format!("invalid response body: {}", e)))?;

        let content = extract_content(&body)
            .ok_or_else(|| model_unavailable(model, PROVIDER, "response contained no content"))?;

        Ok(ChatResult {
            content,
            usage: extract_usage(&body),
            model: model.to_string(),
            provider: PROVIDER,
            timestamp: chrono::Utc::now(),
        })
    }

    /// Open a streaming chat; failures before the first byte are errors
    pub async fn chat_stream(&self, model: &str, request: &ChatRequest) -> AppResult<ChunkStream> {
        let url = endpoint_url(&self.base_url, "/api/chat");
        let response = open_stream(
            self.http.post(&url).json(&chat_payload(model, request, true)),
            self.request_timeout,
            model,
            PROVIDER,
        )
        .await?;

        if !response.status().is_success() {
            let reason = describe_error_response(response).await;
            return Err(model_unavailable(model, PROVIDER, reason));
        }

        Ok(decode_stream(
            response.bytes_stream(),
            SseDecoder::new(),
            PROVIDER,
            self.metrics.clone(),
        ))
    }

    pub async fn embeddings(&self, model: &str, input: &str) -> AppResult<EmbeddingResult> {
        let url = endpoint_url(&self.base_url, "/api/embeddings");
        let response = self
            .http
            .post(&url)
            .timeout(self.request_timeout)
            .json(&json!({ "model": model, "prompt": input }))
            .send()
            .await
            .map_err(|e| embedding_failed(model, PROVIDER, e.to_string()))?;

        if !response.status().is_success() {
            let reason = describe_error_response(response).await;
            return Err(embedding_failed(model, PROVIDER, reason));
        }

        let body: Value = response
            .json()
            .await
            .map_err(|e| embedding_failed(model, PROVIDER, format!("invalid response body: {}", e)))?;

        let embedding = extract_embedding(&body)
            .ok_or_else(|| embedding_failed(model, PROVIDER, "response contained no embedding"))?;

        Ok(EmbeddingResult {
            embedding,
            model: model.to_string(),
            provider: PROVIDER,
        })
    }
}

/// Request body for `POST /api/chat`
///
/// `messages` carries the optional system prompt, then the context, then
/// the user message; `message` repeats the user message for older servers.
pub(crate) fn chat_payload(model: &str, request: &ChatRequest, stream: bool) -> Value {
    let mut messages = Vec::with_capacity(request.context.len() + 2);
    if let Some(system) = &request.system_prompt {
        messages.push(json!({ "role": "system", "content": system }));
    }
    for turn in &request.context {
        messages.push(json!({ "role": turn.role, "content": turn.content }));
    }
    messages.push(json!({ "role": "user", "content": request.message }));

    let sampling = &request.sampling;
    let mut payload = json!({
        "model": model,
        "message": request.message,
        "messages": messages,
        "temperature": sampling.temperature,
        "max_tokens": sampling.max_tokens,
        "top_p": sampling.top_p,
        "top_k": sampling.top_k,
        "repeat_penalty": sampling.repeat_penalty,
        "tools": request.tools,
        "stream": stream,
    });

    if let Some(map) = payload.as_object_mut() {
        if let Some(system) = &request.system_prompt {
            map.insert("system".to_string(), json!(system));
        }
        if let Some(format) = &request.response_format {
            map.insert("response_format".to_string(), format.clone());
        }
    }
    payload
}

/// Response text from any shape the primary backend emits
///
/// Tried in order: `choices[0].message.content`, `choices[0].delta.content`,
/// `content`, `response`. The first non-empty string wins.
pub fn extract_content(body: &Value) -> Option<String> {
    [
        "/choices/0/message/content",
        "/choices/0/delta/content",
        "/content",
        "/response",
    ]
    .iter()
    .filter_map(|pointer| body.pointer(pointer).and_then(Value::as_str))
    .find(|text| !text.is_empty())
    .map(str::to_string)
}

fn extract_usage(body: &Value) -> Usage {
    let Some(usage) = body.get("usage") else {
        return Usage::default();
    };
    let field = |key: &str| usage.get(key).and_then(Value::as_u64);

    let prompt_tokens = field("prompt_tokens").unwrap_or(0);
    let completion_tokens = field("completion_tokens").unwrap_or(0);
    Usage {
        prompt_tokens,
        completion_tokens,
        total_tokens: field("total_tokens").unwrap_or(prompt_tokens + completion_tokens),
    }
}
