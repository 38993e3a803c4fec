//! Client for the secondary (Ollama-compatible) backend
//!
//! Uses the native generate API. Context turns are folded into the prompt as
//! `role: content` lines since `/api/generate` takes a single prompt string.

use super::stream::{ChunkStream, NdjsonDecoder, decode_stream};
use super::{
    Provider, describe_error_response, embedding_failed, endpoint_url, extract_embedding,
    model_unavailable, open_stream,
};
use crate::config::BackendsConfig;
use crate::error::AppResult;
use crate::metrics::Metrics;
use crate::router::{ChatRequest, ChatResult, EmbeddingResult, Usage};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use std::sync::Arc;
use std::time::Duration;

const PROVIDER: Provider = Provider::Ollama;

/// Sampling options in the generate API's naming
#[derive(Debug, Serialize)]
struct GenerateOptions {
    temperature: f64,
    num_predict: u32,
    top_p: f64,
    top_k: u32,
    repeat_penalty: f64,
}

#[derive(Debug, Serialize)]
struct GeneratePayload<'a> {
    model: &'a str,
    prompt: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<&'a str>,
    stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    format: Option<&'a Value>,
    options: GenerateOptions,
}

impl<'a> GeneratePayload<'a> {
    fn new(model: &'a str, request: &'a ChatRequest, stream: bool) -> Self {
        let sampling = &request.sampling;
        Self {
            model,
            prompt: fold_prompt(request),
            system: request.system_prompt.as_deref(),
            stream,
            format: request.response_format.as_ref(),
            options: GenerateOptions {
                temperature: sampling.temperature,
                num_predict: sampling.max_tokens,
                top_p: sampling.top_p,
                top_k: sampling.top_k,
                repeat_penalty: sampling.repeat_penalty,
            },
        }
    }
}

/// Non-streaming generate response
#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    response: String,
    #[serde(default)]
    prompt_eval_count: u64,
    #[serde(default)]
    eval_count: u64,
}

/// HTTP client for the secondary backend
#[derive(Clone)]
pub struct OllamaClient {
    http: reqwest::Client,
    base_url: String,
    request_timeout: Duration,
    probe_timeout: Duration,
    metrics: Option<Arc<Metrics>>,
}

impl OllamaClient {
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
            config.ollama_url.clone(),
            config.request_timeout(),
            config.probe_timeout(),
        )
    }

    pub fn with_metrics(mut self, metrics: Arc<Metrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Whether `GET /api/tags` answers 2xx within the probe timeout
    pub async fn is_available(&self) -> bool {
        let url = endpoint_url(&self.base_url, "/api/tags");
        match self.http.get(&url).timeout(self.probe_timeout).send().await {
            Ok(response) => {
                let healthy = response.status().is_success();
                tracing::debug!(url = %url, status = %response.status(), healthy, "Ollama probe completed");
                healthy
            }
            Err(e) => {
                tracing::debug!(url = %url, error = %e, "Ollama probe failed");
                false
            }
        }
    }

    pub async fn generate(&self, model: &str, request: &ChatRequest) -> AppResult<ChatResult> {
        let url = endpoint_url(&self.base_url, "/api/generate");
        let response = self
            .http
            .post(&url)
            .timeout(self.request_timeout)
            .json(&GeneratePayload::new(model, request, false))
            .send()
            .await
            .map_err(|e| model_unavailable(model, PROVIDER, e.to_string()))?;

        if !response.status().is_success() {
            let reason = describe_error_response(response).await;
            return Err(model_unavailable(model, PROVIDER, reason));
        }

        let body: GenerateResponse = response
            .json()
            .await
            .map_err(|e| model_unavailable(model, PROVIDER, format!("invalid response body: {}", e)))?;

        if body.response.is_empty() {
            return Err(model_unavailable(model, PROVIDER, "response contained no content"));
        }

        Ok(ChatResult {
            content: body.response,
            usage: Usage::new(body.prompt_eval_count, body.eval_count),
            model: model.to_string(),
            provider: PROVIDER,
            timestamp: chrono::Utc::now(),
        })
    }

    pub async fn generate_stream(
        &self,
        model: &str,
        request: &ChatRequest,
    ) -> AppResult<ChunkStream> {
        let url = endpoint_url(&self.base_url, "/api/generate");
        let response = open_stream(
            self.http
                .post(&url)
                .json(&GeneratePayload::new(model, request, true)),
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
            NdjsonDecoder::new(),
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

/// Context turns as `role: content` lines followed by the user message
fn fold_prompt(request: &ChatRequest) -> String {
    if request.context.is_empty() {
        return request.message.clone();
    }

    let mut prompt: Vec<String> = request
        .context
        .iter()
        .map(|turn| format!("{}: {}", turn.role, turn.content))
        .collect();
    prompt.push(format!("user: {}", request.message));
    prompt.join("\n")
}
