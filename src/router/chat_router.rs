//! Prefix-based router over the two backends

use super::{ChatRequest, ChatResult, ChatService, DEFAULT_MODEL, EmbeddingResult};
use crate::backends::{
    BackendStatus, ChunkStream, OllamaClient, OrchestraClient, Provider, has_primary_prefix,
};
use crate::catalog::CatalogStore;
use crate::config::BackendsConfig;
use crate::error::{AppError, AppResult};
use crate::metrics::{Metrics, Operation, Outcome};
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Instant;

/// Routes requests to Orchestra or Ollama by model name
pub struct ChatRouter {
    catalog: Arc<dyn CatalogStore>,
    orchestra: OrchestraClient,
    ollama: OllamaClient,
    metrics: Option<Arc<Metrics>>,
}

impl ChatRouter {
    pub fn new(
        catalog: Arc<dyn CatalogStore>,
        orchestra: OrchestraClient,
        ollama: OllamaClient,
    ) -> Self {
        Self {
            catalog,
            orchestra,
            ollama,
            metrics: None,
        }
    }

    pub fn from_config(
        config: &BackendsConfig,
        catalog: Arc<dyn CatalogStore>,
        http: reqwest::Client,
    ) -> Self {
        Self::new(
            catalog,
            OrchestraClient::from_config(config, http.clone()),
            OllamaClient::from_config(config, http),
        )
    }

    /// Record backend calls and skipped stream frames in `metrics`
    pub fn with_metrics(mut self, metrics: Arc<Metrics>) -> Self {
        self.orchestra = self.orchestra.with_metrics(metrics.clone());
        self.ollama = self.ollama.with_metrics(metrics.clone());
        self.metrics = Some(metrics);
        self
    }

    /// Resolve the model a request will run on
    ///
    /// An explicit name is used verbatim. Otherwise the first catalog entry
    /// carrying the primary prefix, then the first catalog entry at all, then
    /// [`DEFAULT_MODEL`].
    pub fn select_best_model(&self, requested: Option<&str>) -> String {
        if let Some(model) = requested.map(str::trim).filter(|m| !m.is_empty()) {
            return model.to_string();
        }

        self.catalog
            .first_matching(&|name| has_primary_prefix(name))
            .or_else(|| self.catalog.first_matching(&|_| true))
            .unwrap_or_else(|| DEFAULT_MODEL.to_string())
    }

    /// Probe both backends concurrently
    pub async fn check_backends(&self) -> BackendStatus {
        let (orchestra, ollama) = tokio::join!(self.orchestra.health(), self.ollama.is_available());
        tracing::debug!(orchestra, ollama, "Backend connectivity checked");
        BackendStatus { orchestra, ollama }
    }

    fn record<T>(
        &self,
        provider: Provider,
        operation: Operation,
        started: Instant,
        result: &AppResult<T>,
    ) {
        if let Some(metrics) = &self.metrics {
            metrics.record_backend_request(
                provider,
                operation,
                Outcome::from_result(result),
                started.elapsed().as_secs_f64() * 1000.0,
            );
        }
        if let Err(e) = result {
            tracing::warn!(
                provider = provider.as_str(),
                operation = operation.as_str(),
                error = %e,
                "Backend call failed"
            );
        }
    }
}

#[async_trait]
impl ChatService for ChatRouter {
    fn resolve_model(&self, requested: Option<&str>) -> String {
        self.select_best_model(requested)
    }

    async fn chat(&self, request: &ChatRequest) -> AppResult<ChatResult> {
        request.validate()?;
        let model = self.select_best_model(request.model.as_deref());
        let provider = Provider::for_model(&model);

        tracing::debug!(
            model = %model,
            provider = provider.as_str(),
            request_id = request.request_id.as_deref().unwrap_or("-"),
            "Routing chat request"
        );

        let started = Instant::now();
        let result = match provider {
            Provider::Orchestra => self.orchestra.chat(&model, request).await,
            Provider::Ollama => self.ollama.generate(&model, request).await,
        };
        self.record(provider, Operation::Chat, started, &result);
        result
    }

    async fn chat_stream(&self, request: &ChatRequest) -> AppResult<ChunkStream> {
        request.validate()?;
        let model = self.select_best_model(request.model.as_deref());
        let provider = Provider::for_model(&model);

        tracing::debug!(model = %model, provider = provider.as_str(), "Routing streaming chat request");

        let started = Instant::now();
        let result = match provider {
            Provider::Orchestra => self.orchestra.chat_stream(&model, request).await,
            Provider::Ollama => self.ollama.generate_stream(&model, request).await,
        };
        self.record(provider, Operation::ChatStream, started, &result);
        result
    }

    async fn generate_embeddings(
        &self,
        input: &str,
        model: Option<&str>,
    ) -> AppResult<EmbeddingResult> {
        if input.trim().is_empty() {
            return Err(AppError::Validation(
                "embedding input cannot be empty".to_string(),
            ));
        }
        let model = self.select_best_model(model);
        let provider = Provider::for_model(&model);

        let started = Instant::now();
        let result = match provider {
            Provider::Orchestra => self.orchestra.embeddings(&model, input).await,
            Provider::Ollama => self.ollama.embeddings(&model, input).await,
        };
        self.record(provider, Operation::Embeddings, started, &result);
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{InMemoryCatalog, ModelInfo, ModelSource, ModelType, ModelVariant};
    use std::time::Duration;

    fn entry(name: &str) -> ModelInfo {
        ModelInfo {
            name: name.to_string(),
            path: None,
            size_bytes: 0,
            model_type: ModelType::General,
            available: true,
            source: ModelSource::Scan,
            is_custom: false,
            variant: ModelVariant::None,
        }
    }

    fn router_with(names: &[&str]) -> ChatRouter {
        let catalog = Arc::new(InMemoryCatalog::new());
        for name in names {
            catalog.upsert(entry(name));
        }
        let http = reqwest::Client::new();
        let timeout = Duration::from_secs(1);
        ChatRouter::new(
            catalog,
            OrchestraClient::new(http.clone(), "http://127.0.0.1:9", timeout, timeout),
            OllamaClient::new(http, "http://127.0.0.1:9", timeout, timeout),
        )
    }

    #[test]
    fn test_explicit_model_used_verbatim() {
        let router = router_with(&["bigdaddyg-7b"]);
        assert_eq!(router.select_best_model(Some("llama3:8b")), "llama3:8b");
    }

    #[test]
    fn test_prefers_first_prefixed_catalog_entry() {
        let router = router_with(&["llama3", "BigDaddyG-7b", "bigdaddyg-13b"]);
        assert_eq!(router.select_best_model(None), "BigDaddyG-7b");
    }

    #[test]
    fn test_falls_back_to_first_entry_then_default() {
        assert_eq!(router_with(&["phi3", "llama3"]).select_best_model(None), "phi3");
        assert_eq!(router_with(&[]).select_best_model(None), DEFAULT_MODEL);
        assert_eq!(router_with(&[]).select_best_model(Some("  ")), DEFAULT_MODEL);
    }

    #[tokio::test]
    async fn test_invalid_request_rejected_before_routing() {
        let router = router_with(&[]);
        let err = router
            .chat(&ChatRequest::new(""))
            .await
            .expect_err("empty message must fail");
        assert!(matches!(err, AppError::Validation(_)));
    }

    #[tokio::test]
    async fn test_unreachable_backend_names_provider() {
        let router = router_with(&[]);
        let err = router
            .chat(&ChatRequest::new("hello").with_model("llama3"))
            .await
            .expect_err("nothing listens on port 9");
        match err {
            AppError::ModelUnavailable { model, provider, .. } => {
                assert_eq!(model, "llama3");
                assert_eq!(provider, "ollama");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }
}
