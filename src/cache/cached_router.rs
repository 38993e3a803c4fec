//! [`ChatService`] wrapper that answers repeated requests from a cache

use super::{ResultCache, cache_key};
use crate::backends::ChunkStream;
use crate::error::AppResult;
use crate::metrics::{CacheLookup, Metrics};
use crate::router::{ChatRequest, ChatResult, ChatService, EmbeddingResult};
use async_trait::async_trait;
use serde::Serialize;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub entries: usize,
}

/// Caches successful non-streaming chat results of an inner service
///
/// Streams and embeddings pass straight through.
pub struct CachedRouter {
    inner: Arc<dyn ChatService>,
    cache: Arc<dyn ResultCache>,
    hits: AtomicU64,
    misses: AtomicU64,
    metrics: Option<Arc<Metrics>>,
}

impl CachedRouter {
    pub fn new(inner: Arc<dyn ChatService>, cache: Arc<dyn ResultCache>) -> Self {
        Self {
            inner,
            cache,
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            metrics: None,
        }
    }

    pub fn with_metrics(mut self, metrics: Arc<Metrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            entries: self.cache.len(),
        }
    }

    /// Drop every cached result; counters are kept
    pub fn clear(&self) {
        self.cache.clear();
        tracing::info!("Result cache cleared");
    }

    fn record(&self, lookup: CacheLookup) {
        if let Some(metrics) = &self.metrics {
            metrics.record_cache_lookup(lookup);
        }
    }
}

#[async_trait]
impl ChatService for CachedRouter {
    async fn chat(&self, request: &ChatRequest) -> AppResult<ChatResult> {
        let model = self.inner.resolve_model(request.model.as_deref());
        let key = cache_key(request, &model);

        if request.bypass_cache {
            self.record(CacheLookup::Bypass);
        } else if let Some(cached) = self.cache.get(&key) {
            self.hits.fetch_add(1, Ordering::Relaxed);
            self.record(CacheLookup::Hit);
            tracing::debug!(key = %key, "Result cache hit");
            return Ok(cached);
        } else {
            self.misses.fetch_add(1, Ordering::Relaxed);
            self.record(CacheLookup::Miss);
        }

        let result = self.inner.chat(request).await?;
        self.cache.insert(key, result.clone());
        Ok(result)
    }

    async fn chat_stream(&self, request: &ChatRequest) -> AppResult<ChunkStream> {
        self.inner.chat_stream(request).await
    }

    async fn generate_embeddings(
        &self,
        input: &str,
        model: Option<&str>,
    ) -> AppResult<EmbeddingResult> {
        self.inner.generate_embeddings(input, model).await
    }

    fn resolve_model(&self, requested: Option<&str>) -> String {
        self.inner.resolve_model(requested)
    }
}
