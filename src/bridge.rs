//! Top-level service object
//!
//! [`Bridge`] owns every shared component: catalog, router, result cache,
//! agent pool and lifecycle helper. It is built once at startup and handed to
//! the HTTP layer or CLI explicitly.

use crate::agents::AgentPool;
use crate::backends::{BackendStatus, ModelLifecycle};
use crate::cache::{CachedRouter, InMemoryResultCache};
use crate::catalog::{BuildReport, CatalogBuilder, CatalogStore, InMemoryCatalog};
use crate::config::Config;
use crate::error::{AppError, AppResult};
use crate::metrics::Metrics;
use crate::router::ChatRouter;
use std::sync::Arc;

pub struct Bridge {
    config: Arc<Config>,
    metrics: Arc<Metrics>,
    catalog: Arc<InMemoryCatalog>,
    catalog_builder: CatalogBuilder,
    router: Arc<ChatRouter>,
    cached: Arc<CachedRouter>,
    agents: Arc<AgentPool>,
    lifecycle: ModelLifecycle,
}

impl Bridge {
    /// Wire up all components and build the catalog once
    ///
    /// Only construction of the metrics registry or HTTP client can fail;
    /// discovery problems leave the catalog partially or completely empty.
    pub async fn initialize(config: Config) -> AppResult<Self> {
        let bridge = Self::new(config)?;
        bridge.build_catalog().await;
        Ok(bridge)
    }

    /// Wire up all components without running discovery
    pub fn new(config: Config) -> AppResult<Self> {
        let config = Arc::new(config);

        let metrics = Arc::new(
            Metrics::new()
                .map_err(|e| AppError::Internal(format!("Failed to create metrics: {}", e)))?,
        );

        let http = reqwest::Client::builder()
            .build()
            .map_err(|e| AppError::Internal(format!("Failed to create HTTP client: {}", e)))?;

        let catalog = Arc::new(InMemoryCatalog::new());
        let catalog_builder =
            CatalogBuilder::from_config(&config.catalog, &config.backends, http.clone());

        let router = Arc::new(
            ChatRouter::from_config(&config.backends, catalog.clone(), http)
                .with_metrics(metrics.clone()),
        );
        let cached = Arc::new(
            CachedRouter::new(
                router.clone(),
                Arc::new(InMemoryResultCache::from_config(&config.cache)),
            )
            .with_metrics(metrics.clone()),
        );
        let agents = Arc::new(AgentPool::from_config(&config.agents).with_metrics(metrics.clone()));
        let lifecycle = ModelLifecycle::from_config(&config.backends);

        tracing::info!(
            orchestra_url = %config.backends.orchestra_url,
            ollama_url = %config.backends.ollama_url,
            max_agents = config.agents.max_agents,
            cache_ttl_seconds = config.cache.ttl_seconds,
            cache_max_entries = config.cache.max_entries,
            "Bridge components initialized"
        );

        Ok(Self {
            config,
            metrics,
            catalog,
            catalog_builder,
            router,
            cached,
            agents,
            lifecycle,
        })
    }

    /// Run discovery into a staging catalog, then swap it in
    ///
    /// The live catalog keeps serving its previous entries while discovery
    /// awaits the filesystem and the remote backend.
    async fn build_catalog(&self) -> BuildReport {
        let staging = InMemoryCatalog::new();
        let report = self.catalog_builder.build(&staging).await;
        self.catalog.replace_all(staging.list());
        self.metrics.set_catalog_models(report.total);
        report
    }

    /// Replace the catalog with the result of a fresh discovery run
    pub async fn rebuild_catalog(&self) -> BuildReport {
        tracing::info!("Rebuilding model catalog");
        self.build_catalog().await
    }

    pub async fn check_backends(&self) -> BackendStatus {
        self.router.check_backends().await
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn metrics(&self) -> &Arc<Metrics> {
        &self.metrics
    }

    pub fn catalog(&self) -> &dyn CatalogStore {
        self.catalog.as_ref()
    }

    /// Uncached router, for model selection and backend probes
    pub fn router(&self) -> &ChatRouter {
        &self.router
    }

    /// Chat service used by requests and agent tasks
    pub fn chat(&self) -> &CachedRouter {
        &self.cached
    }

    pub fn agents(&self) -> &AgentPool {
        &self.agents
    }

    pub fn lifecycle(&self) -> &ModelLifecycle {
        &self.lifecycle
    }
}
