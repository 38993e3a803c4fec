//! Catalog construction from all discovery sources
//!
//! Sources are applied in a fixed order so that later ones overwrite earlier
//! ones for the same name:
//!
//! 1. advisory metadata cache (if configured)
//! 2. filesystem scan of existing candidate directories
//! 3. static JSON descriptor files
//! 4. the secondary backend's `/api/tags` model list
//!
//! Every source degrades to "contributes nothing" on error. [`CatalogBuilder::build`]
//! never fails.

use super::{
    CatalogStore, DiscoveryError, MetadataCache, ModelInfo, ModelSource, ModelType, ModelVariant,
    detect_variant, discover_candidate_paths, is_custom_model, platform_candidate_paths,
    scan_directory,
};
use crate::config::{BackendsConfig, CatalogConfig};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Summary of one catalog build
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BuildReport {
    pub cached: usize,
    pub roots_scanned: usize,
    pub scanned: usize,
    pub config_models: usize,
    pub remote_models: usize,
    /// Why the remote query contributed nothing, if it failed
    pub remote_error: Option<String>,
    pub total: usize,
}

#[derive(Debug, Clone)]
struct RemoteSource {
    url: String,
    timeout: Duration,
}

/// Builds a catalog from the configured sources
#[derive(Debug, Clone)]
pub struct CatalogBuilder {
    include_platform_paths: bool,
    extra_roots: Vec<PathBuf>,
    config_files: Vec<PathBuf>,
    remote: Option<RemoteSource>,
    metadata_cache: Option<MetadataCache>,
    http: reqwest::Client,
}

impl CatalogBuilder {
    /// Builder with no sources; add them with the `with_*` methods
    pub fn new(http: reqwest::Client) -> Self {
        Self {
            include_platform_paths: false,
            extra_roots: Vec::new(),
            config_files: Vec::new(),
            remote: None,
            metadata_cache: None,
            http,
        }
    }

    /// Builder configured from the `[catalog]` and `[backends]` sections
    pub fn from_config(
        catalog: &CatalogConfig,
        backends: &BackendsConfig,
        http: reqwest::Client,
    ) -> Self {
        let mut builder = Self::new(http)
            .with_platform_paths(catalog.include_platform_paths)
            .with_roots(catalog.extra_roots.clone())
            .with_config_files(catalog.config_files.clone());

        if catalog.remote_discovery {
            builder = builder.with_remote(&backends.ollama_url, backends.probe_timeout());
        }
        if let Some(path) = &catalog.metadata_cache_path {
            builder = builder.with_metadata_cache(MetadataCache::new(path.clone()));
        }
        builder
    }

    pub fn with_platform_paths(mut self, enabled: bool) -> Self {
        self.include_platform_paths = enabled;
        self
    }

    pub fn with_roots(mut self, roots: Vec<PathBuf>) -> Self {
        self.extra_roots = roots;
        self
    }

    pub fn with_config_files(mut self, files: Vec<PathBuf>) -> Self {
        self.config_files = files;
        self
    }

    /// Query `{base_url}/api/tags` during the build
    pub fn with_remote(mut self, base_url: &str, timeout: Duration) -> Self {
        self.remote = Some(RemoteSource {
            url: format!("{}/api/tags", base_url.trim_end_matches('/')),
            timeout,
        });
        self
    }

    pub fn with_metadata_cache(mut self, cache: MetadataCache) -> Self {
        self.metadata_cache = Some(cache);
        self
    }

    /// Candidate directories that exist right now
    pub fn candidate_roots(&self) -> Vec<PathBuf> {
        let mut candidates = Vec::new();
        if self.include_platform_paths {
            candidates.extend(platform_candidate_paths());
        }
        candidates.extend(self.extra_roots.iter().cloned());
        discover_candidate_paths(&candidates)
    }

    /// Populate `store` from every source
    pub async fn build(&self, store: &dyn CatalogStore) -> BuildReport {
        let mut report = BuildReport::default();

        if let Some(cache) = &self.metadata_cache {
            for model in cache.load().await {
                store.upsert(model);
                report.cached += 1;
            }
        }

        let roots = self.candidate_roots();
        report.roots_scanned = roots.len();
        for root in &roots {
            let models = scan_directory(root, 0).await;
            tracing::debug!(root = %root.display(), models = models.len(), "Scanned model directory");
            report.scanned += models.len();
            for model in models {
                store.upsert(model);
            }
        }

        for file in &self.config_files {
            match load_config_file(file).await {
                Ok(models) => {
                    report.config_models += models.len();
                    for model in models {
                        store.upsert(model);
                    }
                }
                Err(e) => {
                    tracing::warn!(error = %e, "Skipping model descriptor file");
                }
            }
        }

        if self.remote.is_some() {
            match self.load_remote_catalog().await {
                Ok(models) => {
                    report.remote_models = models.len();
                    for model in models {
                        store.upsert(model);
                    }
                }
                Err(e) => {
                    tracing::info!(error = %e, "Remote model list unavailable, continuing without it");
                    report.remote_error = Some(e.to_string());
                }
            }
        }

        report.total = store.len();

        if let Some(cache) = &self.metadata_cache {
            cache.save(&store.list()).await;
        }

        tracing::info!(
            total = report.total,
            cached = report.cached,
            scanned = report.scanned,
            roots = report.roots_scanned,
            config_models = report.config_models,
            remote_models = report.remote_models,
            "Model catalog built"
        );

        report
    }

    /// Models reported by the secondary backend's list endpoint
    pub async fn load_remote_catalog(&self) -> Result<Vec<ModelInfo>, DiscoveryError> {
        let Some(remote) = &self.remote else {
            return Ok(Vec::new());
        };
        let remote_err = |reason: String| DiscoveryError::Remote {
            url: remote.url.clone(),
            reason,
        };

        let response = self
            .http
            .get(&remote.url)
            .timeout(remote.timeout)
            .send()
            .await
            .map_err(|e| remote_err(e.to_string()))?;

        if !response.status().is_success() {
            return Err(remote_err(format!("HTTP {}", response.status())));
        }

        let tags: TagsResponse = response
            .json()
            .await
            .map_err(|e| remote_err(format!("invalid response body: {}", e)))?;

        Ok(tags
            .models
            .into_iter()
            .filter(|m| !m.name.trim().is_empty())
            .map(|m| ModelInfo {
                is_custom: is_custom_model(&m.name),
                variant: detect_variant(&m.name),
                name: m.name,
                path: None,
                size_bytes: m.size,
                model_type: ModelType::Ollama,
                available: true,
                source: ModelSource::OllamaApi,
            })
            .collect())
    }
}

#[derive(Debug, Deserialize)]
struct TagsResponse {
    #[serde(default)]
    models: Vec<TagModel>,
}

#[derive(Debug, Deserialize)]
struct TagModel {
    name: String,
    #[serde(default)]
    size: u64,
}

/// Parse a static JSON descriptor file
///
/// Accepts a bare array of descriptors or an object with a `models` array.
/// Descriptors without a string `name` are skipped.
pub async fn load_config_file(path: &Path) -> Result<Vec<ModelInfo>, DiscoveryError> {
    let content = tokio::fs::read_to_string(path)
        .await
        .map_err(|source| DiscoveryError::Io {
            path: path.display().to_string(),
            source,
        })?;

    let invalid = |reason: &str| DiscoveryError::InvalidDescriptor {
        path: path.display().to_string(),
        reason: reason.to_string(),
    };

    let root: Value = serde_json::from_str(&content).map_err(|e| invalid(&e.to_string()))?;
    let entries = match &root {
        Value::Array(items) => items,
        Value::Object(map) => match map.get("models") {
            Some(Value::Array(items)) => items,
            _ => return Err(invalid("expected a `models` array")),
        },
        _ => return Err(invalid("expected an array or an object")),
    };

    let models: Vec<ModelInfo> = entries.iter().filter_map(descriptor_to_model).collect();
    if models.len() < entries.len() {
        tracing::debug!(
            path = %path.display(),
            skipped = entries.len() - models.len(),
            "Skipped descriptors without a name"
        );
    }
    Ok(models)
}

fn descriptor_to_model(value: &Value) -> Option<ModelInfo> {
    let name = value.get("name")?.as_str()?.trim();
    if name.is_empty() {
        return None;
    }

    let enum_field = |key: &str| value.get(key).cloned();
    let model_type = enum_field("type")
        .and_then(|v| serde_json::from_value::<ModelType>(v).ok())
        .unwrap_or(ModelType::Configured);
    let variant = enum_field("variant")
        .and_then(|v| serde_json::from_value::<ModelVariant>(v).ok())
        .unwrap_or_else(|| detect_variant(name));

    Some(ModelInfo {
        name: name.to_string(),
        path: value.get("path").and_then(Value::as_str).map(PathBuf::from),
        size_bytes: value
            .get("size_bytes")
            .or_else(|| value.get("size"))
            .and_then(Value::as_u64)
            .unwrap_or(0),
        model_type,
        available: value
            .get("available")
            .and_then(Value::as_bool)
            .unwrap_or(true),
        source: ModelSource::ConfigFile,
        is_custom: value
            .get("is_custom")
            .or_else(|| value.get("isCustom"))
            .and_then(Value::as_bool)
            .unwrap_or_else(|| is_custom_model(name)),
        variant,
    })
}
