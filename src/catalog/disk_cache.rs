//! Advisory on-disk copy of the catalog
//!
//! The cache only seeds a catalog build; live sources always overwrite it.
//! Read failures fall back to an empty cache and write failures are logged.

use super::{DiscoveryError, ModelInfo};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize, Serialize)]
struct CacheFile {
    saved_at: chrono::DateTime<chrono::Utc>,
    models: Vec<ModelInfo>,
}

/// JSON file holding the last built catalog
#[derive(Debug, Clone)]
pub struct MetadataCache {
    path: PathBuf,
}

impl MetadataCache {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Cached entries, or nothing if the file is missing or unreadable
    ///
    /// Entries whose file no longer exists are returned as unavailable.
    pub async fn load(&self) -> Vec<ModelInfo> {
        match self.try_load().await {
            Ok(mut models) => {
                for model in &mut models {
                    if let Some(path) = &model.path {
                        if tokio::fs::metadata(path).await.is_err() {
                            model.available = false;
                        }
                    }
                }
                tracing::debug!(
                    path = %self.path.display(),
                    models = models.len(),
                    "Loaded model metadata cache"
                );
                models
            }
            Err(e) => {
                tracing::debug!(error = %e, "Model metadata cache unavailable, starting empty");
                Vec::new()
            }
        }
    }

    async fn try_load(&self) -> Result<Vec<ModelInfo>, DiscoveryError> {
        let content =
            tokio::fs::read_to_string(&self.path)
                .await
                .map_err(|source| DiscoveryError::Io {
                    path: self.path.display().to_string(),
                    source,
                })?;
        let file: CacheFile =
            serde_json::from_str(&content).map_err(|e| DiscoveryError::InvalidDescriptor {
                path: self.path.display().to_string(),
                reason: e.to_string(),
            })?;
        Ok(file.models)
    }

    /// Persist `models`, logging instead of failing
    pub async fn save(&self, models: &[ModelInfo]) {
        let file = CacheFile {
            saved_at: chrono::Utc::now(),
            models: models.to_vec(),
        };

        let json = match serde_json::to_string_pretty(&file) {
            Ok(json) => json,
            Err(e) => {
                tracing::warn!(error = %e, "Failed to serialize model metadata cache");
                return;
            }
        };

        if let Some(parent) = self.path.parent() {
            if let Err(e) = tokio::fs::create_dir_all(parent).await {
                tracing::warn!(
                    path = %parent.display(),
                    error = %e,
                    "Failed to create model metadata cache directory"
                );
                return;
            }
        }

        match tokio::fs::write(&self.path, json).await {
            Ok(()) => tracing::debug!(
                path = %self.path.display(),
                models = models.len(),
                "Saved model metadata cache"
            ),
            Err(e) => tracing::warn!(
                path = %self.path.display(),
                error = %e,
                "Failed to write model metadata cache"
            ),
        }
    }
}
