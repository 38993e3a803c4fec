//! Model catalog
//!
//! Best-effort inventory of locally available models, built from a filesystem
//! scan, static JSON descriptor files, and the secondary backend's model list.
//! The catalog is a name → [`ModelInfo`] map; later registrations of a name
//! overwrite earlier ones.

pub mod builder;
pub mod classify;
pub mod disk_cache;
pub mod scan;

pub use builder::{BuildReport, CatalogBuilder, load_config_file};
pub use classify::{
    BLOB_MARKER, BLOB_NAME_PREFIX, MODEL_EXTENSIONS, MODEL_KEYWORDS, detect_model_type,
    detect_variant, extract_model_name, is_custom_model, is_model_file,
};
pub use disk_cache::MetadataCache;
pub use scan::{MAX_SCAN_DEPTH, discover_candidate_paths, platform_candidate_paths, scan_directory};

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::{PoisonError, RwLock};
use thiserror::Error;

/// Classification of a model artifact
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum ModelType {
    #[default]
    General,
    Code,
    Chat,
    Instruction,
    Embedding,
    Multimodal,
    CustomTrained,
    Ollama,
    Configured,
}

/// Where a catalog entry came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum ModelSource {
    Scan,
    ConfigFile,
    OllamaApi,
}

impl ModelSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Scan => "scan",
            Self::ConfigFile => "config-file",
            Self::OllamaApi => "ollama-api",
        }
    }
}

/// Product variant encoded in a model name
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ModelVariant {
    Twinsie,
    Mini,
    Stealth,
    Cheetah,
    Custom,
    #[default]
    None,
}

/// One discoverable or reported model
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct ModelInfo {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<PathBuf>,
    #[serde(default)]
    pub size_bytes: u64,
    #[serde(rename = "type")]
    pub model_type: ModelType,
    pub available: bool,
    pub source: ModelSource,
    #[serde(default)]
    pub is_custom: bool,
    #[serde(default)]
    pub variant: ModelVariant,
}

impl ModelInfo {
    /// Build an entry for a file found by the filesystem scan
    pub fn from_scanned_file(path: PathBuf, size_bytes: u64) -> Self {
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let name = extract_model_name(&file_name);
        let path_text = path.to_string_lossy().into_owned();

        Self {
            is_custom: is_custom_model(&name),
            variant: detect_variant(&name),
            model_type: detect_model_type(&path_text),
            name,
            path: Some(path),
            size_bytes,
            available: true,
            source: ModelSource::Scan,
        }
    }
}

/// Failure of a single discovery step
///
/// Never escapes the catalog builder: each source collapses its errors to
/// "contributes nothing" after logging.
#[derive(Error, Debug)]
pub enum DiscoveryError {
    #[error("I/O error at {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid model descriptor file {path}: {reason}")]
    InvalidDescriptor { path: String, reason: String },

    #[error("Remote catalog request to {url} failed: {reason}")]
    Remote { url: String, reason: String },
}

/// Storage seam for the catalog map
///
/// Iteration order is registration order; overwriting a name keeps its
/// original position.
pub trait CatalogStore: Send + Sync {
    /// Insert or overwrite the entry for `model.name`
    fn upsert(&self, model: ModelInfo);

    fn get(&self, name: &str) -> Option<ModelInfo>;

    fn list(&self) -> Vec<ModelInfo>;

    fn names(&self) -> Vec<String> {
        self.list().into_iter().map(|m| m.name).collect()
    }

    /// First entry (in iteration order) whose name satisfies `predicate`
    fn first_matching(&self, predicate: &dyn Fn(&str) -> bool) -> Option<String>;

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn clear(&self);

    /// Swap in a complete new set of entries in one step
    ///
    /// Readers see either the old entries or the new ones, never a mix.
    fn replace_all(&self, models: Vec<ModelInfo>);
}

/// Process-local catalog backed by an insertion-ordered map
#[derive(Debug, Default)]
pub struct InMemoryCatalog {
    models: RwLock<IndexMap<String, ModelInfo>>,
}

impl InMemoryCatalog {
    pub fn new() -> Self {
        Self::default()
    }
}

impl CatalogStore for InMemoryCatalog {
    fn upsert(&self, model: ModelInfo) {
        let mut models = self.models.write().unwrap_or_else(PoisonError::into_inner);
        if let Some(previous) = models.get(&model.name) {
            tracing::trace!(
                model = %model.name,
                previous_source = previous.source.as_str(),
                new_source = model.source.as_str(),
                "Overwriting catalog entry"
            );
        }
        models.insert(model.name.clone(), model);
    }

    fn get(&self, name: &str) -> Option<ModelInfo> {
        let models = self.models.read().unwrap_or_else(PoisonError::into_inner);
        models.get(name).cloned()
    }

    fn list(&self) -> Vec<ModelInfo> {
        let models = self.models.read().unwrap_or_else(PoisonError::into_inner);
        models.values().cloned().collect()
    }

    fn first_matching(&self, predicate: &dyn Fn(&str) -> bool) -> Option<String> {
        let models = self.models.read().unwrap_or_else(PoisonError::into_inner);
        models.keys().find(|name| predicate(name)).cloned()
    }

    fn len(&self) -> usize {
        self.models
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    fn clear(&self) {
        self.models
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }

    fn replace_all(&self, models: Vec<ModelInfo>) {
        let mut fresh = IndexMap::with_capacity(models.len());
        for model in models {
            fresh.insert(model.name.clone(), model);
        }
        *self.models.write().unwrap_or_else(PoisonError::into_inner) = fresh;
    }
}
