//! Configuration management for the bridge
//!
//! Parses TOML configuration files and provides typed access to settings.
//! Every section is optional; backend URLs can be overridden through the
//! `ORCHESTRA_URL` and `OLLAMA_URL` environment variables.

use crate::error::{AppError, AppResult};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

/// Environment variable overriding the primary backend URL
pub const ORCHESTRA_URL_ENV: &str = "ORCHESTRA_URL";

/// Environment variable overriding the secondary backend URL
pub const OLLAMA_URL_ENV: &str = "OLLAMA_URL";

/// Upper bound for every configurable timeout, in seconds
const MAX_TIMEOUT_SECONDS: u64 = 300;

/// Root configuration structure
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub backends: BackendsConfig,
    #[serde(default)]
    pub catalog: CatalogConfig,
    #[serde(default)]
    pub agents: AgentsConfig,
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default)]
    pub observability: ObservabilityConfig,
}

/// HTTP façade configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    11500
}

/// Backend endpoints and timeouts
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct BackendsConfig {
    /// Primary ("Orchestra") backend base URL
    #[serde(default = "default_orchestra_url")]
    pub orchestra_url: String,
    /// Secondary (Ollama-compatible) backend base URL
    #[serde(default = "default_ollama_url")]
    pub ollama_url: String,
    /// Timeout for chat and embedding calls
    #[serde(default = "default_request_timeout")]
    pub request_timeout_seconds: u64,
    /// Timeout for connectivity probes and the remote catalog query
    #[serde(default = "default_probe_timeout")]
    pub probe_timeout_seconds: u64,
    /// Command used for `pull`/`rm` model lifecycle operations
    #[serde(default = "default_ollama_binary")]
    pub ollama_binary: String,
}

impl Default for BackendsConfig {
    fn default() -> Self {
        Self {
            orchestra_url: default_orchestra_url(),
            ollama_url: default_ollama_url(),
            request_timeout_seconds: default_request_timeout(),
            probe_timeout_seconds: default_probe_timeout(),
            ollama_binary: default_ollama_binary(),
        }
    }
}

impl BackendsConfig {
    /// Timeout applied to chat and embedding requests
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_seconds)
    }

    /// Timeout applied to probes and catalog queries
    pub fn probe_timeout(&self) -> Duration {
        Duration::from_secs(self.probe_timeout_seconds)
    }
}

fn default_orchestra_url() -> String {
    "http://localhost:11441".to_string()
}

fn default_ollama_url() -> String {
    "http://localhost:11434".to_string()
}

fn default_request_timeout() -> u64 {
    60
}

fn default_probe_timeout() -> u64 {
    2
}

fn default_ollama_binary() -> String {
    if cfg!(windows) {
        "ollama.exe".to_string()
    } else {
        "ollama".to_string()
    }
}

/// Model catalog discovery settings
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CatalogConfig {
    /// Scan the built-in OS-specific candidate directories
    #[serde(default = "default_true")]
    pub include_platform_paths: bool,
    /// Additional directories to scan
    #[serde(default)]
    pub extra_roots: Vec<PathBuf>,
    /// Static JSON model descriptor files
    #[serde(default)]
    pub config_files: Vec<PathBuf>,
    /// Query the secondary backend's model list during the build
    #[serde(default = "default_true")]
    pub remote_discovery: bool,
    /// Advisory on-disk metadata cache
    #[serde(default)]
    pub metadata_cache_path: Option<PathBuf>,
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            include_platform_paths: true,
            extra_roots: Vec::new(),
            config_files: Vec::new(),
            remote_discovery: true,
            metadata_cache_path: None,
        }
    }
}

fn default_true() -> bool {
    true
}

/// Agent pool settings
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AgentsConfig {
    #[serde(default = "default_max_agents")]
    pub max_agents: usize,
    /// Model used for code, debug and fix tasks
    #[serde(default = "default_code_model")]
    pub code_model: String,
}

impl Default for AgentsConfig {
    fn default() -> Self {
        Self {
            max_agents: default_max_agents(),
            code_model: default_code_model(),
        }
    }
}

fn default_max_agents() -> usize {
    200
}

fn default_code_model() -> String {
    "qwen2.5-coder:3b".to_string()
}

/// Result cache settings
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CacheConfig {
    #[serde(default = "default_ttl_seconds")]
    pub ttl_seconds: u64,
    #[serde(default = "default_max_entries")]
    pub max_entries: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            ttl_seconds: default_ttl_seconds(),
            max_entries: default_max_entries(),
        }
    }
}

impl CacheConfig {
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_seconds)
    }
}

fn default_ttl_seconds() -> u64 {
    30 * 60
}

fn default_max_entries() -> usize {
    100
}

/// Observability configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ObservabilityConfig {
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Config {
    /// Load configuration from a TOML file
    ///
    /// Environment overrides are applied after parsing and before validation.
    pub fn from_file<P: AsRef<Path>>(path: P) -> AppResult<Self> {
        let path_display = path.as_ref().display().to_string();

        let content = std::fs::read_to_string(path.as_ref()).map_err(|source| {
            AppError::ConfigFileRead {
                path: path_display.clone(),
                source,
            }
        })?;

        let mut config: Self =
            toml::from_str(&content).map_err(|source| AppError::ConfigParseFailed {
                path: path_display.clone(),
                source,
            })?;

        config.apply_env_overrides();

        config
            .validate()
            .map_err(|e| AppError::ConfigValidationFailed {
                path: path_display,
                reason: e.to_string(),
            })?;

        Ok(config)
    }

    /// Load configuration from `path` if it exists, otherwise use defaults
    ///
    /// A missing file is not an error: the bridge runs with built-in defaults
    /// plus environment overrides.
    pub fn load_or_default<P: AsRef<Path>>(path: P) -> AppResult<Self> {
        if path.as_ref().exists() {
            return Self::from_file(path);
        }

        tracing::info!(
            path = %path.as_ref().display(),
            "Config file not found, using defaults"
        );
        let mut config = Self::default();
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// Apply `ORCHESTRA_URL` / `OLLAMA_URL` from the process environment
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides_from(|key| std::env::var(key).ok());
    }

    /// Apply backend URL overrides from an arbitrary lookup
    ///
    /// Empty values are ignored.
    pub fn apply_overrides_from<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(url) = lookup(ORCHESTRA_URL_ENV).filter(|v| !v.trim().is_empty()) {
            tracing::debug!(url = %url, "Primary backend URL overridden from environment");
            self.backends.orchestra_url = url.trim().to_string();
        }
        if let Some(url) = lookup(OLLAMA_URL_ENV).filter(|v| !v.trim().is_empty()) {
            tracing::debug!(url = %url, "Secondary backend URL overridden from environment");
            self.backends.ollama_url = url.trim().to_string();
        }
    }

    /// Validate configuration after parsing
    pub fn validate(&self) -> AppResult<()> {
        for (name, url) in [
            ("backends.orchestra_url", &self.backends.orchestra_url),
            ("backends.ollama_url", &self.backends.ollama_url),
        ] {
            if !url.starts_with("http://") && !url.starts_with("https://") {
                return Err(AppError::Config(format!(
                    "{} has invalid value '{}'. URLs must start with 'http://' or 'https://'.",
                    name, url
                )));
            }
        }

        for (name, timeout) in [
            (
                "backends.request_timeout_seconds",
                self.backends.request_timeout_seconds,
            ),
            (
                "backends.probe_timeout_seconds",
                self.backends.probe_timeout_seconds,
            ),
        ] {
            if timeout == 0 {
                return Err(AppError::Config(format!(
                    "{} must be greater than 0",
                    name
                )));
            }
            if timeout > MAX_TIMEOUT_SECONDS {
                return Err(AppError::Config(format!(
                    "{} cannot exceed {} seconds, got {}",
                    name, MAX_TIMEOUT_SECONDS, timeout
                )));
            }
        }

        if self.backends.ollama_binary.trim().is_empty() {
            return Err(AppError::Config(
                "backends.ollama_binary cannot be empty".to_string(),
            ));
        }

        if self.agents.max_agents == 0 {
            return Err(AppError::Config(
                "agents.max_agents must be greater than 0".to_string(),
            ));
        }

        if self.agents.code_model.trim().is_empty() {
            return Err(AppError::Config(
                "agents.code_model cannot be empty".to_string(),
            ));
        }

        if self.cache.ttl_seconds == 0 {
            return Err(AppError::Config(
                "cache.ttl_seconds must be greater than 0".to_string(),
            ));
        }

        if self.cache.max_entries == 0 {
            return Err(AppError::Config(
                "cache.max_entries must be greater than 0".to_string(),
            ));
        }

        Ok(())
    }
}

impl FromStr for Config {
    type Err = AppError;

    fn from_str(toml_str: &str) -> Result<Self, Self::Err> {
        let config: Config =
            toml::from_str(toml_str).map_err(|source| AppError::ConfigParseFailed {
                path: "<string>".to_string(),
                source,
            })?;

        config.validate()?;
        Ok(config)
    }
}
