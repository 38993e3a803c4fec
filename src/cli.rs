//! Command-line interface for the bridge binary

use clap::{Parser, Subcommand};

/// Model discovery and chat routing bridge for local LLM backends
#[derive(Parser)]
#[command(name = "bigdaddyg-bridge")]
#[command(version)]
#[command(about = "Model discovery and chat routing bridge for local LLM backends")]
#[command(
    long_about = "Discovers local model files and backend model lists, routes chat and \
    embedding requests to the Orchestra or Ollama backend by model name, and runs a \
    fixed pool of agent slots over the same chat service."
)]
pub struct Cli {
    /// Path to configuration file (defaults apply when it does not exist)
    #[arg(short, long, default_value = "config.toml", global = true)]
    pub config: String,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand, Debug, PartialEq, Eq)]
pub enum Command {
    /// Run the HTTP server (default)
    Serve,

    /// Generate a template configuration file
    Config {
        /// Output file path (prints to stdout if not specified)
        #[arg(short, long)]
        output: Option<String>,
    },

    /// Build the model catalog once and print it as JSON
    Scan,

    /// Download a model into the local model store
    Pull {
        /// Model identifier, e.g. `llama3:8b`
        model: String,
    },

    /// Delete a model from the local model store
    Rm {
        /// Model identifier, e.g. `llama3:8b`
        model: String,
    },
}

/// Generate template configuration content
pub fn generate_config_template() -> &'static str {
    r#"# BigDaddyG Bridge Configuration
# ==============================
#
# Every section and key is optional; the values below are the defaults.
# ORCHESTRA_URL and OLLAMA_URL environment variables override the backend URLs.

# ─────────────────────────────────────────────────────────────────────────────
# SERVER
# ─────────────────────────────────────────────────────────────────────────────

[server]
# IP address to bind to (0.0.0.0 for all interfaces, 127.0.0.1 for localhost only)
host = "127.0.0.1"
port = 11500

# ─────────────────────────────────────────────────────────────────────────────
# BACKENDS
# ─────────────────────────────────────────────────────────────────────────────
#
# Models whose name starts with "bigdaddyg" (any case) go to Orchestra,
# everything else to Ollama. A failing backend is reported, never bypassed.

[backends]
orchestra_url = "http://localhost:11441"
ollama_url = "http://localhost:11434"

# Chat and embedding calls (1-300 seconds)
request_timeout_seconds = 60

# Connectivity probes and the remote model list query (1-300 seconds)
probe_timeout_seconds = 2

# Command used by `pull` / `rm`
ollama_binary = "ollama"

# ─────────────────────────────────────────────────────────────────────────────
# MODEL CATALOG
# ─────────────────────────────────────────────────────────────────────────────

[catalog]
# Scan the usual per-OS model directories (~/.ollama/models, ~/models, ...)
include_platform_paths = true

# Additional directories to scan
extra_roots = []

# JSON descriptor files: an array of {"name": ..., "type": ...} objects,
# or an object with a "models" array. These override scanned entries.
config_files = []

# Add the models reported by Ollama's /api/tags
remote_discovery = true

# Advisory JSON snapshot of the catalog, loaded before discovery
# metadata_cache_path = "model-cache.json"

# ─────────────────────────────────────────────────────────────────────────────
# AGENTS
# ─────────────────────────────────────────────────────────────────────────────

[agents]
max_agents = 200

# Model for code, debug and fix tasks
code_model = "qwen2.5-coder:3b"

# ─────────────────────────────────────────────────────────────────────────────
# RESULT CACHE
# ─────────────────────────────────────────────────────────────────────────────

[cache]
ttl_seconds = 1800
max_entries = 100

# ─────────────────────────────────────────────────────────────────────────────
# OBSERVABILITY
# ─────────────────────────────────────────────────────────────────────────────

[observability]
# Log level: "trace", "debug", "info", "warn", "error" (RUST_LOG takes precedence)
log_level = "info"

# Prometheus metrics are always available at /metrics on the server port
"#
}
