//! Model lifecycle via the local `ollama` command
//!
//! `pull` and `rm` run as subprocesses with a hard timeout. Nothing here
//! returns an error: every failure becomes a [`CommandOutcome`] with
//! `success == false`.

use crate::config::BackendsConfig;
use regex::Regex;
use serde::Serialize;
use std::process::Stdio;
use std::sync::LazyLock;
use std::time::Duration;
use tokio::process::Command;

/// Default subprocess timeout
pub const COMMAND_TIMEOUT: Duration = Duration::from_secs(60);

/// Longest accepted model identifier, in characters
pub const MAX_MODEL_IDENTIFIER_LENGTH: usize = 128;

static MODEL_IDENTIFIER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[A-Za-z0-9._:@/-]+$").expect("model identifier pattern is valid")
});

/// Result of one lifecycle command
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CommandOutcome {
    pub success: bool,
    pub model: String,
    pub output: String,
    pub error: String,
}

impl CommandOutcome {
    fn failed(model: &str, error: impl Into<String>) -> Self {
        Self {
            success: false,
            model: model.to_string(),
            output: String::new(),
            error: error.into(),
        }
    }
}

/// Trim and check a model identifier before it reaches a command line
pub fn sanitize_model_identifier(raw: &str) -> Result<String, String> {
    let model = raw.trim();
    if model.is_empty() {
        return Err("model name is required".to_string());
    }
    if model.chars().count() > MAX_MODEL_IDENTIFIER_LENGTH {
        return Err(format!(
            "model name exceeds {} characters",
            MAX_MODEL_IDENTIFIER_LENGTH
        ));
    }
    if model.starts_with('-') {
        return Err(format!("model name '{}' must not start with '-'", model));
    }
    if !MODEL_IDENTIFIER.is_match(model) {
        return Err(format!("model name '{}' contains invalid characters", model));
    }
    Ok(model.to_string())
}

/// Runs `pull` / `rm` against the local model store
#[derive(Debug, Clone)]
pub struct ModelLifecycle {
    binary: String,
    timeout: Duration,
}

impl ModelLifecycle {
    pub fn new(binary: impl Into<String>) -> Self {
        Self {
            binary: binary.into(),
            timeout: COMMAND_TIMEOUT,
        }
    }

    pub fn from_config(config: &BackendsConfig) -> Self {
        Self::new(config.ollama_binary.clone())
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn binary(&self) -> &str {
        &self.binary
    }

    /// Download `model` into the local store
    pub async fn pull(&self, model: &str) -> CommandOutcome {
        self.run("pull", model).await
    }

    /// Delete `model` from the local store
    pub async fn remove(&self, model: &str) -> CommandOutcome {
        self.run("rm", model).await
    }

    async fn run(&self, action: &str, raw_model: &str) -> CommandOutcome {
        let model = match sanitize_model_identifier(raw_model) {
            Ok(model) => model,
            Err(reason) => {
                tracing::warn!(action, reason = %reason, "Rejected model identifier");
                return CommandOutcome::failed(raw_model.trim(), reason);
            }
        };

        tracing::info!(binary = %self.binary, action, model = %model, "Running model lifecycle command");

        let child = Command::new(&self.binary)
            .arg(action)
            .arg(&model)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn();

        let child = match child {
            Ok(child) => child,
            Err(e) => {
                tracing::warn!(binary = %self.binary, error = %e, "Failed to start lifecycle command");
                return CommandOutcome::failed(
                    &model,
                    format!("failed to start '{}': {}", self.binary, e),
                );
            }
        };

        // Dropping the child on timeout kills it
        let output = match tokio::time::timeout(self.timeout, child.wait_with_output()).await {
            Ok(Ok(output)) => output,
            Ok(Err(e)) => {
                tracing::warn!(action, model = %model, error = %e, "Lifecycle command failed");
                return CommandOutcome::failed(&model, e.to_string());
            }
            Err(_) => {
                tracing::warn!(
                    action,
                    model = %model,
                    timeout_secs = self.timeout.as_secs(),
                    "Lifecycle command timed out"
                );
                return CommandOutcome::failed(
                    &model,
                    format!("'{} {}' timed out after {:?}", action, model, self.timeout),
                );
            }
        };

        let stdout = String::from_utf8_lossy(&output.stdout).trim().to_string();
        let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();

        if output.status.success() {
            tracing::info!(action, model = %model, "Lifecycle command completed");
            CommandOutcome {
                success: true,
                model,
                output: stdout,
                error: stderr,
            }
        } else {
            tracing::warn!(action, model = %model, status = %output.status, "Lifecycle command exited with failure");
            let error = if stderr.is_empty() {
                format!("exited with {}", output.status)
            } else {
                stderr
            };
            CommandOutcome {
                success: false,
                model,
                output: stdout,
                error,
            }
        }
    }
}
