//! Request and response types shared by the router, cache and agents

use crate::backends::Provider;
use crate::error::{AppError, AppResult};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Maximum allowed message length in characters (100K chars)
pub const MAX_MESSAGE_LENGTH: usize = 100_000;

/// Sampling parameters sent to either backend
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct SamplingOptions {
    #[serde(default = "default_temperature")]
    pub temperature: f64,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    #[serde(default = "default_top_p")]
    pub top_p: f64,
    #[serde(default = "default_top_k")]
    pub top_k: u32,
    #[serde(default = "default_repeat_penalty")]
    pub repeat_penalty: f64,
}

impl Default for SamplingOptions {
    fn default() -> Self {
        Self {
            temperature: default_temperature(),
            max_tokens: default_max_tokens(),
            top_p: default_top_p(),
            top_k: default_top_k(),
            repeat_penalty: default_repeat_penalty(),
        }
    }
}

fn default_temperature() -> f64 {
    0.7
}

fn default_max_tokens() -> u32 {
    2048
}

fn default_top_p() -> f64 {
    0.9
}

fn default_top_k() -> u32 {
    40
}

fn default_repeat_penalty() -> f64 {
    1.1
}

/// Prior conversation turn
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct ContextMessage {
    pub role: String,
    pub content: String,
}

impl ContextMessage {
    pub fn new(role: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            role: role.into(),
            content: content.into(),
        }
    }
}

/// Chat request accepted by every [`ChatService`](super::ChatService)
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct ChatRequest {
    pub message: String,
    /// Explicit target model; chosen from the catalog when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(flatten)]
    pub sampling: SamplingOptions,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system_prompt: Option<String>,
    #[serde(default)]
    pub context: Vec<ContextMessage>,
    #[serde(default)]
    pub tools: Vec<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response_format: Option<Value>,
    /// Caller correlation id; never part of the cache key
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
    #[serde(default)]
    pub bypass_cache: bool,
}

impl ChatRequest {
    /// Request with default sampling and no target model
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            model: None,
            sampling: SamplingOptions::default(),
            system_prompt: None,
            context: Vec::new(),
            tools: Vec::new(),
            response_format: None,
            request_id: None,
            bypass_cache: false,
        }
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    pub fn with_system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.system_prompt = Some(prompt.into());
        self
    }

    pub fn with_context(mut self, context: Vec<ContextMessage>) -> Self {
        self.context = context;
        self
    }

    pub fn with_bypass_cache(mut self, bypass: bool) -> Self {
        self.bypass_cache = bypass;
        self
    }

    /// Reject requests no backend could serve
    pub fn validate(&self) -> AppResult<()> {
        if self.message.trim().is_empty() {
            return Err(AppError::Validation(
                "message cannot be empty or contain only whitespace".to_string(),
            ));
        }

        let char_count = self.message.chars().count();
        if char_count > MAX_MESSAGE_LENGTH {
            return Err(AppError::Validation(format!(
                "message exceeds maximum length of {} characters (got {})",
                MAX_MESSAGE_LENGTH, char_count
            )));
        }

        if let Some(model) = &self.model {
            if model.trim().is_empty() {
                return Err(AppError::Validation(
                    "model cannot be an empty string".to_string(),
                ));
            }
        }

        let s = &self.sampling;
        if !s.temperature.is_finite() || !(0.0..=2.0).contains(&s.temperature) {
            return Err(AppError::Validation(format!(
                "temperature must be between 0.0 and 2.0 (got {})",
                s.temperature
            )));
        }
        if !s.top_p.is_finite() || s.top_p <= 0.0 || s.top_p > 1.0 {
            return Err(AppError::Validation(format!(
                "top_p must be in (0.0, 1.0] (got {})",
                s.top_p
            )));
        }
        if !s.repeat_penalty.is_finite() || s.repeat_penalty <= 0.0 {
            return Err(AppError::Validation(format!(
                "repeat_penalty must be positive (got {})",
                s.repeat_penalty
            )));
        }
        if s.max_tokens == 0 {
            return Err(AppError::Validation(
                "max_tokens must be greater than 0".to_string(),
            ));
        }

        Ok(())
    }
}

/// Token accounting reported by a backend
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct Usage {
    pub prompt_tokens: u64,
    pub completion_tokens: u64,
    pub total_tokens: u64,
}

impl Usage {
    pub fn new(prompt_tokens: u64, completion_tokens: u64) -> Self {
        Self {
            prompt_tokens,
            completion_tokens,
            total_tokens: prompt_tokens + completion_tokens,
        }
    }
}

/// Normalized chat response
///
/// `provider` is always the backend that produced `content`.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct ChatResult {
    pub content: String,
    pub usage: Usage,
    pub model: String,
    pub provider: Provider,
    pub timestamp: DateTime<Utc>,
}

/// Normalized embedding response
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct EmbeddingResult {
    pub embedding: Vec<f32>,
    pub model: String,
    pub provider: Provider,
}
