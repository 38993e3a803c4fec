//! Chat and embedding routing
//!
//! Every request goes to exactly one backend, chosen by model-name prefix
//! (see [`Provider::for_model`](crate::backends::Provider::for_model)).
//! A failing backend is reported to the caller; there is no failover.

pub mod chat_router;
pub mod types;

pub use chat_router::ChatRouter;
pub use types::{
    ChatRequest, ChatResult, ContextMessage, EmbeddingResult, MAX_MESSAGE_LENGTH, SamplingOptions,
    Usage,
};

use crate::backends::ChunkStream;
use crate::error::AppResult;
use async_trait::async_trait;

/// Model used when neither the request nor the catalog names one
pub const DEFAULT_MODEL: &str = "bigdaddyg:latest";

/// Anything that can answer chat and embedding requests
///
/// Implemented by [`ChatRouter`] and by the result cache wrapper, so callers
/// such as the agent pool work with either.
#[async_trait]
pub trait ChatService: Send + Sync {
    async fn chat(&self, request: &ChatRequest) -> AppResult<ChatResult>;

    /// Incremental response; errors only if the stream cannot be opened
    async fn chat_stream(&self, request: &ChatRequest) -> AppResult<ChunkStream>;

    async fn generate_embeddings(
        &self,
        input: &str,
        model: Option<&str>,
    ) -> AppResult<EmbeddingResult>;

    /// Model a chat request naming `requested` would run on right now
    fn resolve_model(&self, requested: Option<&str>) -> String {
        requested
            .map(str::trim)
            .filter(|m| !m.is_empty())
            .unwrap_or(DEFAULT_MODEL)
            .to_string()
    }
}
