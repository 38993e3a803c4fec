//! Chat, streaming chat and embedding endpoints
//!
//! Requests go through the cached chat service. `/chat/stream` answers with
//! Server-Sent Events:
//!
//! ```text
//! data: {"content":"Hel","done":false}
//!
//! data: {"content":"lo","done":true}
//!
//! data: [DONE]
//!
//! ```

use crate::backends::StreamChunk;
use crate::error::AppResult;
use crate::handlers::AppState;
use crate::middleware::RequestId;
use crate::router::{ChatRequest, ChatResult, ChatService, EmbeddingResult};
use axum::{
    Extension, Json,
    extract::State,
    response::{
        IntoResponse, Response,
        sse::{Event, KeepAlive, Sse},
    },
};
use futures::stream::{self, StreamExt};
use serde::Deserialize;
use std::convert::Infallible;
use std::time::Duration;

/// Sentinel data line that ends every SSE response
pub const STREAM_DONE: &str = "[DONE]";

#[derive(Debug, Deserialize)]
pub struct EmbeddingsRequest {
    #[serde(alias = "prompt", alias = "text")]
    pub input: String,
    #[serde(default)]
    pub model: Option<String>,
}

fn with_request_id(mut request: ChatRequest, request_id: RequestId) -> ChatRequest {
    if request.request_id.is_none() {
        request.request_id = Some(request_id.to_string());
    }
    request
}

pub async fn handler(
    State(state): State<AppState>,
    Extension(request_id): Extension<RequestId>,
    Json(request): Json<ChatRequest>,
) -> AppResult<Json<ChatResult>> {
    let request = with_request_id(request, request_id);
    tracing::debug!(
        request_id = %request_id,
        model = request.model.as_deref().unwrap_or("auto"),
        message_length = request.message.chars().count(),
        "Received chat request"
    );

    let result = state.bridge().chat().chat(&request).await?;

    tracing::info!(
        request_id = %request_id,
        model = %result.model,
        provider = result.provider.as_str(),
        total_tokens = result.usage.total_tokens,
        "Chat request completed"
    );
    Ok(Json(result))
}

pub async fn stream_handler(
    State(state): State<AppState>,
    Extension(request_id): Extension<RequestId>,
    Json(request): Json<ChatRequest>,
) -> AppResult<Response> {
    let request = with_request_id(request, request_id);
    tracing::debug!(request_id = %request_id, "Received streaming chat request");

    let chunks = state.bridge().chat().chat_stream(&request).await?;

    let events = chunks
        .map(|chunk| Ok::<_, Infallible>(chunk_event(&chunk)))
        .chain(stream::once(async {
            Ok::<_, Infallible>(Event::default().data(STREAM_DONE))
        }));

    Ok(Sse::new(events)
        .keep_alive(KeepAlive::new().interval(Duration::from_secs(15)))
        .into_response())
}

fn chunk_event(chunk: &StreamChunk) -> Event {
    match serde_json::to_string(chunk) {
        Ok(json) => Event::default().data(json),
        Err(e) => {
            tracing::error!(error = %e, "Failed to serialize stream chunk");
            Event::default().comment("unserializable chunk")
        }
    }
}

pub async fn embeddings_handler(
    State(state): State<AppState>,
    Extension(request_id): Extension<RequestId>,
    Json(request): Json<EmbeddingsRequest>,
) -> AppResult<Json<EmbeddingResult>> {
    tracing::debug!(
        request_id = %request_id,
        model = request.model.as_deref().unwrap_or("auto"),
        "Received embeddings request"
    );
    let result = state
        .bridge()
        .chat()
        .generate_embeddings(&request.input, request.model.as_deref())
        .await?;
    Ok(Json(result))
}
