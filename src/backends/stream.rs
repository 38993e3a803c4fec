//! Streaming response decoders
//!
//! Both decoders buffer raw bytes across reads and only decode complete
//! frames, so a frame (or a multi-byte character) split across network
//! chunks is decoded exactly once. Malformed frames are skipped and counted.
//!
//! - [`SseDecoder`]: blank-line separated `data:` blocks, terminated by `[DONE]`
//! - [`NdjsonDecoder`]: one JSON object per line, terminated by `"done": true`

use super::Provider;
use super::orchestra::extract_content;
use crate::metrics::Metrics;
use futures::stream::{self, BoxStream, Stream, StreamExt};
use serde::Serialize;
use serde_json::Value;
use std::collections::VecDeque;
use std::pin::Pin;
use std::sync::Arc;

/// Incremental piece of a streamed response
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StreamChunk {
    pub content: String,
    pub done: bool,
}

impl StreamChunk {
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            done: false,
        }
    }

    pub fn finished(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            done: true,
        }
    }
}

/// Finite stream of chunks in the order the backend sent them
pub type ChunkStream = BoxStream<'static, StreamChunk>;

/// Framing decoder turning raw bytes into chunks
pub trait FrameDecoder {
    /// Feed one network read; returns every chunk completed by it
    fn push(&mut self, bytes: &[u8]) -> Vec<StreamChunk>;

    /// Decode whatever is left once the connection closes
    fn finish(&mut self) -> Vec<StreamChunk>;

    /// Malformed frames skipped since the last call
    fn take_skipped(&mut self) -> usize;
}

/// Decoder for the primary backend's SSE-like framing
#[derive(Debug, Default)]
pub struct SseDecoder {
    buffer: Vec<u8>,
    skipped: usize,
}

impl SseDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    fn decode_frame(&mut self, frame: &[u8]) -> Option<StreamChunk> {
        let text = match std::str::from_utf8(frame) {
            Ok(text) => text,
            Err(_) => {
                self.skipped += 1;
                return None;
            }
        };

        let payload = extract_data_payload(text)?;
        if payload.trim() == "[DONE]" {
            return Some(StreamChunk::finished(""));
        }

        match serde_json::from_str::<Value>(&payload) {
            Ok(event) => extract_content(&event).map(StreamChunk::text),
            Err(e) => {
                tracing::debug!(error = %e, "Skipping malformed SSE event");
                self.skipped += 1;
                None
            }
        }
    }
}

impl FrameDecoder for SseDecoder {
    fn push(&mut self, bytes: &[u8]) -> Vec<StreamChunk> {
        self.buffer.extend_from_slice(bytes);
        let mut chunks = Vec::new();

        while let Some((idx, len)) = find_sse_boundary(&self.buffer) {
            let frame: Vec<u8> = self.buffer.drain(..idx + len).take(idx).collect();
            if let Some(chunk) = self.decode_frame(&frame) {
                chunks.push(chunk);
            }
        }

        chunks
    }

    fn finish(&mut self) -> Vec<StreamChunk> {
        let frame = std::mem::take(&mut self.buffer);
        if frame.iter().all(u8::is_ascii_whitespace) {
            return Vec::new();
        }
        self.decode_frame(&frame).into_iter().collect()
    }

    fn take_skipped(&mut self) -> usize {
        std::mem::take(&mut self.skipped)
    }
}

/// Joined `data:` lines of one event; comments and other fields are ignored
fn extract_data_payload(event: &str) -> Option<String> {
    let data_lines: Vec<&str> = event
        .lines()
        .map(|line| line.trim_end_matches('\r'))
        .filter(|line| !line.is_empty() && !line.starts_with(':'))
        .filter_map(|line| line.strip_prefix("data:"))
        .map(str::trim_start)
        .collect();

    if data_lines.is_empty() {
        None
    } else {
        Some(data_lines.join("\n"))
    }
}

/// Earliest event boundary in `buffer`: `(index, separator length)`
fn find_sse_boundary(buffer: &[u8]) -> Option<(usize, usize)> {
    let newline = find_subslice(buffer, b"\n\n").map(|idx| (idx, 2));
    let carriage = find_subslice(buffer, b"\r\n\r\n").map(|idx| (idx, 4));

    match (newline, carriage) {
        (Some(n), Some(c)) => Some(if n.0 <= c.0 { n } else { c }),
        (boundary, None) | (None, boundary) => boundary,
    }
}

fn find_subslice(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack
        .windows(needle.len())
        .position(|window| window == needle)
}

/// Decoder for the secondary backend's newline-delimited JSON
#[derive(Debug, Default)]
pub struct NdjsonDecoder {
    buffer: Vec<u8>,
    skipped: usize,
}

impl NdjsonDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    fn decode_line(&mut self, line: &[u8]) -> Option<StreamChunk> {
        let text = match std::str::from_utf8(line) {
            Ok(text) => text.trim(),
            Err(_) => {
                self.skipped += 1;
                return None;
            }
        };
        if text.is_empty() {
            return None;
        }

        match serde_json::from_str::<Value>(text) {
            Ok(event) => {
                let content = event
                    .get("response")
                    .and_then(Value::as_str)
                    .unwrap_or_default()
                    .to_string();
                let done = event.get("done").and_then(Value::as_bool).unwrap_or(false);
                if content.is_empty() && !done {
                    return None;
                }
                Some(StreamChunk { content, done })
            }
            Err(e) => {
                tracing::debug!(error = %e, "Skipping malformed NDJSON line");
                self.skipped += 1;
                None
            }
        }
    }
}

impl FrameDecoder for NdjsonDecoder {
    fn push(&mut self, bytes: &[u8]) -> Vec<StreamChunk> {
        self.buffer.extend_from_slice(bytes);
        let mut chunks = Vec::new();

        while let Some(idx) = self.buffer.iter().position(|b| *b == b'\n') {
            let line: Vec<u8> = self.buffer.drain(..=idx).take(idx).collect();
            if let Some(chunk) = self.decode_line(&line) {
                chunks.push(chunk);
            }
        }

        chunks
    }

    fn finish(&mut self) -> Vec<StreamChunk> {
        let line = std::mem::take(&mut self.buffer);
        self.decode_line(&line).into_iter().collect()
    }

    fn take_skipped(&mut self) -> usize {
        std::mem::take(&mut self.skipped)
    }
}

struct DecodeState<S, D> {
    bytes: Pin<Box<S>>,
    decoder: D,
    queue: VecDeque<StreamChunk>,
    finished: bool,
    provider: Provider,
    metrics: Option<Arc<Metrics>>,
}

impl<S, D: FrameDecoder> DecodeState<S, D> {
    fn record_skipped(&mut self) {
        let skipped = self.decoder.take_skipped();
        if skipped > 0 {
            if let Some(metrics) = &self.metrics {
                metrics.record_stream_units_skipped(self.provider, skipped);
            }
        }
    }
}

/// Turn a byte stream into a [`ChunkStream`]
///
/// The stream ends after the first chunk with `done == true`, when the
/// connection closes, or after a transport error (logged, not surfaced).
pub fn decode_stream<S, B, E, D>(
    bytes: S,
    decoder: D,
    provider: Provider,
    metrics: Option<Arc<Metrics>>,
) -> ChunkStream
where
    S: Stream<Item = Result<B, E>> + Send + 'static,
    B: AsRef<[u8]> + Send,
    E: std::fmt::Display + Send,
    D: FrameDecoder + Send + 'static,
{
    let state = DecodeState {
        bytes: Box::pin(bytes),
        decoder,
        queue: VecDeque::new(),
        finished: false,
        provider,
        metrics,
    };

    stream::unfold(state, |mut state| async move {
        loop {
            if let Some(chunk) = state.queue.pop_front() {
                if chunk.done {
                    state.finished = true;
                    state.queue.clear();
                }
                return Some((chunk, state));
            }
            if state.finished {
                return None;
            }

            match state.bytes.next().await {
                Some(Ok(bytes)) => {
                    let chunks = state.decoder.push(bytes.as_ref());
                    state.queue.extend(chunks);
                }
                Some(Err(e)) => {
                    tracing::warn!(
                        provider = state.provider.as_str(),
                        error = %e,
                        "Stream interrupted, ending response"
                    );
                    let chunks = state.decoder.finish();
                    state.queue.extend(chunks);
                    state.finished = true;
                }
                None => {
                    let chunks = state.decoder.finish();
                    state.queue.extend(chunks);
                    state.finished = true;
                }
            }
            state.record_skipped();
        }
    })
    .boxed()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sse_event_split_across_reads() {
        let mut decoder = SseDecoder::new();
        assert!(decoder.push(b"data: {\"content\":\"Hel").is_empty());
        let chunks = decoder.push(b"lo\"}\n\ndata: [DONE]\n\n");
        assert_eq!(
            chunks,
            vec![StreamChunk::text("Hello"), StreamChunk::finished("")]
        );
    }

    #[test]
    fn test_sse_delta_shape_and_crlf_boundaries() {
        let mut decoder = SseDecoder::new();
        let chunks = decoder.push(
            b"data: {\"choices\":[{\"delta\":{\"content\":\"a\"}}]}\r\n\r\ndata: {\"choices\":[{\"delta\":{\"content\":\"b\"}}]}\n\n",
        );
        assert_eq!(chunks, vec![StreamChunk::text("a"), StreamChunk::text("b")]);
    }

    #[test]
    fn test_sse_malformed_event_is_skipped() {
        let mut decoder = SseDecoder::new();
        let chunks = decoder.push(b"data: {oops\n\n: keep-alive\n\ndata: {\"response\":\"ok\"}\n\n");
        assert_eq!(chunks, vec![StreamChunk::text("ok")]);
        assert_eq!(decoder.take_skipped(), 1);
        assert_eq!(decoder.take_skipped(), 0);
    }

    #[test]
    fn test_sse_finish_flushes_trailing_event() {
        let mut decoder = SseDecoder::new();
        assert!(decoder.push(b"data: {\"content\":\"tail\"}").is_empty());
        assert_eq!(decoder.finish(), vec![StreamChunk::text("tail")]);
        assert!(decoder.finish().is_empty());
    }

    #[test]
    fn test_ndjson_object_straddling_reads_decodes_once() {
        let mut decoder = NdjsonDecoder::new();
        assert!(decoder.push(b"{\"response\":\"par").is_empty());
        let chunks = decoder.push(b"tial\",\"done\":false}\n");
        assert_eq!(chunks, vec![StreamChunk::text("partial")]);
        assert!(decoder.finish().is_empty());
    }

    #[test]
    fn test_ndjson_multibyte_character_split() {
        let line = "{\"response\":\"héllo\",\"done\":true}\n".as_bytes();
        let split = line.iter().position(|b| *b > 0x7f).expect("multibyte") + 1;
        let mut decoder = NdjsonDecoder::new();
        assert!(decoder.push(&line[..split]).is_empty());
        assert_eq!(
            decoder.push(&line[split..]),
            vec![StreamChunk::finished("héllo")]
        );
        assert_eq!(decoder.take_skipped(), 0);
    }

    #[test]
    fn test_ndjson_malformed_line_is_skipped() {
        let mut decoder = NdjsonDecoder::new();
        let chunks = decoder.push(b"not json\n\n{\"response\":\"x\"}\r\n");
        assert_eq!(chunks, vec![StreamChunk::text("x")]);
        assert_eq!(decoder.take_skipped(), 1);
    }

    #[tokio::test]
    async fn test_decode_stream_stops_at_done() {
        let reads: Vec<Result<Vec<u8>, std::io::Error>> = vec![
            Ok(b"{\"response\":\"a\",\"done\":false}\n{\"resp".to_vec()),
            Ok(b"onse\":\"b\",\"done\":true}\n{\"response\":\"ignored\"}\n".to_vec()),
        ];
        let chunks: Vec<StreamChunk> = decode_stream(
            stream::iter(reads),
            NdjsonDecoder::new(),
            Provider::Ollama,
            None,
        )
        .collect()
        .await;

        assert_eq!(
            chunks,
            vec![StreamChunk::text("a"), StreamChunk::finished("b")]
        );
    }

    #[tokio::test]
    async fn test_decode_stream_ends_on_transport_error() {
        let reads: Vec<Result<Vec<u8>, std::io::Error>> = vec![
            Ok(b"data: {\"content\":\"x\"}\n\n".to_vec()),
            Err(std::io::Error::other("reset")),
            Ok(b"data: {\"content\":\"never\"}\n\n".to_vec()),
        ];
        let chunks: Vec<StreamChunk> = decode_stream(
            stream::iter(reads),
            SseDecoder::new(),
            Provider::Orchestra,
            None,
        )
        .collect()
        .await;

        assert_eq!(chunks, vec![StreamChunk::text("x")]);
    }
}
