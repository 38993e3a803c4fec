//! Result cache in front of a chat service
//!
//! Entries expire after a TTL and are evicted oldest-inserted first once the
//! cache holds more than `max_entries`. Reads never refresh an entry's
//! position.

pub mod cached_router;

pub use cached_router::{CacheStats, CachedRouter};

use crate::config::CacheConfig;
use crate::router::{ChatRequest, ChatResult, ContextMessage};
use indexmap::IndexMap;
use serde::Serialize;
use sha2::{Digest, Sha256};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

/// Fields of a request that determine its answer
///
/// Field order is part of the key; `tools`, `response_format`, `request_id`
/// and `bypass_cache` are deliberately absent.
#[derive(Serialize)]
struct KeyFields<'a> {
    model: &'a str,
    message: &'a str,
    temperature: f64,
    max_tokens: u32,
    top_p: f64,
    top_k: u32,
    repeat_penalty: f64,
    system_prompt: Option<&'a str>,
    context: &'a [ContextMessage],
}

/// SHA-256 hex digest of the request's canonical JSON
///
/// `model` is the model the request resolves to, so a request without an
/// explicit model never reuses an answer from a model the catalog no longer
/// prefers.
pub fn cache_key(request: &ChatRequest, model: &str) -> String {
    let fields = KeyFields {
        model,
        message: &request.message,
        temperature: request.sampling.temperature,
        max_tokens: request.sampling.max_tokens,
        top_p: request.sampling.top_p,
        top_k: request.sampling.top_k,
        repeat_penalty: request.sampling.repeat_penalty,
        system_prompt: request.system_prompt.as_deref(),
        context: &request.context,
    };

    // Serializing plain fields cannot fail; fall back to Debug output regardless
    let canonical = serde_json::to_string(&fields).unwrap_or_else(|_| format!("{:?}", request));
    format!("{:x}", Sha256::digest(canonical.as_bytes()))
}

/// Storage seam for cached chat results
pub trait ResultCache: Send + Sync {
    /// Live entry for `key`; expired entries are dropped and reported as absent
    fn get(&self, key: &str) -> Option<ChatResult>;

    fn insert(&self, key: String, result: ChatResult);

    fn remove(&self, key: &str) -> bool;

    fn clear(&self);

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

struct CacheEntry {
    result: ChatResult,
    inserted_at: Instant,
}

/// TTL + FIFO cache backed by an insertion-ordered map
pub struct InMemoryResultCache {
    entries: Mutex<IndexMap<String, CacheEntry>>,
    ttl: Duration,
    max_entries: usize,
}

impl InMemoryResultCache {
    pub fn new(ttl: Duration, max_entries: usize) -> Self {
        Self {
            entries: Mutex::new(IndexMap::new()),
            ttl,
            max_entries,
        }
    }

    pub fn from_config(config: &CacheConfig) -> Self {
        Self::new(config.ttl(), config.max_entries)
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    pub fn max_entries(&self) -> usize {
        self.max_entries
    }

    fn lock(&self) -> MutexGuard<'_, IndexMap<String, CacheEntry>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl ResultCache for InMemoryResultCache {
    fn get(&self, key: &str) -> Option<ChatResult> {
        let mut entries = self.lock();
        let expired = match entries.get(key) {
            Some(entry) => entry.inserted_at.elapsed() >= self.ttl,
            None => return None,
        };
        if expired {
            entries.shift_remove(key);
            tracing::trace!(key, "Cache entry expired");
            return None;
        }
        entries.get(key).map(|entry| entry.result.clone())
    }

    fn insert(&self, key: String, result: ChatResult) {
        let mut entries = self.lock();
        // A refreshed entry counts as newly inserted
        entries.shift_remove(&key);
        entries.insert(
            key,
            CacheEntry {
                result,
                inserted_at: Instant::now(),
            },
        );
        while entries.len() > self.max_entries {
            if let Some((evicted, _)) = entries.shift_remove_index(0) {
                tracing::trace!(key = %evicted, "Evicted oldest cache entry");
            }
        }
    }

    fn remove(&self, key: &str) -> bool {
        self.lock().shift_remove(key).is_some()
    }

    fn clear(&self) {
        self.lock().clear();
    }

    fn len(&self) -> usize {
        self.lock().len()
    }
}
