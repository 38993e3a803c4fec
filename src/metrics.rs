//! Prometheus metrics collection for the bridge
//!
//! Tracks:
//! - Backend calls by provider, operation and outcome
//! - Result cache lookups by result
//! - Agent tasks by kind and outcome
//! - Stream units skipped by the decoders
//! - Catalog size and busy agent slots
//!
//! Metrics are exposed via the `/metrics` endpoint in Prometheus text format.

use crate::backends::Provider;
use prometheus::{
    Encoder, HistogramOpts, HistogramVec, IntCounterVec, IntGauge, Opts, Registry, TextEncoder,
};
use std::sync::Arc;

/// Backend operation, used as a metrics label
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Chat,
    ChatStream,
    Embeddings,
}

impl Operation {
    pub fn as_str(&self) -> &'static str {
        match self {
            Operation::Chat => "chat",
            Operation::ChatStream => "chat_stream",
            Operation::Embeddings => "embeddings",
        }
    }
}

/// Result of a backend call or agent task
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Success,
    Failure,
}

impl Outcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            Outcome::Success => "success",
            Outcome::Failure => "failure",
        }
    }

    pub fn from_result<T, E>(result: &Result<T, E>) -> Self {
        if result.is_ok() {
            Outcome::Success
        } else {
            Outcome::Failure
        }
    }
}

/// Cache lookup result
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheLookup {
    Hit,
    Miss,
    Bypass,
}

impl CacheLookup {
    pub fn as_str(&self) -> &'static str {
        match self {
            CacheLookup::Hit => "hit",
            CacheLookup::Miss => "miss",
            CacheLookup::Bypass => "bypass",
        }
    }
}

/// Metrics collector for the bridge
///
/// Cheap to clone; all clones share one registry. Label values come from
/// closed enums, so cardinality is bounded.
#[derive(Clone)]
pub struct Metrics {
    pub registry: Arc<Registry>,
    backend_requests: IntCounterVec,
    backend_duration: HistogramVec,
    cache_lookups: IntCounterVec,
    agent_tasks: IntCounterVec,
    stream_units_skipped: IntCounterVec,
    catalog_models: IntGauge,
    busy_agent_slots: IntGauge,
}

impl Metrics {
    /// Create a new Metrics instance with its own registry
    ///
    /// # Errors
    ///
    /// Returns an error if metric registration fails (e.g., duplicate names).
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new();

        // Cardinality: 2 providers × 3 operations × 2 outcomes
        let backend_requests = IntCounterVec::new(
            Opts::new(
                "bigdaddyg_backend_requests_total",
                "Total backend calls by provider, operation and outcome",
            ),
            &["provider", "operation", "outcome"],
        )?;

        let backend_duration = HistogramVec::new(
            HistogramOpts::new(
                "bigdaddyg_backend_request_duration_ms",
                "Backend call latency in milliseconds (until headers for streams)",
            )
            .buckets(vec![
                5.0, 25.0, 100.0, 250.0, 1000.0, 2500.0, 10000.0, 30000.0, 60000.0,
            ]),
            &["provider", "operation"],
        )?;

        let cache_lookups = IntCounterVec::new(
            Opts::new(
                "bigdaddyg_cache_lookups_total",
                "Result cache lookups by result (hit, miss, bypass)",
            ),
            &["result"],
        )?;

        let agent_tasks = IntCounterVec::new(
            Opts::new(
                "bigdaddyg_agent_tasks_total",
                "Agent tasks executed by kind and outcome",
            ),
            &["kind", "outcome"],
        )?;

        // Non-zero rates point at a backend emitting frames the decoders do not understand
        let stream_units_skipped = IntCounterVec::new(
            Opts::new(
                "bigdaddyg_stream_units_skipped_total",
                "Malformed streaming frames skipped by provider",
            ),
            &["provider"],
        )?;

        let catalog_models = IntGauge::with_opts(Opts::new(
            "bigdaddyg_catalog_models",
            "Number of entries in the model catalog after the last build",
        ))?;

        let busy_agent_slots = IntGauge::with_opts(Opts::new(
            "bigdaddyg_busy_agent_slots",
            "Agent slots currently reserved or running a task",
        ))?;

        registry.register(Box::new(backend_requests.clone()))?;
        registry.register(Box::new(backend_duration.clone()))?;
        registry.register(Box::new(cache_lookups.clone()))?;
        registry.register(Box::new(agent_tasks.clone()))?;
        registry.register(Box::new(stream_units_skipped.clone()))?;
        registry.register(Box::new(catalog_models.clone()))?;
        registry.register(Box::new(busy_agent_slots.clone()))?;

        Ok(Self {
            registry: Arc::new(registry),
            backend_requests,
            backend_duration,
            cache_lookups,
            agent_tasks,
            stream_units_skipped,
            catalog_models,
            busy_agent_slots,
        })
    }

    /// Record one backend call
    ///
    /// Non-finite or negative durations are dropped from the histogram; the
    /// counter is still incremented.
    pub fn record_backend_request(
        &self,
        provider: Provider,
        operation: Operation,
        outcome: Outcome,
        duration_ms: f64,
    ) {
        self.backend_requests
            .with_label_values(&[provider.as_str(), operation.as_str(), outcome.as_str()])
            .inc();

        if !duration_ms.is_finite() || duration_ms < 0.0 {
            tracing::warn!(
                duration_ms,
                provider = provider.as_str(),
                "Dropping invalid backend duration sample"
            );
            return;
        }
        self.backend_duration
            .with_label_values(&[provider.as_str(), operation.as_str()])
            .observe(duration_ms);
    }

    pub fn record_cache_lookup(&self, lookup: CacheLookup) {
        self.cache_lookups.with_label_values(&[lookup.as_str()]).inc();
    }

    pub fn record_agent_task(&self, kind: &'static str, outcome: Outcome) {
        self.agent_tasks
            .with_label_values(&[kind, outcome.as_str()])
            .inc();
    }

    pub fn record_stream_units_skipped(&self, provider: Provider, count: usize) {
        self.stream_units_skipped
            .with_label_values(&[provider.as_str()])
            .inc_by(count as u64);
    }

    pub fn set_catalog_models(&self, count: usize) {
        self.catalog_models.set(count as i64);
    }

    pub fn set_busy_agent_slots(&self, count: usize) {
        self.busy_agent_slots.set(count as i64);
    }

    /// Total skipped stream units across providers
    pub fn stream_units_skipped_count(&self) -> u64 {
        [Provider::Orchestra, Provider::Ollama]
            .iter()
            .map(|p| self.stream_units_skipped.with_label_values(&[p.as_str()]).get())
            .sum()
    }

    /// Gather all metrics and encode them in Prometheus text format
    ///
    /// # Errors
    ///
    /// Returns an error if metric encoding fails.
    pub fn gather(&self) -> Result<String, prometheus::Error> {
        let metric_families = self.registry.gather();
        let metric_count = metric_families.len();

        tracing::debug!(
            metric_family_count = metric_count,
            "Encoding metrics to Prometheus text format"
        );

        let mut buffer = Vec::new();
        TextEncoder::new()
            .encode(&metric_families, &mut buffer)
            .map_err(|e| {
                tracing::error!(error = %e, metric_family_count = metric_count, "Prometheus text encoder failed");
                prometheus::Error::Msg(format!(
                    "Failed to encode {} metric families: {}",
                    metric_count, e
                ))
            })?;

        String::from_utf8(buffer).map_err(|e| {
            prometheus::Error::Msg(format!(
                "Failed to convert metrics to UTF-8 at byte {}: {}",
                e.utf8_error().valid_up_to(),
                e
            ))
        })
    }
}
