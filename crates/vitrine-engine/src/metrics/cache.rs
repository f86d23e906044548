//! Cache metrics recording.

use metrics::{counter, gauge, histogram};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

/// Describes every engine metric. Call once after installing a recorder.
pub fn register_cache_metrics() {
    metrics::describe_counter!(
        "vitrine_cache_hits_total",
        "Total number of cache hits by layer"
    );
    metrics::describe_counter!("vitrine_cache_misses_total", "Total number of cache misses");
    metrics::describe_counter!(
        "vitrine_cache_invalidations_total",
        "Total number of keys invalidated by reason"
    );
    metrics::describe_counter!(
        "vitrine_cache_evictions_total",
        "Total number of volatile evictions"
    );
    metrics::describe_gauge!(
        "vitrine_cache_entries",
        "Current number of entries in the volatile store"
    );
    metrics::describe_counter!(
        "vitrine_warming_jobs_total",
        "Warming jobs by outcome"
    );
    metrics::describe_counter!(
        "vitrine_validations_total",
        "Record validations by outcome"
    );
    metrics::describe_histogram!(
        "vitrine_cache_operation_seconds",
        "Time spent on engine operations"
    );
}

/// Metrics recorder for the engine.
///
/// Hits and misses are also kept in atomics so statistics are available
/// without a metrics exporter.
#[derive(Debug, Clone, Default)]
pub struct CacheMetrics {
    hits: Arc<AtomicU64>,
    misses: Arc<AtomicU64>,
}

impl CacheMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a hit served by `layer` (`volatile` or `durable`).
    pub fn record_hit(&self, layer: &'static str) {
        self.hits.fetch_add(1, Ordering::Relaxed);
        counter!("vitrine_cache_hits_total", "layer" => layer).increment(1);
    }

    pub fn record_miss(&self) {
        self.misses.fetch_add(1, Ordering::Relaxed);
        counter!("vitrine_cache_misses_total").increment(1);
    }

    pub fn record_eviction(&self, reason: &'static str) {
        counter!("vitrine_cache_evictions_total", "reason" => reason).increment(1);
    }

    /// Records one invalidated key. Only the reason category (the text before
    /// the first `:`) is used as label.
    pub fn record_invalidation(&self, reason: &str) {
        counter!(
            "vitrine_cache_invalidations_total",
            "reason" => reason_label(reason).to_string()
        )
        .increment(1);
    }

    pub fn update_entry_count(&self, count: u64) {
        gauge!("vitrine_cache_entries").set(count as f64);
    }

    pub fn record_warming_job(&self, outcome: &'static str) {
        counter!("vitrine_warming_jobs_total", "outcome" => outcome).increment(1);
    }

    pub fn record_validation(&self, outcome: &'static str) {
        counter!("vitrine_validations_total", "outcome" => outcome).increment(1);
    }

    pub fn record_operation_duration(&self, operation: &'static str, duration: Duration) {
        histogram!("vitrine_cache_operation_seconds", "operation" => operation)
            .record(duration.as_secs_f64());
    }

    /// Hit rate since startup, 0 when nothing was looked up.
    pub fn hit_rate(&self) -> f64 {
        let hits = self.hits() as f64;
        let total = hits + self.misses() as f64;
        if total == 0.0 { 0.0 } else { hits / total }
    }

    pub fn hits(&self) -> u64 {
        self.hits.load(Ordering::Relaxed)
    }

    pub fn misses(&self) -> u64 {
        self.misses.load(Ordering::Relaxed)
    }
}

fn reason_label(reason: &str) -> &str {
    reason.split(':').next().unwrap_or(reason).trim()
}
