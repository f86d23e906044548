//! Hit/miss statistics.

use std::sync::Arc;

use serde::Serialize;
use tracing::warn;
use vitrine_core::CacheKey;
use vitrine_store::{DurableStore, StoreSummary};

/// Writes per-record hit and miss counters to the durable store.
///
/// Writes are advisory: failures are logged and dropped. When detached, each
/// write runs on its own task and lookups never wait on the store.
#[derive(Clone)]
pub struct StatsRecorder {
    durable: Arc<dyn DurableStore>,
    detached: bool,
}

impl StatsRecorder {
    pub fn new(durable: Arc<dyn DurableStore>, detached: bool) -> Self {
        Self { durable, detached }
    }

    /// Records a hit with its retrieval latency in milliseconds.
    pub async fn record_hit(&self, key: &CacheKey, retrieval_ms: f64) {
        let durable = Arc::clone(&self.durable);
        let key = key.clone();
        self.dispatch(async move {
            if let Err(e) = durable.record_hit(&key, retrieval_ms).await {
                warn!(key = %key, error = %e, "Failed to record cache hit");
            }
        })
        .await;
    }

    pub async fn record_miss(&self, key: &CacheKey) {
        let durable = Arc::clone(&self.durable);
        let key = key.clone();
        self.dispatch(async move {
            if let Err(e) = durable.record_miss(&key).await {
                warn!(key = %key, error = %e, "Failed to record cache miss");
            }
        })
        .await;
    }

    async fn dispatch<F>(&self, write: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        if self.detached {
            tokio::spawn(write);
        } else {
            write.await;
        }
    }
}

impl std::fmt::Debug for StatsRecorder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StatsRecorder")
            .field("durable", &self.durable.name())
            .field("detached", &self.detached)
            .finish()
    }
}

/// Snapshot returned by `ContentEngine::get_cache_statistics`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheStatistics {
    pub volatile_entries: u64,
    /// Hits and misses seen by this process.
    pub hits: u64,
    pub misses: u64,
    pub hit_rate: f64,
    pub dependency_edges: usize,
    pub validating_now: usize,
    pub startup_warmed: bool,
    /// Durable totals; `None` when the store could not be read.
    pub durable: Option<StoreSummary>,
}
