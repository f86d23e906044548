//! Volatile store backed by Moka.

use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use glob::Pattern;
use moka::Expiry;
use moka::future::Cache;
use moka::notification::RemovalCause;
use vitrine_core::{CacheEntry, CacheKey};

use crate::metrics::CacheMetrics;

/// A cached entry plus the lifetime Moka should give it.
#[derive(Debug, Clone)]
struct VolatileSlot {
    entry: Arc<CacheEntry>,
    lifetime: Duration,
}

/// Per-entry expiry: each slot lives until its own `expires_at`.
struct SlotExpiry;

impl Expiry<CacheKey, VolatileSlot> for SlotExpiry {
    fn expire_after_create(
        &self,
        _key: &CacheKey,
        value: &VolatileSlot,
        _created_at: Instant,
    ) -> Option<Duration> {
        Some(value.lifetime)
    }

    fn expire_after_update(
        &self,
        _key: &CacheKey,
        value: &VolatileSlot,
        _updated_at: Instant,
        _duration_until_expiry: Option<Duration>,
    ) -> Option<Duration> {
        Some(value.lifetime)
    }
}

/// Process-local cache of entries.
///
/// Expiry is checked on every read against the engine clock, so an entry is
/// never returned at or past its `expires_at` even if Moka has not evicted it
/// yet. Moka's own per-entry expiry only reclaims memory.
#[derive(Clone)]
pub struct VolatileStore {
    inner: Cache<CacheKey, VolatileSlot>,
    metrics: CacheMetrics,
}

impl VolatileStore {
    pub fn new(max_capacity: u64, metrics: CacheMetrics) -> Self {
        let eviction_metrics = metrics.clone();
        let inner = Cache::builder()
            .max_capacity(max_capacity)
            .expire_after(SlotExpiry)
            .eviction_listener(move |_key, _value, cause| {
                let reason = match cause {
                    RemovalCause::Expired => "ttl",
                    RemovalCause::Size => "capacity",
                    RemovalCause::Explicit => "manual",
                    RemovalCause::Replaced => "replaced",
                };
                eviction_metrics.record_eviction(reason);
            })
            .build();

        Self { inner, metrics }
    }

    /// Returns the entry if present and fresh at `now`. A present but expired
    /// entry is evicted.
    pub async fn get(&self, key: &CacheKey, now: DateTime<Utc>) -> Option<Arc<CacheEntry>> {
        let slot = self.inner.get(key).await?;
        if slot.entry.is_fresh(now) {
            return Some(slot.entry);
        }

        self.inner.invalidate(key).await;
        None
    }

    /// Returns the entry without evicting when it is stale.
    pub async fn peek(&self, key: &CacheKey) -> Option<Arc<CacheEntry>> {
        self.inner.get(key).await.map(|slot| slot.entry)
    }

    /// Inserts an entry living until its own `expires_at`. Entries already
    /// expired at `now` are not stored and any previous value is dropped.
    pub async fn insert(&self, entry: CacheEntry, now: DateTime<Utc>) {
        let key = entry.key.clone();
        match entry.remaining(now) {
            Some(lifetime) => {
                let slot = VolatileSlot {
                    entry: Arc::new(entry),
                    lifetime,
                };
                self.inner.insert(key, slot).await;
            },
            None => self.inner.invalidate(&key).await,
        }
        self.metrics.update_entry_count(self.inner.entry_count());
    }

    pub async fn invalidate(&self, key: &CacheKey) {
        self.inner.invalidate(key).await;
    }

    /// Removes every key whose page id matches `pattern`.
    pub async fn invalidate_pages_matching(&self, pattern: &Pattern) -> Vec<CacheKey> {
        let matched: Vec<CacheKey> = self
            .inner
            .iter()
            .filter(|(key, _)| pattern.matches(key.page()))
            .map(|(key, _)| (*key).clone())
            .collect();

        for key in &matched {
            self.inner.invalidate(key).await;
        }
        matched
    }

    /// Drops every entry and returns how many were held.
    pub async fn clear(&self) -> u64 {
        self.inner.run_pending_tasks().await;
        let count = self.inner.entry_count();
        self.inner.invalidate_all();
        self.inner.run_pending_tasks().await;
        self.metrics.update_entry_count(0);
        count
    }

    /// Entry count after applying pending maintenance.
    pub async fn entry_count(&self) -> u64 {
        self.inner.run_pending_tasks().await;
        let count = self.inner.entry_count();
        self.metrics.update_entry_count(count);
        count
    }
}

impl std::fmt::Debug for VolatileStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VolatileStore")
            .field("entries", &self.inner.entry_count())
            .finish()
    }
}
