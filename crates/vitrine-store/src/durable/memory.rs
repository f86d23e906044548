//! In-process durable store.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use glob::Pattern;
use parking_lot::RwLock;
use tracing::debug;
use vitrine_core::{CacheKey, CacheRecord, ValidationStatus};

use super::{DurableStore, StoreSummary};
use crate::error::StoreError;

/// Record table shared by the in-process stores.
///
/// All methods are synchronous; callers hold the surrounding lock.
#[derive(Debug, Default)]
pub(crate) struct RecordTable {
    records: HashMap<CacheKey, CacheRecord>,
}

impl RecordTable {
    pub(crate) fn from_records(records: impl IntoIterator<Item = CacheRecord>) -> Self {
        Self {
            records: records
                .into_iter()
                .map(|record| (record.key().clone(), record))
                .collect(),
        }
    }

    pub(crate) fn upsert(&mut self, record: CacheRecord) -> Option<CacheRecord> {
        self.records.insert(record.key().clone(), record)
    }

    pub(crate) fn get(&self, key: &CacheKey) -> Option<CacheRecord> {
        self.records.get(key).cloned()
    }

    pub(crate) fn due(&self, now: DateTime<Utc>, limit: usize) -> Vec<CacheRecord> {
        let mut due: Vec<CacheRecord> = self
            .records
            .values()
            .filter(|record| record.is_due(now))
            .cloned()
            .collect();
        due.sort_by(|a, b| {
            a.next_validation_at
                .cmp(&b.next_validation_at)
                .then_with(|| a.key().cmp(b.key()))
        });
        due.truncate(limit);
        due
    }

    pub(crate) fn records(&self, status: Option<ValidationStatus>) -> Vec<CacheRecord> {
        let mut records: Vec<CacheRecord> = self
            .records
            .values()
            .filter(|record| status.is_none_or(|s| record.status == s))
            .cloned()
            .collect();
        records.sort_by(|a, b| a.key().cmp(b.key()));
        records
    }

    pub(crate) fn begin_validation(&mut self, key: &CacheKey, at: DateTime<Utc>) -> bool {
        self.records
            .get_mut(key)
            .is_some_and(|record| record.begin_validation(at))
    }

    pub(crate) fn complete_validation(&mut self, key: &CacheKey, at: DateTime<Utc>) -> bool {
        self.records
            .get_mut(key)
            .is_some_and(|record| record.complete_validation(at))
    }

    pub(crate) fn fail_validation(
        &mut self,
        key: &CacheKey,
        expected_hash: &str,
        reason: &str,
        at: DateTime<Utc>,
    ) -> bool {
        self.records
            .get_mut(key)
            .is_some_and(|record| record.fail_validation(expected_hash, reason, at))
    }

    pub(crate) fn invalidate(&mut self, key: &CacheKey, reason: &str, at: DateTime<Utc>) -> bool {
        match self.records.get_mut(key) {
            Some(record) => {
                record.invalidate(reason, at);
                true
            },
            None => false,
        }
    }

    pub(crate) fn invalidate_pages_matching(
        &mut self,
        pattern: &Pattern,
        reason: &str,
        at: DateTime<Utc>,
    ) -> Vec<CacheKey> {
        let mut matched = Vec::new();
        for (key, record) in self.records.iter_mut() {
            if pattern.matches(key.page()) {
                record.invalidate(reason, at);
                matched.push(key.clone());
            }
        }
        matched.sort();
        matched
    }

    pub(crate) fn invalidate_all(&mut self, reason: &str, at: DateTime<Utc>) -> usize {
        let mut count = 0;
        for record in self.records.values_mut() {
            if record.status != ValidationStatus::Invalid {
                count += 1;
            }
            record.invalidate(reason, at);
        }
        count
    }

    pub(crate) fn record_hit(&mut self, key: &CacheKey, retrieval_ms: f64) -> bool {
        match self.records.get_mut(key) {
            Some(record) => {
                record.record_hit(retrieval_ms);
                true
            },
            None => false,
        }
    }

    pub(crate) fn record_miss(&mut self, key: &CacheKey) -> bool {
        match self.records.get_mut(key) {
            Some(record) => {
                record.record_miss();
                true
            },
            None => false,
        }
    }

    pub(crate) fn summary(&self) -> StoreSummary {
        let mut summary = StoreSummary::default();
        for record in self.records.values() {
            summary.add(record);
        }
        summary
    }
}

pub(crate) fn compile_pattern(pattern: &str) -> Result<Pattern, StoreError> {
    Pattern::new(pattern).map_err(|e| StoreError::InvalidPattern {
        pattern: pattern.to_string(),
        reason: e.to_string(),
    })
}

/// Durable store kept in process memory.
///
/// Useful for tests and single-run deployments; nothing survives a restart.
#[derive(Debug, Default)]
pub struct MemoryStore {
    table: RwLock<RecordTable>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of records regardless of status.
    pub fn len(&self) -> usize {
        self.table.read().records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl DurableStore for MemoryStore {
    fn name(&self) -> &str {
        "memory"
    }

    async fn health_check(&self) -> Result<(), StoreError> {
        Ok(())
    }

    async fn upsert(&self, record: CacheRecord) -> Result<Option<CacheRecord>, StoreError> {
        debug!(key = %record.key(), "Upserting record");
        Ok(self.table.write().upsert(record))
    }

    async fn get(&self, key: &CacheKey) -> Result<Option<CacheRecord>, StoreError> {
        Ok(self.table.read().get(key))
    }

    async fn due_for_validation(
        &self,
        now: DateTime<Utc>,
        limit: usize,
    ) -> Result<Vec<CacheRecord>, StoreError> {
        Ok(self.table.read().due(now, limit))
    }

    async fn records(
        &self,
        status: Option<ValidationStatus>,
    ) -> Result<Vec<CacheRecord>, StoreError> {
        Ok(self.table.read().records(status))
    }

    async fn begin_validation(
        &self,
        key: &CacheKey,
        at: DateTime<Utc>,
    ) -> Result<bool, StoreError> {
        Ok(self.table.write().begin_validation(key, at))
    }

    async fn complete_validation(
        &self,
        key: &CacheKey,
        at: DateTime<Utc>,
    ) -> Result<bool, StoreError> {
        Ok(self.table.write().complete_validation(key, at))
    }

    async fn fail_validation(
        &self,
        key: &CacheKey,
        expected_hash: &str,
        reason: &str,
        at: DateTime<Utc>,
    ) -> Result<bool, StoreError> {
        Ok(self
            .table
            .write()
            .fail_validation(key, expected_hash, reason, at))
    }

    async fn invalidate(
        &self,
        key: &CacheKey,
        reason: &str,
        at: DateTime<Utc>,
    ) -> Result<bool, StoreError> {
        Ok(self.table.write().invalidate(key, reason, at))
    }

    async fn invalidate_pages_matching(
        &self,
        pattern: &str,
        reason: &str,
        at: DateTime<Utc>,
    ) -> Result<Vec<CacheKey>, StoreError> {
        let pattern = compile_pattern(pattern)?;
        Ok(self
            .table
            .write()
            .invalidate_pages_matching(&pattern, reason, at))
    }

    async fn invalidate_all(&self, reason: &str, at: DateTime<Utc>) -> Result<usize, StoreError> {
        Ok(self.table.write().invalidate_all(reason, at))
    }

    async fn record_hit(&self, key: &CacheKey, retrieval_ms: f64) -> Result<(), StoreError> {
        self.table.write().record_hit(key, retrieval_ms);
        Ok(())
    }

    async fn record_miss(&self, key: &CacheKey) -> Result<(), StoreError> {
        self.table.write().record_miss(key);
        Ok(())
    }

    async fn summary(&self) -> Result<StoreSummary, StoreError> {
        Ok(self.table.read().summary())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use serde_json::json;
    use vitrine_core::{CacheEntry, SourceKind, Tier};

    fn record(page: &str, widget: &str, at: DateTime<Utc>, frequency_minutes: u32) -> CacheRecord {
        let entry = CacheEntry::new(
            CacheKey::new(page, widget),
            json!({"page": page, "widget": widget}),
            SourceKind::AuthoritativeFresh,
            90,
            Tier::One,
            at,
            Duration::seconds(300),
        );
        CacheRecord::new(entry, "hash", frequency_minutes, vec![], vec![])
    }

    #[tokio::test]
    async fn test_upsert_returns_previous() {
        let store = MemoryStore::new();
        let now = Utc::now();

        assert!(store.upsert(record("home", "hero", now, 15)).await.unwrap().is_none());
        let previous = store.upsert(record("home", "hero", now, 30)).await.unwrap();

        assert_eq!(previous.unwrap().validation_frequency_minutes, 15);
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn test_find_servable_filters_status_and_expiry() {
        let store = MemoryStore::new();
        let now = Utc::now();
        let key = CacheKey::new("home", "hero");
        store.upsert(record("home", "hero", now, 15)).await.unwrap();

        assert!(store.find_servable(&key, now).await.unwrap().is_some());
        assert!(
            store
                .find_servable(&key, now + Duration::seconds(301))
                .await
                .unwrap()
                .is_none()
        );

        store.invalidate(&key, "manual", now).await.unwrap();
        assert!(store.find_servable(&key, now).await.unwrap().is_none());
        // Still present for diagnostics
        let kept = store.get(&key).await.unwrap().unwrap();
        assert_eq!(kept.invalidation_reason.as_deref(), Some("manual"));
    }

    #[tokio::test]
    async fn test_due_for_validation_orders_and_limits() {
        let store = MemoryStore::new();
        let now = Utc::now();

        store.upsert(record("a", "w", now, 10)).await.unwrap();
        store.upsert(record("b", "w", now, 5)).await.unwrap();
        store.upsert(record("c", "w", now, 60)).await.unwrap();

        let later = now + Duration::minutes(20);
        let due = store.due_for_validation(later, 10).await.unwrap();
        let keys: Vec<String> = due.iter().map(|r| r.key().to_string()).collect();
        assert_eq!(keys, vec!["b::w", "a::w"]);

        let limited = store.due_for_validation(later, 1).await.unwrap();
        assert_eq!(limited.len(), 1);
        assert_eq!(limited[0].key(), &CacheKey::new("b", "w"));
    }

    #[tokio::test]
    async fn test_validation_transitions() {
        let store = MemoryStore::new();
        let now = Utc::now();
        let key = CacheKey::new("home", "hero");
        store.upsert(record("home", "hero", now, 15)).await.unwrap();

        assert!(store.begin_validation(&key, now).await.unwrap());
        assert!(!store.begin_validation(&key, now).await.unwrap());
        // Validating records are not due again
        assert!(
            store
                .due_for_validation(now + Duration::hours(1), 10)
                .await
                .unwrap()
                .is_empty()
        );

        assert!(store.complete_validation(&key, now).await.unwrap());
        assert!(!store.complete_validation(&key, now).await.unwrap());
        assert!(!store.begin_validation(&CacheKey::new("x", "y"), now).await.unwrap());
    }

    #[tokio::test]
    async fn test_invalidate_pages_matching_and_all() {
        let store = MemoryStore::new();
        let now = Utc::now();
        store.upsert(record("home", "hero", now, 15)).await.unwrap();
        store.upsert(record("home", "footer", now, 15)).await.unwrap();
        store.upsert(record("home::promo", "hero", now, 15)).await.unwrap();
        store.upsert(record("blog", "hero", now, 15)).await.unwrap();

        let matched = store
            .invalidate_pages_matching("home", "page_changed", now)
            .await
            .unwrap();
        assert_eq!(
            matched,
            vec![CacheKey::new("home", "footer"), CacheKey::new("home", "hero")]
        );

        let matched = store
            .invalidate_pages_matching("home*", "page_changed", now)
            .await
            .unwrap();
        assert_eq!(matched.len(), 3);

        let count = store.invalidate_all("manual_clear_all", now).await.unwrap();
        assert_eq!(count, 1);

        let summary = store.summary().await.unwrap();
        assert_eq!(summary.invalid, 4);
        assert_eq!(summary.valid, 0);
    }

    #[tokio::test]
    async fn test_fail_validation_checks_hash() {
        let store = MemoryStore::new();
        let now = Utc::now();
        let key = CacheKey::new("home", "hero");
        store.upsert(record("home", "hero", now, 15)).await.unwrap();

        assert!(!store.fail_validation(&key, "hash", "validation_failed", now).await.unwrap());
        assert!(store.begin_validation(&key, now).await.unwrap());
        assert!(!store.fail_validation(&key, "other", "validation_failed", now).await.unwrap());
        assert!(store.fail_validation(&key, "hash", "validation_failed", now).await.unwrap());

        let stored = store.get(&key).await.unwrap().unwrap();
        assert_eq!(stored.status, ValidationStatus::Invalid);
        assert!(
            !store
                .fail_validation(&CacheKey::new("x", "y"), "hash", "validation_failed", now)
                .await
                .unwrap()
        );
    }

    #[tokio::test]
    async fn test_invalid_pattern() {
        let store = MemoryStore::new();
        let result = store.invalidate_pages_matching("[", "x", Utc::now()).await;
        assert!(matches!(result, Err(StoreError::InvalidPattern { .. })));
    }

    #[tokio::test]
    async fn test_hit_and_miss_counters() {
        let store = MemoryStore::new();
        let now = Utc::now();
        let key = CacheKey::new("home", "hero");
        store.upsert(record("home", "hero", now, 15)).await.unwrap();

        store.record_hit(&key, 10.0).await.unwrap();
        store.record_hit(&key, 20.0).await.unwrap();
        store.record_hit(&key, 40.0).await.unwrap();
        store.record_miss(&key).await.unwrap();
        // Unknown keys are ignored
        store.record_miss(&CacheKey::new("nope", "nope")).await.unwrap();

        let record = store.get(&key).await.unwrap().unwrap();
        assert_eq!(record.hit_count, 3);
        assert_eq!(record.miss_count, 1);
        assert!((record.average_retrieval_ms - 23.33).abs() < 0.01);

        let summary = store.summary().await.unwrap();
        assert_eq!(summary.hits, 3);
        assert_eq!(summary.misses, 1);
    }
}
