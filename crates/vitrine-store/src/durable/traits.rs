//! Durable store trait definition.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use vitrine_core::{CacheKey, CacheRecord, ValidationStatus};

use super::StoreSummary;
use crate::error::StoreError;

/// A persistent backing store for cache records.
///
/// Records are keyed by [`CacheKey`] and are never hard-deleted during normal
/// operation: invalidation flips the status to `Invalid` and keeps the record
/// for diagnostics.
///
/// # Implementors
///
/// - `MemoryStore` - in-process table, lost on restart
/// - `FileStore` - in-process table persisted as a JSON snapshot
///
/// # Example
///
/// ```ignore
/// use vitrine_store::{DurableStore, MemoryStore};
///
/// let store = MemoryStore::new();
/// store.upsert(record).await?;
/// let due = store.due_for_validation(now, 50).await?;
/// ```
#[async_trait]
pub trait DurableStore: Send + Sync {
    /// Returns the name of this store, used for logging.
    fn name(&self) -> &str;

    /// Verifies the backend is reachable.
    async fn health_check(&self) -> Result<(), StoreError>;

    /// Inserts or replaces the record for its key and returns the previous one.
    async fn upsert(&self, record: CacheRecord) -> Result<Option<CacheRecord>, StoreError>;

    /// Point read regardless of status.
    async fn get(&self, key: &CacheKey) -> Result<Option<CacheRecord>, StoreError>;

    /// Returns the record only when it is valid and `expires_at > now`.
    async fn find_servable(
        &self,
        key: &CacheKey,
        now: DateTime<Utc>,
    ) -> Result<Option<CacheRecord>, StoreError> {
        Ok(self.get(key).await?.filter(|record| record.is_servable(now)))
    }

    /// Valid records with `next_validation_at <= now`, oldest schedule first,
    /// at most `limit` of them.
    async fn due_for_validation(
        &self,
        now: DateTime<Utc>,
        limit: usize,
    ) -> Result<Vec<CacheRecord>, StoreError>;

    /// All records, optionally filtered by status, ordered by key.
    async fn records(
        &self,
        status: Option<ValidationStatus>,
    ) -> Result<Vec<CacheRecord>, StoreError>;

    /// `Valid -> Validating`. Returns false if the record is missing or not valid.
    async fn begin_validation(&self, key: &CacheKey, at: DateTime<Utc>)
    -> Result<bool, StoreError>;

    /// `Validating -> Valid` and reschedules the next check. Returns false if
    /// the record is missing or no longer validating.
    async fn complete_validation(
        &self,
        key: &CacheKey,
        at: DateTime<Utc>,
    ) -> Result<bool, StoreError>;

    /// `Validating -> Invalid`, but only while the stored record still carries
    /// `expected_hash`. Returns false if the record is missing, was replaced,
    /// or left `Validating` in the meantime.
    async fn fail_validation(
        &self,
        key: &CacheKey,
        expected_hash: &str,
        reason: &str,
        at: DateTime<Utc>,
    ) -> Result<bool, StoreError>;

    /// Marks a record invalid with a reason. Returns false if there is no record.
    async fn invalidate(
        &self,
        key: &CacheKey,
        reason: &str,
        at: DateTime<Utc>,
    ) -> Result<bool, StoreError>;

    /// Invalidates every record whose page id matches a glob pattern.
    /// Returns the affected keys, sorted.
    async fn invalidate_pages_matching(
        &self,
        pattern: &str,
        reason: &str,
        at: DateTime<Utc>,
    ) -> Result<Vec<CacheKey>, StoreError>;

    /// Marks every record invalid. Returns how many changed status.
    async fn invalidate_all(&self, reason: &str, at: DateTime<Utc>) -> Result<usize, StoreError>;

    /// Increments the hit counter and folds `retrieval_ms` into the running
    /// average. A missing record is not an error.
    async fn record_hit(&self, key: &CacheKey, retrieval_ms: f64) -> Result<(), StoreError>;

    /// Increments the miss counter. A missing record is not an error.
    async fn record_miss(&self, key: &CacheKey) -> Result<(), StoreError>;

    /// Aggregate counts for statistics.
    async fn summary(&self) -> Result<StoreSummary, StoreError>;
}
