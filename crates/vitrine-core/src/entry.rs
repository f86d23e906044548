//! Cache entries (volatile) and cache records (durable).

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::key::CacheKey;
use crate::types::{SourceKind, Tier, ValidationStatus};

/// Highest confidence score an entry can carry.
pub const MAX_CONFIDENCE: u8 = 100;

/// Content held for one (page, widget) location.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheEntry {
    pub key: CacheKey,
    pub content: Value,
    pub source_kind: SourceKind,
    /// Always within `0..=100`.
    pub confidence_score: u8,
    pub tier: Tier,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl CacheEntry {
    /// Builds an entry living `ttl` from `created_at`. The confidence score is
    /// clamped to 100.
    pub fn new(
        key: CacheKey,
        content: Value,
        source_kind: SourceKind,
        confidence_score: u8,
        tier: Tier,
        created_at: DateTime<Utc>,
        ttl: Duration,
    ) -> Self {
        Self {
            key,
            content,
            source_kind,
            confidence_score: confidence_score.min(MAX_CONFIDENCE),
            tier,
            created_at,
            expires_at: created_at + ttl,
        }
    }

    /// An entry is fresh only while `expires_at > now`.
    pub fn is_fresh(&self, now: DateTime<Utc>) -> bool {
        self.expires_at > now
    }

    /// Age in milliseconds, never negative.
    pub fn age_ms(&self, now: DateTime<Utc>) -> u64 {
        (now - self.created_at).num_milliseconds().max(0) as u64
    }

    /// Time left before expiry, or `None` once expired.
    pub fn remaining(&self, now: DateTime<Utc>) -> Option<std::time::Duration> {
        (self.expires_at - now)
            .to_std()
            .ok()
            .filter(|d| !d.is_zero())
    }
}

/// Durable form of an entry plus validation and statistics bookkeeping.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheRecord {
    #[serde(flatten)]
    pub entry: CacheEntry,
    pub content_hash: String,
    pub status: ValidationStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub invalidation_reason: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_validated_at: Option<DateTime<Utc>>,
    pub validation_frequency_minutes: u32,
    pub next_validation_at: DateTime<Utc>,
    /// Keys that depend on this one.
    #[serde(default)]
    pub dependents: Vec<CacheKey>,
    /// Keys this one depends on.
    #[serde(default)]
    pub dependencies: Vec<CacheKey>,
    #[serde(default)]
    pub hit_count: u64,
    #[serde(default)]
    pub miss_count: u64,
    #[serde(default)]
    pub average_retrieval_ms: f64,
    pub updated_at: DateTime<Utc>,
}

impl CacheRecord {
    /// Creates a valid record whose first validation is due one
    /// `validation_frequency_minutes` after the entry was created.
    pub fn new(
        entry: CacheEntry,
        content_hash: impl Into<String>,
        validation_frequency_minutes: u32,
        dependencies: Vec<CacheKey>,
        dependents: Vec<CacheKey>,
    ) -> Self {
        let created_at = entry.created_at;
        Self {
            entry,
            content_hash: content_hash.into(),
            status: ValidationStatus::Valid,
            invalidation_reason: None,
            last_validated_at: None,
            validation_frequency_minutes,
            next_validation_at: created_at
                + Duration::minutes(i64::from(validation_frequency_minutes)),
            dependents,
            dependencies,
            hit_count: 0,
            miss_count: 0,
            average_retrieval_ms: 0.0,
            updated_at: created_at,
        }
    }

    pub fn key(&self) -> &CacheKey {
        &self.entry.key
    }

    /// Valid and not yet expired.
    pub fn is_servable(&self, now: DateTime<Utc>) -> bool {
        self.status == ValidationStatus::Valid && self.entry.is_fresh(now)
    }

    /// Valid and past its scheduled re-check time.
    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        self.status == ValidationStatus::Valid && self.next_validation_at <= now
    }

    /// Applies one hit with the given retrieval latency.
    pub fn record_hit(&mut self, retrieval_ms: f64) {
        self.average_retrieval_ms =
            running_average(self.average_retrieval_ms, self.hit_count, retrieval_ms);
        self.hit_count += 1;
    }

    pub fn record_miss(&mut self) {
        self.miss_count += 1;
    }

    /// `Valid -> Validating`. Returns false when the record is not valid.
    pub fn begin_validation(&mut self, at: DateTime<Utc>) -> bool {
        if !self.status.can_transition_to(ValidationStatus::Validating) {
            return false;
        }
        self.status = ValidationStatus::Validating;
        self.updated_at = at;
        true
    }

    /// `Validating -> Valid` and schedules the next check. Returns false when
    /// the record is not currently validating (e.g. it was invalidated meanwhile).
    pub fn complete_validation(&mut self, at: DateTime<Utc>) -> bool {
        if self.status != ValidationStatus::Validating {
            return false;
        }
        self.status = ValidationStatus::Valid;
        self.last_validated_at = Some(at);
        self.next_validation_at =
            at + Duration::minutes(i64::from(self.validation_frequency_minutes));
        self.updated_at = at;
        true
    }

    /// `Validating -> Invalid`, only while the record still holds the
    /// content that was checked. Returns false when the record was replaced
    /// or its status changed after validation began.
    pub fn fail_validation(
        &mut self,
        expected_hash: &str,
        reason: impl Into<String>,
        at: DateTime<Utc>,
    ) -> bool {
        if self.status != ValidationStatus::Validating || self.content_hash != expected_hash {
            return false;
        }
        self.invalidate(reason, at);
        true
    }

    /// Marks the record invalid from any state.
    pub fn invalidate(&mut self, reason: impl Into<String>, at: DateTime<Utc>) {
        self.status = ValidationStatus::Invalid;
        self.invalidation_reason = Some(reason.into());
        self.updated_at = at;
    }
}

/// Incremental mean: `count == 0 ? sample : (avg * count + sample) / (count + 1)`.
///
/// # Example
///
/// ```
/// use vitrine_core::running_average;
///
/// let avg = running_average(0.0, 0, 10.0);
/// let avg = running_average(avg, 1, 20.0);
/// assert_eq!(avg, 15.0);
/// ```
pub fn running_average(average: f64, count: u64, sample: f64) -> f64 {
    if count == 0 {
        sample
    } else {
        let count = count as f64;
        (average * count + sample) / (count + 1.0)
    }
}
