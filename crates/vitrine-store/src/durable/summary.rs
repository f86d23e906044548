//! Aggregate counts over a store.

use serde::Serialize;
use vitrine_core::{CacheRecord, ValidationStatus};

/// Record counts by status plus summed hit/miss counters.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StoreSummary {
    pub total: usize,
    pub valid: usize,
    pub validating: usize,
    pub invalid: usize,
    pub hits: u64,
    pub misses: u64,
    /// Hit-weighted mean of the per-record average retrieval times.
    pub average_retrieval_ms: f64,
}

impl StoreSummary {
    pub(crate) fn add(&mut self, record: &CacheRecord) {
        self.total += 1;
        match record.status {
            ValidationStatus::Valid => self.valid += 1,
            ValidationStatus::Validating => self.validating += 1,
            ValidationStatus::Invalid => self.invalid += 1,
        }

        let combined = self.hits + record.hit_count;
        if combined > 0 {
            self.average_retrieval_ms = (self.average_retrieval_ms * self.hits as f64
                + record.average_retrieval_ms * record.hit_count as f64)
                / combined as f64;
        }
        self.hits = combined;
        self.misses += record.miss_count;
    }

    /// Fraction of lookups that hit, 0 when nothing was looked up.
    pub fn hit_rate(&self) -> f64 {
        let total = (self.hits + self.misses) as f64;
        if total == 0.0 { 0.0 } else { self.hits as f64 / total }
    }
}
