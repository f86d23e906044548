//! Background revalidation of durable records.

use std::collections::HashSet;

use futures::future::join_all;
use parking_lot::Mutex;
use serde::Serialize;
use tracing::{Instrument, debug, info, info_span, warn};
use uuid::Uuid;
use vitrine_core::{CacheKey, CacheRecord, content_hash};

use crate::engine::ContentEngine;

/// Reason recorded when a check fails.
pub const VALIDATION_FAILED_REASON: &str = "validation_failed";

/// Reason recorded when a check or the store errors mid-validation.
pub const VALIDATION_ERROR_REASON: &str = "validation_error";

/// Keys currently being validated, shared by every pass.
#[derive(Debug, Default)]
pub struct ValidatingGuard {
    keys: Mutex<HashSet<CacheKey>>,
}

impl ValidatingGuard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claims `key` for validation. Returns `None` if another pass holds it.
    /// The claim is released when the returned permit drops.
    pub fn try_acquire(&self, key: &CacheKey) -> Option<ValidatingPermit<'_>> {
        self.keys.lock().insert(key.clone()).then(|| ValidatingPermit {
            guard: self,
            key: key.clone(),
        })
    }

    pub fn contains(&self, key: &CacheKey) -> bool {
        self.keys.lock().contains(key)
    }

    pub fn len(&self) -> usize {
        self.keys.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.lock().is_empty()
    }
}

/// Exclusive claim on one key; releases it on drop.
#[derive(Debug)]
pub struct ValidatingPermit<'a> {
    guard: &'a ValidatingGuard,
    key: CacheKey,
}

impl Drop for ValidatingPermit<'_> {
    fn drop(&mut self) {
        self.guard.keys.lock().remove(&self.key);
    }
}

/// What happened to one candidate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Verdict {
    Passed,
    Failed,
    /// Claimed elsewhere or no longer due.
    Skipped,
    /// Marked invalid after an error.
    Errored,
}

impl Verdict {
    fn as_str(self) -> &'static str {
        match self {
            Self::Passed => "passed",
            Self::Failed => "failed",
            Self::Skipped => "skipped",
            Self::Errored => "error",
        }
    }
}

/// Summary of one validation pass.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationReport {
    pub run_id: String,
    /// Due records returned by the store.
    pub candidates: usize,
    pub passed: usize,
    pub failed: usize,
    pub skipped: usize,
    pub errors: usize,
    /// Set when the due query itself failed.
    pub store_error: Option<String>,
}

impl ValidationReport {
    fn tally(&mut self, verdict: Verdict) {
        match verdict {
            Verdict::Passed => self.passed += 1,
            Verdict::Failed => self.failed += 1,
            Verdict::Skipped => self.skipped += 1,
            Verdict::Errored => self.errors += 1,
        }
    }
}

impl ContentEngine {
    /// Revalidates records whose `next_validation_at` has passed.
    ///
    /// At most `validation.batch_limit` records are picked up, processed
    /// `validation.batch_size` at a time. Records passing every selected
    /// check are rescheduled; any failing check invalidates the record with
    /// `validation_failed`. A key already being validated by another pass is
    /// skipped.
    pub async fn validate_cached_content(&self) -> ValidationReport {
        let run_id = Uuid::now_v7().to_string();
        let span = info_span!("validation_pass", run_id = %run_id);
        self.run_validation_pass(run_id).instrument(span).await
    }

    async fn run_validation_pass(&self, run_id: String) -> ValidationReport {
        let mut report = ValidationReport {
            run_id,
            ..ValidationReport::default()
        };

        let now = self.clock.now();
        let due = match self
            .durable
            .due_for_validation(now, self.validation_settings.batch_limit)
            .await
        {
            Ok(due) => due,
            Err(e) => {
                warn!(store = %self.durable.name(), error = %e, "Could not query records due for validation");
                report.store_error = Some(e.to_string());
                return report;
            },
        };
        report.candidates = due.len();

        if due.is_empty() {
            debug!("No records due for validation");
            return report;
        }

        for batch in due.chunks(self.validation_settings.batch_size) {
            let verdicts = join_all(batch.iter().map(|record| self.validate_record(record.key()))).await;
            for verdict in verdicts {
                self.metrics.record_validation(verdict.as_str());
                report.tally(verdict);
            }
        }

        info!(
            candidates = report.candidates,
            passed = report.passed,
            failed = report.failed,
            skipped = report.skipped,
            errors = report.errors,
            "Validation pass complete"
        );
        report
    }

    async fn validate_record(&self, key: &CacheKey) -> Verdict {
        let Some(_permit) = self.validating.try_acquire(key) else {
            debug!(key = %key, "Already being validated, skipping");
            return Verdict::Skipped;
        };

        let now = self.clock.now();

        // Re-read under the claim: an earlier pass may have finished with
        // this key after our due query ran.
        let record = match self.durable.get(key).await {
            Ok(Some(record)) if record.is_due(now) => record,
            Ok(_) => return Verdict::Skipped,
            Err(e) => return self.fail_with_error(key, &e.to_string()).await,
        };

        match self.durable.begin_validation(key, now).await {
            Ok(true) => {},
            Ok(false) => return Verdict::Skipped,
            Err(e) => return self.fail_with_error(key, &e.to_string()).await,
        }

        self.run_checks(record).await
    }

    async fn run_checks(&self, record: CacheRecord) -> Verdict {
        let key = record.key().clone();
        let selection = self.catalog.checks_for(key.page());

        let outcome = match self.pipeline.run(&record, selection).await {
            Ok(outcome) => outcome,
            Err(e) => {
                warn!(key = %key, error = %e, "Validation errored, marking invalid");
                return self
                    .fail_checked(&record, VALIDATION_ERROR_REASON, Verdict::Errored)
                    .await;
            },
        };

        if !outcome.passed() {
            for failure in outcome.failures() {
                info!(key = %key, check = %failure.check, detail = %failure.detail, "Validation check failed");
            }
            return self
                .fail_checked(&record, VALIDATION_FAILED_REASON, Verdict::Failed)
                .await;
        }

        match self.durable.complete_validation(&key, self.clock.now()).await {
            Ok(true) => {
                debug!(key = %key, "Validation passed, rescheduled");
                Verdict::Passed
            },
            // Invalidated or replaced while the checks ran.
            Ok(false) => Verdict::Skipped,
            Err(e) => {
                warn!(key = %key, error = %e, "Validation errored, marking invalid");
                self.fail_checked(&record, VALIDATION_ERROR_REASON, Verdict::Errored)
                    .await
            },
        }
    }

    /// Invalidates the checked record in both stores, unless it was replaced
    /// or invalidated while its checks ran.
    async fn fail_checked(&self, record: &CacheRecord, reason: &str, verdict: Verdict) -> Verdict {
        let key = record.key();
        let expected = record.content_hash.as_str();

        match self
            .durable
            .fail_validation(key, expected, reason, self.clock.now())
            .await
        {
            Ok(true) => {
                self.volatile.invalidate(key).await;
                self.metrics.record_invalidation(reason);
                debug!(key = %key, reason = %reason, "Key invalidated");
                verdict
            },
            Ok(false) => {
                debug!(key = %key, "Record changed during validation, leaving it");
                Verdict::Skipped
            },
            Err(e) => {
                warn!(key = %key, reason = %reason, error = %e, "Durable invalidation failed");
                // Only evict the volatile copy of the content that was checked.
                let checked = self
                    .volatile
                    .peek(key)
                    .await
                    .is_some_and(|entry| content_hash(&entry.content) == expected);
                if checked {
                    self.volatile.invalidate(key).await;
                    self.metrics.record_invalidation(reason);
                }
                Verdict::Errored
            },
        }
    }

    async fn fail_with_error(&self, key: &CacheKey, error: &str) -> Verdict {
        warn!(key = %key, error = %error, "Validation errored, marking invalid");
        self.invalidate_key(key, VALIDATION_ERROR_REASON, self.clock.now())
            .await;
        Verdict::Errored
    }
}
