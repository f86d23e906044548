//! Validation pipeline boundary.
//!
//! A pipeline is a set of independently named checks. Every check selected
//! for an entry must pass for the entry to stay valid.

mod checks;

pub use checks::{DuplicateContentCheck, MappingConsistencyCheck, PlaceholderContentCheck};

use std::sync::Arc;

use async_trait::async_trait;
use futures::future::join_all;
use tracing::warn;
use vitrine_core::CacheRecord;
use vitrine_store::DurableStore;

use crate::error::CheckError;

/// Verdict of a single check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckOutcome {
    pub passed: bool,
    pub detail: String,
}

impl CheckOutcome {
    pub fn pass(detail: impl Into<String>) -> Self {
        Self {
            passed: true,
            detail: detail.into(),
        }
    }

    pub fn fail(detail: impl Into<String>) -> Self {
        Self {
            passed: false,
            detail: detail.into(),
        }
    }
}

/// A named correctness check run against cached content.
#[async_trait]
pub trait ValidationCheck: Send + Sync {
    /// Stable name used in configuration and logs.
    fn name(&self) -> &str;

    /// Runs the check.
    ///
    /// # Errors
    ///
    /// Returns an error only when no verdict could be reached.
    async fn check(&self, record: &CacheRecord) -> Result<CheckOutcome, CheckError>;
}

/// Named verdict as reported by a pipeline run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckResult {
    pub check: String,
    pub passed: bool,
    pub detail: String,
}

/// Result of running the selected checks on one record.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PipelineOutcome {
    pub results: Vec<CheckResult>,
}

impl PipelineOutcome {
    /// True when every check that ran passed.
    pub fn passed(&self) -> bool {
        self.results.iter().all(|result| result.passed)
    }

    /// Checks that did not pass.
    pub fn failures(&self) -> impl Iterator<Item = &CheckResult> {
        self.results.iter().filter(|result| !result.passed)
    }
}

/// Ordered set of checks run concurrently against a record.
#[derive(Clone, Default)]
pub struct ValidationPipeline {
    checks: Vec<Arc<dyn ValidationCheck>>,
}

impl ValidationPipeline {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mapping consistency plus duplicate detection against `store`.
    pub fn standard(store: Arc<dyn DurableStore>) -> Self {
        Self::new()
            .with_check(Arc::new(MappingConsistencyCheck))
            .with_check(Arc::new(DuplicateContentCheck::new(store)))
    }

    /// Adds a check to the pipeline.
    pub fn with_check(mut self, check: Arc<dyn ValidationCheck>) -> Self {
        self.checks.push(check);
        self
    }

    /// Names of the configured checks, in order.
    pub fn check_names(&self) -> Vec<&str> {
        self.checks.iter().map(|check| check.name()).collect()
    }

    pub fn len(&self) -> usize {
        self.checks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.checks.is_empty()
    }

    /// Runs the checks named in `selection` (all checks when `None`).
    ///
    /// Selected names that match no configured check are logged and ignored.
    ///
    /// # Errors
    ///
    /// Returns the first check error in pipeline order; the verdicts of the
    /// other checks are discarded in that case.
    pub async fn run(
        &self,
        record: &CacheRecord,
        selection: Option<&[String]>,
    ) -> Result<PipelineOutcome, CheckError> {
        if let Some(names) = selection {
            for name in names {
                if !self.checks.iter().any(|check| check.name() == name) {
                    warn!(key = %record.key(), check = %name, "Unknown validation check selected");
                }
            }
        }

        let selected: Vec<&Arc<dyn ValidationCheck>> = self
            .checks
            .iter()
            .filter(|check| selection.is_none_or(|names| names.iter().any(|n| n == check.name())))
            .collect();

        let verdicts = join_all(selected.iter().map(|check| check.check(record))).await;

        let mut results = Vec::with_capacity(selected.len());
        for (check, verdict) in selected.iter().zip(verdicts) {
            let outcome = verdict?;
            results.push(CheckResult {
                check: check.name().to_string(),
                passed: outcome.passed,
                detail: outcome.detail,
            });
        }

        Ok(PipelineOutcome { results })
    }
}

impl std::fmt::Debug for ValidationPipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ValidationPipeline")
            .field("checks", &self.check_names())
            .finish()
    }
}
