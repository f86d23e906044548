//! Validation run state tracking.

use std::time::{Duration, Instant};

use parking_lot::RwLock;

use crate::validator::ValidationReport;

/// Tracks the outcome of scheduled validation passes.
#[derive(Debug, Default)]
pub struct RunState {
    /// The last completed pass.
    last_report: RwLock<Option<ValidationReport>>,
    /// When the last successful pass finished.
    last_success: RwLock<Option<Instant>>,
    /// The last error message, if any.
    last_error: RwLock<Option<String>>,
    /// Number of consecutive failed passes.
    failure_count: RwLock<u32>,
    /// Passes run since startup.
    runs: RwLock<u64>,
}

impl RunState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a pass that reached the store.
    pub fn record_success(&self, report: ValidationReport) {
        let mut last_report = self.last_report.write();
        let mut last_success = self.last_success.write();
        let mut last_error = self.last_error.write();
        let mut failure_count = self.failure_count.write();
        let mut runs = self.runs.write();

        *last_report = Some(report);
        *last_success = Some(Instant::now());
        *last_error = None;
        *failure_count = 0;
        *runs += 1;
    }

    /// Records a pass that could not query the store.
    pub fn record_failure(&self, error: impl Into<String>) {
        let mut last_error = self.last_error.write();
        let mut failure_count = self.failure_count.write();
        let mut runs = self.runs.write();

        *last_error = Some(error.into());
        *failure_count += 1;
        *runs += 1;
    }

    pub fn last_report(&self) -> Option<ValidationReport> {
        self.last_report.read().clone()
    }

    pub fn last_error(&self) -> Option<String> {
        self.last_error.read().clone()
    }

    /// Returns the number of consecutive failures.
    pub fn failure_count(&self) -> u32 {
        *self.failure_count.read()
    }

    pub fn runs(&self) -> u64 {
        *self.runs.read()
    }

    /// Time since the last successful pass.
    pub fn time_since_success(&self) -> Option<Duration> {
        self.last_success.read().map(|t| t.elapsed())
    }

    /// True once a pass succeeded and no failure followed it.
    pub fn is_healthy(&self) -> bool {
        self.last_success.read().is_some() && self.last_error.read().is_none()
    }
}
