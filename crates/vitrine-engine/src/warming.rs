//! Startup warming and forced refresh.

use std::sync::atomic::{AtomicBool, Ordering};

use futures::future::join_all;
use serde::Serialize;
use tokio::sync::Mutex;
use tracing::{Instrument, debug, info, info_span, instrument, warn};
use uuid::Uuid;
use vitrine_core::{CacheKey, Location, Tier};

use crate::engine::{ContentEngine, StoreOutcome};
use crate::error::EngineError;

/// Reason recorded when a key is dropped ahead of a forced refresh.
pub const FORCE_REFRESH_REASON: &str = "force_refresh";

/// One location to populate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WarmingJob {
    pub page: String,
    pub widget: String,
    pub tier: Tier,
    pub priority: u32,
    /// Regenerate even when a fresh entry is already cached.
    pub force_refresh: bool,
}

impl WarmingJob {
    pub fn forced(location: Location) -> Self {
        Self {
            page: location.page,
            widget: location.widget,
            tier: location.tier,
            priority: location.priority,
            force_refresh: true,
        }
    }
}

/// How a single job ended.
#[derive(Debug, Clone, PartialEq)]
pub enum JobOutcome {
    Stored(Box<StoreOutcome>),
    /// A fresh entry was already cached and the job was not forced.
    AlreadyWarm,
}

/// A job that did not produce content.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct JobFailure {
    pub key: CacheKey,
    pub error: String,
}

/// Summary of a warming run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WarmingReport {
    pub run_id: String,
    pub attempted: usize,
    pub stored: usize,
    pub skipped: usize,
    pub failures: Vec<JobFailure>,
    /// The startup warm had already completed; nothing ran.
    pub already_complete: bool,
}

/// Run-once bookkeeping for startup warming.
#[derive(Debug, Default)]
pub(crate) struct WarmingState {
    completed: AtomicBool,
    running: Mutex<()>,
}

impl WarmingState {
    pub(crate) fn new() -> Self {
        Self::default()
    }
}

impl ContentEngine {
    /// Populates every tier-1 location once per engine lifetime.
    ///
    /// Jobs run `warming.batch_size` at a time and each failure only affects
    /// its own job. The startup flag is set after every job has been
    /// attempted; concurrent callers wait for the running pass and then
    /// return without warming again.
    pub async fn warmup_startup_cache(&self) -> WarmingReport {
        let run_id = Uuid::now_v7().to_string();

        if self.is_startup_warmed() {
            return WarmingReport {
                run_id,
                already_complete: true,
                ..WarmingReport::default()
            };
        }

        let _running = self.warming.running.lock().await;
        if self.is_startup_warmed() {
            return WarmingReport {
                run_id,
                already_complete: true,
                ..WarmingReport::default()
            };
        }

        let span = info_span!("startup_warming", run_id = %run_id);
        let report = self.run_warming(run_id).instrument(span).await;
        self.warming.completed.store(true, Ordering::Release);
        report
    }

    pub fn is_startup_warmed(&self) -> bool {
        self.warming.completed.load(Ordering::Acquire)
    }

    async fn run_warming(&self, run_id: String) -> WarmingReport {
        let jobs: Vec<WarmingJob> = self
            .catalog
            .locations_in(Tier::One)
            .into_iter()
            .map(WarmingJob::forced)
            .collect();

        info!(jobs = jobs.len(), batch_size = self.warming_settings.batch_size, "Starting startup warming");

        let mut report = WarmingReport {
            run_id,
            ..WarmingReport::default()
        };

        for batch in jobs.chunks(self.warming_settings.batch_size) {
            let results = join_all(batch.iter().map(|job| self.execute_job(job))).await;

            for (job, result) in batch.iter().zip(results) {
                report.attempted += 1;
                match result {
                    Ok(JobOutcome::Stored(_)) => report.stored += 1,
                    Ok(JobOutcome::AlreadyWarm) => report.skipped += 1,
                    Err(e) => {
                        let key = self.catalog.resolve(&job.page, &job.widget);
                        warn!(key = %key, error = %e, "Warming job failed");
                        report.failures.push(JobFailure {
                            key,
                            error: e.to_string(),
                        });
                    },
                }
            }
        }

        info!(
            attempted = report.attempted,
            stored = report.stored,
            failed = report.failures.len(),
            "Startup warming complete"
        );
        report
    }

    /// Runs one job: generate content and store it unless already warm.
    ///
    /// # Errors
    ///
    /// Returns `EngineError::Generation` when the generator fails.
    pub async fn execute_job(&self, job: &WarmingJob) -> Result<JobOutcome, EngineError> {
        let key = self.catalog.resolve(&job.page, &job.widget);

        if !job.force_refresh && self.volatile.get(&key, self.clock.now()).await.is_some() {
            debug!(key = %key, "Already warm, skipping");
            self.metrics.record_warming_job("skipped");
            return Ok(JobOutcome::AlreadyWarm);
        }

        let outcome = self.generate_and_store(job).await?;
        Ok(JobOutcome::Stored(Box::new(outcome)))
    }

    async fn generate_and_store(&self, job: &WarmingJob) -> Result<StoreOutcome, EngineError> {
        let generated = match self.generator.generate(&job.page, &job.widget).await {
            Ok(generated) => generated,
            Err(e) => {
                self.metrics.record_warming_job("failed");
                let key = self.catalog.resolve(&job.page, &job.widget);
                return Err(EngineError::generation(&key, e));
            },
        };

        let outcome = self
            .store_content(
                &job.page,
                &job.widget,
                generated.content,
                generated.source_kind,
                generated.confidence_score,
            )
            .await;

        self.metrics.record_warming_job("stored");
        Ok(outcome)
    }

    /// Drops the cached entry for a location and synchronously regenerates it.
    ///
    /// # Errors
    ///
    /// Returns `EngineError::Generation` when the generator fails; the key
    /// stays invalidated in that case.
    #[instrument(skip_all, fields(page = %page, widget = %widget))]
    pub async fn force_refresh(&self, page: &str, widget: &str) -> Result<StoreOutcome, EngineError> {
        let key = self.catalog.resolve(page, widget);
        self.invalidate_key(&key, FORCE_REFRESH_REASON, self.clock.now())
            .await;

        let job = WarmingJob {
            page: key.page().to_string(),
            widget: key.widget().to_string(),
            tier: self.catalog.tier_of(page),
            priority: 0,
            force_refresh: true,
        };

        let outcome = self.generate_and_store(&job).await?;
        info!(key = %key, "Content force-refreshed");
        Ok(outcome)
    }
}
