//! Recurring validation scheduler.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::watch;
use tokio::time::{MissedTickBehavior, interval};
use tracing::{debug, info, warn};

use super::RunState;
use crate::engine::ContentEngine;
use crate::settings::ValidationSettings;
use crate::validator::ValidationReport;

/// Configuration for the validation scheduler.
#[derive(Debug, Clone, PartialEq)]
pub struct ScheduleConfig {
    /// Interval between validation passes.
    pub interval: Duration,
    /// Consecutive failed passes before backing off.
    pub max_failures: u32,
    pub backoff_multiplier: f64,
    pub max_backoff: Duration,
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self::from(&ValidationSettings::default())
    }
}

impl From<&ValidationSettings> for ScheduleConfig {
    fn from(settings: &ValidationSettings) -> Self {
        Self {
            interval: settings.interval(),
            max_failures: settings.max_failures,
            backoff_multiplier: settings.backoff_multiplier,
            max_backoff: settings.max_backoff(),
        }
    }
}

/// Handle for stopping a running scheduler. Dropping it also stops it.
pub struct ScheduleHandle {
    shutdown_tx: watch::Sender<bool>,
    task: Option<tokio::task::JoinHandle<()>>,
}

impl ScheduleHandle {
    /// Signals the scheduler to stop after the current pass.
    pub fn stop(&self) {
        let _ = self.shutdown_tx.send(true);
    }

    /// Stops the scheduler and waits for its loop to exit.
    pub async fn shutdown(mut self) {
        self.stop();
        if let Some(task) = self.task.take()
            && let Err(e) = task.await
        {
            warn!(error = %e, "Validation scheduler task ended abnormally");
        }
    }
}

impl Drop for ScheduleHandle {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Runs `validate_cached_content` on an interval with failure backoff.
pub struct ValidationScheduler {
    engine: Arc<ContentEngine>,
    state: Arc<RunState>,
    config: ScheduleConfig,
    current_backoff: Arc<Mutex<Duration>>,
}

impl ValidationScheduler {
    pub fn new(engine: Arc<ContentEngine>, state: Arc<RunState>, config: ScheduleConfig) -> Self {
        Self {
            engine,
            state,
            current_backoff: Arc::new(Mutex::new(config.interval)),
            config,
        }
    }

    /// Scheduler configured from the engine's validation settings.
    pub fn with_defaults(engine: Arc<ContentEngine>, state: Arc<RunState>) -> Self {
        let config = ScheduleConfig::from(&engine.validation_settings);
        Self::new(engine, state, config)
    }

    /// Spawns the scheduler loop. The first pass runs one interval from now.
    pub fn start(self) -> ScheduleHandle {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let task = tokio::spawn(self.run(shutdown_rx));
        ScheduleHandle {
            shutdown_tx,
            task: Some(task),
        }
    }

    async fn run(self, mut shutdown_rx: watch::Receiver<bool>) {
        let mut timer = interval(self.config.interval);
        timer.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // the first tick completes immediately
        timer.tick().await;

        info!(interval = ?self.config.interval, "Starting validation scheduler");

        loop {
            tokio::select! {
                _ = timer.tick() => {
                    self.do_run().await;

                    let current = *self.current_backoff.lock();
                    if current != timer.period() {
                        timer = interval(current);
                        timer.set_missed_tick_behavior(MissedTickBehavior::Delay);
                        timer.tick().await;
                    }
                }
                result = shutdown_rx.changed() => {
                    if result.is_err() || *shutdown_rx.borrow() {
                        info!("Validation scheduler shutting down");
                        break;
                    }
                }
            }
        }
    }

    async fn do_run(&self) {
        debug!("Starting scheduled validation pass");
        let report = self.engine.validate_cached_content().await;
        self.record(report);
    }

    fn record(&self, report: ValidationReport) {
        match report.store_error.clone() {
            None => {
                self.state.record_success(report);
                self.reset_backoff();
            },
            Some(error) => {
                self.state.record_failure(&error);
                self.increase_backoff();
                warn!(error = %error, "Scheduled validation pass failed");
            },
        }
    }

    fn reset_backoff(&self) {
        *self.current_backoff.lock() = self.config.interval;
    }

    fn increase_backoff(&self) {
        let mut backoff = self.current_backoff.lock();
        let failure_count = self.state.failure_count();

        if failure_count >= self.config.max_failures {
            let next =
                Duration::from_secs_f64(backoff.as_secs_f64() * self.config.backoff_multiplier);
            *backoff = next.min(self.config.max_backoff);

            debug!(
                backoff = ?*backoff,
                failures = failure_count,
                "Increased validation backoff"
            );
        }
    }

    /// Current delay between passes.
    pub fn current_interval(&self) -> Duration {
        *self.current_backoff.lock()
    }

    /// Runs one pass now, outside the schedule.
    pub async fn trigger(&self) -> ValidationReport {
        info!("Manual validation pass triggered");
        let report = self.engine.validate_cached_content().await;
        self.record(report.clone());
        report
    }
}
