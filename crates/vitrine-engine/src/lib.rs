//! # Vitrine Engine
//!
//! Tiered content cache for (page, widget) locations: volatile and durable
//! layers, startup warming, dependency-aware invalidation and background
//! revalidation.
//!
//! ```ignore
//! use std::sync::Arc;
//! use vitrine_engine::{ContentEngine, ValidationScheduler, RunState};
//!
//! let engine = Arc::new(ContentEngine::builder(catalog, store, generator).build());
//! engine.warmup_startup_cache().await;
//! let handle = ValidationScheduler::with_defaults(engine.clone(), Arc::new(RunState::new())).start();
//! ```

pub mod cache;
pub mod engine;
pub mod error;
pub mod metrics;
pub mod schedule;
pub mod settings;
pub mod stats;
pub mod validator;
pub mod warming;

pub use cache::{
    CLEAR_ALL_REASON, CascadeStep, ClearReport, DependencyGraph, InvalidatedKey,
    InvalidationReport, VolatileStore,
};
pub use engine::{CacheLayer, ContentEngine, ContentHit, ContentLookup, EngineBuilder, StoreOutcome};
pub use error::EngineError;
pub use schedule::{RunState, ScheduleConfig, ScheduleHandle, ValidationScheduler};
pub use settings::{CascadeMode, EngineSettings, SettingsError, StoreKind};
pub use stats::{CacheStatistics, StatsRecorder};
pub use validator::{
    VALIDATION_ERROR_REASON, VALIDATION_FAILED_REASON, ValidatingGuard, ValidationReport,
};
pub use warming::{FORCE_REFRESH_REASON, JobFailure, JobOutcome, WarmingJob, WarmingReport};

// Re-export the collaborator crates for consumers
pub use vitrine_core;
pub use vitrine_sources;
pub use vitrine_store;
