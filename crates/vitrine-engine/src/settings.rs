//! Engine settings.
//!
//! Settings are layered: built-in defaults, then an optional TOML file
//! (`vitrine.toml` in the working directory, or the path in `VITRINE_CONFIG`),
//! then environment variables prefixed with `VITRINE__`, using `__` between
//! sections, e.g. `VITRINE__CACHE__CASCADE_MODE=two_hop`.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use config::{Config, Environment, File};
use serde::Deserialize;
use thiserror::Error;

/// Default settings file, looked up relative to the working directory.
pub const DEFAULT_CONFIG_BASENAME: &str = "vitrine";

/// Environment variable naming an explicit settings file.
pub const CONFIG_PATH_VAR: &str = "VITRINE_CONFIG";

/// How far an invalidation cascades through the dependency graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CascadeMode {
    /// Breadth-first over the full dependent closure, cycle-safe.
    #[default]
    Closure,
    /// Direct dependents and their direct dependents only.
    TwoHop,
}

impl CascadeMode {
    /// Deepest hop visited, `None` for unbounded.
    pub fn max_depth(self) -> Option<usize> {
        match self {
            Self::Closure => None,
            Self::TwoHop => Some(2),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StoreKind {
    #[default]
    Memory,
    File,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct CacheSettings {
    /// Maximum entries held by the volatile store.
    pub max_capacity: u64,
    pub cascade_mode: CascadeMode,
    /// Invalidate dependents when a store replaces content with a different hash.
    pub invalidate_dependents_on_change: bool,
    /// Write hit/miss statistics from a spawned task instead of inline.
    pub detached_stats: bool,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            max_capacity: 10_000,
            cascade_mode: CascadeMode::Closure,
            invalidate_dependents_on_change: false,
            detached_stats: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct WarmingSettings {
    /// Jobs run concurrently per batch.
    pub batch_size: usize,
}

impl Default for WarmingSettings {
    fn default() -> Self {
        Self { batch_size: 3 }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct ValidationSettings {
    /// Records validated concurrently per sub-batch.
    pub batch_size: usize,
    /// Most records picked up by one pass.
    pub batch_limit: usize,
    pub interval_seconds: u64,
    /// Consecutive failed passes before the interval backs off.
    pub max_failures: u32,
    pub backoff_multiplier: f64,
    pub max_backoff_seconds: u64,
}

impl ValidationSettings {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_seconds.max(1))
    }

    pub fn max_backoff(&self) -> Duration {
        Duration::from_secs(self.max_backoff_seconds.max(self.interval_seconds).max(1))
    }
}

impl Default for ValidationSettings {
    fn default() -> Self {
        Self {
            batch_size: 2,
            batch_limit: 50,
            interval_seconds: 300,
            max_failures: 3,
            backoff_multiplier: 2.0,
            max_backoff_seconds: 3600,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct StoreSettings {
    pub kind: StoreKind,
    /// Snapshot location for the file store.
    pub path: PathBuf,
}

impl Default for StoreSettings {
    fn default() -> Self {
        Self {
            kind: StoreKind::Memory,
            path: PathBuf::from("data/vitrine-records.json"),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct CatalogSettings {
    /// YAML catalog; without one every page is tier 3 with no dependencies.
    pub path: Option<PathBuf>,
    /// Add the placeholder phrase check to the validation pipeline.
    pub placeholder_check: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct MetricsSettings {
    /// Address for the Prometheus scrape endpoint; metrics are off when unset.
    pub listen: Option<SocketAddr>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct LoggingSettings {
    /// Default filter directive, overridden by `RUST_LOG`.
    pub level: String,
    pub json: bool,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
        }
    }
}

/// Complete engine configuration.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct EngineSettings {
    pub cache: CacheSettings,
    pub warming: WarmingSettings,
    pub validation: ValidationSettings,
    pub store: StoreSettings,
    pub catalog: CatalogSettings,
    pub metrics: MetricsSettings,
    pub logging: LoggingSettings,
}

#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("failed to build configuration: {0}")]
    Build(#[from] config::ConfigError),
    #[error("invalid configuration for `{key}`: {reason}")]
    Invalid { key: &'static str, reason: String },
}

impl SettingsError {
    fn invalid(key: &'static str, reason: impl Into<String>) -> Self {
        Self::Invalid {
            key,
            reason: reason.into(),
        }
    }
}

impl EngineSettings {
    /// Loads settings from the default file, `VITRINE_CONFIG` and the environment.
    pub fn load() -> Result<Self, SettingsError> {
        let explicit = std::env::var_os(CONFIG_PATH_VAR).map(PathBuf::from);
        Self::load_from(explicit)
    }

    /// Loads settings, reading `path` instead of the default file when given.
    ///
    /// # Errors
    ///
    /// Fails when an explicit file is missing or malformed, or when a value is
    /// out of range.
    pub fn load_from(path: Option<PathBuf>) -> Result<Self, SettingsError> {
        let mut builder = Config::builder();

        builder = match path {
            Some(path) => builder.add_source(File::from(path).required(true)),
            None => builder.add_source(File::with_name(DEFAULT_CONFIG_BASENAME).required(false)),
        };

        builder = builder.add_source(
            Environment::with_prefix("VITRINE")
                .separator("__")
                .try_parsing(true),
        );

        let settings: Self = builder.build()?.try_deserialize()?;
        settings.validated()
    }

    /// Clamps batch sizes and rejects values the engine cannot run with.
    pub fn validated(mut self) -> Result<Self, SettingsError> {
        if self.cache.max_capacity == 0 {
            return Err(SettingsError::invalid(
                "cache.max_capacity",
                "must be greater than zero",
            ));
        }
        if !(self.validation.backoff_multiplier >= 1.0) {
            return Err(SettingsError::invalid(
                "validation.backoff_multiplier",
                "must be at least 1.0",
            ));
        }
        if self.store.kind == StoreKind::File && self.store.path.as_os_str().is_empty() {
            return Err(SettingsError::invalid(
                "store.path",
                "required when store.kind = \"file\"",
            ));
        }

        self.warming.batch_size = self.warming.batch_size.max(1);
        self.validation.batch_size = self.validation.batch_size.max(1);
        self.validation.batch_limit = self.validation.batch_limit.max(1);
        Ok(self)
    }
}
