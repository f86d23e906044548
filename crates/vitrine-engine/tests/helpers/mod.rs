//! Shared fixtures for engine integration tests.
#![allow(dead_code)]

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::json;
use tokio::sync::Semaphore;
use vitrine_engine::settings::CacheSettings;
use vitrine_engine::vitrine_core::{
    CacheKey, CacheRecord, Catalog, ManualClock, SourceKind, ValidationStatus,
};
use vitrine_engine::vitrine_sources::{
    CheckError, CheckOutcome, ContentGenerator, GeneratedContent, GeneratorError, ValidationCheck,
    ValidationPipeline,
};
use vitrine_engine::vitrine_store::{DurableStore, MemoryStore, StoreError, StoreSummary};
use vitrine_engine::{CascadeMode, ContentEngine};

/// Catalog used across engine tests.
///
/// For the `summary` widget, `strategy` depends on `overview`, `analytics`
/// on `strategy` and `archive` on `analytics`. Tier 1 holds five
/// (page, widget) pairs.
pub const CATALOG_YAML: &str = r#"
tiers:
  1:
    ttl_seconds: 300
    validation_frequency_minutes: 15
    pages: [overview, strategy, experience]
  2:
    ttl_seconds: 900
    validation_frequency_minutes: 60
    pages: [analytics]
pages:
  overview:
    widgets: [summary, kpis]
  strategy:
    widgets: [summary]
    related_pages: [overview]
  experience:
    widgets: [summary, hero]
  analytics:
    widgets: [summary]
    related_pages: [strategy]
  archive:
    widgets: [summary]
    related_pages: [analytics]
"#;

pub const TIER_ONE_PAIRS: usize = 5;

pub fn catalog() -> Catalog {
    Catalog::from_yaml_str("engine-tests", CATALOG_YAML).expect("Failed to parse test catalog")
}

pub fn key(page: &str) -> CacheKey {
    CacheKey::new(page, "summary")
}

/// Generator that counts calls and can fail pages, hold callers at a gate or
/// add latency.
#[derive(Default)]
pub struct CountingGenerator {
    calls: AtomicUsize,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
    fail_pages: Vec<String>,
    gate: Option<Arc<Semaphore>>,
    delay: Option<Duration>,
    source_kind: Option<SourceKind>,
}

impl CountingGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing_on(mut self, page: &str) -> Self {
        self.fail_pages.push(page.to_string());
        self
    }

    /// Every call waits for a permit on `gate` before producing content.
    pub fn gated(mut self, gate: Arc<Semaphore>) -> Self {
        self.gate = Some(gate);
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn with_source_kind(mut self, kind: SourceKind) -> Self {
        self.source_kind = Some(kind);
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ContentGenerator for CountingGenerator {
    async fn generate(
        &self,
        page: &str,
        widget: &str,
    ) -> Result<GeneratedContent, GeneratorError> {
        let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        let current = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(current, Ordering::SeqCst);

        if let Some(gate) = &self.gate {
            let permit = gate.acquire().await.expect("gate closed");
            permit.forget();
        }
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        if self.fail_pages.iter().any(|p| p == page) {
            return Err(GeneratorError::failed(page, widget, "scripted failure"));
        }

        Ok(GeneratedContent {
            content: json!({"page": page, "widget": widget, "revision": n}),
            source_kind: self.source_kind.unwrap_or(SourceKind::GeneratorOnly),
            confidence_score: 75,
        })
    }

    fn name(&self) -> &str {
        "counting"
    }
}

/// Check whose verdict, latency and failure mode are set by the test.
pub struct ScriptedCheck {
    name: &'static str,
    pass: AtomicBool,
    error: AtomicBool,
    calls: AtomicUsize,
    delay: Option<Duration>,
}

impl ScriptedCheck {
    pub fn passing(name: &'static str) -> Arc<Self> {
        Arc::new(Self::build(name, true, None))
    }

    pub fn failing(name: &'static str) -> Arc<Self> {
        Arc::new(Self::build(name, false, None))
    }

    pub fn slow(name: &'static str, delay: Duration) -> Arc<Self> {
        Arc::new(Self::build(name, true, Some(delay)))
    }

    fn build(name: &'static str, pass: bool, delay: Option<Duration>) -> Self {
        Self {
            name,
            pass: AtomicBool::new(pass),
            error: AtomicBool::new(false),
            calls: AtomicUsize::new(0),
            delay,
        }
    }

    pub fn set_passing(&self, pass: bool) {
        self.pass.store(pass, Ordering::SeqCst);
    }

    pub fn set_erroring(&self, error: bool) {
        self.error.store(error, Ordering::SeqCst);
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ValidationCheck for ScriptedCheck {
    fn name(&self) -> &str {
        self.name
    }

    async fn check(&self, _record: &CacheRecord) -> Result<CheckOutcome, CheckError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if self.error.load(Ordering::SeqCst) {
            return Err(CheckError::internal(self.name, "scripted error"));
        }
        Ok(if self.pass.load(Ordering::SeqCst) {
            CheckOutcome::pass("ok")
        } else {
            CheckOutcome::fail("scripted failure")
        })
    }
}

/// Store whose every operation fails as unavailable.
#[derive(Debug, Default)]
pub struct FailingStore;

fn outage() -> StoreError {
    StoreError::unavailable("scripted outage")
}

#[async_trait]
impl DurableStore for FailingStore {
    fn name(&self) -> &str {
        "failing"
    }

    async fn health_check(&self) -> Result<(), StoreError> {
        Err(outage())
    }

    async fn upsert(&self, _record: CacheRecord) -> Result<Option<CacheRecord>, StoreError> {
        Err(outage())
    }

    async fn get(&self, _key: &CacheKey) -> Result<Option<CacheRecord>, StoreError> {
        Err(outage())
    }

    async fn due_for_validation(
        &self,
        _now: DateTime<Utc>,
        _limit: usize,
    ) -> Result<Vec<CacheRecord>, StoreError> {
        Err(outage())
    }

    async fn records(
        &self,
        _status: Option<ValidationStatus>,
    ) -> Result<Vec<CacheRecord>, StoreError> {
        Err(outage())
    }

    async fn begin_validation(
        &self,
        _key: &CacheKey,
        _at: DateTime<Utc>,
    ) -> Result<bool, StoreError> {
        Err(outage())
    }

    async fn complete_validation(
        &self,
        _key: &CacheKey,
        _at: DateTime<Utc>,
    ) -> Result<bool, StoreError> {
        Err(outage())
    }

    async fn fail_validation(
        &self,
        _key: &CacheKey,
        _expected_hash: &str,
        _reason: &str,
        _at: DateTime<Utc>,
    ) -> Result<bool, StoreError> {
        Err(outage())
    }

    async fn invalidate(
        &self,
        _key: &CacheKey,
        _reason: &str,
        _at: DateTime<Utc>,
    ) -> Result<bool, StoreError> {
        Err(outage())
    }

    async fn invalidate_pages_matching(
        &self,
        _pattern: &str,
        _reason: &str,
        _at: DateTime<Utc>,
    ) -> Result<Vec<CacheKey>, StoreError> {
        Err(outage())
    }

    async fn invalidate_all(&self, _reason: &str, _at: DateTime<Utc>) -> Result<usize, StoreError> {
        Err(outage())
    }

    async fn record_hit(&self, _key: &CacheKey, _retrieval_ms: f64) -> Result<(), StoreError> {
        Err(outage())
    }

    async fn record_miss(&self, _key: &CacheKey) -> Result<(), StoreError> {
        Err(outage())
    }

    async fn summary(&self) -> Result<StoreSummary, StoreError> {
        Err(outage())
    }
}

/// Engine wired to a memory store, a manual clock, a counting generator and
/// one scripted check. Statistics are written inline.
pub struct Harness {
    pub engine: Arc<ContentEngine>,
    pub store: Arc<MemoryStore>,
    pub clock: ManualClock,
    pub generator: Arc<CountingGenerator>,
    pub check: Arc<ScriptedCheck>,
}

impl Harness {
    pub fn new() -> Self {
        HarnessBuilder::default().build()
    }

    pub fn builder() -> HarnessBuilder {
        HarnessBuilder::default()
    }

    /// Reads the durable record for `key`.
    pub async fn record(&self, key: &CacheKey) -> CacheRecord {
        self.store
            .get(key)
            .await
            .expect("memory store never fails")
            .unwrap_or_else(|| panic!("no record for {key}"))
    }

    pub async fn store_summary(&self, page: &str) {
        self.engine
            .store_content(
                page,
                "summary",
                json!({"page": page, "widget": "summary", "body": format!("{page} body")}),
                SourceKind::AuthoritativeFresh,
                90,
            )
            .await;
    }
}

pub struct HarnessBuilder {
    catalog: Catalog,
    store: Arc<MemoryStore>,
    generator: CountingGenerator,
    check: Arc<ScriptedCheck>,
    pipeline: Option<ValidationPipeline>,
    cache: CacheSettings,
    warming_batch: Option<usize>,
    validation_batch_limit: Option<usize>,
}

impl Default for HarnessBuilder {
    fn default() -> Self {
        Self {
            catalog: catalog(),
            store: Arc::new(MemoryStore::new()),
            generator: CountingGenerator::new(),
            check: ScriptedCheck::passing("scripted"),
            pipeline: None,
            cache: CacheSettings {
                detached_stats: false,
                ..CacheSettings::default()
            },
            warming_batch: None,
            validation_batch_limit: None,
        }
    }
}

impl HarnessBuilder {
    pub fn catalog(mut self, catalog: Catalog) -> Self {
        self.catalog = catalog;
        self
    }

    pub fn store(mut self, store: Arc<MemoryStore>) -> Self {
        self.store = store;
        self
    }

    pub fn generator(mut self, generator: CountingGenerator) -> Self {
        self.generator = generator;
        self
    }

    pub fn check(mut self, check: Arc<ScriptedCheck>) -> Self {
        self.check = check;
        self
    }

    /// Replaces the single scripted check with a full pipeline.
    pub fn pipeline(mut self, pipeline: ValidationPipeline) -> Self {
        self.pipeline = Some(pipeline);
        self
    }

    pub fn cascade_mode(mut self, mode: CascadeMode) -> Self {
        self.cache.cascade_mode = mode;
        self
    }

    pub fn invalidate_dependents_on_change(mut self) -> Self {
        self.cache.invalidate_dependents_on_change = true;
        self
    }

    pub fn warming_batch(mut self, size: usize) -> Self {
        self.warming_batch = Some(size);
        self
    }

    pub fn validation_batch_limit(mut self, limit: usize) -> Self {
        self.validation_batch_limit = Some(limit);
        self
    }

    pub fn build(self) -> Harness {
        let clock = ManualClock::new();
        let generator = Arc::new(self.generator);
        let pipeline = self
            .pipeline
            .unwrap_or_else(|| ValidationPipeline::new().with_check(self.check.clone()));

        let mut builder = ContentEngine::builder(
            Arc::new(self.catalog),
            self.store.clone(),
            generator.clone(),
        )
        .pipeline(pipeline)
        .clock(Arc::new(clock.clone()))
        .cache_settings(self.cache);

        if let Some(size) = self.warming_batch {
            builder = builder.warming_settings(vitrine_engine::settings::WarmingSettings {
                batch_size: size,
            });
        }
        if let Some(limit) = self.validation_batch_limit {
            builder = builder.validation_settings(vitrine_engine::settings::ValidationSettings {
                batch_limit: limit,
                ..Default::default()
            });
        }

        Harness {
            engine: Arc::new(builder.build()),
            store: self.store,
            clock,
            generator,
            check: self.check,
        }
    }
}
