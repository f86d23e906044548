//! The content engine service.

use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, info, instrument, warn};
use vitrine_core::{
    CacheEntry, CacheKey, CacheRecord, Catalog, Clock, SourceKind, SystemClock, Tier,
    ValidationStatus, content_hash,
};
use vitrine_sources::{ContentGenerator, ValidationPipeline};
use vitrine_store::DurableStore;

use crate::cache::{DependencyGraph, VolatileStore};
use crate::metrics::CacheMetrics;
use crate::settings::{CacheSettings, EngineSettings, ValidationSettings, WarmingSettings};
use crate::stats::{CacheStatistics, StatsRecorder};
use crate::validator::ValidatingGuard;
use crate::warming::WarmingState;

/// Layer that served a hit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CacheLayer {
    Volatile,
    Durable,
}

impl CacheLayer {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Volatile => "volatile",
            Self::Durable => "durable",
        }
    }
}

/// Content served for a hit.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ContentHit {
    pub content: Value,
    pub source_kind: SourceKind,
    pub confidence_score: u8,
    pub age_ms: u64,
    pub layer: CacheLayer,
}

/// Result of `get_content`. Always well formed, even when the store is down.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ContentLookup {
    pub key: CacheKey,
    #[serde(flatten)]
    pub hit: Option<ContentHit>,
}

impl ContentLookup {
    pub fn is_hit(&self) -> bool {
        self.hit.is_some()
    }

    pub fn content(&self) -> Option<&Value> {
        self.hit.as_ref().map(|hit| &hit.content)
    }

    pub fn source_kind(&self) -> Option<SourceKind> {
        self.hit.as_ref().map(|hit| hit.source_kind)
    }
}

/// Result of `store_content`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StoreOutcome {
    pub key: CacheKey,
    pub tier: Tier,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub next_validation_at: DateTime<Utc>,
    pub content_hash: String,
    /// A previous record existed with a different hash.
    pub changed: bool,
    pub dependencies: Vec<CacheKey>,
    /// False when the durable write failed and only the volatile copy exists.
    pub durable_written: bool,
    /// Dependents invalidated because the content changed.
    pub dependents_invalidated: usize,
}

/// Tiered content cache with validation and dependency-aware invalidation.
///
/// One instance is shared (behind an `Arc`) by request handlers, the startup
/// warmer and the validation scheduler.
///
/// # Example
///
/// ```ignore
/// let engine = ContentEngine::builder(catalog, store, generator)
///     .settings(&settings)
///     .build();
///
/// engine.store_content("strategy-plans", "roadmap", json!({..}), SourceKind::GeneratorOnly, 80).await;
/// let lookup = engine.get_content("strategy-plans", "roadmap").await;
/// ```
pub struct ContentEngine {
    pub(crate) catalog: Arc<Catalog>,
    pub(crate) volatile: VolatileStore,
    pub(crate) durable: Arc<dyn DurableStore>,
    pub(crate) graph: DependencyGraph,
    pub(crate) generator: Arc<dyn ContentGenerator>,
    pub(crate) pipeline: ValidationPipeline,
    pub(crate) clock: Arc<dyn Clock>,
    pub(crate) metrics: CacheMetrics,
    pub(crate) stats: StatsRecorder,
    pub(crate) validating: ValidatingGuard,
    pub(crate) warming: WarmingState,
    pub(crate) cache_settings: CacheSettings,
    pub(crate) warming_settings: WarmingSettings,
    pub(crate) validation_settings: ValidationSettings,
}

impl ContentEngine {
    pub fn builder(
        catalog: Arc<Catalog>,
        durable: Arc<dyn DurableStore>,
        generator: Arc<dyn ContentGenerator>,
    ) -> EngineBuilder {
        EngineBuilder {
            catalog,
            durable,
            generator,
            pipeline: None,
            clock: Arc::new(SystemClock),
            cache: CacheSettings::default(),
            warming: WarmingSettings::default(),
            validation: ValidationSettings::default(),
        }
    }

    /// Looks up content: volatile store first, then valid unexpired durable
    /// records, which are promoted into the volatile store.
    ///
    /// Durable-store errors degrade to a miss.
    #[instrument(skip_all, fields(page = %page, widget = %widget))]
    pub async fn get_content(&self, page: &str, widget: &str) -> ContentLookup {
        let start = Instant::now();
        let key = self.catalog.resolve(page, widget);
        let now = self.clock.now();

        if let Some(entry) = self.volatile.get(&key, now).await {
            return self
                .finish_hit(key, &entry, CacheLayer::Volatile, now, start)
                .await;
        }

        match self.durable.find_servable(&key, now).await {
            Ok(Some(record)) => {
                self.volatile.insert(record.entry.clone(), now).await;
                debug!(key = %key, "Promoted durable record into volatile store");
                return self
                    .finish_hit(key, &record.entry, CacheLayer::Durable, now, start)
                    .await;
            },
            Ok(None) => {},
            Err(e) => {
                warn!(key = %key, store = %self.durable.name(), error = %e, "Durable lookup failed, treating as miss");
            },
        }

        self.metrics.record_miss();
        self.stats.record_miss(&key).await;
        self.metrics
            .record_operation_duration("get_miss", start.elapsed());
        debug!(key = %key, "Cache miss");

        ContentLookup { key, hit: None }
    }

    async fn finish_hit(
        &self,
        key: CacheKey,
        entry: &CacheEntry,
        layer: CacheLayer,
        now: DateTime<Utc>,
        start: Instant,
    ) -> ContentLookup {
        let elapsed = start.elapsed();
        self.metrics.record_hit(layer.as_str());
        self.stats
            .record_hit(&key, elapsed.as_secs_f64() * 1000.0)
            .await;
        self.metrics.record_operation_duration("get_hit", elapsed);

        ContentLookup {
            hit: Some(ContentHit {
                content: entry.content.clone(),
                source_kind: entry.source_kind,
                confidence_score: entry.confidence_score,
                age_ms: entry.age_ms(now),
                layer,
            }),
            key,
        }
    }

    /// Stores freshly produced content in both stores and schedules its next
    /// validation.
    ///
    /// The durable write is best effort: a failure is logged and reported in
    /// the outcome, and the volatile copy is still served.
    #[instrument(skip_all, fields(page = %page, widget = %widget))]
    pub async fn store_content(
        &self,
        page: &str,
        widget: &str,
        content: Value,
        source_kind: SourceKind,
        confidence_score: u8,
    ) -> StoreOutcome {
        let start = Instant::now();
        let key = self.catalog.resolve(page, widget);
        let tier = self.catalog.tier_of(page);
        let tier_config = self.catalog.tier_config(tier);
        let now = self.clock.now();

        let entry = CacheEntry::new(
            key.clone(),
            content,
            source_kind,
            confidence_score,
            tier,
            now,
            tier_config.ttl(),
        );
        let hash = content_hash(&entry.content);
        let dependencies = self.catalog.dependencies_of(&key);
        let record = CacheRecord::new(
            entry.clone(),
            hash.clone(),
            tier_config.validation_frequency_minutes,
            dependencies.clone(),
            self.graph.dependents_of(&key),
        );
        let expires_at = record.entry.expires_at;
        let next_validation_at = record.next_validation_at;

        self.volatile.insert(entry, now).await;

        let (durable_written, changed) = match self.durable.upsert(record).await {
            Ok(previous) => (
                true,
                previous.is_some_and(|prev| prev.content_hash != hash),
            ),
            Err(e) => {
                warn!(key = %key, store = %self.durable.name(), error = %e, "Durable write failed, entry kept in volatile store only");
                (false, false)
            },
        };

        self.graph.update_dependencies(&key, &dependencies);

        let dependents_invalidated = if changed && self.cache_settings.invalidate_dependents_on_change
        {
            let reason = format!("content_changed: {key}");
            self.invalidate_dependents(&key, &reason, now).await.len()
        } else {
            0
        };

        self.metrics
            .record_operation_duration("store", start.elapsed());
        debug!(
            key = %key,
            tier = %tier,
            expires_at = %expires_at,
            changed,
            "Content stored"
        );

        StoreOutcome {
            key,
            tier,
            created_at: now,
            expires_at,
            next_validation_at,
            content_hash: hash,
            changed,
            dependencies,
            durable_written,
            dependents_invalidated,
        }
    }

    /// Snapshot of volatile, durable and in-process counters.
    pub async fn get_cache_statistics(&self) -> CacheStatistics {
        let durable = match self.durable.summary().await {
            Ok(summary) => Some(summary),
            Err(e) => {
                warn!(store = %self.durable.name(), error = %e, "Could not read durable statistics");
                None
            },
        };

        CacheStatistics {
            volatile_entries: self.volatile.entry_count().await,
            hits: self.metrics.hits(),
            misses: self.metrics.misses(),
            hit_rate: self.metrics.hit_rate(),
            dependency_edges: self.graph.edge_count(),
            validating_now: self.validating.len(),
            startup_warmed: self.is_startup_warmed(),
            durable,
        }
    }

    /// Re-registers the dependencies of every valid durable record.
    ///
    /// Run once after opening a persistent store so cascades reach records
    /// written by a previous process. Returns how many keys were registered.
    pub async fn rebuild_dependencies(&self) -> usize {
        let records = match self.durable.records(Some(ValidationStatus::Valid)).await {
            Ok(records) => records,
            Err(e) => {
                warn!(store = %self.durable.name(), error = %e, "Could not rebuild dependency graph");
                return 0;
            },
        };

        for record in &records {
            self.graph
                .update_dependencies(record.key(), &record.dependencies);
        }

        info!(
            records = records.len(),
            edges = self.graph.edge_count(),
            "Dependency graph rebuilt"
        );
        records.len()
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    pub fn durable(&self) -> &Arc<dyn DurableStore> {
        &self.durable
    }

    pub fn dependencies(&self) -> &DependencyGraph {
        &self.graph
    }

    pub fn stats(&self) -> &StatsRecorder {
        &self.stats
    }

    pub fn metrics(&self) -> &CacheMetrics {
        &self.metrics
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }
}

impl std::fmt::Debug for ContentEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ContentEngine")
            .field("durable", &self.durable.name())
            .field("generator", &self.generator.name())
            .field("pipeline", &self.pipeline)
            .field("cache", &self.cache_settings)
            .finish_non_exhaustive()
    }
}

/// Builder for [`ContentEngine`].
pub struct EngineBuilder {
    catalog: Arc<Catalog>,
    durable: Arc<dyn DurableStore>,
    generator: Arc<dyn ContentGenerator>,
    pipeline: Option<ValidationPipeline>,
    clock: Arc<dyn Clock>,
    cache: CacheSettings,
    warming: WarmingSettings,
    validation: ValidationSettings,
}

impl EngineBuilder {
    /// Validation pipeline; defaults to the standard checks over the durable store.
    pub fn pipeline(mut self, pipeline: ValidationPipeline) -> Self {
        self.pipeline = Some(pipeline);
        self
    }

    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Applies the cache, warming and validation sections.
    pub fn settings(mut self, settings: &EngineSettings) -> Self {
        self.cache = settings.cache.clone();
        self.warming = settings.warming.clone();
        self.validation = settings.validation.clone();
        self
    }

    pub fn cache_settings(mut self, cache: CacheSettings) -> Self {
        self.cache = cache;
        self
    }

    pub fn warming_settings(mut self, warming: WarmingSettings) -> Self {
        self.warming = warming;
        self
    }

    pub fn validation_settings(mut self, validation: ValidationSettings) -> Self {
        self.validation = validation;
        self
    }

    pub fn build(self) -> ContentEngine {
        let metrics = CacheMetrics::new();
        let pipeline = self
            .pipeline
            .unwrap_or_else(|| ValidationPipeline::standard(Arc::clone(&self.durable)));

        let mut warming = self.warming;
        warming.batch_size = warming.batch_size.max(1);
        let mut validation = self.validation;
        validation.batch_size = validation.batch_size.max(1);
        validation.batch_limit = validation.batch_limit.max(1);

        ContentEngine {
            volatile: VolatileStore::new(self.cache.max_capacity.max(1), metrics.clone()),
            stats: StatsRecorder::new(Arc::clone(&self.durable), self.cache.detached_stats),
            catalog: self.catalog,
            durable: self.durable,
            graph: DependencyGraph::new(),
            generator: self.generator,
            pipeline,
            clock: self.clock,
            metrics,
            validating: ValidatingGuard::new(),
            warming: WarmingState::new(),
            cache_settings: self.cache,
            warming_settings: warming,
            validation_settings: validation,
        }
    }
}
