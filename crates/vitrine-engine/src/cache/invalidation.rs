//! Targeted, cascading and bulk invalidation.

use chrono::{DateTime, Utc};
use glob::Pattern;
use serde::Serialize;
use tracing::{debug, info, instrument, warn};
use vitrine_core::CacheKey;

use crate::engine::ContentEngine;

/// Reason recorded on every durable record by `clear_all_cache`.
pub const CLEAR_ALL_REASON: &str = "manual_clear_all";

/// One key invalidated by an operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InvalidatedKey {
    pub key: CacheKey,
    pub reason: String,
    /// The durable store acknowledged the change. False when there was no
    /// durable record or the store failed.
    pub persisted: bool,
}

/// Keys invalidated by one operation, in visiting order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InvalidationReport {
    pub invalidated: Vec<InvalidatedKey>,
}

impl InvalidationReport {
    pub fn count(&self) -> usize {
        self.invalidated.len()
    }

    pub fn contains(&self, key: &CacheKey) -> bool {
        self.invalidated.iter().any(|entry| &entry.key == key)
    }

    /// Reason recorded for `key`, if it was invalidated.
    pub fn reason_for(&self, key: &CacheKey) -> Option<&str> {
        self.invalidated
            .iter()
            .find(|entry| &entry.key == key)
            .map(|entry| entry.reason.as_str())
    }
}

/// Result of `clear_all_cache`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClearReport {
    pub volatile_cleared: u64,
    /// Durable records that changed to invalid; `None` if the store failed.
    pub durable_invalidated: Option<usize>,
    pub dependency_edges_cleared: usize,
}

impl ContentEngine {
    /// Invalidates a location and cascades to its dependents.
    ///
    /// Direct dependents get `dependency_invalidated: <key>`; keys further
    /// down get `transitive_dependency: <parent>`. How far the cascade goes
    /// depends on `cache.cascade_mode`.
    #[instrument(skip_all, fields(page = %page, widget = %widget, reason = %reason))]
    pub async fn invalidate_related_content(
        &self,
        page: &str,
        widget: &str,
        reason: &str,
    ) -> InvalidationReport {
        let key = self.catalog.resolve(page, widget);
        let now = self.clock.now();

        let mut report = InvalidationReport::default();
        report
            .invalidated
            .push(self.invalidate_key(&key, reason, now).await);

        let direct_reason = format!("dependency_invalidated: {key}");
        report
            .invalidated
            .extend(self.invalidate_dependents(&key, &direct_reason, now).await);

        info!(
            key = %key,
            count = report.count(),
            mode = ?self.cache_settings.cascade_mode,
            "Related content invalidated"
        );
        report
    }

    /// Invalidates every widget of a page in both stores. No cascade.
    ///
    /// Only keys whose page id equals the normalized `page` are affected.
    pub async fn invalidate_page(&self, page: &str, reason: &str) -> InvalidationReport {
        let pattern = Pattern::escape(&CacheKey::page_id(page));
        self.invalidate_pages_matching(&pattern, reason).await
    }

    /// Invalidates every widget of every page whose id matches a glob
    /// pattern, in both stores. No cascade.
    #[instrument(skip_all, fields(pattern = %pattern_str, reason = %reason))]
    pub async fn invalidate_pages_matching(
        &self,
        pattern_str: &str,
        reason: &str,
    ) -> InvalidationReport {
        let pattern = match Pattern::new(pattern_str) {
            Ok(p) => p,
            Err(e) => {
                debug!(pattern = %pattern_str, error = %e, "Invalid glob pattern");
                return InvalidationReport::default();
            },
        };
        let now = self.clock.now();

        let volatile_keys = self.volatile.invalidate_pages_matching(&pattern).await;
        let durable_keys = match self
            .durable
            .invalidate_pages_matching(pattern_str, reason, now)
            .await
        {
            Ok(keys) => keys,
            Err(e) => {
                warn!(pattern = %pattern_str, error = %e, "Durable page invalidation failed");
                Vec::new()
            },
        };

        let mut invalidated: Vec<InvalidatedKey> = durable_keys
            .iter()
            .map(|key| InvalidatedKey {
                key: key.clone(),
                reason: reason.to_string(),
                persisted: true,
            })
            .collect();
        for key in volatile_keys {
            if !durable_keys.contains(&key) {
                invalidated.push(InvalidatedKey {
                    key,
                    reason: reason.to_string(),
                    persisted: false,
                });
            }
        }
        invalidated.sort_by(|a, b| a.key.cmp(&b.key));

        for _ in &invalidated {
            self.metrics.record_invalidation(reason);
        }
        info!(
            pattern = %pattern_str,
            count = invalidated.len(),
            "Pages invalidated"
        );

        InvalidationReport { invalidated }
    }

    /// Clears the volatile store and dependency graph and marks every durable
    /// record invalid with `manual_clear_all`.
    #[instrument(skip_all)]
    pub async fn clear_all_cache(&self) -> ClearReport {
        let volatile_cleared = self.volatile.clear().await;
        let dependency_edges_cleared = self.graph.edge_count();
        self.graph.clear();

        let durable_invalidated = match self
            .durable
            .invalidate_all(CLEAR_ALL_REASON, self.clock.now())
            .await
        {
            Ok(count) => Some(count),
            Err(e) => {
                warn!(store = %self.durable.name(), error = %e, "Durable clear failed, volatile state cleared only");
                None
            },
        };

        info!(
            volatile = volatile_cleared,
            durable = ?durable_invalidated,
            "All cache cleared"
        );

        ClearReport {
            volatile_cleared,
            durable_invalidated,
            dependency_edges_cleared,
        }
    }

    /// Removes `key` from the volatile store and marks its durable record
    /// invalid. Store failures are logged.
    pub(crate) async fn invalidate_key(
        &self,
        key: &CacheKey,
        reason: &str,
        now: DateTime<Utc>,
    ) -> InvalidatedKey {
        self.volatile.invalidate(key).await;

        let persisted = match self.durable.invalidate(key, reason, now).await {
            Ok(changed) => changed,
            Err(e) => {
                warn!(key = %key, reason = %reason, error = %e, "Durable invalidation failed");
                false
            },
        };

        self.metrics.record_invalidation(reason);
        debug!(key = %key, reason = %reason, "Key invalidated");

        InvalidatedKey {
            key: key.clone(),
            reason: reason.to_string(),
            persisted,
        }
    }

    /// Invalidates the dependents of `origin` (not `origin` itself).
    pub(crate) async fn invalidate_dependents(
        &self,
        origin: &CacheKey,
        direct_reason: &str,
        now: DateTime<Utc>,
    ) -> Vec<InvalidatedKey> {
        let steps = self
            .graph
            .cascade(origin, self.cache_settings.cascade_mode);

        let mut invalidated = Vec::with_capacity(steps.len());
        for step in steps {
            let reason = if step.depth == 1 {
                direct_reason.to_string()
            } else {
                format!("transitive_dependency: {}", step.parent)
            };
            invalidated.push(self.invalidate_key(&step.key, &reason, now).await);
        }
        invalidated
    }
}
