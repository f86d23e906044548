//! Tests del ciclo de validacion.

mod helpers;

use std::sync::Arc;
use std::time::Duration as StdDuration;

use chrono::Duration;
use helpers::{CountingGenerator, FailingStore, Harness, ScriptedCheck, key};
use serde_json::json;
use vitrine_engine::settings::CacheSettings;
use vitrine_engine::vitrine_core::{
    Catalog, PageConfig, SourceKind, Tier, TierConfig, ValidationStatus,
};
use vitrine_engine::vitrine_sources::ValidationPipeline;
use vitrine_engine::vitrine_store::MemoryStore;
use vitrine_engine::{ContentEngine, VALIDATION_ERROR_REASON, VALIDATION_FAILED_REASON};

/// Tier-1 validation frequency plus one minute.
fn past_due() -> Duration {
    Duration::minutes(16)
}

#[tokio::test]
async fn passing_record_is_rescheduled() {
    let h = Harness::new();
    h.store_summary("overview").await;
    h.clock.advance(past_due());
    let now = h.engine.now();

    let report = h.engine.validate_cached_content().await;

    assert_eq!(report.candidates, 1);
    assert_eq!(report.passed, 1);
    assert_eq!(h.check.calls(), 1);

    let record = h.record(&key("overview")).await;
    assert_eq!(record.status, ValidationStatus::Valid);
    assert_eq!(record.last_validated_at, Some(now));
    assert_eq!(record.next_validation_at, now + Duration::minutes(15));
}

#[tokio::test]
async fn records_not_yet_due_are_left_alone() {
    let h = Harness::new();
    h.store_summary("overview").await;
    h.clock.advance(Duration::minutes(14));

    let report = h.engine.validate_cached_content().await;

    assert_eq!(report.candidates, 0);
    assert_eq!(h.check.calls(), 0);
}

#[tokio::test]
async fn failed_check_invalidates_without_cascade() {
    let h = Harness::builder()
        .check(ScriptedCheck::failing("scripted"))
        .build();
    h.store_summary("overview").await;
    h.clock.advance(past_due());
    h.store_summary("strategy").await;

    let report = h.engine.validate_cached_content().await;

    assert_eq!(report.failed, 1);
    let record = h.record(&key("overview")).await;
    assert_eq!(record.status, ValidationStatus::Invalid);
    assert_eq!(
        record.invalidation_reason.as_deref(),
        Some(VALIDATION_FAILED_REASON)
    );
    assert!(!h.engine.get_content("overview", "summary").await.is_hit());
    assert!(h.engine.get_content("strategy", "summary").await.is_hit());
}

#[tokio::test]
async fn check_error_invalidates_with_error_reason() {
    let h = Harness::new();
    h.check.set_erroring(true);
    h.store_summary("overview").await;
    h.clock.advance(past_due());

    let report = h.engine.validate_cached_content().await;

    assert_eq!(report.errors, 1);
    let record = h.record(&key("overview")).await;
    assert_eq!(
        record.invalidation_reason.as_deref(),
        Some(VALIDATION_ERROR_REASON)
    );
}

#[tokio::test]
async fn concurrent_passes_validate_each_record_once() {
    let h = Harness::builder()
        .check(ScriptedCheck::slow("slow", StdDuration::from_millis(100)))
        .build();
    h.store_summary("overview").await;
    h.clock.advance(past_due());

    let (a, b) = tokio::join!(
        h.engine.validate_cached_content(),
        h.engine.validate_cached_content()
    );

    assert_eq!(h.check.calls(), 1);
    assert_eq!(a.passed + b.passed, 1);
    assert_eq!(h.record(&key("overview")).await.status, ValidationStatus::Valid);
}

#[tokio::test]
async fn invalidation_during_validation_wins() {
    let h = Harness::builder()
        .check(ScriptedCheck::slow("slow", StdDuration::from_millis(100)))
        .build();
    h.store_summary("overview").await;
    h.clock.advance(past_due());

    let engine = h.engine.clone();
    let pass = tokio::spawn(async move { engine.validate_cached_content().await });

    tokio::time::sleep(StdDuration::from_millis(30)).await;
    h.engine
        .invalidate_related_content("overview", "summary", "upstream_update")
        .await;

    let report = pass.await.unwrap();
    assert_eq!(report.skipped, 1);

    let record = h.record(&key("overview")).await;
    assert_eq!(record.status, ValidationStatus::Invalid);
    assert_eq!(record.invalidation_reason.as_deref(), Some("upstream_update"));
}

#[tokio::test]
async fn content_stored_during_failed_validation_stays_valid() {
    let check = ScriptedCheck::slow("slow", StdDuration::from_millis(100));
    check.set_passing(false);
    let h = Harness::builder().check(check).build();
    h.store_summary("overview").await;
    h.clock.advance(past_due());

    let engine = h.engine.clone();
    let pass = tokio::spawn(async move { engine.validate_cached_content().await });

    tokio::time::sleep(StdDuration::from_millis(30)).await;
    h.engine
        .store_content("overview", "summary", json!({"v": "rewritten"}), SourceKind::AuthoritativeFresh, 90)
        .await;

    let report = pass.await.unwrap();
    assert_eq!(report.failed, 0);
    assert_eq!(report.skipped, 1);

    let record = h.record(&key("overview")).await;
    assert_eq!(record.status, ValidationStatus::Valid);
    assert!(record.invalidation_reason.is_none());
    assert!(h.engine.get_content("overview", "summary").await.is_hit());
}

#[tokio::test]
async fn batch_limit_caps_candidates() {
    let h = Harness::builder().validation_batch_limit(2).build();
    for page in ["overview", "strategy", "experience"] {
        h.store_summary(page).await;
    }
    h.clock.advance(past_due());

    let first = h.engine.validate_cached_content().await;
    assert_eq!(first.candidates, 2);

    let second = h.engine.validate_cached_content().await;
    assert_eq!(second.candidates, 1);
}

#[tokio::test]
async fn store_outage_is_reported() {
    let engine = ContentEngine::builder(
        Arc::new(helpers::catalog()),
        Arc::new(FailingStore),
        Arc::new(CountingGenerator::new()),
    )
    .cache_settings(CacheSettings {
        detached_stats: false,
        ..CacheSettings::default()
    })
    .build();

    let report = engine.validate_cached_content().await;

    assert!(report.store_error.is_some());
    assert_eq!(report.candidates, 0);
}

#[tokio::test]
async fn page_selects_its_checks() {
    let catalog = Catalog::builder()
        .tier(Tier::Three, TierConfig::new(86_400, 240))
        .page("faq", PageConfig::new().widget("answers").checks(vec!["structure"]))
        .page("blog", PageConfig::new().widget("answers"))
        .build()
        .unwrap();
    let structure = ScriptedCheck::passing("structure");
    let tone = ScriptedCheck::failing("tone");
    let h = Harness::builder()
        .catalog(catalog)
        .pipeline(
            ValidationPipeline::new()
                .with_check(structure.clone())
                .with_check(tone.clone()),
        )
        .build();

    for page in ["faq", "blog"] {
        h.engine
            .store_content(page, "answers", json!({"q": page}), SourceKind::GeneratorOnly, 70)
            .await;
    }
    h.clock.advance(Duration::minutes(241));

    let report = h.engine.validate_cached_content().await;

    assert_eq!(report.passed, 1);
    assert_eq!(report.failed, 1);
    assert_eq!(tone.calls(), 1);
    assert_eq!(structure.calls(), 2);
    assert!(h.engine.get_content("faq", "answers").await.is_hit());
    assert!(!h.engine.get_content("blog", "answers").await.is_hit());
}

#[tokio::test]
async fn standard_pipeline_flags_duplicate_content() {
    let store = Arc::new(MemoryStore::new());
    let h = Harness::builder()
        .store(store.clone())
        .pipeline(ValidationPipeline::standard(store))
        .build();

    let body = json!({"body": "Quarterly numbers are in"});
    h.engine
        .store_content("overview", "summary", body.clone(), SourceKind::GeneratorOnly, 60)
        .await;
    h.clock.advance(past_due());
    h.engine
        .store_content("experience", "summary", body, SourceKind::GeneratorOnly, 60)
        .await;
    h.store_summary("strategy").await;

    let report = h.engine.validate_cached_content().await;

    assert_eq!(report.candidates, 1);
    assert_eq!(report.failed, 1);
    assert_eq!(
        h.record(&key("overview")).await.invalidation_reason.as_deref(),
        Some(VALIDATION_FAILED_REASON)
    );
    assert_eq!(
        h.record(&key("experience")).await.status,
        ValidationStatus::Valid
    );
}

#[tokio::test]
async fn standard_pipeline_accepts_consistent_content() {
    let store = Arc::new(MemoryStore::new());
    let h = Harness::builder()
        .store(store.clone())
        .pipeline(ValidationPipeline::standard(store))
        .build();
    h.store_summary("overview").await;
    h.store_summary("strategy").await;
    h.clock.advance(past_due());

    let report = h.engine.validate_cached_content().await;

    assert_eq!(report.passed, 2);
    assert_eq!(report.failed, 0);
}
