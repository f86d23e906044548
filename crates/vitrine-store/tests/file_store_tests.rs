use chrono::{Duration, Utc};
use serde_json::json;
use tempfile::TempDir;
use vitrine_store::vitrine_core::{
    CacheEntry, CacheKey, CacheRecord, SourceKind, Tier, ValidationStatus,
};
use vitrine_store::{DurableStore, FileStore, StoreError};

fn record(page: &str, widget: &str) -> CacheRecord {
    let entry = CacheEntry::new(
        CacheKey::new(page, widget),
        json!({"page": page, "widget": widget, "items": [1, 2, 3]}),
        SourceKind::AuthoritativeCached,
        75,
        Tier::Two,
        Utc::now(),
        Duration::seconds(900),
    );
    CacheRecord::new(entry, "abc123", 60, vec![CacheKey::new("overview", widget)], vec![])
}

#[tokio::test]
async fn test_records_survive_reopen() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("records.json");

    {
        let store = FileStore::open(&path).await.unwrap();
        store.upsert(record("strategy", "summary")).await.unwrap();
        store.upsert(record("strategy", "kpis")).await.unwrap();
        store
            .invalidate(&CacheKey::new("strategy", "kpis"), "validation_failed", Utc::now())
            .await
            .unwrap();
    }

    let reopened = FileStore::open(&path).await.unwrap();
    let valid = reopened.records(Some(ValidationStatus::Valid)).await.unwrap();
    assert_eq!(valid.len(), 1);
    assert_eq!(valid[0].key(), &CacheKey::new("strategy", "summary"));
    assert_eq!(
        valid[0].dependencies,
        vec![CacheKey::new("overview", "summary")]
    );

    let invalid = reopened
        .get(&CacheKey::new("strategy", "kpis"))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(invalid.status, ValidationStatus::Invalid);
    assert_eq!(invalid.invalidation_reason.as_deref(), Some("validation_failed"));
}

#[tokio::test]
async fn test_counters_persist_after_flush() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("nested").join("records.json");
    let key = CacheKey::new("strategy", "summary");

    {
        let store = FileStore::open(&path).await.unwrap();
        store.upsert(record("strategy", "summary")).await.unwrap();
        store.record_hit(&key, 12.0).await.unwrap();
        store.record_miss(&key).await.unwrap();
        store.flush().await.unwrap();
    }

    let reopened = FileStore::open(&path).await.unwrap();
    let stored = reopened.get(&key).await.unwrap().unwrap();
    assert_eq!(stored.hit_count, 1);
    assert_eq!(stored.miss_count, 1);
    assert_eq!(stored.average_retrieval_ms, 12.0);
}

#[tokio::test]
async fn test_missing_file_starts_empty() {
    let dir = TempDir::new().unwrap();
    let store = FileStore::open(dir.path().join("absent.json")).await.unwrap();

    assert!(store.records(None).await.unwrap().is_empty());
    assert!(store.health_check().await.is_ok());
    assert_eq!(store.name(), "file");
}

#[tokio::test]
async fn test_corrupt_snapshot_is_rejected() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("records.json");
    std::fs::write(&path, b"{not json").unwrap();

    let result = FileStore::open(&path).await;
    assert!(matches!(result, Err(StoreError::Serialization { .. })));
}

#[tokio::test]
async fn test_page_with_separator_survives_reopen() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("records.json");
    let nested = CacheKey::new("a::b", "c");

    {
        let store = FileStore::open(&path).await.unwrap();
        store.upsert(record("a::b", "c")).await.unwrap();
        store.upsert(record("a", "c")).await.unwrap();
    }

    let reopened = FileStore::open(&path).await.unwrap();
    let stored = reopened.get(&nested).await.unwrap().unwrap();
    assert_eq!(stored.key().page(), "a::b");
    assert_eq!(stored.key().widget(), "c");
    assert!(reopened.get(&CacheKey::new("a", "b::c")).await.unwrap().is_none());

    let matched = reopened
        .invalidate_pages_matching("a", "page_changed", Utc::now())
        .await
        .unwrap();
    assert_eq!(matched, vec![CacheKey::new("a", "c")]);
    assert_eq!(
        reopened.get(&nested).await.unwrap().unwrap().status,
        ValidationStatus::Valid
    );
}

#[tokio::test]
async fn test_snapshot_write_failure_keeps_mutation() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("records.json");
    let key = CacheKey::new("strategy", "summary");
    let store = FileStore::open(&path).await.unwrap();

    // A directory at the temp path makes every snapshot write fail
    std::fs::create_dir(dir.path().join("records.json.tmp")).unwrap();

    assert!(store.upsert(record("strategy", "summary")).await.unwrap().is_none());
    let mut replacement = record("strategy", "summary");
    replacement.content_hash = "def456".to_string();
    let previous = store.upsert(replacement).await.unwrap();
    assert_eq!(previous.unwrap().content_hash, "abc123");
    assert_eq!(store.get(&key).await.unwrap().unwrap().content_hash, "def456");

    assert!(store.invalidate(&key, "manual", Utc::now()).await.unwrap());
    assert_eq!(
        store.get(&key).await.unwrap().unwrap().status,
        ValidationStatus::Invalid
    );

    assert!(store.flush().await.is_err());
    assert!(!path.exists());
}
