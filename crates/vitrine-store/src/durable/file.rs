//! Durable store persisted as a JSON snapshot.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};
use vitrine_core::{CacheKey, CacheRecord, ValidationStatus};

use super::memory::{RecordTable, compile_pattern};
use super::{DurableStore, StoreSummary};
use crate::error::StoreError;

/// In-process record table written to disk after every structural change.
///
/// The snapshot is written to a sibling temp file and renamed over the target,
/// so a crash mid-write leaves the previous snapshot intact. Hit and miss
/// counters are kept in memory and persisted with the next structural write
/// or an explicit [`FileStore::flush`].
///
/// The in-memory table is authoritative. A snapshot write that fails after a
/// mutation is logged and the mutation still succeeds; the next write retries
/// with the full table. Only [`FileStore::flush`] reports write errors.
#[derive(Debug)]
pub struct FileStore {
    path: PathBuf,
    table: RwLock<RecordTable>,
    /// Serializes snapshot writes.
    write_lock: Mutex<()>,
}

impl FileStore {
    /// Opens the store, loading the snapshot at `path` if it exists.
    ///
    /// # Errors
    ///
    /// Returns an I/O error if the file exists but cannot be read, or a
    /// serialization error if it is not a valid snapshot.
    pub async fn open(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let path = path.into();

        let records = match tokio::fs::read(&path).await {
            Ok(bytes) if bytes.is_empty() => Vec::new(),
            Ok(bytes) => serde_json::from_slice::<Vec<CacheRecord>>(&bytes)
                .map_err(|e| StoreError::serialization(&path, e.to_string()))?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %path.display(), "No snapshot found, starting empty");
                Vec::new()
            },
            Err(e) => return Err(e.into()),
        };

        info!(
            path = %path.display(),
            records = records.len(),
            "File store opened"
        );

        Ok(Self {
            path,
            table: RwLock::new(RecordTable::from_records(records)),
            write_lock: Mutex::new(()),
        })
    }

    /// Location of the snapshot file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Writes the current table to disk.
    pub async fn flush(&self) -> Result<(), StoreError> {
        let _guard = self.write_lock.lock().await;

        let records = self.table.read().records(None);
        let bytes = serde_json::to_vec_pretty(&records)
            .map_err(|e| StoreError::serialization(&self.path, e.to_string()))?;

        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            tokio::fs::create_dir_all(parent).await?;
        }

        let tmp = self.path.with_extension("json.tmp");
        tokio::fs::write(&tmp, &bytes).await?;
        tokio::fs::rename(&tmp, &self.path).await?;

        debug!(path = %self.path.display(), records = records.len(), "Snapshot written");
        Ok(())
    }

    async fn flush_logged(&self) {
        if let Err(e) = self.flush().await {
            warn!(path = %self.path.display(), error = %e, "Snapshot write failed");
        }
    }
}

#[async_trait]
impl DurableStore for FileStore {
    fn name(&self) -> &str {
        "file"
    }

    async fn health_check(&self) -> Result<(), StoreError> {
        match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() && !parent.exists() => Err(
                StoreError::unavailable(format!("directory {} does not exist", parent.display())),
            ),
            _ => Ok(()),
        }
    }

    async fn upsert(&self, record: CacheRecord) -> Result<Option<CacheRecord>, StoreError> {
        let previous = self.table.write().upsert(record);
        self.flush_logged().await;
        Ok(previous)
    }

    async fn get(&self, key: &CacheKey) -> Result<Option<CacheRecord>, StoreError> {
        Ok(self.table.read().get(key))
    }

    async fn due_for_validation(
        &self,
        now: DateTime<Utc>,
        limit: usize,
    ) -> Result<Vec<CacheRecord>, StoreError> {
        Ok(self.table.read().due(now, limit))
    }

    async fn records(
        &self,
        status: Option<ValidationStatus>,
    ) -> Result<Vec<CacheRecord>, StoreError> {
        Ok(self.table.read().records(status))
    }

    async fn begin_validation(
        &self,
        key: &CacheKey,
        at: DateTime<Utc>,
    ) -> Result<bool, StoreError> {
        let changed = self.table.write().begin_validation(key, at);
        if changed {
            self.flush_logged().await;
        }
        Ok(changed)
    }

    async fn complete_validation(
        &self,
        key: &CacheKey,
        at: DateTime<Utc>,
    ) -> Result<bool, StoreError> {
        let changed = self.table.write().complete_validation(key, at);
        if changed {
            self.flush_logged().await;
        }
        Ok(changed)
    }

    async fn fail_validation(
        &self,
        key: &CacheKey,
        expected_hash: &str,
        reason: &str,
        at: DateTime<Utc>,
    ) -> Result<bool, StoreError> {
        let changed = self
            .table
            .write()
            .fail_validation(key, expected_hash, reason, at);
        if changed {
            self.flush_logged().await;
        }
        Ok(changed)
    }

    async fn invalidate(
        &self,
        key: &CacheKey,
        reason: &str,
        at: DateTime<Utc>,
    ) -> Result<bool, StoreError> {
        let changed = self.table.write().invalidate(key, reason, at);
        if changed {
            self.flush_logged().await;
        }
        Ok(changed)
    }

    async fn invalidate_pages_matching(
        &self,
        pattern: &str,
        reason: &str,
        at: DateTime<Utc>,
    ) -> Result<Vec<CacheKey>, StoreError> {
        let pattern = compile_pattern(pattern)?;
        let matched = self
            .table
            .write()
            .invalidate_pages_matching(&pattern, reason, at);
        if !matched.is_empty() {
            self.flush_logged().await;
        }
        Ok(matched)
    }

    async fn invalidate_all(&self, reason: &str, at: DateTime<Utc>) -> Result<usize, StoreError> {
        let count = self.table.write().invalidate_all(reason, at);
        self.flush_logged().await;
        Ok(count)
    }

    async fn record_hit(&self, key: &CacheKey, retrieval_ms: f64) -> Result<(), StoreError> {
        self.table.write().record_hit(key, retrieval_ms);
        Ok(())
    }

    async fn record_miss(&self, key: &CacheKey) -> Result<(), StoreError> {
        self.table.write().record_miss(key);
        Ok(())
    }

    async fn summary(&self) -> Result<StoreSummary, StoreError> {
        Ok(self.table.read().summary())
    }
}
