//! Shared async handle to the local durable store.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::sync::Mutex;

use crate::db::{Database, RecordRepository, SqliteRecordRepository};
use crate::models::{
    CanonicalRecord, LedgerRecord, LocalId, MonthKey, PendingRecord, RecordPatch,
};
use crate::Result;

/// Thread-safe service for local record operations.
///
/// Every operation takes the connection lock for its whole duration, so a
/// reader never observes a record halfway through a write or delete.
#[derive(Clone)]
pub struct LedgerStore {
    db: Arc<Mutex<Database>>,
    db_path: Option<PathBuf>,
}

impl LedgerStore {
    /// Open the store at the given filesystem path.
    pub fn open_path(db_path: impl Into<PathBuf>) -> Result<Self> {
        let db_path = db_path.into();
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        tracing::debug!("Opening local ledger store at {}", db_path.display());
        let db = Database::open(&db_path)?;
        Ok(Self {
            db: Arc::new(Mutex::new(db)),
            db_path: Some(db_path),
        })
    }

    /// Open an in-memory store (primarily for tests).
    pub fn open_in_memory() -> Result<Self> {
        let db = Database::open_in_memory()?;
        Ok(Self {
            db: Arc::new(Mutex::new(db)),
            db_path: None,
        })
    }

    /// Path of the backing file, `None` for in-memory stores.
    pub fn path(&self) -> Option<&Path> {
        self.db_path.as_deref()
    }

    async fn with_repository<T>(
        &self,
        operation: impl FnOnce(&SqliteRecordRepository<'_>) -> Result<T>,
    ) -> Result<T> {
        let db = self.db.lock().await;
        let repo = SqliteRecordRepository::new(db.connection());
        operation(&repo)
    }

    /// Persist a new record.
    pub async fn append(&self, record: PendingRecord) -> Result<LedgerRecord> {
        self.with_repository(|repo| repo.append(&record)).await
    }

    /// Fetch a record by local id.
    pub async fn get(&self, id: LocalId) -> Result<Option<LedgerRecord>> {
        self.with_repository(|repo| repo.get(id)).await
    }

    /// Merge a partial record into an existing one; `None` when `id` is unknown.
    pub async fn upsert(&self, id: LocalId, patch: RecordPatch) -> Result<Option<LedgerRecord>> {
        let patch = patch.validated()?;
        self.with_repository(|repo| repo.upsert(id, &patch)).await
    }

    /// Record a successful push with the remote store's canonical fields.
    pub async fn confirm_push(
        &self,
        id: LocalId,
        record: &CanonicalRecord,
    ) -> Result<Option<LedgerRecord>> {
        self.with_repository(|repo| repo.confirm_push(id, record))
            .await
    }

    /// Merge a pulled remote row keyed by its remote identity.
    pub async fn upsert_remote(&self, record: &CanonicalRecord) -> Result<LedgerRecord> {
        self.with_repository(|repo| repo.upsert_remote(record)).await
    }

    /// Records created within `month`.
    pub async fn query_by_month(&self, month: MonthKey) -> Result<Vec<LedgerRecord>> {
        self.with_repository(|repo| repo.query_by_month(month)).await
    }

    /// Records not yet confirmed by the remote store.
    pub async fn query_unsynced(&self) -> Result<Vec<LedgerRecord>> {
        self.with_repository(|repo| repo.query_unsynced()).await
    }

    /// Number of records not yet confirmed by the remote store.
    pub async fn count_unsynced(&self) -> Result<usize> {
        self.with_repository(|repo| repo.count_unsynced()).await
    }

    /// Delete records created strictly before `cutoff`.
    pub async fn delete_older_than(&self, cutoff: DateTime<Utc>) -> Result<usize> {
        self.with_repository(|repo| repo.delete_older_than(cutoff))
            .await
    }
}
