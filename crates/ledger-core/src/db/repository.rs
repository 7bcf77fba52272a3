//! Ledger record repository implementation

use chrono::{DateTime, Utc};
use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension};
use rust_decimal::Decimal;
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::models::{
    CanonicalRecord, EntryType, LedgerRecord, LocalId, MonthKey, NewLedgerEntry, PendingRecord,
    RecordPatch, RemoteId,
};
use crate::util::{format_timestamp, parse_timestamp};

const RECORD_COLUMNS: &str =
    "id, remote_id, client_ref, description, amount, category, entry_type, created_at, synced";

/// Trait for ledger record storage operations
pub trait RecordRepository {
    /// Persist a new record and assign it a local id
    fn append(&self, record: &PendingRecord) -> Result<LedgerRecord>;

    /// Get a record by local id
    fn get(&self, id: LocalId) -> Result<Option<LedgerRecord>>;

    /// Merge `patch` into the record with local id `id`.
    ///
    /// Returns `None` without writing when no such record exists.
    fn upsert(&self, id: LocalId, patch: &RecordPatch) -> Result<Option<LedgerRecord>>;

    /// Mark a pushed record as confirmed using the remote store's canonical fields
    fn confirm_push(&self, id: LocalId, record: &CanonicalRecord) -> Result<Option<LedgerRecord>>;

    /// Merge a canonical remote row, keyed by remote identity.
    ///
    /// Matches on `remote_id` first, then on `client_ref`; inserts a new
    /// synced record when neither is known locally.
    fn upsert_remote(&self, record: &CanonicalRecord) -> Result<LedgerRecord>;

    /// Records created within the month, ascending by `created_at`
    fn query_by_month(&self, month: MonthKey) -> Result<Vec<LedgerRecord>>;

    /// Records not yet confirmed by the remote store
    fn query_unsynced(&self) -> Result<Vec<LedgerRecord>>;

    /// Number of records not yet confirmed by the remote store
    fn count_unsynced(&self) -> Result<usize>;

    /// Delete every record with `created_at` strictly before `cutoff`
    fn delete_older_than(&self, cutoff: DateTime<Utc>) -> Result<usize>;
}

/// `SQLite` implementation of `RecordRepository`
pub struct SqliteRecordRepository<'a> {
    conn: &'a Connection,
}

impl<'a> SqliteRecordRepository<'a> {
    /// Create a new repository with the given connection
    pub const fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    fn find(conn: &Connection, id: LocalId) -> Result<Option<LedgerRecord>> {
        let record = conn
            .query_row(
                &format!("SELECT {RECORD_COLUMNS} FROM ledger_records WHERE id = ?"),
                params![id.0],
                Self::parse_record,
            )
            .optional()?;
        Ok(record)
    }

    fn find_by_remote_identity(
        conn: &Connection,
        remote_id: RemoteId,
        client_ref: Option<Uuid>,
    ) -> Result<Option<LedgerRecord>> {
        let by_remote_id = conn
            .query_row(
                &format!("SELECT {RECORD_COLUMNS} FROM ledger_records WHERE remote_id = ?"),
                params![remote_id.0],
                Self::parse_record,
            )
            .optional()?;
        if by_remote_id.is_some() {
            return Ok(by_remote_id);
        }

        let Some(client_ref) = client_ref else {
            return Ok(None);
        };
        let by_client_ref = conn
            .query_row(
                &format!("SELECT {RECORD_COLUMNS} FROM ledger_records WHERE client_ref = ?"),
                params![client_ref.to_string()],
                Self::parse_record,
            )
            .optional()?;
        Ok(by_client_ref)
    }

    /// Fetch, merge, store. Caller owns the transaction.
    fn merge_and_store(
        conn: &Connection,
        id: LocalId,
        patch: &RecordPatch,
    ) -> Result<Option<LedgerRecord>> {
        let Some(mut record) = Self::find(conn, id)? else {
            return Ok(None);
        };
        record.merge(patch);

        // Another row may already hold this remote identity (pulled before the
        // push was confirmed). The addressed record absorbs it.
        let folded = conn.execute(
            "DELETE FROM ledger_records
             WHERE id != ?1 AND (remote_id = ?2 OR client_ref = ?3)",
            params![
                record.id.0,
                record.remote_id.map(|remote_id| remote_id.0),
                record.client_ref.map(|client_ref| client_ref.to_string()),
            ],
        )?;
        if folded > 0 {
            tracing::debug!(
                local_id = %record.id,
                folded,
                "Folded duplicate rows sharing a remote identity"
            );
        }

        conn.execute(
            "UPDATE ledger_records
             SET remote_id = ?1, client_ref = ?2, description = ?3, amount = ?4,
                 category = ?5, entry_type = ?6, created_at = ?7, synced = ?8
             WHERE id = ?9",
            params![
                record.remote_id.map(|remote_id| remote_id.0),
                record.client_ref.map(|client_ref| client_ref.to_string()),
                record.description,
                record.amount.to_string(),
                record.category,
                record.entry_type.as_str(),
                format_timestamp(record.created_at),
                i32::from(record.synced),
                record.id.0,
            ],
        )?;

        Self::find(conn, record.id)
    }

    fn insert(conn: &Connection, record: &PendingRecord) -> Result<LedgerRecord> {
        conn.execute(
            "INSERT INTO ledger_records
                (remote_id, client_ref, description, amount, category, entry_type, created_at, synced)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                record.remote_id.map(|remote_id| remote_id.0),
                record.client_ref.map(|client_ref| client_ref.to_string()),
                record.entry.description,
                record.entry.amount.to_string(),
                record.entry.category,
                record.entry.entry_type.as_str(),
                format_timestamp(record.created_at),
                i32::from(record.synced),
            ],
        )?;

        // Re-read so callers see the stored (millisecond) timestamp
        let id = LocalId(conn.last_insert_rowid());
        Self::find(conn, id)?
            .ok_or_else(|| Error::Storage(format!("record {id} missing after insert")))
    }

    /// Parse a record from a database row
    fn parse_record(row: &rusqlite::Row<'_>) -> rusqlite::Result<LedgerRecord> {
        let client_ref = row
            .get::<_, Option<String>>(2)?
            .map(|raw| {
                raw.parse::<Uuid>()
                    .map_err(|error| conversion_error(2, error.to_string()))
            })
            .transpose()?;

        let amount_raw: String = row.get(4)?;
        let amount = amount_raw
            .parse::<Decimal>()
            .map_err(|error| conversion_error(4, error.to_string()))?;

        let entry_type_raw: String = row.get(6)?;
        let entry_type = entry_type_raw
            .parse::<EntryType>()
            .map_err(|error| conversion_error(6, error.to_string()))?;

        let created_at_raw: String = row.get(7)?;
        let created_at = parse_timestamp(&created_at_raw).ok_or_else(|| {
            conversion_error(7, format!("invalid created_at `{created_at_raw}`"))
        })?;

        Ok(LedgerRecord {
            id: LocalId(row.get(0)?),
            remote_id: row.get::<_, Option<i64>>(1)?.map(RemoteId),
            client_ref,
            description: row.get(3)?,
            amount,
            category: row.get(5)?,
            entry_type,
            created_at,
            synced: row.get::<_, i32>(8)? != 0,
        })
    }

    fn collect(&self, sql: &str, params: impl rusqlite::Params) -> Result<Vec<LedgerRecord>> {
        let mut stmt = self.conn.prepare(sql)?;
        let records = stmt
            .query_map(params, Self::parse_record)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(records)
    }
}

fn conversion_error(column: usize, message: String) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(column, Type::Text, message.into())
}

impl RecordRepository for SqliteRecordRepository<'_> {
    fn append(&self, record: &PendingRecord) -> Result<LedgerRecord> {
        Self::insert(self.conn, record)
    }

    fn get(&self, id: LocalId) -> Result<Option<LedgerRecord>> {
        Self::find(self.conn, id)
    }

    fn upsert(&self, id: LocalId, patch: &RecordPatch) -> Result<Option<LedgerRecord>> {
        let tx = self.conn.unchecked_transaction()?;
        let record = Self::merge_and_store(&tx, id, patch)?;
        tx.commit()?;
        Ok(record)
    }

    fn confirm_push(&self, id: LocalId, record: &CanonicalRecord) -> Result<Option<LedgerRecord>> {
        self.upsert(id, &RecordPatch::from(record))
    }

    fn upsert_remote(&self, record: &CanonicalRecord) -> Result<LedgerRecord> {
        let tx = self.conn.unchecked_transaction()?;
        let patch = RecordPatch::from(record);

        let existing = Self::find_by_remote_identity(&tx, record.id, record.client_ref)?;
        let stored = match existing {
            Some(existing) => Self::merge_and_store(&tx, existing.id, &patch)?,
            None => None,
        };

        let stored = match stored {
            Some(stored) => stored,
            None => Self::insert(
                &tx,
                &PendingRecord {
                    remote_id: Some(record.id),
                    client_ref: record.client_ref,
                    entry: NewLedgerEntry {
                        description: record.description.clone(),
                        amount: record.amount,
                        category: record.category.clone(),
                        entry_type: record.entry_type,
                    },
                    created_at: record.created_at,
                    synced: true,
                },
            )?,
        };

        tx.commit()?;
        Ok(stored)
    }

    fn query_by_month(&self, month: MonthKey) -> Result<Vec<LedgerRecord>> {
        self.collect(
            &format!(
                "SELECT {RECORD_COLUMNS} FROM ledger_records
                 WHERE created_at >= ?1 AND created_at < ?2
                 ORDER BY created_at ASC, id ASC"
            ),
            params![
                format_timestamp(month.start()),
                format_timestamp(month.end_exclusive())
            ],
        )
    }

    fn query_unsynced(&self) -> Result<Vec<LedgerRecord>> {
        self.collect(
            &format!(
                "SELECT {RECORD_COLUMNS} FROM ledger_records
                 WHERE synced = 0
                 ORDER BY id ASC"
            ),
            [],
        )
    }

    fn count_unsynced(&self) -> Result<usize> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM ledger_records WHERE synced = 0",
            [],
            |row| row.get(0),
        )?;
        Ok(usize::try_from(count).unwrap_or_default())
    }

    fn delete_older_than(&self, cutoff: DateTime<Utc>) -> Result<usize> {
        let deleted = self.conn.execute(
            "DELETE FROM ledger_records WHERE created_at < ?",
            params![format_timestamp(cutoff)],
        )?;
        Ok(deleted)
    }
}
