//! Data models for Ledger

mod month;
mod record;
mod summary;

pub use month::MonthKey;
pub use record::{
    CanonicalRecord, EntryType, LedgerRecord, LocalId, NewLedgerEntry, PendingRecord, RecordPatch,
    RemoteEntry, RemoteId,
};
pub use summary::MonthSummary;
