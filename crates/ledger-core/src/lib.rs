//! ledger-core - Core library for Ledger
//!
//! This crate contains the models, local store, remote client, and
//! reconciliation engine behind the offline-first ledger. Presentation layers
//! (currently the CLI) consume it through `LedgerView` and `SyncEngine`.

pub mod clock;
pub mod config;
pub mod db;
pub mod error;
pub mod models;
pub mod remote;
pub mod retention;
pub mod services;
pub mod sync;
pub mod util;
pub mod view;

pub use clock::{Clock, ManualClock, SystemClock};
pub use config::LedgerConfig;
pub use error::{Error, Result};
pub use models::{
    EntryType, LedgerRecord, LocalId, MonthKey, MonthSummary, NewLedgerEntry, RemoteId,
};
pub use remote::{HttpRemoteLedger, RemoteLedger};
pub use retention::RetentionSweeper;
pub use services::LedgerStore;
pub use sync::{PassEvent, PassSink, SyncEngine, SyncReport};
pub use view::{LedgerView, ViewState};
