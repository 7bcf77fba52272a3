//! Local durable store for ledger records

mod connection;
mod migrations;
mod repository;

pub use connection::Database;
pub use repository::{RecordRepository, SqliteRecordRepository};
