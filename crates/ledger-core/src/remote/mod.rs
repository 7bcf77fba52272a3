//! Remote persistence contracts consumed by the sync engine.

mod http;

pub use http::{HttpRemoteLedger, IDEMPOTENCY_KEY_HEADER};

use crate::models::{CanonicalRecord, MonthKey, RemoteEntry};
use crate::Result;

/// The remote store, as seen from the client.
///
/// Implementations report failures as `Error::RemoteWrite` / `Error::RemoteRead`.
#[allow(async_fn_in_trait)]
pub trait RemoteLedger {
    /// Persist one entry and return the canonical stored row.
    async fn insert(&self, entry: &RemoteEntry) -> Result<CanonicalRecord>;

    /// All rows created within `month`, newest first.
    async fn list_month(&self, month: MonthKey) -> Result<Vec<CanonicalRecord>>;
}

impl<T: RemoteLedger> RemoteLedger for &T {
    async fn insert(&self, entry: &RemoteEntry) -> Result<CanonicalRecord> {
        (**self).insert(entry).await
    }

    async fn list_month(&self, month: MonthKey) -> Result<Vec<CanonicalRecord>> {
        (**self).list_month(month).await
    }
}

impl<T: RemoteLedger> RemoteLedger for std::sync::Arc<T> {
    async fn insert(&self, entry: &RemoteEntry) -> Result<CanonicalRecord> {
        (**self).insert(entry).await
    }

    async fn list_month(&self, month: MonthKey) -> Result<Vec<CanonicalRecord>> {
        (**self).list_month(month).await
    }
}
