//! Reactive month view over the sync engine.

use std::sync::Arc;

use serde::Serialize;
use tokio::sync::watch;

use crate::models::{LedgerRecord, MonthKey, MonthSummary, NewLedgerEntry, PendingRecord};
use crate::remote::RemoteLedger;
use crate::sync::{PassEvent, PassSink, SyncEngine, SyncReport};
use crate::Result;

/// What presentation layers render for the active month.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ViewState {
    pub month: MonthKey,
    pub records: Vec<LedgerRecord>,
    /// A reconciliation pass is in flight
    pub loading: bool,
    /// Last pull or local-read failure for this month
    pub last_error: Option<String>,
}

impl ViewState {
    fn empty(month: MonthKey) -> Self {
        Self {
            month,
            records: Vec::new(),
            loading: false,
            last_error: None,
        }
    }

    pub fn summary(&self) -> MonthSummary {
        MonthSummary::from_records(&self.records)
    }
}

/// Binds one active month to reconciliation passes.
///
/// Every month change runs a full pass; `append` stages a record locally and
/// only reaches the network when eager sync is enabled.
pub struct LedgerView<R> {
    engine: Arc<SyncEngine<R>>,
    state: watch::Sender<ViewState>,
    eager_sync: bool,
}

impl<R: RemoteLedger> LedgerView<R> {
    pub fn new(engine: Arc<SyncEngine<R>>, month: MonthKey) -> Self {
        let (state, _) = watch::channel(ViewState::empty(month));
        Self {
            engine,
            state,
            eager_sync: false,
        }
    }

    #[must_use]
    pub const fn with_eager_sync(mut self, eager_sync: bool) -> Self {
        self.eager_sync = eager_sync;
        self
    }

    pub fn subscribe(&self) -> watch::Receiver<ViewState> {
        self.state.subscribe()
    }

    pub fn snapshot(&self) -> ViewState {
        self.state.borrow().clone()
    }

    pub fn month(&self) -> MonthKey {
        self.state.borrow().month
    }

    pub const fn engine(&self) -> &Arc<SyncEngine<R>> {
        &self.engine
    }

    /// Make `month` active and run a reconciliation pass for it.
    pub async fn activate(&self, month: MonthKey) -> Result<SyncReport> {
        self.state.send_modify(|state| {
            if state.month != month {
                *state = ViewState::empty(month);
            }
            state.loading = true;
            state.last_error = None;
        });

        let sink = ViewSink { state: &self.state };
        match self.engine.reconcile(month, &sink).await {
            Ok(report) => Ok(report),
            Err(error) => {
                tracing::warn!(%month, %error, "Reconciliation pass failed");
                let message = error.to_string();
                self.state.send_if_modified(|state| {
                    if state.month != month {
                        return false;
                    }
                    state.loading = false;
                    state.last_error = Some(message);
                    true
                });
                Err(error)
            }
        }
    }

    /// Switch months; runs a pass only when the month actually changes.
    pub async fn set_month(&self, month: MonthKey) -> Result<Option<SyncReport>> {
        if self.month() == month {
            return Ok(None);
        }
        self.activate(month).await.map(Some)
    }

    /// Re-run the pass for the active month.
    pub async fn refresh(&self) -> Result<SyncReport> {
        self.activate(self.month()).await
    }

    /// Show local rows for `month` without contacting the remote store.
    pub async fn load_local(&self, month: MonthKey) -> Result<()> {
        let records = self.engine.store().query_by_month(month).await?;
        self.state.send_replace(ViewState {
            month,
            records,
            loading: false,
            last_error: None,
        });
        Ok(())
    }

    /// Stage a new entry as unsynced, timestamped now.
    pub async fn append(&self, entry: NewLedgerEntry) -> Result<LedgerRecord> {
        let entry = entry.validated()?;
        let created_at = self.engine.clock().now();
        let record = self
            .engine
            .store()
            .append(PendingRecord::unsynced(entry, created_at))
            .await?;
        tracing::debug!(local_id = %record.id, "Staged new record");

        let month = self.month();
        if self.eager_sync {
            if let Err(error) = self.activate(month).await {
                tracing::warn!(%error, "Eager reconciliation after append failed");
            }
        } else if month.contains(record.created_at) {
            let records = self.engine.store().query_by_month(month).await?;
            self.state.send_modify(|state| {
                if state.month == month {
                    state.records = records;
                }
            });
        }

        Ok(record)
    }
}

struct ViewSink<'a> {
    state: &'a watch::Sender<ViewState>,
}

impl PassSink for ViewSink<'_> {
    fn publish(&self, month: MonthKey, event: PassEvent) {
        self.state.send_if_modified(|state| {
            if state.month != month {
                return false;
            }
            match event {
                PassEvent::LocalFirst(records) => {
                    state.records = records;
                    state.loading = true;
                }
                PassEvent::Settled(records) => {
                    state.records = records;
                    state.loading = false;
                    state.last_error = None;
                }
                PassEvent::PullFailed(message) => {
                    state.loading = false;
                    state.last_error = Some(message);
                }
            }
            true
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::models::{EntryType, RemoteId};
    use crate::services::LedgerStore;
    use crate::sync::tests::FakeRemote;
    use chrono::{TimeZone, Utc};
    use pretty_assertions::assert_eq;
    use rust_decimal::Decimal;
    use tokio::sync::Notify;

    fn month(raw: &str) -> MonthKey {
        raw.parse().unwrap()
    }

    fn view(remote: &Arc<FakeRemote>) -> LedgerView<Arc<FakeRemote>> {
        let clock = Arc::new(ManualClock::new(
            Utc.with_ymd_and_hms(2024, 6, 14, 21, 30, 0).unwrap(),
        ));
        let engine = SyncEngine::new(
            LedgerStore::open_in_memory().unwrap(),
            Arc::clone(remote),
            clock,
        );
        LedgerView::new(Arc::new(engine), month("2024-06"))
    }

    fn coffee() -> NewLedgerEntry {
        NewLedgerEntry::new("coffee", "4.5".parse().unwrap(), None, EntryType::Expense).unwrap()
    }

    #[tokio::test]
    async fn append_is_local_only_by_default() {
        let remote = FakeRemote::new();
        let view = view(&remote);

        let record = view.append(coffee()).await.unwrap();

        assert!(!record.synced);
        assert_eq!(
            record.created_at,
            Utc.with_ymd_and_hms(2024, 6, 14, 21, 30, 0).unwrap()
        );
        assert!(remote.inserts().is_empty());

        let state = view.snapshot();
        assert_eq!(state.records, vec![record]);
        assert_eq!(state.summary().unsynced, 1);
    }

    #[tokio::test]
    async fn append_rejects_blank_description() {
        let remote = FakeRemote::new();
        let view = view(&remote);

        let entry = NewLedgerEntry {
            description: "  ".to_string(),
            amount: Decimal::ONE,
            category: None,
            entry_type: EntryType::Expense,
        };
        assert!(view.append(entry).await.is_err());
        assert_eq!(view.engine().store().count_unsynced().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn eager_append_pushes_immediately() {
        let remote = FakeRemote::new();
        let view = view(&remote).with_eager_sync(true);

        view.append(coffee()).await.unwrap();

        assert_eq!(remote.inserts().len(), 1);
        let state = view.snapshot();
        assert!(!state.loading);
        assert_eq!(state.records.len(), 1);
        assert!(state.records[0].synced);
        assert_eq!(state.records[0].remote_id, Some(RemoteId(101)));
    }

    #[tokio::test]
    async fn activate_settles_with_synced_rows() {
        let remote = FakeRemote::new();
        let view = view(&remote);
        view.append(coffee()).await.unwrap();

        let report = view.activate(month("2024-06")).await.unwrap();
        assert_eq!(report.pushed, 1);

        let state = view.snapshot();
        assert!(!state.loading);
        assert_eq!(state.last_error, None);
        assert_eq!(state.records[0].category.as_deref(), Some("餐飲"));
        assert_eq!(state.summary().expense, Decimal::new(45, 1));
        assert_eq!(state.summary().unsynced, 0);
    }

    #[tokio::test]
    async fn pull_failure_degrades_to_local_rows() {
        let remote = FakeRemote::new();
        remote.fail_reads(true);
        let view = view(&remote);
        view.append(coffee()).await.unwrap();

        let report = view.activate(month("2024-06")).await.unwrap();
        assert!(report.pull_error.is_some());

        let state = view.snapshot();
        assert!(!state.loading);
        assert_eq!(state.records.len(), 1);
        assert!(!state.records[0].synced, "view keeps the local-first rows");
        assert_eq!(
            state.last_error.as_deref(),
            Some("Remote read failed: service unavailable")
        );
    }

    #[tokio::test]
    async fn local_read_failure_ends_the_pass_with_error_state() {
        let tmp = tempfile::tempdir().unwrap();
        let db_path = tmp.path().join("ledger.db");
        let remote = FakeRemote::new();
        let clock = Arc::new(ManualClock::new(
            Utc.with_ymd_and_hms(2024, 6, 14, 21, 30, 0).unwrap(),
        ));
        let engine = SyncEngine::new(
            LedgerStore::open_path(&db_path).unwrap(),
            Arc::clone(&remote),
            clock,
        );
        let view = LedgerView::new(Arc::new(engine), month("2024-06"));
        view.append(coffee()).await.unwrap();

        rusqlite::Connection::open(&db_path)
            .unwrap()
            .execute_batch("DROP TABLE ledger_records;")
            .unwrap();

        let error = view.activate(month("2024-06")).await.unwrap_err();
        assert!(error.is_storage_failure(), "{error}");

        let state = view.snapshot();
        assert!(!state.loading);
        assert!(state.last_error.is_some());
        assert!(remote.inserts().is_empty());
    }

    #[tokio::test]
    async fn set_month_runs_only_on_change() {
        let remote = FakeRemote::new();
        let view = view(&remote);

        assert_eq!(view.set_month(month("2024-06")).await.unwrap(), None);

        let report = view.set_month(month("2024-05")).await.unwrap().unwrap();
        assert_eq!(report.month, month("2024-05"));
        assert_eq!(view.month(), month("2024-05"));
    }

    #[tokio::test]
    async fn subscribers_observe_settled_state() {
        let remote = FakeRemote::new();
        let view = view(&remote);
        let mut receiver = view.subscribe();

        view.append(coffee()).await.unwrap();
        view.refresh().await.unwrap();

        assert!(receiver.has_changed().unwrap());
        let state = receiver.borrow_and_update().clone();
        assert!(state.records[0].synced);
    }

    #[tokio::test]
    async fn load_local_skips_the_network() {
        let remote = FakeRemote::new();
        let view = view(&remote);
        view.append(coffee()).await.unwrap();

        view.load_local(month("2024-06")).await.unwrap();

        assert!(remote.inserts().is_empty());
        assert_eq!(view.snapshot().records.len(), 1);
    }

    #[tokio::test]
    async fn rapid_month_change_keeps_newest_month() {
        let remote = FakeRemote::new();
        let gate = Arc::new(Notify::new());
        remote.gate_first_list(Arc::clone(&gate));
        let view = view(&remote);
        view.append(coffee()).await.unwrap();

        let (june, may, ()) = tokio::join!(
            view.activate(month("2024-06")),
            view.activate(month("2024-05")),
            async { gate.notify_one() },
        );

        assert!(june.unwrap().stale);
        assert!(!may.unwrap().stale);

        let state = view.snapshot();
        assert_eq!(state.month, month("2024-05"));
        assert!(state.records.is_empty());
        assert!(!state.loading);
    }
}
