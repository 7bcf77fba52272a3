//! Reconciliation between the local store and the remote ledger.
//!
//! A pass for one month runs, in order: local-first read, retention sweep,
//! push of every unsynced record, pull of the month's remote rows, and a
//! settled re-read. Passes are serialized by an async lock and stamped with a
//! generation; a pass that is no longer the newest when it finishes keeps its
//! store writes but drops its publication.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use serde::Serialize;
use tokio::sync::Mutex;
use tracing::Instrument;

use crate::clock::Clock;
use crate::models::{LedgerRecord, MonthKey};
use crate::remote::RemoteLedger;
use crate::retention::RetentionSweeper;
use crate::services::LedgerStore;
use crate::Result;


/// Identifies one reconciliation pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct PassToken {
    generation: u64,
}

impl PassToken {
    pub const fn generation(self) -> u64 {
        self.generation
    }
}

/// What a pass publishes for the month it reconciles.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PassEvent {
    /// Local rows read before any network traffic.
    LocalFirst(Vec<LedgerRecord>),
    /// Local rows after push and pull completed.
    Settled(Vec<LedgerRecord>),
    /// The pull failed; the local-first rows stay current.
    PullFailed(String),
}

/// Receiver of pass publications. Only the newest pass publishes.
pub trait PassSink {
    fn publish(&self, month: MonthKey, event: PassEvent);
}

impl PassSink for () {
    fn publish(&self, _month: MonthKey, _event: PassEvent) {}
}

/// Outcome of one reconciliation pass.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SyncReport {
    pub month: MonthKey,
    pub generation: u64,
    /// Records removed by the retention sweep
    pub swept: usize,
    /// Records confirmed by the remote store
    pub pushed: usize,
    /// Records whose push failed and that stay unsynced
    pub push_failures: usize,
    /// Remote rows merged into the local store
    pub pulled: usize,
    pub pull_error: Option<String>,
    /// A newer pass started before this one finished
    pub stale: bool,
}

impl SyncReport {
    const fn new(month: MonthKey, token: PassToken) -> Self {
        Self {
            month,
            generation: token.generation,
            swept: 0,
            pushed: 0,
            push_failures: 0,
            pulled: 0,
            pull_error: None,
            stale: false,
        }
    }

    /// Whether push and pull both completed without remote failures.
    pub const fn is_clean(&self) -> bool {
        self.push_failures == 0 && self.pull_error.is_none()
    }
}

/// Orchestrates reconciliation passes against an explicitly passed remote.
pub struct SyncEngine<R> {
    store: LedgerStore,
    remote: R,
    sweeper: RetentionSweeper,
    clock: Arc<dyn Clock>,
    generation: AtomicU64,
    pass_lock: Mutex<()>,
}

impl<R: RemoteLedger> SyncEngine<R> {
    pub fn new(store: LedgerStore, remote: R, clock: Arc<dyn Clock>) -> Self {
        Self {
            store,
            remote,
            sweeper: RetentionSweeper::default(),
            clock,
            generation: AtomicU64::new(0),
            pass_lock: Mutex::new(()),
        }
    }

    #[must_use]
    pub fn with_sweeper(mut self, sweeper: RetentionSweeper) -> Self {
        self.sweeper = sweeper;
        self
    }

    pub const fn store(&self) -> &LedgerStore {
        &self.store
    }

    pub const fn remote(&self) -> &R {
        &self.remote
    }

    pub fn clock(&self) -> &dyn Clock {
        self.clock.as_ref()
    }

    pub const fn sweeper(&self) -> RetentionSweeper {
        self.sweeper
    }

    /// Start a new generation. Every pass begun earlier becomes stale.
    pub fn begin_pass(&self) -> PassToken {
        PassToken {
            generation: self.generation.fetch_add(1, Ordering::SeqCst) + 1,
        }
    }

    pub fn is_current(&self, token: PassToken) -> bool {
        self.generation.load(Ordering::SeqCst) == token.generation
    }

    /// Run one full reconciliation pass for `month`.
    ///
    /// Local-store failures abort the pass and are returned. Remote failures
    /// never are: push failures are counted, and a pull failure is reported
    /// through `SyncReport::pull_error` and `PassEvent::PullFailed`.
    pub async fn reconcile(&self, month: MonthKey, sink: &impl PassSink) -> Result<SyncReport> {
        let token = self.begin_pass();
        let span = tracing::info_span!("reconcile", %month, generation = token.generation);
        self.run_pass(token, month, sink).instrument(span).await
    }

    async fn run_pass(
        &self,
        token: PassToken,
        month: MonthKey,
        sink: &impl PassSink,
    ) -> Result<SyncReport> {
        let mut report = SyncReport::new(month, token);

        let local = self.store.query_by_month(month).await?;
        self.publish(token, sink, month, PassEvent::LocalFirst(local));

        let _guard = self.pass_lock.lock().await;

        report.swept = self
            .sweeper
            .sweep(&self.store, self.clock.now(), Some(month))
            .await?;

        self.push_unsynced(&mut report).await?;

        match self.remote.list_month(month).await {
            Ok(rows) => {
                for row in &rows {
                    self.store.upsert_remote(row).await?;
                }
                report.pulled = rows.len();
            }
            Err(error) => {
                tracing::warn!(%error, "Pull failed; keeping local data");
                let message = error.to_string();
                report.pull_error = Some(message.clone());
                report.stale = !self.publish(token, sink, month, PassEvent::PullFailed(message));
                return Ok(report);
            }
        }

        let settled = self.store.query_by_month(month).await?;
        report.stale = !self.publish(token, sink, month, PassEvent::Settled(settled));

        tracing::debug!(
            swept = report.swept,
            pushed = report.pushed,
            push_failures = report.push_failures,
            pulled = report.pulled,
            "Reconciliation pass finished"
        );
        Ok(report)
    }

    async fn push_unsynced(&self, report: &mut SyncReport) -> Result<()> {
        let pending = self.store.query_unsynced().await?;
        if pending.is_empty() {
            return Ok(());
        }
        tracing::debug!(count = pending.len(), "Pushing unsynced records");

        for record in pending {
            match self.remote.insert(&record.to_remote_entry()).await {
                Ok(canonical) => {
                    if self.store.confirm_push(record.id, &canonical).await?.is_some() {
                        report.pushed += 1;
                    } else {
                        tracing::debug!(local_id = %record.id, "Pushed record vanished before confirmation");
                    }
                }
                Err(error) => {
                    tracing::warn!(local_id = %record.id, %error, "Push failed; record stays unsynced");
                    report.push_failures += 1;
                }
            }
        }

        Ok(())
    }

    /// Returns whether the event was published.
    fn publish(
        &self,
        token: PassToken,
        sink: &impl PassSink,
        month: MonthKey,
        event: PassEvent,
    ) -> bool {
        if self.is_current(token) {
            sink.publish(month, event);
            true
        } else {
            tracing::debug!("Discarding publication of a superseded pass");
            false
        }
    }
}
