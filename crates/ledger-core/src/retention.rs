//! Retention sweeper: bounds local storage to a rolling window of months.

use chrono::{DateTime, Months, Utc};

use crate::models::MonthKey;
use crate::services::LedgerStore;
use crate::Result;

/// Months of history kept locally unless configured otherwise.
pub const DEFAULT_RETENTION_MONTHS: u32 = 6;

/// Deletes local records older than the retention window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetentionSweeper {
    window_months: u32,
}

impl Default for RetentionSweeper {
    fn default() -> Self {
        Self::new(DEFAULT_RETENTION_MONTHS)
    }
}

impl RetentionSweeper {
    /// A window of zero months is treated as one.
    pub fn new(window_months: u32) -> Self {
        Self {
            window_months: window_months.max(1),
        }
    }

    pub const fn window_months(&self) -> u32 {
        self.window_months
    }

    /// `now - window`.
    pub fn cutoff(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        now.checked_sub_months(Months::new(self.window_months))
            .unwrap_or(DateTime::<Utc>::MIN_UTC)
    }

    /// Cutoff that never reaches into `active` or later.
    pub fn effective_cutoff(&self, now: DateTime<Utc>, active: Option<MonthKey>) -> DateTime<Utc> {
        let cutoff = self.cutoff(now);
        match active {
            Some(month) if month.start() < cutoff => month.start(),
            _ => cutoff,
        }
    }

    /// Delete expired records; returns how many were removed.
    pub async fn sweep(
        &self,
        store: &LedgerStore,
        now: DateTime<Utc>,
        active: Option<MonthKey>,
    ) -> Result<usize> {
        let cutoff = self.effective_cutoff(now, active);
        let deleted = store.delete_older_than(cutoff).await?;
        if deleted > 0 {
            tracing::info!(deleted, %cutoff, "Removed records outside the retention window");
        } else {
            tracing::trace!(%cutoff, "Retention sweep found nothing to remove");
        }
        Ok(deleted)
    }
}
