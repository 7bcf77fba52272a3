//! Per-month totals

use rust_decimal::Decimal;
use serde::Serialize;

use super::{EntryType, LedgerRecord};

/// Income/expense totals for a set of records.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MonthSummary {
    pub income: Decimal,
    pub expense: Decimal,
    /// `income - expense`
    pub net: Decimal,
    pub count: usize,
    /// Records still waiting for remote confirmation
    pub unsynced: usize,
}

impl MonthSummary {
    pub fn from_records(records: &[LedgerRecord]) -> Self {
        let mut summary = Self::default();
        for record in records {
            match record.entry_type {
                EntryType::Income => summary.income += record.amount,
                EntryType::Expense => summary.expense += record.amount,
            }
            summary.count += 1;
            if !record.synced {
                summary.unsynced += 1;
            }
        }
        summary.net = summary.income - summary.expense;
        summary
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::LocalId;
    use chrono::Utc;

    fn record(id: i64, amount: &str, entry_type: EntryType, synced: bool) -> LedgerRecord {
        LedgerRecord {
            id: LocalId(id),
            remote_id: None,
            client_ref: None,
            description: format!("record {id}"),
            amount: amount.parse().unwrap(),
            category: None,
            entry_type,
            created_at: Utc::now(),
            synced,
        }
    }

    #[test]
    fn totals_by_entry_type() {
        let records = vec![
            record(1, "3000", EntryType::Income, true),
            record(2, "4.5", EntryType::Expense, false),
            record(3, "120.25", EntryType::Expense, true),
        ];

        let summary = MonthSummary::from_records(&records);
        assert_eq!(summary.income, "3000".parse::<Decimal>().unwrap());
        assert_eq!(summary.expense, "124.75".parse::<Decimal>().unwrap());
        assert_eq!(summary.net, "2875.25".parse::<Decimal>().unwrap());
        assert_eq!(summary.count, 3);
        assert_eq!(summary.unsynced, 1);
    }

    #[test]
    fn empty_month_is_zero() {
        assert_eq!(MonthSummary::from_records(&[]), MonthSummary::default());
    }
}
