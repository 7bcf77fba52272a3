use std::env;
use std::io::{self, IsTerminal, Read};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use ledger_core::config::resolve_db_path;
use ledger_core::{
    EntryType, HttpRemoteLedger, LedgerConfig, LedgerRecord, LedgerStore, LedgerView, MonthKey,
    MonthSummary, RetentionSweeper, SyncEngine, SyncReport, SystemClock,
};
use rust_decimal::Decimal;
use serde::Serialize;

use crate::error::CliError;

/// Resolved configuration shared by every command.
#[derive(Debug, Clone)]
pub struct Context {
    pub config: LedgerConfig,
    pub db_path: PathBuf,
}

impl Context {
    pub fn load(
        cli_db_path: Option<PathBuf>,
        config_path: Option<&Path>,
    ) -> Result<Self, CliError> {
        let config = LedgerConfig::load(config_path)?;
        let db_path = resolve_db_path(cli_db_path, |key| env::var(key).ok())?;
        Ok(Self { config, db_path })
    }

    pub fn open_store(&self) -> Result<LedgerStore, CliError> {
        Ok(LedgerStore::open_path(&self.db_path)?)
    }

    pub fn sweeper(&self) -> RetentionSweeper {
        RetentionSweeper::new(self.config.retention_months)
    }

    /// Engine bound to the configured remote, or `None` when running offline.
    pub fn engine(
        &self,
        store: LedgerStore,
    ) -> Result<Option<SyncEngine<HttpRemoteLedger>>, CliError> {
        let Some(remote) = HttpRemoteLedger::from_config(&self.config)? else {
            return Ok(None);
        };
        let engine =
            SyncEngine::new(store, remote, Arc::new(SystemClock)).with_sweeper(self.sweeper());
        Ok(Some(engine))
    }

    pub fn require_engine(
        &self,
        store: LedgerStore,
    ) -> Result<SyncEngine<HttpRemoteLedger>, CliError> {
        self.engine(store)?.ok_or(CliError::RemoteNotConfigured)
    }

    pub fn view(
        &self,
        engine: SyncEngine<HttpRemoteLedger>,
        month: MonthKey,
    ) -> LedgerView<HttpRemoteLedger> {
        LedgerView::new(Arc::new(engine), month).with_eager_sync(self.config.eager_sync_on_append)
    }
}

#[derive(Debug, Serialize)]
pub struct RecordListItem {
    pub id: i64,
    pub remote_id: Option<i64>,
    pub description: String,
    pub amount: String,
    pub signed_amount: String,
    pub category: Option<String>,
    #[serde(rename = "type")]
    pub entry_type: EntryType,
    pub created_at: String,
    pub synced: bool,
}

#[derive(Debug, Serialize)]
pub struct MonthListing {
    pub month: MonthKey,
    pub records: Vec<RecordListItem>,
    pub summary: MonthSummary,
    pub last_error: Option<String>,
}

pub fn current_month() -> MonthKey {
    MonthKey::current(&SystemClock)
}

pub fn resolve_description(parts: &[String]) -> Result<String, CliError> {
    if let Some(description) = normalize_description(&parts.join(" ")) {
        return Ok(description);
    }

    if let Some(description) = read_piped_stdin()? {
        return Ok(description);
    }

    Err(CliError::EmptyDescription)
}

pub fn normalize_description(description: &str) -> Option<String> {
    let collapsed = description.split_whitespace().collect::<Vec<_>>().join(" ");
    if collapsed.is_empty() {
        None
    } else {
        Some(collapsed)
    }
}

/// The CLI takes a magnitude and lets `--income` pick the direction.
pub fn validate_amount(amount: Decimal) -> Result<Decimal, CliError> {
    if amount > Decimal::ZERO {
        Ok(amount.normalize())
    } else {
        Err(CliError::InvalidAmount(amount.to_string()))
    }
}

pub fn read_piped_stdin() -> Result<Option<String>, CliError> {
    let stdin = io::stdin();
    if stdin.is_terminal() {
        return Ok(None);
    }

    let mut buffer = String::new();
    stdin.lock().read_to_string(&mut buffer)?;
    Ok(normalize_description(&buffer))
}

pub fn record_to_list_item(record: &LedgerRecord) -> RecordListItem {
    RecordListItem {
        id: record.id.0,
        remote_id: record.remote_id.map(|id| id.0),
        description: record.description.clone(),
        amount: record.amount.to_string(),
        signed_amount: format_signed_amount(record),
        category: record.category.clone(),
        entry_type: record.entry_type,
        created_at: record.created_at.to_rfc3339(),
        synced: record.synced,
    }
}

pub fn month_listing(
    month: MonthKey,
    records: &[LedgerRecord],
    last_error: Option<String>,
) -> MonthListing {
    MonthListing {
        month,
        records: records.iter().map(record_to_list_item).collect(),
        summary: MonthSummary::from_records(records),
        last_error,
    }
}

pub fn format_record_lines(records: &[LedgerRecord]) -> Vec<String> {
    records
        .iter()
        .map(|record| {
            let marker = if record.synced { ' ' } else { '*' };
            let category = record.category.as_deref().unwrap_or("-");
            let description = truncate(&record.description, 32);
            format!(
                "{marker}{id:>5}  {date}  {description:<32}  {category:<10}  {amount:>12}",
                id = record.id.0,
                date = format_date(record.created_at),
                amount = format_signed_amount(record),
            )
        })
        .collect()
}

pub fn format_summary_line(summary: &MonthSummary) -> String {
    let mut line = format!(
        "income {:.2}  expense {:.2}  net {:.2}  ({} records",
        summary.income, summary.expense, summary.net, summary.count
    );
    if summary.unsynced > 0 {
        line.push_str(&format!(", {} pending", summary.unsynced));
    }
    line.push(')');
    line
}

pub fn format_report_lines(report: &SyncReport) -> Vec<String> {
    let mut lines = vec![
        format!("month      {}", report.month),
        format!("swept      {}", report.swept),
        format!("pushed     {}", report.pushed),
        format!("failed     {}", report.push_failures),
        format!("pulled     {}", report.pulled),
    ];
    if let Some(error) = &report.pull_error {
        lines.push(format!("pull error {error}"));
    }
    lines
}

pub fn format_signed_amount(record: &LedgerRecord) -> String {
    let sign = match record.entry_type {
        EntryType::Income => '+',
        EntryType::Expense => '-',
    };
    format!("{sign}{:.2}", record.amount)
}

pub fn format_date(timestamp: DateTime<Utc>) -> String {
    timestamp.format("%Y-%m-%d %H:%M").to_string()
}

fn truncate(value: &str, max_chars: usize) -> String {
    if value.chars().count() <= max_chars {
        value.to_string()
    } else {
        let mut truncated = value
            .chars()
            .take(max_chars.saturating_sub(3))
            .collect::<String>();
        truncated.push_str("...");
        truncated
    }
}
