use chrono::Utc;
use ledger_core::models::PendingRecord;
use ledger_core::{EntryType, LedgerRecord, NewLedgerEntry};
use rust_decimal::Decimal;

use crate::commands::common::{current_month, resolve_description, validate_amount, Context};
use crate::error::CliError;

pub async fn run_add(
    description_parts: &[String],
    amount: Decimal,
    income: bool,
    category: Option<String>,
    ctx: &Context,
) -> Result<(), CliError> {
    let description = resolve_description(description_parts)?;
    let amount = validate_amount(amount)?;
    let entry_type = if income {
        EntryType::Income
    } else {
        EntryType::Expense
    };
    let entry = NewLedgerEntry::new(description, amount, category, entry_type)?;

    let record = add_entry(entry, ctx).await?;
    println!("{}", record.id);
    Ok(())
}

/// Stage the entry locally; with eager sync enabled the view also pushes it.
pub async fn add_entry(entry: NewLedgerEntry, ctx: &Context) -> Result<LedgerRecord, CliError> {
    let store = ctx.open_store()?;
    match ctx.engine(store.clone())? {
        Some(engine) => {
            let view = ctx.view(engine, current_month());
            Ok(view.append(entry).await?)
        }
        None => Ok(store
            .append(PendingRecord::unsynced(entry, Utc::now()))
            .await?),
    }
}
