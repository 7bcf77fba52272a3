use ledger_core::{MonthKey, ViewState};

use crate::commands::common::{
    current_month, format_record_lines, format_summary_line, month_listing, Context,
};
use crate::error::CliError;

pub async fn run_view(
    month: Option<MonthKey>,
    offline: bool,
    as_json: bool,
    ctx: &Context,
) -> Result<(), CliError> {
    let month = month.unwrap_or_else(current_month);
    let state = load_month(month, offline, ctx).await?;

    if as_json {
        let listing = month_listing(state.month, &state.records, state.last_error.clone());
        println!("{}", serde_json::to_string_pretty(&listing)?);
        return Ok(());
    }

    if let Some(error) = &state.last_error {
        eprintln!("Showing local data only: {error}");
    }

    println!("{}", state.month);
    if state.records.is_empty() {
        println!("No records.");
    } else {
        for line in format_record_lines(&state.records) {
            println!("{line}");
        }
    }
    println!("{}", format_summary_line(&state.summary()));
    Ok(())
}

/// Activate the month view, or read the local store when offline or no
/// remote is configured.
pub async fn load_month(
    month: MonthKey,
    offline: bool,
    ctx: &Context,
) -> Result<ViewState, CliError> {
    let store = ctx.open_store()?;
    let engine = if offline {
        None
    } else {
        ctx.engine(store.clone())?
    };

    let Some(engine) = engine else {
        let records = store.query_by_month(month).await?;
        return Ok(ViewState {
            month,
            records,
            loading: false,
            last_error: None,
        });
    };

    let view = ctx.view(engine, month);
    view.activate(month).await?;
    Ok(view.snapshot())
}
