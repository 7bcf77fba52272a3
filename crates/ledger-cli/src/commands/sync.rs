use ledger_core::{MonthKey, SyncReport};

use crate::commands::common::{current_month, format_report_lines, Context};
use crate::error::CliError;

pub async fn run_sync(
    month: Option<MonthKey>,
    as_json: bool,
    ctx: &Context,
) -> Result<(), CliError> {
    let report = sync_month(month.unwrap_or_else(current_month), ctx).await?;

    if as_json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        for line in format_report_lines(&report) {
            println!("{line}");
        }
    }
    Ok(())
}

pub async fn sync_month(month: MonthKey, ctx: &Context) -> Result<SyncReport, CliError> {
    if !ctx.config.has_remote() {
        return Err(CliError::RemoteNotConfigured);
    }

    let engine = ctx.require_engine(ctx.open_store()?)?;
    Ok(engine.reconcile(month, &()).await?)
}
