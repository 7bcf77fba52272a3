use chrono::{DateTime, Utc};

use crate::commands::common::{format_date, Context};
use crate::error::CliError;

pub async fn run_prune(ctx: &Context) -> Result<(), CliError> {
    let now = Utc::now();
    let deleted = prune(now, ctx).await?;
    println!(
        "Removed {deleted} record(s) created before {}",
        format_date(ctx.sweeper().cutoff(now))
    );
    Ok(())
}

pub async fn prune(now: DateTime<Utc>, ctx: &Context) -> Result<usize, CliError> {
    let store = ctx.open_store()?;
    Ok(ctx.sweeper().sweep(&store, now, None).await?)
}
