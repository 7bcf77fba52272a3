//! Ledger CLI - Command-line interface for the offline-first ledger
//!
//! Records entries locally and reconciles them with the remote ledger when
//! a month is viewed or synced.

mod cli;
mod commands;
mod error;


use clap::{CommandFactory, Parser};

use crate::cli::{Cli, Commands};
use crate::commands::add::run_add;
use crate::commands::common::Context;
use crate::commands::completions::run_completions;
use crate::commands::pending::run_pending;
use crate::commands::prune::run_prune;
use crate::commands::sync::run_sync;
use crate::commands::view::run_view;
use crate::error::CliError;

#[tokio::main]
async fn main() {
    if let Err(error) = run().await {
        eprintln!("Error: {error}");
        std::process::exit(1);
    }
}

async fn run() -> Result<(), CliError> {
    dotenvy::dotenv().ok();

    let mut filter = tracing_subscriber::EnvFilter::from_default_env();
    if let Ok(directive) = "ledger=info".parse() {
        filter = filter.add_directive(directive);
    }
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let Some(command) = cli.command else {
        Cli::command().print_help().map_err(CliError::Io)?;
        println!();
        return Ok(());
    };

    if let Commands::Completions { shell, output } = &command {
        return run_completions(*shell, output.as_deref());
    }

    let ctx = Context::load(cli.db_path, cli.config.as_deref())?;

    match command {
        Commands::Add {
            description,
            amount,
            income,
            category,
        } => run_add(&description, amount, income, category, &ctx).await?,
        Commands::View {
            month,
            offline,
            json,
        } => run_view(month, offline, json, &ctx).await?,
        Commands::Sync { month, json } => run_sync(month, json, &ctx).await?,
        Commands::Prune => run_prune(&ctx).await?,
        Commands::Pending { json } => run_pending(json, &ctx).await?,
        Commands::Completions { .. } => {}
    }

    Ok(())
}
