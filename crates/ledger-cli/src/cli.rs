use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};
use ledger_core::MonthKey;
use rust_decimal::Decimal;

#[derive(Parser)]
#[command(name = "ledger")]
#[command(about = "Track income and expenses offline, reconcile when online")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Optional path to local database file
    #[arg(long, global = true, value_name = "PATH")]
    pub db_path: Option<PathBuf>,

    /// Optional path to a JSON config file
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Record a new entry locally
    #[command(alias = "new")]
    Add {
        /// Entry description
        description: Vec<String>,
        /// Positive magnitude; `--income` sets the direction
        #[arg(short, long, value_name = "DECIMAL")]
        amount: Decimal,
        /// Record as income (default: expense)
        #[arg(long)]
        income: bool,
        /// Category label (normally assigned by the server)
        #[arg(short, long)]
        category: Option<String>,
    },
    /// Show one month, reconciling with the server first
    View {
        /// Month as YYYY-MM (default: current month)
        #[arg(short, long, value_name = "YYYY-MM")]
        month: Option<MonthKey>,
        /// Only read the local store
        #[arg(long)]
        offline: bool,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Run a reconciliation pass and print its report
    Sync {
        /// Month as YYYY-MM (default: current month)
        #[arg(short, long, value_name = "YYYY-MM")]
        month: Option<MonthKey>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Delete local records outside the retention window
    Prune,
    /// List records not yet confirmed by the server
    Pending {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Generate shell completion scripts
    Completions {
        /// Target shell
        #[arg(value_enum)]
        shell: CompletionShell,
        /// Optional output path (stdout when omitted)
        #[arg(short, long, value_name = "PATH")]
        output: Option<PathBuf>,
    },
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, ValueEnum)]
pub enum CompletionShell {
    Bash,
    Zsh,
    Fish,
}
