use std::io;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CliError {
    #[error(transparent)]
    Core(#[from] ledger_core::Error),
    #[error(transparent)]
    Io(#[from] io::Error),
    #[error(transparent)]
    Serialization(#[from] serde_json::Error),
    #[error("No entry description provided")]
    EmptyDescription,
    #[error("Amount must be greater than zero, got {0}")]
    InvalidAmount(String),
    #[error(
        "Remote ledger is not configured. Set LEDGER_API_BASE_URL or add `api_base_url` to the config file."
    )]
    RemoteNotConfigured,
}
