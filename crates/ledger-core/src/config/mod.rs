//! Runtime configuration for ledger clients.
//!
//! Values are layered: built-in defaults, then an optional JSON file, then
//! `LEDGER_*` environment variables. The result is validated once before use.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::retention::DEFAULT_RETENTION_MONTHS;
use crate::util::{is_http_url, normalize_text_option};
use crate::{Error, Result};

pub const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 10;

pub const ENV_API_BASE_URL: &str = "LEDGER_API_BASE_URL";
pub const ENV_API_TOKEN: &str = "LEDGER_API_TOKEN";
pub const ENV_RETENTION_MONTHS: &str = "LEDGER_RETENTION_MONTHS";
pub const ENV_HTTP_TIMEOUT_SECS: &str = "LEDGER_HTTP_TIMEOUT_SECS";
pub const ENV_EAGER_SYNC: &str = "LEDGER_EAGER_SYNC";
pub const ENV_DB_PATH: &str = "LEDGER_DB_PATH";

const APP_DIR_NAME: &str = "ledger";
const CONFIG_FILE_NAME: &str = "config.json";
const DB_FILE_NAME: &str = "ledger.db";

/// Client configuration.
#[derive(Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct LedgerConfig {
    /// Base URL of the remote ledger API. Without it the client stays offline.
    #[serde(default)]
    pub api_base_url: Option<String>,
    #[serde(default)]
    pub api_token: Option<String>,
    #[serde(default = "default_retention_months")]
    pub retention_months: u32,
    #[serde(default = "default_http_timeout_secs")]
    pub http_timeout_secs: u64,
    /// Run a reconciliation pass right after each append.
    #[serde(default)]
    pub eager_sync_on_append: bool,
}

impl std::fmt::Debug for LedgerConfig {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        formatter
            .debug_struct("LedgerConfig")
            .field("api_base_url", &self.api_base_url)
            .field("api_token", &self.api_token.as_ref().map(|_| "[REDACTED]"))
            .field("retention_months", &self.retention_months)
            .field("http_timeout_secs", &self.http_timeout_secs)
            .field("eager_sync_on_append", &self.eager_sync_on_append)
            .finish()
    }
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            api_base_url: None,
            api_token: None,
            retention_months: DEFAULT_RETENTION_MONTHS,
            http_timeout_secs: DEFAULT_HTTP_TIMEOUT_SECS,
            eager_sync_on_append: false,
        }
    }
}

const fn default_retention_months() -> u32 {
    DEFAULT_RETENTION_MONTHS
}

const fn default_http_timeout_secs() -> u64 {
    DEFAULT_HTTP_TIMEOUT_SECS
}

impl LedgerConfig {
    /// Load from the process environment, reading `explicit_path` or the
    /// default config file first.
    ///
    /// A missing default file is not an error; a missing explicit file is.
    pub fn load(explicit_path: Option<&Path>) -> Result<Self> {
        let base = match explicit_path {
            Some(path) => Self::from_file(path)?,
            None => match default_config_path() {
                Some(path) if path.exists() => Self::from_file(&path)?,
                _ => Self::default(),
            },
        };

        base.with_env(|key| std::env::var(key).ok())?.validated()
    }

    /// Parse a JSON config file.
    pub fn from_file(path: &Path) -> Result<Self> {
        let payload = std::fs::read_to_string(path).map_err(|error| {
            Error::Config(format!("failed to read {}: {error}", path.display()))
        })?;
        Self::from_json(&payload)
            .map_err(|error| Error::Config(format!("{}: {error}", path.display())))
    }

    pub fn from_json(payload: &str) -> Result<Self> {
        serde_json::from_str(payload)
            .map_err(|error| Error::Config(format!("invalid config JSON: {error}")))
    }

    /// Overlay `LEDGER_*` variables resolved through `lookup`.
    pub fn with_env(mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let lookup = |key: &str| normalize_text_option(lookup(key));

        if let Some(url) = lookup(ENV_API_BASE_URL) {
            self.api_base_url = Some(url);
        }
        if let Some(token) = lookup(ENV_API_TOKEN) {
            self.api_token = Some(token);
        }
        if let Some(months) = lookup(ENV_RETENTION_MONTHS) {
            self.retention_months = parse_env_number(ENV_RETENTION_MONTHS, &months)?;
        }
        if let Some(secs) = lookup(ENV_HTTP_TIMEOUT_SECS) {
            self.http_timeout_secs = parse_env_number(ENV_HTTP_TIMEOUT_SECS, &secs)?;
        }
        if let Some(flag) = lookup(ENV_EAGER_SYNC) {
            self.eager_sync_on_append = parse_env_flag(ENV_EAGER_SYNC, &flag)?;
        }

        Ok(self)
    }

    /// Normalize and check values.
    pub fn validated(mut self) -> Result<Self> {
        self.api_base_url = match normalize_text_option(self.api_base_url) {
            Some(url) if is_http_url(&url) => Some(url.trim_end_matches('/').to_string()),
            Some(_) => {
                return Err(Error::Config(
                    "api_base_url must include http:// or https://".to_string(),
                ))
            }
            None => None,
        };
        self.api_token = normalize_text_option(self.api_token);

        if self.retention_months == 0 {
            return Err(Error::Config(
                "retention_months must be at least 1".to_string(),
            ));
        }
        if self.http_timeout_secs == 0 {
            return Err(Error::Config(
                "http_timeout_secs must be at least 1".to_string(),
            ));
        }

        Ok(self)
    }

    pub const fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http_timeout_secs)
    }

    pub const fn has_remote(&self) -> bool {
        self.api_base_url.is_some()
    }
}

/// `<config_dir>/ledger/config.json`.
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join(APP_DIR_NAME).join(CONFIG_FILE_NAME))
}

/// `<data_dir>/ledger/ledger.db`.
pub fn default_db_path() -> Option<PathBuf> {
    dirs::data_dir().map(|dir| dir.join(APP_DIR_NAME).join(DB_FILE_NAME))
}

/// Resolve the database path: explicit value, then `LEDGER_DB_PATH`, then the
/// platform data directory.
pub fn resolve_db_path(
    explicit: Option<PathBuf>,
    lookup: impl Fn(&str) -> Option<String>,
) -> Result<PathBuf> {
    if let Some(path) = explicit {
        return Ok(path);
    }
    if let Some(path) = normalize_text_option(lookup(ENV_DB_PATH)) {
        return Ok(PathBuf::from(path));
    }
    default_db_path()
        .ok_or_else(|| Error::Config("could not determine a data directory".to_string()))
}

fn parse_env_number<T: std::str::FromStr>(key: &str, value: &str) -> Result<T> {
    value
        .parse()
        .map_err(|_| Error::Config(format!("{key} must be a non-negative integer, got `{value}`")))
}

fn parse_env_flag(key: &str, value: &str) -> Result<bool> {
    match value.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(Error::Config(format!(
            "{key} must be true or false, got `{value}`"
        ))),
    }
}
