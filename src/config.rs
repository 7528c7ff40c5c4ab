// src/config.rs
use crate::credentials::{CredentialStore, FileCredentialStore, MemoryCredentialStore};
use crate::error::ConfigError;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::str::FromStr;
use std::time::Duration;

pub const DEFAULT_API_BASE_URL: &str = "http://localhost:5000/api";
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_VALIDATION_TIMEOUT_MS: u64 = 10_000;
pub const DEFAULT_DISPLAY_LIMIT: usize = 4;
pub const DEFAULT_BATCH_DELAY_MS: u64 = 1_000;
pub const TOKEN_FILE_DIR: &str = ".stock_dashboard";
pub const TOKEN_FILE_NAME: &str = "storage.json";

/// `$HOME/.stock_dashboard/storage.json`, or `None` without a home directory.
pub fn default_token_file() -> Option<PathBuf> {
    dirs::home_dir().map(|home| home.join(TOKEN_FILE_DIR).join(TOKEN_FILE_NAME))
}

/// Runtime settings for the dashboard client.
///
/// Every field has a default; `from_env` overrides them from the
/// `API_BASE_URL` and `DASHBOARD_*` environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    pub api_base_url: String,
    pub request_timeout: Duration,
    pub validation_timeout: Duration,
    /// Restores per-stock validation in the stock list filter.
    pub validate_stocks: bool,
    pub display_limit: usize,
    pub batch_delay: Duration,
    /// Where the bearer token is persisted. `None` keeps it in memory for
    /// the life of the process.
    pub token_file: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            api_base_url: DEFAULT_API_BASE_URL.to_string(),
            request_timeout: Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS),
            validation_timeout: Duration::from_millis(DEFAULT_VALIDATION_TIMEOUT_MS),
            validate_stocks: false,
            display_limit: DEFAULT_DISPLAY_LIMIT,
            batch_delay: Duration::from_millis(DEFAULT_BATCH_DELAY_MS),
            token_file: default_token_file(),
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Builds a config from an arbitrary variable lookup. Missing variables
    /// keep their defaults; present but unparsable ones are an error.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Config::default();

        if let Some(url) = lookup("API_BASE_URL") {
            config.api_base_url = url;
        }
        if let Some(secs) = parse_var::<u64, _>(&lookup, "DASHBOARD_REQUEST_TIMEOUT_SECS")? {
            config.request_timeout = Duration::from_secs(secs);
        }
        if let Some(ms) = parse_var::<u64, _>(&lookup, "DASHBOARD_VALIDATION_TIMEOUT_MS")? {
            config.validation_timeout = Duration::from_millis(ms);
        }
        if let Some(flag) = parse_var::<bool, _>(&lookup, "DASHBOARD_VALIDATE_STOCKS")? {
            config.validate_stocks = flag;
        }
        if let Some(limit) = parse_var::<usize, _>(&lookup, "DASHBOARD_DISPLAY_LIMIT")? {
            config.display_limit = limit;
        }
        if let Some(ms) = parse_var::<u64, _>(&lookup, "DASHBOARD_BATCH_DELAY_MS")? {
            config.batch_delay = Duration::from_millis(ms);
        }
        // An empty value opts out of persistence.
        if let Some(path) = lookup("DASHBOARD_TOKEN_FILE") {
            let path = path.trim();
            config.token_file = (!path.is_empty()).then(|| PathBuf::from(path));
        }

        config.api_base_url = config.api_base_url.trim_end_matches('/').to_string();
        Ok(config)
    }

    /// File-backed store when a token file is configured, else in-memory.
    pub fn credential_store(&self) -> Arc<dyn CredentialStore> {
        match &self.token_file {
            Some(path) => Arc::new(FileCredentialStore::new(path)),
            None => Arc::new(MemoryCredentialStore::new()),
        }
    }

    /// The token file, for operations whose result must outlive the process.
    pub fn require_token_file(&self) -> Result<&Path, ConfigError> {
        self.token_file.as_deref().ok_or(ConfigError::NoTokenFile)
    }
}

fn parse_var<T, F>(lookup: &F, name: &str) -> Result<Option<T>, ConfigError>
where
    T: FromStr,
    F: Fn(&str) -> Option<String>,
{
    match lookup(name) {
        None => Ok(None),
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|_| ConfigError::Invalid {
                name: name.to_string(),
                value: raw,
            }),
    }
}
