// src/error.rs
use reqwest::StatusCode;
use thiserror::Error;

/// Errors surfaced by the API client and the services built on it.
#[derive(Debug, Error)]
pub enum ApiError {
    /// The request never produced a response (connection refused, DNS, reset).
    #[error("Network error: {0}")]
    Network(#[source] reqwest::Error),

    /// The backend answered with a non-success status.
    ///
    /// `message` is the server-provided error when the body carried one,
    /// otherwise a generic `"Failed to <action>: <status>"` string.
    #[error("{message}")]
    Http { status: StatusCode, message: String },

    /// An authenticated call was attempted without a stored bearer token.
    #[error("Authentication required")]
    AuthRequired,

    #[error("Timeout")]
    Timeout,

    #[error("Operation cancelled")]
    Cancelled,

    /// The response body could not be decoded into the expected shape.
    #[error("Failed to decode response: {0}")]
    Decode(String),

    #[error("Invalid symbol: symbol must not be empty")]
    InvalidSymbol,

    #[error(transparent)]
    Credentials(#[from] CredentialError),
}

impl ApiError {
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            ApiError::Http { status, .. } => Some(*status),
            _ => None,
        }
    }
}

impl From<reqwest::Error> for ApiError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            ApiError::Timeout
        } else if e.is_decode() {
            ApiError::Decode(e.to_string())
        } else {
            ApiError::Network(e)
        }
    }
}

/// Failures reading or writing the persisted bearer token.
#[derive(Debug, Error)]
pub enum CredentialError {
    #[error("Credential store I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Credential store is corrupt: {0}")]
    Corrupt(#[from] serde_json::Error),

    #[error("Credential store lock poisoned")]
    Poisoned,
}

/// Errors related to application configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid value for {name}: {value}")]
    Invalid { name: String, value: String },

    #[error("Failed to build HTTP client: {0}")]
    ClientBuild(#[source] reqwest::Error),

    #[error("No token file configured; set DASHBOARD_TOKEN_FILE to keep the login")]
    NoTokenFile,
}
