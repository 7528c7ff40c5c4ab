// src/lib.rs
//! Client for the stock dashboard backend: market data, portfolio and auth
//! endpoints, plus the batch helpers the dashboard views are built from.

pub mod api;
pub mod auth;
pub mod cancel;
pub mod config;
pub mod credentials;
pub mod error;
pub mod models;
pub mod portfolio;
pub mod stock_utils;

pub use api::{ApiClient, PriceSource};
pub use auth::AuthService;
pub use cancel::CancelToken;
pub use config::Config;
pub use credentials::{CredentialStore, FileCredentialStore, MemoryCredentialStore};
pub use error::{ApiError, ConfigError, CredentialError};
pub use portfolio::PortfolioService;
pub use stock_utils::{
    fetch_batch_stock_prices, filter_valid_symbols, StockListFilter, VALIDATION_FAIL_OPEN,
    VALIDATION_TIMEOUT,
};
