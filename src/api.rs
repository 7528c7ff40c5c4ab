// src/api.rs
use crate::cancel::CancelToken;
use crate::config::Config;
use crate::credentials::CredentialStore;
use crate::error::{ApiError, ConfigError};
use crate::models::{HistoricalPoint, PriceSnapshot, SearchMatch, Sector, StockProfile};
use async_trait::async_trait;
use log::{debug, error, warn};
use reqwest::header::AUTHORIZATION;
use reqwest::{Client, Method, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;

pub const DEFAULT_HISTORY_PERIOD: &str = "1y";
pub const DEFAULT_HISTORY_INTERVAL: &str = "1d";

/// Anything that can produce a price snapshot for a symbol.
///
/// The batch helpers in [`crate::stock_utils`] only need this operation, so
/// they accept any source rather than a concrete HTTP client.
#[async_trait]
pub trait PriceSource: Send + Sync {
    async fn get_price(&self, symbol: &str, cancel: &CancelToken)
        -> Result<PriceSnapshot, ApiError>;
}

#[derive(Deserialize)]
struct ErrorBody {
    error: Option<String>,
    message: Option<String>,
}

/// HTTP client for the dashboard backend.
///
/// Cheap to clone: the connection pool and the credential store are shared.
#[derive(Clone)]
pub struct ApiClient {
    client: Client,
    base_url: String,
    credentials: Arc<dyn CredentialStore>,
}

impl ApiClient {
    pub fn new(config: &Config, credentials: Arc<dyn CredentialStore>) -> Result<Self, ConfigError> {
        let client = Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(ConfigError::ClientBuild)?;
        Ok(Self::with_client(client, &config.api_base_url, credentials))
    }

    pub fn with_client(
        client: Client,
        base_url: &str,
        credentials: Arc<dyn CredentialStore>,
    ) -> Self {
        ApiClient {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            credentials,
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn credentials(&self) -> &Arc<dyn CredentialStore> {
        &self.credentials
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    pub async fn get_sectors(&self, cancel: &CancelToken) -> Result<Vec<Sector>, ApiError> {
        self.get_json("/stocks/market/sectors", &[], "fetch sectors", cancel)
            .await
            .map_err(|e| {
                error!("Error fetching sectors: {}", e);
                e
            })
    }

    pub async fn get_stock_price(
        &self,
        symbol: &str,
        cancel: &CancelToken,
    ) -> Result<PriceSnapshot, ApiError> {
        if symbol.trim().is_empty() {
            return Err(ApiError::InvalidSymbol);
        }
        let path = format!("/stocks/price/{}", urlencoding::encode(symbol));
        self.get_json(&path, &[], "fetch stock price", cancel)
            .await
            .map_err(|e| {
                error!("Error fetching stock price for {}: {}", symbol, e);
                e
            })
    }

    /// Fetches several prices in a single `POST /stocks/prices` round trip.
    pub async fn get_multiple_stock_prices(
        &self,
        symbols: &[String],
        cancel: &CancelToken,
    ) -> Result<Vec<PriceSnapshot>, ApiError> {
        let request = self
            .client
            .post(self.url("/stocks/prices"))
            .json(&json!({ "symbols": symbols }));
        let response = self.send(request, cancel).await?;
        let status = response.status();
        if !status.is_success() {
            let message = format!("Failed to fetch multiple stock prices: {}", status.as_u16());
            error!("Error fetching multiple stock prices: {}", message);
            return Err(ApiError::Http { status, message });
        }
        decode(response, cancel).await
    }

    pub async fn search_stocks(
        &self,
        query: &str,
        cancel: &CancelToken,
    ) -> Result<Vec<SearchMatch>, ApiError> {
        self.get_json("/stocks/search", &[("query", query)], "search stocks", cancel)
            .await
            .map_err(|e| {
                error!("Error searching stocks with query '{}': {}", query, e);
                e
            })
    }

    pub async fn get_stock_profile(
        &self,
        symbol: &str,
        cancel: &CancelToken,
    ) -> Result<StockProfile, ApiError> {
        let path = format!("/stocks/profile/{}", urlencoding::encode(symbol));
        self.get_json(&path, &[], "fetch stock profile", cancel)
            .await
            .map_err(|e| {
                error!("Error fetching stock profile for {}: {}", symbol, e);
                e
            })
    }

    /// `period` and `interval` default to one year of daily bars.
    pub async fn get_historical_data(
        &self,
        symbol: &str,
        period: Option<&str>,
        interval: Option<&str>,
        cancel: &CancelToken,
    ) -> Result<Vec<HistoricalPoint>, ApiError> {
        let path = format!("/stocks/historical/{}", urlencoding::encode(symbol));
        let query = [
            ("period", period.unwrap_or(DEFAULT_HISTORY_PERIOD)),
            ("interval", interval.unwrap_or(DEFAULT_HISTORY_INTERVAL)),
        ];
        self.get_json(&path, &query, "fetch historical data", cancel)
            .await
            .map_err(|e| {
                error!("Error fetching historical data for {}: {}", symbol, e);
                e
            })
    }

    /// Reads the bearer token, failing before any I/O when none is stored.
    pub(crate) fn bearer(&self) -> Result<String, ApiError> {
        match self.credentials.get_token()? {
            Some(token) if !token.is_empty() => Ok(format!("Bearer {}", token)),
            _ => Err(ApiError::AuthRequired),
        }
    }

    /// Sends an authenticated request and decodes a JSON reply.
    ///
    /// Non-success replies surface the server's `error`/`message` field when
    /// present, else `"Failed to <action>: <status>"`. A 401 also drops the
    /// stored token.
    pub(crate) async fn authorized_json<T, B>(
        &self,
        method: Method,
        path: &str,
        body: Option<&B>,
        action: &str,
        cancel: &CancelToken,
    ) -> Result<T, ApiError>
    where
        T: DeserializeOwned,
        B: Serialize + ?Sized,
    {
        let auth = self.bearer()?;
        let mut request = self
            .client
            .request(method, self.url(path))
            .header(AUTHORIZATION, auth);
        if let Some(body) = body {
            request = request.json(body);
        }

        let response = self.send(request, cancel).await?;
        let status = response.status();
        if !status.is_success() {
            if status == StatusCode::UNAUTHORIZED {
                warn!("Backend rejected the stored token; clearing it");
                if let Err(e) = self.credentials.clear_token() {
                    error!("Failed to clear rejected token: {}", e);
                }
            }
            let message = error_message(response, action, cancel).await;
            return Err(ApiError::Http { status, message });
        }
        decode(response, cancel).await
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, &str)],
        action: &str,
        cancel: &CancelToken,
    ) -> Result<T, ApiError> {
        let url = self.url(path);
        debug!("GET {}", url);
        let mut request = self.client.get(&url);
        if !query.is_empty() {
            request = request.query(query);
        }
        let response = self.send(request, cancel).await?;
        let status = response.status();
        if !status.is_success() {
            return Err(ApiError::Http {
                status,
                message: format!("Failed to {}: {}", action, status.as_u16()),
            });
        }
        decode(response, cancel).await
    }

    pub(crate) fn request(&self, method: Method, path: &str) -> RequestBuilder {
        self.client.request(method, self.url(path))
    }

    pub(crate) async fn send(
        &self,
        request: RequestBuilder,
        cancel: &CancelToken,
    ) -> Result<Response, ApiError> {
        cancel
            .run(async move { request.send().await.map_err(ApiError::from) })
            .await
    }
}

#[async_trait]
impl PriceSource for ApiClient {
    async fn get_price(
        &self,
        symbol: &str,
        cancel: &CancelToken,
    ) -> Result<PriceSnapshot, ApiError> {
        self.get_stock_price(symbol, cancel).await
    }
}

pub(crate) async fn decode<T: DeserializeOwned>(
    response: Response,
    cancel: &CancelToken,
) -> Result<T, ApiError> {
    let bytes = cancel
        .run(async move { response.bytes().await.map_err(ApiError::from) })
        .await?;
    serde_json::from_slice(&bytes).map_err(|e| ApiError::Decode(e.to_string()))
}

/// Message for a failed reply: the server's own error text when it sent one.
pub(crate) async fn error_message(
    response: Response,
    action: &str,
    cancel: &CancelToken,
) -> String {
    let status = response.status();
    let body = cancel
        .run(async move { response.text().await.map_err(ApiError::from) })
        .await
        .unwrap_or_default();
    server_message(&body).unwrap_or_else(|| format!("Failed to {}: {}", action, status.as_u16()))
}

fn server_message(body: &str) -> Option<String> {
    let parsed: ErrorBody = serde_json::from_str(body).ok()?;
    let usable = |m: &String| !m.trim().is_empty();
    parsed
        .error
        .filter(usable)
        .or_else(|| parsed.message.filter(usable))
}
