// src/portfolio.rs
use crate::api::ApiClient;
use crate::cancel::CancelToken;
use crate::error::ApiError;
use crate::models::{AddStockRequest, Portfolio, PortfolioPerformance, UpdateStockRequest};
use log::{error, info};
use reqwest::Method;

/// Holdings and performance for the signed-in user.
///
/// Every call reads the bearer token when it is made and fails with
/// [`ApiError::AuthRequired`] before touching the network if none is stored.
/// Mutations return the updated portfolio; nothing is cached here.
#[derive(Clone)]
pub struct PortfolioService {
    client: ApiClient,
}

impl PortfolioService {
    pub fn new(client: ApiClient) -> Self {
        PortfolioService { client }
    }

    pub async fn get_portfolio(&self, cancel: &CancelToken) -> Result<Portfolio, ApiError> {
        self.client
            .authorized_json(Method::GET, "/portfolio", None::<&()>, "fetch portfolio", cancel)
            .await
            .map_err(|e| {
                error!("Error fetching portfolio: {}", e);
                e
            })
    }

    /// `quantity` and `buy_price` are expected to be positive; the caller
    /// checks them.
    pub async fn add_stock(
        &self,
        request: &AddStockRequest,
        cancel: &CancelToken,
    ) -> Result<Portfolio, ApiError> {
        let portfolio = self
            .client
            .authorized_json(Method::POST, "/portfolio/add", Some(request), "add stock", cancel)
            .await
            .map_err(|e| {
                error!("Error adding stock to portfolio: {}", e);
                e
            })?;
        info!("Added {} x{} to portfolio", request.symbol, request.quantity);
        Ok(portfolio)
    }

    pub async fn update_stock(
        &self,
        symbol: &str,
        update: &UpdateStockRequest,
        cancel: &CancelToken,
    ) -> Result<Portfolio, ApiError> {
        let path = format!("/portfolio/update/{}", urlencoding::encode(symbol));
        let portfolio = self
            .client
            .authorized_json(Method::PUT, &path, Some(update), "update stock", cancel)
            .await
            .map_err(|e| {
                error!("Error updating stock {} in portfolio: {}", symbol, e);
                e
            })?;
        info!("Updated {} in portfolio", symbol);
        Ok(portfolio)
    }

    pub async fn remove_stock(
        &self,
        symbol: &str,
        cancel: &CancelToken,
    ) -> Result<Portfolio, ApiError> {
        let path = format!("/portfolio/remove/{}", urlencoding::encode(symbol));
        let portfolio = self
            .client
            .authorized_json(Method::DELETE, &path, None::<&()>, "remove stock", cancel)
            .await
            .map_err(|e| {
                error!("Error removing stock {} from portfolio: {}", symbol, e);
                e
            })?;
        info!("Removed {} from portfolio", symbol);
        Ok(portfolio)
    }

    pub async fn get_performance(
        &self,
        cancel: &CancelToken,
    ) -> Result<PortfolioPerformance, ApiError> {
        self.client
            .authorized_json(
                Method::GET,
                "/portfolio/performance",
                None::<&()>,
                "fetch portfolio performance",
                cancel,
            )
            .await
            .map_err(|e| {
                error!("Error fetching portfolio performance: {}", e);
                e
            })
    }

    /// Portfolio and performance fetched concurrently, as the holdings view
    /// needs both.
    pub async fn get_overview(
        &self,
        cancel: &CancelToken,
    ) -> Result<(Portfolio, PortfolioPerformance), ApiError> {
        tokio::try_join!(self.get_portfolio(cancel), self.get_performance(cancel))
    }
}
