// src/stock_utils.rs
//! Batch helpers layered on a [`PriceSource`]: symbol validation, fan-out
//! price fetching with placeholders, and the stock list filter.

use crate::api::PriceSource;
use crate::cancel::CancelToken;
use crate::config::Config;
use crate::error::ApiError;
use crate::models::{PriceSnapshot, Stock, ValidationResult};
use futures::future::join_all;
use log::{debug, error, info};
use std::collections::HashMap;
use std::time::Duration;

/// Whether a probe that errors or times out still counts as a valid symbol.
///
/// Kept `true` so a flaky backend never empties the dashboard.
pub const VALIDATION_FAIL_OPEN: bool = true;

/// Upper bound on a single validation probe.
pub const VALIDATION_TIMEOUT: Duration = Duration::from_millis(10_000);

/// Probes every symbol concurrently and reports one result per input, in
/// input order. Fails only with [`ApiError::Cancelled`].
pub async fn validate_symbols<S>(
    source: &S,
    symbols: &[String],
    timeout: Duration,
    cancel: &CancelToken,
) -> Result<Vec<ValidationResult>, ApiError>
where
    S: PriceSource + ?Sized,
{
    if symbols.is_empty() {
        return Ok(Vec::new());
    }

    info!("Validating {} symbols...", symbols.len());
    let probes = symbols
        .iter()
        .map(|symbol| probe_symbol(source, symbol, timeout, cancel));
    cancel.run(async { Ok(join_all(probes).await) }).await
}

async fn probe_symbol<S>(
    source: &S,
    symbol: &str,
    timeout: Duration,
    cancel: &CancelToken,
) -> ValidationResult
where
    S: PriceSource + ?Sized,
{
    let is_valid = match tokio::time::timeout(timeout, source.get_price(symbol, cancel)).await {
        Ok(Ok(_)) => {
            debug!("Symbol {} is valid", symbol);
            true
        }
        Ok(Err(e)) => {
            info!("Symbol {} validation failed: {}", symbol, e);
            VALIDATION_FAIL_OPEN
        }
        Err(_) => {
            info!("Symbol {} validation failed: {}", symbol, ApiError::Timeout);
            VALIDATION_FAIL_OPEN
        }
    };
    ValidationResult {
        symbol: symbol.to_string(),
        is_valid,
    }
}

/// Returns the symbols that passed validation, preserving input order and
/// duplicates. Empty input makes no calls.
pub async fn filter_valid_symbols<S>(
    source: &S,
    symbols: &[String],
    timeout: Duration,
    cancel: &CancelToken,
) -> Result<Vec<String>, ApiError>
where
    S: PriceSource + ?Sized,
{
    let results = validate_symbols(source, symbols, timeout, cancel).await?;
    let valid: Vec<String> = results
        .into_iter()
        .filter(|r| r.is_valid)
        .map(|r| r.symbol)
        .collect();

    if !symbols.is_empty() {
        info!(
            "Found {} valid symbols out of {}",
            valid.len(),
            symbols.len()
        );
    }
    Ok(valid)
}

/// Fetches every symbol concurrently. A symbol whose fetch fails gets
/// [`PriceSnapshot::fallback`] instead, so the map always has an entry per
/// distinct input symbol. Fails only with [`ApiError::Cancelled`].
pub async fn fetch_batch_stock_prices<S>(
    source: &S,
    symbols: &[String],
    cancel: &CancelToken,
) -> Result<HashMap<String, PriceSnapshot>, ApiError>
where
    S: PriceSource + ?Sized,
{
    if symbols.is_empty() {
        return Ok(HashMap::new());
    }

    let fetches = symbols.iter().map(|symbol| async move {
        let snapshot = match source.get_price(symbol, cancel).await {
            Ok(snapshot) => snapshot,
            Err(e) => {
                error!("Error fetching data for {}: {}", symbol, e);
                PriceSnapshot::fallback()
            }
        };
        (symbol.clone(), snapshot)
    });

    let entries = cancel.run(async { Ok(join_all(fetches).await) }).await?;
    Ok(entries.into_iter().collect())
}

/// Chooses which stocks of a sector listing are shown.
///
/// With `validate` off (the default) this takes the first `display_limit`
/// stocks and makes no calls. With it on, stocks are validated in batches of
/// `concurrency` with `batch_delay` between batches.
#[derive(Debug, Clone)]
pub struct StockListFilter {
    pub validate: bool,
    pub display_limit: usize,
    pub validation_timeout: Duration,
    pub batch_delay: Duration,
}

impl Default for StockListFilter {
    fn default() -> Self {
        StockListFilter {
            validate: false,
            display_limit: crate::config::DEFAULT_DISPLAY_LIMIT,
            validation_timeout: VALIDATION_TIMEOUT,
            batch_delay: Duration::from_millis(crate::config::DEFAULT_BATCH_DELAY_MS),
        }
    }
}

impl StockListFilter {
    pub fn from_config(config: &Config) -> Self {
        StockListFilter {
            validate: config.validate_stocks,
            display_limit: config.display_limit,
            validation_timeout: config.validation_timeout,
            batch_delay: config.batch_delay,
        }
    }

    pub async fn filter_displayable<S>(
        &self,
        source: &S,
        stocks: &[Stock],
        concurrency: usize,
        cancel: &CancelToken,
    ) -> Result<Vec<Stock>, ApiError>
    where
        S: PriceSource + ?Sized,
    {
        if stocks.is_empty() {
            return Ok(Vec::new());
        }
        if !self.validate {
            return Ok(stocks.iter().take(self.display_limit).cloned().collect());
        }
        self.validate_in_batches(source, stocks, concurrency, cancel)
            .await
    }

    async fn validate_in_batches<S>(
        &self,
        source: &S,
        stocks: &[Stock],
        concurrency: usize,
        cancel: &CancelToken,
    ) -> Result<Vec<Stock>, ApiError>
    where
        S: PriceSource + ?Sized,
    {
        let batch_size = concurrency.max(1);
        let total_batches = stocks.len().div_ceil(batch_size);
        info!(
            "Validating {} stocks in batches of {}...",
            stocks.len(),
            batch_size
        );

        let mut valid_stocks = Vec::new();
        for (index, batch) in stocks.chunks(batch_size).enumerate() {
            let symbols: Vec<String> = batch.iter().map(|s| s.symbol.clone()).collect();
            let valid =
                filter_valid_symbols(source, &symbols, self.validation_timeout, cancel).await?;

            valid_stocks.extend(
                batch
                    .iter()
                    .filter(|stock| valid.contains(&stock.symbol))
                    .cloned(),
            );
            debug!("Processed batch {} of {}", index + 1, total_batches);

            if index + 1 < total_batches && !self.batch_delay.is_zero() {
                let delay = self.batch_delay;
                cancel
                    .run(async move {
                        tokio::time::sleep(delay).await;
                        Ok(())
                    })
                    .await?;
            }
        }

        info!(
            "Found {} valid stocks out of {}",
            valid_stocks.len(),
            stocks.len()
        );
        Ok(valid_stocks)
    }
}
