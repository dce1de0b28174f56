//! Yahoo Finance API client

use super::{PriceFetcher, PriceQuote};
use crate::error::{PriceFetchError, RebalanceError, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use governor::clock::DefaultClock;
use governor::state::{InMemoryState, NotKeyed};
use governor::{Quota, RateLimiter};
use std::num::NonZeroU32;
use std::sync::Arc;
use tracing::{debug, instrument};
use yahoo_finance_api as yahoo;

type SharedRateLimiter = Arc<RateLimiter<NotKeyed, InMemoryState, DefaultClock>>;

/// Yahoo Finance price client
///
/// No API key is required. Requests are throttled client-side because Yahoo
/// answers bursts with HTTP 429.
#[derive(Clone)]
pub struct YahooPriceFetcher {
    connector: Arc<yahoo::YahooConnector>,
    limiter: SharedRateLimiter,
}

impl YahooPriceFetcher {
    /// Create a client allowing `requests_per_second` requests
    pub fn new(requests_per_second: u32) -> Result<Self> {
        let rps = NonZeroU32::new(requests_per_second).ok_or_else(|| {
            RebalanceError::ConfigError("requests_per_second must be greater than 0".to_string())
        })?;

        let connector = yahoo::YahooConnector::new().map_err(|e| {
            RebalanceError::ConfigError(format!("Failed to create Yahoo Finance client: {e}"))
        })?;

        Ok(Self {
            connector: Arc::new(connector),
            limiter: Arc::new(RateLimiter::direct(Quota::per_second(rps))),
        })
    }
}

#[async_trait]
impl PriceFetcher for YahooPriceFetcher {
    #[instrument(skip(self))]
    async fn latest_close(&self, symbol: &str) -> std::result::Result<PriceQuote, PriceFetchError> {
        self.limiter.until_ready().await;

        let response = self
            .connector
            .get_latest_quotes(symbol, "1d")
            .await
            .map_err(|e| classify_error(&e))?;

        // An empty result set is how Yahoo reports unknown or delisted symbols
        let quote = response.last_quote().map_err(|e| {
            debug!("No quote in response for {}: {}", symbol, e);
            PriceFetchError::NoData
        })?;

        debug!("Fetched {} close {}", symbol, quote.close);

        Ok(PriceQuote {
            symbol: symbol.to_string(),
            close: quote.close,
            as_of: DateTime::from_timestamp(quote.timestamp as i64, 0).unwrap_or_else(Utc::now),
        })
    }
}

/// Map a provider error onto a [`PriceFetchError`]
fn classify_error(error: &yahoo::YahooError) -> PriceFetchError {
    match error {
        yahoo::YahooError::NoQuotes { .. }
        | yahoo::YahooError::NoResult { .. } => PriceFetchError::NoData,
        yahoo::YahooError::FetchFailed(status) => classify_status(status),
        other => PriceFetchError::Provider(other.to_string()),
    }
}

/// Classify the HTTP status text carried by a failed fetch
fn classify_status(status: &str) -> PriceFetchError {
    let lower = status.to_ascii_lowercase();

    if lower.contains("429") || lower.contains("too many requests") {
        PriceFetchError::RateLimited(status.to_string())
    } else if lower.contains("404") || lower.contains("not found") {
        PriceFetchError::NoData
    } else {
        PriceFetchError::Provider(status.to_string())
    }
}
