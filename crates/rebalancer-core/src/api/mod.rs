//! Market-data clients
//!
//! The pipeline only needs one thing from a market-data provider: the latest
//! closing price for a symbol. [`PriceFetcher`] is that seam; [`YahooPriceFetcher`]
//! is the production implementation.

pub mod yahoo;

use crate::error::PriceFetchError;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub use yahoo::YahooPriceFetcher;

/// Latest closing price for a symbol
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceQuote {
    pub symbol: String,
    pub close: f64,
    pub as_of: DateTime<Utc>,
}

impl PriceQuote {
    /// Quote stamped with the current time
    pub fn now(symbol: impl Into<String>, close: f64) -> Self {
        Self {
            symbol: symbol.into(),
            close,
            as_of: Utc::now(),
        }
    }
}

/// Source of latest closing prices
///
/// Implementations perform a single attempt; timeouts and retries are applied
/// by the caller.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait PriceFetcher: Send + Sync {
    /// Fetch the most recent closing price for `symbol`
    ///
    /// Returns [`PriceFetchError::NoData`] when the provider knows nothing
    /// about the symbol.
    async fn latest_close(&self, symbol: &str) -> Result<PriceQuote, PriceFetchError>;
}
