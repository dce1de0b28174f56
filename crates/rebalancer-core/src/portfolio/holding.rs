//! A single ticker position and its per-run state

use super::allocation::Allocation;
use crate::api::{PriceFetcher, PriceQuote};
use crate::config::{RebalanceConfig, RoundingPolicy};
use crate::error::{ExplanationError, PriceFailure, PriceFetchError, Result};
use crate::explanation::{Explanation, ExplanationService};
use crate::prompts::rebalance_instruction;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::time::timeout;
use tracing::{debug, warn};

/// Validated user input for one holding
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Position {
    /// Uppercase ticker symbol
    pub symbol: String,
    /// Current number of shares held (may be negative for short positions)
    pub quantity: i64,
}

impl Position {
    pub fn new(symbol: impl Into<String>, quantity: i64) -> Self {
        Self {
            symbol: symbol.into(),
            quantity,
        }
    }
}

/// One position plus everything derived for it during a run
///
/// The [`Position`] is fixed at construction. Price fields are zero until a
/// refresh succeeds; allocation and explanation are filled in by analysis.
#[derive(Debug, Clone, PartialEq)]
pub struct Holding {
    position: Position,
    current_price: f64,
    total_value: f64,
    priced_at: Option<DateTime<Utc>>,
    allocation: Option<Allocation>,
    explanation: Explanation,
}

impl Holding {
    pub fn new(position: Position) -> Self {
        Self {
            position,
            current_price: 0.0,
            total_value: 0.0,
            priced_at: None,
            allocation: None,
            explanation: Explanation::Pending,
        }
    }

    pub fn position(&self) -> &Position {
        &self.position
    }

    pub fn symbol(&self) -> &str {
        &self.position.symbol
    }

    pub fn quantity(&self) -> i64 {
        self.position.quantity
    }

    /// Latest price, zero until refreshed
    pub fn current_price(&self) -> f64 {
        self.current_price
    }

    /// `current_price * quantity`
    pub fn total_value(&self) -> f64 {
        self.total_value
    }

    /// When the current price was quoted
    pub fn priced_at(&self) -> Option<DateTime<Utc>> {
        self.priced_at
    }

    pub fn allocation(&self) -> Option<&Allocation> {
        self.allocation.as_ref()
    }

    pub fn explanation(&self) -> &Explanation {
        &self.explanation
    }

    /// Fetch the latest price without touching this holding
    ///
    /// Each attempt is bounded by `config.price_timeout` and transient
    /// failures are retried per `config.retry_policy()`. A non-positive price
    /// is rejected so it can never reach the allocation math.
    pub async fn fetch_price(
        &self,
        fetcher: &dyn PriceFetcher,
        config: &RebalanceConfig,
    ) -> std::result::Result<PriceQuote, PriceFailure> {
        let symbol = self.symbol();
        let limit = config.price_timeout;

        let quote = config
            .retry_policy()
            .execute("price fetch", || async move {
                match timeout(limit, fetcher.latest_close(symbol)).await {
                    Ok(result) => result,
                    Err(_) => Err(PriceFetchError::Timeout(limit)),
                }
            })
            .await
            .and_then(|quote| {
                if quote.close > 0.0 && quote.close.is_finite() {
                    Ok(quote)
                } else {
                    Err(PriceFetchError::InvalidPrice(quote.close))
                }
            })
            .map_err(|error| PriceFailure {
                symbol: symbol.to_string(),
                error,
            })?;

        debug!(symbol, close = quote.close, "Fetched price");
        Ok(quote)
    }

    /// Set the price from a quote and recompute the holding value
    ///
    /// Clears any allocation or explanation derived from an earlier price.
    pub fn apply_price(&mut self, quote: &PriceQuote) {
        self.current_price = quote.close;
        self.total_value = quote.close * self.position.quantity as f64;
        self.priced_at = Some(quote.as_of);
        self.allocation = None;
        self.explanation = Explanation::Pending;
    }

    /// Fetch and apply the latest price
    pub async fn refresh_price(
        &mut self,
        fetcher: &dyn PriceFetcher,
        config: &RebalanceConfig,
    ) -> Result<()> {
        let quote = self.fetch_price(fetcher, config).await?;
        self.apply_price(&quote);
        Ok(())
    }

    /// Drop price and derived state
    pub(crate) fn clear(&mut self) {
        *self = Self::new(self.position.clone());
    }

    /// Compute allocation metrics against the portfolio total
    pub fn compute_allocation(
        &mut self,
        portfolio_total: f64,
        ideal_allocation: f64,
        rounding: RoundingPolicy,
    ) -> Result<&Allocation> {
        let allocation = Allocation::compute(
            &self.position.symbol,
            self.total_value,
            self.current_price,
            portfolio_total,
            ideal_allocation,
            rounding,
        )?;
        Ok(self.allocation.insert(allocation))
    }

    /// Ask the explanation service to justify the recommended trade
    ///
    /// Never fails: any error, including a timeout, is stored as
    /// [`Explanation::Failed`] and the numeric state is left untouched.
    pub async fn request_explanation(
        &mut self,
        service: &dyn ExplanationService,
        config: &RebalanceConfig,
    ) {
        let Some(allocation) = self.allocation else {
            self.explanation = Explanation::Failed("allocation has not been computed".to_string());
            return;
        };

        let prompt = rebalance_instruction(self.symbol(), allocation.quantity_change);
        let prompt = prompt.as_str();
        let limit = config.explanation_timeout;

        let result = config
            .retry_policy()
            .execute("explanation", || async move {
                match timeout(limit, service.explain(prompt)).await {
                    Ok(result) => result,
                    Err(_) => Err(ExplanationError::Timeout(limit)),
                }
            })
            .await;

        self.explanation = match result {
            Ok(text) => Explanation::Generated(text),
            Err(e) => {
                warn!(symbol = self.symbol(), error = %e, "Explanation failed");
                Explanation::Failed(e.to_string())
            }
        };
    }

    pub(crate) fn skip_explanation(&mut self) {
        self.explanation = Explanation::Skipped;
    }
}

impl From<Position> for Holding {
    fn from(position: Position) -> Self {
        Self::new(position)
    }
}
