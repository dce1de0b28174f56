//! Equal-weight allocation math for a single holding

use crate::config::RoundingPolicy;
use crate::error::{RebalanceError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Direction of a recommended trade
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TradeAction {
    Buy,
    Sell,
    Hold,
}

impl TradeAction {
    /// Action implied by the sign of a share change
    pub fn from_change(quantity_change: f64) -> Self {
        if quantity_change > 0.0 {
            Self::Buy
        } else if quantity_change < 0.0 {
            Self::Sell
        } else {
            Self::Hold
        }
    }
}

impl fmt::Display for TradeAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Buy => "buy",
            Self::Sell => "sell",
            Self::Hold => "hold",
        })
    }
}

/// Format a share count without a trailing ".0" for whole shares
pub fn format_shares(shares: f64) -> String {
    if shares.fract() == 0.0 {
        format!("{shares:.0}")
    } else {
        format!("{shares}")
    }
}

/// Derived allocation metrics for one holding
///
/// Percentages are on a 0-100 scale. Produced by [`Allocation::compute`], which
/// is pure: identical inputs always give identical output.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Allocation {
    /// Share of the portfolio value held in this position
    pub allocation_percentage: f64,
    /// Equal-weight target, `100 / holding_count`
    pub ideal_allocation: f64,
    /// `ideal_allocation - allocation_percentage`
    pub allocation_difference: f64,
    /// Currency amount to buy (positive) or sell (negative)
    pub value_difference: f64,
    /// Recommended share delta after rounding
    pub quantity_change: f64,
}

impl Allocation {
    /// Compute allocation metrics for a holding
    ///
    /// Fails with [`RebalanceError::DivisionInvalid`] when the portfolio total
    /// or the price is not positive, or when the share change does not fit in
    /// an `f64`. No infinite or NaN share change is ever produced.
    pub fn compute(
        symbol: &str,
        holding_value: f64,
        current_price: f64,
        portfolio_total: f64,
        ideal_allocation: f64,
        rounding: RoundingPolicy,
    ) -> Result<Self> {
        if !(portfolio_total > 0.0 && portfolio_total.is_finite()) {
            return Err(RebalanceError::DivisionInvalid(format!(
                "portfolio total value is {portfolio_total}, expected a positive amount"
            )));
        }

        if !(current_price > 0.0 && current_price.is_finite()) {
            return Err(RebalanceError::DivisionInvalid(format!(
                "price for {symbol} is {current_price}, expected a positive amount"
            )));
        }

        let allocation_percentage = holding_value / portfolio_total * 100.0;
        let allocation_difference = ideal_allocation - allocation_percentage;
        let value_difference = allocation_difference / 100.0 * portfolio_total;
        let raw_change = value_difference / current_price;
        if !raw_change.is_finite() {
            return Err(RebalanceError::DivisionInvalid(format!(
                "share change for {symbol} is {raw_change} at price {current_price}"
            )));
        }
        let quantity_change = rounding.apply(raw_change);

        Ok(Self {
            allocation_percentage,
            ideal_allocation,
            allocation_difference,
            value_difference,
            quantity_change,
        })
    }

    /// Recommended trade direction
    pub fn action(&self) -> TradeAction {
        TradeAction::from_change(self.quantity_change)
    }
}
