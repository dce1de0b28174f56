//! Report projected from an analyzed portfolio

use crate::error::{RebalanceError, Result};
use crate::explanation::Explanation;
use crate::portfolio::{Portfolio, Stage, TradeAction};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize, Serializer};

/// One table row per holding
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HoldingRow {
    pub symbol: String,
    pub quantity: i64,
    pub current_price: f64,
    pub total_value: f64,
    pub allocation_percentage: f64,
    pub target_allocation: f64,
    /// Signed share delta; whole counts serialize as JSON integers
    #[serde(serialize_with = "serialize_shares")]
    pub recommended_change: f64,
    pub action: TradeAction,
    pub priced_at: Option<DateTime<Utc>>,
    pub explanation: Explanation,
}

/// Result of a rebalancing run, holdings in input order
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PortfolioReport {
    pub total_value: f64,
    pub holdings: Vec<HoldingRow>,
    pub generated_at: DateTime<Utc>,
}

impl PortfolioReport {
    /// Build a report from a portfolio that has been analyzed
    pub fn from_portfolio(portfolio: &Portfolio) -> Result<Self> {
        if portfolio.stage() != Stage::Analyzed {
            return Err(RebalanceError::NotAnalyzed);
        }

        let holdings = portfolio
            .holdings()
            .iter()
            .map(|holding| {
                let allocation = holding.allocation().ok_or(RebalanceError::NotAnalyzed)?;
                Ok(HoldingRow {
                    symbol: holding.symbol().to_string(),
                    quantity: holding.quantity(),
                    current_price: holding.current_price(),
                    total_value: holding.total_value(),
                    allocation_percentage: allocation.allocation_percentage,
                    target_allocation: allocation.ideal_allocation,
                    recommended_change: allocation.quantity_change,
                    action: allocation.action(),
                    priced_at: holding.priced_at(),
                    explanation: holding.explanation().clone(),
                })
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            total_value: portfolio.total_value(),
            holdings,
            generated_at: Utc::now(),
        })
    }

    /// Holdings whose explanation could not be generated
    pub fn failed_explanations(&self) -> impl Iterator<Item = &HoldingRow> {
        self.holdings.iter().filter(|row| row.explanation.is_failed())
    }
}

/// Same rule as [`crate::portfolio::format_shares`]: no fraction, no decimal point
#[allow(clippy::cast_possible_truncation)]
fn serialize_shares<S: Serializer>(
    shares: &f64,
    serializer: S,
) -> std::result::Result<S::Ok, S::Error> {
    if shares.fract() == 0.0 && shares.abs() < i64::MAX as f64 {
        serializer.serialize_i64(*shares as i64)
    } else {
        serializer.serialize_f64(*shares)
    }
}
