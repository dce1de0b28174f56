//! User message templates

use crate::portfolio::{TradeAction, format_shares};

/// Build the instruction asking the model to justify a recommended trade
///
/// The wording depends on the sign of `quantity_change`: positive buys,
/// negative sells, zero holds.
pub fn rebalance_instruction(symbol: &str, quantity_change: f64) -> String {
    let action = match TradeAction::from_change(quantity_change) {
        TradeAction::Buy => format!(
            "buy {} more shares of {symbol}",
            format_shares(quantity_change)
        ),
        TradeAction::Sell => format!("sell {} shares of {symbol}", format_shares(-quantity_change)),
        TradeAction::Hold => format!("hold your current position in {symbol}"),
    };

    format!(
        "As a financial advisor, explain why the client should {action} to rebalance their portfolio."
    )
}
