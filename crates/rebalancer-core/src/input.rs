//! Parsing of the comma-separated symbol and quantity lists

use crate::error::{RebalanceError, Result};
use crate::portfolio::Position;

/// Example symbols shown to first-time users
pub const SAMPLE_SYMBOLS: &str = "AAPL, MSFT, GOOGL";

/// Example quantities matching [`SAMPLE_SYMBOLS`]
pub const SAMPLE_QUANTITIES: &str = "10, 5, 8";

/// Parse paired symbol and quantity lists into positions
///
/// Symbols are trimmed and uppercased. Checks run in order: every symbol must
/// be non-empty, every quantity must be an integer, then both lists must have
/// the same length. Positions in errors are 1-based. Nothing is returned
/// unless all checks pass.
pub fn parse_holdings(symbols: &str, quantities: &str) -> Result<Vec<Position>> {
    let symbols = parse_symbols(symbols)?;
    let quantities = parse_quantities(quantities)?;

    if symbols.len() != quantities.len() {
        return Err(RebalanceError::CountMismatch {
            symbols: symbols.len(),
            quantities: quantities.len(),
        });
    }

    Ok(symbols
        .into_iter()
        .zip(quantities)
        .map(|(symbol, quantity)| Position { symbol, quantity })
        .collect())
}

fn parse_symbols(raw: &str) -> Result<Vec<String>> {
    raw.split(',')
        .enumerate()
        .map(|(i, token)| {
            let symbol = token.trim();
            if symbol.is_empty() {
                Err(RebalanceError::EmptySymbol { position: i + 1 })
            } else {
                Ok(symbol.to_uppercase())
            }
        })
        .collect()
}

fn parse_quantities(raw: &str) -> Result<Vec<i64>> {
    raw.split(',')
        .enumerate()
        .map(|(i, token)| {
            let token = token.trim();
            token.parse::<i64>().map_err(|_| RebalanceError::Format {
                token: token.to_string(),
                position: i + 1,
            })
        })
        .collect()
}
