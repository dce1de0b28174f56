//! Error types for portfolio rebalancing operations

use rebalancer_llm::LLMError;
use std::fmt;
use std::time::Duration;
use thiserror::Error;

/// Rebalancing pipeline errors
///
/// Everything here aborts a run. Explanation failures are the exception: they
/// are absorbed into [`crate::Explanation::Failed`] and never surface as a
/// `RebalanceError`.
#[derive(Debug, Error)]
pub enum RebalanceError {
    /// A quantity token is not an integer
    #[error("Invalid quantity '{token}' at position {position}: expected a whole number of shares")]
    Format { token: String, position: usize },

    /// Symbols and quantities have different lengths
    #[error("The number of symbols ({symbols}) and quantities ({quantities}) must match")]
    CountMismatch { symbols: usize, quantities: usize },

    /// A symbol is blank after trimming
    #[error("Empty symbol at position {position}")]
    EmptySymbol { position: usize },

    /// The market-data provider could not price a symbol
    #[error("Could not fetch data for symbol {symbol}: {source}")]
    PriceUnavailable {
        symbol: String,
        source: PriceFetchError,
    },

    /// Several symbols could not be priced (report-all policy)
    #[error("Could not fetch data for {} symbols: {}", .0.len(), FailureList(.0))]
    PricesUnavailable(Vec<PriceFailure>),

    /// Allocation math would divide by a zero or negative amount
    #[error("Cannot compute allocation: {0}")]
    DivisionInvalid(String),

    /// Analysis requested on a portfolio without holdings
    #[error("Portfolio has no holdings to analyze")]
    EmptyPortfolio,

    /// Analysis requested before prices were fetched
    #[error("Prices must be refreshed before the portfolio can be analyzed")]
    PricesNotRefreshed,

    /// Report requested before the portfolio was analyzed
    #[error("Portfolio must be analyzed before a report can be built")]
    NotAnalyzed,

    /// Configuration error
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// LLM provider setup failed
    #[error("LLM error: {0}")]
    Llm(#[from] LLMError),
}

impl RebalanceError {
    /// Whether the error comes from user input rather than the pipeline
    pub fn is_input_error(&self) -> bool {
        matches!(
            self,
            Self::Format { .. } | Self::CountMismatch { .. } | Self::EmptySymbol { .. }
        )
    }

    /// Symbols that could not be priced, in input order
    pub fn unpriced_symbols(&self) -> Vec<&str> {
        match self {
            Self::PriceUnavailable { symbol, .. } => vec![symbol.as_str()],
            Self::PricesUnavailable(failures) => {
                failures.iter().map(|f| f.symbol.as_str()).collect()
            }
            _ => Vec::new(),
        }
    }
}

/// Result type alias for rebalancing operations
pub type Result<T> = std::result::Result<T, RebalanceError>;

/// Underlying cause of a failed price lookup
#[derive(Debug, Clone, PartialEq, Error)]
pub enum PriceFetchError {
    /// Provider returned no data (unknown or delisted symbol)
    #[error("no price data returned")]
    NoData,

    /// The provider did not answer in time
    #[error("request timed out after {0:?}")]
    Timeout(Duration),

    /// Provider quota exhausted
    #[error("rate limited by provider: {0}")]
    RateLimited(String),

    /// Provider returned a price that cannot be used
    #[error("invalid price {0}")]
    InvalidPrice(f64),

    /// Transport or service failure
    #[error("provider error: {0}")]
    Provider(String),
}

/// A symbol paired with the reason it could not be priced
#[derive(Debug, Clone, PartialEq)]
pub struct PriceFailure {
    pub symbol: String,
    pub error: PriceFetchError,
}

impl fmt::Display for PriceFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.symbol, self.error)
    }
}

impl From<PriceFailure> for RebalanceError {
    fn from(failure: PriceFailure) -> Self {
        Self::PriceUnavailable {
            symbol: failure.symbol,
            source: failure.error,
        }
    }
}

struct FailureList<'a>(&'a [PriceFailure]);

impl fmt::Display for FailureList<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, failure) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{failure}")?;
        }
        Ok(())
    }
}

/// Why an explanation could not be produced
#[derive(Debug, Error)]
pub enum ExplanationError {
    /// The language model did not answer in time
    #[error("request timed out after {0:?}")]
    Timeout(Duration),

    /// The model answered with no text
    #[error("model returned an empty response")]
    EmptyResponse,

    /// Transport, quota or model error
    #[error(transparent)]
    Provider(#[from] LLMError),
}
