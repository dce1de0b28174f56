//! Equal-weight portfolio rebalancing
//!
//! This crate turns a list of ticker symbols and share counts into buy, sell
//! or hold recommendations. It includes:
//!
//! - Input validation for comma-separated symbol and quantity lists
//! - Latest closing prices from Yahoo Finance, rate limited and retried
//! - Allocation math against an equal-weight target
//! - Best-effort natural-language explanations from an LLM
//! - Table and JSON report formatting
//!
//! # Architecture
//!
//! [`RebalanceEngine`] drives a [`Portfolio`] through two phases. Prices are
//! fetched concurrently through a [`PriceFetcher`]; once every holding is
//! priced, allocations are computed and an [`ExplanationService`] is asked to
//! justify each recommended trade. Explanation failures are recorded per
//! holding and never abort the run.
//!
//! # Example
//!
//! ```rust,ignore
//! use rebalancer_core::{FormatterFactory, OutputFormat, RebalanceConfig, RebalanceEngine};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = RebalanceConfig::builder().explanations_enabled(false).build()?;
//!     let engine = RebalanceEngine::from_config(config, None)?;
//!
//!     let report = engine.run("AAPL, MSFT, GOOGL", "10, 5, 8").await?;
//!     println!("{}", FormatterFactory::create(OutputFormat::Table).format_report(&report)?);
//!
//!     Ok(())
//! }
//! ```

pub mod api;
pub mod config;
pub mod engine;
pub mod error;
pub mod explanation;
pub mod input;
pub mod interface;
pub mod portfolio;
pub mod prompts;
pub mod retry;

// Re-export main types for convenience
pub use api::{PriceFetcher, PriceQuote, YahooPriceFetcher};
pub use config::{ExplanationConfig, FailurePolicy, RebalanceConfig, RoundingPolicy};
pub use engine::{HoldingRow, PortfolioReport, RebalanceEngine};
pub use error::{ExplanationError, PriceFailure, PriceFetchError, RebalanceError, Result};
pub use explanation::{Explanation, ExplanationService, LlmExplainer};
pub use input::{SAMPLE_QUANTITIES, SAMPLE_SYMBOLS, parse_holdings};
pub use interface::{Formatter, FormatterFactory, OutputFormat};
pub use portfolio::{Allocation, Holding, Portfolio, Position, Stage, TradeAction};
pub use retry::{RetryPolicy, Retryable};
