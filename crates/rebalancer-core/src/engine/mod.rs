//! Rebalancing engine
//!
//! Drives one run end to end: validate input, price every holding, compute
//! allocations, gather explanations and project the result into a report.

pub mod rebalance_engine;
pub mod report;

pub use rebalance_engine::RebalanceEngine;
pub use report::{HoldingRow, PortfolioReport};
