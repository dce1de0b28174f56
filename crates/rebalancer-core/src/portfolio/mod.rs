//! Portfolio aggregation and the two-phase analysis
//!
//! A [`Portfolio`] is built from validated [`Position`]s, priced with
//! [`Portfolio::refresh_all`] and then analyzed with [`Portfolio::analyze`].
//! Both phases fan their network calls out with bounded concurrency while
//! keeping holdings in input order.

mod allocation;
mod holding;

pub use allocation::{Allocation, TradeAction, format_shares};
pub use holding::{Holding, Position};

use crate::api::{PriceFetcher, PriceQuote};
use crate::config::{FailurePolicy, RebalanceConfig};
use crate::error::{PriceFailure, RebalanceError, Result};
use crate::explanation::ExplanationService;
use futures::stream::{self, StreamExt};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

/// Where a portfolio is in its lifecycle
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    #[default]
    Created,
    PricesFetched,
    Analyzed,
}

/// Ordered collection of holdings for one analysis run
#[derive(Debug, Clone, PartialEq)]
pub struct Portfolio {
    holdings: Vec<Holding>,
    total_value: f64,
    stage: Stage,
}

impl Portfolio {
    pub fn new(positions: Vec<Position>) -> Self {
        Self {
            holdings: positions.into_iter().map(Holding::new).collect(),
            total_value: 0.0,
            stage: Stage::Created,
        }
    }

    pub fn holdings(&self) -> &[Holding] {
        &self.holdings
    }

    /// Sum of holding values, zero until prices are refreshed
    pub fn total_value(&self) -> f64 {
        self.total_value
    }

    pub fn stage(&self) -> Stage {
        self.stage
    }

    pub fn len(&self) -> usize {
        self.holdings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.holdings.is_empty()
    }

    /// Equal-weight target percentage, `None` for an empty portfolio
    pub fn ideal_allocation(&self) -> Option<f64> {
        if self.holdings.is_empty() {
            None
        } else {
            Some(100.0 / self.holdings.len() as f64)
        }
    }

    /// Fetch the latest price for every holding
    ///
    /// Fetches run concurrently, at most `config.max_concurrency` at a time.
    /// Prices are applied only when every symbol was priced: on any failure
    /// the portfolio is left unpriced and no allocation math can run.
    ///
    /// With [`FailurePolicy::FailFast`] the first failure cancels the fetches
    /// still in flight. With [`FailurePolicy::ReportAll`] every fetch finishes
    /// and all failed symbols are reported in input order.
    pub async fn refresh_all(
        &mut self,
        fetcher: &dyn PriceFetcher,
        config: &RebalanceConfig,
    ) -> Result<()> {
        self.reset();
        info!("Fetching prices for {} holdings", self.holdings.len());

        let mut quotes: Vec<Option<PriceQuote>> = vec![None; self.holdings.len()];
        let mut failures: Vec<(usize, PriceFailure)> = Vec::new();

        {
            let mut fetches = stream::iter(self.holdings.iter().enumerate())
                .map(|(index, holding)| async move {
                    (index, holding.fetch_price(fetcher, config).await)
                })
                .buffer_unordered(config.max_concurrency.max(1));

            while let Some((index, result)) = fetches.next().await {
                match result {
                    Ok(quote) => quotes[index] = Some(quote),
                    Err(failure) if config.failure_policy == FailurePolicy::FailFast => {
                        return Err(failure.into());
                    }
                    Err(failure) => failures.push((index, failure)),
                }
            }
        }

        if !failures.is_empty() {
            failures.sort_by_key(|(index, _)| *index);
            let mut failures: Vec<PriceFailure> =
                failures.into_iter().map(|(_, failure)| failure).collect();
            return Err(if failures.len() == 1 {
                RebalanceError::from(failures.remove(0))
            } else {
                RebalanceError::PricesUnavailable(failures)
            });
        }

        for (holding, quote) in self.holdings.iter_mut().zip(quotes) {
            if let Some(quote) = quote {
                holding.apply_price(&quote);
            }
        }

        self.total_value = self.holdings.iter().map(Holding::total_value).sum();
        self.stage = Stage::PricesFetched;
        debug!(total_value = self.total_value, "Prices refreshed");
        Ok(())
    }

    /// Compute allocations and request explanations
    ///
    /// Every allocation is computed before any explanation is requested, so a
    /// [`RebalanceError::DivisionInvalid`] aborts before any network call.
    /// Explanations run concurrently and never fail the analysis; with no
    /// service every holding is marked as skipped.
    pub async fn analyze(
        &mut self,
        explainer: Option<&dyn ExplanationService>,
        config: &RebalanceConfig,
    ) -> Result<()> {
        let Some(ideal) = self.ideal_allocation() else {
            return Err(RebalanceError::EmptyPortfolio);
        };
        if self.stage == Stage::Created {
            return Err(RebalanceError::PricesNotRefreshed);
        }

        let total = self.total_value;
        for holding in &mut self.holdings {
            holding.compute_allocation(total, ideal, config.rounding)?;
        }

        match explainer {
            Some(service) => {
                info!("Requesting explanations for {} holdings", self.holdings.len());
                stream::iter(self.holdings.iter_mut())
                    .for_each_concurrent(config.max_concurrency.max(1), |holding| async move {
                        holding.request_explanation(service, config).await;
                    })
                    .await;
            }
            None => self.holdings.iter_mut().for_each(Holding::skip_explanation),
        }

        self.stage = Stage::Analyzed;
        Ok(())
    }

    /// Drop all prices and derived state
    pub fn reset(&mut self) {
        self.holdings.iter_mut().for_each(Holding::clear);
        self.total_value = 0.0;
        self.stage = Stage::Created;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::MockPriceFetcher;
    use crate::error::{ExplanationError, PriceFetchError};
    use crate::explanation::{Explanation, MockExplanationService};
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::time::{Duration, Instant};

    fn config(policy: FailurePolicy) -> RebalanceConfig {
        RebalanceConfig::builder()
            .failure_policy(policy)
            .retry_backoff_base(Duration::from_millis(1))
            .build()
            .unwrap()
    }

    fn positions(items: &[(&str, i64)]) -> Vec<Position> {
        items
            .iter()
            .map(|(symbol, quantity)| Position::new(*symbol, *quantity))
            .collect()
    }

    /// Fetcher with fixed prices; unknown symbols have no data
    fn price_table(prices: &[(&'static str, f64)]) -> MockPriceFetcher {
        let table: HashMap<&'static str, f64> = prices.iter().copied().collect();
        let mut fetcher = MockPriceFetcher::new();
        fetcher.expect_latest_close().returning(move |symbol| {
            table
                .get(symbol)
                .map(|close| PriceQuote::now(symbol, *close))
                .ok_or(PriceFetchError::NoData)
        });
        fetcher
    }

    /// Fetcher whose answers arrive in reverse input order
    struct StaggeredFetcher {
        delays_ms: HashMap<&'static str, (u64, f64)>,
    }

    #[async_trait]
    impl PriceFetcher for StaggeredFetcher {
        async fn latest_close(
            &self,
            symbol: &str,
        ) -> std::result::Result<PriceQuote, PriceFetchError> {
            let (delay, close) = self
                .delays_ms
                .get(symbol)
                .copied()
                .ok_or(PriceFetchError::NoData)?;
            tokio::time::sleep(Duration::from_millis(delay)).await;
            Ok(PriceQuote::now(symbol, close))
        }
    }

    /// Explainer that never answers in time for one symbol
    struct StallingExplainer {
        stalls_on: &'static str,
    }

    #[async_trait]
    impl ExplanationService for StallingExplainer {
        async fn explain(&self, prompt: &str) -> std::result::Result<String, ExplanationError> {
            if prompt.contains(self.stalls_on) {
                tokio::time::sleep(Duration::from_secs(5)).await;
            }
            Ok("Rebalance toward equal weight.".to_string())
        }
    }

    fn sample_portfolio() -> (Portfolio, MockPriceFetcher) {
        let portfolio = Portfolio::new(positions(&[("AAPL", 10), ("MSFT", 5), ("GOOGL", 8)]));
        let fetcher = price_table(&[("AAPL", 150.0), ("MSFT", 300.0), ("GOOGL", 100.0)]);
        (portfolio, fetcher)
    }

    #[tokio::test]
    async fn test_sample_portfolio_equal_weight_rebalance() {
        let (mut portfolio, fetcher) = sample_portfolio();
        let config = config(FailurePolicy::FailFast);

        portfolio.refresh_all(&fetcher, &config).await.unwrap();
        assert_eq!(portfolio.stage(), Stage::PricesFetched);
        assert_eq!(portfolio.total_value(), 3800.0);

        let mut service = MockExplanationService::new();
        service
            .expect_explain()
            .times(3)
            .returning(|prompt| Ok(format!("Because: {prompt}")));

        portfolio.analyze(Some(&service), &config).await.unwrap();
        assert_eq!(portfolio.stage(), Stage::Analyzed);

        let holdings = portfolio.holdings();
        let symbols: Vec<&str> = holdings.iter().map(Holding::symbol).collect();
        assert_eq!(symbols, ["AAPL", "MSFT", "GOOGL"]);

        let values: Vec<f64> = holdings.iter().map(Holding::total_value).collect();
        assert_eq!(values, [1500.0, 1500.0, 800.0]);

        let allocations: Vec<&Allocation> =
            holdings.iter().filter_map(Holding::allocation).collect();
        assert_eq!(allocations.len(), 3);
        for allocation in &allocations {
            assert!((allocation.ideal_allocation - 100.0 / 3.0).abs() < 1e-9);
        }
        assert!((allocations[0].allocation_percentage - 39.47).abs() < 0.01);
        assert!((allocations[1].allocation_percentage - 39.47).abs() < 0.01);
        assert!((allocations[2].allocation_percentage - 21.05).abs() < 0.01);

        let total_pct: f64 = allocations.iter().map(|a| a.allocation_percentage).sum();
        assert!((total_pct - 100.0).abs() < 1e-9);

        assert_eq!(allocations[0].action(), TradeAction::Sell);
        assert_eq!(allocations[2].action(), TradeAction::Buy);

        for holding in holdings {
            match holding.explanation() {
                Explanation::Generated(text) => assert!(text.contains(holding.symbol())),
                other => panic!("unexpected explanation {other:?}"),
            }
        }
    }

    #[tokio::test]
    async fn test_missing_price_discards_other_prices() {
        let mut portfolio = Portfolio::new(positions(&[("AAPL", 10), ("NOPE", 5), ("GOOGL", 8)]));
        let fetcher = price_table(&[("AAPL", 150.0), ("GOOGL", 100.0)]);
        let config = config(FailurePolicy::FailFast);

        let err = portfolio.refresh_all(&fetcher, &config).await.unwrap_err();
        assert!(matches!(
            &err,
            RebalanceError::PriceUnavailable {
                symbol,
                source: PriceFetchError::NoData,
            } if symbol == "NOPE"
        ));

        assert_eq!(portfolio.stage(), Stage::Created);
        assert_eq!(portfolio.total_value(), 0.0);
        assert!(portfolio.holdings().iter().all(|h| h.current_price() == 0.0));

        let service = MockExplanationService::new();
        let err = portfolio.analyze(Some(&service), &config).await.unwrap_err();
        assert!(matches!(err, RebalanceError::PricesNotRefreshed));
        assert!(portfolio.holdings().iter().all(|h| h.allocation().is_none()));
    }

    #[tokio::test]
    async fn test_fail_fast_stops_remaining_fetches() {
        let mut fetcher = MockPriceFetcher::new();
        fetcher
            .expect_latest_close()
            .withf(|symbol| symbol.to_string() == "BAD")
            .times(1)
            .returning(|_| Err(PriceFetchError::NoData));
        fetcher
            .expect_latest_close()
            .withf(|symbol| symbol.to_string() == "LATER")
            .times(0)
            .returning(|symbol| Ok(PriceQuote::now(symbol, 1.0)));

        let config = RebalanceConfig::builder().max_concurrency(1).build().unwrap();
        let mut portfolio = Portfolio::new(positions(&[("BAD", 1), ("LATER", 1)]));

        let err = portfolio.refresh_all(&fetcher, &config).await.unwrap_err();
        assert_eq!(err.unpriced_symbols(), ["BAD"]);
    }

    #[tokio::test]
    async fn test_report_all_collects_every_failure() {
        let mut portfolio = Portfolio::new(positions(&[
            ("XXX", 1),
            ("AAPL", 10),
            ("YYY", 2),
            ("ZZZ", 3),
        ]));
        let fetcher = price_table(&[("AAPL", 150.0)]);

        let err = portfolio
            .refresh_all(&fetcher, &config(FailurePolicy::ReportAll))
            .await
            .unwrap_err();

        assert!(matches!(err, RebalanceError::PricesUnavailable(_)));
        assert_eq!(err.unpriced_symbols(), ["XXX", "YYY", "ZZZ"]);
        assert_eq!(portfolio.total_value(), 0.0);
    }

    #[tokio::test]
    async fn test_report_all_single_failure_is_plain() {
        let mut portfolio = Portfolio::new(positions(&[("AAPL", 10), ("NOPE", 1)]));
        let fetcher = price_table(&[("AAPL", 150.0)]);

        let err = portfolio
            .refresh_all(&fetcher, &config(FailurePolicy::ReportAll))
            .await
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            "Could not fetch data for symbol NOPE: no price data returned"
        );
    }

    #[tokio::test]
    async fn test_order_follows_input_not_completion() {
        let fetcher = StaggeredFetcher {
            delays_ms: HashMap::from([("AAA", (40, 1.0)), ("BBB", (20, 2.0)), ("CCC", (1, 3.0))]),
        };
        let mut portfolio = Portfolio::new(positions(&[("AAA", 1), ("BBB", 1), ("CCC", 1)]));

        portfolio
            .refresh_all(&fetcher, &config(FailurePolicy::FailFast))
            .await
            .unwrap();

        let prices: Vec<(&str, f64)> = portfolio
            .holdings()
            .iter()
            .map(|h| (h.symbol(), h.current_price()))
            .collect();
        assert_eq!(prices, [("AAA", 1.0), ("BBB", 2.0), ("CCC", 3.0)]);
        assert_eq!(portfolio.total_value(), 6.0);
    }

    #[tokio::test]
    async fn test_one_explanation_timeout_is_isolated() {
        let (mut portfolio, fetcher) = sample_portfolio();
        let config = config(FailurePolicy::FailFast);
        portfolio.refresh_all(&fetcher, &config).await.unwrap();

        let mut service = MockExplanationService::new();
        service
            .expect_explain()
            .withf(|prompt| prompt.contains("MSFT"))
            .returning(|_| Err(ExplanationError::Timeout(Duration::from_secs(30))));
        service
            .expect_explain()
            .returning(|_| Ok("Rebalance toward equal weight.".to_string()));

        portfolio.analyze(Some(&service), &config).await.unwrap();

        let holdings = portfolio.holdings();
        assert!(holdings[1].explanation().is_failed());
        assert!(holdings[1]
            .explanation()
            .display_text()
            .starts_with("Error generating explanation:"));
        assert!(holdings[1].allocation().is_some());
        assert_eq!(
            holdings[0].explanation(),
            &Explanation::Generated("Rebalance toward equal weight.".to_string())
        );
        assert_eq!(
            holdings[2].explanation(),
            &Explanation::Generated("Rebalance toward equal weight.".to_string())
        );
    }

    #[tokio::test]
    async fn test_slow_explanation_does_not_block_siblings() {
        let (mut portfolio, fetcher) = sample_portfolio();
        let config = RebalanceConfig::builder()
            .explanation_timeout(Duration::from_millis(20))
            .max_attempts(1)
            .build()
            .unwrap();
        portfolio.refresh_all(&fetcher, &config).await.unwrap();

        let explainer = StallingExplainer { stalls_on: "MSFT" };
        let started = Instant::now();
        portfolio.analyze(Some(&explainer), &config).await.unwrap();
        assert!(started.elapsed() < Duration::from_secs(2));

        let holdings = portfolio.holdings();
        assert_eq!(
            holdings[1].explanation(),
            &Explanation::Failed("request timed out after 20ms".to_string())
        );
        assert_eq!(holdings[1].allocation().map(|a| a.quantity_change), Some(-1.0));
        for index in [0, 2] {
            assert_eq!(
                holdings[index].explanation(),
                &Explanation::Generated("Rebalance toward equal weight.".to_string())
            );
        }
        assert_eq!(portfolio.stage(), Stage::Analyzed);
    }

    #[tokio::test]
    async fn test_single_holding_needs_no_change() {
        let mut portfolio = Portfolio::new(positions(&[("NVDA", 7)]));
        let fetcher = price_table(&[("NVDA", 913.56)]);
        let config = config(FailurePolicy::FailFast);

        portfolio.refresh_all(&fetcher, &config).await.unwrap();
        portfolio.analyze(None, &config).await.unwrap();

        let holding = &portfolio.holdings()[0];
        let allocation = holding.allocation().unwrap();
        assert_eq!(allocation.ideal_allocation, 100.0);
        assert!(allocation.allocation_difference.abs() < 1e-9);
        assert_eq!(allocation.quantity_change, 0.0);
        assert_eq!(allocation.action(), TradeAction::Hold);
        assert_eq!(holding.explanation(), &Explanation::Skipped);
    }

    #[tokio::test]
    async fn test_empty_portfolio_cannot_be_analyzed() {
        let mut portfolio = Portfolio::new(Vec::new());
        let fetcher = MockPriceFetcher::new();
        let config = RebalanceConfig::default();

        portfolio.refresh_all(&fetcher, &config).await.unwrap();
        assert_eq!(portfolio.ideal_allocation(), None);

        let err = portfolio.analyze(None, &config).await.unwrap_err();
        assert!(matches!(err, RebalanceError::EmptyPortfolio));
    }

    #[tokio::test]
    async fn test_net_short_portfolio_is_rejected() {
        let mut portfolio = Portfolio::new(positions(&[("AAPL", -10), ("MSFT", 1)]));
        let fetcher = price_table(&[("AAPL", 150.0), ("MSFT", 300.0)]);
        let config = config(FailurePolicy::FailFast);

        portfolio.refresh_all(&fetcher, &config).await.unwrap();
        assert_eq!(portfolio.total_value(), -1200.0);

        let mut service = MockExplanationService::new();
        service.expect_explain().times(0);

        let err = portfolio.analyze(Some(&service), &config).await.unwrap_err();
        assert!(matches!(err, RebalanceError::DivisionInvalid(_)));
    }
}
