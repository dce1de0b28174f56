//! End-to-end rebalancing pipeline

use super::report::PortfolioReport;
use crate::api::{PriceFetcher, YahooPriceFetcher};
use crate::config::RebalanceConfig;
use crate::error::{RebalanceError, Result};
use crate::explanation::{ExplanationService, LlmExplainer};
use crate::input::parse_holdings;
use crate::portfolio::Portfolio;
use rebalancer_llm::providers::OpenAIConfig;
use std::sync::Arc;
use tracing::{info, instrument};

/// Runs validation, pricing, allocation and explanation for a portfolio
pub struct RebalanceEngine {
    prices: Arc<dyn PriceFetcher>,
    explainer: Option<Arc<dyn ExplanationService>>,
    config: RebalanceConfig,
}

impl RebalanceEngine {
    /// Create an engine from explicit collaborators
    ///
    /// The explainer is ignored when explanations are disabled in `config`.
    pub fn new(
        prices: Arc<dyn PriceFetcher>,
        explainer: Option<Arc<dyn ExplanationService>>,
        config: RebalanceConfig,
    ) -> Result<Self> {
        config.validate()?;
        let explainer = explainer.filter(|_| config.explanations_enabled);
        Ok(Self {
            prices,
            explainer,
            config,
        })
    }

    /// Create an engine backed by Yahoo Finance and an OpenAI-compatible model
    ///
    /// `openai` may be `None` only when explanations are disabled.
    pub fn from_config(config: RebalanceConfig, openai: Option<OpenAIConfig>) -> Result<Self> {
        let prices: Arc<dyn PriceFetcher> =
            Arc::new(YahooPriceFetcher::new(config.requests_per_second)?);

        let explainer: Option<Arc<dyn ExplanationService>> = if config.explanations_enabled {
            let openai = openai.ok_or_else(|| {
                RebalanceError::ConfigError(
                    "OPENAI_API_KEY is not set (disable explanations to run without it)"
                        .to_string(),
                )
            })?;
            Some(Arc::new(LlmExplainer::openai(openai, config.explanation.clone())?))
        } else {
            None
        };

        Self::new(prices, explainer, config)
    }

    pub fn config(&self) -> &RebalanceConfig {
        &self.config
    }

    /// Parse raw input and rebalance the resulting portfolio
    ///
    /// Input errors are returned before any network call is made.
    #[instrument(skip(self))]
    pub async fn run(&self, symbols: &str, quantities: &str) -> Result<PortfolioReport> {
        let positions = parse_holdings(symbols, quantities)?;
        info!("Validated {} holdings", positions.len());

        let mut portfolio = Portfolio::new(positions);
        self.rebalance(&mut portfolio).await
    }

    /// Price and analyze an existing portfolio
    pub async fn rebalance(&self, portfolio: &mut Portfolio) -> Result<PortfolioReport> {
        portfolio.refresh_all(self.prices.as_ref(), &self.config).await?;
        info!(
            total_value = portfolio.total_value(),
            "Prices fetched for {} holdings",
            portfolio.len()
        );

        portfolio
            .analyze(self.explainer.as_deref(), &self.config)
            .await?;

        let report = PortfolioReport::from_portfolio(portfolio)?;
        let failed = report.failed_explanations().count();
        info!(failed_explanations = failed, "Analysis complete");

        Ok(report)
    }
}
