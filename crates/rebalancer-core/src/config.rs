//! Configuration for portfolio rebalancing runs

use crate::error::{RebalanceError, Result};
use crate::prompts::ADVISOR_PERSONA;
use crate::retry::RetryPolicy;
use rebalancer_utils::{env_parse, env_string};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

/// Largest number of decimals accepted by [`RoundingPolicy::Fractional`]
pub const MAX_FRACTIONAL_DECIMALS: u32 = 6;

/// What to do when some symbols cannot be priced
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FailurePolicy {
    /// Abort on the first failed symbol and cancel the remaining fetches
    #[default]
    FailFast,
    /// Let every fetch finish and report all failed symbols together
    ReportAll,
}

impl FromStr for FailurePolicy {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "fail-fast" => Ok(Self::FailFast),
            "report-all" => Ok(Self::ReportAll),
            other => Err(format!(
                "unknown failure policy '{other}' (expected fail-fast or report-all)"
            )),
        }
    }
}

/// How recommended share changes are rounded
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "mode")]
pub enum RoundingPolicy {
    /// Nearest whole share, ties to even
    #[default]
    WholeShares,
    /// Fractional shares with a fixed number of decimals
    Fractional { decimals: u32 },
}

impl RoundingPolicy {
    /// Round a raw share delta according to the policy
    pub fn apply(&self, shares: f64) -> f64 {
        let rounded = match self {
            Self::WholeShares => shares.round_ties_even(),
            Self::Fractional { decimals } => {
                let scale = 10_f64.powi(*decimals as i32);
                (shares * scale).round_ties_even() / scale
            }
        };

        // -0.0 would print as "-0"
        if rounded == 0.0 { 0.0 } else { rounded }
    }
}

impl fmt::Display for RoundingPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::WholeShares => f.write_str("whole shares"),
            Self::Fractional { decimals } => write!(f, "fractional ({decimals} decimals)"),
        }
    }
}

/// Language model settings for explanations
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExplanationConfig {
    /// Model identifier
    pub model: String,

    /// Maximum response length in tokens
    pub max_tokens: usize,

    /// Sampling temperature; higher values give more varied wording
    pub temperature: f32,

    /// System instruction establishing the advisor persona
    pub system_prompt: String,
}

impl Default for ExplanationConfig {
    fn default() -> Self {
        Self {
            model: "gpt-3.5-turbo".to_string(),
            max_tokens: 150,
            temperature: 0.7,
            system_prompt: ADVISOR_PERSONA.to_string(),
        }
    }
}

/// Configuration for a rebalancing run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RebalanceConfig {
    /// Maximum collaborator requests in flight at once (1 = sequential)
    pub max_concurrency: usize,

    /// Timeout for a single price lookup
    pub price_timeout: Duration,

    /// Timeout for a single explanation request
    pub explanation_timeout: Duration,

    /// Attempts per collaborator call, including the first
    pub max_attempts: u32,

    /// Initial backoff between attempts, doubled each retry
    pub retry_backoff_base: Duration,

    /// Handling of symbols that cannot be priced
    pub failure_policy: FailurePolicy,

    /// Rounding of recommended share changes
    pub rounding: RoundingPolicy,

    /// Whether the language model is asked for explanations
    pub explanations_enabled: bool,

    /// Market-data request budget
    pub requests_per_second: u32,

    /// Language model settings
    pub explanation: ExplanationConfig,
}

impl Default for RebalanceConfig {
    fn default() -> Self {
        Self {
            max_concurrency: 4,
            price_timeout: Duration::from_secs(10),
            explanation_timeout: Duration::from_secs(30),
            max_attempts: 3,
            retry_backoff_base: Duration::from_millis(500),
            failure_policy: FailurePolicy::FailFast,
            rounding: RoundingPolicy::WholeShares,
            explanations_enabled: true,
            requests_per_second: 5,
            explanation: ExplanationConfig::default(),
        }
    }
}

impl RebalanceConfig {
    /// Create a new configuration builder
    pub fn builder() -> RebalanceConfigBuilder {
        RebalanceConfigBuilder::default()
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.max_concurrency == 0 {
            return Err(config_error("max_concurrency must be greater than 0"));
        }

        if self.max_attempts == 0 {
            return Err(config_error("max_attempts must be greater than 0"));
        }

        if self.price_timeout.is_zero() || self.explanation_timeout.is_zero() {
            return Err(config_error("timeouts must be greater than 0"));
        }

        if self.requests_per_second == 0 {
            return Err(config_error("requests_per_second must be greater than 0"));
        }

        if let RoundingPolicy::Fractional { decimals } = self.rounding {
            if decimals > MAX_FRACTIONAL_DECIMALS {
                return Err(config_error(format!(
                    "fractional rounding supports at most {MAX_FRACTIONAL_DECIMALS} decimals, got {decimals}"
                )));
            }
        }

        if self.explanation.model.trim().is_empty() {
            return Err(config_error("explanation model must not be empty"));
        }

        if self.explanation.max_tokens == 0 {
            return Err(config_error("explanation max_tokens must be greater than 0"));
        }

        if !(0.0..=2.0).contains(&self.explanation.temperature) {
            return Err(config_error(format!(
                "temperature must be between 0.0 and 2.0, got {}",
                self.explanation.temperature
            )));
        }

        Ok(())
    }

    /// Retry policy applied to collaborator calls
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(
            self.max_attempts,
            self.retry_backoff_base,
            Duration::from_secs(10),
            2.0,
        )
    }
}

fn config_error(message: impl Into<String>) -> RebalanceError {
    RebalanceError::ConfigError(message.into())
}

/// Builder for RebalanceConfig
#[derive(Debug, Default)]
pub struct RebalanceConfigBuilder {
    max_concurrency: Option<usize>,
    price_timeout: Option<Duration>,
    explanation_timeout: Option<Duration>,
    max_attempts: Option<u32>,
    retry_backoff_base: Option<Duration>,
    failure_policy: Option<FailurePolicy>,
    rounding: Option<RoundingPolicy>,
    explanations_enabled: Option<bool>,
    requests_per_second: Option<u32>,
    model: Option<String>,
    max_tokens: Option<usize>,
    temperature: Option<f32>,
}

impl RebalanceConfigBuilder {
    /// Set the number of concurrent collaborator requests
    pub fn max_concurrency(mut self, concurrency: usize) -> Self {
        self.max_concurrency = Some(concurrency);
        self
    }

    /// Set the price lookup timeout
    pub fn price_timeout(mut self, timeout: Duration) -> Self {
        self.price_timeout = Some(timeout);
        self
    }

    /// Set the explanation request timeout
    pub fn explanation_timeout(mut self, timeout: Duration) -> Self {
        self.explanation_timeout = Some(timeout);
        self
    }

    /// Set attempts per collaborator call
    pub fn max_attempts(mut self, attempts: u32) -> Self {
        self.max_attempts = Some(attempts);
        self
    }

    /// Set retry backoff base duration
    pub fn retry_backoff_base(mut self, duration: Duration) -> Self {
        self.retry_backoff_base = Some(duration);
        self
    }

    /// Set the price failure policy
    pub fn failure_policy(mut self, policy: FailurePolicy) -> Self {
        self.failure_policy = Some(policy);
        self
    }

    /// Set the share rounding policy
    pub fn rounding(mut self, rounding: RoundingPolicy) -> Self {
        self.rounding = Some(rounding);
        self
    }

    /// Enable or disable language model explanations
    pub fn explanations_enabled(mut self, enabled: bool) -> Self {
        self.explanations_enabled = Some(enabled);
        self
    }

    /// Set the market-data request budget
    pub fn requests_per_second(mut self, rps: u32) -> Self {
        self.requests_per_second = Some(rps);
        self
    }

    /// Set the explanation model
    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    /// Set the maximum explanation length in tokens
    pub fn max_tokens(mut self, max_tokens: usize) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }

    /// Set the explanation temperature
    pub fn temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    /// Fill unset values from the environment
    ///
    /// Reads `OPENAI_MODEL`, `REBALANCER_MAX_CONCURRENCY`,
    /// `REBALANCER_PRICE_TIMEOUT_SECS` and `REBALANCER_EXPLANATION_TIMEOUT_SECS`.
    /// Values already set on the builder win.
    pub fn with_env(mut self) -> Result<Self> {
        let env_err = |e: rebalancer_utils::EnvError| config_error(e.to_string());

        if self.model.is_none() {
            self.model = env_string("OPENAI_MODEL");
        }
        if self.max_concurrency.is_none() {
            self.max_concurrency = env_parse("REBALANCER_MAX_CONCURRENCY").map_err(env_err)?;
        }
        if self.price_timeout.is_none() {
            self.price_timeout = env_parse::<u64>("REBALANCER_PRICE_TIMEOUT_SECS")
                .map_err(env_err)?
                .map(Duration::from_secs);
        }
        if self.explanation_timeout.is_none() {
            self.explanation_timeout = env_parse::<u64>("REBALANCER_EXPLANATION_TIMEOUT_SECS")
                .map_err(env_err)?
                .map(Duration::from_secs);
        }

        Ok(self)
    }

    /// Build the configuration
    pub fn build(self) -> Result<RebalanceConfig> {
        let defaults = RebalanceConfig::default();
        let explanation_defaults = defaults.explanation;

        let config = RebalanceConfig {
            max_concurrency: self.max_concurrency.unwrap_or(defaults.max_concurrency),
            price_timeout: self.price_timeout.unwrap_or(defaults.price_timeout),
            explanation_timeout: self.explanation_timeout.unwrap_or(defaults.explanation_timeout),
            max_attempts: self.max_attempts.unwrap_or(defaults.max_attempts),
            retry_backoff_base: self.retry_backoff_base.unwrap_or(defaults.retry_backoff_base),
            failure_policy: self.failure_policy.unwrap_or(defaults.failure_policy),
            rounding: self.rounding.unwrap_or(defaults.rounding),
            explanations_enabled: self
                .explanations_enabled
                .unwrap_or(defaults.explanations_enabled),
            requests_per_second: self.requests_per_second.unwrap_or(defaults.requests_per_second),
            explanation: ExplanationConfig {
                model: self.model.unwrap_or(explanation_defaults.model),
                max_tokens: self.max_tokens.unwrap_or(explanation_defaults.max_tokens),
                temperature: self.temperature.unwrap_or(explanation_defaults.temperature),
                system_prompt: explanation_defaults.system_prompt,
            },
        };

        config.validate()?;
        Ok(config)
    }
}
