//! Command-line interface for the portfolio rebalancer
//!
//! # Usage
//!
//! ```bash
//! export OPENAI_API_KEY="sk-..."
//! rebalancer --symbols "AAPL, MSFT, GOOGL" --quantities "10, 5, 8"
//!
//! # Numbers only, as JSON
//! rebalancer -s "AAPL, MSFT" -q "3, 4" --no-explain --format json
//! ```
//!
//! Exit status is 0 on success, 1 for invalid input and 2 for any other failure.

use anyhow::Context;
use clap::Parser;
use rebalancer_core::{
    FailurePolicy, FormatterFactory, OutputFormat, RebalanceConfig, RebalanceEngine,
    RebalanceError, RoundingPolicy, SAMPLE_QUANTITIES, SAMPLE_SYMBOLS,
};
use rebalancer_llm::providers::OpenAIConfig;
use rebalancer_utils::{LogFormat, init_tracing_with, load_dotenv};
use std::process::ExitCode;
use tracing::{debug, info};

const EXIT_INPUT_ERROR: u8 = 1;
const EXIT_FAILURE: u8 = 2;

#[derive(Parser, Debug)]
#[command(name = "rebalancer", version)]
#[command(about = "Equal-weight portfolio rebalancing advisor", long_about = None)]
struct Args {
    /// Comma-separated ticker symbols
    #[arg(short, long, default_value = SAMPLE_SYMBOLS)]
    symbols: String,

    /// Comma-separated share counts, one per symbol
    #[arg(short, long, default_value = SAMPLE_QUANTITIES, allow_hyphen_values = true)]
    quantities: String,

    /// Report format (table or json)
    #[arg(long, default_value_t = OutputFormat::Table)]
    format: OutputFormat,

    /// Skip LLM explanations; no API key needed
    #[arg(long)]
    no_explain: bool,

    /// Chat model used for explanations
    #[arg(long, env = "OPENAI_MODEL")]
    model: Option<String>,

    /// Base URL of an OpenAI-compatible API
    #[arg(long, env = "OPENAI_API_BASE")]
    api_base: Option<String>,

    /// Maximum tokens per explanation
    #[arg(long)]
    max_tokens: Option<usize>,

    /// Sampling temperature for explanations (0.0-2.0)
    #[arg(long)]
    temperature: Option<f32>,

    /// Maximum concurrent requests per phase
    #[arg(long)]
    concurrency: Option<usize>,

    /// What to do when a symbol cannot be priced (fail-fast or report-all)
    #[arg(long, default_value = "fail-fast")]
    on_price_error: FailurePolicy,

    /// Recommend fractional shares rounded to this many decimals
    #[arg(long, value_name = "DECIMALS")]
    fractional: Option<u32>,

    /// Log line format (pretty or json)
    #[arg(long, env = "REBALANCER_LOG_FORMAT", default_value = "pretty")]
    log_format: LogFormat,
}

fn build_config(args: &Args) -> anyhow::Result<RebalanceConfig> {
    let mut builder = RebalanceConfig::builder()
        .failure_policy(args.on_price_error)
        .explanations_enabled(!args.no_explain);

    if let Some(model) = &args.model {
        builder = builder.model(model.clone());
    }
    if let Some(max_tokens) = args.max_tokens {
        builder = builder.max_tokens(max_tokens);
    }
    if let Some(temperature) = args.temperature {
        builder = builder.temperature(temperature);
    }
    if let Some(concurrency) = args.concurrency {
        builder = builder.max_concurrency(concurrency);
    }
    if let Some(decimals) = args.fractional {
        builder = builder.rounding(RoundingPolicy::Fractional { decimals });
    }

    Ok(builder.with_env()?.build()?)
}

fn openai_config(args: &Args) -> Option<OpenAIConfig> {
    let config = OpenAIConfig::from_env().ok()?;
    Some(match &args.api_base {
        Some(api_base) => config.with_api_base(api_base.clone()),
        None => config,
    })
}

async fn run(args: &Args) -> anyhow::Result<String> {
    let config = build_config(args)?;
    debug!(?config, "Loaded configuration");

    let engine = RebalanceEngine::from_config(config, openai_config(args))
        .context("Failed to set up rebalancing engine")?;

    let report = engine.run(&args.symbols, &args.quantities).await?;
    info!("Rendering {} holdings as {}", report.holdings.len(), args.format);

    Ok(FormatterFactory::create(args.format).format_report(&report)?)
}

fn exit_code(error: &anyhow::Error) -> u8 {
    match error.downcast_ref::<RebalanceError>() {
        Some(e) if e.is_input_error() => EXIT_INPUT_ERROR,
        _ => EXIT_FAILURE,
    }
}

fn report_error(format: OutputFormat, error: &anyhow::Error) -> String {
    match error.downcast_ref::<RebalanceError>() {
        Some(e) => FormatterFactory::create(format).format_error(e),
        None => format!("Error: {error:#}"),
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let dotenv = load_dotenv();
    let args = Args::parse();
    init_tracing_with(args.log_format);

    if let Some(path) = dotenv {
        debug!("Loaded environment from {}", path.display());
    }

    match run(&args).await {
        Ok(output) => {
            println!("{output}");
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("{}", report_error(args.format, &e));
            ExitCode::from(exit_code(&e))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Args::command().debug_assert();
    }

    #[test]
    fn test_defaults_use_sample_portfolio() {
        let args = Args::try_parse_from(["rebalancer"]).unwrap();
        assert_eq!(args.symbols, "AAPL, MSFT, GOOGL");
        assert_eq!(args.quantities, "10, 5, 8");
        assert_eq!(args.format, OutputFormat::Table);
        assert_eq!(args.on_price_error, FailurePolicy::FailFast);
        assert!(!args.no_explain);
    }

    #[test]
    fn test_flags() {
        let args = Args::try_parse_from([
            "rebalancer",
            "-s",
            "tsla,nvda",
            "-q",
            "-3,4",
            "--format",
            "json",
            "--no-explain",
            "--on-price-error",
            "report-all",
            "--fractional",
            "2",
            "--concurrency",
            "8",
        ])
        .unwrap();

        assert_eq!(args.quantities, "-3,4");
        assert_eq!(args.format, OutputFormat::Json);

        let config = build_config(&args).unwrap();
        assert!(!config.explanations_enabled);
        assert_eq!(config.failure_policy, FailurePolicy::ReportAll);
        assert_eq!(config.rounding, RoundingPolicy::Fractional { decimals: 2 });
        assert_eq!(config.max_concurrency, 8);
    }

    #[test]
    fn test_invalid_values_are_rejected() {
        assert!(Args::try_parse_from(["rebalancer", "--format", "csv"]).is_err());
        assert!(Args::try_parse_from(["rebalancer", "--on-price-error", "retry"]).is_err());

        let args = Args::try_parse_from(["rebalancer", "--temperature", "3.5"]).unwrap();
        assert!(build_config(&args).is_err());
    }

    #[test]
    fn test_exit_codes() {
        let input = anyhow::Error::from(RebalanceError::CountMismatch {
            symbols: 2,
            quantities: 3,
        });
        assert_eq!(exit_code(&input), EXIT_INPUT_ERROR);

        let pipeline = anyhow::Error::from(RebalanceError::EmptyPortfolio);
        assert_eq!(exit_code(&pipeline), EXIT_FAILURE);

        let other = anyhow::anyhow!("boom");
        assert_eq!(exit_code(&other), EXIT_FAILURE);
        assert_eq!(report_error(OutputFormat::Table, &other), "Error: boom");
    }
}
