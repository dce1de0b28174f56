//! Rebalancing with explanations from a local LLM
//!
//! Works with any OpenAI-compatible server such as LM Studio, llama.cpp or
//! vLLM. Local servers usually ignore the API key.
//!
//! # Configuration
//!
//! ```bash
//! export OPENAI_API_BASE="http://localhost:1234/v1"
//! export OPENAI_MODEL="your-model-name"
//! ```
//!
//! # Usage
//!
//! ```bash
//! cargo run --example local_llm_rebalance -p rebalancer-core -- "AAPL, MSFT, GOOGL" "10, 5, 8"
//! ```

use rebalancer_core::{
    FormatterFactory, LlmExplainer, OutputFormat, RebalanceConfig, RebalanceEngine,
    SAMPLE_QUANTITIES, SAMPLE_SYMBOLS, YahooPriceFetcher,
};
use rebalancer_llm::providers::OpenAIConfig;
use std::env;
use std::sync::Arc;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    rebalancer_utils::load_dotenv();
    rebalancer_utils::init_tracing();

    let args: Vec<String> = env::args().collect();
    let symbols = args.get(1).map_or(SAMPLE_SYMBOLS, String::as_str);
    let quantities = args.get(2).map_or(SAMPLE_QUANTITIES, String::as_str);

    let api_base = rebalancer_utils::env_string("OPENAI_API_BASE").unwrap_or_else(|| {
        eprintln!("OPENAI_API_BASE not set, using http://localhost:1234/v1");
        "http://localhost:1234/v1".to_string()
    });
    let api_key =
        rebalancer_utils::env_string("OPENAI_API_KEY").unwrap_or_else(|| "not-needed".to_string());

    // Local models are slow; allow a generous timeout per explanation
    let config = RebalanceConfig::builder()
        .explanation_timeout(std::time::Duration::from_secs(180))
        .max_concurrency(1)
        .with_env()?
        .build()?;

    println!("API base: {api_base}");
    println!("Model:    {}\n", config.explanation.model);

    let openai = OpenAIConfig::new(api_key).with_api_base(api_base).with_timeout(180);
    let explainer = LlmExplainer::openai(openai, config.explanation.clone())?;
    let prices = YahooPriceFetcher::new(config.requests_per_second)?;

    let engine = RebalanceEngine::new(Arc::new(prices), Some(Arc::new(explainer)), config)?;
    let report = engine.run(symbols, quantities).await?;

    println!(
        "{}",
        FormatterFactory::create(OutputFormat::Table).format_report(&report)?
    );

    Ok(())
}
