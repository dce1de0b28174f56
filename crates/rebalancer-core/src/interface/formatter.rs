//! Report formatting for terminal and machine consumers

use crate::engine::PortfolioReport;
use crate::error::{RebalanceError, Result};
use crate::portfolio::format_shares;
use comfy_table::presets::UTF8_FULL;
use comfy_table::{Cell, CellAlignment, Table};
use serde_json::json;
use std::fmt;
use std::str::FromStr;

/// Output format selector
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum OutputFormat {
    #[default]
    Table,
    Json,
}

impl FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "table" => Ok(Self::Table),
            "json" => Ok(Self::Json),
            other => Err(format!("unknown output format '{other}' (expected table or json)")),
        }
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Table => "table",
            Self::Json => "json",
        })
    }
}

pub trait Formatter: Send + Sync {
    fn format(&self) -> OutputFormat;
    fn format_report(&self, report: &PortfolioReport) -> Result<String>;
    fn format_error(&self, error: &RebalanceError) -> String;
}

/// Currency with two decimals, sign before the symbol
pub fn format_currency(amount: f64) -> String {
    if amount < 0.0 {
        format!("-${:.2}", amount.abs())
    } else {
        format!("${amount:.2}")
    }
}

/// Percentage on a 0-100 scale with two decimals
pub fn format_percentage(value: f64) -> String {
    format!("{value:.2}%")
}

const HEADERS: [&str; 7] = [
    "Symbol",
    "Quantity",
    "Current Price",
    "Total Value",
    "Current Allocation (%)",
    "Target Allocation (%)",
    "Recommended Change",
];

/// Human-readable table followed by one explanation block per holding
pub struct TableFormatter;

impl TableFormatter {
    fn build_table(report: &PortfolioReport) -> Table {
        let mut table = Table::new();
        table.load_preset(UTF8_FULL).set_header(HEADERS);

        for row in &report.holdings {
            table.add_row(vec![
                Cell::new(&row.symbol),
                Cell::new(row.quantity).set_alignment(CellAlignment::Right),
                Cell::new(format_currency(row.current_price)).set_alignment(CellAlignment::Right),
                Cell::new(format_currency(row.total_value)).set_alignment(CellAlignment::Right),
                Cell::new(format_percentage(row.allocation_percentage))
                    .set_alignment(CellAlignment::Right),
                Cell::new(format_percentage(row.target_allocation))
                    .set_alignment(CellAlignment::Right),
                Cell::new(format_shares(row.recommended_change))
                    .set_alignment(CellAlignment::Right),
            ]);
        }

        table
    }
}

impl Formatter for TableFormatter {
    fn format(&self) -> OutputFormat {
        OutputFormat::Table
    }

    fn format_report(&self, report: &PortfolioReport) -> Result<String> {
        let mut output = String::from("Portfolio Analysis\n");
        output.push_str(&Self::build_table(report).to_string());
        output.push('\n');
        output.push_str(&format!(
            "Total Portfolio Value: {}\n",
            format_currency(report.total_value)
        ));

        output.push_str("\nRebalancing Recommendations\n");
        for row in &report.holdings {
            output.push_str(&format!("\n{}\n", row.symbol));
            output.push_str(&row.explanation.display_text());
            output.push_str("\n---\n");
        }

        Ok(output)
    }

    fn format_error(&self, error: &RebalanceError) -> String {
        if error.is_input_error() {
            format!("Error processing input: {error}")
        } else {
            format!("Error: {error}")
        }
    }
}

/// Pretty-printed JSON of the full report
pub struct JsonFormatter;

impl Formatter for JsonFormatter {
    fn format(&self) -> OutputFormat {
        OutputFormat::Json
    }

    fn format_report(&self, report: &PortfolioReport) -> Result<String> {
        serde_json::to_string_pretty(report)
            .map_err(|e| RebalanceError::ConfigError(format!("Failed to serialize report: {e}")))
    }

    fn format_error(&self, error: &RebalanceError) -> String {
        let body = json!({
            "error": error.to_string(),
            "input_error": error.is_input_error(),
            "unpriced_symbols": error.unpriced_symbols(),
        });
        body.to_string()
    }
}

pub struct FormatterFactory;

impl FormatterFactory {
    pub fn create(format: OutputFormat) -> Box<dyn Formatter> {
        match format {
            OutputFormat::Table => Box::new(TableFormatter),
            OutputFormat::Json => Box::new(JsonFormatter),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::HoldingRow;
    use crate::error::{PriceFailure, PriceFetchError};
    use crate::explanation::Explanation;
    use crate::portfolio::TradeAction;
    use chrono::Utc;

    fn row(
        symbol: &str,
        quantity: i64,
        price: f64,
        pct: f64,
        change: f64,
        explanation: Explanation,
    ) -> HoldingRow {
        HoldingRow {
            symbol: symbol.to_string(),
            quantity,
            current_price: price,
            total_value: price * quantity as f64,
            allocation_percentage: pct,
            target_allocation: 100.0 / 3.0,
            recommended_change: change,
            action: TradeAction::from_change(change),
            priced_at: None,
            explanation,
        }
    }

    fn generated(text: &str) -> Explanation {
        Explanation::Generated(text.to_string())
    }

    fn sample_report() -> PortfolioReport {
        let timed_out = Explanation::Failed("request timed out after 30s".to_string());
        PortfolioReport {
            total_value: 3800.0,
            holdings: vec![
                row("AAPL", 10, 150.0, 1500.0 / 38.0, -2.0, generated("Trim AAPL.")),
                row("MSFT", 5, 300.0, 1500.0 / 38.0, -1.0, timed_out),
                row("GOOGL", 8, 100.0, 800.0 / 38.0, 5.0, Explanation::Skipped),
            ],
            generated_at: Utc::now(),
        }
    }

    #[test]
    fn test_currency_and_percentage() {
        assert_eq!(format_currency(1500.0), "$1500.00");
        assert_eq!(format_currency(-233.333), "-$233.33");
        assert_eq!(format_percentage(1500.0 / 38.0), "39.47%");
        assert_eq!(format_percentage(100.0 / 3.0), "33.33%");
    }

    #[test]
    fn test_table_report() {
        let output = TableFormatter.format_report(&sample_report()).unwrap();

        for header in HEADERS {
            assert!(output.contains(header), "missing header {header}");
        }
        assert!(output.contains("$150.00"));
        assert!(output.contains("$1500.00"));
        assert!(output.contains("39.47%"));
        assert!(output.contains("21.05%"));
        assert!(output.contains("33.33%"));
        assert!(output.contains("-2"));
        assert!(output.contains("Total Portfolio Value: $3800.00"));
        assert!(output.contains("Trim AAPL."));
        assert!(output.contains("Error generating explanation: request timed out after 30s"));

        let aapl = output.find("\nAAPL\n").unwrap();
        let googl = output.find("\nGOOGL\n").unwrap();
        assert!(aapl < googl);
    }

    #[test]
    fn test_json_report() {
        let output = JsonFormatter.format_report(&sample_report()).unwrap();
        let value: serde_json::Value = serde_json::from_str(&output).unwrap();

        assert_eq!(value["total_value"], 3800.0);
        assert_eq!(value["holdings"][0]["symbol"], "AAPL");
        assert_eq!(value["holdings"][1]["explanation"]["status"], "failed");
        assert_eq!(value["holdings"][2]["action"], "buy");
        assert_eq!(value["holdings"][0]["recommended_change"], -2);
        assert!(value["holdings"][0]["recommended_change"].is_i64());
    }

    #[test]
    fn test_error_formatting() {
        let input = RebalanceError::CountMismatch {
            symbols: 2,
            quantities: 3,
        };
        assert_eq!(
            TableFormatter.format_error(&input),
            "Error processing input: The number of symbols (2) and quantities (3) must match"
        );

        let prices = RebalanceError::from(PriceFailure {
            symbol: "XYZQ".to_string(),
            error: PriceFetchError::NoData,
        });
        let output = JsonFormatter.format_error(&prices);
        let value: serde_json::Value = serde_json::from_str(&output).unwrap();
        assert_eq!(value["input_error"], false);
        assert_eq!(value["unpriced_symbols"][0], "XYZQ");
    }

    #[test]
    fn test_output_format_parsing() {
        assert_eq!("json".parse::<OutputFormat>().unwrap(), OutputFormat::Json);
        assert_eq!("TABLE".parse::<OutputFormat>().unwrap(), OutputFormat::Table);
        assert!("csv".parse::<OutputFormat>().is_err());
        assert_eq!(FormatterFactory::create(OutputFormat::Json).format(), OutputFormat::Json);
    }
}
