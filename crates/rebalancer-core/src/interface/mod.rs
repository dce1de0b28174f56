//! Presentation of rebalancing reports

pub mod formatter;

pub use formatter::{
    Formatter, FormatterFactory, JsonFormatter, OutputFormat, TableFormatter, format_currency,
    format_percentage,
};
