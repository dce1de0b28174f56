//! Shared utilities for rebalancer
//!
//! This crate provides common functionality used across the rebalancer workspace:
//! tracing setup and typed access to environment configuration.

pub mod config;
pub mod logging;

pub use config::{EnvError, env_parse, env_string, load_dotenv};
pub use logging::{LogFormat, init_tracing, init_tracing_with};
