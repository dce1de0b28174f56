//! Natural-language explanations for recommended trades
//!
//! An explanation is best-effort: failures are captured in
//! [`Explanation::Failed`] and never abort an analysis.

mod llm;

pub use llm::LlmExplainer;

use crate::error::ExplanationError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Outcome of an explanation request
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", content = "text", rename_all = "snake_case")]
pub enum Explanation {
    /// Not requested yet
    #[default]
    Pending,
    /// Explanations were disabled for this run
    Skipped,
    /// Text produced by the language model
    Generated(String),
    /// Description of why no text could be produced
    Failed(String),
}

impl Explanation {
    /// Text shown to the user
    pub fn display_text(&self) -> String {
        match self {
            Self::Pending => String::new(),
            Self::Skipped => "Explanation skipped.".to_string(),
            Self::Generated(text) => text.clone(),
            Self::Failed(reason) => format!("Error generating explanation: {reason}"),
        }
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, Self::Failed(_))
    }
}

/// Produces free-text advice for a prompt
///
/// Implementations perform a single attempt; timeouts and retries are applied
/// by the caller.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ExplanationService: Send + Sync {
    /// Ask for an explanation of the instruction in `prompt`
    async fn explain(&self, prompt: &str) -> Result<String, ExplanationError>;
}
