//! System prompt for the explanation service

/// Persona establishing the assistant as a rebalancing advisor
pub const ADVISOR_PERSONA: &str =
    "You are a professional financial advisor providing portfolio rebalancing advice.";
