//! Prompt text for rebalancing explanations
//!
//! - `system`: the advisor persona sent as the system message
//! - `user`: the one-line instruction built from a recommended trade

mod system;
mod user;

pub use system::ADVISOR_PERSONA;
pub use user::rebalance_instruction;
