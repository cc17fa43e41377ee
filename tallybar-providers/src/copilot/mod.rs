//! Copilot provider.
//!
//! Single-endpoint client authenticated with a GitHub personal access
//! token. The remote API requires a fixed editor-identifying header set and
//! reports two independent quota categories (premium interactions and
//! chat); the premium reset is computed locally as the start of the next
//! calendar month.

pub mod api;
pub mod input;

pub use api::CopilotClient;
