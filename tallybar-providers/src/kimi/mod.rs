//! Kimi provider.
//!
//! Cookie-authenticated client for the Kimi usage API. The response lists
//! usage entries by scope; numeric fields arrive as decimal strings, and
//! this provider alone may report a deficit beyond its quota, so its
//! percentages clamp to the widened [-200, 200] range.

pub mod api;
pub mod input;

pub use api::KimiClient;
