//! Codex provider.
//!
//! Fetches usage from the Codex backend API using an OAuth bearer token or
//! a web session cookie. The primary endpoint reports the 5-hour and weekly
//! windows; the optional code-review window is recovered through a
//! three-level fallback chain (flexible keys in the primary body, a
//! secondary JSON endpoint, then an HTML dashboard scrape).

pub mod api;
pub mod input;
pub mod oauth;
pub mod scrape;

pub use api::CodexClient;
pub use oauth::CodexRefresher;
