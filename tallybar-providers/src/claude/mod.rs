//! Claude provider.
//!
//! Tries the OAuth bearer token first; on any bearer failure (including a
//! missing-scope 403) falls back to the cookie-based web session when a
//! cookie is available. The web flow chains organization resolution, the
//! usage call, and a best-effort overage probe.

pub mod api;
pub mod input;
pub mod web;

pub use api::ClaudeClient;
