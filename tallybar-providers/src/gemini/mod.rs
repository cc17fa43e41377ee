//! Gemini provider.
//!
//! Talks to the Cloud Code private API with either a plain OAuth bearer
//! token or the composite "studio" header set captured from the browser
//! (cookie + `SAPISIDHASH` authorization + optional API key). Quota comes
//! back as model buckets with remaining values in ambiguous units, which
//! are normalized before pro/flash grouping.

pub mod api;
pub mod input;
pub mod oauth;

pub use api::GeminiClient;
pub use oauth::GeminiRefresher;
