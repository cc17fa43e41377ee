//! HTTP client abstractions.
//!
//! Two timeout classes exist across all providers: primary usage calls get
//! a generous timeout, best-effort fallback calls (tertiary probes, HTML
//! scrapes) get a short one. Clients never retry internally; the
//! refresh-retry on authorization failure belongs to the orchestrator.

use reqwest::{Client, Response};
use std::time::Duration;
use tracing::debug;

use crate::error::FetchError;

/// Timeout for primary usage calls.
const PRIMARY_TIMEOUT_SECS: u64 = 30;

/// Timeout for best-effort fallback calls.
const BEST_EFFORT_TIMEOUT_SECS: u64 = 8;

/// Thin HTTP client wrapper shared by the provider implementations.
#[derive(Debug, Clone)]
pub struct HttpClient {
    inner: Client,
}

impl HttpClient {
    /// Creates a client for primary usage calls (30s timeout).
    pub fn primary() -> Self {
        Self::with_timeout(Duration::from_secs(PRIMARY_TIMEOUT_SECS))
    }

    /// Creates a client for best-effort fallback calls (8s timeout).
    pub fn best_effort() -> Self {
        Self::with_timeout(Duration::from_secs(BEST_EFFORT_TIMEOUT_SECS))
    }

    /// Creates a client with a custom timeout.
    pub fn with_timeout(timeout: Duration) -> Self {
        let inner = Client::builder()
            .timeout(timeout)
            .user_agent(concat!("tallybar/", env!("CARGO_PKG_VERSION")))
            .build()
            .unwrap_or_default();
        Self { inner }
    }

    /// Returns the underlying reqwest client for request building.
    pub fn inner(&self) -> &Client {
        &self.inner
    }
}

impl Default for HttpClient {
    fn default() -> Self {
        Self::primary()
    }
}

/// Maps a non-success status to the fetch taxonomy and hands back the
/// response otherwise.
///
/// 401/403 become [`FetchError::Unauthorized`]; any other non-2xx becomes
/// [`FetchError::ServerError`].
pub fn check_status(response: Response) -> Result<Response, FetchError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    debug!(status = %status, url = %response.url(), "Request rejected");

    if status == reqwest::StatusCode::UNAUTHORIZED || status == reqwest::StatusCode::FORBIDDEN {
        return Err(FetchError::Unauthorized);
    }

    Err(FetchError::ServerError(status.as_u16()))
}

// ============================================================================
// Tests
// ============================================================================
