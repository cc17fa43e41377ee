//! Kimi usage API client.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use tracing::instrument;

use tallybar_core::{Credentials, ProviderKind, UsageSnapshot, UsageWindow};
use tallybar_fetch::extract::parse_iso8601;
use tallybar_fetch::http::check_status;
use tallybar_fetch::{FetchError, HttpClient};

use crate::client::UsageClient;

// ============================================================================
// Constants
// ============================================================================

/// Usage endpoint.
const USAGE_URL: &str = "https://kimi.com/api/v1/usages";

/// Scope requested and matched against the returned entries.
const USAGE_SCOPE: &str = "chat";

// ============================================================================
// Response Types
// ============================================================================

/// Response from the usage endpoint.
#[derive(Debug, Deserialize)]
pub struct KimiUsageResponse {
    /// Usage entries by scope.
    #[serde(default)]
    pub usages: Vec<UsageEntry>,
}

/// One scope's usage entry. Numeric fields are decimal strings.
#[derive(Debug, Deserialize)]
pub struct UsageEntry {
    /// Scope name.
    #[serde(default)]
    pub scope: Option<String>,
    /// Remaining units, decimal-string encoded.
    #[serde(default)]
    pub remaining: Option<String>,
    /// Quota limit, decimal-string encoded.
    #[serde(default)]
    pub limit: Option<String>,
    /// When this scope resets.
    #[serde(default)]
    pub reset_time: Option<String>,
    /// Finer-grained sub-windows, when the scope has them.
    #[serde(default)]
    pub windows: Vec<UsageEntry>,
}

impl UsageEntry {
    /// Computes the remaining percentage as `remaining / limit * 100`.
    ///
    /// Non-parseable decimal strings yield `None` rather than an error.
    fn remaining_percent(&self) -> Option<f64> {
        let remaining = parse_decimal(self.remaining.as_deref()?)?;
        let limit = parse_decimal(self.limit.as_deref()?)?;
        if limit <= 0.0 {
            return None;
        }
        Some(remaining / limit * 100.0)
    }

    /// Converts to a usage window with the widened deficit clamp.
    fn to_window(&self) -> Option<UsageWindow> {
        let remaining = self.remaining_percent()?;
        let mut window = UsageWindow::deficit(Some(100.0 - remaining), Some(remaining));
        window.resets_at = self.reset_time.as_deref().and_then(parse_iso8601);
        window.is_applicable().then_some(window)
    }
}

/// Parses a decimal-string-encoded number.
fn parse_decimal(text: &str) -> Option<f64> {
    text.trim().parse::<f64>().ok().filter(|v| v.is_finite())
}

// ============================================================================
// Client
// ============================================================================

/// Kimi usage client.
pub struct KimiClient {
    http: HttpClient,
}

impl KimiClient {
    /// Creates a new client.
    pub fn new() -> Self {
        Self {
            http: HttpClient::primary(),
        }
    }
}

impl Default for KimiClient {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl UsageClient for KimiClient {
    fn kind(&self) -> ProviderKind {
        ProviderKind::Kimi
    }

    #[instrument(skip(self, creds))]
    async fn fetch_usage(&self, creds: &Credentials) -> Result<UsageSnapshot, FetchError> {
        let Some(cookie) = creds.cookie() else {
            return Err(FetchError::MissingToken);
        };

        let response = self
            .http
            .inner()
            .post(USAGE_URL)
            .header("Cookie", cookie)
            .header("Accept", "application/json")
            .json(&json!({"scope": USAGE_SCOPE}))
            .send()
            .await?;
        let response = check_status(response)?;

        let body: KimiUsageResponse = response
            .json()
            .await
            .map_err(|e| FetchError::InvalidResponse(e.to_string()))?;

        build_snapshot(&body).ok_or_else(|| {
            FetchError::NotSupported(format!(
                "No usable '{USAGE_SCOPE}' usage figures in response"
            ))
        })
    }
}

// ============================================================================
// Normalization
// ============================================================================

/// Selects the entry matching the requested scope and builds the snapshot.
/// The first nested sub-window, when present, feeds the secondary window.
fn build_snapshot(response: &KimiUsageResponse) -> Option<UsageSnapshot> {
    let entry = response
        .usages
        .iter()
        .find(|entry| entry.scope.as_deref() == Some(USAGE_SCOPE))?;

    let mut snapshot = UsageSnapshot::new(ProviderKind::Kimi);
    snapshot.primary = entry.to_window();
    snapshot.secondary = entry.windows.iter().find_map(UsageEntry::to_window);

    snapshot.has_data().then_some(snapshot)
}

// ============================================================================
// Tests
// ============================================================================
