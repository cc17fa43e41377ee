//! Claude usage client (OAuth bearer path).
//!
//! The usage endpoint reports the session (5-hour) and weekly windows plus
//! optional model-specific 7-day windows and extra-usage state. Timestamps
//! are ISO-8601, with and without fractional seconds. A 403 whose body
//! names the required scope is reported distinctly; either way any bearer
//! failure lets the client fall back to the web session flow when a cookie
//! is present.

use async_trait::async_trait;
use serde_json::Value;
use tracing::{debug, instrument};

use tallybar_core::{Credentials, ProviderKind, UsageSnapshot, UsageWindow};
use tallybar_fetch::extract::{first_number, first_of, first_string, get_ci, parse_iso8601};
use tallybar_fetch::{FetchError, HttpClient};

use super::web::ClaudeWebClient;
use crate::client::UsageClient;

// ============================================================================
// Constants
// ============================================================================

/// OAuth usage endpoint.
const USAGE_URL: &str = "https://api.claude.ai/api/usage";

/// Scope the usage endpoint requires.
const REQUIRED_SCOPE: &str = "user:profile";

/// Key spellings for a used percentage / utilization figure.
const USED_KEYS: &[&str] = &["utilization", "used_percent", "usedPercent"];

/// Key spellings for an explicit remaining percentage.
const REMAINING_KEYS: &[&str] = &["remaining_percent", "remainingPercent", "percent_remaining"];

/// Key spellings for a reset timestamp.
const RESET_KEYS: &[&str] = &["resets_at", "resetsAt", "reset_at", "resetAt"];

// ============================================================================
// Client
// ============================================================================

/// Claude usage client.
pub struct ClaudeClient {
    http: HttpClient,
    web: ClaudeWebClient,
}

impl ClaudeClient {
    /// Creates a new client.
    pub fn new() -> Self {
        Self {
            http: HttpClient::primary(),
            web: ClaudeWebClient::new(),
        }
    }

    /// Fetches usage via the OAuth bearer token.
    async fn fetch_via_oauth(&self, token: &str) -> Result<UsageSnapshot, FetchError> {
        let response = self
            .http
            .inner()
            .get(USAGE_URL)
            .bearer_auth(token)
            .header("Accept", "application/json")
            .send()
            .await?;

        let status = response.status();
        if status == reqwest::StatusCode::UNAUTHORIZED {
            return Err(FetchError::Unauthorized);
        }
        if status == reqwest::StatusCode::FORBIDDEN {
            let body = response.text().await.unwrap_or_default();
            if body.contains(REQUIRED_SCOPE) {
                return Err(FetchError::NotSupported(format!(
                    "OAuth token is missing the '{REQUIRED_SCOPE}' scope"
                )));
            }
            return Err(FetchError::Unauthorized);
        }
        if !status.is_success() {
            return Err(FetchError::ServerError(status.as_u16()));
        }

        let body: Value = response
            .json()
            .await
            .map_err(|e| FetchError::InvalidResponse(e.to_string()))?;
        let snapshot = parse_usage_body(&body);
        if !snapshot.has_data() {
            return Err(FetchError::InvalidResponse(
                "No usage windows in response".to_string(),
            ));
        }
        Ok(snapshot)
    }
}

impl Default for ClaudeClient {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl UsageClient for ClaudeClient {
    fn kind(&self) -> ProviderKind {
        ProviderKind::Claude
    }

    #[instrument(skip(self, creds))]
    async fn fetch_usage(&self, creds: &Credentials) -> Result<UsageSnapshot, FetchError> {
        let token = creds.access_token.trim();
        if token.is_empty() && creds.cookie().is_none() {
            return Err(FetchError::MissingToken);
        }

        if !token.is_empty() {
            match self.fetch_via_oauth(token).await {
                Ok(snapshot) => return Ok(snapshot),
                Err(err) if creds.cookie().is_some() => {
                    debug!(error = %err, "Bearer fetch failed, trying web session");
                }
                Err(err) => return Err(err),
            }
        }

        let cookie = creds.cookie().ok_or(FetchError::MissingToken)?;
        self.web.fetch_usage(cookie).await
    }
}

// ============================================================================
// Parsing (shared with the web flow)
// ============================================================================

/// Parses a usage body into a snapshot: session window, weekly window, and
/// the overage tertiary when the body already carries it.
pub(super) fn parse_usage_body(body: &Value) -> UsageSnapshot {
    let mut snapshot = UsageSnapshot::new(ProviderKind::Claude);

    if let Some(window) = first_of(body, &["five_hour", "fiveHour", "session"])
        .and_then(parse_window)
    {
        snapshot.primary = Some(window);
    }
    if let Some(window) = first_of(body, &["seven_day", "sevenDay", "weekly"])
        .and_then(parse_window)
    {
        snapshot.secondary = Some(window);
    }
    snapshot.tertiary = parse_overage(body);

    if let Some(tier) = first_string(body, &["rate_limit_tier", "rateLimitTier", "plan"]) {
        snapshot.status_text = tier.to_string();
    }

    snapshot
}

/// Parses one window object with ISO-8601 reset timestamps.
pub(super) fn parse_window(value: &Value) -> Option<UsageWindow> {
    let used = first_number(value, USED_KEYS);
    let remaining = first_number(value, REMAINING_KEYS);
    let mut window = UsageWindow::clamped(used, remaining);
    if !window.is_applicable() {
        return None;
    }
    window.resets_at = first_string(value, RESET_KEYS).and_then(parse_iso8601);
    Some(window)
}

/// Extracts the extra/overage tertiary window.
///
/// Prefers the explicit extra-usage utilization when the flag is enabled,
/// else falls back to the named model-specific 7-day windows.
pub(super) fn parse_overage(body: &Value) -> Option<UsageWindow> {
    if let Some(extra) = first_of(body, &["extra_usage", "extraUsage", "overage"]) {
        let enabled = first_of(extra, &["is_enabled", "isEnabled", "enabled"])
            .and_then(Value::as_bool)
            .unwrap_or(false);
        if enabled {
            if let Some(window) = parse_window(extra) {
                return Some(window);
            }
        }
    }

    for key in [
        "seven_day_opus",
        "sevenDayOpus",
        "seven_day_sonnet",
        "sevenDaySonnet",
    ] {
        if let Some(window) = get_ci(body, key).and_then(parse_window) {
            return Some(window);
        }
    }
    None
}

// ============================================================================
// Tests
// ============================================================================
