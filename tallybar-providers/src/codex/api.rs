//! Codex usage API client.
//!
//! The primary endpoint returns the 5-hour and weekly rate windows with
//! unix-epoch reset timestamps. Code-review usage is a non-critical
//! secondary metric recovered best-effort:
//!
//! 1. flexible-key extraction from the primary response body
//! 2. a secondary JSON endpoint, parsed with the same extractor
//! 3. an HTML dashboard fetch (cookie sessions only), scraped via ordered
//!    regex patterns
//!
//! Each fallback level runs only while the previous one yielded nothing,
//! and never turns a failure into an error.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::RequestBuilder;
use serde_json::Value;
use tracing::{debug, instrument, warn};

use tallybar_core::{Credentials, ProviderKind, UsageSnapshot, UsageWindow};
use tallybar_fetch::extract::{find_keyed_object, first_number, first_string, parse_iso8601};
use tallybar_fetch::http::check_status;
use tallybar_fetch::{FetchError, HttpClient};

use super::scrape;
use crate::client::UsageClient;

// ============================================================================
// Constants
// ============================================================================

/// Backend API base URL.
const BASE_URL: &str = "https://chatgpt.com/backend-api";

/// Primary usage endpoint.
const USAGE_ENDPOINT: &str = "/wham/usage";

/// Secondary code-review usage endpoint.
const REVIEW_ENDPOINT: &str = "/wham/code-review/usage";

/// Usage dashboard page, scraped as a last resort.
const DASHBOARD_URL: &str = "https://chatgpt.com/codex/settings/usage";

/// Substrings that identify the code-review object in loose JSON.
const REVIEW_KEY_SUBSTRINGS: &[&str] = &["review", "tertiary"];

/// Key spellings for a used percentage.
const USED_KEYS: &[&str] = &[
    "used_percent",
    "usedPercent",
    "usage_percent",
    "percent_used",
    "utilization",
];

/// Key spellings for a remaining percentage.
const REMAINING_KEYS: &[&str] = &["remaining_percent", "remainingPercent", "percent_remaining"];

/// Key spellings for a reset timestamp.
const RESET_KEYS: &[&str] = &["reset_at", "resets_at", "reset_time", "resetAt", "resetsAt"];

// ============================================================================
// Client
// ============================================================================

/// Codex usage client.
pub struct CodexClient {
    http: HttpClient,
    probe: HttpClient,
}

impl CodexClient {
    /// Creates a new client.
    pub fn new() -> Self {
        Self {
            http: HttpClient::primary(),
            probe: HttpClient::best_effort(),
        }
    }

    /// Applies bearer/cookie auth to a request.
    fn authorize(request: RequestBuilder, creds: &Credentials) -> RequestBuilder {
        let mut request = request;
        if !creds.access_token.trim().is_empty() {
            request = request.bearer_auth(creds.access_token.trim());
        }
        if let Some(cookie) = creds.cookie() {
            request = request.header("Cookie", cookie);
        }
        request.header("Accept", "application/json")
    }

    /// Fetches and parses the primary usage body.
    async fn fetch_primary(&self, creds: &Credentials) -> Result<Value, FetchError> {
        let url = format!("{BASE_URL}{USAGE_ENDPOINT}");
        let response = Self::authorize(self.http.inner().get(&url), creds)
            .send()
            .await?;
        let response = check_status(response)?;
        let body: Value = response
            .json()
            .await
            .map_err(|e| FetchError::InvalidResponse(e.to_string()))?;
        Ok(body)
    }

    /// Level 2 fallback: the dedicated code-review endpoint. Best-effort.
    async fn fetch_review_endpoint(&self, creds: &Credentials) -> Option<UsageWindow> {
        let url = format!("{BASE_URL}{REVIEW_ENDPOINT}");
        let response = Self::authorize(self.probe.inner().get(&url), creds)
            .send()
            .await
            .ok()?;
        if !response.status().is_success() {
            debug!(status = %response.status(), "Code-review endpoint unavailable");
            return None;
        }
        let body: Value = response.json().await.ok()?;
        extract_review_window(&body)
    }

    /// Level 3 fallback: scrape the usage dashboard. Cookie sessions only.
    async fn fetch_dashboard(&self, creds: &Credentials) -> Option<UsageWindow> {
        let cookie = creds.cookie()?;
        let response = self
            .probe
            .inner()
            .get(DASHBOARD_URL)
            .header("Cookie", cookie)
            .header("Accept", "text/html")
            .send()
            .await
            .ok()?;
        if !response.status().is_success() {
            debug!(status = %response.status(), "Dashboard fetch failed");
            return None;
        }
        let html = response.text().await.ok()?;
        scrape::parse_dashboard_html(&html)
    }
}

impl Default for CodexClient {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl UsageClient for CodexClient {
    fn kind(&self) -> ProviderKind {
        ProviderKind::Codex
    }

    #[instrument(skip(self, creds))]
    async fn fetch_usage(&self, creds: &Credentials) -> Result<UsageSnapshot, FetchError> {
        if !creds.is_usable() {
            return Err(FetchError::MissingToken);
        }

        let body = self.fetch_primary(creds).await?;
        let mut snapshot = parse_usage_body(&body);

        if snapshot.tertiary.is_none() {
            if let Some(window) = self.fetch_review_endpoint(creds).await {
                snapshot.tertiary = Some(window);
            }
        }
        if snapshot.tertiary.is_none() {
            if let Some(window) = self.fetch_dashboard(creds).await {
                snapshot.tertiary = Some(window);
            }
        }

        if !snapshot.has_data() {
            warn!("Usage response carried no rate windows");
            return Err(FetchError::InvalidResponse(
                "No rate windows in usage response".to_string(),
            ));
        }

        Ok(snapshot)
    }
}

// ============================================================================
// Parsing
// ============================================================================

/// Parses the primary usage body into a snapshot (tertiary included when
/// the body already carries a review object).
fn parse_usage_body(body: &Value) -> UsageSnapshot {
    let mut snapshot = UsageSnapshot::new(ProviderKind::Codex);

    let rate_limits = body.get("rate_limits").unwrap_or(body);
    if let Some(window) = rate_limits
        .get("primary_window")
        .or_else(|| rate_limits.get("primary"))
        .and_then(parse_rate_window)
    {
        snapshot.primary = Some(window);
    }
    if let Some(window) = rate_limits
        .get("secondary_window")
        .or_else(|| rate_limits.get("secondary"))
        .and_then(parse_rate_window)
    {
        snapshot.secondary = Some(window);
    }

    snapshot.tertiary = extract_review_window(body);

    if let Some(plan) = first_string(body, &["plan_type", "planType", "plan"]) {
        snapshot.status_text = plan.to_string();
    }

    snapshot
}

/// Parses one rate-window object with epoch-seconds reset timestamps.
fn parse_rate_window(value: &Value) -> Option<UsageWindow> {
    let used = first_number(value, USED_KEYS);
    let remaining = first_number(value, REMAINING_KEYS);
    let mut window = UsageWindow::clamped(used, remaining);
    if !window.is_applicable() {
        return None;
    }
    window.resets_at = parse_reset(value);
    Some(window)
}

/// Flexible code-review extraction shared by fallback levels 1 and 2.
///
/// Scans for a nested object whose key mentions review/tertiary, then reads
/// whichever used/remaining/reset spellings it carries.
pub(super) fn extract_review_window(body: &Value) -> Option<UsageWindow> {
    let container = find_keyed_object(body, REVIEW_KEY_SUBSTRINGS, 3)?;
    let used = first_number(container, USED_KEYS);
    let remaining = first_number(container, REMAINING_KEYS);
    let mut window = UsageWindow::clamped(used, remaining);
    if !window.is_applicable() {
        return None;
    }
    window.resets_at = parse_reset(container);
    Some(window)
}

/// Reads a reset timestamp as epoch seconds or an ISO-8601 string.
fn parse_reset(value: &Value) -> Option<DateTime<Utc>> {
    if let Some(epoch) = first_number(value, RESET_KEYS) {
        return DateTime::from_timestamp(epoch as i64, 0);
    }
    first_string(value, RESET_KEYS).and_then(parse_iso8601)
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_primary_and_secondary_windows() {
        let body = json!({
            "plan_type": "plus",
            "rate_limits": {
                "primary_window": {
                    "used_percent": 25.0,
                    "reset_at": 1735000000,
                    "limit_window_seconds": 18000
                },
                "secondary_window": {
                    "used_percent": 60.5,
                    "reset_at": 1735600000
                }
            }
        });

        let snapshot = parse_usage_body(&body);
        let primary = snapshot.primary.expect("primary");
        assert_eq!(primary.used_percent, Some(25.0));
        assert_eq!(
            primary.resets_at,
            DateTime::from_timestamp(1_735_000_000, 0)
        );
        assert_eq!(snapshot.secondary.unwrap().used_percent, Some(60.5));
        assert_eq!(snapshot.status_text, "plus");
        assert!(snapshot.tertiary.is_none());
    }

    #[test]
    fn test_out_of_range_percent_is_clamped() {
        let body = json!({
            "rate_limits": {
                "primary_window": {"used_percent": 140.0}
            }
        });
        let snapshot = parse_usage_body(&body);
        assert_eq!(snapshot.primary.unwrap().used_percent, Some(100.0));
    }

    #[test]
    fn test_review_window_from_primary_body() {
        let body = json!({
            "rate_limits": {
                "primary_window": {"used_percent": 10.0}
            },
            "code_review": {
                "remaining_percent": 70,
                "reset_at": 1735000000
            }
        });
        let snapshot = parse_usage_body(&body);
        let tertiary = snapshot.tertiary.expect("tertiary");
        assert_eq!(tertiary.remaining_percent, Some(70.0));
        assert_eq!(tertiary.resolved_used(), Some(30.0));
        assert!(tertiary.resets_at.is_some());
    }

    #[test]
    fn test_review_window_alternate_spellings() {
        let body = json!({
            "limits": {
                "reviewTasks": {
                    "percent_used": "45",
                    "resetsAt": "2025-06-01T00:00:00Z"
                }
            }
        });
        let window = extract_review_window(&body).expect("window");
        assert_eq!(window.used_percent, Some(45.0));
        assert!(window.resets_at.is_some());
    }

    #[test]
    fn test_review_extraction_absent() {
        let body = json!({"rate_limits": {"primary_window": {"used_percent": 5.0}}});
        assert!(extract_review_window(&body).is_none());

        // A review object with no recognizable figures is not a window.
        let body = json!({"code_review": {"enabled": true}});
        assert!(extract_review_window(&body).is_none());
    }

    #[test]
    fn test_parse_iso8601_both_forms() {
        assert!(parse_iso8601("2025-06-01T12:30:00Z").is_some());
        assert!(parse_iso8601("2025-06-01T12:30:00.123456").is_some());
        assert!(parse_iso8601("not a date").is_none());
    }

    #[test]
    fn test_flat_body_without_rate_limits_wrapper() {
        let body = json!({
            "primary": {"used_percent": 12.0},
            "secondary": {"used_percent": 34.0}
        });
        let snapshot = parse_usage_body(&body);
        assert_eq!(snapshot.primary.unwrap().used_percent, Some(12.0));
        assert_eq!(snapshot.secondary.unwrap().used_percent, Some(34.0));
    }
}
