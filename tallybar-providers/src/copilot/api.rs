//! Copilot usage API client.

use async_trait::async_trait;
use chrono::{DateTime, Datelike, Local, TimeZone, Utc};
use serde::Deserialize;
use tracing::instrument;

use tallybar_core::{Credentials, ProviderKind, UsageSnapshot, UsageWindow};
use tallybar_fetch::http::check_status;
use tallybar_fetch::{FetchError, HttpClient};

use crate::client::UsageClient;

// ============================================================================
// Constants
// ============================================================================

/// Copilot user/usage endpoint.
const USER_URL: &str = "https://api.github.com/copilot_internal/user";

// The endpoint refuses requests that do not identify as a known editor;
// these literal values are what it expects.
const EDITOR_VERSION: &str = "vscode/1.96.2";
const EDITOR_PLUGIN_VERSION: &str = "copilot-chat/0.26.7";
const USER_AGENT: &str = "GitHubCopilotChat/0.26.7";
const API_VERSION: &str = "2025-04-01";

// ============================================================================
// Response Types
// ============================================================================

/// Response from the Copilot user endpoint.
#[derive(Debug, Deserialize)]
pub struct CopilotUserResponse {
    /// Per-category quota snapshots.
    #[serde(default)]
    pub quota_snapshots: QuotaSnapshots,
    /// Plan name (e.g. "individual", "business").
    #[serde(default)]
    pub copilot_plan: Option<String>,
    /// Reset date for the chat category, when provided.
    #[serde(default)]
    pub quota_reset_date: Option<String>,
}

/// The two quota categories.
#[derive(Debug, Default, Deserialize)]
pub struct QuotaSnapshots {
    /// Premium interactions quota.
    #[serde(default)]
    pub premium_interactions: Option<QuotaSnapshot>,
    /// Chat quota.
    #[serde(default)]
    pub chat: Option<QuotaSnapshot>,
}

/// One quota category snapshot.
#[derive(Debug, Deserialize)]
pub struct QuotaSnapshot {
    /// Remaining percentage of the quota.
    pub percent_remaining: Option<f64>,
    /// Total entitlement.
    #[serde(default)]
    pub entitlement: Option<f64>,
    /// Remaining units.
    #[serde(default)]
    pub remaining: Option<f64>,
    /// Whether the category is unlimited for this plan.
    #[serde(default)]
    pub unlimited: bool,
}

impl QuotaSnapshot {
    /// Converts to a usage window; unlimited categories are not windows.
    fn to_window(&self) -> Option<UsageWindow> {
        if self.unlimited {
            return None;
        }
        let remaining = self.percent_remaining.or_else(|| {
            match (self.remaining, self.entitlement) {
                (Some(remaining), Some(total)) if total > 0.0 => {
                    Some(remaining / total * 100.0)
                }
                _ => None,
            }
        })?;
        Some(UsageWindow::from_remaining(remaining))
    }
}

// ============================================================================
// Client
// ============================================================================

/// Copilot usage client.
pub struct CopilotClient {
    http: HttpClient,
}

impl CopilotClient {
    /// Creates a new client.
    pub fn new() -> Self {
        Self {
            http: HttpClient::primary(),
        }
    }
}

impl Default for CopilotClient {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl UsageClient for CopilotClient {
    fn kind(&self) -> ProviderKind {
        ProviderKind::Copilot
    }

    #[instrument(skip(self, creds))]
    async fn fetch_usage(&self, creds: &Credentials) -> Result<UsageSnapshot, FetchError> {
        let token = creds.access_token.trim();
        if token.is_empty() {
            return Err(FetchError::MissingToken);
        }

        let response = self
            .http
            .inner()
            .get(USER_URL)
            .header("Authorization", format!("token {token}"))
            .header("Accept", "application/json")
            .header("Editor-Version", EDITOR_VERSION)
            .header("Editor-Plugin-Version", EDITOR_PLUGIN_VERSION)
            .header("User-Agent", USER_AGENT)
            .header("X-Github-Api-Version", API_VERSION)
            .send()
            .await?;
        let response = check_status(response)?;

        let body: CopilotUserResponse = response
            .json()
            .await
            .map_err(|e| FetchError::InvalidResponse(e.to_string()))?;

        let snapshot = build_snapshot(&body, Local::now());
        if !snapshot.has_data() {
            return Err(FetchError::NotSupported(
                "Account has no Copilot quota data".to_string(),
            ));
        }
        Ok(snapshot)
    }
}

// ============================================================================
// Normalization
// ============================================================================

/// Builds the snapshot: premium interactions map to the primary window with
/// a locally computed monthly reset, chat maps to the secondary window.
fn build_snapshot<Tz: TimeZone>(
    response: &CopilotUserResponse,
    now: DateTime<Tz>,
) -> UsageSnapshot {
    let mut snapshot = UsageSnapshot::new(ProviderKind::Copilot);

    if let Some(mut window) = response
        .quota_snapshots
        .premium_interactions
        .as_ref()
        .and_then(QuotaSnapshot::to_window)
    {
        // The API does not report a premium reset; the quota renews on the
        // first of each calendar month in the user's time zone.
        window.resets_at = start_of_next_month(&now);
        snapshot.primary = Some(window);
    }

    if let Some(mut window) = response
        .quota_snapshots
        .chat
        .as_ref()
        .and_then(QuotaSnapshot::to_window)
    {
        window.resets_at = response
            .quota_reset_date
            .as_deref()
            .and_then(tallybar_fetch::extract::parse_iso8601);
        snapshot.secondary = Some(window);
    }

    if let Some(plan) = response.copilot_plan.as_deref() {
        snapshot.status_text = capitalize_first(plan);
    }

    snapshot
}

/// Computes midnight on the first day of the next calendar month in the
/// given time zone, expressed in UTC.
fn start_of_next_month<Tz: TimeZone>(now: &DateTime<Tz>) -> Option<DateTime<Utc>> {
    let (year, month) = if now.month() == 12 {
        (now.year() + 1, 1)
    } else {
        (now.year(), now.month() + 1)
    };
    now.timezone()
        .with_ymd_and_hms(year, month, 1, 0, 0, 0)
        .earliest()
        .map(|dt| dt.with_timezone(&Utc))
}

fn capitalize_first(text: &str) -> String {
    let mut chars = text.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
        None => String::new(),
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn response_from(json: &str) -> CopilotUserResponse {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn test_parse_user_response() {
        let response = response_from(
            r#"{
                "quota_snapshots": {
                    "premium_interactions": {
                        "entitlement": 300,
                        "remaining": 210,
                        "percent_remaining": 70.0,
                        "quota_id": "premium_interactions"
                    },
                    "chat": {
                        "percent_remaining": 95.5,
                        "quota_id": "chat"
                    }
                },
                "copilot_plan": "individual",
                "quota_reset_date": "2025-07-01T00:00:00Z"
            }"#,
        );

        let now = Utc.with_ymd_and_hms(2025, 6, 15, 10, 0, 0).unwrap();
        let snapshot = build_snapshot(&response, now);

        let primary = snapshot.primary.expect("primary");
        assert_eq!(primary.remaining_percent, Some(70.0));
        assert_eq!(primary.resolved_used(), Some(30.0));
        assert_eq!(
            primary.resets_at,
            Some(Utc.with_ymd_and_hms(2025, 7, 1, 0, 0, 0).unwrap())
        );

        let secondary = snapshot.secondary.expect("secondary");
        assert_eq!(secondary.remaining_percent, Some(95.5));
        assert_eq!(snapshot.status_text, "Individual");
    }

    #[test]
    fn test_percent_derived_from_units() {
        let response = response_from(
            r#"{
                "quota_snapshots": {
                    "premium_interactions": {"entitlement": 200, "remaining": 50}
                }
            }"#,
        );
        let now = Utc.with_ymd_and_hms(2025, 3, 2, 0, 0, 0).unwrap();
        let snapshot = build_snapshot(&response, now);
        assert_eq!(
            snapshot.primary.unwrap().remaining_percent,
            Some(25.0)
        );
    }

    #[test]
    fn test_unlimited_category_is_omitted() {
        let response = response_from(
            r#"{
                "quota_snapshots": {
                    "premium_interactions": {"unlimited": true, "percent_remaining": 100.0},
                    "chat": {"percent_remaining": 80.0}
                }
            }"#,
        );
        let now = Utc.with_ymd_and_hms(2025, 3, 2, 0, 0, 0).unwrap();
        let snapshot = build_snapshot(&response, now);
        assert!(snapshot.primary.is_none());
        assert!(snapshot.secondary.is_some());
    }

    #[test]
    fn test_start_of_next_month_year_rollover() {
        let december = Utc.with_ymd_and_hms(2025, 12, 20, 8, 30, 0).unwrap();
        assert_eq!(
            start_of_next_month(&december),
            Some(Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap())
        );

        let june = Utc.with_ymd_and_hms(2025, 6, 1, 0, 0, 0).unwrap();
        assert_eq!(
            start_of_next_month(&june),
            Some(Utc.with_ymd_and_hms(2025, 7, 1, 0, 0, 0).unwrap())
        );
    }

    #[test]
    fn test_empty_quota_snapshots() {
        let response = response_from(r#"{"copilot_plan": "free"}"#);
        let now = Utc.with_ymd_and_hms(2025, 3, 2, 0, 0, 0).unwrap();
        let snapshot = build_snapshot(&response, now);
        assert!(!snapshot.has_data());
    }
}
