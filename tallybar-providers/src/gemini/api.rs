//! Gemini quota API client.
//!
//! Two-step call: resolve a project id from the load-assist endpoint
//! (best-effort; several nested shapes), then POST the quota retrieval
//! request. Each returned bucket carries a raw remaining value in
//! ambiguous units (0..1 fraction, 0..100 percent, or a ÷100-scaled
//! integer); values that never normalize into [0,100] are discarded rather
//! than stored as a clamped guess.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::RequestBuilder;
use serde_json::{json, Value};
use tracing::{debug, instrument};

use tallybar_core::{Credentials, ProviderKind, UsageSnapshot, UsageWindow};
use tallybar_fetch::extract::{first_number, first_of, first_string, parse_iso8601};
use tallybar_fetch::http::check_status;
use tallybar_fetch::{FetchError, HttpClient};

use crate::client::UsageClient;

// ============================================================================
// Constants
// ============================================================================

/// Cloud Code private API base URL.
const BASE_URL: &str = "https://cloudcode-pa.googleapis.com";

/// Load-assist endpoint used to resolve the project id.
const LOAD_ASSIST_ENDPOINT: &str = "/v1internal:loadCodeAssist";

/// Quota retrieval endpoint.
const QUOTA_ENDPOINT: &str = "/v1internal:retrieveUserQuota";

/// Required prefix of the studio Authorization value (case-insensitive).
pub(super) const STUDIO_AUTH_PREFIX: &str = "SAPISIDHASH ";

/// Upper bound on raw scaled quota values.
const SCALE_CEILING: f64 = 1_000_000.0;

// ============================================================================
// Client
// ============================================================================

/// Gemini quota client.
pub struct GeminiClient {
    http: HttpClient,
    probe: HttpClient,
}

impl GeminiClient {
    /// Creates a new client.
    pub fn new() -> Self {
        Self {
            http: HttpClient::primary(),
            probe: HttpClient::best_effort(),
        }
    }

    /// Applies bearer or studio-header auth to a request.
    fn authorize(
        request: RequestBuilder,
        creds: &Credentials,
    ) -> Result<RequestBuilder, FetchError> {
        let token = creds.access_token.trim();
        if !token.is_empty() {
            return Ok(request.bearer_auth(token));
        }

        let (Some(cookie), Some(authorization)) =
            (creds.cookie(), creds.aux_authorization.as_deref())
        else {
            return Err(FetchError::MissingToken);
        };
        if !has_studio_prefix(authorization) {
            return Err(FetchError::NotSupported(format!(
                "Studio Authorization header must start with '{}'",
                STUDIO_AUTH_PREFIX.trim_end()
            )));
        }

        let mut request = request
            .header("Cookie", cookie)
            .header("Authorization", authorization.trim());
        if let Some(api_key) = creds.aux_api_key.as_deref().filter(|k| !k.trim().is_empty()) {
            request = request.header("X-Goog-Api-Key", api_key.trim());
        }
        Ok(request)
    }

    /// Step 1: resolve the project id, best-effort.
    async fn resolve_project(&self, creds: &Credentials) -> Option<String> {
        let url = format!("{BASE_URL}{LOAD_ASSIST_ENDPOINT}");
        let request = Self::authorize(self.probe.inner().post(&url), creds).ok()?;
        let response = request
            .header("Content-Type", "application/json")
            .json(&json!({"metadata": {"pluginType": "GEMINI"}}))
            .send()
            .await
            .ok()?;
        if !response.status().is_success() {
            debug!(status = %response.status(), "Load-assist call failed");
            return None;
        }
        let body: Value = response.json().await.ok()?;
        parse_project_id(&body)
    }

    /// Step 2: retrieve quota buckets.
    async fn fetch_quota(
        &self,
        creds: &Credentials,
        project: Option<&str>,
    ) -> Result<Value, FetchError> {
        let url = format!("{BASE_URL}{QUOTA_ENDPOINT}");
        let body = match project {
            Some(id) => json!({"project": id}),
            None => json!({}),
        };
        let request = Self::authorize(self.http.inner().post(&url), creds)?;
        let response = request
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await?;
        let response = check_status(response)?;
        response
            .json()
            .await
            .map_err(|e| FetchError::InvalidResponse(e.to_string()))
    }
}

impl Default for GeminiClient {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl UsageClient for GeminiClient {
    fn kind(&self) -> ProviderKind {
        ProviderKind::Gemini
    }

    #[instrument(skip(self, creds))]
    async fn fetch_usage(&self, creds: &Credentials) -> Result<UsageSnapshot, FetchError> {
        if creds.access_token.trim().is_empty() && creds.cookie().is_none() {
            return Err(FetchError::MissingToken);
        }

        let project = self.resolve_project(creds).await;
        let body = self.fetch_quota(creds, project.as_deref()).await?;

        let buckets = parse_buckets(&body);
        if buckets.is_empty() {
            return Err(FetchError::NotSupported(
                "No quota buckets returned".to_string(),
            ));
        }
        Ok(build_snapshot(&buckets))
    }
}

// ============================================================================
// Parsing
// ============================================================================

/// One normalized quota bucket.
#[derive(Debug, Clone, PartialEq)]
pub(super) struct QuotaBucket {
    /// Model identifier, when the bucket names one.
    pub model: Option<String>,
    /// Normalized remaining percentage in [0, 100].
    pub remaining_percent: f64,
    /// When the bucket resets.
    pub resets_at: Option<DateTime<Utc>>,
}

impl QuotaBucket {
    fn used_percent(&self) -> f64 {
        100.0 - self.remaining_percent
    }
}

/// Resolves the project id across the shapes the endpoint has shipped.
pub(super) fn parse_project_id(body: &Value) -> Option<String> {
    if let Some(id) = first_string(
        body,
        &["cloudaicompanionProject", "project_id", "projectId", "project"],
    ) {
        return Some(id.to_string());
    }
    // Nested object forms: {"cloudaicompanionProject": {"id": ...}} or
    // {"project": {"id"|"name": ...}}
    let nested = first_of(body, &["cloudaicompanionProject", "project"])?;
    first_string(nested, &["id", "name", "projectId"]).map(ToString::to_string)
}

/// Parses and normalizes the bucket list, discarding buckets whose
/// remaining value never lands in range.
pub(super) fn parse_buckets(body: &Value) -> Vec<QuotaBucket> {
    let Some(raw_buckets) = first_of(body, &["buckets", "quotas"]).and_then(Value::as_array)
    else {
        return Vec::new();
    };

    raw_buckets
        .iter()
        .filter_map(|bucket| {
            let raw = first_number(
                bucket,
                &["remainingFraction", "remaining_fraction", "remaining"],
            )?;
            let remaining_percent = normalize_remaining_percent(raw)?;
            Some(QuotaBucket {
                model: first_string(bucket, &["modelId", "model_id", "model"])
                    .map(ToString::to_string),
                remaining_percent,
                resets_at: first_string(bucket, &["resetTime", "reset_time", "resetsAt"])
                    .and_then(parse_iso8601),
            })
        })
        .collect()
}

/// Normalizes a raw remaining value into a [0, 100] percentage.
///
/// Raw units vary: a 0..1 fraction, a 0..100 percent, or a ÷100-scaled
/// integer. Values above the scale ceiling, or still out of range after a
/// scale step, are discarded rather than clamped into a guess.
pub(super) fn normalize_remaining_percent(raw: f64) -> Option<f64> {
    if !raw.is_finite() || raw < 0.0 || raw > SCALE_CEILING {
        return None;
    }
    if raw <= 1.0 {
        return Some(raw * 100.0);
    }
    let mut value = raw;
    while value > 100.0 {
        value /= 100.0;
        if value > 100.0 {
            // Another scale step would be guessing; discard instead.
            return None;
        }
    }
    Some(value)
}

/// Groups buckets into pro-like and flash-like sets and builds the
/// snapshot. When neither substring matches anything, any bucket feeds the
/// primary window.
pub(super) fn build_snapshot(buckets: &[QuotaBucket]) -> UsageSnapshot {
    let pro: Vec<&QuotaBucket> = buckets_matching(buckets, "pro");
    let flash: Vec<&QuotaBucket> = buckets_matching(buckets, "flash");

    let mut snapshot = UsageSnapshot::new(ProviderKind::Gemini);
    let primary = if pro.is_empty() && flash.is_empty() {
        select_bucket(&buckets.iter().collect::<Vec<_>>())
    } else {
        select_bucket(&pro)
    };
    if let Some(bucket) = primary {
        snapshot.primary = Some(bucket_window(bucket));
    }
    if let Some(bucket) = select_bucket(&flash) {
        snapshot.secondary = Some(bucket_window(bucket));
    }
    snapshot
}

fn buckets_matching<'a>(buckets: &'a [QuotaBucket], substring: &str) -> Vec<&'a QuotaBucket> {
    buckets
        .iter()
        .filter(|b| {
            b.model
                .as_deref()
                .is_some_and(|m| m.to_ascii_lowercase().contains(substring))
        })
        .collect()
}

/// Picks the bucket to display for a group: the least-depleted bucket that
/// still has headroom, else the most-depleted exhausted one. One exhausted
/// side-quota must not pin the display at 100% while a sibling bucket
/// still has headroom.
pub(super) fn select_bucket<'a>(buckets: &[&'a QuotaBucket]) -> Option<&'a QuotaBucket> {
    let with_headroom = buckets
        .iter()
        .filter(|b| b.used_percent() < 100.0)
        .max_by(|a, b| {
            a.remaining_percent
                .partial_cmp(&b.remaining_percent)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
    if let Some(bucket) = with_headroom {
        return Some(*bucket);
    }
    buckets
        .iter()
        .min_by(|a, b| {
            a.remaining_percent
                .partial_cmp(&b.remaining_percent)
                .unwrap_or(std::cmp::Ordering::Equal)
        })
        .copied()
}

fn bucket_window(bucket: &QuotaBucket) -> UsageWindow {
    let mut window = UsageWindow::from_remaining(bucket.remaining_percent);
    window.resets_at = bucket.resets_at;
    window
}

/// Case-insensitive check for the studio Authorization prefix.
pub(super) fn has_studio_prefix(authorization: &str) -> bool {
    authorization
        .trim()
        .get(..STUDIO_AUTH_PREFIX.len())
        .is_some_and(|prefix| prefix.eq_ignore_ascii_case(STUDIO_AUTH_PREFIX))
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn bucket(model: &str, remaining: f64) -> QuotaBucket {
        QuotaBucket {
            model: Some(model.to_string()),
            remaining_percent: remaining,
            resets_at: None,
        }
    }

    #[test]
    fn test_normalize_ambiguous_units() {
        // Fraction, percent, and scaled forms of the same figure.
        assert_eq!(normalize_remaining_percent(0.63), Some(63.0));
        assert_eq!(normalize_remaining_percent(63.0), Some(63.0));
        assert_eq!(normalize_remaining_percent(6300.0), Some(63.0));
    }

    #[test]
    fn test_normalize_discards_unreducible_values() {
        assert_eq!(normalize_remaining_percent(150_000.0), None);
        assert_eq!(normalize_remaining_percent(2_000_000.0), None);
        assert_eq!(normalize_remaining_percent(-5.0), None);
        assert_eq!(normalize_remaining_percent(f64::NAN), None);
    }

    #[test]
    fn test_parse_project_id_shapes() {
        assert_eq!(
            parse_project_id(&json!({"cloudaicompanionProject": "proj-1"})).as_deref(),
            Some("proj-1")
        );
        assert_eq!(
            parse_project_id(&json!({"cloudaicompanionProject": {"id": "proj-2"}})).as_deref(),
            Some("proj-2")
        );
        assert_eq!(
            parse_project_id(&json!({"project": {"name": "proj-3"}})).as_deref(),
            Some("proj-3")
        );
        assert!(parse_project_id(&json!({"other": 1})).is_none());
    }

    #[test]
    fn test_parse_buckets_normalizes_and_discards() {
        let body = json!({
            "buckets": [
                {"modelId": "gemini-pro", "remainingFraction": 0.4},
                {"modelId": "gemini-flash", "remainingFraction": 80},
                {"modelId": "gemini-side", "remainingFraction": 150000},
                {"modelId": "no-figure"}
            ]
        });
        let buckets = parse_buckets(&body);
        assert_eq!(buckets.len(), 2);
        assert_eq!(buckets[0].remaining_percent, 40.0);
        assert_eq!(buckets[1].remaining_percent, 80.0);
    }

    #[test]
    fn test_select_prefers_bucket_with_headroom() {
        let exhausted = bucket("gemini-pro-vision", 0.0);
        let healthy = bucket("gemini-pro", 65.0);
        let low = bucket("gemini-pro-exp", 5.0);
        let group = vec![&exhausted, &healthy, &low];

        let selected = select_bucket(&group).unwrap();
        assert_eq!(selected.remaining_percent, 65.0);
    }

    #[test]
    fn test_select_all_exhausted_takes_most_depleted() {
        let a = bucket("gemini-pro", 0.0);
        let b = bucket("gemini-pro-exp", 0.0);
        let group = vec![&a, &b];
        assert!(select_bucket(&group).is_some());
        assert!(select_bucket(&[]).is_none());
    }

    #[test]
    fn test_build_snapshot_groups_pro_and_flash() {
        let buckets = vec![
            bucket("gemini-2.5-pro", 70.0),
            bucket("gemini-2.5-flash", 30.0),
        ];
        let snapshot = build_snapshot(&buckets);
        assert_eq!(
            snapshot.primary.unwrap().remaining_percent,
            Some(70.0)
        );
        assert_eq!(
            snapshot.secondary.unwrap().remaining_percent,
            Some(30.0)
        );
    }

    #[test]
    fn test_build_snapshot_falls_back_to_any_bucket() {
        let buckets = vec![bucket("other-model", 55.0)];
        let snapshot = build_snapshot(&buckets);
        assert_eq!(
            snapshot.primary.unwrap().remaining_percent,
            Some(55.0)
        );
        assert!(snapshot.secondary.is_none());
    }

    #[test]
    fn test_studio_prefix_check() {
        assert!(has_studio_prefix("SAPISIDHASH 123_abc"));
        assert!(has_studio_prefix("sapisidhash 123_abc"));
        assert!(has_studio_prefix("  SAPISIDHASH 1"));
        assert!(!has_studio_prefix("Bearer ya29.abc"));
        assert!(!has_studio_prefix("SAPISIDHASH"));
    }
}
