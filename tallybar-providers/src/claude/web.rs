//! Claude web-session client.
//!
//! Cookie-based fallback used when the bearer path fails. Requires the
//! named session cookie and chains three sequential calls: resolve the
//! organization id, fetch that organization's usage, then probe the
//! extra/overage window best-effort (failures swallowed).

use serde_json::Value;
use tracing::{debug, instrument, warn};

use tallybar_core::{UsageSnapshot, UsageWindow};
use tallybar_fetch::extract::{first_of, first_string, get_ci};
use tallybar_fetch::http::check_status;
use tallybar_fetch::{FetchError, HttpClient};

use super::api::{parse_overage, parse_usage_body};

// ============================================================================
// Constants
// ============================================================================

/// Organization listing endpoint.
const ORGANIZATIONS_URL: &str = "https://claude.ai/api/organizations";

/// Per-organization usage endpoint.
const USAGE_URL: &str = "https://claude.ai/api/organizations/{org}/usage";

/// Per-organization extra-usage endpoint, probed best-effort.
const EXTRA_USAGE_URL: &str = "https://claude.ai/api/organizations/{org}/extra_usage";

/// Name of the session cookie inside the raw cookie header.
const SESSION_COOKIE_NAME: &str = "sessionKey";

/// Key spellings for an organization id.
const ORG_ID_KEYS: &[&str] = &["uuid", "id", "organization_id", "organizationId"];

/// Browser-looking user agent; the web API rejects obvious bots.
const USER_AGENT: &str =
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko)";

// ============================================================================
// Web Client
// ============================================================================

/// Claude web-session client.
#[derive(Debug, Clone)]
pub struct ClaudeWebClient {
    http: HttpClient,
    probe: HttpClient,
}

impl ClaudeWebClient {
    /// Creates a new web client.
    pub fn new() -> Self {
        Self {
            http: HttpClient::primary(),
            probe: HttpClient::best_effort(),
        }
    }

    /// Fetches usage through the web session.
    #[instrument(skip(self, cookie_header))]
    pub async fn fetch_usage(&self, cookie_header: &str) -> Result<UsageSnapshot, FetchError> {
        let session = extract_session_cookie(cookie_header).ok_or_else(|| {
            FetchError::NotSupported(format!(
                "Cookie header has no {SESSION_COOKIE_NAME} cookie"
            ))
        })?;
        let cookie = format!("{SESSION_COOKIE_NAME}={session}");

        let (org_id, org_name) = self.resolve_organization(&cookie).await?;
        debug!(org = %org_id, "Resolved organization");

        let usage_url = USAGE_URL.replace("{org}", &org_id);
        let response = self.get_json(&self.http, &usage_url, &cookie).await?;
        let mut snapshot = parse_usage_body(&response);

        if snapshot.tertiary.is_none() {
            snapshot.tertiary = self.fetch_extra_usage(&org_id, &cookie).await;
        }
        if snapshot.status_text.is_empty() {
            if let Some(name) = org_name {
                snapshot.status_text = name;
            }
        }

        if !snapshot.has_data() {
            return Err(FetchError::InvalidResponse(
                "No usage windows in web response".to_string(),
            ));
        }
        Ok(snapshot)
    }

    /// Resolves the organization id (and name, when present).
    async fn resolve_organization(
        &self,
        cookie: &str,
    ) -> Result<(String, Option<String>), FetchError> {
        let body = self.get_json(&self.http, ORGANIZATIONS_URL, cookie).await?;
        parse_organization(&body).ok_or_else(|| {
            FetchError::InvalidResponse("No organization id in response".to_string())
        })
    }

    /// Best-effort extra/overage probe; every failure degrades to `None`.
    async fn fetch_extra_usage(&self, org_id: &str, cookie: &str) -> Option<UsageWindow> {
        let url = EXTRA_USAGE_URL.replace("{org}", org_id);
        match self.get_json(&self.probe, &url, cookie).await {
            Ok(body) => parse_overage(&body),
            Err(err) => {
                debug!(error = %err, "Extra-usage probe failed");
                None
            }
        }
    }

    /// Cookie-authenticated GET returning parsed JSON.
    async fn get_json(
        &self,
        client: &HttpClient,
        url: &str,
        cookie: &str,
    ) -> Result<Value, FetchError> {
        let response = client
            .inner()
            .get(url)
            .header("Cookie", cookie)
            .header("Accept", "application/json")
            .header("User-Agent", USER_AGENT)
            .send()
            .await?;
        let response = check_status(response)?;
        response.json().await.map_err(|e| {
            warn!(error = %e, url = %url, "Undecodable web response");
            FetchError::InvalidResponse(e.to_string())
        })
    }
}

impl Default for ClaudeWebClient {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// Parsing
// ============================================================================

/// Extracts the named session cookie value from a raw cookie header,
/// tolerating a `Cookie:` label and arbitrary key casing.
pub(super) fn extract_session_cookie(header: &str) -> Option<String> {
    let header = crate::input::strip_cookie_label(header);
    for pair in header.split(';') {
        let Some((key, value)) = pair.split_once('=') else {
            continue;
        };
        if key.trim().eq_ignore_ascii_case(SESSION_COOKIE_NAME) {
            let value = value.trim();
            if !value.is_empty() {
                return Some(value.to_string());
            }
        }
    }
    None
}

/// Parses the organization listing across its known shapes: a bare array
/// of orgs or a wrapper object, with several id key spellings.
pub(super) fn parse_organization(body: &Value) -> Option<(String, Option<String>)> {
    let org = match body {
        Value::Array(orgs) => orgs.first()?,
        _ => first_of(body, &["organizations", "orgs", "data"])
            .and_then(|v| v.as_array())
            .and_then(|orgs| orgs.first())
            .or(Some(body))?,
    };

    let id = first_string(org, ORG_ID_KEYS)?.to_string();
    let name = get_ci(org, "name")
        .and_then(Value::as_str)
        .map(ToString::to_string);
    Some((id, name))
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_extract_session_cookie() {
        assert_eq!(
            extract_session_cookie("sessionKey=sk-abc; other=1").as_deref(),
            Some("sk-abc")
        );
        assert_eq!(
            extract_session_cookie("Cookie: SESSIONKEY=xyz").as_deref(),
            Some("xyz")
        );
        assert_eq!(
            extract_session_cookie("other=1; sessionkey=v2").as_deref(),
            Some("v2")
        );
        assert!(extract_session_cookie("other=1; foo=bar").is_none());
        assert!(extract_session_cookie("sessionKey=").is_none());
    }

    #[test]
    fn test_parse_organization_bare_array() {
        let body = json!([{"uuid": "org-1", "name": "Acme"}]);
        let (id, name) = parse_organization(&body).unwrap();
        assert_eq!(id, "org-1");
        assert_eq!(name.as_deref(), Some("Acme"));
    }

    #[test]
    fn test_parse_organization_wrapper_shapes() {
        let body = json!({"organizations": [{"id": "org-2"}]});
        assert_eq!(parse_organization(&body).unwrap().0, "org-2");

        let body = json!({"data": [{"organization_id": "org-3"}]});
        assert_eq!(parse_organization(&body).unwrap().0, "org-3");
    }

    #[test]
    fn test_parse_organization_single_object() {
        let body = json!({"uuid": "org-4", "name": "Solo"});
        assert_eq!(parse_organization(&body).unwrap().0, "org-4");
    }

    #[test]
    fn test_parse_organization_missing() {
        assert!(parse_organization(&json!([])).is_none());
        assert!(parse_organization(&json!({"foo": "bar"})).is_none());
    }
}
