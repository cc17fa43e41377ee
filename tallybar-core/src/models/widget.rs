//! Widget snapshot bundle and background credential feed.
//!
//! The engine produces a serialized bundle once per completed refresh-all
//! cycle; the display surface (widget/dashboard) consumes it read-only. In
//! the other direction, the embedding application may feed the background
//! refresh path a reduced credential record per provider.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use super::provider::ProviderKind;
use super::usage::UsageSnapshot;

// ============================================================================
// Widget Snapshot
// ============================================================================

/// The serialized bundle handed to the display surface.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WidgetSnapshot {
    /// When this bundle was generated.
    pub generated_at: DateTime<Utc>,
    /// True when the providers carry demo data rather than live fetches.
    pub is_mock_data: bool,
    /// Latest snapshot per provider, in display order.
    pub providers: Vec<UsageSnapshot>,
}

impl WidgetSnapshot {
    /// Creates a bundle from live snapshots.
    pub fn new(providers: Vec<UsageSnapshot>) -> Self {
        Self {
            generated_at: Utc::now(),
            is_mock_data: false,
            providers,
        }
    }

    /// Returns the snapshot for a provider, if present.
    pub fn get(&self, kind: ProviderKind) -> Option<&UsageSnapshot> {
        self.providers.iter().find(|s| s.provider == kind)
    }
}

// ============================================================================
// Background Credential Feed
// ============================================================================

/// Reduced credential record supplied to the background refresh path.
///
/// Deliberately carries no refresh token: the timeout-bound background path
/// must never rotate credentials.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BackgroundCredentials {
    /// Access token or personal access token.
    #[serde(default)]
    pub access_token: String,
    /// Account identifier.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub account_id: Option<String>,
    /// Raw cookie header.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cookie_header: Option<String>,
    /// Auxiliary Authorization header value.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aux_authorization: Option<String>,
    /// Auxiliary API key header value.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aux_api_key: Option<String>,
}

impl BackgroundCredentials {
    /// Returns true if this record can authenticate at least one scheme.
    pub fn is_usable(&self) -> bool {
        !self.access_token.trim().is_empty()
            || self
                .cookie_header
                .as_deref()
                .is_some_and(|c| !c.trim().is_empty())
    }
}

impl From<&super::credentials::Credentials> for BackgroundCredentials {
    fn from(creds: &super::credentials::Credentials) -> Self {
        Self {
            access_token: creds.access_token.clone(),
            account_id: creds.account_id.clone(),
            cookie_header: creds.cookie_header.clone(),
            aux_authorization: creds.aux_authorization.clone(),
            aux_api_key: creds.aux_api_key.clone(),
        }
    }
}

/// Per-provider background credential feed.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RefreshCredentialsPayload {
    /// Reduced credentials keyed by provider.
    #[serde(default)]
    pub providers: HashMap<ProviderKind, BackgroundCredentials>,
}

impl RefreshCredentialsPayload {
    /// Returns true when no provider has usable credentials; the background
    /// path treats this as a no-op and returns the prior snapshot.
    pub fn is_empty(&self) -> bool {
        !self.providers.values().any(BackgroundCredentials::is_usable)
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_widget_snapshot_lookup() {
        let bundle = WidgetSnapshot::new(vec![
            UsageSnapshot::new(ProviderKind::Codex),
            UsageSnapshot::new(ProviderKind::Claude),
        ]);
        assert!(bundle.get(ProviderKind::Claude).is_some());
        assert!(bundle.get(ProviderKind::Kimi).is_none());
        assert!(!bundle.is_mock_data);
    }

    #[test]
    fn test_payload_empty_detection() {
        let mut payload = RefreshCredentialsPayload::default();
        assert!(payload.is_empty());

        payload.providers.insert(
            ProviderKind::Codex,
            BackgroundCredentials {
                access_token: "  ".to_string(),
                ..BackgroundCredentials::default()
            },
        );
        assert!(payload.is_empty());

        payload.providers.insert(
            ProviderKind::Claude,
            BackgroundCredentials {
                cookie_header: Some("session=abc".to_string()),
                ..BackgroundCredentials::default()
            },
        );
        assert!(!payload.is_empty());
    }

    #[test]
    fn test_background_credentials_from_full_record() {
        let full = super::super::credentials::Credentials {
            access_token: "tok".to_string(),
            refresh_token: Some("rt".to_string()),
            account_id: Some("acct".to_string()),
            cookie_header: None,
            aux_authorization: None,
            aux_api_key: None,
        };
        let reduced = BackgroundCredentials::from(&full);
        assert_eq!(reduced.access_token, "tok");
        assert_eq!(reduced.account_id.as_deref(), Some("acct"));
    }
}
