//! Unified credential record.
//!
//! Every provider authenticates with some subset of these fields:
//!
//! - OAuth bearer token (Codex, Claude, Gemini)
//! - Refresh token (Codex, Gemini)
//! - Session cookie header (Codex, Claude, Gemini studio, Kimi)
//! - Auxiliary authorization + API key headers (Gemini studio)
//! - Personal access token, carried in `access_token` (Copilot)
//!
//! The record is owned by the external secure store, keyed by provider;
//! the orchestrator only ever holds ephemeral in-memory copies.

use serde::{Deserialize, Serialize};

/// Unified credential record for one provider account.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credentials {
    /// OAuth access token or personal access token.
    #[serde(default)]
    pub access_token: String,
    /// OAuth refresh token, for providers that rotate tokens.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
    /// Account identifier, where the provider needs one on requests.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub account_id: Option<String>,
    /// Raw cookie header for web-session auth.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cookie_header: Option<String>,
    /// Auxiliary Authorization header value (studio header set).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aux_authorization: Option<String>,
    /// Auxiliary API key header value (studio header set).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aux_api_key: Option<String>,
}

impl Credentials {
    /// Creates a record holding only an access token.
    pub fn with_access_token(token: impl Into<String>) -> Self {
        Self {
            access_token: token.into(),
            ..Self::default()
        }
    }

    /// Creates a record holding only a cookie header.
    pub fn with_cookie(cookie: impl Into<String>) -> Self {
        Self {
            cookie_header: Some(cookie.into()),
            ..Self::default()
        }
    }

    /// Returns true if this record can authenticate at least one scheme.
    ///
    /// An all-empty record is semantically "disconnected" and must never be
    /// persisted; callers delete the stored record instead.
    pub fn is_usable(&self) -> bool {
        !self.access_token.trim().is_empty()
            || self
                .cookie_header
                .as_deref()
                .is_some_and(|c| !c.trim().is_empty())
    }

    /// Returns the non-empty cookie header, if any.
    pub fn cookie(&self) -> Option<&str> {
        self.cookie_header
            .as_deref()
            .map(str::trim)
            .filter(|c| !c.is_empty())
    }

    /// Merges the result of a token refresh into this record.
    ///
    /// Adopts the new access token, adopts the refresh token and account id
    /// only when the refresh actually produced them (refresh tokens are not
    /// guaranteed to rotate), and leaves cookie/auxiliary fields untouched;
    /// a refresh must never clobber credentials another flow relies on.
    pub fn merge_refreshed(&self, refreshed: &Credentials) -> Self {
        Self {
            access_token: refreshed.access_token.clone(),
            refresh_token: refreshed
                .refresh_token
                .clone()
                .or_else(|| self.refresh_token.clone()),
            account_id: refreshed
                .account_id
                .clone()
                .or_else(|| self.account_id.clone()),
            cookie_header: self.cookie_header.clone(),
            aux_authorization: self.aux_authorization.clone(),
            aux_api_key: self.aux_api_key.clone(),
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
