//! Codex OAuth token refresh.
//!
//! Posts `grant_type=refresh_token` to the OpenAI token endpoint. Error
//! bodies carry a machine-readable code that distinguishes an expired
//! token from a reused or invalidated one; unrecognized codes classify as
//! expired. On success the account id is resolved from a direct response
//! field or from the identity-token JWT claims.

use async_trait::async_trait;
use base64::prelude::*;
use serde_json::Value;
use tracing::{debug, instrument, warn};

use tallybar_core::{Credentials, ProviderKind};
use tallybar_fetch::{HttpClient, RefreshError, TokenEndpointResponse};

use crate::client::{OAuthConfig, TokenRefresher};

// ============================================================================
// Constants
// ============================================================================

/// OpenAI OAuth token endpoint.
const TOKEN_ENDPOINT: &str = "https://auth.openai.com/oauth/token";

/// JWT claim namespace carrying the account data.
const AUTH_CLAIM: &str = "https://api.openai.com/auth";

// ============================================================================
// Refresher
// ============================================================================

/// Codex token refresher.
pub struct CodexRefresher {
    http: HttpClient,
    oauth: Option<OAuthConfig>,
}

impl CodexRefresher {
    /// Creates a refresher; the OAuth config may be absent, in which case
    /// refresh calls fail gracefully.
    pub fn new(oauth: Option<OAuthConfig>) -> Self {
        Self {
            http: HttpClient::primary(),
            oauth,
        }
    }
}

#[async_trait]
impl TokenRefresher for CodexRefresher {
    fn kind(&self) -> ProviderKind {
        ProviderKind::Codex
    }

    #[instrument(skip(self, creds))]
    async fn refresh(&self, creds: &Credentials) -> Result<Credentials, RefreshError> {
        let refresh_token = creds
            .refresh_token
            .as_deref()
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .ok_or(RefreshError::MissingRefreshToken)?;

        let oauth = self.oauth.as_ref().ok_or_else(|| {
            RefreshError::InvalidResponse("OAuth client id is not configured".to_string())
        })?;

        let params = [
            ("client_id", oauth.client_id.as_str()),
            ("grant_type", "refresh_token"),
            ("refresh_token", refresh_token),
        ];

        let response = self
            .http
            .inner()
            .post(TOKEN_ENDPOINT)
            .form(&params)
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await.unwrap_or_default();

        if status.as_u16() == 400 || status.as_u16() == 401 {
            let decoded = TokenEndpointResponse::decode(&body).unwrap_or_default();
            warn!(code = ?decoded.error, "Token refresh rejected");
            return Err(classify_error(decoded.error.as_deref()));
        }
        if !status.is_success() {
            return Err(RefreshError::InvalidResponse(format!(
                "Token endpoint returned HTTP {status}"
            )));
        }

        let decoded = TokenEndpointResponse::decode(&body).ok_or_else(|| {
            RefreshError::InvalidResponse("Undecodable token response".to_string())
        })?;
        let access_token = decoded
            .token()
            .ok_or_else(|| {
                RefreshError::InvalidResponse("Token response carried no access token".to_string())
            })?
            .to_string();

        let account_id = decoded
            .account_id
            .clone()
            .or_else(|| decoded.id_token.as_deref().and_then(account_id_from_jwt));

        debug!(rotated = decoded.refresh_token.is_some(), "Token refreshed");

        let refreshed = Credentials {
            access_token,
            refresh_token: decoded.refresh_token.clone(),
            account_id,
            ..Credentials::default()
        };
        Ok(creds.merge_refreshed(&refreshed))
    }
}

// ============================================================================
// Error Classification
// ============================================================================

/// Maps the token endpoint's machine-readable error code onto the refresh
/// taxonomy. Unrecognized codes (including `invalid_grant`) classify as
/// expired.
fn classify_error(code: Option<&str>) -> RefreshError {
    match code {
        Some("refresh_token_reused") => RefreshError::Reused,
        Some("refresh_token_invalidated" | "refresh_token_revoked") => RefreshError::Revoked,
        // "refresh_token_expired", "invalid_grant", anything unrecognized
        _ => RefreshError::Expired,
    }
}

// ============================================================================
// Identity Token Claims
// ============================================================================

/// Extracts the account id from an identity token's JWT claims.
///
/// The payload is the middle segment of the dot-delimited token, base64url
/// encoded and possibly missing its `=` padding. Signature validation is
/// out of scope; this only reads account info.
pub(super) fn account_id_from_jwt(token: &str) -> Option<String> {
    let payload = decode_jwt_payload(token)?;

    if let Some(auth) = payload.get(AUTH_CLAIM) {
        if let Some(id) = auth.get("chatgpt_account_id").and_then(Value::as_str) {
            return Some(id.to_string());
        }
        if let Some(id) = auth.get("account_id").and_then(Value::as_str) {
            return Some(id.to_string());
        }
    }
    payload
        .get("account_id")
        .and_then(Value::as_str)
        .map(ToString::to_string)
}

/// Decodes a JWT payload segment, tolerating missing padding.
fn decode_jwt_payload(token: &str) -> Option<Value> {
    let parts: Vec<&str> = token.split('.').collect();
    if parts.len() != 3 {
        return None;
    }

    let decoded = BASE64_URL_SAFE_NO_PAD
        .decode(parts[1])
        .or_else(|_| BASE64_STANDARD.decode(parts[1]))
        .ok()?;

    serde_json::from_slice(&decoded).ok()
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn jwt_with_payload(payload: &str) -> String {
        let encoded = BASE64_URL_SAFE_NO_PAD.encode(payload.as_bytes());
        format!("eyJhbGciOiJSUzI1NiJ9.{encoded}.signature")
    }

    #[test]
    fn test_classify_known_codes() {
        assert!(matches!(
            classify_error(Some("refresh_token_expired")),
            RefreshError::Expired
        ));
        assert!(matches!(
            classify_error(Some("refresh_token_reused")),
            RefreshError::Reused
        ));
        assert!(matches!(
            classify_error(Some("refresh_token_invalidated")),
            RefreshError::Revoked
        ));
        assert!(matches!(
            classify_error(Some("invalid_grant")),
            RefreshError::Expired
        ));
    }

    #[test]
    fn test_classify_unknown_defaults_to_expired() {
        assert!(matches!(
            classify_error(Some("something_else")),
            RefreshError::Expired
        ));
        assert!(matches!(classify_error(None), RefreshError::Expired));
    }

    #[test]
    fn test_account_id_from_nested_claim() {
        let token = jwt_with_payload(
            r#"{"https://api.openai.com/auth":{"chatgpt_account_id":"acct-123"}}"#,
        );
        assert_eq!(account_id_from_jwt(&token).as_deref(), Some("acct-123"));
    }

    #[test]
    fn test_account_id_from_top_level() {
        let token = jwt_with_payload(r#"{"account_id":"acct-9"}"#);
        assert_eq!(account_id_from_jwt(&token).as_deref(), Some("acct-9"));
    }

    #[test]
    fn test_account_id_missing() {
        let token = jwt_with_payload(r#"{"email":"user@example.com"}"#);
        assert!(account_id_from_jwt(&token).is_none());
    }

    #[test]
    fn test_malformed_jwt() {
        assert!(account_id_from_jwt("not-a-jwt").is_none());
        assert!(account_id_from_jwt("a.b").is_none());
        assert!(account_id_from_jwt("a.!!!.c").is_none());
    }
}
