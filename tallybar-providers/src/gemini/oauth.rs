//! Gemini OAuth token refresh.
//!
//! Posts `grant_type=refresh_token` to the Google token endpoint. Google
//! reports revocation through the `invalid_grant` code, which is the one
//! refresh failure that must interrupt an otherwise-silent proactive
//! refresh; unrecognized codes classify as expired.

use async_trait::async_trait;
use tracing::{debug, instrument, warn};

use tallybar_core::{Credentials, ProviderKind};
use tallybar_fetch::{HttpClient, RefreshError, TokenEndpointResponse};

use crate::client::{OAuthConfig, TokenRefresher};

/// Google OAuth token endpoint.
const TOKEN_ENDPOINT: &str = "https://oauth2.googleapis.com/token";

// ============================================================================
// Refresher
// ============================================================================

/// Gemini token refresher.
pub struct GeminiRefresher {
    http: HttpClient,
    oauth: Option<OAuthConfig>,
}

impl GeminiRefresher {
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
impl TokenRefresher for GeminiRefresher {
    fn kind(&self) -> ProviderKind {
        ProviderKind::Gemini
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
            RefreshError::InvalidResponse("OAuth client configuration missing".to_string())
        })?;
        let client_secret = oauth.client_secret.as_deref().ok_or_else(|| {
            RefreshError::InvalidResponse("OAuth client secret missing".to_string())
        })?;

        let params = [
            ("client_id", oauth.client_id.as_str()),
            ("client_secret", client_secret),
            ("refresh_token", refresh_token),
            ("grant_type", "refresh_token"),
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

        debug!(rotated = decoded.refresh_token.is_some(), "Token refreshed");

        let refreshed = Credentials {
            access_token,
            refresh_token: decoded.refresh_token.clone(),
            ..Credentials::default()
        };
        Ok(creds.merge_refreshed(&refreshed))
    }
}

/// Maps Google's machine-readable error code onto the refresh taxonomy.
fn classify_error(code: Option<&str>) -> RefreshError {
    match code {
        // Google reports revoked grants as invalid_grant.
        Some("invalid_grant") => RefreshError::Revoked,
        _ => RefreshError::Expired,
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_invalid_grant_as_revoked() {
        assert!(matches!(
            classify_error(Some("invalid_grant")),
            RefreshError::Revoked
        ));
    }

    #[test]
    fn test_classify_unknown_as_expired() {
        assert!(matches!(
            classify_error(Some("unsupported_grant_type")),
            RefreshError::Expired
        ));
        assert!(matches!(classify_error(None), RefreshError::Expired));
    }

    #[tokio::test]
    async fn test_refresh_without_token_fails_fast() {
        let refresher = GeminiRefresher::new(None);
        let err = refresher.refresh(&Credentials::default()).await.unwrap_err();
        assert!(matches!(err, RefreshError::MissingRefreshToken));
    }

    #[tokio::test]
    async fn test_refresh_without_config_fails_gracefully() {
        let refresher = GeminiRefresher::new(None);
        let creds = Credentials {
            access_token: "at".to_string(),
            refresh_token: Some("rt".to_string()),
            ..Credentials::default()
        };
        let err = refresher.refresh(&creds).await.unwrap_err();
        assert!(matches!(err, RefreshError::InvalidResponse(_)));
    }
}
