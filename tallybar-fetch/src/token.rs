//! OAuth token-endpoint response decoding.
//!
//! Token issuers vary by client: some return JSON bodies, some return
//! form-encoded query strings, and error bodies carry a machine-readable
//! `error` code next to a human-readable description. Decoding attempts
//! JSON first, then a query-string parse.

use serde::Deserialize;
use tracing::debug;

// ============================================================================
// Token Endpoint Response
// ============================================================================

/// Decoded body of a token-endpoint response, success or error.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TokenEndpointResponse {
    /// New access token on success.
    #[serde(default)]
    pub access_token: Option<String>,
    /// Rotated refresh token, when the issuer rotates.
    #[serde(default)]
    pub refresh_token: Option<String>,
    /// Identity token (JWT), when the issuer includes one.
    #[serde(default)]
    pub id_token: Option<String>,
    /// Direct account identifier, when the issuer includes one.
    #[serde(default)]
    pub account_id: Option<String>,
    /// Machine-readable error code on failure (e.g. `invalid_grant`).
    #[serde(default)]
    pub error: Option<String>,
    /// Human-readable error description on failure.
    #[serde(default)]
    pub error_description: Option<String>,
}

impl TokenEndpointResponse {
    /// Decodes a response body, attempting JSON first and falling back to a
    /// query-string form body.
    pub fn decode(body: &str) -> Option<Self> {
        let trimmed = body.trim();
        if trimmed.is_empty() {
            return None;
        }

        if let Ok(parsed) = serde_json::from_str::<Self>(trimmed) {
            return Some(parsed);
        }

        debug!("Token response is not JSON, trying form encoding");
        Self::decode_form(trimmed)
    }

    /// Decodes a `key=value&key=value` form body.
    fn decode_form(body: &str) -> Option<Self> {
        let mut response = Self::default();
        let mut saw_any = false;

        for (key, value) in url::form_urlencoded::parse(body.as_bytes()) {
            let value = value.into_owned();
            if value.is_empty() {
                continue;
            }
            saw_any = true;
            match key.as_ref() {
                "access_token" => response.access_token = Some(value),
                "refresh_token" => response.refresh_token = Some(value),
                "id_token" => response.id_token = Some(value),
                "account_id" => response.account_id = Some(value),
                "error" => response.error = Some(value),
                "error_description" => response.error_description = Some(value),
                _ => {}
            }
        }

        saw_any.then_some(response)
    }

    /// Returns the non-empty access token, if present.
    pub fn token(&self) -> Option<&str> {
        self.access_token
            .as_deref()
            .map(str::trim)
            .filter(|t| !t.is_empty())
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_json_success() {
        let body = r#"{"access_token":"at-1","refresh_token":"rt-1","id_token":"a.b.c"}"#;
        let response = TokenEndpointResponse::decode(body).unwrap();
        assert_eq!(response.token(), Some("at-1"));
        assert_eq!(response.refresh_token.as_deref(), Some("rt-1"));
        assert!(response.error.is_none());
    }

    #[test]
    fn test_decode_json_error() {
        let body = r#"{"error":"invalid_grant","error_description":"Token has been revoked."}"#;
        let response = TokenEndpointResponse::decode(body).unwrap();
        assert!(response.token().is_none());
        assert_eq!(response.error.as_deref(), Some("invalid_grant"));
    }

    #[test]
    fn test_decode_form_fallback() {
        let body = "access_token=at-2&token_type=bearer&refresh_token=rt-2";
        let response = TokenEndpointResponse::decode(body).unwrap();
        assert_eq!(response.token(), Some("at-2"));
        assert_eq!(response.refresh_token.as_deref(), Some("rt-2"));
    }

    #[test]
    fn test_decode_form_error() {
        let body = "error=refresh_token_expired";
        let response = TokenEndpointResponse::decode(body).unwrap();
        assert_eq!(response.error.as_deref(), Some("refresh_token_expired"));
    }

    #[test]
    fn test_decode_empty_body() {
        assert!(TokenEndpointResponse::decode("").is_none());
        assert!(TokenEndpointResponse::decode("   ").is_none());
    }

    #[test]
    fn test_empty_access_token_is_none() {
        let body = r#"{"access_token":"  "}"#;
        let response = TokenEndpointResponse::decode(body).unwrap();
        assert!(response.token().is_none());
    }
}
