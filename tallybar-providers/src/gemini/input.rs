//! Gemini pasted-input parsing.
//!
//! Accepts either a plain OAuth bearer token or a pasted "studio headers"
//! blob captured from the browser: a `Cookie` header, an `Authorization`
//! value that must carry the `SAPISIDHASH` prefix, and an optional
//! `X-Goog-Api-Key`.

use tallybar_core::Credentials;

use super::api::{has_studio_prefix, STUDIO_AUTH_PREFIX};
use crate::input::{normalize_token_input, parse_headers_blob, InputError};

/// Parses pasted Gemini input.
pub fn parse(raw: &str) -> Result<Credentials, InputError> {
    if let Ok(headers) = parse_headers_blob(raw) {
        let cookie = headers.get("cookie").cloned();
        let authorization = headers.get("authorization").cloned();

        if let Some(cookie) = cookie {
            let authorization = authorization.ok_or_else(|| {
                InputError::Invalid("Studio headers need an Authorization value".to_string())
            })?;
            if !has_studio_prefix(&authorization) {
                return Err(InputError::WrongKind(format!(
                    "Studio Authorization must start with '{}'",
                    STUDIO_AUTH_PREFIX.trim_end()
                )));
            }
            return Ok(Credentials {
                cookie_header: Some(cookie),
                aux_authorization: Some(authorization),
                aux_api_key: headers.get("x-goog-api-key").cloned(),
                ..Credentials::default()
            });
        }

        // An Authorization header alone is just a labeled bearer token.
        if let Some(authorization) = authorization {
            if has_studio_prefix(&authorization) {
                return Err(InputError::Invalid(
                    "Studio headers need a Cookie value too".to_string(),
                ));
            }
            return parse_token(&authorization);
        }
    }

    parse_token(raw)
}

/// Parses a bare bearer token.
fn parse_token(raw: &str) -> Result<Credentials, InputError> {
    let token = normalize_token_input(raw)?;
    if token.contains(char::is_whitespace) {
        return Err(InputError::WrongKind(
            "Expected a single OAuth access token or a studio headers blob".to_string(),
        ));
    }
    Ok(Credentials::with_access_token(token))
}

// ============================================================================
// Tests
// ============================================================================
