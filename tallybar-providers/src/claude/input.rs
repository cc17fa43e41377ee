//! Claude pasted-input parsing.

use tallybar_core::Credentials;

use crate::input::{normalize_token_input, strip_cookie_label, InputError};

/// Accepted OAuth token prefix.
const OAUTH_TOKEN_PREFIX: &str = "sk-ant-oat";

/// API key prefix, rejected with a distinguishing error.
const API_KEY_PREFIX: &str = "sk-ant-api";

/// Parses pasted Claude input: an OAuth access token (`sk-ant-oat…`) or a
/// web cookie header carrying the session cookie.
pub fn parse(raw: &str) -> Result<Credentials, InputError> {
    let text = normalize_token_input(raw)?;

    if text.starts_with(OAUTH_TOKEN_PREFIX) {
        return Ok(Credentials::with_access_token(text));
    }
    if text.starts_with(API_KEY_PREFIX) {
        return Err(InputError::WrongKind(format!(
            "This is an API key; paste an OAuth access token ({OAUTH_TOKEN_PREFIX}…) or a cookie header"
        )));
    }

    if text.contains('=') {
        let cookie = strip_cookie_label(&text);
        return Ok(Credentials::with_cookie(cookie));
    }

    Err(InputError::WrongKind(format!(
        "Expected an OAuth access token ({OAUTH_TOKEN_PREFIX}…) or a cookie header"
    )))
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_accepts_oauth_token() {
        let creds = parse("Bearer sk-ant-oat01-abcdef").unwrap();
        assert_eq!(creds.access_token, "sk-ant-oat01-abcdef");
    }

    #[test]
    fn test_rejects_api_key() {
        let err = parse("sk-ant-api03-xyz").unwrap_err();
        assert!(matches!(err, InputError::WrongKind(_)));
        assert!(err.to_string().contains("API key"));
    }

    #[test]
    fn test_accepts_cookie_header() {
        let creds = parse("Cookie: sessionKey=sk-abc; cf=1").unwrap();
        assert_eq!(creds.cookie_header.as_deref(), Some("sessionKey=sk-abc; cf=1"));
    }

    #[test]
    fn test_rejects_unknown_token_shape() {
        assert!(matches!(
            parse("ghp_notclaude"),
            Err(InputError::WrongKind(_))
        ));
    }

    #[test]
    fn test_rejects_empty() {
        assert!(matches!(parse(""), Err(InputError::EmptyInput)));
    }
}
