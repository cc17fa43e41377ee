//! Codex pasted-input parsing.

use tallybar_core::Credentials;

use crate::input::{normalize_token_input, strip_cookie_label, InputError};

/// Parses pasted Codex input: an OAuth access token or a web cookie header.
///
/// API keys are syntactically the wrong kind here and are rejected with a
/// distinguishing error. Callers should route OAuth callback URLs to the
/// exchange flow first (see [`crate::input::looks_like_oauth_callback`]).
pub fn parse(raw: &str) -> Result<Credentials, InputError> {
    let text = normalize_token_input(raw)?;

    // A pasted cookie header carries key=value pairs.
    if text.contains('=') && (text.contains(';') || text.to_ascii_lowercase().starts_with("cookie"))
    {
        let cookie = strip_cookie_label(&text);
        return Ok(Credentials::with_cookie(cookie));
    }

    if text.starts_with("sk-") {
        return Err(InputError::WrongKind(
            "This looks like an API key; paste the OAuth access token from your ChatGPT session"
                .to_string(),
        ));
    }

    Ok(Credentials::with_access_token(text))
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_accepts_bearer_token() {
        let creds = parse("Bearer eyJhbGciOiJSUzI1NiJ9.abc.def").unwrap();
        assert_eq!(creds.access_token, "eyJhbGciOiJSUzI1NiJ9.abc.def");
        assert!(creds.cookie_header.is_none());
    }

    #[test]
    fn test_accepts_cookie_header() {
        let creds = parse("Cookie: __Secure-next-auth.session-token=abc; other=1").unwrap();
        assert_eq!(
            creds.cookie_header.as_deref(),
            Some("__Secure-next-auth.session-token=abc; other=1")
        );
    }

    #[test]
    fn test_rejects_api_key() {
        assert!(matches!(
            parse("sk-proj-abcdef123"),
            Err(InputError::WrongKind(_))
        ));
    }

    #[test]
    fn test_rejects_empty() {
        assert!(matches!(parse("   "), Err(InputError::EmptyInput)));
    }
}
