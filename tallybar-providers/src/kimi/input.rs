//! Kimi pasted-input parsing.

use tallybar_core::Credentials;

use crate::input::{strip_cookie_label, InputError};

/// Parses pasted Kimi input: a raw cookie header, with or without a
/// `Cookie:` label.
pub fn parse(raw: &str) -> Result<Credentials, InputError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(InputError::EmptyInput);
    }

    let cookie = strip_cookie_label(trimmed);
    if !cookie.contains('=') {
        return Err(InputError::WrongKind(
            "Expected a cookie header (name=value pairs)".to_string(),
        ));
    }
    Ok(Credentials::with_cookie(cookie))
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_accepts_cookie_header() {
        let creds = parse("Cookie: kimi-auth=jwt123; other=1").unwrap();
        assert_eq!(creds.cookie_header.as_deref(), Some("kimi-auth=jwt123; other=1"));

        let creds = parse("kimi-auth=jwt123").unwrap();
        assert_eq!(creds.cookie_header.as_deref(), Some("kimi-auth=jwt123"));
    }

    #[test]
    fn test_rejects_non_cookie() {
        assert!(matches!(
            parse("just-a-token"),
            Err(InputError::WrongKind(_))
        ));
    }

    #[test]
    fn test_rejects_empty() {
        assert!(matches!(parse("   "), Err(InputError::EmptyInput)));
    }
}
