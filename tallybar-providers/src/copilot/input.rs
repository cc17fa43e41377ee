//! Copilot pasted-input parsing.

use tallybar_core::Credentials;

use crate::input::{normalize_token_input, InputError};

/// Accepted GitHub token prefixes.
const TOKEN_PREFIXES: &[&str] = &["ghp_", "gho_", "ghu_", "github_pat_"];

/// Parses pasted Copilot input: a GitHub personal access token.
pub fn parse(raw: &str) -> Result<Credentials, InputError> {
    let text = normalize_token_input(raw)?;

    if TOKEN_PREFIXES.iter().any(|p| text.starts_with(p)) {
        return Ok(Credentials::with_access_token(text));
    }

    Err(InputError::WrongKind(
        "Expected a GitHub token (ghp_…, gho_…, or github_pat_…)".to_string(),
    ))
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_accepts_github_tokens() {
        for token in ["ghp_abc123", "gho_xyz", "github_pat_11ABC"] {
            let creds = parse(token).unwrap();
            assert_eq!(creds.access_token, token);
        }
    }

    #[test]
    fn test_strips_token_scheme() {
        let creds = parse("token ghp_abc").unwrap();
        assert_eq!(creds.access_token, "ghp_abc");
    }

    #[test]
    fn test_rejects_other_tokens() {
        assert!(matches!(
            parse("sk-ant-oat01-abc"),
            Err(InputError::WrongKind(_))
        ));
        assert!(matches!(parse("ya29.a0Af"), Err(InputError::WrongKind(_))));
    }

    #[test]
    fn test_rejects_empty() {
        assert!(matches!(parse("  "), Err(InputError::EmptyInput)));
    }
}
