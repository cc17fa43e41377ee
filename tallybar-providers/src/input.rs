//! Shared parsing for user-pasted credential input.
//!
//! Configuration surfaces accept free-form pasted text: bare tokens, tokens
//! with an `Authorization:` label, cookie headers, JSON header blobs, or an
//! OAuth callback URL that only looks like a token. The helpers here do the
//! provider-independent cleanup; each provider's `input` module applies its
//! own token-kind validation on top.

use std::collections::HashMap;

use regex::Regex;
use thiserror::Error;

use tallybar_core::{Credentials, ProviderKind};

/// Header names recognized in pasted headers blobs.
const KNOWN_HEADER_NAMES: &[&str] = &["cookie", "authorization", "x-goog-api-key"];

// ============================================================================
// Input Error
// ============================================================================

/// Errors produced while parsing pasted credential input.
#[derive(Debug, Error)]
pub enum InputError {
    /// Nothing left after trimming labels and whitespace.
    #[error("Input is empty")]
    EmptyInput,

    /// The pasted token is syntactically the wrong kind for the provider.
    #[error("{0}")]
    WrongKind(String),

    /// The input could not be interpreted at all.
    #[error("Invalid input: {0}")]
    Invalid(String),
}

// ============================================================================
// Token Cleanup
// ============================================================================

/// Trims whitespace and strips an optional `Authorization:` label and a
/// `Bearer `/`Token ` scheme prefix from pasted token text.
pub fn normalize_token_input(raw: &str) -> Result<String, InputError> {
    let mut text = raw.trim();

    if let Some(rest) = strip_prefix_ci(text, "authorization:") {
        text = rest.trim();
    }
    for scheme in ["bearer ", "token "] {
        if let Some(rest) = strip_prefix_ci(text, scheme) {
            text = rest.trim();
            break;
        }
    }

    if text.is_empty() {
        return Err(InputError::EmptyInput);
    }
    Ok(text.to_string())
}

/// Strips an optional `Cookie:` label from a pasted cookie header.
pub fn strip_cookie_label(raw: &str) -> &str {
    let trimmed = raw.trim();
    strip_prefix_ci(trimmed, "cookie:").map_or(trimmed, str::trim)
}

/// Case-insensitive prefix strip.
fn strip_prefix_ci<'a>(text: &'a str, prefix: &str) -> Option<&'a str> {
    let candidate = text.get(..prefix.len())?;
    candidate
        .eq_ignore_ascii_case(prefix)
        .then(|| &text[prefix.len()..])
}

// ============================================================================
// OAuth Callback Heuristic
// ============================================================================

/// Returns true when pasted input looks like an OAuth callback URL rather
/// than a raw static token.
///
/// Both are visually similar pastes; this chooses between the OAuth
/// exchange path and the direct token-save path.
pub fn looks_like_oauth_callback(input: &str) -> bool {
    let trimmed = input.trim();
    let lower = trimmed.to_ascii_lowercase();

    if lower.contains("code=") || lower.contains("state=") {
        return true;
    }
    if lower.contains("/callback") || lower.contains("/oauth") || lower.contains("/auth/") {
        return true;
    }
    if lower.starts_with("http://") || lower.starts_with("https://") {
        return true;
    }
    // Custom scheme redirect, e.g. "app://redirect?..."
    Regex::new(r"^[a-zA-Z][a-zA-Z0-9+.-]*://")
        .map(|re| re.is_match(trimmed))
        .unwrap_or(false)
}

// ============================================================================
// Headers Blob
// ============================================================================

/// Parses a pasted "headers blob" into a map with lowercased header names.
///
/// Three formats are recognized, tried in order:
/// 1. a JSON object of header name to value
/// 2. colon-delimited lines, optionally bullet-prefixed
/// 3. a raw-text scan for the known header names
///
/// Only the known header names (`Cookie`, `Authorization`,
/// `X-Goog-Api-Key`) are extracted, matched case-insensitively.
pub fn parse_headers_blob(raw: &str) -> Result<HashMap<String, String>, InputError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(InputError::EmptyInput);
    }

    if let Some(map) = parse_json_headers(trimmed) {
        return Ok(map);
    }
    if let Some(map) = parse_line_headers(trimmed) {
        return Ok(map);
    }
    if let Some(map) = scan_headers(trimmed) {
        return Ok(map);
    }

    Err(InputError::Invalid(
        "No recognizable headers found".to_string(),
    ))
}

fn is_known_header(name: &str) -> bool {
    KNOWN_HEADER_NAMES
        .iter()
        .any(|known| name.eq_ignore_ascii_case(known))
}

/// Format 1: JSON object.
fn parse_json_headers(text: &str) -> Option<HashMap<String, String>> {
    let value: serde_json::Value = serde_json::from_str(text).ok()?;
    let obj = value.as_object()?;

    let mut map = HashMap::new();
    for (key, value) in obj {
        if !is_known_header(key) {
            continue;
        }
        if let Some(s) = value.as_str() {
            let s = s.trim();
            if !s.is_empty() {
                map.insert(key.to_ascii_lowercase(), s.to_string());
            }
        }
    }
    (!map.is_empty()).then_some(map)
}

/// Format 2: colon-delimited lines, possibly bullet-prefixed.
fn parse_line_headers(text: &str) -> Option<HashMap<String, String>> {
    let mut map = HashMap::new();

    for line in text.lines() {
        let line = line.trim().trim_start_matches(['-', '*', '•']).trim_start();
        let Some((key, value)) = line.split_once(':') else {
            continue;
        };
        let key = key.trim();
        let value = value.trim();
        if value.is_empty() || !is_known_header(key) {
            continue;
        }
        map.insert(key.to_ascii_lowercase(), value.to_string());
    }

    (!map.is_empty()).then_some(map)
}

/// Format 3: raw-text scan.
///
/// Values run from the separator to the next known header name or end of
/// line, so several headers pasted on one line still split correctly.
fn scan_headers(text: &str) -> Option<HashMap<String, String>> {
    let re = Regex::new(r"(?i)\b(cookie|authorization|x-goog-api-key)\b\s*[:=]\s*").ok()?;

    let positions: Vec<(usize, usize, String)> = re
        .captures_iter(text)
        .filter_map(|c| {
            let whole = c.get(0)?;
            let name = c.get(1)?.as_str().to_ascii_lowercase();
            Some((whole.start(), whole.end(), name))
        })
        .collect();

    let mut map = HashMap::new();
    for (index, (_, value_start, name)) in positions.iter().enumerate() {
        let value_end = positions
            .get(index + 1)
            .map_or(text.len(), |(next_start, _, _)| *next_start);
        let value = text[*value_start..value_end]
            .lines()
            .next()
            .unwrap_or_default()
            .trim()
            .trim_matches('"')
            .trim_end_matches([',', ';'])
            .trim();
        if !value.is_empty() {
            map.entry(name.clone()).or_insert_with(|| value.to_string());
        }
    }
    (!map.is_empty()).then_some(map)
}

// ============================================================================
// Dispatch
// ============================================================================

/// Parses pasted credential input for the given provider.
pub fn parse_input(kind: ProviderKind, raw: &str) -> Result<Credentials, InputError> {
    match kind {
        ProviderKind::Codex => crate::codex::input::parse(raw),
        ProviderKind::Claude => crate::claude::input::parse(raw),
        ProviderKind::Copilot => crate::copilot::input::parse(raw),
        ProviderKind::Gemini => crate::gemini::input::parse(raw),
        ProviderKind::Kimi => crate::kimi::input::parse(raw),
    }
}

// ============================================================================
// Tests
// ============================================================================
