//! Flexible extraction over loosely-typed JSON.
//!
//! Several providers ship deliberately inconsistent response shapes: the
//! same figure appears under different key spellings, numbers arrive as
//! strings, wrapper objects come and go between deployments. Rather than
//! bespoke parsing per call site, extraction is an ordered list of
//! candidate keys tried in sequence against a generic value, stopping at
//! the first hit.

use serde_json::Value;

// ============================================================================
// Key Lookup
// ============================================================================

/// Case-insensitive object key lookup.
pub fn get_ci<'a>(value: &'a Value, key: &str) -> Option<&'a Value> {
    let obj = value.as_object()?;
    obj.iter()
        .find(|(k, _)| k.eq_ignore_ascii_case(key))
        .map(|(_, v)| v)
}

/// Returns the first value found under any of the candidate keys, tried in
/// order, case-insensitively.
pub fn first_of<'a>(value: &'a Value, keys: &[&str]) -> Option<&'a Value> {
    keys.iter().find_map(|k| get_ci(value, k))
}

/// Returns the first candidate key that resolves to a numeric value,
/// coercing numeric strings.
pub fn first_number(value: &Value, keys: &[&str]) -> Option<f64> {
    keys.iter().find_map(|k| get_ci(value, k).and_then(coerce_f64))
}

/// Returns the first candidate key that resolves to a non-empty string.
pub fn first_string<'a>(value: &'a Value, keys: &[&str]) -> Option<&'a str> {
    keys.iter().find_map(|k| {
        get_ci(value, k)
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|s| !s.is_empty())
    })
}

/// Coerces a JSON value into an f64: plain numbers pass through, numeric
/// strings (optionally with a trailing `%`) are parsed, everything else is
/// `None`.
pub fn coerce_f64(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => {
            let trimmed = s.trim().trim_end_matches('%').trim();
            trimmed.parse::<f64>().ok()
        }
        _ => None,
    }
}

// ============================================================================
// Timestamps
// ============================================================================

/// Parses an ISO-8601 timestamp, tolerating bodies with and without
/// fractional seconds or an explicit offset.
pub fn parse_iso8601(text: &str) -> Option<chrono::DateTime<chrono::Utc>> {
    chrono::DateTime::parse_from_rfc3339(text)
        .ok()
        .map(|dt| dt.with_timezone(&chrono::Utc))
        .or_else(|| {
            chrono::NaiveDateTime::parse_from_str(text, "%Y-%m-%dT%H:%M:%S%.f")
                .ok()
                .map(|ndt| ndt.and_utc())
        })
}

// ============================================================================
// Keyed Object Search
// ============================================================================

/// Finds the first nested object whose key contains any of the given
/// substrings, case-insensitively, scanning breadth-first up to `max_depth`
/// levels below the root.
///
/// Object keys are visited in their serialized order, so the match is
/// deterministic for a given payload.
pub fn find_keyed_object<'a>(
    root: &'a Value,
    substrings: &[&str],
    max_depth: usize,
) -> Option<&'a Value> {
    let mut frontier: Vec<&'a Value> = vec![root];

    for _ in 0..=max_depth {
        let mut next = Vec::new();
        for value in frontier {
            let Some(obj) = value.as_object() else {
                continue;
            };
            for (key, child) in obj {
                let key_lower = key.to_ascii_lowercase();
                if child.is_object() && substrings.iter().any(|s| key_lower.contains(s)) {
                    return Some(child);
                }
                if child.is_object() {
                    next.push(child);
                }
            }
        }
        if next.is_empty() {
            break;
        }
        frontier = next;
    }

    None
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_get_ci() {
        let value = json!({"UsedPercent": 42});
        assert_eq!(get_ci(&value, "usedpercent").unwrap(), &json!(42));
        assert!(get_ci(&value, "remaining").is_none());
        assert!(get_ci(&json!([1, 2]), "anything").is_none());
    }

    #[test]
    fn test_first_number_tries_spellings_in_order() {
        let value = json!({"used_percent": "37.5", "utilization": 99.0});
        let got = first_number(&value, &["usedPercent", "used_percent", "utilization"]);
        assert_eq!(got, Some(37.5));
    }

    #[test]
    fn test_coerce_f64_from_string() {
        assert_eq!(coerce_f64(&json!("12.5")), Some(12.5));
        assert_eq!(coerce_f64(&json!(" 80% ")), Some(80.0));
        assert_eq!(coerce_f64(&json!(7)), Some(7.0));
        assert_eq!(coerce_f64(&json!("n/a")), None);
        assert_eq!(coerce_f64(&json!(null)), None);
    }

    #[test]
    fn test_first_string_skips_empty() {
        let value = json!({"resetAt": "", "reset_at": "2025-01-01T00:00:00Z"});
        let got = first_string(&value, &["resetAt", "reset_at"]);
        assert_eq!(got, Some("2025-01-01T00:00:00Z"));
    }

    #[test]
    fn test_find_keyed_object_top_level() {
        let value = json!({
            "usage": {"percent": 10},
            "codeReview": {"percent": 55}
        });
        let found = find_keyed_object(&value, &["review"], 1).unwrap();
        assert_eq!(get_ci(found, "percent").unwrap(), &json!(55));
    }

    #[test]
    fn test_find_keyed_object_nested() {
        let value = json!({
            "data": {
                "limits": {
                    "review_tasks": {"remaining": 70}
                }
            }
        });
        let found = find_keyed_object(&value, &["review", "tertiary"], 3).unwrap();
        assert_eq!(get_ci(found, "remaining").unwrap(), &json!(70));
    }

    #[test]
    fn test_find_keyed_object_respects_depth() {
        let value = json!({
            "a": {"b": {"c": {"review": {"x": 1}}}}
        });
        assert!(find_keyed_object(&value, &["review"], 1).is_none());
        assert!(find_keyed_object(&value, &["review"], 4).is_some());
    }

    #[test]
    fn test_find_keyed_object_ignores_non_objects() {
        let value = json!({"review": "just a string", "reviews": {"used": 5}});
        let found = find_keyed_object(&value, &["review"], 1).unwrap();
        assert_eq!(get_ci(found, "used").unwrap(), &json!(5));
    }

    #[test]
    fn test_parse_iso8601_variants() {
        assert!(parse_iso8601("2025-06-01T12:30:00Z").is_some());
        assert!(parse_iso8601("2025-06-01T12:30:00.123456Z").is_some());
        assert!(parse_iso8601("2025-06-01T12:30:00.5").is_some());
        assert!(parse_iso8601("yesterday").is_none());
    }
}
