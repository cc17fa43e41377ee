//! Code-review extraction from the usage dashboard HTML.
//!
//! Last level of the code-review fallback chain. The dashboard embeds its
//! state both as serialized JSON and as rendered copy, so extraction runs
//! ordered patterns from most to least structured:
//!
//! 1. JSON-looking keys embedded in the page source
//! 2. natural-language "Code review NN% remaining/used" copy
//! 3. a broad "review … NN%" pattern, assumed to mean remaining
//!
//! All failure modes are "no data"; nothing here ever raises.

use regex::Regex;

use tallybar_core::UsageWindow;

/// Parses the dashboard HTML into a code-review window, if any pattern
/// matches.
pub fn parse_dashboard_html(html: &str) -> Option<UsageWindow> {
    parse_embedded_json(html)
        .or_else(|| parse_natural_language(html))
        .or_else(|| parse_broad(html))
}

/// Level 1: serialized state keys like `"codeReviewRemainingPercent": 70`.
fn parse_embedded_json(html: &str) -> Option<UsageWindow> {
    let remaining = Regex::new(
        r#"(?i)"code[_-]?review[_-]?remaining[_-]?percent"\s*:\s*"?([0-9]+(?:\.[0-9]+)?)"#,
    )
    .ok()?
    .captures(html)
    .and_then(|c| c.get(1)?.as_str().parse::<f64>().ok());

    if let Some(remaining) = remaining {
        return Some(UsageWindow::from_remaining(remaining));
    }

    let used = Regex::new(
        r#"(?i)"code[_-]?review[_-]?used[_-]?percent"\s*:\s*"?([0-9]+(?:\.[0-9]+)?)"#,
    )
    .ok()?
    .captures(html)
    .and_then(|c| c.get(1)?.as_str().parse::<f64>().ok());

    used.map(UsageWindow::from_used)
}

/// Level 2: rendered copy like "Code review 70% remaining".
fn parse_natural_language(html: &str) -> Option<UsageWindow> {
    let re = Regex::new(
        r"(?is)code\s+review.{0,60}?([0-9]+(?:\.[0-9]+)?)\s*%.{0,20}?(remaining|left|used)",
    )
    .ok()?;
    let captures = re.captures(html)?;
    let percent: f64 = captures.get(1)?.as_str().parse().ok()?;
    let direction = captures.get(2)?.as_str().to_ascii_lowercase();

    Some(if direction == "used" {
        UsageWindow::from_used(percent)
    } else {
        UsageWindow::from_remaining(percent)
    })
}

/// Level 3: anything mentioning "review" near a percentage; remaining
/// semantics assumed.
fn parse_broad(html: &str) -> Option<UsageWindow> {
    let re = Regex::new(r"(?i)review[^%]{0,120}?([0-9]+(?:\.[0-9]+)?)\s*%").ok()?;
    let captures = re.captures(html)?;
    let percent: f64 = captures.get(1)?.as_str().parse().ok()?;
    Some(UsageWindow::from_remaining(percent))
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_embedded_json_remaining() {
        let html = r#"<script>{"codeReviewRemainingPercent": 70.5}</script>"#;
        let window = parse_dashboard_html(html).expect("window");
        assert_eq!(window.remaining_percent, Some(70.5));
    }

    #[test]
    fn test_embedded_json_used_snake_case() {
        let html = r#"window.__state={"code_review_used_percent":"33"}"#;
        let window = parse_dashboard_html(html).expect("window");
        assert_eq!(window.used_percent, Some(33.0));
    }

    #[test]
    fn test_natural_language_remaining() {
        let html = "<div>Code review <b>62%</b> remaining this week</div>";
        let window = parse_dashboard_html(html).expect("window");
        assert_eq!(window.remaining_percent, Some(62.0));
    }

    #[test]
    fn test_natural_language_used() {
        let html = "<span>Code review tasks: 38% used</span>";
        let window = parse_dashboard_html(html).expect("window");
        assert_eq!(window.used_percent, Some(38.0));
    }

    #[test]
    fn test_broad_fallback_assumes_remaining() {
        let html = "<p>Your review allowance is at 55%.</p>";
        let window = parse_dashboard_html(html).expect("window");
        assert_eq!(window.remaining_percent, Some(55.0));
    }

    #[test]
    fn test_structured_beats_natural_language() {
        let html = concat!(
            r#"{"codeReviewRemainingPercent": 80}"#,
            "<div>Code review 10% used</div>"
        );
        let window = parse_dashboard_html(html).expect("window");
        assert_eq!(window.remaining_percent, Some(80.0));
        assert_eq!(window.used_percent, None);
    }

    #[test]
    fn test_no_match_yields_nothing() {
        assert!(parse_dashboard_html("<html><body>Settings</body></html>").is_none());
        assert!(parse_dashboard_html("").is_none());
    }
}
