//! Pacing estimator for weekly quota windows.
//!
//! Derives an expected-vs-actual consumption deficit for a fixed 7-day
//! window, plus an extrapolated exhaustion time when the observed burn rate
//! would empty the quota before the window resets. Pure function of a
//! snapshot window and the current time; recomputed on each render, never
//! stored.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use super::usage::UsageWindow;

/// Length of the paced window, in seconds.
const WINDOW_SECS: i64 = 7 * 24 * 60 * 60;

/// Length of the paced window.
fn window_duration() -> Duration {
    Duration::seconds(WINDOW_SECS)
}

/// Minimum elapsed fraction before an estimate is meaningful.
const MIN_ELAPSED_FRACTION: f64 = 0.03;

/// Minimum percentage-point deficit before reporting anything; filters out
/// noise near the linear baseline.
const MIN_DEFICIT_POINTS: f64 = 2.0;

// ============================================================================
// Pacing Estimate
// ============================================================================

/// A burn-rate estimate for a weekly quota window.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PacingEstimate {
    /// Remaining percentage a perfectly linear consumer would have now.
    pub expected_remaining_percent: f64,
    /// How many percentage points ahead of linear pace the account is.
    pub deficit_percent: f64,
    /// Projected exhaustion time, when it lands before the window reset.
    pub runs_out_at: Option<DateTime<Utc>>,
}

/// Computes a pacing estimate for a 7-day quota window.
///
/// Returns `None` when there is no signal worth showing:
/// - the reset time is missing, already past, or further than 7 days out
/// - less than 3% of the window has elapsed
/// - the window carries no usage figure
/// - actual usage does not exceed the linear expectation by more than 2
///   percentage points
pub fn weekly_pacing(window: &UsageWindow, now: DateTime<Utc>) -> Option<PacingEstimate> {
    let resets_at = window.resets_at?;
    let remaining_time = resets_at - now;
    if remaining_time <= Duration::zero() || remaining_time > window_duration() {
        return None;
    }

    let elapsed = window_duration() - remaining_time;
    let elapsed_secs = elapsed.num_milliseconds() as f64 / 1000.0;
    let elapsed_fraction = elapsed_secs / WINDOW_SECS as f64;
    if elapsed_fraction < MIN_ELAPSED_FRACTION {
        return None;
    }

    let actual_used = window.resolved_used()?;
    let expected_used = elapsed_fraction * 100.0;
    let deficit = actual_used - expected_used;
    if deficit <= MIN_DEFICIT_POINTS {
        return None;
    }

    // Burn rate observed so far, in percentage points per second. Project
    // when it crosses 100% from the window start; keep the projection only
    // if it beats the scheduled reset.
    let runs_out_at = if actual_used > 0.0 {
        let rate = actual_used / elapsed_secs;
        let secs_to_exhaustion = 100.0 / rate;
        let window_start = resets_at - window_duration();
        let projected =
            window_start + Duration::milliseconds((secs_to_exhaustion * 1000.0) as i64);
        (projected < resets_at).then_some(projected)
    } else {
        None
    };

    Some(PacingEstimate {
        expected_remaining_percent: 100.0 - expected_used,
        deficit_percent: deficit,
        runs_out_at,
    })
}

// ============================================================================
// Tests
// ============================================================================
