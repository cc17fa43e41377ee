//! Usage-related types.
//!
//! This module contains the normalized usage model:
//! - [`UsageSnapshot`] - Point-in-time usage for one provider
//! - [`UsageWindow`] - Individual quota window

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use super::provider::ProviderKind;

/// Clamp range applied to normal providers.
const PERCENT_RANGE: (f64, f64) = (0.0, 100.0);

/// Widened clamp range for providers that display a deficit beyond quota.
const DEFICIT_RANGE: (f64, f64) = (-200.0, 200.0);

// ============================================================================
// Usage Window
// ============================================================================

/// One quota window (session, weekly, or tertiary).
///
/// A window is "applicable" when it carries either a used or a remaining
/// percentage. Both absent means the provider/account does not expose this
/// window; it must be omitted from rendering, never shown as zero.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UsageWindow {
    /// Percentage of quota used.
    pub used_percent: Option<f64>,
    /// Explicit remaining percentage, overriding the 100-minus-used
    /// derivation when present.
    pub remaining_percent: Option<f64>,
    /// When this window resets.
    pub resets_at: Option<DateTime<Utc>>,
    /// Projected exhaustion time, where a burn-rate estimate exists.
    pub runs_out_at: Option<DateTime<Utc>>,
}

impl UsageWindow {
    /// Creates a window from a used percentage, clamped to [0, 100].
    pub fn from_used(used_percent: f64) -> Self {
        Self {
            used_percent: clamp_percent(used_percent, PERCENT_RANGE),
            ..Self::default()
        }
    }

    /// Creates a window from a remaining percentage, clamped to [0, 100].
    pub fn from_remaining(remaining_percent: f64) -> Self {
        Self {
            remaining_percent: clamp_percent(remaining_percent, PERCENT_RANGE),
            ..Self::default()
        }
    }

    /// Creates a window from whichever percentages the provider reported,
    /// each clamped to [0, 100].
    pub fn clamped(used_percent: Option<f64>, remaining_percent: Option<f64>) -> Self {
        Self {
            used_percent: used_percent.and_then(|p| clamp_percent(p, PERCENT_RANGE)),
            remaining_percent: remaining_percent.and_then(|p| clamp_percent(p, PERCENT_RANGE)),
            ..Self::default()
        }
    }

    /// Creates a window allowed to exceed 100% (deficit display), clamped
    /// to [-200, 200].
    pub fn deficit(used_percent: Option<f64>, remaining_percent: Option<f64>) -> Self {
        Self {
            used_percent: used_percent.and_then(|p| clamp_percent(p, DEFICIT_RANGE)),
            remaining_percent: remaining_percent.and_then(|p| clamp_percent(p, DEFICIT_RANGE)),
            ..Self::default()
        }
    }

    /// Sets the reset time.
    pub fn with_resets_at(mut self, resets_at: DateTime<Utc>) -> Self {
        self.resets_at = Some(resets_at);
        self
    }

    /// Returns true if this window carries any percentage data.
    pub fn is_applicable(&self) -> bool {
        self.used_percent.is_some() || self.remaining_percent.is_some()
    }

    /// Resolves the remaining percentage: the explicit value when present,
    /// else `100 - used`. `None` when the window is not applicable.
    pub fn resolved_remaining(&self) -> Option<f64> {
        self.remaining_percent
            .or_else(|| self.used_percent.map(|u| 100.0 - u))
    }

    /// Resolves the used percentage: the explicit value when present, else
    /// `100 - remaining`. `None` when the window is not applicable.
    pub fn resolved_used(&self) -> Option<f64> {
        self.used_percent
            .or_else(|| self.remaining_percent.map(|r| 100.0 - r))
    }

    /// Returns true if usage is at or over the limit.
    pub fn is_exhausted(&self) -> bool {
        self.resolved_used().is_some_and(|u| u >= 100.0)
    }

    /// Returns time until reset, if a reset time is known.
    pub fn time_until_reset(&self, now: DateTime<Utc>) -> Option<Duration> {
        self.resets_at.map(|reset| reset - now)
    }
}

/// Clamps a percentage into the given range, dropping non-finite values.
fn clamp_percent(value: f64, range: (f64, f64)) -> Option<f64> {
    if value.is_finite() {
        Some(value.clamp(range.0, range.1))
    } else {
        None
    }
}

// ============================================================================
// Usage Snapshot
// ============================================================================

/// A normalized snapshot of usage data for one provider.
///
/// Created fresh on every successful fetch and never mutated in place;
/// superseded snapshots are discarded (no history retained).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UsageSnapshot {
    /// The provider this snapshot describes.
    pub provider: ProviderKind,
    /// Primary quota window (session-based).
    pub primary: Option<UsageWindow>,
    /// Secondary quota window (weekly or a second category).
    pub secondary: Option<UsageWindow>,
    /// Tertiary quota window, for providers that expose one.
    pub tertiary: Option<UsageWindow>,
    /// Human-readable status line (plan name, account hint).
    pub status_text: String,
    /// When this snapshot was captured.
    pub updated_at: DateTime<Utc>,
}

impl UsageSnapshot {
    /// Creates a new empty snapshot for a provider.
    pub fn new(provider: ProviderKind) -> Self {
        Self {
            provider,
            primary: None,
            secondary: None,
            tertiary: None,
            status_text: String::new(),
            updated_at: Utc::now(),
        }
    }

    /// Builder: sets the primary window, dropping non-applicable ones.
    pub fn with_primary(mut self, window: UsageWindow) -> Self {
        self.primary = Some(window).filter(UsageWindow::is_applicable);
        self
    }

    /// Builder: sets the secondary window, dropping non-applicable ones.
    pub fn with_secondary(mut self, window: UsageWindow) -> Self {
        self.secondary = Some(window).filter(UsageWindow::is_applicable);
        self
    }

    /// Builder: sets the tertiary window, dropping non-applicable ones.
    pub fn with_tertiary(mut self, window: UsageWindow) -> Self {
        self.tertiary = Some(window).filter(UsageWindow::is_applicable);
        self
    }

    /// Builder: sets the status text.
    pub fn with_status_text(mut self, text: impl Into<String>) -> Self {
        self.status_text = text.into();
        self
    }

    /// Returns true if any window data is present.
    pub fn has_data(&self) -> bool {
        self.primary.is_some() || self.secondary.is_some() || self.tertiary.is_some()
    }

    /// Returns the highest resolved usage across all windows.
    pub fn max_used_percent(&self) -> Option<f64> {
        [&self.primary, &self.secondary, &self.tertiary]
            .into_iter()
            .flatten()
            .filter_map(UsageWindow::resolved_used)
            .fold(None, |max, u| Some(max.map_or(u, |m: f64| m.max(u))))
    }

    /// Returns true if this snapshot is older than the given threshold.
    pub fn is_stale(&self, threshold: Duration) -> bool {
        Utc::now() - self.updated_at > threshold
    }
}

// ============================================================================
// Tests
// ============================================================================
