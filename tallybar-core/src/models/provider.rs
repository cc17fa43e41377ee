//! Provider-related types.
//!
//! This module contains types related to the tracked providers:
//! - [`ProviderKind`] - Enum of supported providers
//! - [`ProviderMetadata`] - Display labels, URLs, and accent color
//! - [`ProviderColor`] - RGB accent color

use serde::{Deserialize, Serialize};

// ============================================================================
// Provider Kind
// ============================================================================

/// Supported provider kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    /// OpenAI Codex
    Codex,
    /// Anthropic Claude
    Claude,
    /// GitHub Copilot
    Copilot,
    /// Google Gemini / AI Studio
    Gemini,
    /// Kimi
    Kimi,
}

impl ProviderKind {
    /// Returns the display name for this provider.
    pub fn display_name(&self) -> &'static str {
        match self {
            Self::Codex => "Codex",
            Self::Claude => "Claude",
            Self::Copilot => "Copilot",
            Self::Gemini => "Gemini",
            Self::Kimi => "Kimi",
        }
    }

    /// Returns all available provider kinds.
    pub fn all() -> &'static [ProviderKind] {
        &[
            Self::Codex,
            Self::Claude,
            Self::Copilot,
            Self::Gemini,
            Self::Kimi,
        ]
    }

    /// Returns the short identifier used in storage keys (lowercase, no spaces).
    pub fn key_name(&self) -> &'static str {
        match self {
            Self::Codex => "codex",
            Self::Claude => "claude",
            Self::Copilot => "copilot",
            Self::Gemini => "gemini",
            Self::Kimi => "kimi",
        }
    }
}

// ============================================================================
// Provider Metadata
// ============================================================================

/// Static display metadata for a provider.
///
/// Defined once per provider in the registry; never persisted as mutable
/// state. Ordering preferences are held by the settings store instead.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderMetadata {
    /// Provider identifier.
    pub id: ProviderKind,
    /// Display name.
    pub display_name: String,
    /// Label for the primary quota window (e.g., "5-hour").
    pub primary_label: String,
    /// Label for the secondary quota window (e.g., "Weekly").
    pub secondary_label: String,
    /// Label for the tertiary quota window, if the provider has one.
    pub tertiary_label: Option<String>,
    /// Whether the secondary window is a fixed 7-day cycle eligible for
    /// pacing estimates.
    pub paced_weekly: bool,
    /// URL of the provider's usage dashboard.
    pub dashboard_url: Option<String>,
    /// URL of the provider's help/settings page for connecting an account.
    pub help_url: Option<String>,
    /// Accent color used when rendering this provider's bars.
    pub color: ProviderColor,
}

impl ProviderMetadata {
    /// Creates the metadata for the given provider.
    pub fn for_provider(kind: ProviderKind) -> Self {
        match kind {
            ProviderKind::Codex => Self {
                id: kind,
                display_name: "Codex".to_string(),
                primary_label: "5-hour".to_string(),
                secondary_label: "Weekly".to_string(),
                tertiary_label: Some("Code review".to_string()),
                paced_weekly: true,
                dashboard_url: Some("https://chatgpt.com/codex/settings/usage".to_string()),
                help_url: Some("https://chatgpt.com/codex".to_string()),
                color: ProviderColor::new(0.10, 0.65, 0.55),
            },
            ProviderKind::Claude => Self {
                id: kind,
                display_name: "Claude".to_string(),
                primary_label: "Session".to_string(),
                secondary_label: "Weekly".to_string(),
                tertiary_label: Some("Extra usage".to_string()),
                paced_weekly: false,
                dashboard_url: Some("https://claude.ai/settings/usage".to_string()),
                help_url: Some("https://claude.ai".to_string()),
                color: ProviderColor::new(0.85, 0.45, 0.25),
            },
            ProviderKind::Copilot => Self {
                id: kind,
                display_name: "Copilot".to_string(),
                primary_label: "Premium".to_string(),
                secondary_label: "Chat".to_string(),
                tertiary_label: None,
                paced_weekly: false,
                dashboard_url: Some("https://github.com/settings/copilot".to_string()),
                help_url: Some("https://github.com/settings/tokens".to_string()),
                color: ProviderColor::new(0.35, 0.35, 0.40),
            },
            ProviderKind::Gemini => Self {
                id: kind,
                display_name: "Gemini".to_string(),
                primary_label: "Pro".to_string(),
                secondary_label: "Flash".to_string(),
                tertiary_label: None,
                paced_weekly: false,
                dashboard_url: Some("https://aistudio.google.com".to_string()),
                help_url: Some("https://aistudio.google.com/apikey".to_string()),
                color: ProviderColor::new(0.25, 0.45, 0.95),
            },
            ProviderKind::Kimi => Self {
                id: kind,
                display_name: "Kimi".to_string(),
                primary_label: "Tokens".to_string(),
                secondary_label: "Window".to_string(),
                tertiary_label: None,
                paced_weekly: false,
                dashboard_url: Some("https://kimi.com".to_string()),
                help_url: Some("https://kimi.com".to_string()),
                color: ProviderColor::new(0.20, 0.20, 0.75),
            },
        }
    }

    /// Returns the label for the window at the given slot (0..=2), if any.
    pub fn window_label(&self, slot: usize) -> Option<&str> {
        match slot {
            0 => Some(&self.primary_label),
            1 => Some(&self.secondary_label),
            2 => self.tertiary_label.as_deref(),
            _ => None,
        }
    }
}

// ============================================================================
// Provider Color
// ============================================================================

/// RGB color used for provider accents.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ProviderColor {
    /// Red component (0.0 - 1.0).
    pub red: f32,
    /// Green component (0.0 - 1.0).
    pub green: f32,
    /// Blue component (0.0 - 1.0).
    pub blue: f32,
}

impl ProviderColor {
    /// Creates a new color from components.
    pub const fn new(red: f32, green: f32, blue: f32) -> Self {
        Self { red, green, blue }
    }

    /// Converts to 8-bit RGB.
    pub fn to_rgb8(&self) -> (u8, u8, u8) {
        (
            (self.red.clamp(0.0, 1.0) * 255.0) as u8,
            (self.green.clamp(0.0, 1.0) * 255.0) as u8,
            (self.blue.clamp(0.0, 1.0) * 255.0) as u8,
        )
    }

    /// Converts to a hex string (e.g., "#1AA68C").
    pub fn to_hex(&self) -> String {
        let (r, g, b) = self.to_rgb8();
        format!("#{r:02X}{g:02X}{b:02X}")
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_all_kinds_have_metadata() {
        for kind in ProviderKind::all() {
            let meta = ProviderMetadata::for_provider(*kind);
            assert_eq!(meta.id, *kind);
            assert!(!meta.display_name.is_empty());
            assert!(!meta.primary_label.is_empty());
        }
    }

    #[test]
    fn test_only_codex_is_paced() {
        for kind in ProviderKind::all() {
            let meta = ProviderMetadata::for_provider(*kind);
            assert_eq!(meta.paced_weekly, *kind == ProviderKind::Codex);
        }
    }

    #[test]
    fn test_window_label_slots() {
        let meta = ProviderMetadata::for_provider(ProviderKind::Codex);
        assert_eq!(meta.window_label(0), Some("5-hour"));
        assert_eq!(meta.window_label(2), Some("Code review"));
        assert_eq!(meta.window_label(3), None);

        let meta = ProviderMetadata::for_provider(ProviderKind::Copilot);
        assert_eq!(meta.window_label(2), None);
    }

    #[test]
    fn test_color_to_hex() {
        let color = ProviderColor::new(1.0, 0.0, 0.5);
        assert_eq!(color.to_hex(), "#FF007F");
    }

    #[test]
    fn test_each_provider_has_a_distinct_accent_color() {
        let mut seen = std::collections::HashSet::new();
        for kind in ProviderKind::all() {
            let hex = ProviderMetadata::for_provider(*kind).color.to_hex();
            assert!(seen.insert(hex), "duplicate accent color for {kind:?}");
        }
    }

    #[test]
    fn test_kind_serde_lowercase() {
        let json = serde_json::to_string(&ProviderKind::Claude).unwrap();
        assert_eq!(json, "\"claude\"");
        let kind: ProviderKind = serde_json::from_str("\"gemini\"").unwrap();
        assert_eq!(kind, ProviderKind::Gemini);
    }
}
