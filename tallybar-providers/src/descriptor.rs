//! Provider descriptor system.
//!
//! A descriptor bundles the static configuration for one provider: the
//! display metadata (name, window labels, accent color, URLs) and the
//! capability flags the engine consults when wiring clients and
//! refreshers.

use tallybar_core::{ProviderKind, ProviderMetadata};

/// Complete static descriptor for a provider.
#[derive(Debug, Clone)]
pub struct ProviderDescriptor {
    /// Provider identifier.
    pub id: ProviderKind,
    /// Display metadata.
    pub metadata: ProviderMetadata,
    /// Whether this provider has an OAuth token refresher.
    pub supports_refresh: bool,
    /// Whether the orchestrator proactively refreshes before fetching.
    pub proactive_refresh: bool,
}

impl ProviderDescriptor {
    /// Creates the descriptor for the given provider.
    pub fn for_kind(id: ProviderKind) -> Self {
        let (supports_refresh, proactive_refresh) = match id {
            ProviderKind::Codex => (true, false),
            ProviderKind::Gemini => (true, true),
            _ => (false, false),
        };

        Self {
            id,
            metadata: ProviderMetadata::for_provider(id),
            supports_refresh,
            proactive_refresh,
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_refresh_flags() {
        let codex = ProviderDescriptor::for_kind(ProviderKind::Codex);
        assert!(codex.supports_refresh);
        assert!(!codex.proactive_refresh);

        let gemini = ProviderDescriptor::for_kind(ProviderKind::Gemini);
        assert!(gemini.supports_refresh);
        assert!(gemini.proactive_refresh);

        let kimi = ProviderDescriptor::for_kind(ProviderKind::Kimi);
        assert!(!kimi.supports_refresh);
    }

    #[test]
    fn test_metadata_matches_kind() {
        for kind in ProviderKind::all() {
            let descriptor = ProviderDescriptor::for_kind(*kind);
            assert_eq!(descriptor.metadata.id, *kind);
            assert_eq!(descriptor.metadata.display_name, kind.display_name());
        }
    }
}
