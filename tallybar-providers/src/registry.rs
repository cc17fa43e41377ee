//! Provider registry for all descriptors.
//!
//! The registry is initialized lazily on first access and provides
//! thread-safe static access to provider configurations.

use std::sync::OnceLock;

use tallybar_core::ProviderKind;

use crate::descriptor::ProviderDescriptor;

/// Static storage for all provider descriptors.
static DESCRIPTORS: OnceLock<Vec<ProviderDescriptor>> = OnceLock::new();

/// Initializes all provider descriptors in default display order.
fn init_descriptors() -> Vec<ProviderDescriptor> {
    ProviderKind::all()
        .iter()
        .map(|kind| ProviderDescriptor::for_kind(*kind))
        .collect()
}

/// Global registry of provider descriptors.
pub struct ProviderRegistry;

impl ProviderRegistry {
    /// Returns all provider descriptors.
    pub fn all() -> &'static [ProviderDescriptor] {
        DESCRIPTORS.get_or_init(init_descriptors)
    }

    /// Gets a descriptor by provider kind.
    pub fn get(id: ProviderKind) -> Option<&'static ProviderDescriptor> {
        Self::all().iter().find(|d| d.id == id)
    }

    /// Returns all provider kinds in default display order.
    pub fn kinds() -> Vec<ProviderKind> {
        Self::all().iter().map(|d| d.id).collect()
    }

    /// Returns the kinds whose providers support OAuth refresh.
    pub fn refreshable_kinds() -> Vec<ProviderKind> {
        Self::all()
            .iter()
            .filter(|d| d.supports_refresh)
            .map(|d| d.id)
            .collect()
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_registry_has_all_providers() {
        assert_eq!(ProviderRegistry::all().len(), ProviderKind::all().len());
        for kind in ProviderKind::all() {
            let desc = ProviderRegistry::get(*kind).expect("descriptor");
            assert_eq!(desc.id, *kind);
        }
    }

    #[test]
    fn test_refreshable_kinds() {
        let kinds = ProviderRegistry::refreshable_kinds();
        assert_eq!(kinds, vec![ProviderKind::Codex, ProviderKind::Gemini]);
    }
}
