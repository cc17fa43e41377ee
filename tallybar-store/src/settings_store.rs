//! Provider ordering and visibility preferences.
//!
//! The engine consumes these read-only when deciding refresh-all scope;
//! order affects iteration and display, never fetch correctness.

use std::collections::HashSet;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use tracing::info;

use tallybar_core::ProviderKind;

use crate::error::StoreError;
use crate::persistence::{default_settings_path, load_json_or_default, save_json};

// ============================================================================
// Settings
// ============================================================================

/// Persisted user preferences.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    /// Provider display order. Providers absent from the list follow in
    /// default order.
    #[serde(default)]
    pub provider_order: Vec<ProviderKind>,
    /// Providers hidden from display and excluded from refresh-all.
    #[serde(default)]
    pub hidden_providers: HashSet<ProviderKind>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            provider_order: ProviderKind::all().to_vec(),
            hidden_providers: HashSet::new(),
        }
    }
}

impl Settings {
    /// Returns every provider in preference order, appending kinds the
    /// stored order predates.
    pub fn ordered_providers(&self) -> Vec<ProviderKind> {
        let mut ordered: Vec<ProviderKind> = self
            .provider_order
            .iter()
            .copied()
            .filter(|k| ProviderKind::all().contains(k))
            .collect();
        for kind in ProviderKind::all() {
            if !ordered.contains(kind) {
                ordered.push(*kind);
            }
        }
        ordered
    }

    /// Returns visible providers in preference order.
    pub fn visible_providers(&self) -> Vec<ProviderKind> {
        self.ordered_providers()
            .into_iter()
            .filter(|k| !self.hidden_providers.contains(k))
            .collect()
    }

    /// Returns true when the provider is visible.
    pub fn is_visible(&self, kind: ProviderKind) -> bool {
        !self.hidden_providers.contains(&kind)
    }
}

// ============================================================================
// Settings Store
// ============================================================================

/// File-backed settings store.
#[derive(Debug)]
pub struct SettingsStore {
    path: PathBuf,
    settings: Settings,
}

impl SettingsStore {
    /// Loads settings from the default path.
    pub async fn load_default() -> Self {
        Self::load_from(default_settings_path()).await
    }

    /// Loads settings from a specific path.
    pub async fn load_from(path: PathBuf) -> Self {
        let settings = load_json_or_default(&path).await;
        Self { path, settings }
    }

    /// Returns the current settings.
    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Replaces and persists the settings.
    pub async fn update(&mut self, settings: Settings) -> Result<(), StoreError> {
        self.settings = settings;
        save_json(&self.path, &self.settings).await?;
        info!(path = %self.path.display(), "Settings saved");
        Ok(())
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_order_covers_all_providers() {
        let settings = Settings::default();
        assert_eq!(settings.ordered_providers(), ProviderKind::all().to_vec());
        assert_eq!(settings.visible_providers(), ProviderKind::all().to_vec());
    }

    #[test]
    fn test_partial_order_appends_missing_kinds() {
        let settings = Settings {
            provider_order: vec![ProviderKind::Kimi, ProviderKind::Claude],
            hidden_providers: HashSet::new(),
        };
        let ordered = settings.ordered_providers();
        assert_eq!(ordered[0], ProviderKind::Kimi);
        assert_eq!(ordered[1], ProviderKind::Claude);
        assert_eq!(ordered.len(), ProviderKind::all().len());
    }

    #[test]
    fn test_hidden_providers_are_filtered() {
        let mut hidden = HashSet::new();
        hidden.insert(ProviderKind::Copilot);
        let settings = Settings {
            provider_order: ProviderKind::all().to_vec(),
            hidden_providers: hidden,
        };
        assert!(!settings.is_visible(ProviderKind::Copilot));
        assert!(!settings
            .visible_providers()
            .contains(&ProviderKind::Copilot));
    }

    #[tokio::test]
    async fn test_store_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");

        let mut store = SettingsStore::load_from(path.clone()).await;
        let mut settings = Settings::default();
        settings.hidden_providers.insert(ProviderKind::Kimi);
        store.update(settings).await.unwrap();

        let reloaded = SettingsStore::load_from(path).await;
        assert!(!reloaded.settings().is_visible(ProviderKind::Kimi));
    }
}
