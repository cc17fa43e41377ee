//! Widget snapshot sink.
//!
//! The engine publishes the aggregate bundle exactly once per completed
//! refresh-all cycle; the display surface reads it from shared storage.

use async_trait::async_trait;
use std::path::PathBuf;
use tracing::debug;

use tallybar_core::WidgetSnapshot;

use crate::error::StoreError;
use crate::persistence::{default_widget_path, load_json, save_json};

// ============================================================================
// Widget Sink Trait
// ============================================================================

/// Destination for the serialized widget bundle.
#[async_trait]
pub trait WidgetSink: Send + Sync {
    /// Publishes a bundle, replacing the previous one.
    async fn publish(&self, snapshot: &WidgetSnapshot) -> Result<(), StoreError>;
}

// ============================================================================
// File Sink
// ============================================================================

/// File-backed widget sink using the secure persistence helpers.
#[derive(Debug, Clone)]
pub struct FileWidgetSink {
    path: PathBuf,
}

impl FileWidgetSink {
    /// Creates a sink writing to the default widget path.
    pub fn new() -> Self {
        Self {
            path: default_widget_path(),
        }
    }

    /// Creates a sink writing to a specific path.
    pub fn at(path: PathBuf) -> Self {
        Self { path }
    }

    /// Loads the last published bundle, if any.
    pub async fn load_last(&self) -> Option<WidgetSnapshot> {
        load_json(&self.path).await.ok()
    }
}

impl Default for FileWidgetSink {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl WidgetSink for FileWidgetSink {
    async fn publish(&self, snapshot: &WidgetSnapshot) -> Result<(), StoreError> {
        save_json(&self.path, snapshot).await?;
        debug!(
            path = %self.path.display(),
            providers = snapshot.providers.len(),
            "Widget snapshot published"
        );
        Ok(())
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use tallybar_core::{ProviderKind, UsageSnapshot};

    #[tokio::test]
    async fn test_publish_and_reload() {
        let dir = tempfile::tempdir().unwrap();
        let sink = FileWidgetSink::at(dir.path().join("widget.json"));

        assert!(sink.load_last().await.is_none());

        let bundle = WidgetSnapshot::new(vec![UsageSnapshot::new(ProviderKind::Codex)]);
        sink.publish(&bundle).await.unwrap();

        let reloaded = sink.load_last().await.expect("bundle");
        assert_eq!(reloaded.providers.len(), 1);
        assert!(reloaded.get(ProviderKind::Codex).is_some());
    }

    #[tokio::test]
    async fn test_publish_replaces_previous_bundle() {
        let dir = tempfile::tempdir().unwrap();
        let sink = FileWidgetSink::at(dir.path().join("widget.json"));

        sink.publish(&WidgetSnapshot::new(vec![
            UsageSnapshot::new(ProviderKind::Codex),
            UsageSnapshot::new(ProviderKind::Claude),
        ]))
        .await
        .unwrap();
        sink.publish(&WidgetSnapshot::new(vec![UsageSnapshot::new(
            ProviderKind::Kimi,
        )]))
        .await
        .unwrap();

        let reloaded = sink.load_last().await.expect("bundle");
        assert_eq!(reloaded.providers.len(), 1);
        assert!(reloaded.get(ProviderKind::Codex).is_none());
    }
}
