//! Shared client traits and the provider factory.
//!
//! The orchestrator never talks to a concrete provider type: it resolves a
//! [`UsageClient`] (and optionally a [`TokenRefresher`]) through the factory
//! functions here and dispatches through the trait. Tests substitute fakes
//! behind the same traits.

use async_trait::async_trait;
use std::sync::Arc;

use tallybar_core::{Credentials, ProviderKind, UsageSnapshot};
use tallybar_fetch::{FetchError, RefreshError};

// ============================================================================
// Traits
// ============================================================================

/// One provider's usage-fetching implementation.
///
/// Implementations authenticate with their provider's scheme, call the
/// usage endpoints (with provider-specific fallback chains), and normalize
/// the result. They must not retry on authorization failure; that is the
/// orchestrator's job.
#[async_trait]
pub trait UsageClient: Send + Sync {
    /// The provider this client serves.
    fn kind(&self) -> ProviderKind;

    /// Fetches and normalizes current usage for the given credentials.
    async fn fetch_usage(&self, creds: &Credentials) -> Result<UsageSnapshot, FetchError>;
}

/// OAuth token refresh for providers that support it.
#[async_trait]
pub trait TokenRefresher: Send + Sync {
    /// The provider this refresher serves.
    fn kind(&self) -> ProviderKind;

    /// Exchanges the refresh token for a new access token, returning the
    /// full credential record with refreshed fields merged in. Fields the
    /// refresh did not produce (cookies, auxiliary headers) are preserved.
    async fn refresh(&self, creds: &Credentials) -> Result<Credentials, RefreshError>;
}

// ============================================================================
// OAuth Client Configuration
// ============================================================================

/// OAuth client id/secret supplied by the embedding application.
///
/// Treated as opaque strings. When absent, refresh calls that require it
/// fail with a clear error instead of panicking.
#[derive(Debug, Clone)]
pub struct OAuthConfig {
    /// OAuth client id.
    pub client_id: String,
    /// OAuth client secret, for issuers that require one.
    pub client_secret: Option<String>,
}

impl OAuthConfig {
    /// Creates a config with only a client id.
    pub fn new(client_id: impl Into<String>) -> Self {
        Self {
            client_id: client_id.into(),
            client_secret: None,
        }
    }

    /// Sets the client secret.
    pub fn with_secret(mut self, secret: impl Into<String>) -> Self {
        self.client_secret = Some(secret.into());
        self
    }
}

// ============================================================================
// Factory
// ============================================================================

/// Returns the usage client for a provider.
pub fn client_for(kind: ProviderKind) -> Arc<dyn UsageClient> {
    match kind {
        ProviderKind::Codex => Arc::new(crate::codex::CodexClient::new()),
        ProviderKind::Claude => Arc::new(crate::claude::ClaudeClient::new()),
        ProviderKind::Copilot => Arc::new(crate::copilot::CopilotClient::new()),
        ProviderKind::Gemini => Arc::new(crate::gemini::GeminiClient::new()),
        ProviderKind::Kimi => Arc::new(crate::kimi::KimiClient::new()),
    }
}

/// Returns the token refresher for a provider, if it supports refresh.
///
/// The OAuth config may be absent; the refresher then fails gracefully when
/// invoked.
pub fn refresher_for(
    kind: ProviderKind,
    oauth: Option<OAuthConfig>,
) -> Option<Arc<dyn TokenRefresher>> {
    match kind {
        ProviderKind::Codex => Some(Arc::new(crate::codex::CodexRefresher::new(oauth))),
        ProviderKind::Gemini => Some(Arc::new(crate::gemini::GeminiRefresher::new(oauth))),
        _ => None,
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_factory_covers_all_kinds() {
        for kind in ProviderKind::all() {
            let client = client_for(*kind);
            assert_eq!(client.kind(), *kind);
        }
    }

    #[test]
    fn test_refreshers_exist_for_oauth_providers_only() {
        assert!(refresher_for(ProviderKind::Codex, None).is_some());
        assert!(refresher_for(ProviderKind::Gemini, None).is_some());
        assert!(refresher_for(ProviderKind::Claude, None).is_none());
        assert!(refresher_for(ProviderKind::Copilot, None).is_none());
        assert!(refresher_for(ProviderKind::Kimi, None).is_none());
    }
}
