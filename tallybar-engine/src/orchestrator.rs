//! The credential/usage orchestrator.
//!
//! Drives the per-provider state machine `Idle -> Loading -> {Success |
//! Failed}` on demand (no persistent background loop). On each fetch:
//!
//! 1. resolve effective credentials: prefer the in-memory draft over the
//!    persisted record, except when the draft's access token exactly
//!    matches the stored one; then the stored record wins, since it may
//!    carry a refresh token or cookies the draft lacks
//! 2. proactively refresh providers flagged for it, throttled per
//!    access-token generation
//! 3. call the provider client; on `Unauthorized` specifically, refresh
//!    once, persist the merged credentials, and retry exactly once
//! 4. on failure clear the displayed snapshot (stale data is worse than no
//!    data) and record the message; on success store the fresh snapshot

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use futures::future::join_all;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info, instrument, warn};

use tallybar_core::{
    weekly_pacing, Credentials, PacingEstimate, ProviderKind, UsageSnapshot, WidgetSnapshot,
};
use tallybar_fetch::{FetchError, RefreshError};
use tallybar_providers::{
    client_for, refresher_for, OAuthConfig, ProviderRegistry, TokenRefresher, UsageClient,
};
use tallybar_store::{CredentialStore, Settings, StoreError, WidgetSink};

use crate::error::EngineError;

/// Minutes between proactive refreshes of the same access token.
const PROACTIVE_REFRESH_MINUTES: i64 = 50;

// ============================================================================
// Fetch State
// ============================================================================

/// Externally visible per-provider fetch state.
#[derive(Debug, Clone)]
pub enum FetchState {
    /// No fetch has happened yet.
    Idle,
    /// A fetch is in flight.
    Loading,
    /// The last fetch succeeded.
    Success(UsageSnapshot),
    /// The last fetch failed; the message is user-facing.
    Failed(String),
}

// ============================================================================
// Inner State
// ============================================================================

/// Guard recording the last refresh per provider, keyed on the token value
/// it produced. Makes refresh effectively at-most-once per credential
/// generation under the proactive throttle.
struct RefreshGuard {
    access_token: String,
    refreshed_at: DateTime<Utc>,
}

/// All mutable orchestrator state, behind one lock.
#[derive(Default)]
struct OrchestratorState {
    drafts: HashMap<ProviderKind, Credentials>,
    snapshots: HashMap<ProviderKind, UsageSnapshot>,
    errors: HashMap<ProviderKind, String>,
    loading: HashSet<ProviderKind>,
    refresh_guards: HashMap<ProviderKind, RefreshGuard>,
}

// ============================================================================
// Orchestrator
// ============================================================================

/// Owns per-provider fetch state and coordinates clients, refreshers, the
/// credential store, and the widget sink.
pub struct UsageOrchestrator {
    store: Arc<dyn CredentialStore>,
    sink: Option<Arc<dyn WidgetSink>>,
    clients: HashMap<ProviderKind, Arc<dyn UsageClient>>,
    refreshers: HashMap<ProviderKind, Arc<dyn TokenRefresher>>,
    refresh_locks: HashMap<ProviderKind, Mutex<()>>,
    state: RwLock<OrchestratorState>,
}

impl UsageOrchestrator {
    /// Creates an orchestrator with the default provider clients and
    /// refreshers (no OAuth client configuration yet).
    pub fn new(store: Arc<dyn CredentialStore>) -> Self {
        let mut clients = HashMap::new();
        let mut refreshers = HashMap::new();
        let mut refresh_locks = HashMap::new();
        for kind in ProviderKind::all() {
            clients.insert(*kind, client_for(*kind));
            if let Some(refresher) = refresher_for(*kind, None) {
                refreshers.insert(*kind, refresher);
            }
            refresh_locks.insert(*kind, Mutex::new(()));
        }

        Self {
            store,
            sink: None,
            clients,
            refreshers,
            refresh_locks,
            state: RwLock::new(OrchestratorState::default()),
        }
    }

    /// Sets the widget sink invoked after each refresh-all cycle.
    pub fn with_sink(mut self, sink: Arc<dyn WidgetSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    /// Supplies the OAuth client configuration for a provider's refresher.
    pub fn with_oauth_config(mut self, kind: ProviderKind, config: OAuthConfig) -> Self {
        if let Some(refresher) = refresher_for(kind, Some(config)) {
            self.refreshers.insert(kind, refresher);
        }
        self
    }

    /// Replaces a provider client (tests use this to inject fakes).
    pub fn with_client(mut self, client: Arc<dyn UsageClient>) -> Self {
        self.clients.insert(client.kind(), client);
        self
    }

    /// Replaces a provider refresher (tests use this to inject fakes).
    pub fn with_refresher(mut self, refresher: Arc<dyn TokenRefresher>) -> Self {
        self.refreshers.insert(refresher.kind(), refresher);
        self
    }

    // ========================================================================
    // Drafts & Credentials
    // ========================================================================

    /// Stages freshly parsed, unsaved credential input for a provider.
    pub async fn set_draft(&self, kind: ProviderKind, creds: Credentials) {
        self.state.write().await.drafts.insert(kind, creds);
    }

    /// Discards the staged draft for a provider.
    pub async fn clear_draft(&self, kind: ProviderKind) {
        self.state.write().await.drafts.remove(&kind);
    }

    /// Persists credentials for a provider and promotes them over any
    /// draft. The refresh guard resets so the next fetch treats this as a
    /// new token generation.
    pub async fn save_credentials(
        &self,
        kind: ProviderKind,
        creds: &Credentials,
    ) -> Result<(), StoreError> {
        self.store.save(kind, creds)?;
        let mut state = self.state.write().await;
        state.drafts.remove(&kind);
        state.refresh_guards.remove(&kind);
        info!(provider = ?kind, "Credentials saved");
        Ok(())
    }

    /// Disconnects a provider: deletes the stored record and clears all
    /// in-memory state for it.
    pub async fn disconnect(&self, kind: ProviderKind) -> Result<(), StoreError> {
        self.store.delete(kind)?;
        let mut state = self.state.write().await;
        state.drafts.remove(&kind);
        state.snapshots.remove(&kind);
        state.errors.remove(&kind);
        state.refresh_guards.remove(&kind);
        info!(provider = ?kind, "Provider disconnected");
        Ok(())
    }

    /// Resolves the effective credentials for a fetch.
    async fn resolve_credentials(&self, kind: ProviderKind) -> Option<Credentials> {
        let persisted = self.store.load(kind).filter(Credentials::is_usable);
        let draft = self.state.read().await.drafts.get(&kind).cloned();

        match (draft, persisted) {
            // A re-pasted token identical to the saved one: the saved
            // record wins, it may carry refresh/cookie fields the draft
            // lacks.
            (Some(draft), Some(saved))
                if !draft.access_token.trim().is_empty()
                    && draft.access_token == saved.access_token =>
            {
                Some(saved)
            }
            (Some(draft), saved) => {
                if draft.is_usable() {
                    Some(draft)
                } else {
                    saved
                }
            }
            (None, saved) => saved,
        }
    }

    // ========================================================================
    // State Access
    // ========================================================================

    /// Returns the externally visible fetch state for a provider.
    pub async fn fetch_state(&self, kind: ProviderKind) -> FetchState {
        let state = self.state.read().await;
        if state.loading.contains(&kind) {
            return FetchState::Loading;
        }
        if let Some(snapshot) = state.snapshots.get(&kind) {
            return FetchState::Success(snapshot.clone());
        }
        if let Some(message) = state.errors.get(&kind) {
            return FetchState::Failed(message.clone());
        }
        FetchState::Idle
    }

    /// Returns the latest snapshot for a provider, if any.
    pub async fn snapshot(&self, kind: ProviderKind) -> Option<UsageSnapshot> {
        self.state.read().await.snapshots.get(&kind).cloned()
    }

    /// Returns the recorded error message for a provider, if any.
    pub async fn error(&self, kind: ProviderKind) -> Option<String> {
        self.state.read().await.errors.get(&kind).cloned()
    }

    /// Derives the pacing estimate for a provider whose secondary window
    /// runs on a fixed 7-day cycle. `None` for unpaced providers, missing
    /// snapshots, or consumption close to the linear baseline.
    pub async fn pacing_estimate(&self, kind: ProviderKind) -> Option<PacingEstimate> {
        let descriptor = ProviderRegistry::get(kind)?;
        if !descriptor.metadata.paced_weekly {
            return None;
        }
        let snapshot = self.snapshot(kind).await?;
        weekly_pacing(snapshot.secondary.as_ref()?, Utc::now())
    }

    // ========================================================================
    // Fetch Flow
    // ========================================================================

    /// Fetches usage for one provider, refreshing credentials as needed,
    /// and records the outcome in the per-provider state.
    #[instrument(skip(self))]
    pub async fn fetch(&self, kind: ProviderKind) -> Result<UsageSnapshot, EngineError> {
        self.state.write().await.loading.insert(kind);
        let result = self.fetch_inner(kind).await;

        let mut state = self.state.write().await;
        state.loading.remove(&kind);
        match &result {
            Ok(snapshot) => {
                state.snapshots.insert(kind, snapshot.clone());
                state.errors.remove(&kind);
            }
            Err(err) => {
                // Never show stale data next to a fresh error.
                state.snapshots.remove(&kind);
                state.errors.insert(kind, err.to_string());
            }
        }
        result
    }

    async fn fetch_inner(&self, kind: ProviderKind) -> Result<UsageSnapshot, EngineError> {
        let mut creds = self
            .resolve_credentials(kind)
            .await
            .ok_or(FetchError::MissingToken)?;

        let proactive = ProviderRegistry::get(kind).is_some_and(|d| d.proactive_refresh);
        if proactive {
            creds = self.proactive_refresh(kind, creds).await?;
        }

        let client = self.clients.get(&kind).ok_or_else(|| {
            FetchError::NotSupported(format!(
                "No client registered for {}",
                kind.display_name()
            ))
        })?;

        match client.fetch_usage(&creds).await {
            Ok(snapshot) => Ok(snapshot),
            Err(FetchError::Unauthorized) => self.reactive_retry(kind, &creds).await,
            Err(err) => Err(err.into()),
        }
    }

    /// Exactly-once retry path for authorization failures.
    async fn reactive_retry(
        &self,
        kind: ProviderKind,
        creds: &Credentials,
    ) -> Result<UsageSnapshot, EngineError> {
        if !has_refresh_token(creds) || !self.refreshers.contains_key(&kind) {
            return Err(FetchError::Unauthorized.into());
        }

        info!(provider = ?kind, "Authorization rejected; refreshing and retrying once");
        let refreshed = match self.locked_refresh(kind, creds, false).await {
            Ok(Some(merged)) => merged,
            Ok(None) => return Err(FetchError::Unauthorized.into()),
            Err(err) => return Err(err.into()),
        };

        let client = self
            .clients
            .get(&kind)
            .ok_or(FetchError::Unauthorized)?;
        // A second failure surfaces as-is; there is no further retry loop.
        client
            .fetch_usage(&refreshed)
            .await
            .map_err(EngineError::from)
    }

    /// Throttled refresh-before-fetch for providers flagged for it.
    ///
    /// Failures other than revocation are swallowed: the stale token goes
    /// out and the reactive path picks up the pieces. Revocation needs the
    /// user, so it propagates.
    async fn proactive_refresh(
        &self,
        kind: ProviderKind,
        creds: Credentials,
    ) -> Result<Credentials, EngineError> {
        if creds.access_token.trim().is_empty() || !has_refresh_token(&creds) {
            return Ok(creds);
        }
        if !self.refresh_due(kind, &creds).await {
            return Ok(creds);
        }

        match self.locked_refresh(kind, &creds, true).await {
            Ok(Some(merged)) => Ok(merged),
            Ok(None) => Ok(creds),
            Err(err) if err.requires_reauth() => Err(err.into()),
            Err(err) => {
                debug!(provider = ?kind, error = %err, "Proactive refresh failed; continuing");
                Ok(creds)
            }
        }
    }

    /// Returns true when the guard allows a proactive refresh: no refresh
    /// yet for this token value, the token changed, or the throttle window
    /// has elapsed.
    async fn refresh_due(&self, kind: ProviderKind, creds: &Credentials) -> bool {
        let state = self.state.read().await;
        match state.refresh_guards.get(&kind) {
            None => true,
            Some(guard) => {
                guard.access_token != creds.access_token
                    || Utc::now() - guard.refreshed_at
                        >= Duration::minutes(PROACTIVE_REFRESH_MINUTES)
            }
        }
    }

    /// Runs a refresh under the per-provider lock, persists the merged
    /// record, and updates the in-memory mirrors.
    ///
    /// The lock serializes the read-refresh-write sequence so concurrent
    /// proactive and reactive refreshes cannot both fire for the same
    /// provider. With `only_if_due`, due-ness is re-checked after the lock
    /// is acquired; `Ok(None)` means another caller already refreshed.
    async fn locked_refresh(
        &self,
        kind: ProviderKind,
        creds: &Credentials,
        only_if_due: bool,
    ) -> Result<Option<Credentials>, RefreshError> {
        let Some(refresher) = self.refreshers.get(&kind).cloned() else {
            return Ok(None);
        };
        let Some(lock) = self.refresh_locks.get(&kind) else {
            return Ok(None);
        };
        let _held = lock.lock().await;

        if only_if_due && !self.refresh_due(kind, creds).await {
            return Ok(None);
        }

        let refreshed = refresher.refresh(creds).await?;

        // Merge against the persisted record so fields the resolved copy
        // lacks (cookies, auxiliary headers) survive the write.
        let base = self.store.load(kind).unwrap_or_else(|| creds.clone());
        let merged = base.merge_refreshed(&refreshed);
        if let Err(err) = self.store.save(kind, &merged) {
            warn!(provider = ?kind, error = %err, "Failed to persist refreshed credentials");
        }

        let mut state = self.state.write().await;
        state.refresh_guards.insert(
            kind,
            RefreshGuard {
                access_token: merged.access_token.clone(),
                refreshed_at: Utc::now(),
            },
        );
        if let Some(draft) = state.drafts.get_mut(&kind) {
            draft.access_token = merged.access_token.clone();
            if merged.refresh_token.is_some() {
                draft.refresh_token = merged.refresh_token.clone();
            }
        }

        debug!(provider = ?kind, "Credentials refreshed and persisted");
        Ok(Some(merged))
    }

    // ========================================================================
    // Batch Refresh
    // ========================================================================

    /// Refreshes every visible provider with usable credentials
    /// concurrently, waits for all of them to settle, then publishes the
    /// aggregate bundle to the sink exactly once.
    #[instrument(skip(self, settings))]
    pub async fn refresh_all(&self, settings: &Settings) -> WidgetSnapshot {
        let mut eligible = Vec::new();
        for kind in settings.visible_providers() {
            if self.resolve_credentials(kind).await.is_some() {
                eligible.push(kind);
            }
        }
        debug!(count = eligible.len(), "Refreshing eligible providers");

        // Independent units of work: any subset may fail without
        // affecting the others, and the batch always runs to completion.
        let results = join_all(eligible.iter().map(|kind| self.fetch(*kind))).await;
        for (kind, result) in eligible.iter().zip(&results) {
            if let Err(err) = result {
                warn!(provider = ?kind, error = %err, "Provider refresh failed");
            }
        }

        let bundle = self.current_bundle(settings).await;
        if let Some(sink) = &self.sink {
            if let Err(err) = sink.publish(&bundle).await {
                warn!(error = %err, "Failed to publish widget snapshot");
            }
        }
        bundle
    }

    /// Builds the aggregate bundle from the current snapshots, in display
    /// order.
    pub async fn current_bundle(&self, settings: &Settings) -> WidgetSnapshot {
        let state = self.state.read().await;
        let providers = settings
            .visible_providers()
            .into_iter()
            .filter_map(|kind| state.snapshots.get(&kind).cloned())
            .collect();
        WidgetSnapshot::new(providers)
    }
}

/// Returns true when the record carries a non-empty refresh token.
fn has_refresh_token(creds: &Credentials) -> bool {
    creds
        .refresh_token
        .as_deref()
        .is_some_and(|t| !t.trim().is_empty())
}

// ============================================================================
// Tests
// ============================================================================
