//! Timeout-bound background refresh.
//!
//! The passive display surface refreshes through a constrained path: a
//! reduced credential record per provider (no refresh tokens), a hard
//! per-provider timeout, and previously-known-good data as the fallback.
//! Each fetch races a timer; the losing fetch task is actively aborted so
//! a stuck provider never stalls its siblings or leaves work in flight.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use tracing::{debug, instrument, warn};

use tallybar_core::{
    Credentials, ProviderKind, RefreshCredentialsPayload, UsageSnapshot, WidgetSnapshot,
};
use tallybar_providers::{client_for, UsageClient};

/// Hard per-provider timeout for the background path.
const BACKGROUND_TIMEOUT: Duration = Duration::from_secs(8);

// ============================================================================
// Background Refresher
// ============================================================================

/// Best-effort refresher feeding the passive display surface.
pub struct BackgroundRefresher {
    clients: HashMap<ProviderKind, Arc<dyn UsageClient>>,
    timeout: Duration,
}

impl BackgroundRefresher {
    /// Creates a refresher with the default provider clients.
    pub fn new() -> Self {
        let clients = ProviderKind::all()
            .iter()
            .map(|kind| (*kind, client_for(*kind)))
            .collect();
        Self {
            clients,
            timeout: BACKGROUND_TIMEOUT,
        }
    }

    /// Replaces a provider client (tests use this to inject fakes).
    pub fn with_client(mut self, client: Arc<dyn UsageClient>) -> Self {
        self.clients.insert(client.kind(), client);
        self
    }

    /// Overrides the per-provider timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Refreshes every provider in the payload, falling back to the prior
    /// bundle's data where the fetch fails or the timer wins.
    ///
    /// An empty payload is a no-op returning the prior bundle unchanged.
    #[instrument(skip(self, payload, prior))]
    pub async fn refresh(
        &self,
        payload: &RefreshCredentialsPayload,
        prior: Option<WidgetSnapshot>,
    ) -> WidgetSnapshot {
        if payload.is_empty() {
            debug!("Empty background credential feed; keeping prior snapshot");
            return prior.unwrap_or_else(|| WidgetSnapshot::new(Vec::new()));
        }

        let tasks = payload.providers.iter().filter_map(|(kind, bg)| {
            if !bg.is_usable() {
                return None;
            }
            let client = self.clients.get(kind)?.clone();
            let creds = Credentials {
                access_token: bg.access_token.clone(),
                refresh_token: None,
                account_id: bg.account_id.clone(),
                cookie_header: bg.cookie_header.clone(),
                aux_authorization: bg.aux_authorization.clone(),
                aux_api_key: bg.aux_api_key.clone(),
            };
            let timeout = self.timeout;
            let kind = *kind;
            Some(async move {
                (kind, fetch_with_deadline(client, creds, timeout).await)
            })
        });

        let results: HashMap<ProviderKind, Option<UsageSnapshot>> =
            join_all(tasks).await.into_iter().collect();

        // Fresh data where we got it, prior data where we did not.
        let providers = ProviderKind::all()
            .iter()
            .filter_map(|kind| {
                results
                    .get(kind)
                    .and_then(|result| result.clone())
                    .or_else(|| prior.as_ref().and_then(|p| p.get(*kind).cloned()))
            })
            .collect();

        WidgetSnapshot::new(providers)
    }
}

impl Default for BackgroundRefresher {
    fn default() -> Self {
        Self::new()
    }
}

/// Races one fetch against the timer, aborting the loser.
async fn fetch_with_deadline(
    client: Arc<dyn UsageClient>,
    creds: Credentials,
    timeout: Duration,
) -> Option<UsageSnapshot> {
    let kind = client.kind();
    let mut handle = tokio::spawn(async move { client.fetch_usage(&creds).await });

    tokio::select! {
        result = &mut handle => match result {
            Ok(Ok(snapshot)) => Some(snapshot),
            Ok(Err(err)) => {
                debug!(provider = ?kind, error = %err, "Background fetch failed");
                None
            }
            Err(err) => {
                warn!(provider = ?kind, error = %err, "Background fetch task died");
                None
            }
        },
        () = tokio::time::sleep(timeout) => {
            // Cancel the in-flight request, not just the result.
            handle.abort();
            debug!(provider = ?kind, "Background fetch timed out");
            None
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tallybar_core::{BackgroundCredentials, UsageWindow};
    use tallybar_fetch::FetchError;

    struct SlowClient {
        kind: ProviderKind,
        delay: Duration,
        fail: bool,
        calls: AtomicUsize,
    }

    impl SlowClient {
        fn new(kind: ProviderKind, delay: Duration, fail: bool) -> Arc<Self> {
            Arc::new(Self {
                kind,
                delay,
                fail,
                calls: AtomicUsize::new(0),
            })
        }
    }

    #[async_trait]
    impl UsageClient for SlowClient {
        fn kind(&self) -> ProviderKind {
            self.kind
        }

        async fn fetch_usage(&self, _creds: &Credentials) -> Result<UsageSnapshot, FetchError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(self.delay).await;
            if self.fail {
                return Err(FetchError::ServerError(500));
            }
            Ok(UsageSnapshot::new(self.kind).with_primary(UsageWindow::from_used(10.0)))
        }
    }

    fn payload_for(kinds: &[ProviderKind]) -> RefreshCredentialsPayload {
        let mut payload = RefreshCredentialsPayload::default();
        for kind in kinds {
            payload.providers.insert(
                *kind,
                BackgroundCredentials {
                    access_token: "tok".to_string(),
                    ..BackgroundCredentials::default()
                },
            );
        }
        payload
    }

    fn prior_with(kinds: &[ProviderKind]) -> WidgetSnapshot {
        WidgetSnapshot::new(
            kinds
                .iter()
                .map(|kind| {
                    UsageSnapshot::new(*kind).with_primary(UsageWindow::from_used(99.0))
                })
                .collect(),
        )
    }

    #[tokio::test]
    async fn test_empty_payload_returns_prior_unchanged() {
        let refresher = BackgroundRefresher::new();
        let prior = prior_with(&[ProviderKind::Codex]);

        let bundle = refresher
            .refresh(&RefreshCredentialsPayload::default(), Some(prior))
            .await;
        assert_eq!(bundle.providers.len(), 1);
        assert_eq!(
            bundle.get(ProviderKind::Codex).unwrap().primary.as_ref().unwrap().used_percent,
            Some(99.0)
        );
    }

    #[tokio::test]
    async fn test_fresh_data_replaces_prior() {
        let client = SlowClient::new(ProviderKind::Codex, Duration::from_millis(1), false);
        let refresher = BackgroundRefresher::new()
            .with_client(client)
            .with_timeout(Duration::from_secs(1));

        let prior = prior_with(&[ProviderKind::Codex]);
        let bundle = refresher
            .refresh(&payload_for(&[ProviderKind::Codex]), Some(prior))
            .await;

        assert_eq!(
            bundle.get(ProviderKind::Codex).unwrap().primary.as_ref().unwrap().used_percent,
            Some(10.0)
        );
    }

    #[tokio::test]
    async fn test_timeout_falls_back_to_prior_data() {
        let slow = SlowClient::new(ProviderKind::Codex, Duration::from_secs(30), false);
        let fast = SlowClient::new(ProviderKind::Kimi, Duration::from_millis(1), false);
        let refresher = BackgroundRefresher::new()
            .with_client(slow.clone())
            .with_client(fast)
            .with_timeout(Duration::from_millis(50));

        let prior = prior_with(&[ProviderKind::Codex]);
        let bundle = refresher
            .refresh(
                &payload_for(&[ProviderKind::Codex, ProviderKind::Kimi]),
                Some(prior),
            )
            .await;

        // The stuck provider fell back to prior data without stalling its
        // sibling.
        assert_eq!(
            bundle.get(ProviderKind::Codex).unwrap().primary.as_ref().unwrap().used_percent,
            Some(99.0)
        );
        assert_eq!(
            bundle.get(ProviderKind::Kimi).unwrap().primary.as_ref().unwrap().used_percent,
            Some(10.0)
        );
    }

    #[tokio::test]
    async fn test_fetch_error_falls_back_to_prior_data() {
        let failing = SlowClient::new(ProviderKind::Claude, Duration::from_millis(1), true);
        let refresher = BackgroundRefresher::new()
            .with_client(failing)
            .with_timeout(Duration::from_secs(1));

        let prior = prior_with(&[ProviderKind::Claude]);
        let bundle = refresher
            .refresh(&payload_for(&[ProviderKind::Claude]), Some(prior))
            .await;

        assert_eq!(
            bundle.get(ProviderKind::Claude).unwrap().primary.as_ref().unwrap().used_percent,
            Some(99.0)
        );
    }

    #[tokio::test]
    async fn test_error_without_prior_yields_no_entry() {
        let failing = SlowClient::new(ProviderKind::Claude, Duration::from_millis(1), true);
        let refresher = BackgroundRefresher::new()
            .with_client(failing)
            .with_timeout(Duration::from_secs(1));

        let bundle = refresher
            .refresh(&payload_for(&[ProviderKind::Claude]), None)
            .await;
        assert!(bundle.providers.is_empty());
    }

    #[tokio::test]
    async fn test_unusable_background_credentials_are_skipped() {
        let client = SlowClient::new(ProviderKind::Codex, Duration::from_millis(1), false);
        let refresher = BackgroundRefresher::new()
            .with_client(client.clone())
            .with_timeout(Duration::from_secs(1));

        let mut payload = RefreshCredentialsPayload::default();
        payload
            .providers
            .insert(ProviderKind::Codex, BackgroundCredentials::default());

        let bundle = refresher.refresh(&payload, None).await;
        assert!(bundle.providers.is_empty());
        assert_eq!(client.calls.load(Ordering::SeqCst), 0);
    }
}
