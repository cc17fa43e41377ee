//! Credential storage in the system keychain.
//!
//! One JSON-serialized credential record per provider, stored under a
//! `TallyBar-{provider}` service name:
//! - macOS: Keychain Services
//! - Windows: Credential Manager
//! - Linux: Secret Service
//!
//! The store owns all persisted credentials; the engine only ever holds
//! ephemeral in-memory copies. Load failures and absent records are
//! `None`, never errors.

use std::collections::HashMap;
use std::sync::Mutex;

use keyring::Entry;
use tracing::{debug, warn};

use tallybar_core::{Credentials, ProviderKind};

use crate::error::StoreError;

/// Service name prefix for `TallyBar` credentials.
const SERVICE_PREFIX: &str = "TallyBar";

/// Keychain account name.
const ACCOUNT: &str = "credentials";

// ============================================================================
// Credential Store Trait
// ============================================================================

/// Keyed credential storage by provider.
pub trait CredentialStore: Send + Sync {
    /// Loads the stored record; absent or unreadable records are `None`.
    fn load(&self, kind: ProviderKind) -> Option<Credentials>;

    /// Stores a record. An all-empty record is rejected; delete instead.
    fn save(&self, kind: ProviderKind, creds: &Credentials) -> Result<(), StoreError>;

    /// Deletes the stored record; deleting an absent record is fine.
    fn delete(&self, kind: ProviderKind) -> Result<(), StoreError>;
}

// ============================================================================
// Keychain Store
// ============================================================================

/// System-keychain-backed credential store.
#[derive(Debug, Clone, Default)]
pub struct KeychainStore;

impl KeychainStore {
    /// Creates a new keychain store.
    pub fn new() -> Self {
        Self
    }

    fn entry(kind: ProviderKind) -> Result<Entry, StoreError> {
        let service = format!("{SERVICE_PREFIX}-{}", kind.key_name());
        Entry::new(&service, ACCOUNT).map_err(|e| StoreError::Keychain(e.to_string()))
    }
}

impl CredentialStore for KeychainStore {
    fn load(&self, kind: ProviderKind) -> Option<Credentials> {
        let entry = Self::entry(kind).ok()?;
        match entry.get_password() {
            Ok(secret) => match serde_json::from_str(&secret) {
                Ok(creds) => Some(creds),
                Err(e) => {
                    warn!(provider = ?kind, error = %e, "Stored credentials are undecodable");
                    None
                }
            },
            Err(keyring::Error::NoEntry) => None,
            Err(e) => {
                warn!(provider = ?kind, error = %e, "Keychain read failed");
                None
            }
        }
    }

    fn save(&self, kind: ProviderKind, creds: &Credentials) -> Result<(), StoreError> {
        if !creds.is_usable() {
            return Err(StoreError::EmptyCredentials);
        }
        let entry = Self::entry(kind)?;
        let secret = serde_json::to_string(creds)?;
        entry
            .set_password(&secret)
            .map_err(|e| StoreError::Keychain(e.to_string()))?;
        debug!(provider = ?kind, "Credentials stored");
        Ok(())
    }

    fn delete(&self, kind: ProviderKind) -> Result<(), StoreError> {
        let entry = Self::entry(kind)?;
        match entry.delete_credential() {
            Ok(()) | Err(keyring::Error::NoEntry) => Ok(()),
            Err(e) => Err(StoreError::Keychain(e.to_string())),
        }
    }
}

// ============================================================================
// Memory Store
// ============================================================================

/// In-memory credential store for tests and headless runs.
#[derive(Debug, Default)]
pub struct MemoryStore {
    records: Mutex<HashMap<ProviderKind, Credentials>>,
}

impl MemoryStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a store seeded with records.
    pub fn with_records(records: impl IntoIterator<Item = (ProviderKind, Credentials)>) -> Self {
        Self {
            records: Mutex::new(records.into_iter().collect()),
        }
    }
}

impl CredentialStore for MemoryStore {
    fn load(&self, kind: ProviderKind) -> Option<Credentials> {
        self.records.lock().ok()?.get(&kind).cloned()
    }

    fn save(&self, kind: ProviderKind, creds: &Credentials) -> Result<(), StoreError> {
        if !creds.is_usable() {
            return Err(StoreError::EmptyCredentials);
        }
        self.records
            .lock()
            .map_err(|_| StoreError::Keychain("poisoned lock".to_string()))?
            .insert(kind, creds.clone());
        Ok(())
    }

    fn delete(&self, kind: ProviderKind) -> Result<(), StoreError> {
        self.records
            .lock()
            .map_err(|_| StoreError::Keychain("poisoned lock".to_string()))?
            .remove(&kind);
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
    fn test_memory_store_round_trip() {
        let store = MemoryStore::new();
        let creds = Credentials::with_access_token("tok");

        assert!(store.load(ProviderKind::Codex).is_none());
        store.save(ProviderKind::Codex, &creds).unwrap();
        assert_eq!(store.load(ProviderKind::Codex), Some(creds));

        store.delete(ProviderKind::Codex).unwrap();
        assert!(store.load(ProviderKind::Codex).is_none());
    }

    #[test]
    fn test_empty_credentials_are_rejected() {
        let store = MemoryStore::new();
        let err = store
            .save(ProviderKind::Claude, &Credentials::default())
            .unwrap_err();
        assert!(matches!(err, StoreError::EmptyCredentials));
    }

    #[test]
    fn test_delete_absent_record_is_fine() {
        let store = MemoryStore::new();
        assert!(store.delete(ProviderKind::Kimi).is_ok());
    }

    #[test]
    fn test_keychain_service_name_format() {
        let service = format!("{SERVICE_PREFIX}-{}", ProviderKind::Gemini.key_name());
        assert_eq!(service, "TallyBar-gemini");
    }
}
