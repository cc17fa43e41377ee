//! Store error types.

use thiserror::Error;

/// Errors that can occur in the storage layer.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Keychain operation failed.
    #[error("Keychain error: {0}")]
    Keychain(String),

    /// Refusing to persist an all-empty credential record; callers delete
    /// the record instead.
    #[error("Refusing to store empty credentials")]
    EmptyCredentials,

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),
}
