//! Engine error type.

use thiserror::Error;

use tallybar_fetch::{FetchError, RefreshError};

/// Errors surfaced by the orchestrator's fetch flow.
#[derive(Debug, Error)]
pub enum EngineError {
    /// The provider fetch failed.
    #[error(transparent)]
    Fetch(#[from] FetchError),

    /// A token refresh failed in a way that must surface (revocation, or a
    /// reactive refresh that could not produce a usable token).
    #[error(transparent)]
    Refresh(#[from] RefreshError),
}

impl EngineError {
    /// Returns true when the user has to re-authenticate this provider.
    pub fn requires_reauth(&self) -> bool {
        match self {
            EngineError::Fetch(_) => false,
            EngineError::Refresh(err) => err.requires_reauth(),
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
