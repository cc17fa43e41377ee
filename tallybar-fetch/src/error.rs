//! Fetch and refresh error types.

use thiserror::Error;

// ============================================================================
// Fetch Error
// ============================================================================

/// Error type for provider usage fetches.
///
/// The orchestrator matches on these kinds: `Unauthorized` is the only
/// variant eligible for a refresh-retry; everything else fails the fetch
/// outright.
#[derive(Debug, Error)]
pub enum FetchError {
    /// No usable credential was available before any network call.
    #[error("No credentials configured")]
    MissingToken,

    /// The provider rejected the credentials (HTTP 401/403).
    #[error("Authorization rejected by the provider")]
    Unauthorized,

    /// The provider returned an unexpected status code.
    #[error("Provider returned HTTP {0}")]
    ServerError(u16),

    /// A provider-specific precondition was not met.
    #[error("{0}")]
    NotSupported(String),

    /// The response body could not be decoded into usage data.
    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    /// Network/transport failure, surfaced as-is.
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),
}

impl FetchError {
    /// Returns true for authorization failures eligible for refresh-retry.
    pub fn is_unauthorized(&self) -> bool {
        matches!(self, FetchError::Unauthorized)
    }
}

// ============================================================================
// Refresh Error
// ============================================================================

/// Error type for OAuth token refresh operations.
#[derive(Debug, Error)]
pub enum RefreshError {
    /// The credential record has no refresh token.
    #[error("No refresh token available")]
    MissingRefreshToken,

    /// The refresh token has expired; the user must re-authenticate.
    #[error("Refresh token expired")]
    Expired,

    /// The refresh token was revoked; the user must re-authenticate.
    #[error("Refresh token revoked")]
    Revoked,

    /// The refresh token was already used (rotation reuse detection).
    #[error("Refresh token already used")]
    Reused,

    /// The token endpoint returned an undecodable or incomplete body.
    #[error("Invalid refresh response: {0}")]
    InvalidResponse(String),

    /// Network/transport failure during the refresh call.
    #[error("Refresh network error: {0}")]
    Network(#[from] reqwest::Error),
}

impl RefreshError {
    /// Returns true when the user has to re-authenticate; this is the one
    /// failure that interrupts an otherwise-silent proactive refresh.
    pub fn requires_reauth(&self) -> bool {
        matches!(self, RefreshError::Revoked)
    }
}

// ============================================================================
// Tests
// ============================================================================
