// Lint configuration for this crate
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]

//! # `TallyBar` Engine
//!
//! The credential/usage orchestrator for `TallyBar`.
//!
//! One [`UsageOrchestrator`] instance owns all mutable per-provider state
//! (credential drafts, snapshots, errors, the loading set, and refresh
//! guards) with an explicit lifecycle: constructed at startup, torn down at
//! shutdown. State transitions happen through its methods, never through
//! ambient globals.
//!
//! The orchestrator resolves effective credentials (drafts over persisted
//! records, with the saved record winning ties on identical access
//! tokens), invokes the right provider client, retries exactly once
//! through the provider's token refresher on authorization failure, and
//! persists refreshed credentials without clobbering fields the refresh
//! did not produce.
//!
//! [`BackgroundRefresher`] is the constrained sibling path feeding the
//! passive display surface: reduced credentials, a hard per-provider
//! timeout with real cancellation, and previously-known-good data as the
//! fallback.

pub mod background;
pub mod error;
pub mod orchestrator;

pub use background::BackgroundRefresher;
pub use error::EngineError;
pub use orchestrator::{FetchState, UsageOrchestrator};
