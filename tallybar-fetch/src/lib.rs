// Lint configuration for this crate
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]

//! # `TallyBar` Fetch
//!
//! HTTP plumbing and shared decoding for the `TallyBar` provider clients.
//!
//! This crate provides:
//!
//! - [`FetchError`] / [`RefreshError`] - the unified failure taxonomy the
//!   orchestrator dispatches on (only `Unauthorized` is eligible for a
//!   refresh-retry)
//! - [`HttpClient`] - a thin reqwest wrapper with the two timeout classes
//!   used across providers (primary calls and best-effort fallbacks)
//! - [`extract`] - ordered candidate-key extraction over loosely-typed JSON
//! - [`token`] - OAuth token-endpoint response decoding that tolerates both
//!   JSON and form-encoded bodies

pub mod error;
pub mod extract;
pub mod http;
pub mod token;

pub use error::{FetchError, RefreshError};
pub use http::HttpClient;
pub use token::TokenEndpointResponse;
