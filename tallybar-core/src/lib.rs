// Lint configuration for this crate
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]

//! # `TallyBar` Core
//!
//! Core types and models for the `TallyBar` usage engine.
//!
//! This crate provides the foundational abstractions used across all other
//! `TallyBar` crates, including:
//!
//! - Domain models (providers, credentials, usage snapshots)
//! - Pacing math for weekly quota windows
//!
//! ## Key Types
//!
//! ### Provider Types
//! - [`ProviderKind`] - Enum of all tracked providers
//! - [`ProviderMetadata`] - Display labels, URLs, and accent color per
//!   provider
//!
//! ### Credential Types
//! - [`Credentials`] - Unified credential record shared by all auth schemes
//!
//! ### Usage Types
//! - [`UsageSnapshot`] - Normalized point-in-time usage for one provider
//! - [`UsageWindow`] - One quota window (session, weekly, tertiary)
//! - [`PacingEstimate`] - Derived burn-rate estimate for weekly windows
//!
//! ### Widget Types
//! - [`WidgetSnapshot`] - Serialized bundle handed to the display surface
//! - [`RefreshCredentialsPayload`] - Reduced credential feed for background
//!   refresh

pub mod models;

// Re-export all model types
pub use models::{
    // Provider types
    ProviderColor,
    ProviderKind,
    ProviderMetadata,
    // Credential types
    Credentials,
    // Usage types
    weekly_pacing,
    PacingEstimate,
    UsageSnapshot,
    UsageWindow,
    // Widget types
    BackgroundCredentials,
    RefreshCredentialsPayload,
    WidgetSnapshot,
};
