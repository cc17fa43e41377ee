// Lint configuration for this crate
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]

//! # `TallyBar` Store
//!
//! Storage for the `TallyBar` usage engine.
//!
//! This crate provides:
//!
//! - **`CredentialStore`**: keyed get/set/delete of credential records by
//!   provider, backed by the system keychain (plus an in-memory test
//!   double)
//! - **`SettingsStore`**: provider ordering and visibility preferences
//! - **`WidgetSink`**: where the aggregate widget snapshot bundle goes
//!   after each refresh-all cycle
//! - **Persistence**: secure JSON file I/O helpers

pub mod error;
pub mod keychain;
pub mod persistence;
pub mod settings_store;
pub mod widget;

pub use error::StoreError;
pub use keychain::{CredentialStore, KeychainStore, MemoryStore};
pub use persistence::{
    default_cache_dir, default_config_dir, default_settings_path, default_widget_path, load_json,
    load_json_or_default, save_json,
};
pub use settings_store::{Settings, SettingsStore};
pub use widget::{FileWidgetSink, WidgetSink};
