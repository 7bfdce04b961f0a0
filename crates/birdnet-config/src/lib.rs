//! birdnet-config library entry point.
//!
//! Re-exports all public modules so that integration tests in `tests/`
//! and the binary entry point in `main.rs` share the same module tree.
//!
//! Most callers only need [`SettingsStore`] (or the process-wide accessor in
//! [`application::global`]); the storage layer is public for tools that work
//! with the document directly.

pub mod application;
pub mod error;
pub mod infrastructure;

pub use application::global::{setting, store};
pub use application::settings_store::{RangeFilterSpecies, RuntimeInfo, SettingsStore};
pub use error::ConfigError;
pub use infrastructure::storage::loader::{ConfigLoader, LoadedConfig};
pub use infrastructure::storage::persister::{FileOps, Persister, StdFileOps};
