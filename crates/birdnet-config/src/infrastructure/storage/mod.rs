//! Storage infrastructure: the configuration document on disk.
//!
//! - `paths`         – platform search paths and the document's file name.
//! - `env_overrides` – `BIRDNET_*` variables applied over the merged tree.
//! - `loader`        – template + document + environment → `Settings`,
//!   including first-start materialization.
//! - `persister`     – atomic replacement of the document.

pub mod env_overrides;
pub mod loader;
pub mod paths;
pub mod persister;

pub use loader::{ConfigLoader, LoadedConfig, DEFAULT_CONFIG_TEMPLATE};
pub use paths::{default_search_paths, CONFIG_FILE_NAME};
pub use persister::{FileOps, Persister, StdFileOps};
