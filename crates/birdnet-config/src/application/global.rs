//! Process-wide settings access.
//!
//! Long-running services read the settings from many places that have no
//! convenient way to receive a [`SettingsStore`].  This module keeps one store
//! for the whole process:
//!
//! ```text
//! let settings = birdnet_config::setting();   // loads on first call
//! if settings.realtime.mqtt.enabled { ... }
//! ```
//!
//! The store uses the platform search paths unless [`init`] installed a
//! different one before the first access.
//!
//! A process cannot run without its configuration, so a failed first load
//! terminates it with exit status 1 after logging the cause.  Later reloads
//! go through [`SettingsStore::load`] and report errors normally.

use std::sync::{Arc, OnceLock};

use birdnet_config_core::Settings;
use tracing::error;

use super::settings_store::SettingsStore;

static STORE: OnceLock<SettingsStore> = OnceLock::new();

/// Installs `store` as the process-wide store.
///
/// # Errors
///
/// Hands `store` back if a store is already installed, including the default
/// one created by an earlier [`store`] or [`setting`] call.
pub fn init(store: SettingsStore) -> Result<(), SettingsStore> {
    STORE.set(store)
}

/// The process-wide store, created over the platform search paths if
/// [`init`] was not called.
///
/// Exits the process when no search path can be determined.
pub fn store() -> &'static SettingsStore {
    STORE.get_or_init(|| match SettingsStore::with_default_paths() {
        Ok(store) => store,
        Err(err) => {
            error!(category = %err.category(), "cannot locate configuration: {err}");
            std::process::exit(1);
        }
    })
}

/// The current settings, loading them on first use.
///
/// Exits the process if the first load fails.
pub fn setting() -> Arc<Settings> {
    match store().get_or_load() {
        Ok(settings) => settings,
        Err(err) => {
            error!(
                category = %err.category(),
                operation = err.operation().unwrap_or("load-config"),
                "failed to load configuration: {err}"
            );
            std::process::exit(1);
        }
    }
}
