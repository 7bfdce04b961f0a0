//! The process-wide holder of the current, validated settings.
//!
//! # Concurrency model (for beginners)
//!
//! Many threads read the settings (detection workers, web handlers,
//! uploaders) and a few occasionally replace or persist them.  The store
//! keeps the current instance as an `Arc<Settings>` behind a
//! [`parking_lot::RwLock`]:
//!
//! - **Readers** take the shared lock only long enough to clone the `Arc`.
//!   They then own a complete snapshot that no writer can modify.
//! - **`load`** takes the exclusive lock for the whole read → merge →
//!   validate → install sequence, then swaps in a new `Arc`.  A failed load
//!   leaves the previous instance installed.
//! - **`update`** mutates through [`Arc::make_mut`]: if readers still hold
//!   the current snapshot, the settings are cloned first, so a reader never
//!   sees a half-applied change.
//! - **`save_settings`** copies the current snapshot under the shared lock
//!   and writes it after releasing the lock.
//!
//! Readers get "latest complete snapshot" semantics.  Two separate
//! `get_settings` calls may return different generations if a reload happens
//! in between; callers needing several related values should read them all
//! from one snapshot.
//!
//! The range-filter species list is refreshed on its own schedule, so it
//! lives behind a second lock and is copied into every installed instance.
//! When both locks are needed the settings lock is taken first.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::SystemTime;

use birdnet_config_core::{validate_settings, Settings};
use parking_lot::{Mutex, RwLock};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::error::ConfigError;
use crate::infrastructure::storage::loader::ConfigLoader;
use crate::infrastructure::storage::persister::{FileOps, StdFileOps};

/// Values computed at process start and attached to every loaded instance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuntimeInfo {
    pub version: String,
    pub build_date: String,
    pub system_id: String,
}

impl RuntimeInfo {
    /// Version and build date of this binary plus a fresh system id.
    pub fn detect() -> Self {
        Self {
            version: env!("CARGO_PKG_VERSION").to_string(),
            build_date: option_env!("BUILD_DATE").unwrap_or("unknown").to_string(),
            system_id: Uuid::new_v4().to_string(),
        }
    }

    fn apply(&self, settings: &mut Settings) {
        settings.version = self.version.clone();
        settings.build_date = self.build_date.clone();
        settings.system_id = self.system_id.clone();
    }
}

/// Species passing the location filter, with the time of the last refresh.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RangeFilterSpecies {
    pub species: Vec<String>,
    pub last_updated: Option<SystemTime>,
}

/// Thread-safe owner of the current [`Settings`].
#[derive(Debug)]
pub struct SettingsStore<F = StdFileOps> {
    loader: ConfigLoader<F>,
    runtime: RuntimeInfo,
    current: RwLock<Option<Arc<Settings>>>,
    species: RwLock<RangeFilterSpecies>,
    /// Orders concurrent saves so the last caller's snapshot wins.
    save_lock: Mutex<()>,
}

impl SettingsStore<StdFileOps> {
    /// A store over the platform search paths.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::NoConfigPaths`] if none can be determined.
    pub fn with_default_paths() -> Result<Self, ConfigError> {
        Ok(Self::new(ConfigLoader::with_default_paths()?))
    }
}

impl<F: FileOps> SettingsStore<F> {
    /// An empty store; nothing is read until [`SettingsStore::load`].
    pub fn new(loader: ConfigLoader<F>) -> Self {
        Self::with_runtime(loader, RuntimeInfo::detect())
    }

    pub fn with_runtime(loader: ConfigLoader<F>, runtime: RuntimeInfo) -> Self {
        Self {
            loader,
            runtime,
            current: RwLock::new(None),
            species: RwLock::new(RangeFilterSpecies::default()),
            save_lock: Mutex::new(()),
        }
    }

    pub fn loader(&self) -> &ConfigLoader<F> {
        &self.loader
    }

    /// Reads, validates and installs the settings.
    ///
    /// Warnings are logged, recorded on `validation_warnings` and do not fail
    /// the load.  On any error the previously installed instance, if any,
    /// stays current.
    ///
    /// # Errors
    ///
    /// Propagates loader errors, and returns [`ConfigError::Validation`] with
    /// every fatal finding when validation fails.
    pub fn load(&self) -> Result<Arc<Settings>, ConfigError> {
        let mut current = self.current.write();
        let species = self.species.read().clone();
        let settings = self.build(species)?;
        *current = Some(Arc::clone(&settings));
        Ok(settings)
    }

    /// Returns the installed settings, loading them first if nothing is
    /// installed yet.
    ///
    /// # Errors
    ///
    /// As [`SettingsStore::load`].
    pub fn get_or_load(&self) -> Result<Arc<Settings>, ConfigError> {
        if let Some(settings) = self.get_settings() {
            return Ok(settings);
        }
        let mut current = self.current.write();
        // Another thread may have loaded while we waited for the lock.
        if let Some(settings) = current.as_ref() {
            return Ok(Arc::clone(settings));
        }
        let species = self.species.read().clone();
        let settings = self.build(species)?;
        *current = Some(Arc::clone(&settings));
        Ok(settings)
    }

    /// The current snapshot, or `None` before the first successful load.
    pub fn get_settings(&self) -> Option<Arc<Settings>> {
        self.current.read().clone()
    }

    /// Applies `change` to the current settings.
    ///
    /// Snapshots already handed out are not affected; the change becomes
    /// visible to subsequent [`SettingsStore::get_settings`] calls.  The
    /// result is not re-validated and not written to disk until
    /// [`SettingsStore::save_settings`].
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::NotLoaded`] before the first successful load.
    pub fn update<R>(&self, change: impl FnOnce(&mut Settings) -> R) -> Result<R, ConfigError> {
        let mut current = self.current.write();
        let slot = current.as_mut().ok_or(ConfigError::NotLoaded)?;
        Ok(change(Arc::make_mut(slot)))
    }

    /// Writes the current settings to the document atomically.
    ///
    /// Returns the path written.  The installed instance is not modified.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::NotLoaded`] before the first successful load,
    /// or the persister's error.
    pub fn save_settings(&self) -> Result<PathBuf, ConfigError> {
        let _ordered = self.save_lock.lock();

        let mut snapshot = {
            let current = self.current.read();
            current.as_deref().cloned().ok_or(ConfigError::NotLoaded)?
        };
        {
            let species = self.species.read();
            snapshot.birdnet.range_filter.species = species.species.clone();
            snapshot.birdnet.range_filter.last_updated = species.last_updated;
        }

        let path = self.loader.document_path()?;
        self.loader.persister().write_settings(&path, &snapshot)?;
        info!(path = %path.display(), "settings saved");
        Ok(path)
    }

    /// Replaces the range-filter species list and publishes it in the
    /// installed settings.
    ///
    /// Snapshots already handed out keep the previous list.
    pub fn set_range_filter_species(&self, species: Vec<String>) {
        let mut current = self.current.write();
        let mut guard = self.species.write();
        guard.species = species;
        guard.last_updated = Some(SystemTime::now());
        if let Some(slot) = current.as_mut() {
            let range_filter = &mut Arc::make_mut(slot).birdnet.range_filter;
            range_filter.species = guard.species.clone();
            range_filter.last_updated = guard.last_updated;
        }
        debug!(count = guard.species.len(), "range filter species refreshed");
    }

    pub fn range_filter_species(&self) -> RangeFilterSpecies {
        self.species.read().clone()
    }

    /// Loads, validates and stamps a new instance.  Called with the settings
    /// lock held exclusively.
    fn build(&self, species: RangeFilterSpecies) -> Result<Arc<Settings>, ConfigError> {
        let loaded = self.loader.load()?;
        let mut settings = loaded.settings;

        let (fatal, warnings) = validate_settings(&mut settings).partition();
        if !fatal.is_empty() {
            for finding in &fatal {
                error!(
                    category = "validation",
                    field = %finding.field,
                    path = %loaded.path.display(),
                    "{}",
                    finding.message
                );
            }
            return Err(ConfigError::Validation { findings: fatal });
        }
        for finding in &warnings {
            warn!(category = "validation", field = %finding.field, "{}", finding.message);
        }

        settings.validation_warnings = warnings.iter().map(ToString::to_string).collect();
        self.runtime.apply(&mut settings);
        settings.birdnet.range_filter.species = species.species;
        settings.birdnet.range_filter.last_updated = species.last_updated;

        info!(
            path = %loaded.path.display(),
            warnings = settings.validation_warnings.len(),
            "settings installed"
        );
        Ok(Arc::new(settings))
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use std::path::Path;

    use super::*;

    fn store_in(dir: &Path) -> SettingsStore {
        let loader =
            ConfigLoader::new(vec![dir.to_path_buf()]).with_env(Vec::<(String, String)>::new());
        SettingsStore::with_runtime(
            loader,
            RuntimeInfo {
                version: "1.0.0-test".into(),
                build_date: "2026-01-01".into(),
                system_id: "test-node".into(),
            },
        )
    }

    fn write_doc(dir: &Path, text: &str) {
        std::fs::write(dir.join("config.toml"), text).expect("write document");
    }

    #[test]
    fn test_store_is_empty_until_loaded() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = store_in(dir.path());

        assert!(store.get_settings().is_none());
        assert!(matches!(store.save_settings(), Err(ConfigError::NotLoaded)));
        assert!(matches!(store.update(|_| ()), Err(ConfigError::NotLoaded)));
    }

    #[test]
    fn test_load_stamps_runtime_info() {
        // Arrange
        let dir = tempfile::tempdir().expect("tempdir");
        write_doc(dir.path(), "");
        let store = store_in(dir.path());

        // Act
        let settings = store.load().expect("loads");

        // Assert
        assert_eq!(settings.version, "1.0.0-test");
        assert_eq!(settings.build_date, "2026-01-01");
        assert_eq!(settings.system_id, "test-node");
        assert!(settings.validation_warnings.is_empty());
    }

    #[test]
    fn test_get_settings_shares_the_installed_instance() {
        let dir = tempfile::tempdir().expect("tempdir");
        write_doc(dir.path(), "");
        let store = store_in(dir.path());
        let loaded = store.load().expect("loads");

        let first = store.get_settings().expect("installed");
        let second = store.get_settings().expect("installed");

        assert!(Arc::ptr_eq(&loaded, &first));
        assert!(Arc::ptr_eq(&first, &second));
    }

    #[test]
    fn test_fatal_finding_fails_load_and_keeps_previous_instance() {
        // Arrange
        let dir = tempfile::tempdir().expect("tempdir");
        write_doc(dir.path(), "[main]\nname = \"first\"\n");
        let store = store_in(dir.path());
        let first = store.load().expect("first load");
        write_doc(dir.path(), "[birdnet]\nthreshold = 7.0\n");

        // Act
        let err = store.load().unwrap_err();

        // Assert
        match err {
            ConfigError::Validation { findings } => {
                assert_eq!(findings.len(), 1);
                assert_eq!(findings[0].field, "birdnet.threshold");
            }
            other => panic!("unexpected error: {other}"),
        }
        let current = store.get_settings().expect("still installed");
        assert!(Arc::ptr_eq(&first, &current));
        assert_eq!(current.main.name, "first");
    }

    #[test]
    fn test_update_is_copy_on_write_for_existing_readers() {
        // Arrange
        let dir = tempfile::tempdir().expect("tempdir");
        write_doc(dir.path(), "");
        let store = store_in(dir.path());
        let before = store.load().expect("loads");

        // Act
        store
            .update(|s| s.main.name = "renamed".into())
            .expect("update");

        // Assert
        assert_eq!(before.main.name, "BirdNET-Go");
        assert_eq!(store.get_settings().expect("installed").main.name, "renamed");
    }

    #[test]
    fn test_save_settings_writes_current_values() {
        let dir = tempfile::tempdir().expect("tempdir");
        write_doc(dir.path(), "");
        let store = store_in(dir.path());
        store.load().expect("loads");
        store.update(|s| s.birdnet.latitude = 60.17).expect("update");

        let path = store.save_settings().expect("saves");

        assert_eq!(path, dir.path().join("config.toml"));
        let reread = store.loader().read(&path).expect("reads back");
        assert_eq!(reread.birdnet.latitude, 60.17);
    }

    #[test]
    fn test_species_list_survives_reload_but_is_never_persisted() {
        // Arrange
        let dir = tempfile::tempdir().expect("tempdir");
        write_doc(dir.path(), "");
        let store = store_in(dir.path());
        store.set_range_filter_species(vec!["Turdus merula".into()]);

        // Act
        let settings = store.load().expect("loads");
        let path = store.save_settings().expect("saves");

        // Assert
        assert_eq!(settings.birdnet.range_filter.species, vec!["Turdus merula"]);
        assert!(settings.birdnet.range_filter.last_updated.is_some());
        let text = std::fs::read_to_string(path).expect("read");
        assert!(!text.contains("Turdus merula"));
    }

    #[test]
    fn test_species_refresh_is_visible_to_new_readers_only() {
        // Arrange
        let dir = tempfile::tempdir().expect("tempdir");
        write_doc(dir.path(), "[main]\nname = \"refreshed\"\n");
        let store = store_in(dir.path());
        let before = store.load().expect("loads");

        // Act
        store.set_range_filter_species(vec!["Turdus merula".into()]);

        // Assert
        let after = store.get_settings().expect("installed");
        assert_eq!(after.birdnet.range_filter.species, vec!["Turdus merula"]);
        assert!(after.birdnet.range_filter.last_updated.is_some());
        assert_eq!(after.main.name, "refreshed");
        assert!(before.birdnet.range_filter.species.is_empty());
        assert_eq!(
            store.range_filter_species().species,
            after.birdnet.range_filter.species
        );
    }

    #[test]
    fn test_get_or_load_loads_once() {
        let dir = tempfile::tempdir().expect("tempdir");
        write_doc(dir.path(), "");
        let store = store_in(dir.path());

        let first = store.get_or_load().expect("loads");
        let second = store.get_or_load().expect("cached");

        assert!(Arc::ptr_eq(&first, &second));
    }
}
