//! Atomic replacement of the configuration document.
//!
//! # Write sequence
//!
//! 1. Create a temporary file **in the destination's directory**, so the
//!    final rename stays on one file system.
//! 2. Write the full document and `fsync` it.
//! 3. Close it and rename it over the destination.
//!
//! A rename within one file system is atomic: readers see either the old
//! document or the new one, never a mix.  If the rename fails because the
//! two paths are on different file systems (a bind-mounted config file in a
//! container is the usual case) the persister falls back to copying the
//! temporary file over the destination and deleting it afterwards.  That copy
//! is not atomic, so the previous contents are read first and written back
//! if the copy fails midway.
//!
//! The temporary file is owned by a [`tempfile::TempPath`] guard and removed
//! on every failure path.
//!
//! # Failure injection
//!
//! The steps that can fail in interesting ways (writing the bytes, renaming,
//! copying) go through the [`FileOps`] trait.  Production code uses
//! [`StdFileOps`]; tests substitute a mock to force each step to fail.

use std::fs::File;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use birdnet_config_core::Settings;
use tracing::{debug, error, warn};

use crate::error::ConfigError;

/// `EXDEV` on Linux and macOS.
#[cfg(unix)]
const CROSS_DEVICE_ERROR: i32 = 18;
/// `ERROR_NOT_SAME_DEVICE`.
#[cfg(windows)]
const CROSS_DEVICE_ERROR: i32 = 17;

/// File-system primitives used by [`Persister`].
#[cfg_attr(test, mockall::automock)]
pub trait FileOps: Send + Sync {
    /// Writes all of `data` to `file`.
    fn write_all(&self, file: &mut File, data: &[u8]) -> io::Result<()>;

    /// Renames `from` to `to`, replacing `to` if it exists.
    fn rename(&self, from: &Path, to: &Path) -> io::Result<()>;

    /// Copies the contents of `from` over `to`.
    fn copy(&self, from: &Path, to: &Path) -> io::Result<u64>;
}

/// [`FileOps`] backed by `std::fs`.
#[derive(Debug, Default, Clone, Copy)]
pub struct StdFileOps;

impl FileOps for StdFileOps {
    fn write_all(&self, file: &mut File, data: &[u8]) -> io::Result<()> {
        file.write_all(data)
    }

    fn rename(&self, from: &Path, to: &Path) -> io::Result<()> {
        std::fs::rename(from, to)
    }

    fn copy(&self, from: &Path, to: &Path) -> io::Result<u64> {
        std::fs::copy(from, to)
    }
}

/// Whether `err` means "source and destination are on different devices".
pub fn is_cross_device(err: &io::Error) -> bool {
    #[cfg(any(unix, windows))]
    {
        err.raw_os_error() == Some(CROSS_DEVICE_ERROR)
    }
    #[cfg(not(any(unix, windows)))]
    {
        let _ = err;
        false
    }
}

/// Writes documents atomically.
#[derive(Debug, Default, Clone)]
pub struct Persister<F = StdFileOps> {
    ops: F,
}

impl Persister<StdFileOps> {
    pub fn new() -> Self {
        Self { ops: StdFileOps }
    }
}

impl<F: FileOps> Persister<F> {
    pub fn with_file_ops(ops: F) -> Self {
        Self { ops }
    }

    /// Serializes the persisted fields of `settings` and writes them to `dest`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Serialize`] if the settings cannot be rendered,
    /// otherwise the errors of [`Persister::write_document`].
    pub fn write_settings(&self, dest: &Path, settings: &Settings) -> Result<(), ConfigError> {
        let document = toml::to_string_pretty(&settings.persisted()).map_err(|source| {
            ConfigError::Serialize {
                operation: "serialize-settings",
                source,
            }
        })?;
        self.write_document(dest, &document)
    }

    /// Atomically replaces `dest` with `contents`.
    ///
    /// On success `dest` holds exactly `contents`.  On failure `dest` is left
    /// as it was and no temporary file remains.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Io`] naming the step that failed.
    pub fn write_document(&self, dest: &Path, contents: &str) -> Result<(), ConfigError> {
        let dir = parent_dir(dest);

        let mut temp = tempfile::Builder::new()
            .prefix(".config-")
            .suffix(".toml.tmp")
            .tempfile_in(&dir)
            .map_err(ConfigError::io("create-temp-file", &dir))?;
        let temp_display = temp.path().to_path_buf();

        // Dropping `temp` on an early return deletes the file.
        self.ops
            .write_all(temp.as_file_mut(), contents.as_bytes())
            .map_err(ConfigError::io("write-temp-file", &temp_display))?;
        temp.as_file()
            .sync_all()
            .map_err(ConfigError::io("sync-temp-file", &temp_display))?;

        // Closes the handle; the path guard still deletes on drop.
        let temp_path = temp.into_temp_path();

        match self.ops.rename(&temp_path, dest) {
            Ok(()) => {
                // Nothing is left at the temporary path to clean up.
                if let Err(err) = temp_path.keep() {
                    debug!(error = %err, "temporary path guard not released after rename");
                }
                debug!(path = %dest.display(), "configuration written");
                Ok(())
            }
            Err(err) if is_cross_device(&err) => {
                debug!(
                    path = %dest.display(),
                    "rename crosses file systems, falling back to copy"
                );
                let result = self.copy_over(&temp_path, dest);
                remove_temp(temp_path);
                result
            }
            Err(err) => {
                remove_temp(temp_path);
                Err(ConfigError::io("rename-config", dest)(err))
            }
        }
    }

    /// Copies `temp` over `dest`, restoring the previous contents on failure.
    fn copy_over(&self, temp: &Path, dest: &Path) -> Result<(), ConfigError> {
        let previous = match std::fs::read(dest) {
            Ok(bytes) => Some(bytes),
            Err(e) if e.kind() == io::ErrorKind::NotFound => None,
            Err(e) => return Err(ConfigError::io("read-config", dest)(e)),
        };

        if let Err(err) = self.ops.copy(temp, dest) {
            restore(dest, previous.as_deref());
            return Err(ConfigError::io("copy-config", dest)(err));
        }
        Ok(())
    }
}

/// Directory a temporary sibling of `dest` is created in.
fn parent_dir(dest: &Path) -> PathBuf {
    match dest.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => dir.to_path_buf(),
        _ => PathBuf::from("."),
    }
}

fn remove_temp(temp: tempfile::TempPath) {
    let path = temp.to_path_buf();
    if let Err(e) = temp.close() {
        warn!(path = %path.display(), error = %e, "failed to remove temporary file");
    }
}

/// Puts back what `dest` held before a failed copy.
fn restore(dest: &Path, previous: Option<&[u8]>) {
    let result = match previous {
        Some(bytes) => std::fs::write(dest, bytes),
        None => match std::fs::remove_file(dest) {
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            other => other,
        },
    };
    if let Err(e) = result {
        error!(
            category = %birdnet_config_core::ErrorCategory::FileIo,
            operation = "restore-config",
            path = %dest.display(),
            error = %e,
            "failed to restore configuration after an interrupted copy"
        );
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use birdnet_config_core::ErrorCategory;

    #[cfg(any(unix, windows))]
    fn cross_device() -> io::Error {
        io::Error::from_raw_os_error(CROSS_DEVICE_ERROR)
    }

    /// Entries in `dir` other than `keep`.
    fn leftovers(dir: &Path, keep: &Path) -> Vec<PathBuf> {
        std::fs::read_dir(dir)
            .expect("read_dir")
            .map(|e| e.expect("entry").path())
            .filter(|p| p != keep)
            .collect()
    }

    /// A mock whose unconfigured calls behave like [`StdFileOps`].
    fn passthrough() -> MockFileOps {
        let mut ops = MockFileOps::new();
        ops.expect_write_all()
            .returning(|file, data| StdFileOps.write_all(file, data));
        ops
    }

    #[test]
    fn test_write_document_creates_new_file() {
        // Arrange
        let dir = tempfile::tempdir().expect("tempdir");
        let dest = dir.path().join("config.toml");

        // Act
        Persister::new()
            .write_document(&dest, "debug = true\n")
            .expect("write succeeds");

        // Assert
        assert_eq!(std::fs::read_to_string(&dest).expect("read"), "debug = true\n");
        assert!(leftovers(dir.path(), &dest).is_empty());
    }

    #[test]
    fn test_write_document_replaces_existing_file() {
        let dir = tempfile::tempdir().expect("tempdir");
        let dest = dir.path().join("config.toml");
        std::fs::write(&dest, "debug = false\n").expect("seed");

        Persister::new()
            .write_document(&dest, "debug = true\n")
            .expect("write succeeds");

        assert_eq!(std::fs::read_to_string(&dest).expect("read"), "debug = true\n");
    }

    #[test]
    fn test_successive_writes_leave_only_the_destination() {
        // Arrange
        let dir = tempfile::tempdir().expect("tempdir");
        let dest = dir.path().join("config.toml");
        let persister = Persister::new();

        // Act
        for generation in 0..5 {
            persister
                .write_document(&dest, &format!("generation = {generation}\n"))
                .expect("write succeeds");
        }

        // Assert
        assert_eq!(std::fs::read_to_string(&dest).expect("read"), "generation = 4\n");
        assert!(leftovers(dir.path(), &dest).is_empty());
    }

    #[cfg(unix)]
    #[test]
    fn test_written_document_is_owner_only() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().expect("tempdir");
        let dest = dir.path().join("config.toml");

        Persister::new().write_document(&dest, "").expect("write");

        let mode = std::fs::metadata(&dest).expect("metadata").permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
    }

    #[test]
    fn test_write_failure_leaves_destination_and_no_temp_file() {
        // Arrange
        let dir = tempfile::tempdir().expect("tempdir");
        let dest = dir.path().join("config.toml");
        std::fs::write(&dest, "original").expect("seed");
        let mut ops = MockFileOps::new();
        ops.expect_write_all()
            .times(1)
            .returning(|_, _| Err(io::Error::new(io::ErrorKind::Other, "disk full")));
        ops.expect_rename().never();

        // Act
        let err = Persister::with_file_ops(ops)
            .write_document(&dest, "replacement")
            .unwrap_err();

        // Assert
        assert_eq!(err.category(), ErrorCategory::FileIo);
        assert_eq!(err.operation(), Some("write-temp-file"));
        assert_eq!(std::fs::read_to_string(&dest).expect("read"), "original");
        assert!(leftovers(dir.path(), &dest).is_empty());
    }

    #[test]
    fn test_rename_failure_leaves_destination_and_no_temp_file() {
        let dir = tempfile::tempdir().expect("tempdir");
        let dest = dir.path().join("config.toml");
        std::fs::write(&dest, "original").expect("seed");
        let mut ops = passthrough();
        ops.expect_rename()
            .times(1)
            .returning(|_, _| Err(io::Error::new(io::ErrorKind::PermissionDenied, "busy")));
        ops.expect_copy().never();

        let err = Persister::with_file_ops(ops)
            .write_document(&dest, "replacement")
            .unwrap_err();

        assert_eq!(err.operation(), Some("rename-config"));
        assert_eq!(std::fs::read_to_string(&dest).expect("read"), "original");
        assert!(leftovers(dir.path(), &dest).is_empty());
    }

    #[cfg(any(unix, windows))]
    #[test]
    fn test_cross_device_rename_falls_back_to_copy() {
        // Arrange
        let dir = tempfile::tempdir().expect("tempdir");
        let dest = dir.path().join("config.toml");
        std::fs::write(&dest, "original").expect("seed");
        let mut ops = passthrough();
        ops.expect_rename()
            .times(1)
            .returning(|_, _| Err(cross_device()));
        ops.expect_copy()
            .times(1)
            .returning(|from, to| StdFileOps.copy(from, to));

        // Act
        Persister::with_file_ops(ops)
            .write_document(&dest, "replacement")
            .expect("copy fallback succeeds");

        // Assert
        assert_eq!(std::fs::read_to_string(&dest).expect("read"), "replacement");
        assert!(leftovers(dir.path(), &dest).is_empty());
    }

    #[cfg(any(unix, windows))]
    #[test]
    fn test_failed_copy_restores_previous_contents() {
        // Arrange
        let dir = tempfile::tempdir().expect("tempdir");
        let dest = dir.path().join("config.toml");
        std::fs::write(&dest, "original").expect("seed");
        let mut ops = passthrough();
        ops.expect_rename().returning(|_, _| Err(cross_device()));
        ops.expect_copy().times(1).returning(|_, to| {
            // Simulate a copy that truncated the destination and then died.
            std::fs::write(to, "repl")?;
            Err(io::Error::new(io::ErrorKind::Other, "device removed"))
        });

        // Act
        let err = Persister::with_file_ops(ops)
            .write_document(&dest, "replacement")
            .unwrap_err();

        // Assert
        assert_eq!(err.operation(), Some("copy-config"));
        assert_eq!(std::fs::read_to_string(&dest).expect("read"), "original");
        assert!(leftovers(dir.path(), &dest).is_empty());
    }

    #[cfg(any(unix, windows))]
    #[test]
    fn test_failed_copy_to_new_destination_removes_partial_file() {
        let dir = tempfile::tempdir().expect("tempdir");
        let dest = dir.path().join("config.toml");
        let mut ops = passthrough();
        ops.expect_rename().returning(|_, _| Err(cross_device()));
        ops.expect_copy().returning(|_, to| {
            std::fs::write(to, "partial")?;
            Err(io::Error::new(io::ErrorKind::Other, "device removed"))
        });

        let result = Persister::with_file_ops(ops).write_document(&dest, "replacement");

        assert!(result.is_err());
        assert!(!dest.exists());
        assert!(leftovers(dir.path(), &dest).is_empty());
    }

    #[test]
    fn test_missing_directory_fails_at_temp_creation() {
        let dir = tempfile::tempdir().expect("tempdir");
        let dest = dir.path().join("absent").join("config.toml");

        let err = Persister::new().write_document(&dest, "").unwrap_err();

        assert_eq!(err.operation(), Some("create-temp-file"));
    }

    #[test]
    fn test_write_settings_omits_runtime_fields() {
        // Arrange
        let dir = tempfile::tempdir().expect("tempdir");
        let dest = dir.path().join("config.toml");
        let mut settings = Settings::default();
        settings.version = "9.9.9".into();
        settings.validation_warnings.push("locale fallback".into());
        settings.main.name = "garden".into();

        // Act
        Persister::new()
            .write_settings(&dest, &settings)
            .expect("write succeeds");

        // Assert
        let text = std::fs::read_to_string(&dest).expect("read");
        assert!(text.contains("garden"));
        assert!(!text.contains("9.9.9"));
        assert!(!text.contains("validation_warnings"));
        let restored: Settings = toml::from_str(&text).expect("parses back");
        assert!(restored.persisted_eq(&settings));
    }

    #[test]
    fn test_is_cross_device_only_matches_exdev() {
        assert!(!is_cross_device(&io::Error::new(io::ErrorKind::Other, "x")));
        #[cfg(any(unix, windows))]
        assert!(is_cross_device(&cross_device()));
    }
}
