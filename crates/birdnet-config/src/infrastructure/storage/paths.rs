//! Where the configuration document lives.
//!
//! The document is always named [`CONFIG_FILE_NAME`].  It is looked up in an
//! ordered list of directories; the first directory holding the file wins.
//! When none does, the first *writable* directory receives a freshly
//! materialized default document.
//!
//! Default search paths per platform:
//! - Linux:   `$XDG_CONFIG_HOME/birdnet-go` (or `~/.config/birdnet-go`), then
//!   `/etc/birdnet-go`
//! - macOS:   `~/Library/Application Support/birdnet-go`, then
//!   `~/.config/birdnet-go`
//! - Windows: the directory of the executable, then `%APPDATA%\birdnet-go`

use std::path::{Path, PathBuf};

use crate::error::ConfigError;

/// File name of the configuration document.
pub const CONFIG_FILE_NAME: &str = "config.toml";

/// Directory name appended to per-user base directories.
const APP_DIR_NAME: &str = "birdnet-go";

/// Returns the platform search paths, most specific first.
///
/// # Errors
///
/// Returns [`ConfigError::NoConfigPaths`] when no directory can be derived
/// from the environment.  Linux always has `/etc`, so in practice this only
/// happens on unsupported platforms or a macOS process without `HOME`.
pub fn default_search_paths() -> Result<Vec<PathBuf>, ConfigError> {
    let paths = platform_search_paths();
    if paths.is_empty() {
        return Err(ConfigError::NoConfigPaths);
    }
    Ok(paths)
}

/// Full path of the document inside `dir`.
pub fn document_path(dir: &Path) -> PathBuf {
    dir.join(CONFIG_FILE_NAME)
}

/// The first `dir/config.toml` that exists as a regular file.
pub fn find_document(search_paths: &[PathBuf]) -> Option<PathBuf> {
    search_paths
        .iter()
        .map(|dir| document_path(dir))
        .find(|path| path.is_file())
}

fn platform_search_paths() -> Vec<PathBuf> {
    #[cfg(target_os = "linux")]
    {
        let mut paths = Vec::new();
        let user_base = std::env::var_os("XDG_CONFIG_HOME")
            .filter(|v| !v.is_empty())
            .map(PathBuf::from)
            .or_else(|| std::env::var_os("HOME").map(|h| PathBuf::from(h).join(".config")));
        if let Some(base) = user_base {
            paths.push(base.join(APP_DIR_NAME));
        }
        paths.push(PathBuf::from("/etc").join(APP_DIR_NAME));
        paths
    }

    #[cfg(target_os = "macos")]
    {
        std::env::var_os("HOME")
            .map(PathBuf::from)
            .map(|home| {
                vec![
                    home.join("Library")
                        .join("Application Support")
                        .join(APP_DIR_NAME),
                    home.join(".config").join(APP_DIR_NAME),
                ]
            })
            .unwrap_or_default()
    }

    #[cfg(target_os = "windows")]
    {
        let mut paths = Vec::new();
        if let Some(dir) = std::env::current_exe()
            .ok()
            .and_then(|exe| exe.parent().map(Path::to_path_buf))
        {
            paths.push(dir);
        }
        if let Some(appdata) = std::env::var_os("APPDATA") {
            paths.push(PathBuf::from(appdata).join(APP_DIR_NAME));
        }
        paths
    }

    #[cfg(not(any(target_os = "windows", target_os = "linux", target_os = "macos")))]
    {
        Vec::new()
    }
}
