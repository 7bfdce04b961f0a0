//! Builds a [`Settings`] value from its three layers.
//!
//! # Layers (lowest precedence first)
//!
//! 1. The embedded template `default_config.toml`, compiled into the binary.
//!    It lists every persisted key with its default value.
//! 2. The on-disk document, found on the first search path that has one.
//!    Tables are merged key by key; any other value (arrays included)
//!    replaces the template's value.
//! 3. `BIRDNET_*` environment variables (see [`super::env_overrides`]).
//!
//! The merged TOML tree is then decoded into [`Settings`] in one step.  Any
//! key still missing at that point takes the `#[serde(default)]` value.
//!
//! # First start
//!
//! When no search path holds a document, the loader *materializes* one: the
//! template is written verbatim to the first search path that can be written
//! to, with freshly generated secrets filled into `security.session_secret`
//! and `security.basic_auth.client_secret`.  The document may hold
//! credentials, so it is created owner read/write only.  Only "not found"
//! triggers materialization; any other read error aborts the load.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use birdnet_config_core::{SecretGenerator, Settings};
use toml::{Table, Value};
use tracing::{debug, info, warn};

use super::env_overrides::apply_env_overrides;
use super::paths::{default_search_paths, document_path, find_document};
use super::persister::{FileOps, Persister, StdFileOps};
use crate::error::ConfigError;

/// The default document, compiled in.
pub const DEFAULT_CONFIG_TEMPLATE: &str = include_str!("default_config.toml");

/// Result of a successful [`ConfigLoader::load`].
#[derive(Debug, Clone)]
pub struct LoadedConfig {
    pub settings: Settings,
    /// Document the settings were read from.
    pub path: PathBuf,
    /// Whether the document was created by this load.
    pub materialized: bool,
}

/// Where environment overrides come from.
#[derive(Debug, Clone)]
enum EnvSource {
    Process,
    Fixed(Vec<(String, String)>),
}

/// Reads, merges and decodes the configuration layers.
#[derive(Debug)]
pub struct ConfigLoader<F = StdFileOps> {
    search_paths: Vec<PathBuf>,
    env: EnvSource,
    persister: Persister<F>,
    secrets: SecretGenerator,
}

impl ConfigLoader<StdFileOps> {
    /// A loader over `search_paths` that reads overrides from the process
    /// environment.
    pub fn new(search_paths: Vec<PathBuf>) -> Self {
        Self {
            search_paths,
            env: EnvSource::Process,
            persister: Persister::new(),
            secrets: SecretGenerator::new(),
        }
    }

    /// A loader over the platform search paths.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::NoConfigPaths`] if none can be determined.
    pub fn with_default_paths() -> Result<Self, ConfigError> {
        Ok(Self::new(default_search_paths()?))
    }
}

impl<F: FileOps> ConfigLoader<F> {
    /// Replaces the process environment with a fixed set of variables.
    pub fn with_env<I, K, V>(mut self, vars: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        self.env = EnvSource::Fixed(
            vars.into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        );
        self
    }

    /// Swaps the persister, e.g. for one with injected failures.
    pub fn with_persister<G: FileOps>(self, persister: Persister<G>) -> ConfigLoader<G> {
        ConfigLoader {
            search_paths: self.search_paths,
            env: self.env,
            persister,
            secrets: self.secrets,
        }
    }

    pub fn search_paths(&self) -> &[PathBuf] {
        &self.search_paths
    }

    pub fn persister(&self) -> &Persister<F> {
        &self.persister
    }

    /// The existing document, if any search path has one.
    pub fn find(&self) -> Option<PathBuf> {
        find_document(&self.search_paths)
    }

    /// The document a save should write to: the existing one, otherwise the
    /// location materialization would pick first.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::NoConfigPaths`] when there are no search paths.
    pub fn document_path(&self) -> Result<PathBuf, ConfigError> {
        if let Some(path) = self.find() {
            return Ok(path);
        }
        self.search_paths
            .first()
            .map(|dir| document_path(dir))
            .ok_or(ConfigError::NoConfigPaths)
    }

    /// Loads the merged settings, materializing a default document first if
    /// none exists.
    ///
    /// The returned settings are decoded but not yet validated.
    ///
    /// # Errors
    ///
    /// - [`ConfigError::Io`] when a document exists but cannot be read, or
    ///   when no default document could be written anywhere.
    /// - [`ConfigError::Parse`] when the document is not valid TOML or does
    ///   not fit the settings model.
    /// - [`ConfigError::Configuration`] when an environment override is
    ///   unusable.
    pub fn load(&self) -> Result<LoadedConfig, ConfigError> {
        let (path, contents, materialized) = match self.read_existing()? {
            Some((path, contents)) => (path, contents, false),
            None => {
                let (path, contents) = self.materialize()?;
                (path, contents, true)
            }
        };
        let settings = self.decode(&path, &contents)?;
        debug!(path = %path.display(), materialized, "configuration loaded");
        Ok(LoadedConfig {
            settings,
            path,
            materialized,
        })
    }

    /// Loads the settings from one specific document.
    ///
    /// # Errors
    ///
    /// As [`ConfigLoader::load`], except that a missing file is an error.
    pub fn read(&self, path: &Path) -> Result<Settings, ConfigError> {
        let contents =
            fs::read_to_string(path).map_err(ConfigError::io("read-config", path))?;
        self.decode(path, &contents)
    }

    /// Writes the default document to the first writable search path.
    ///
    /// Returns the path written and the document text.
    ///
    /// # Errors
    ///
    /// Returns the error of the last search path tried, or
    /// [`ConfigError::NoConfigPaths`] when there are none.
    pub fn materialize(&self) -> Result<(PathBuf, String), ConfigError> {
        let document = render_default_document(DEFAULT_CONFIG_TEMPLATE, &self.secrets);
        let mut last_error = None;

        for dir in &self.search_paths {
            let path = document_path(dir);
            let written = create_config_dir(dir)
                .and_then(|()| self.persister.write_document(&path, &document));
            match written {
                Ok(()) => {
                    info!(path = %path.display(), "created default configuration");
                    return Ok((path, document));
                }
                Err(e) => {
                    debug!(dir = %dir.display(), error = %e, "search path not writable");
                    last_error = Some(e);
                }
            }
        }
        Err(last_error.unwrap_or(ConfigError::NoConfigPaths))
    }

    /// Reads the first document found on the search paths.
    fn read_existing(&self) -> Result<Option<(PathBuf, String)>, ConfigError> {
        for dir in &self.search_paths {
            let path = document_path(dir);
            match fs::read_to_string(&path) {
                Ok(contents) => return Ok(Some((path, contents))),
                Err(e) if e.kind() == io::ErrorKind::NotFound => continue,
                Err(e) => return Err(ConfigError::io("read-config", path)(e)),
            }
        }
        Ok(None)
    }

    /// Merges `contents` over the template, applies overrides and decodes.
    fn decode(&self, path: &Path, contents: &str) -> Result<Settings, ConfigError> {
        let mut tree = template_table()?;
        let document: Table = toml::from_str(contents).map_err(|source| ConfigError::Parse {
            operation: "parse-config",
            path: path.to_path_buf(),
            source,
        })?;
        merge_tables(&mut tree, document);

        let applied = match &self.env {
            EnvSource::Process => apply_env_overrides(&mut tree, process_env())?,
            EnvSource::Fixed(vars) => apply_env_overrides(
                &mut tree,
                vars.iter().map(|(k, v)| (k.as_str(), v.as_str())),
            )?,
        };
        if applied > 0 {
            info!(count = applied, "applied environment overrides");
        }

        Value::Table(tree)
            .try_into::<Settings>()
            .map_err(|source| ConfigError::Parse {
                operation: "decode-settings",
                path: path.to_path_buf(),
                source,
            })
    }
}

/// The embedded template as an untyped tree.
///
/// # Errors
///
/// Returns [`ConfigError::Configuration`] if the compiled-in template is not
/// valid TOML.
pub fn template_table() -> Result<Table, ConfigError> {
    toml::from_str(DEFAULT_CONFIG_TEMPLATE).map_err(|e: toml::de::Error| {
        ConfigError::Configuration {
            operation: "parse-embedded-template",
            message: e.to_string(),
        }
    })
}

/// Recursively merges `overlay` into `base`.
///
/// Tables present on both sides are merged key by key.  Every other value in
/// `overlay` replaces the one in `base`.
pub fn merge_tables(base: &mut Table, overlay: Table) {
    for (key, value) in overlay {
        let Value::Table(incoming) = value else {
            base.insert(key, value);
            continue;
        };
        if let Some(Value::Table(existing)) = base.get_mut(&key) {
            merge_tables(existing, incoming);
            continue;
        }
        base.insert(key, Value::Table(incoming));
    }
}

/// Returns `template` with empty generated secrets filled in.
///
/// Only `session_secret` in `[security]` and `client_secret` in
/// `[security.basic_auth]` are touched, and only when they are empty in the
/// template.  A secret that cannot be generated is left empty.
pub fn render_default_document(template: &str, secrets: &SecretGenerator) -> String {
    let mut out = String::with_capacity(template.len() + 128);
    let mut section = "";

    for line in template.lines() {
        let trimmed = line.trim();
        if trimmed.starts_with('[') {
            section = trimmed;
        }
        let key = match (section, trimmed) {
            ("[security]", r#"session_secret = """#) => Some("session_secret"),
            ("[security.basic_auth]", r#"client_secret = """#) => Some("client_secret"),
            _ => None,
        };
        match key.map(|key| (key, secrets.generate())) {
            Some((key, Some(secret))) => out.push_str(&format!("{key} = \"{secret}\"")),
            Some((key, None)) => {
                warn!(key, "left secret empty in default configuration");
                out.push_str(line);
            }
            None => out.push_str(line),
        }
        out.push('\n');
    }
    out
}

/// Creates `dir` and its parents, `rwxr-xr-x` on Unix.
fn create_config_dir(dir: &Path) -> Result<(), ConfigError> {
    #[cfg(unix)]
    let result = {
        use std::os::unix::fs::DirBuilderExt;
        fs::DirBuilder::new().recursive(true).mode(0o755).create(dir)
    };
    #[cfg(not(unix))]
    let result = fs::create_dir_all(dir);

    result.map_err(ConfigError::io("create-config-dir", dir))
}

/// Process environment, skipping variables that are not valid Unicode.
fn process_env() -> impl Iterator<Item = (String, String)> {
    std::env::vars_os()
        .filter_map(|(k, v)| Some((k.into_string().ok()?, v.into_string().ok()?)))
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;

    use super::*;

    fn leaf_paths(table: &Table, prefix: &str, out: &mut BTreeSet<String>) {
        for (key, value) in table {
            let path = if prefix.is_empty() {
                key.clone()
            } else {
                format!("{prefix}.{key}")
            };
            match value {
                Value::Table(inner) => leaf_paths(inner, &path, out),
                _ => {
                    out.insert(path);
                }
            }
        }
    }

    fn loader_in(dir: &Path) -> ConfigLoader {
        ConfigLoader::new(vec![dir.to_path_buf()]).with_env(Vec::<(String, String)>::new())
    }

    #[test]
    fn test_embedded_template_matches_compiled_defaults() {
        // Arrange / Act
        let from_template: Settings =
            toml::from_str(DEFAULT_CONFIG_TEMPLATE).expect("template decodes");

        // Assert
        assert_eq!(from_template, Settings::default());
    }

    #[test]
    fn test_embedded_template_only_uses_known_keys() {
        // Arrange
        let template = template_table().expect("template parses");
        let rendered = toml::to_string(&Settings::default()).expect("defaults serialize");
        let defaults: Table = toml::from_str(&rendered).expect("defaults parse back");
        let mut known = BTreeSet::new();
        leaf_paths(&defaults, "", &mut known);
        let mut used = BTreeSet::new();
        leaf_paths(&template, "", &mut used);

        // Act
        let unknown: Vec<_> = used.difference(&known).collect();

        // Assert
        assert!(unknown.is_empty(), "template keys without a field: {unknown:?}");
    }

    #[test]
    fn test_merge_tables_merges_nested_and_replaces_leaves() {
        // Arrange
        let mut base: Table = toml::from_str(
            r#"
a = 1
list = [1, 2, 3]
[nested]
x = "base"
y = "base"
"#,
        )
        .expect("base");
        let overlay: Table = toml::from_str(
            r#"
list = [9]
[nested]
y = "overlay"
z = true
"#,
        )
        .expect("overlay");

        // Act
        merge_tables(&mut base, overlay);

        // Assert
        assert_eq!(base["a"], Value::Integer(1));
        assert_eq!(base["list"], Value::Array(vec![Value::Integer(9)]));
        assert_eq!(base["nested"]["x"], Value::String("base".into()));
        assert_eq!(base["nested"]["y"], Value::String("overlay".into()));
        assert_eq!(base["nested"]["z"], Value::Boolean(true));
    }

    #[test]
    fn test_render_fills_only_generated_secrets() {
        // Act
        let rendered = render_default_document(DEFAULT_CONFIG_TEMPLATE, &SecretGenerator::new());
        let settings: Settings = toml::from_str(&rendered).expect("rendered decodes");

        // Assert
        let client_secret = settings.security.basic_auth.client_secret().expect("filled");
        assert_eq!(client_secret.len(), birdnet_config_core::secret::SECRET_LEN);
        assert_eq!(settings.security.session_secret.len(), 43);
        assert_ne!(settings.security.session_secret, client_secret);
        assert!(settings.security.google_auth.client_secret.is_empty());
        assert!(settings.security.github_auth.client_secret.is_empty());
    }

    #[test]
    fn test_render_keeps_secret_already_defined() {
        let template = "[security.basic_auth]\nclient_secret = \"preset\"\n";

        let rendered = render_default_document(template, &SecretGenerator::new());

        assert_eq!(rendered, template);
    }

    #[test]
    fn test_partial_document_is_completed_from_template() {
        // Arrange
        let dir = tempfile::tempdir().expect("tempdir");
        std::fs::write(
            dir.path().join("config.toml"),
            "[birdnet]\nlatitude = 60.17\n[realtime.mqtt]\nbroker = \"tcp://x:1883\"\n",
        )
        .expect("seed");

        // Act
        let loaded = loader_in(dir.path()).load().expect("loads");

        // Assert
        assert!(!loaded.materialized);
        assert_eq!(loaded.settings.birdnet.latitude, 60.17);
        assert_eq!(loaded.settings.birdnet.threshold, 0.8);
        assert_eq!(loaded.settings.realtime.mqtt.broker, "tcp://x:1883");
        assert_eq!(loaded.settings.realtime.mqtt.topic, "birdnet");
    }

    #[test]
    fn test_env_overrides_win_over_document() {
        let dir = tempfile::tempdir().expect("tempdir");
        std::fs::write(dir.path().join("config.toml"), "[main]\nname = \"doc\"\n").expect("seed");

        let loaded = loader_in(dir.path())
            .with_env([("BIRDNET_MAIN__NAME", "env"), ("HOME", "/root")])
            .load()
            .expect("loads");

        assert_eq!(loaded.settings.main.name, "env");
    }

    #[test]
    fn test_malformed_document_is_a_parse_error_naming_the_file() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[[[ not toml").expect("seed");

        let err = loader_in(dir.path()).load().unwrap_err();

        assert!(matches!(err, ConfigError::Parse { operation: "parse-config", .. }));
        assert!(err.to_string().contains(&path.display().to_string()));
    }

    #[test]
    fn test_wrongly_typed_value_fails_decoding() {
        let dir = tempfile::tempdir().expect("tempdir");
        std::fs::write(dir.path().join("config.toml"), "[birdnet]\nthreshold = \"high\"\n")
            .expect("seed");

        let err = loader_in(dir.path()).load().unwrap_err();

        assert!(matches!(err, ConfigError::Parse { operation: "decode-settings", .. }));
    }

    #[test]
    fn test_unreadable_document_is_fatal_not_materialized() {
        // A directory named like the document cannot be read as a file.
        let dir = tempfile::tempdir().expect("tempdir");
        std::fs::create_dir(dir.path().join("config.toml")).expect("mkdir");
        let fallback = tempfile::tempdir().expect("tempdir");
        let loader = ConfigLoader::new(vec![dir.path().to_path_buf(), fallback.path().to_path_buf()])
            .with_env(Vec::<(String, String)>::new());

        let err = loader.load().unwrap_err();

        assert_eq!(err.operation(), Some("read-config"));
        assert!(!fallback.path().join("config.toml").exists());
    }

    #[test]
    fn test_materialize_skips_unwritable_paths() {
        // Arrange: the first search path is below a regular file.
        let root = tempfile::tempdir().expect("tempdir");
        let blocker = root.path().join("blocker");
        std::fs::write(&blocker, "").expect("seed");
        let writable = root.path().join("conf");
        let loader = ConfigLoader::new(vec![blocker.join("sub"), writable.clone()])
            .with_env(Vec::<(String, String)>::new());

        // Act
        let (path, _) = loader.materialize().expect("second path works");

        // Assert
        assert_eq!(path, writable.join("config.toml"));
    }

    #[test]
    fn test_document_path_prefers_existing_document() {
        let first = tempfile::tempdir().expect("tempdir");
        let second = tempfile::tempdir().expect("tempdir");
        std::fs::write(second.path().join("config.toml"), "").expect("seed");
        let loader = ConfigLoader::new(vec![first.path().to_path_buf(), second.path().to_path_buf()]);

        assert_eq!(
            loader.document_path().expect("path"),
            second.path().join("config.toml")
        );
        assert!(matches!(
            ConfigLoader::new(Vec::new()).document_path(),
            Err(ConfigError::NoConfigPaths)
        ));
    }
}
