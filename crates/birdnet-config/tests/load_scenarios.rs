//! Integration tests for loading, saving and reloading through the public
//! `SettingsStore` API against real temporary directories.

use std::fs;
use std::path::Path;

use birdnet_config::{ConfigError, ConfigLoader, SettingsStore};
use birdnet_config_core::{ErrorCategory, Settings};

/// A store over `dirs` that ignores the process environment.
fn isolated_store(dirs: &[&Path]) -> SettingsStore {
    isolated_store_with_env(dirs, &[])
}

fn isolated_store_with_env(dirs: &[&Path], env: &[(&str, &str)]) -> SettingsStore {
    let loader = ConfigLoader::new(dirs.iter().map(|d| d.to_path_buf()).collect())
        .with_env(env.iter().map(|(k, v)| (k.to_string(), v.to_string())));
    SettingsStore::new(loader)
}

fn is_url_safe_secret(secret: &str) -> bool {
    secret.len() == 43
        && secret
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b == b'-' || b == b'_')
}

#[test]
fn test_first_start_materializes_defaults_with_fresh_secrets() {
    // Arrange
    let root = tempfile::tempdir().expect("tempdir");
    let config_dir = root.path().join("birdnet-go");
    let store = isolated_store(&[&config_dir]);

    // Act
    let settings = store.load().expect("first load succeeds");

    // Assert
    let document = config_dir.join("config.toml");
    assert!(document.is_file(), "default document must be written");

    let session_secret = settings.security.session_secret.clone();
    let client_secret = settings
        .security
        .basic_auth
        .client_secret()
        .expect("client secret generated")
        .to_string();
    assert!(is_url_safe_secret(&session_secret), "{session_secret}");
    assert!(is_url_safe_secret(&client_secret), "{client_secret}");
    assert_ne!(session_secret, client_secret);

    let mut expected = Settings::default();
    expected.security.session_secret = session_secret.clone();
    expected.security.basic_auth.client_secret = client_secret;
    assert!(settings.persisted_eq(&expected));

    let text = fs::read_to_string(&document).expect("read document");
    assert!(text.contains(&session_secret), "secret must be persisted");
}

#[cfg(unix)]
#[test]
fn test_materialized_document_is_owner_read_write_only() {
    use std::os::unix::fs::PermissionsExt;

    let root = tempfile::tempdir().expect("tempdir");
    let store = isolated_store(&[root.path()]);

    store.load().expect("loads");

    let mode = fs::metadata(root.path().join("config.toml"))
        .expect("metadata")
        .permissions()
        .mode();
    assert_eq!(mode & 0o777, 0o600);
}

#[test]
fn test_second_start_reuses_materialized_secret() {
    // Arrange
    let root = tempfile::tempdir().expect("tempdir");
    let first = isolated_store(&[root.path()])
        .load()
        .expect("first start");

    // Act
    let second = isolated_store(&[root.path()])
        .load()
        .expect("second start");

    // Assert
    assert_eq!(first.security.session_secret, second.security.session_secret);
}

#[test]
fn test_partial_document_merges_over_defaults() {
    // Arrange
    let root = tempfile::tempdir().expect("tempdir");
    fs::write(
        root.path().join("config.toml"),
        "[birdnet]\nlatitude = 60.17\nlongitude = 24.94\n\n[realtime.mqtt]\nenabled = true\nbroker = \"tcp://localhost:1883\"\n",
    )
    .expect("write document");
    let store = isolated_store(&[root.path()]);

    // Act
    let settings = store.load().expect("loads");

    // Assert
    let defaults = Settings::default();
    assert_eq!(settings.birdnet.latitude, 60.17);
    assert_eq!(settings.birdnet.longitude, 24.94);
    assert!(settings.realtime.mqtt.enabled);
    assert_eq!(settings.realtime.mqtt.broker, "tcp://localhost:1883");
    assert_eq!(settings.birdnet.threshold, defaults.birdnet.threshold);
    assert_eq!(settings.webserver.port, defaults.webserver.port);
    assert_eq!(settings.realtime.mqtt.topic, defaults.realtime.mqtt.topic);
}

#[test]
fn test_first_search_path_with_a_document_wins() {
    let first = tempfile::tempdir().expect("tempdir");
    let second = tempfile::tempdir().expect("tempdir");
    fs::write(second.path().join("config.toml"), "[main]\nname = \"second\"\n").expect("write");
    let store = isolated_store(&[first.path(), second.path()]);

    let settings = store.load().expect("loads");

    assert_eq!(settings.main.name, "second");
    assert!(
        !first.path().join("config.toml").exists(),
        "an existing document must not trigger materialization"
    );
}

#[test]
fn test_malformed_document_fails_without_being_replaced() {
    // Arrange
    let root = tempfile::tempdir().expect("tempdir");
    let document = root.path().join("config.toml");
    fs::write(&document, "[birdnet\nthreshold = ").expect("write document");
    let store = isolated_store(&[root.path()]);

    // Act
    let err = store.load().unwrap_err();

    // Assert
    assert!(matches!(err, ConfigError::Parse { .. }), "{err}");
    assert_eq!(err.category(), ErrorCategory::Configuration);
    assert_eq!(
        fs::read_to_string(&document).expect("read"),
        "[birdnet\nthreshold = "
    );
    assert!(store.get_settings().is_none());
}

#[test]
fn test_fatal_validation_lists_every_fatal_field() {
    let root = tempfile::tempdir().expect("tempdir");
    fs::write(
        root.path().join("config.toml"),
        "[birdnet]\nlatitude = 123.0\nsensitivity = 3.0\nlocale = \"xx\"\n",
    )
    .expect("write");
    let store = isolated_store(&[root.path()]);

    let err = store.load().unwrap_err();

    assert_eq!(err.category(), ErrorCategory::Validation);
    let ConfigError::Validation { findings } = err else {
        panic!("expected a validation error");
    };
    let fields: Vec<&str> = findings.iter().map(|f| f.field.as_str()).collect();
    assert_eq!(fields, vec!["birdnet.sensitivity", "birdnet.latitude"]);
}

#[test]
fn test_warnings_are_recorded_and_corrected_in_place() {
    // Arrange
    let root = tempfile::tempdir().expect("tempdir");
    fs::write(
        root.path().join("config.toml"),
        "[birdnet]\nlocale = \"klingon\"\n\n[realtime.audio.export]\ntype = \"wma\"\n",
    )
    .expect("write");
    let store = isolated_store(&[root.path()]);

    // Act
    let settings = store.load().expect("warnings do not fail the load");

    // Assert
    assert_eq!(settings.birdnet.locale, "en-us");
    assert_eq!(settings.realtime.audio.export.file_type, "wav");
    assert_eq!(settings.validation_warnings.len(), 2);
    assert!(settings.validation_warnings[0].starts_with("birdnet.locale:"));
    assert!(settings.validation_warnings[1].starts_with("realtime.audio.export.type:"));
}

#[test]
fn test_environment_overrides_beat_the_document() {
    // Arrange
    let root = tempfile::tempdir().expect("tempdir");
    fs::write(
        root.path().join("config.toml"),
        "[main]\nname = \"from-document\"\n\n[webserver]\nport = \"8080\"\n",
    )
    .expect("write");
    let store = isolated_store_with_env(
        &[root.path()],
        &[
            ("BIRDNET_MAIN__NAME", "from-environment"),
            ("BIRDNET_REALTIME__RTSP__URLS", "rtsp://cam1/stream,rtsp://cam2/stream"),
            ("UNRELATED", "ignored"),
        ],
    );

    // Act
    let settings = store.load().expect("loads");

    // Assert
    assert_eq!(settings.main.name, "from-environment");
    assert_eq!(settings.webserver.port, "8080");
    assert_eq!(
        settings.realtime.rtsp.urls,
        vec!["rtsp://cam1/stream", "rtsp://cam2/stream"]
    );
}

#[test]
fn test_environment_variable_naming_a_table_is_ignored() {
    let root = tempfile::tempdir().expect("tempdir");
    fs::write(root.path().join("config.toml"), "[main]\nname = \"doc\"\n").expect("write");
    let store = isolated_store_with_env(
        &[root.path()],
        &[("BIRDNET_MAIN", "1"), ("BIRDNET_MAIN__NAME", "env-node")],
    );

    let settings = store.load().expect("a table-named variable does not fail the load");

    assert_eq!(settings.main.name, "env-node");
}

const UNUSABLE_TARGETS: &str = r#"
[[backup.targets]]
type = "ftps"
enabled = false
[backup.targets.settings]
host = "nas.local"

[[backup.targets]]
type = "ftp"
enabled = true
[backup.targets.settings]
host = "nas.local"
port = "2121"
"#;

#[test]
fn test_unusable_backup_targets_load_as_warnings() {
    // Arrange
    let root = tempfile::tempdir().expect("tempdir");
    fs::write(root.path().join("config.toml"), UNUSABLE_TARGETS).expect("write");
    let store = isolated_store(&[root.path()]);

    // Act
    let settings = store.load().expect("unusable targets do not fail the load");

    // Assert
    let target_warnings: Vec<_> = settings
        .validation_warnings
        .iter()
        .filter(|w| w.starts_with("backup.targets["))
        .collect();
    assert_eq!(target_warnings.len(), 2, "{target_warnings:?}");
    assert!(target_warnings[0].contains("ftps"), "{}", target_warnings[0]);
    assert!(target_warnings[1].starts_with("backup.targets[1]:"));
    assert_eq!(settings.backup.targets[0].kind(), None);
    assert!(settings.backup.targets[1].resolve().is_err());
}

#[test]
fn test_unusable_targets_are_saved_back_as_written() {
    // Arrange
    let root = tempfile::tempdir().expect("tempdir");
    fs::write(root.path().join("config.toml"), UNUSABLE_TARGETS).expect("write");
    let store = isolated_store(&[root.path()]);
    store.load().expect("loads");

    // Act
    let path = store.save_settings().expect("saves");

    // Assert
    let text = fs::read_to_string(path).expect("read");
    assert!(text.contains("type = \"ftps\""), "{text}");
    assert!(text.contains("port = \"2121\""), "{text}");
}

#[test]
fn test_undeclared_target_keys_survive_save_and_reload() {
    // Arrange
    let root = tempfile::tempdir().expect("tempdir");
    fs::write(
        root.path().join("config.toml"),
        r#"
[[backup.targets]]
type = "ftp"
enabled = true
[backup.targets.settings]
host = "nas.local"
username = "bird"
timeout = 30
passive = true
"#,
    )
    .expect("write");
    let store = isolated_store(&[root.path()]);
    store.load().expect("loads");
    store
        .update(|s| s.main.name = "saved-with-targets".into())
        .expect("update");

    // Act
    store.save_settings().expect("saves");
    let reloaded = isolated_store(&[root.path()]).load().expect("reloads");

    // Assert
    let payload = reloaded.backup.targets[0].payload();
    assert_eq!(payload.get("timeout"), Some(&toml::Value::Integer(30)));
    assert_eq!(payload.get("passive"), Some(&toml::Value::Boolean(true)));
    assert!(reloaded.backup.targets[0].resolve().is_ok());
    assert_eq!(reloaded.main.name, "saved-with-targets");
}

#[test]
fn test_save_then_reload_round_trips_persisted_fields() {
    // Arrange
    let root = tempfile::tempdir().expect("tempdir");
    let store = isolated_store(&[root.path()]);
    store.load().expect("first load");
    store
        .update(|s| {
            s.main.name = "garden-station".into();
            s.birdnet.latitude = -33.87;
            s.realtime.species.include = vec!["Dacelo novaeguineae".into()];
            s.realtime.mqtt.enabled = true;
            s.realtime.mqtt.broker = "tcp://broker:1883".into();
        })
        .expect("update");
    let saved = store.get_settings().expect("installed");

    // Act
    store.save_settings().expect("saves");
    let reloaded = isolated_store(&[root.path()]).load().expect("reloads");

    // Assert
    assert!(reloaded.persisted_eq(&saved));
    assert_eq!(reloaded.main.name, "garden-station");
}

#[test]
fn test_failed_reload_keeps_previous_instance() {
    // Arrange
    let root = tempfile::tempdir().expect("tempdir");
    let document = root.path().join("config.toml");
    fs::write(&document, "[main]\nname = \"good\"\n").expect("write");
    let store = isolated_store(&[root.path()]);
    let before = store.load().expect("first load");
    fs::write(&document, "not = [valid").expect("corrupt");

    // Act
    let result = store.load();

    // Assert
    assert!(result.is_err());
    let current = store.get_settings().expect("still installed");
    assert!(std::sync::Arc::ptr_eq(&before, &current));
    assert_eq!(current.main.name, "good");
}

#[test]
fn test_no_search_paths_is_a_configuration_error() {
    let store = isolated_store(&[]);

    let err = store.load().unwrap_err();

    assert!(matches!(err, ConfigError::NoConfigPaths));
    assert_eq!(err.category(), ErrorCategory::Configuration);
}
