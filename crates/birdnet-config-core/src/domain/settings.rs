//! The root settings aggregate.
//!
//! [`Settings`] mirrors the configuration document one-to-one, plus a small
//! set of *runtime-only* fields that are computed at process start and never
//! written to disk.  Those fields are marked `#[serde(skip)]` and listed in
//! [`RUNTIME_ONLY_FIELDS`]; [`Settings::persisted`] clears exactly that list,
//! so comparing two instances with [`Settings::persisted_eq`] ignores them.
//!
//! # Document layout
//!
//! ```toml
//! debug = false
//!
//! [main]
//! name = "BirdNET-Go"
//!
//! [birdnet]
//! locale = "en-us"
//! latitude = 60.17
//!
//! [realtime.mqtt]
//! enabled = true
//! broker = "tcp://localhost:1883"
//!
//! [backup]
//! enabled = false
//! ```
//!
//! Every struct uses `#[serde(default)]`, so a partial document fills the
//! gaps from the compiled-in defaults.

use std::time::{Duration, SystemTime};

use serde::{Deserialize, Serialize};

use super::backup::BackupConfig;
use super::duration::serde_duration;
use super::realtime::{OpenWeatherSettings, RealtimeSettings};

/// Dotted paths of every field that is never read from or written to the
/// document.
pub const RUNTIME_ONLY_FIELDS: &[&str] = &[
    "version",
    "build_date",
    "system_id",
    "validation_warnings",
    "input",
    "birdnet.labels",
    "birdnet.range_filter.species",
    "birdnet.range_filter.last_updated",
    "realtime.audio.ffmpeg_path",
    "realtime.audio.sox_path",
    "realtime.audio.sox_audio_types",
    "output.file",
];

/// All configuration options of a BirdNET-Go node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub debug: bool,

    /// Build version.  Runtime only.
    #[serde(skip)]
    pub version: String,
    /// Build date.  Runtime only.
    #[serde(skip)]
    pub build_date: String,
    /// Unique identifier of this node for telemetry.  Runtime only.
    #[serde(skip)]
    pub system_id: String,
    /// Non-fatal findings recorded by the last load.  Runtime only.
    #[serde(skip)]
    pub validation_warnings: Vec<String>,

    pub main: MainSettings,
    pub birdnet: BirdNetSettings,
    /// File or directory analysis options, set from the command line.
    #[serde(skip)]
    pub input: InputSettings,
    pub realtime: RealtimeSettings,
    pub webserver: WebServerSettings,
    pub security: SecuritySettings,
    pub sentry: SentrySettings,
    pub output: OutputSettings,
    pub backup: BackupConfig,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            debug: false,
            version: String::new(),
            build_date: String::new(),
            system_id: String::new(),
            validation_warnings: Vec::new(),
            main: MainSettings::default(),
            birdnet: BirdNetSettings::default(),
            input: InputSettings::default(),
            realtime: RealtimeSettings::default(),
            webserver: WebServerSettings::default(),
            security: SecuritySettings::default(),
            sentry: SentrySettings::default(),
            output: OutputSettings::default(),
            backup: BackupConfig::default(),
        }
    }
}

impl Settings {
    /// Resets every field in [`RUNTIME_ONLY_FIELDS`] to its zero value.
    pub fn clear_runtime_fields(&mut self) {
        self.version.clear();
        self.build_date.clear();
        self.system_id.clear();
        self.validation_warnings.clear();
        self.input = InputSettings::default();
        self.birdnet.labels.clear();
        self.birdnet.range_filter.species.clear();
        self.birdnet.range_filter.last_updated = None;
        self.realtime.audio.ffmpeg_path.clear();
        self.realtime.audio.sox_path.clear();
        self.realtime.audio.sox_audio_types.clear();
        self.output.file = FileOutputSettings::default();
    }

    /// A copy holding only what the document would hold.
    pub fn persisted(&self) -> Settings {
        let mut copy = self.clone();
        copy.clear_runtime_fields();
        copy
    }

    /// Equality over persisted fields only.
    pub fn persisted_eq(&self, other: &Settings) -> bool {
        self.persisted() == other.persisted()
    }

    /// Resolves which weather provider to use.
    ///
    /// An explicit `realtime.weather.provider` wins.  When it is empty, an
    /// enabled OpenWeather block selects OpenWeather; otherwise yr.no is used.
    pub fn weather_settings(&self) -> (WeatherProvider, &OpenWeatherSettings) {
        let weather = &self.realtime.weather;
        let provider = match weather.provider.trim().to_ascii_lowercase().as_str() {
            "" if weather.openweather.enabled => WeatherProvider::OpenWeather,
            "" => WeatherProvider::YrNo,
            "none" => WeatherProvider::None,
            "openweather" => WeatherProvider::OpenWeather,
            _ => WeatherProvider::YrNo,
        };
        (provider, &weather.openweather)
    }
}

/// Source of weather observations attached to detections.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WeatherProvider {
    None,
    YrNo,
    OpenWeather,
}

// ── Main ──────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MainSettings {
    /// Node name, used to identify the source of detections.
    pub name: String,
    pub time_as_24h: bool,
    pub log: LogConfig,
}

impl Default for MainSettings {
    fn default() -> Self {
        Self {
            name: "BirdNET-Go".to_string(),
            time_as_24h: true,
            log: LogConfig {
                enabled: false,
                path: "logs/birdnet.log".to_string(),
                ..LogConfig::default()
            },
        }
    }
}

/// When a log file is rotated.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RotationType {
    #[default]
    Daily,
    Weekly,
    Size,
}

/// A rotated log file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    pub enabled: bool,
    pub path: String,
    pub rotation: RotationType,
    /// Size threshold in bytes for [`RotationType::Size`].
    pub max_size: u64,
    /// Day name for [`RotationType::Weekly`].
    pub rotation_day: String,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            path: String::new(),
            rotation: RotationType::Daily,
            max_size: 1_048_576,
            rotation_day: "Sunday".to_string(),
        }
    }
}

// ── BirdNET ───────────────────────────────────────────────────────────────────

/// Analysis model parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BirdNetSettings {
    pub debug: bool,
    /// Sigmoid sensitivity, 0.0-1.5.
    pub sensitivity: f64,
    /// Minimum confidence to report, 0.0-1.0.
    pub threshold: f64,
    /// Overlap between analysis chunks in seconds, 0.0-2.9.
    pub overlap: f64,
    pub longitude: f64,
    pub latitude: f64,
    /// CPU threads for inference; `0` uses all cores.
    pub threads: u32,
    /// Label language, e.g. `en-us`.
    pub locale: String,
    pub range_filter: RangeFilterSettings,
    /// External model file; empty selects the embedded model.
    pub model_path: String,
    /// External label file; empty selects the embedded labels.
    pub label_path: String,
    /// Labels resolved for `locale`.  Runtime only.
    #[serde(skip)]
    pub labels: Vec<String>,
    pub use_xnnpack: bool,
}

impl Default for BirdNetSettings {
    fn default() -> Self {
        Self {
            debug: false,
            sensitivity: 1.0,
            threshold: 0.8,
            overlap: 0.0,
            longitude: 0.0,
            latitude: 0.0,
            threads: 0,
            locale: "en-us".to_string(),
            range_filter: RangeFilterSettings::default(),
            model_path: String::new(),
            label_path: String::new(),
            labels: Vec::new(),
            use_xnnpack: true,
        }
    }
}

/// Location-based species filter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RangeFilterSettings {
    pub debug: bool,
    /// `latest` or `legacy`.
    pub model: String,
    /// Occurrence probability below which a species is filtered out.
    pub threshold: f64,
    /// Species currently passing the filter.  Runtime only; refreshed on its
    /// own schedule under a separate lock in the settings store.
    #[serde(skip)]
    pub species: Vec<String>,
    /// When `species` was last refreshed.  Runtime only.
    #[serde(skip)]
    pub last_updated: Option<SystemTime>,
}

impl Default for RangeFilterSettings {
    fn default() -> Self {
        Self {
            debug: false,
            model: "latest".to_string(),
            threshold: 0.01,
            species: Vec::new(),
            last_updated: None,
        }
    }
}

/// File or directory analysis, driven from the command line.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InputSettings {
    pub path: String,
    pub recursive: bool,
    pub watch: bool,
}

// ── Web server & security ─────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WebServerSettings {
    pub debug: bool,
    pub enabled: bool,
    /// TCP port, kept as a string as in the document.
    pub port: String,
    pub log: LogConfig,
    pub live_stream: LiveStreamSettings,
}

impl Default for WebServerSettings {
    fn default() -> Self {
        Self {
            debug: false,
            enabled: true,
            port: "8080".to_string(),
            log: LogConfig {
                enabled: false,
                path: "logs/webui.log".to_string(),
                ..LogConfig::default()
            },
            live_stream: LiveStreamSettings::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LiveStreamSettings {
    pub debug: bool,
    /// kbps.
    pub bit_rate: u32,
    /// Hz.
    pub sample_rate: u32,
    /// Seconds per segment.
    pub segment_length: u32,
    pub ffmpeg_log_level: String,
}

impl Default for LiveStreamSettings {
    fn default() -> Self {
        Self {
            debug: false,
            bit_rate: 128,
            sample_rate: 48_000,
            segment_length: 2,
            ffmpeg_log_level: "warning".to_string(),
        }
    }
}

/// Authentication, TLS and access control.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SecuritySettings {
    pub debug: bool,
    /// Public hostname for TLS certificates and OAuth redirects.  Required by
    /// `auto_tls` and the social providers.
    pub host: String,
    /// Obtain certificates from Let's Encrypt.
    pub auto_tls: bool,
    pub redirect_to_https: bool,
    pub allow_subnet_bypass: AllowSubnetBypass,
    pub basic_auth: BasicAuth,
    pub google_auth: SocialProvider,
    pub github_auth: SocialProvider,
    /// Secret for session cookies.
    pub session_secret: String,
    #[serde(with = "serde_duration")]
    pub session_duration: Duration,
}

impl Default for SecuritySettings {
    fn default() -> Self {
        Self {
            debug: false,
            host: String::new(),
            auto_tls: false,
            redirect_to_https: false,
            allow_subnet_bypass: AllowSubnetBypass::default(),
            basic_auth: BasicAuth::default(),
            google_auth: SocialProvider::default(),
            github_auth: SocialProvider::default(),
            session_secret: String::new(),
            session_duration: Duration::from_secs(7 * 24 * 60 * 60),
        }
    }
}

/// Skip authentication for clients inside a subnet.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AllowSubnetBypass {
    pub enabled: bool,
    /// CIDR, e.g. `192.168.1.0/24`.
    pub subnet: String,
}

/// Password login backed by the built-in OAuth2 server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BasicAuth {
    pub enabled: bool,
    pub password: String,
    pub client_id: String,
    /// Generated on first start when the template leaves it empty.
    pub client_secret: String,
    pub redirect_uri: String,
    #[serde(with = "serde_duration")]
    pub auth_code_exp: Duration,
    #[serde(with = "serde_duration")]
    pub access_token_exp: Duration,
}

impl Default for BasicAuth {
    fn default() -> Self {
        Self {
            enabled: false,
            password: String::new(),
            client_id: "birdnet-client".to_string(),
            client_secret: String::new(),
            redirect_uri: "/settings".to_string(),
            auth_code_exp: Duration::from_secs(10 * 60),
            access_token_exp: Duration::from_secs(60 * 60),
        }
    }
}

impl BasicAuth {
    /// The OAuth client secret, or `None` when it has not been set.
    pub fn client_secret(&self) -> Option<&str> {
        Some(self.client_secret.as_str()).filter(|s| !s.is_empty())
    }
}

/// An external OAuth2 identity provider.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SocialProvider {
    pub enabled: bool,
    pub client_id: String,
    pub client_secret: String,
    pub redirect_uri: String,
    /// The single account allowed to log in.
    pub user_id: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SentrySettings {
    /// Opt-in error tracking.
    pub enabled: bool,
    pub debug: bool,
}

// ── Output ────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputSettings {
    /// Table/CSV output for file analysis.  Runtime only.
    #[serde(skip)]
    pub file: FileOutputSettings,
    pub sqlite: SqliteSettings,
    pub mysql: MysqlSettings,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FileOutputSettings {
    pub enabled: bool,
    pub path: String,
    /// `table` or `csv`.
    pub file_type: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SqliteSettings {
    pub enabled: bool,
    pub path: String,
}

impl Default for SqliteSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            path: "birdnet.db".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MysqlSettings {
    pub enabled: bool,
    pub username: String,
    pub password: String,
    pub database: String,
    pub host: String,
    pub port: String,
}

impl Default for MysqlSettings {
    fn default() -> Self {
        Self {
            enabled: false,
            username: String::new(),
            password: String::new(),
            database: String::new(),
            host: "localhost".to_string(),
            port: "3306".to_string(),
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
