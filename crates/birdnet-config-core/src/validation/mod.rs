//! Semantic validation of a merged [`Settings`] structure.
//!
//! Parsing guarantees that every value has the right *type*; validation
//! checks that the values make *sense* together (ranges, required companions,
//! supported enumerations).  The result is a [`ValidationReport`]: a list of
//! [`Finding`]s, each tagged with a [`Severity`].
//!
//! - [`Severity::Fatal`] findings make the configuration unusable.  The
//!   loader refuses to install a structure that has any.
//! - [`Severity::Warning`] findings are recoverable.  Most of them come with a
//!   correction applied in place (an unsupported locale is replaced by the
//!   fallback locale), which is why [`validate_settings`] takes `&mut`.
//!
//! Backup targets are resolved here as well.  A target that fails its own
//! validation is reported as a warning: the node starts, and the backup
//! subsystem skips the target until it is corrected.

pub mod locale;

use std::fmt;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;

use crate::domain::retry::RetrySettings;
use crate::domain::settings::{Settings, SocialProvider, WeatherProvider};
use locale::{normalize_locale, FALLBACK_LOCALE};

/// Audio export containers the encoder supports.
pub const SUPPORTED_EXPORT_TYPES: &[&str] = &["wav", "flac", "aac", "opus", "mp3"];
/// Browser streaming transports.
pub const SUPPORTED_STREAM_TRANSPORTS: &[&str] = &["auto", "sse", "ws"];
/// Weather providers.
pub const SUPPORTED_WEATHER_PROVIDERS: &[&str] = &["none", "yrno", "openweather"];

/// Length in bytes of a decoded backup encryption key.
const ENCRYPTION_KEY_LEN: usize = 32;

/// Whether a finding blocks the configuration from being used.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Warning,
    Fatal,
}

/// Machine-readable kind of a finding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FindingCode {
    /// A number lies outside its allowed range.
    OutOfRange,
    /// A value required by another enabled setting is empty.
    MissingValue,
    /// A value has the right type but an unusable content.
    InvalidValue,
    /// The configured locale is unavailable; the fallback was applied.
    LocaleFallback,
    /// An enumerated value is not supported; a fallback was applied.
    Unsupported,
    /// A backup target failed its own validation.
    InvalidTarget,
    /// A backup schedule entry is malformed.
    InvalidSchedule,
}

/// One validation result.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Finding {
    pub severity: Severity,
    pub code: FindingCode,
    /// Dotted document path of the offending value.
    pub field: String,
    pub message: String,
}

impl Finding {
    pub fn is_fatal(&self) -> bool {
        self.severity == Severity::Fatal
    }
}

impl fmt::Display for Finding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// All findings of one validation pass, in the order they were produced.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidationReport {
    findings: Vec<Finding>,
}

impl ValidationReport {
    pub fn findings(&self) -> &[Finding] {
        &self.findings
    }

    pub fn has_fatal(&self) -> bool {
        self.findings.iter().any(Finding::is_fatal)
    }

    pub fn fatal(&self) -> impl Iterator<Item = &Finding> {
        self.findings.iter().filter(|f| f.is_fatal())
    }

    pub fn warnings(&self) -> impl Iterator<Item = &Finding> {
        self.findings.iter().filter(|f| !f.is_fatal())
    }

    pub fn is_empty(&self) -> bool {
        self.findings.is_empty()
    }

    /// Splits the report into `(fatal, warnings)`.
    pub fn partition(self) -> (Vec<Finding>, Vec<Finding>) {
        self.findings.into_iter().partition(Finding::is_fatal)
    }
}

/// Runs every check over `settings`, applying fallbacks in place.
pub fn validate_settings(settings: &mut Settings) -> ValidationReport {
    let mut v = Validator::default();
    v.birdnet(settings);
    v.audio(settings);
    v.webserver(settings);
    v.security(settings);
    v.integrations(settings);
    v.monitoring(settings);
    v.weather(settings);
    v.backup(settings);
    ValidationReport {
        findings: v.findings,
    }
}

#[derive(Default)]
struct Validator {
    findings: Vec<Finding>,
}

impl Validator {
    fn push(&mut self, severity: Severity, code: FindingCode, field: &str, message: String) {
        self.findings.push(Finding {
            severity,
            code,
            field: field.to_string(),
            message,
        });
    }

    fn fatal(&mut self, code: FindingCode, field: &str, message: String) {
        self.push(Severity::Fatal, code, field, message);
    }

    fn warn(&mut self, code: FindingCode, field: &str, message: String) {
        self.push(Severity::Warning, code, field, message);
    }

    fn range(&mut self, field: &str, value: f64, min: f64, max: f64) {
        if !(min..=max).contains(&value) {
            self.fatal(
                FindingCode::OutOfRange,
                field,
                format!("{value} is outside the allowed range {min} to {max}"),
            );
        }
    }

    fn required(&mut self, field: &str, value: &str, because: &str) {
        if value.trim().is_empty() {
            self.fatal(
                FindingCode::MissingValue,
                field,
                format!("must be set when {because}"),
            );
        }
    }

    /// Replaces `value` with `fallback` unless it is one of `supported`.
    fn one_of(&mut self, field: &str, value: &mut String, supported: &[&str], fallback: &str) {
        let normalized = value.trim().to_ascii_lowercase();
        if supported.contains(&normalized.as_str()) {
            *value = normalized;
            return;
        }
        self.warn(
            FindingCode::Unsupported,
            field,
            format!("{value:?} is not supported, using fallback {fallback:?}"),
        );
        *value = fallback.to_string();
    }

    // ── Sections ──────────────────────────────────────────────────────────────

    fn birdnet(&mut self, settings: &mut Settings) {
        let birdnet = &mut settings.birdnet;
        self.range("birdnet.sensitivity", birdnet.sensitivity, 0.0, 1.5);
        self.range("birdnet.threshold", birdnet.threshold, 0.0, 1.0);
        self.range("birdnet.overlap", birdnet.overlap, 0.0, 2.9);
        self.range("birdnet.latitude", birdnet.latitude, -90.0, 90.0);
        self.range("birdnet.longitude", birdnet.longitude, -180.0, 180.0);
        self.range(
            "birdnet.range_filter.threshold",
            birdnet.range_filter.threshold,
            0.0,
            1.0,
        );

        match normalize_locale(&birdnet.locale) {
            Some(locale) => birdnet.locale = locale.to_string(),
            None => {
                self.warn(
                    FindingCode::LocaleFallback,
                    "birdnet.locale",
                    format!(
                        "locale {:?} is not supported, using fallback {FALLBACK_LOCALE:?}",
                        birdnet.locale
                    ),
                );
                birdnet.locale = FALLBACK_LOCALE.to_string();
            }
        }
    }

    fn audio(&mut self, settings: &mut Settings) {
        let audio = &mut settings.realtime.audio;
        self.one_of(
            "realtime.audio.export.type",
            &mut audio.export.file_type,
            SUPPORTED_EXPORT_TYPES,
            "wav",
        );
        self.one_of(
            "realtime.audio.stream_transport",
            &mut audio.stream_transport,
            SUPPORTED_STREAM_TRANSPORTS,
            "auto",
        );
        if audio.sound_level.enabled && audio.sound_level.interval == 0 {
            self.fatal(
                FindingCode::OutOfRange,
                "realtime.audio.sound_level.interval",
                "must be at least 1 second".to_string(),
            );
        }
    }

    fn webserver(&mut self, settings: &mut Settings) {
        let web = &settings.webserver;
        if !web.enabled {
            return;
        }
        match web.port.trim().parse::<u16>() {
            Ok(port) if port > 0 => {}
            _ => self.fatal(
                FindingCode::InvalidValue,
                "webserver.port",
                format!("{:?} is not a valid TCP port (1-65535)", web.port),
            ),
        }
    }

    fn security(&mut self, settings: &mut Settings) {
        let security = &settings.security;
        if security.auto_tls {
            self.required("security.host", &security.host, "auto_tls is enabled");
        }
        if security.allow_subnet_bypass.enabled {
            self.required(
                "security.allow_subnet_bypass.subnet",
                &security.allow_subnet_bypass.subnet,
                "subnet bypass is enabled",
            );
        }
        if security.basic_auth.enabled {
            self.required(
                "security.basic_auth.password",
                &security.basic_auth.password,
                "basic auth is enabled",
            );
        }
        self.social("security.google_auth", &security.google_auth);
        self.social("security.github_auth", &security.github_auth);
    }

    fn social(&mut self, field: &str, provider: &SocialProvider) {
        if !provider.enabled {
            return;
        }
        self.required(
            &format!("{field}.client_id"),
            &provider.client_id,
            "the provider is enabled",
        );
        self.required(
            &format!("{field}.client_secret"),
            &provider.client_secret,
            "the provider is enabled",
        );
    }

    fn integrations(&mut self, settings: &mut Settings) {
        let realtime = &settings.realtime;
        if realtime.mqtt.enabled {
            self.required("realtime.mqtt.broker", &realtime.mqtt.broker, "MQTT is enabled");
            self.retry("realtime.mqtt.retry_settings", &realtime.mqtt.retry_settings);
        }

        let birdweather = &realtime.birdweather;
        if birdweather.enabled {
            self.required(
                "realtime.birdweather.id",
                &birdweather.id,
                "BirdWeather uploads are enabled",
            );
            self.range(
                "realtime.birdweather.threshold",
                birdweather.threshold,
                0.0,
                1.0,
            );
            self.retry(
                "realtime.birdweather.retry_settings",
                &birdweather.retry_settings,
            );
        }
    }

    fn retry(&mut self, field: &str, retry: &RetrySettings) {
        if !retry.enabled {
            return;
        }
        if retry.backoff_multiplier < 1.0 {
            self.fatal(
                FindingCode::OutOfRange,
                &format!("{field}.backoff_multiplier"),
                format!("{} must be at least 1.0", retry.backoff_multiplier),
            );
        }
        if retry.initial_delay > retry.max_delay {
            self.fatal(
                FindingCode::InvalidValue,
                &format!("{field}.initial_delay"),
                format!(
                    "{}s exceeds max_delay {}s",
                    retry.initial_delay, retry.max_delay
                ),
            );
        }
    }

    fn monitoring(&mut self, settings: &mut Settings) {
        let monitoring = &settings.realtime.monitoring;
        if !monitoring.enabled {
            return;
        }
        let thresholds = [
            ("cpu", monitoring.cpu.enabled, monitoring.cpu.warning, monitoring.cpu.critical),
            (
                "memory",
                monitoring.memory.enabled,
                monitoring.memory.warning,
                monitoring.memory.critical,
            ),
            (
                "disk",
                monitoring.disk.enabled,
                monitoring.disk.warning,
                monitoring.disk.critical,
            ),
        ];
        for (name, enabled, warning, critical) in thresholds {
            if !enabled {
                continue;
            }
            let field = format!("realtime.monitoring.{name}");
            self.range(&format!("{field}.warning"), warning, 0.0, 100.0);
            self.range(&format!("{field}.critical"), critical, 0.0, 100.0);
            if warning >= critical {
                self.fatal(
                    FindingCode::InvalidValue,
                    &field,
                    format!("warning threshold {warning} must be below critical {critical}"),
                );
            }
        }
    }

    fn weather(&mut self, settings: &mut Settings) {
        let weather = &mut settings.realtime.weather;
        if !weather.provider.trim().is_empty() {
            self.one_of(
                "realtime.weather.provider",
                &mut weather.provider,
                SUPPORTED_WEATHER_PROVIDERS,
                "yrno",
            );
        }
        let (provider, openweather) = settings.weather_settings();
        if provider == WeatherProvider::OpenWeather {
            self.required(
                "realtime.weather.openweather.api_key",
                &openweather.api_key,
                "OpenWeather is the weather provider",
            );
        }
    }

    fn backup(&mut self, settings: &mut Settings) {
        let backup = &settings.backup;

        for (index, target) in backup.targets.iter().enumerate() {
            if let Err(err) = target.resolve() {
                let state = if target.enabled { "enabled" } else { "disabled" };
                self.warn(
                    FindingCode::InvalidTarget,
                    &format!("backup.targets[{index}]"),
                    format!(
                        "{state} {} target is unusable until corrected: {err}",
                        target.type_name()
                    ),
                );
            }
        }

        for (index, schedule) in backup.schedules.iter().enumerate() {
            let Err(err) = schedule.check() else {
                continue;
            };
            let field = format!("backup.schedules[{index}]");
            if backup.enabled {
                self.fatal(FindingCode::InvalidSchedule, &field, err.to_string());
            } else {
                self.warn(
                    FindingCode::InvalidSchedule,
                    &field,
                    format!("{err} (ignored while backups are disabled)"),
                );
            }
        }

        if !backup.enabled {
            return;
        }

        if let Err(err) = backup.retention.max_age() {
            self.fatal(
                FindingCode::InvalidValue,
                "backup.retention.maxage",
                err.to_string(),
            );
        }
        let retention = &backup.retention;
        if retention.max_backups > 0 && retention.min_backups > retention.max_backups {
            self.fatal(
                FindingCode::InvalidValue,
                "backup.retention.minbackups",
                format!(
                    "{} exceeds maxbackups {}",
                    retention.min_backups, retention.max_backups
                ),
            );
        }

        if backup.encryption && !backup.encryption_key.is_empty() {
            let decoded_len = BASE64
                .decode(backup.encryption_key.trim())
                .map(|key| key.len());
            if decoded_len != Ok(ENCRYPTION_KEY_LEN) {
                self.fatal(
                    FindingCode::InvalidValue,
                    "backup.encryption_key",
                    format!("must be base64 encoding of {ENCRYPTION_KEY_LEN} bytes"),
                );
            }
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
