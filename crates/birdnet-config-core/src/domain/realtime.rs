//! Realtime-processing section of the settings.
//!
//! Everything under `[realtime]` configures the live detection pipeline and
//! the integrations that consume its detections (BirdWeather, MQTT, weather
//! providers, telemetry).  The pipeline itself lives elsewhere; these types
//! only hold values.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::retry::RetrySettings;

/// The `realtime` section.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RealtimeSettings {
    /// Minimum interval between repeated detections of a species, in seconds.
    pub interval: u32,
    /// Report processing time for every prediction.
    pub processing_time: bool,
    pub audio: AudioSettings,
    pub dashboard: DashboardSettings,
    pub dynamic_threshold: DynamicThresholdSettings,
    pub log: ObsLogSettings,
    pub birdweather: BirdweatherSettings,
    pub privacy_filter: PrivacyFilterSettings,
    pub dog_bark_filter: DogBarkFilterSettings,
    pub rtsp: RtspSettings,
    pub mqtt: MqttSettings,
    pub telemetry: TelemetrySettings,
    pub monitoring: MonitoringSettings,
    pub species: SpeciesSettings,
    pub weather: WeatherSettings,
}

impl Default for RealtimeSettings {
    fn default() -> Self {
        Self {
            interval: 15,
            processing_time: false,
            audio: AudioSettings::default(),
            dashboard: DashboardSettings::default(),
            dynamic_threshold: DynamicThresholdSettings::default(),
            log: ObsLogSettings::default(),
            birdweather: BirdweatherSettings::default(),
            privacy_filter: PrivacyFilterSettings::default(),
            dog_bark_filter: DogBarkFilterSettings::default(),
            rtsp: RtspSettings::default(),
            mqtt: MqttSettings::default(),
            telemetry: TelemetrySettings::default(),
            monitoring: MonitoringSettings::default(),
            species: SpeciesSettings::default(),
            weather: WeatherSettings::default(),
        }
    }
}

// ── Audio ─────────────────────────────────────────────────────────────────────

/// Audio capture and clip export.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AudioSettings {
    /// Capture device name; empty selects the system default.
    pub source: String,
    /// Resolved path of the ffmpeg binary.  Runtime only.
    #[serde(skip)]
    pub ffmpeg_path: String,
    /// Resolved path of the sox binary.  Runtime only.
    #[serde(skip)]
    pub sox_path: String,
    /// File types sox can decode on this host.  Runtime only.
    #[serde(skip)]
    pub sox_audio_types: Vec<String>,
    /// Browser streaming transport: `auto`, `sse` or `ws`.
    pub stream_transport: String,
    pub export: ExportSettings,
    pub sound_level: SoundLevelSettings,
    pub use_audio_core: bool,
    pub equalizer: EqualizerSettings,
}

impl Default for AudioSettings {
    fn default() -> Self {
        Self {
            source: String::new(),
            ffmpeg_path: String::new(),
            sox_path: String::new(),
            sox_audio_types: Vec::new(),
            stream_transport: "auto".to_string(),
            export: ExportSettings::default(),
            sound_level: SoundLevelSettings::default(),
            use_audio_core: false,
            equalizer: EqualizerSettings::default(),
        }
    }
}

/// Export of audio clips containing detections.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExportSettings {
    pub debug: bool,
    pub enabled: bool,
    /// Directory clips are written to.
    pub path: String,
    /// Container format: `wav`, `flac`, `aac`, `opus` or `mp3`.
    #[serde(rename = "type")]
    pub file_type: String,
    /// Bitrate for lossy formats, e.g. `"96k"`.
    pub bitrate: String,
    pub retention: ClipRetentionSettings,
}

impl Default for ExportSettings {
    fn default() -> Self {
        Self {
            debug: false,
            enabled: false,
            path: "clips/".to_string(),
            file_type: "wav".to_string(),
            bitrate: "96k".to_string(),
            retention: ClipRetentionSettings::default(),
        }
    }
}

/// Cleanup policy for exported clips.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClipRetentionSettings {
    pub debug: bool,
    /// `none`, `age` or `usage`.
    pub policy: String,
    pub max_age: String,
    /// Disk usage threshold such as `"80%"`.
    pub max_usage: String,
    /// Clips always kept per species.
    pub min_clips: u32,
    pub keep_spectrograms: bool,
}

impl Default for ClipRetentionSettings {
    fn default() -> Self {
        Self {
            debug: false,
            policy: "usage".to_string(),
            max_age: "30d".to_string(),
            max_usage: "80%".to_string(),
            min_clips: 10,
            keep_spectrograms: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SoundLevelSettings {
    pub enabled: bool,
    /// Measurement interval in seconds.
    pub interval: u32,
    pub debug: bool,
    pub debug_realtime_logging: bool,
}

impl Default for SoundLevelSettings {
    fn default() -> Self {
        Self {
            enabled: false,
            interval: 10,
            debug: false,
            debug_realtime_logging: false,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EqualizerSettings {
    pub enabled: bool,
    pub filters: Vec<EqualizerFilter>,
}

/// One filter stage of the input equalizer.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EqualizerFilter {
    /// `LowPass`, `HighPass`, `BandPass`, `BandReject`, `Peaking`, ...
    #[serde(rename = "type")]
    pub filter_type: String,
    pub frequency: f64,
    pub q: f64,
    /// Peaking filters only.
    pub gain: f64,
    /// Band filters only.
    pub width: f64,
    pub passes: u32,
}

// ── Dashboard ─────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DashboardSettings {
    pub thumbnails: ThumbnailSettings,
    /// Maximum number of species in the summary table.
    pub summary_limit: u32,
}

impl Default for DashboardSettings {
    fn default() -> Self {
        Self {
            thumbnails: ThumbnailSettings::default(),
            summary_limit: 100,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ThumbnailSettings {
    pub debug: bool,
    pub summary: bool,
    pub recent: bool,
    /// `auto`, `wikimedia` or `avicommons`.
    pub image_provider: String,
    /// `none` or `all`.
    pub fallback_policy: String,
}

impl Default for ThumbnailSettings {
    fn default() -> Self {
        Self {
            debug: false,
            summary: true,
            recent: true,
            image_provider: "auto".to_string(),
            fallback_policy: "all".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DynamicThresholdSettings {
    pub enabled: bool,
    pub debug: bool,
    pub trigger: f64,
    pub min: f64,
    pub valid_hours: u32,
}

impl Default for DynamicThresholdSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            debug: false,
            trigger: 0.9,
            min: 0.2,
            valid_hours: 24,
        }
    }
}

/// OBS chat log output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ObsLogSettings {
    pub enabled: bool,
    pub path: String,
}

impl Default for ObsLogSettings {
    fn default() -> Self {
        Self {
            enabled: false,
            path: "birdnet.txt".to_string(),
        }
    }
}

// ── Integrations ──────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BirdweatherSettings {
    pub enabled: bool,
    pub debug: bool,
    /// Station id issued by BirdWeather.
    pub id: String,
    /// Minimum confidence for uploads.
    pub threshold: f64,
    /// Location fuzzing radius in meters.
    pub location_accuracy: f64,
    pub retry_settings: RetrySettings,
}

impl Default for BirdweatherSettings {
    fn default() -> Self {
        Self {
            enabled: false,
            debug: false,
            id: String::new(),
            threshold: 0.9,
            location_accuracy: 500.0,
            retry_settings: RetrySettings::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PrivacyFilterSettings {
    pub debug: bool,
    pub enabled: bool,
    /// Human-voice confidence above which a clip is discarded.
    pub confidence: f64,
}

impl Default for PrivacyFilterSettings {
    fn default() -> Self {
        Self {
            debug: false,
            enabled: true,
            confidence: 0.05,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DogBarkFilterSettings {
    pub debug: bool,
    pub enabled: bool,
    pub confidence: f64,
    /// Minutes a bark is remembered for filtering.
    pub remember: u32,
    /// Species suppressed while a bark is remembered.
    pub species: Vec<String>,
}

impl Default for DogBarkFilterSettings {
    fn default() -> Self {
        Self {
            debug: false,
            enabled: true,
            confidence: 0.1,
            remember: 5,
            species: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RtspSettings {
    /// `tcp` or `udp`.
    pub transport: String,
    pub urls: Vec<String>,
    pub health: RtspHealthSettings,
    pub ffmpeg_parameters: Vec<String>,
}

impl Default for RtspSettings {
    fn default() -> Self {
        Self {
            transport: "tcp".to_string(),
            urls: Vec::new(),
            health: RtspHealthSettings::default(),
            ffmpeg_parameters: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RtspHealthSettings {
    /// Seconds without data before a stream counts as unhealthy.
    pub healthy_data_threshold: u32,
    /// Seconds between health checks.
    pub monitoring_interval: u32,
}

impl Default for RtspHealthSettings {
    fn default() -> Self {
        Self {
            healthy_data_threshold: 60,
            monitoring_interval: 30,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MqttSettings {
    pub enabled: bool,
    pub debug: bool,
    /// Broker URL, e.g. `tcp://localhost:1883`.
    pub broker: String,
    pub topic: String,
    pub username: String,
    pub password: String,
    pub retain: bool,
    pub retry_settings: RetrySettings,
    pub tls: MqttTlsSettings,
}

impl Default for MqttSettings {
    fn default() -> Self {
        Self {
            enabled: false,
            debug: false,
            broker: String::new(),
            topic: "birdnet".to_string(),
            username: String::new(),
            password: String::new(),
            retain: false,
            retry_settings: RetrySettings::default(),
            tls: MqttTlsSettings::default(),
        }
    }
}

/// TLS material for the MQTT connection.  Certificate paths are managed by
/// the web UI and omitted from the document while unset.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MqttTlsSettings {
    pub enabled: bool,
    pub insecure_skip_verify: bool,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub ca_cert: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub client_cert: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub client_key: String,
}

/// Prometheus-compatible metrics endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TelemetrySettings {
    pub enabled: bool,
    pub listen: String,
}

impl Default for TelemetrySettings {
    fn default() -> Self {
        Self {
            enabled: false,
            listen: "0.0.0.0:8090".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitoringSettings {
    pub enabled: bool,
    /// Seconds between resource checks.
    pub check_interval: u32,
    /// Minutes between repeated critical alerts.
    pub critical_resend_interval: u32,
    pub hysteresis_percent: f64,
    pub cpu: ThresholdSettings,
    pub memory: ThresholdSettings,
    pub disk: DiskThresholdSettings,
}

impl Default for MonitoringSettings {
    fn default() -> Self {
        Self {
            enabled: false,
            check_interval: 60,
            critical_resend_interval: 30,
            hysteresis_percent: 5.0,
            cpu: ThresholdSettings::default(),
            memory: ThresholdSettings::default(),
            disk: DiskThresholdSettings::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ThresholdSettings {
    pub enabled: bool,
    pub warning: f64,
    pub critical: f64,
}

impl Default for ThresholdSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            warning: 85.0,
            critical: 95.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DiskThresholdSettings {
    pub enabled: bool,
    pub warning: f64,
    pub critical: f64,
    pub paths: Vec<String>,
}

impl Default for DiskThresholdSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            warning: 85.0,
            critical: 95.0,
            paths: vec!["/".to_string()],
        }
    }
}

// ── Species ───────────────────────────────────────────────────────────────────

/// Per-species include/exclude lists and overrides.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SpeciesSettings {
    pub include: Vec<String>,
    pub exclude: Vec<String>,
    /// Keyed by species common or scientific name.
    pub config: BTreeMap<String, SpeciesConfig>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SpeciesConfig {
    pub threshold: f64,
    /// Custom detection interval in seconds; `0` uses the global interval.
    #[serde(skip_serializing_if = "is_zero")]
    pub interval: u32,
    pub actions: Vec<SpeciesAction>,
}

fn is_zero(value: &u32) -> bool {
    *value == 0
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SpeciesAction {
    /// Currently only `ExecuteCommand`.
    #[serde(rename = "type")]
    pub action_type: String,
    pub command: String,
    pub parameters: Vec<String>,
    /// Also run the default actions for this detection.
    pub execute_defaults: bool,
}

// ── Weather ───────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WeatherSettings {
    /// `none`, `yrno` or `openweather`.
    pub provider: String,
    /// Polling interval in minutes.
    pub poll_interval: u32,
    pub debug: bool,
    pub openweather: OpenWeatherSettings,
}

impl Default for WeatherSettings {
    fn default() -> Self {
        Self {
            provider: "yrno".to_string(),
            poll_interval: 60,
            debug: false,
            openweather: OpenWeatherSettings::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct OpenWeatherSettings {
    pub enabled: bool,
    pub api_key: String,
    pub endpoint: String,
    /// `standard`, `metric` or `imperial`.
    pub units: String,
    pub language: String,
}

impl Default for OpenWeatherSettings {
    fn default() -> Self {
        Self {
            enabled: false,
            api_key: String::new(),
            endpoint: "https://api.openweathermap.org/data/2.5/weather".to_string(),
            units: "metric".to_string(),
            language: "en".to_string(),
        }
    }
}
