//! Backup section of the settings: retention, schedules and timeouts.
//!
//! This crate only *describes* backups.  Running schedules, talking to the
//! targets and encrypting archives belong to the backup subsystem, which
//! reads these values from the settings store.

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::duration::{parse_retention_age, serde_opt_duration, DurationError};
use super::target::BackupTarget;

/// Default time limit for a complete backup run of one source.
pub const DEFAULT_BACKUP_TIMEOUT: Duration = Duration::from_secs(2 * 60 * 60);
/// Default time limit for storing one archive to one target.
pub const DEFAULT_STORE_TIMEOUT: Duration = Duration::from_secs(15 * 60);
/// Default time limit for a retention cleanup pass.
pub const DEFAULT_CLEANUP_TIMEOUT: Duration = Duration::from_secs(10 * 60);
/// Default time limit for deleting one archive from one target.
pub const DEFAULT_DELETE_TIMEOUT: Duration = Duration::from_secs(2 * 60);

/// The `backup` section.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BackupConfig {
    /// Master switch for manual and scheduled backups.
    pub enabled: bool,
    pub debug: bool,
    /// Encrypt archives with `encryption_key`.
    pub encryption: bool,
    /// Base64-encoded 256-bit key reference.  Stored, never used here.
    pub encryption_key: String,
    /// Strip credentials from the config copy included in archives.
    pub sanitize_config: bool,
    pub retention: BackupRetention,
    /// Destinations, in the order they are written to.
    pub targets: Vec<BackupTarget>,
    pub schedules: Vec<BackupSchedule>,
    pub operation_timeouts: OperationTimeouts,
}

impl Default for BackupConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            debug: false,
            encryption: false,
            encryption_key: String::new(),
            sanitize_config: true,
            retention: BackupRetention::default(),
            targets: Vec::new(),
            schedules: Vec::new(),
            operation_timeouts: OperationTimeouts::default(),
        }
    }
}

impl BackupConfig {
    /// Targets that are switched on, in document order.
    pub fn enabled_targets(&self) -> impl Iterator<Item = &BackupTarget> {
        self.targets.iter().filter(|t| t.enabled)
    }
}

// ── Retention ─────────────────────────────────────────────────────────────────

/// Retention limits for stored backups: maximum age, maximum count and a
/// minimum number of newest backups to keep.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BackupRetention {
    /// Age string such as `"30d"`, `"6m"`, `"1y"`.  Empty disables the age limit.
    #[serde(rename = "maxage")]
    pub max_age: String,
    /// Maximum number of backups to keep; `0` means unlimited.
    #[serde(rename = "maxbackups")]
    pub max_backups: u32,
    /// Number of newest backups that are always kept.
    #[serde(rename = "minbackups")]
    pub min_backups: u32,
}

impl Default for BackupRetention {
    fn default() -> Self {
        Self {
            max_age: "30d".to_string(),
            max_backups: 30,
            min_backups: 7,
        }
    }
}

impl BackupRetention {
    /// Parsed `max_age`; `Ok(None)` when no age limit is configured.
    pub fn max_age(&self) -> Result<Option<Duration>, DurationError> {
        if self.max_age.trim().is_empty() {
            return Ok(None);
        }
        parse_retention_age(&self.max_age).map(Some)
    }
}

// ── Schedules ─────────────────────────────────────────────────────────────────

/// Error produced while interpreting a schedule entry.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ScheduleError {
    #[error("schedule hour {0} out of range (0-23)")]
    Hour(i64),

    #[error("schedule minute {0} out of range (0-59)")]
    Minute(i64),

    #[error("invalid weekday {0:?}: expected Sunday..Saturday or 0..6")]
    Weekday(String),
}

/// Day of the week, numbered from Sunday = 0.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Weekday {
    Sunday,
    Monday,
    Tuesday,
    Wednesday,
    Thursday,
    Friday,
    Saturday,
}

impl Weekday {
    const ALL: [Weekday; 7] = [
        Weekday::Sunday,
        Weekday::Monday,
        Weekday::Tuesday,
        Weekday::Wednesday,
        Weekday::Thursday,
        Weekday::Friday,
        Weekday::Saturday,
    ];

    /// Zero-based index with Sunday = 0.
    pub fn number(self) -> u8 {
        self as u8
    }

    pub fn name(self) -> &'static str {
        match self {
            Weekday::Sunday => "Sunday",
            Weekday::Monday => "Monday",
            Weekday::Tuesday => "Tuesday",
            Weekday::Wednesday => "Wednesday",
            Weekday::Thursday => "Thursday",
            Weekday::Friday => "Friday",
            Weekday::Saturday => "Saturday",
        }
    }
}

impl fmt::Display for Weekday {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Weekday {
    type Err = ScheduleError;

    /// Accepts a case-insensitive English name or a digit `0`..`6`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        if let Ok(n) = trimmed.parse::<usize>() {
            return Weekday::ALL
                .get(n)
                .copied()
                .ok_or_else(|| ScheduleError::Weekday(s.to_string()));
        }
        Weekday::ALL
            .into_iter()
            .find(|day| day.name().eq_ignore_ascii_case(trimmed))
            .ok_or_else(|| ScheduleError::Weekday(s.to_string()))
    }
}

/// One entry of `backup.schedules`: a daily or weekly wall-clock time.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BackupSchedule {
    pub enabled: bool,
    /// 0-23.  Decoded wider so out-of-range values reach [`Self::check`].
    pub hour: i64,
    /// 0-59.
    pub minute: i64,
    /// Weekday name or number; ignored for daily schedules.
    pub weekday: String,
    #[serde(rename = "isweekly")]
    pub is_weekly: bool,
}

impl BackupSchedule {
    /// The weekday a weekly schedule runs on, `None` for daily schedules.
    ///
    /// # Errors
    ///
    /// Returns [`ScheduleError::Weekday`] when a weekly schedule names an
    /// unrecognised day.
    pub fn weekday(&self) -> Result<Option<Weekday>, ScheduleError> {
        if !self.is_weekly {
            return Ok(None);
        }
        self.weekday.parse().map(Some)
    }

    /// Checks hour, minute and (for weekly schedules) the weekday.
    pub fn check(&self) -> Result<(), ScheduleError> {
        if !(0..=23).contains(&self.hour) {
            return Err(ScheduleError::Hour(self.hour));
        }
        if !(0..=59).contains(&self.minute) {
            return Err(ScheduleError::Minute(self.minute));
        }
        self.weekday().map(|_| ())
    }
}

// ── Timeouts ──────────────────────────────────────────────────────────────────

/// Per-operation time limits.  Unset entries fall back to fixed defaults.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct OperationTimeouts {
    #[serde(with = "serde_opt_duration", skip_serializing_if = "Option::is_none")]
    pub backup: Option<Duration>,
    #[serde(with = "serde_opt_duration", skip_serializing_if = "Option::is_none")]
    pub store: Option<Duration>,
    #[serde(with = "serde_opt_duration", skip_serializing_if = "Option::is_none")]
    pub cleanup: Option<Duration>,
    #[serde(with = "serde_opt_duration", skip_serializing_if = "Option::is_none")]
    pub delete: Option<Duration>,
}

impl OperationTimeouts {
    pub fn backup(&self) -> Duration {
        effective(self.backup, DEFAULT_BACKUP_TIMEOUT)
    }

    pub fn store(&self) -> Duration {
        effective(self.store, DEFAULT_STORE_TIMEOUT)
    }

    pub fn cleanup(&self) -> Duration {
        effective(self.cleanup, DEFAULT_CLEANUP_TIMEOUT)
    }

    pub fn delete(&self) -> Duration {
        effective(self.delete, DEFAULT_DELETE_TIMEOUT)
    }
}

/// A zero duration counts as unset.
fn effective(configured: Option<Duration>, default: Duration) -> Duration {
    configured.filter(|d| !d.is_zero()).unwrap_or(default)
}

// ── Tests ─────────────────────────────────────────────────────────────────────
