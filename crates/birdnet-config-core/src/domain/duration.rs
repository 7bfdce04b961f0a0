//! Duration strings used in the configuration document.
//!
//! Two dialects appear in the document:
//!
//! - **Operation durations** (`"2h"`, `"15m"`, `"1h30m"`, `"90s"`, `"500ms"`).
//!   Units are `h`, `m` (minutes), `s` and `ms`; components may be chained.
//! - **Retention ages** (`"30d"`, `"4w"`, `"6m"`, `"1y"`).  A single component
//!   with calendar-like units: `d`, `w`, `m` (months of 30 days) and `y`
//!   (years of 365 days).
//!
//! Note that `m` means *minutes* in the first dialect and *months* in the
//! second.  The dialects are never mixed on the same field.

use std::time::Duration;

use thiserror::Error;

const SECS_PER_MINUTE: u64 = 60;
const SECS_PER_HOUR: u64 = 60 * SECS_PER_MINUTE;
const SECS_PER_DAY: u64 = 24 * SECS_PER_HOUR;

/// Error returned when a duration string cannot be parsed.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum DurationError {
    /// The string was empty or only whitespace.
    #[error("duration string is empty")]
    Empty,

    /// The string is not of the form `<number><unit>...`.
    #[error("invalid duration {input:?}: {reason}")]
    Invalid { input: String, reason: &'static str },

    /// The unit suffix is not one of the accepted units.
    #[error("unknown unit {unit:?} in duration {input:?}")]
    UnknownUnit { input: String, unit: String },
}

/// Parses an operation duration such as `"2h"` or `"1h30m"`.
///
/// # Errors
///
/// Returns [`DurationError`] if the string is empty, a component lacks a
/// number or a unit, or a unit is not one of `h`, `m`, `s`, `ms`.
pub fn parse_duration(input: &str) -> Result<Duration, DurationError> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return Err(DurationError::Empty);
    }

    let mut total = Duration::ZERO;
    let mut rest = trimmed;
    while !rest.is_empty() {
        let (value, unit, remainder) = split_component(trimmed, rest)?;
        let component = match unit {
            "h" => Duration::from_secs(checked_secs(trimmed, value, SECS_PER_HOUR)?),
            "m" => Duration::from_secs(checked_secs(trimmed, value, SECS_PER_MINUTE)?),
            "s" => Duration::from_secs(value),
            "ms" => Duration::from_millis(value),
            other => {
                return Err(DurationError::UnknownUnit {
                    input: trimmed.to_string(),
                    unit: other.to_string(),
                })
            }
        };
        total = total.checked_add(component).ok_or_else(|| DurationError::Invalid {
            input: trimmed.to_string(),
            reason: "duration out of range",
        })?;
        rest = remainder;
    }
    Ok(total)
}

/// Parses a retention age such as `"30d"`, `"6m"` or `"1y"`.
///
/// # Errors
///
/// Returns [`DurationError`] if the string is empty, has more than one
/// component, or uses a unit other than `d`, `w`, `m`, `y`.
pub fn parse_retention_age(input: &str) -> Result<Duration, DurationError> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return Err(DurationError::Empty);
    }

    let (value, unit, remainder) = split_component(trimmed, trimmed)?;
    if !remainder.is_empty() {
        return Err(DurationError::Invalid {
            input: trimmed.to_string(),
            reason: "retention age takes a single component",
        });
    }

    let days_per_unit = match unit {
        "d" => 1,
        "w" => 7,
        "m" => 30,
        "y" => 365,
        other => {
            return Err(DurationError::UnknownUnit {
                input: trimmed.to_string(),
                unit: other.to_string(),
            })
        }
    };
    Ok(Duration::from_secs(checked_secs(
        trimmed,
        value,
        days_per_unit * SECS_PER_DAY,
    )?))
}

/// Formats a duration in the operation dialect, e.g. `5400s` → `"1h30m"`.
///
/// The output always parses back to the same value with [`parse_duration`].
pub fn format_duration(duration: Duration) -> String {
    let mut secs = duration.as_secs();
    let millis = duration.subsec_millis();
    if secs == 0 && millis == 0 {
        return "0s".to_string();
    }

    let mut out = String::new();
    let hours = secs / SECS_PER_HOUR;
    secs %= SECS_PER_HOUR;
    let minutes = secs / SECS_PER_MINUTE;
    secs %= SECS_PER_MINUTE;

    if hours > 0 {
        out.push_str(&format!("{hours}h"));
    }
    if minutes > 0 {
        out.push_str(&format!("{minutes}m"));
    }
    if secs > 0 {
        out.push_str(&format!("{secs}s"));
    }
    if millis > 0 {
        out.push_str(&format!("{millis}ms"));
    }
    out
}

/// Splits the leading `<number><unit>` component off `rest`.
fn split_component<'a>(
    input: &str,
    rest: &'a str,
) -> Result<(u64, &'a str, &'a str), DurationError> {
    let digits_end = rest
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(rest.len());
    if digits_end == 0 {
        return Err(DurationError::Invalid {
            input: input.to_string(),
            reason: "expected a number",
        });
    }
    let value: u64 = rest[..digits_end]
        .parse()
        .map_err(|_| DurationError::Invalid {
            input: input.to_string(),
            reason: "number out of range",
        })?;

    let after_digits = &rest[digits_end..];
    let unit_end = after_digits
        .find(|c: char| c.is_ascii_digit())
        .unwrap_or(after_digits.len());
    if unit_end == 0 {
        return Err(DurationError::Invalid {
            input: input.to_string(),
            reason: "missing unit",
        });
    }
    Ok((value, &after_digits[..unit_end], &after_digits[unit_end..]))
}

fn checked_secs(input: &str, value: u64, multiplier: u64) -> Result<u64, DurationError> {
    value
        .checked_mul(multiplier)
        .ok_or_else(|| DurationError::Invalid {
            input: input.to_string(),
            reason: "number out of range",
        })
}

/// `serde` adapter for a required [`Duration`] stored as an operation string.
pub mod serde_duration {
    use std::time::Duration;

    use serde::{de::Error as _, Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&super::format_duration(*value))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        let raw = String::deserialize(deserializer)?;
        super::parse_duration(&raw).map_err(D::Error::custom)
    }
}

/// `serde` adapter for an optional [`Duration`]; an empty string means unset.
pub mod serde_opt_duration {
    use std::time::Duration;

    use serde::{de::Error as _, Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(
        value: &Option<Duration>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        match value {
            Some(duration) => serializer.serialize_str(&super::format_duration(*duration)),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<Duration>, D::Error> {
        let raw: Option<String> = Option::deserialize(deserializer)?;
        match raw.as_deref().map(str::trim) {
            None | Some("") => Ok(None),
            Some(text) => super::parse_duration(text)
                .map(Some)
                .map_err(D::Error::custom),
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
