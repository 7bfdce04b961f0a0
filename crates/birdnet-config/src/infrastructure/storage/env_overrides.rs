//! Environment variable overrides for the merged configuration tree.
//!
//! A variable named `BIRDNET_<PATH>` overrides the value at `<PATH>`, where
//! the nested keys are joined with `__` (double underscore).  Matching is
//! case-insensitive:
//!
//! ```text
//! BIRDNET_DEBUG=true                        → debug
//! BIRDNET_REALTIME__MQTT__BROKER=tcp://x    → realtime.mqtt.broker
//! BIRDNET_REALTIME__RTSP__URLS=rtsp://a,rtsp://b
//! ```
//!
//! Overrides are applied to the untyped TOML tree *before* it is decoded into
//! `Settings`, so the string from the environment must be converted into the
//! right TOML type.  The type of the value already present at that path
//! decides (every path in the embedded template has one); a path that does
//! not exist yet gets the first type that parses: boolean, integer, float,
//! then string.  Arrays are written as comma-separated lists.  A variable
//! naming a whole table (`BIRDNET_REALTIME=1`) is skipped with a warning.

use toml::{Table, Value};
use tracing::{debug, warn};

use crate::error::ConfigError;

/// Prefix selecting the variables that are configuration overrides.
pub const ENV_PREFIX: &str = "BIRDNET_";

/// Separator between nested keys in a variable name.
pub const PATH_DELIMITER: &str = "__";

const OPERATION: &str = "apply-env-overrides";

/// Applies every `BIRDNET_*` variable in `vars` to `tree`.
///
/// Variables are applied in name order so the result does not depend on the
/// iteration order of the environment.  Returns the number of overrides
/// applied; variables naming a whole table are skipped and not counted.
///
/// # Errors
///
/// Returns [`ConfigError::Configuration`] when a variable names a path through
/// a non-table value, or its value cannot be converted to the existing type.
pub fn apply_env_overrides<I, K, V>(tree: &mut Table, vars: I) -> Result<usize, ConfigError>
where
    I: IntoIterator<Item = (K, V)>,
    K: AsRef<str>,
    V: AsRef<str>,
{
    let mut overrides: Vec<(String, Vec<String>, String)> = vars
        .into_iter()
        .filter_map(|(key, value)| {
            let key = key.as_ref();
            let path = override_path(key)?;
            Some((key.to_string(), path, value.as_ref().to_string()))
        })
        .collect();
    overrides.sort_by(|a, b| a.0.cmp(&b.0));

    let mut applied = 0;
    for (key, path, raw) in &overrides {
        let outcome = set_path(tree, path, raw).map_err(|reason| ConfigError::Configuration {
            operation: OPERATION,
            message: format!("environment variable {key}: {reason}"),
        })?;
        match outcome {
            Outcome::Applied => {
                applied += 1;
                debug!(key = %key, path = %path.join("."), "applied environment override");
            }
            Outcome::NamesTable => {
                warn!(
                    key = %key,
                    path = %path.join("."),
                    "environment variable names a whole table; ignored"
                );
            }
        }
    }
    Ok(applied)
}

/// Splits `BIRDNET_A__B__C` into `["a", "b", "c"]`.
///
/// Returns `None` for variables without the prefix, with nothing after it,
/// or with an empty path segment.
fn override_path(key: &str) -> Option<Vec<String>> {
    let prefix = key.get(..ENV_PREFIX.len())?;
    if !prefix.eq_ignore_ascii_case(ENV_PREFIX) {
        return None;
    }
    let rest = &key[ENV_PREFIX.len()..];
    let path: Vec<String> = rest
        .split(PATH_DELIMITER)
        .map(str::to_ascii_lowercase)
        .collect();
    if path.iter().any(String::is_empty) {
        return None;
    }
    Some(path)
}

enum Outcome {
    Applied,
    NamesTable,
}

fn set_path(tree: &mut Table, path: &[String], raw: &str) -> Result<Outcome, String> {
    let Some((leaf, parents)) = path.split_last() else {
        return Ok(Outcome::Applied);
    };

    let mut current = tree;
    for segment in parents {
        let key = existing_key(current, segment);
        let entry = current
            .entry(key)
            .or_insert_with(|| Value::Table(Table::new()));
        current = match entry {
            Value::Table(table) => table,
            other => {
                return Err(format!(
                    "{segment} holds a {}, not a table",
                    other.type_str()
                ))
            }
        };
    }

    let key = existing_key(current, leaf);
    let value = match current.get(&key) {
        Some(Value::Table(_)) => return Ok(Outcome::NamesTable),
        Some(existing) => coerce(existing, raw)?,
        None => infer(raw),
    };
    current.insert(key, value);
    Ok(Outcome::Applied)
}

/// The key in `table` equal to `segment` ignoring case, or `segment` itself.
fn existing_key(table: &Table, segment: &str) -> String {
    table
        .keys()
        .find(|k| k.eq_ignore_ascii_case(segment))
        .cloned()
        .unwrap_or_else(|| segment.to_string())
}

/// Converts `raw` into the TOML type of `existing`.
fn coerce(existing: &Value, raw: &str) -> Result<Value, String> {
    match existing {
        Value::String(_) => Ok(Value::String(raw.to_string())),
        Value::Boolean(_) => parse_bool(raw)
            .map(Value::Boolean)
            .ok_or_else(|| format!("expected a boolean, got {raw:?}")),
        Value::Integer(_) => raw
            .trim()
            .parse::<i64>()
            .map(Value::Integer)
            .map_err(|_| format!("expected an integer, got {raw:?}")),
        Value::Float(_) => raw
            .trim()
            .parse::<f64>()
            .map(Value::Float)
            .map_err(|_| format!("expected a number, got {raw:?}")),
        Value::Datetime(_) => raw
            .trim()
            .parse::<toml::value::Datetime>()
            .map(Value::Datetime)
            .map_err(|_| format!("expected a date-time, got {raw:?}")),
        Value::Array(items) => {
            if items.iter().any(Value::is_table) {
                return Err("arrays of tables cannot be set from the environment".to_string());
            }
            let element = items.first();
            split_list(raw)
                .map(|item| match element {
                    Some(template) => coerce(template, item),
                    None => Ok(Value::String(item.to_string())),
                })
                .collect::<Result<Vec<_>, _>>()
                .map(Value::Array)
        }
        Value::Table(_) => Err("a whole table cannot be replaced by a single value".to_string()),
    }
}

/// Picks the narrowest type `raw` parses as.
fn infer(raw: &str) -> Value {
    let trimmed = raw.trim();
    if trimmed.eq_ignore_ascii_case("true") {
        return Value::Boolean(true);
    }
    if trimmed.eq_ignore_ascii_case("false") {
        return Value::Boolean(false);
    }
    if let Ok(n) = trimmed.parse::<i64>() {
        return Value::Integer(n);
    }
    if let Ok(f) = trimmed.parse::<f64>() {
        return Value::Float(f);
    }
    Value::String(raw.to_string())
}

fn parse_bool(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Some(true),
        "false" | "0" | "no" | "off" => Some(false),
        _ => None,
    }
}

fn split_list(raw: &str) -> impl Iterator<Item = &str> {
    raw.split(',').map(str::trim).filter(|item| !item.is_empty())
}

// ── Tests ─────────────────────────────────────────────────────────────────────
