//! Retry policy shared by the uploader integrations.
//!
//! [`RetrySettings`] is a plain value type embedded by composition in every
//! integration that retries failed deliveries (MQTT publishing, BirdWeather
//! uploads).  The integrations own the retry loop; this type only describes
//! the policy and computes the backoff schedule.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Exponential backoff policy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrySettings {
    /// Whether failed operations are retried at all.
    pub enabled: bool,
    /// Maximum number of retry attempts after the first failure.
    pub max_retries: u32,
    /// Delay before the first retry, in seconds.
    pub initial_delay: u64,
    /// Upper bound for any single delay, in seconds.
    pub max_delay: u64,
    /// Factor applied to the delay after each attempt.
    pub backoff_multiplier: f64,
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self {
            enabled: true,
            max_retries: 5,
            initial_delay: 30,
            max_delay: 3600,
            backoff_multiplier: 2.0,
        }
    }
}

impl RetrySettings {
    /// Returns the delay to wait before retry number `attempt` (zero-based).
    ///
    /// Returns `None` when retries are disabled or `attempt` exceeds
    /// `max_retries`.
    pub fn delay_for_attempt(&self, attempt: u32) -> Option<Duration> {
        if !self.enabled || attempt >= self.max_retries {
            return None;
        }
        let multiplier = self.backoff_multiplier.max(1.0);
        let exponent = i32::try_from(attempt).unwrap_or(i32::MAX);
        let secs = (self.initial_delay as f64) * multiplier.powi(exponent);
        let capped = secs.min(self.max_delay as f64);
        Some(Duration::from_secs_f64(capped.max(0.0)))
    }
}
