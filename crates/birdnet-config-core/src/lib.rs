//! # birdnet-config-core
//!
//! Settings model, validation rules and secret generation for BirdNET-Go
//! nodes.
//!
//! This crate has no file-system or process-level state.  Loading the
//! document, applying environment overrides and persisting changes live in
//! the `birdnet-config` crate, which builds on the types defined here.
//!
//! # Architecture overview (for beginners)
//!
//! - **`domain`** – The typed settings tree.  One struct per document table,
//!   each with its defaults.  Backup targets are a closed enum of
//!   destination kinds, each with its own required fields.
//!
//! - **`validation`** – A single pass over a merged [`Settings`] that reports
//!   [`Finding`]s.  Fatal findings make the configuration unusable; warnings
//!   come with a fallback already applied.
//!
//! - **`secret`** – URL-safe random secrets for the OAuth client and session
//!   cookies.

pub mod domain;
pub mod error;
pub mod secret;
pub mod validation;

// Re-export the most-used types at the crate root so callers can write
// `birdnet_config_core::Settings` instead of the full module path.
pub use domain::backup::{BackupConfig, BackupRetention, BackupSchedule, OperationTimeouts};
pub use domain::duration::{format_duration, parse_duration, DurationError};
pub use domain::retry::RetrySettings;
pub use domain::settings::{Settings, WeatherProvider, RUNTIME_ONLY_FIELDS};
pub use domain::target::{BackupTarget, TargetError, TargetKind, TargetSettings};
pub use error::ErrorCategory;
pub use secret::{generate_random_secret, SecretGenerator};
pub use validation::{validate_settings, Finding, FindingCode, Severity, ValidationReport};
