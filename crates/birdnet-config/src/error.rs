//! Error type for loading, validating and persisting the configuration.
//!
//! Every variant maps onto one [`ErrorCategory`] through
//! [`ConfigError::category`], and every variant that touches the file system
//! carries the operation name and the path involved.  Callers can therefore
//! log or branch on structured fields instead of parsing messages.

use std::io;
use std::path::PathBuf;

use birdnet_config_core::{ErrorCategory, Finding};
use thiserror::Error;

/// Errors raised by the configuration subsystem.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// No configuration search path could be determined for this platform.
    #[error("could not determine any configuration search path")]
    NoConfigPaths,

    /// The merged configuration tree is malformed.
    #[error("{operation}: {message}")]
    Configuration {
        operation: &'static str,
        message: String,
    },

    /// A TOML document could not be parsed or did not fit the settings model.
    #[error("{operation}: failed to parse {}: {source}", path.display())]
    Parse {
        operation: &'static str,
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    /// The settings could not be rendered as TOML.
    #[error("{operation}: failed to serialize settings: {source}")]
    Serialize {
        operation: &'static str,
        #[source]
        source: toml::ser::Error,
    },

    /// A file-system operation failed.
    #[error("{operation}: I/O error at {}: {source}", path.display())]
    Io {
        operation: &'static str,
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// Validation produced at least one fatal finding.
    #[error("invalid configuration: {}", join_findings(findings))]
    Validation { findings: Vec<Finding> },

    /// An operation needs settings that have not been loaded yet.
    #[error("settings have not been loaded")]
    NotLoaded,
}

impl ConfigError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            ConfigError::NoConfigPaths
            | ConfigError::Configuration { .. }
            | ConfigError::Parse { .. }
            | ConfigError::NotLoaded => ErrorCategory::Configuration,
            ConfigError::Serialize { .. } => ErrorCategory::System,
            ConfigError::Io { .. } => ErrorCategory::FileIo,
            ConfigError::Validation { .. } => ErrorCategory::Validation,
        }
    }

    /// Name of the failed operation, when the error carries one.
    pub fn operation(&self) -> Option<&'static str> {
        match self {
            ConfigError::Configuration { operation, .. }
            | ConfigError::Parse { operation, .. }
            | ConfigError::Serialize { operation, .. }
            | ConfigError::Io { operation, .. } => Some(*operation),
            _ => None,
        }
    }

    /// Builds a `map_err` adapter producing [`ConfigError::Io`].
    pub(crate) fn io(
        operation: &'static str,
        path: impl Into<PathBuf>,
    ) -> impl FnOnce(io::Error) -> Self {
        let path = path.into();
        move |source| ConfigError::Io {
            operation,
            path,
            source,
        }
    }
}

fn join_findings(findings: &[Finding]) -> String {
    findings
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use birdnet_config_core::{FindingCode, Severity};

    #[test]
    fn test_io_error_carries_category_operation_and_path() {
        // Arrange
        let source = io::Error::new(io::ErrorKind::PermissionDenied, "denied");

        // Act
        let err = ConfigError::io("read-config", "/etc/birdnet-go/config.toml")(source);

        // Assert
        assert_eq!(err.category(), ErrorCategory::FileIo);
        assert_eq!(err.operation(), Some("read-config"));
        let text = err.to_string();
        assert!(text.contains("read-config"), "{text}");
        assert!(text.contains("/etc/birdnet-go/config.toml"), "{text}");
    }

    #[test]
    fn test_validation_error_lists_every_finding() {
        let findings = vec![
            Finding {
                severity: Severity::Fatal,
                code: FindingCode::OutOfRange,
                field: "birdnet.threshold".into(),
                message: "2 is outside the allowed range 0 to 1".into(),
            },
            Finding {
                severity: Severity::Fatal,
                code: FindingCode::MissingValue,
                field: "realtime.mqtt.broker".into(),
                message: "must be set when MQTT is enabled".into(),
            },
        ];

        let err = ConfigError::Validation { findings };

        assert_eq!(err.category(), ErrorCategory::Validation);
        assert_eq!(
            err.to_string(),
            "invalid configuration: birdnet.threshold: 2 is outside the allowed range 0 to 1; \
             realtime.mqtt.broker: must be set when MQTT is enabled"
        );
    }

    #[test]
    fn test_not_loaded_is_a_configuration_error() {
        assert_eq!(ConfigError::NotLoaded.category(), ErrorCategory::Configuration);
        assert_eq!(ConfigError::NotLoaded.operation(), None);
    }
}
