//! Error categories shared by every layer.

use std::fmt;

/// Coarse classification attached to every configuration error and to the
/// structured `category` field of error logs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    /// Bad merge, unresolvable search path, unparsable document.
    Configuration,
    /// Semantic validation failed.
    Validation,
    /// Reading, writing, renaming or copying a file failed.
    FileIo,
    /// A runtime facility unrelated to the document failed.
    System,
}

impl ErrorCategory {
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorCategory::Configuration => "configuration",
            ErrorCategory::Validation => "validation",
            ErrorCategory::FileIo => "file-io",
            ErrorCategory::System => "system",
        }
    }
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
