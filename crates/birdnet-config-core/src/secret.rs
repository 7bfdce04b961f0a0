//! Random secrets for OAuth clients and session cookies.
//!
//! A secret is 32 bytes from the operating system's CSPRNG, encoded as
//! URL-safe base64 without padding (43 characters).  The byte source sits
//! behind [`EntropySource`] so the failure path can be exercised in tests.
//!
//! Generation never aborts the caller: on failure an error is logged with
//! category `system` and `None` is returned.  An empty secret is treated as
//! "not configured" everywhere in the settings.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine as _;
use rand::rngs::OsRng;
use rand::RngCore;
use thiserror::Error;
use tracing::error;

use crate::error::ErrorCategory;

/// Bytes of entropy per secret.
pub const SECRET_BYTES: usize = 32;

/// Length of an encoded secret.
pub const SECRET_LEN: usize = 43;

/// The byte source could not deliver randomness.
#[derive(Debug, Error)]
#[error("random source unavailable: {0}")]
pub struct EntropyError(pub String);

/// Fills buffers with cryptographically secure random bytes.
#[cfg_attr(test, mockall::automock)]
pub trait EntropySource: Send + Sync {
    fn fill(&self, buf: &mut [u8]) -> Result<(), EntropyError>;
}

/// [`EntropySource`] backed by the operating system.
#[derive(Debug, Default, Clone, Copy)]
pub struct OsEntropy;

impl EntropySource for OsEntropy {
    fn fill(&self, buf: &mut [u8]) -> Result<(), EntropyError> {
        OsRng
            .try_fill_bytes(buf)
            .map_err(|e| EntropyError(e.to_string()))
    }
}

/// Produces encoded secrets from an [`EntropySource`].
#[derive(Debug, Default)]
pub struct SecretGenerator<E = OsEntropy> {
    source: E,
}

impl SecretGenerator<OsEntropy> {
    pub fn new() -> Self {
        Self { source: OsEntropy }
    }
}

impl<E: EntropySource> SecretGenerator<E> {
    pub fn with_source(source: E) -> Self {
        Self { source }
    }

    /// Returns a fresh secret, or `None` when the source fails.
    pub fn generate(&self) -> Option<String> {
        let mut bytes = [0u8; SECRET_BYTES];
        match self.source.fill(&mut bytes) {
            Ok(()) => Some(URL_SAFE_NO_PAD.encode(bytes)),
            Err(e) => {
                error!(
                    category = %ErrorCategory::System,
                    operation = "generate-random-secret",
                    error = %e,
                    "Failed to generate random secret"
                );
                None
            }
        }
    }
}

/// Shorthand for `SecretGenerator::new().generate()`.
pub fn generate_random_secret() -> Option<String> {
    SecretGenerator::new().generate()
}
