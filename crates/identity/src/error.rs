//! Error types for identity operations

use shared::PersistenceError;
use thiserror::Error;

/// Result type for identity operations
pub type IdentityResult<T> = Result<T, IdentityError>;

/// Errors that can occur while producing or parsing a broadcast identity
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum IdentityError {
    #[error("Invalid {what} length: expected {expected} bytes, got {actual}")]
    Format {
        what: &'static str,
        expected: usize,
        actual: usize,
    },

    #[error("Encryption failed: {0}")]
    Encryption(String),

    #[error("Decryption failed: {0}")]
    Decryption(String),

    #[error("No resident identity registered")]
    MissingResidentId,

    #[error("Key not available: {0}")]
    MissingKey(&'static str),

    #[error(transparent)]
    Persistence(#[from] PersistenceError),
}

impl IdentityError {
    /// True for malformed fixed-width buffers.
    pub fn is_format_error(&self) -> bool {
        matches!(self, IdentityError::Format { .. })
    }
}
