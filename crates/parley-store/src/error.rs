//! Key store error types.
//!
//! - `Io`: the backing database could not be opened, read or written
//! - `Corrupt`: a stored value is not valid key text

use thiserror::Error;

/// Errors that can occur during key store operations
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// I/O error (file system, database, etc.)
    #[error("I/O error: {0}")]
    Io(String),

    /// Stored bytes are not valid UTF-8 key text
    #[error("corrupt entry for scope {scope}: {reason}")]
    Corrupt {
        /// Scope whose value failed to decode
        scope: String,
        /// Decoder message
        reason: String,
    },
}

impl From<std::io::Error> for StoreError {
    fn from(err: std::io::Error) -> Self {
        StoreError::Io(err.to_string())
    }
}
