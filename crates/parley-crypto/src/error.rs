//! Cipher error types.

use thiserror::Error;

/// Errors produced by [`crate::Cipher`] implementations.
///
/// Every failure is reported as a value. Malformed or hostile ciphertext
/// must never panic.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CipherError {
    /// Key material has no bytes; the keystream would be undefined.
    #[error("key material is empty")]
    EmptyKey,

    /// Ciphertext is not valid base64, is truncated, or does not decode to
    /// UTF-8 text.
    #[error("malformed ciphertext: {reason}")]
    Malformed {
        /// What was wrong with the input
        reason: String,
    },

    /// Authentication tag did not verify (tampering or wrong key).
    #[error("authentication failed")]
    Authentication,

    /// OS entropy source failed while drawing a nonce.
    #[error("entropy unavailable: {0}")]
    Entropy(String),
}

impl CipherError {
    pub(crate) fn malformed(reason: impl Into<String>) -> Self {
        Self::Malformed { reason: reason.into() }
    }
}
