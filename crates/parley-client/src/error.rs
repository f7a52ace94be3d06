//! Error types for key resolution and the message pipeline.
//!
//! Decryption failures never appear here: they are absorbed per message by
//! the resolver and rendered as the sentinel. Everything below reaches the
//! caller, who owns any retry policy.

use parley_crypto::CipherError;
use parley_store::StoreError;
use thiserror::Error;

use crate::{MessageId, UserId};

/// Errors reported by the remote message store.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RemoteError {
    /// No record with this id.
    #[error("message not found: {id}")]
    NotFound {
        /// Requested remote id
        id: String,
    },

    /// Store could not be reached or timed out.
    #[error("remote store unavailable: {0}")]
    Unavailable(String),

    /// Store refused the request (permissions, validation).
    #[error("remote store rejected request: {0}")]
    Rejected(String),
}

impl RemoteError {
    /// Returns true if retrying the same request may succeed.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Unavailable(_))
    }
}

/// Errors from key management operations beyond plain resolution.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum KeyError {
    /// Local key storage failed.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// Backup requested for a user that has no key on this installation.
    #[error("no key stored for user {0}")]
    MissingUserKey(UserId),
}

/// Errors surfaced by [`crate::MessagePipeline`] operations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PipelineError {
    /// Body could not be encrypted; the send was rolled back.
    #[error("encryption failed: {0}")]
    Encryption(CipherError),

    /// Remote create/update failed; a send was rolled back.
    #[error("remote write failed: {0}")]
    RemoteWrite(RemoteError),

    /// Remote list failed; the timeline is unchanged.
    #[error("remote read failed: {0}")]
    RemoteRead(RemoteError),

    /// Local key storage failed while resolving a key.
    #[error("local storage failed: {0}")]
    LocalStorage(StoreError),

    /// Operation needs a confirmed message but got an optimistic one.
    #[error("message {0} is not confirmed yet")]
    Unconfirmed(MessageId),
}

impl PipelineError {
    /// Returns true if retrying the same operation may succeed.
    ///
    /// Only remote availability failures qualify; encryption and local
    /// storage failures will repeat.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::RemoteWrite(err) | Self::RemoteRead(err) => err.is_transient(),
            Self::Encryption(_) | Self::LocalStorage(_) | Self::Unconfirmed(_) => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_unavailable_is_transient() {
        assert!(RemoteError::Unavailable("timeout".into()).is_transient());
        assert!(!RemoteError::Rejected("denied".into()).is_transient());
        assert!(!RemoteError::NotFound { id: "m1".into() }.is_transient());
    }

    #[test]
    fn pipeline_transience_follows_remote() {
        let write = PipelineError::RemoteWrite(RemoteError::Unavailable("down".into()));
        let storage = PipelineError::LocalStorage(StoreError::Io("disk".into()));

        assert!(write.is_transient());
        assert!(!storage.is_transient());
        assert!(!PipelineError::Encryption(CipherError::EmptyKey).is_transient());
    }
}
