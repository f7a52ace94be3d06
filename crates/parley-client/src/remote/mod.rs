//! Remote message store boundary.
//!
//! The remote store persists ciphertext records and assigns ids and
//! timestamps. It is the only asynchronous collaborator of the pipeline;
//! timeouts and transport concerns live behind this trait.

mod chaotic;
mod memory;

use std::{future::Future, sync::Arc};

pub use chaotic::ChaoticMessageStore;
pub use memory::MemoryMessageStore;

use crate::{ConversationId, MessagePatch, NewMessage, RemoteError, RemoteMessage};

/// Remote persistence for message records.
///
/// # Invariants
///
/// - `create_message` assigns a unique id and a creation time
/// - `list_messages` returns records in ascending creation order
pub trait MessageStore: Send + Sync + 'static {
    /// Persist a new record and return it with its assigned id and times.
    fn create_message(
        &self,
        message: NewMessage,
    ) -> impl Future<Output = Result<RemoteMessage, RemoteError>> + Send;

    /// Page through a conversation's history.
    ///
    /// Skips the `offset` newest records, takes the next `limit` newest, and
    /// returns them oldest first.
    fn list_messages(
        &self,
        conversation: &ConversationId,
        limit: usize,
        offset: usize,
    ) -> impl Future<Output = Result<Vec<RemoteMessage>, RemoteError>> + Send;

    /// Apply a partial update to one record.
    fn update_message(
        &self,
        id: &str,
        patch: MessagePatch,
    ) -> impl Future<Output = Result<RemoteMessage, RemoteError>> + Send;
}

impl<T: MessageStore> MessageStore for Arc<T> {
    fn create_message(
        &self,
        message: NewMessage,
    ) -> impl Future<Output = Result<RemoteMessage, RemoteError>> + Send {
        (**self).create_message(message)
    }

    fn list_messages(
        &self,
        conversation: &ConversationId,
        limit: usize,
        offset: usize,
    ) -> impl Future<Output = Result<Vec<RemoteMessage>, RemoteError>> + Send {
        (**self).list_messages(conversation, limit, offset)
    }

    fn update_message(
        &self,
        id: &str,
        patch: MessagePatch,
    ) -> impl Future<Output = Result<RemoteMessage, RemoteError>> + Send {
        (**self).update_message(id, patch)
    }
}
