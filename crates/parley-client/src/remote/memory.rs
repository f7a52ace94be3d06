#![allow(clippy::disallowed_types, reason = "Synchronous in-memory operations only")]

use std::sync::{Arc, Mutex, MutexGuard};

use super::MessageStore;
use crate::{ConversationId, MessagePatch, NewMessage, RemoteError, RemoteMessage};

/// First timestamp handed out by the in-memory clock (2024-01-01T00:00:00Z).
const EPOCH_MILLIS: u64 = 1_704_067_200_000;

/// In-process remote store for tests, demos and offline sessions
///
/// Records live in one insertion-ordered Vec behind Arc<Mutex<>>, so clones
/// share state. Ids are `msg-<n>` and creation times come from a logical
/// clock that advances one millisecond per write, which keeps ordering
/// deterministic in tests.
#[derive(Clone, Default)]
pub struct MemoryMessageStore {
    inner: Arc<Mutex<MemoryStoreInner>>,
}

#[derive(Default)]
struct MemoryStoreInner {
    records: Vec<RemoteMessage>,
    next_id: u64,
    clock: u64,
}

impl MemoryStoreInner {
    fn tick(&mut self) -> u64 {
        self.clock += 1;
        EPOCH_MILLIS + self.clock
    }
}

impl MemoryMessageStore {
    /// Create a new empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a record as-is, bypassing encryption.
    ///
    /// Used to seed history written by other clients or older versions. The
    /// logical clock is advanced past the record's creation time.
    pub fn insert_raw(&self, record: RemoteMessage) -> Result<(), RemoteError> {
        let mut inner = self.lock()?;
        inner.clock = inner.clock.max(record.created_at.saturating_sub(EPOCH_MILLIS));
        inner.records.push(record);
        Ok(())
    }

    /// Snapshot of a record by id.
    pub fn record(&self, id: &str) -> Option<RemoteMessage> {
        self.lock().ok()?.records.iter().find(|record| record.id == id).cloned()
    }

    /// Number of records in a conversation.
    pub fn count(&self, conversation: &ConversationId) -> usize {
        self.lock().map_or(0, |inner| {
            inner.records.iter().filter(|record| &record.conversation_id == conversation).count()
        })
    }

    fn lock(&self) -> Result<MutexGuard<'_, MemoryStoreInner>, RemoteError> {
        self.inner.lock().map_err(|_| RemoteError::Unavailable("store mutex poisoned".to_string()))
    }

    fn create_now(&self, message: NewMessage) -> Result<RemoteMessage, RemoteError> {
        let mut inner = self.lock()?;

        inner.next_id += 1;
        let id = format!("msg-{}", inner.next_id);
        let now = inner.tick();

        let record = RemoteMessage {
            id,
            conversation_id: message.conversation_id,
            sender_id: message.sender_id,
            ciphertext: message.ciphertext,
            kind: message.kind,
            media_ref: message.media_ref,
            integrity_tag: message.integrity_tag,
            created_at: now,
            updated_at: now,
            is_delivered: false,
            is_read: false,
        };
        inner.records.push(record.clone());

        Ok(record)
    }

    fn list_now(
        &self,
        conversation: &ConversationId,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<RemoteMessage>, RemoteError> {
        let inner = self.lock()?;

        let mut records: Vec<RemoteMessage> = inner
            .records
            .iter()
            .filter(|record| &record.conversation_id == conversation)
            .cloned()
            .collect();

        // Newest first, page, then back to oldest first
        records.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        let mut page: Vec<RemoteMessage> = records.into_iter().skip(offset).take(limit).collect();
        page.reverse();

        Ok(page)
    }

    fn update_now(&self, id: &str, patch: MessagePatch) -> Result<RemoteMessage, RemoteError> {
        let mut inner = self.lock()?;
        let now = inner.tick();

        let record = inner
            .records
            .iter_mut()
            .find(|record| record.id == id)
            .ok_or_else(|| RemoteError::NotFound { id: id.to_string() })?;

        if let Some(is_read) = patch.is_read {
            record.is_read = is_read;
        }
        if let Some(is_delivered) = patch.is_delivered {
            record.is_delivered = is_delivered;
        }
        if let Some(ciphertext) = patch.ciphertext {
            record.ciphertext = ciphertext;
            record.integrity_tag = None;
        }
        if let Some(kind) = patch.kind {
            record.kind = kind;
        }
        record.updated_at = now;

        Ok(record.clone())
    }
}

impl MessageStore for MemoryMessageStore {
    async fn create_message(&self, message: NewMessage) -> Result<RemoteMessage, RemoteError> {
        self.create_now(message)
    }

    async fn list_messages(
        &self,
        conversation: &ConversationId,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<RemoteMessage>, RemoteError> {
        self.list_now(conversation, limit, offset)
    }

    async fn update_message(
        &self,
        id: &str,
        patch: MessagePatch,
    ) -> Result<RemoteMessage, RemoteError> {
        self.update_now(id, patch)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{MessageKind, UserId};

    fn new_message(conversation: &str, body: &str) -> NewMessage {
        NewMessage {
            conversation_id: ConversationId::new(conversation),
            sender_id: UserId::new("u1"),
            ciphertext: body.to_string(),
            kind: MessageKind::Text,
            media_ref: None,
            integrity_tag: Some("tag".to_string()),
        }
    }

    #[test]
    fn create_assigns_unique_ids_and_increasing_times() {
        let store = MemoryMessageStore::new();
        let a = store.create_now(new_message("r1", "a")).unwrap();
        let b = store.create_now(new_message("r1", "b")).unwrap();

        assert_ne!(a.id, b.id);
        assert!(b.created_at > a.created_at);
        assert!(!a.is_read && !a.is_delivered);
    }

    #[test]
    fn list_pages_from_newest_and_returns_oldest_first() {
        let store = MemoryMessageStore::new();
        for body in ["1", "2", "3", "4", "5"] {
            store.create_now(new_message("r1", body)).unwrap();
        }
        store.create_now(new_message("other", "x")).unwrap();

        let bodies = |page: Vec<RemoteMessage>| -> Vec<String> {
            page.into_iter().map(|record| record.ciphertext).collect()
        };

        let conversation = ConversationId::new("r1");
        assert_eq!(bodies(store.list_now(&conversation, 2, 0).unwrap()), vec!["4", "5"]);
        assert_eq!(bodies(store.list_now(&conversation, 2, 2).unwrap()), vec!["2", "3"]);
        assert_eq!(bodies(store.list_now(&conversation, 10, 4).unwrap()), vec!["1"]);
        assert!(store.list_now(&conversation, 10, 10).unwrap().is_empty());
    }

    #[test]
    fn update_applies_patch_and_drops_stale_tag() {
        let store = MemoryMessageStore::new();
        let record = store.create_now(new_message("r1", "body")).unwrap();

        let read = store.update_now(&record.id, MessagePatch::read()).unwrap();
        assert!(read.is_read);
        assert_eq!(read.integrity_tag.as_deref(), Some("tag"));

        let replaced = store.update_now(&record.id, MessagePatch::replace_body("gone")).unwrap();
        assert_eq!(replaced.ciphertext, "gone");
        assert_eq!(replaced.integrity_tag, None);
        assert!(replaced.is_read);
    }

    #[test]
    fn update_unknown_id_is_not_found() {
        let store = MemoryMessageStore::new();
        let result = store.update_now("missing", MessagePatch::read());
        assert_eq!(result, Err(RemoteError::NotFound { id: "missing".to_string() }));
    }
}
