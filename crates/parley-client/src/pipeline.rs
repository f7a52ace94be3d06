//! Optimistic, end-to-end encrypted message pipeline.
//!
//! Owns one [`Timeline`] per conversation and is the only writer of it.
//! Every mutation reads the current timeline, computes the next one and
//! publishes it whole through a `watch` channel, so subscribers never see a
//! partially applied change.
//!
//! # Send lifecycle
//!
//! ```text
//! send ─► optimistic entry (temp id, plaintext) ─► [send gate] ─► resolve
//!      ─► seal ─► create_message ─┬─ Ok  ─► replace entry, keep plaintext
//!                                 └─ Err ─► remove entry, surface error
//! ```
//!
//! The send gate is a per-conversation FIFO mutex: sends are delivered in
//! issuance order, while the optimistic entry appears before the caller
//! waits on anything. Reconciliation matches purely by temporary id.
//!
//! # Failure handling
//!
//! Nothing is retried here. A failed send rolls the timeline back to its
//! pre-send contents exactly; a failed load leaves it untouched. Bodies that
//! cannot be recovered are shown as the sentinel without failing the batch.

#![allow(clippy::disallowed_types, reason = "Synchronous map operations only")]

use std::{
    collections::HashMap,
    sync::{
        Arc, Mutex, PoisonError,
        atomic::{AtomicU64, Ordering},
    },
};

use parley_crypto::{Cipher, KeyMaterial};
use parley_store::KeyStore;
use tokio::sync::watch;

use crate::{
    ConversationId, ConversationPhase, DELETED_MARKER, Draft, Environment, KeyResolver, Message,
    MessageId, MessageKind, MessagePatch, MessageStore, NewMessage, PipelineConfig, PipelineError,
    Recovery, RemoteError, RemoteMessage, Timeline, UserId,
};

/// Per-conversation state owned by the pipeline.
struct ConversationSlot {
    timeline: watch::Sender<Timeline>,
    /// Serializes remote sends in issuance order.
    send_gate: tokio::sync::Mutex<()>,
    /// The send currently inside `create_message`, if any. The send gate
    /// admits one at a time, so there is never more than one.
    in_flight: Mutex<Option<InFlight>>,
}

/// A send whose record may already be saved remotely.
#[derive(Clone)]
struct InFlight {
    temp_id: MessageId,
    sender: UserId,
    content: String,
    kind: MessageKind,
    media_ref: Option<String>,
}

impl InFlight {
    fn is_saved_as(&self, message: &Message) -> bool {
        message.sender_id == self.sender
            && message.content == self.content
            && message.kind == self.kind
            && message.media_ref == self.media_ref
    }
}

impl ConversationSlot {
    fn new() -> Self {
        let (timeline, _) = watch::channel(Timeline::default());
        Self { timeline, send_gate: tokio::sync::Mutex::new(()), in_flight: Mutex::new(None) }
    }

    fn set_in_flight(&self, in_flight: Option<InFlight>) {
        *self.in_flight.lock().unwrap_or_else(PoisonError::into_inner) = in_flight;
    }

    /// Temporary id of the in-flight send if `loaded` already holds its
    /// saved record.
    ///
    /// Only records that `current` does not show yet qualify, and the newest
    /// match wins, since the in-flight record is the latest write.
    fn saved_in_flight(&self, current: &Timeline, loaded: &[Message]) -> Option<MessageId> {
        let in_flight = self.in_flight.lock().unwrap_or_else(PoisonError::into_inner).clone()?;
        loaded
            .iter()
            .rev()
            .find(|message| in_flight.is_saved_as(message) && current.get(&message.id).is_none())
            .map(|_| in_flight.temp_id)
    }

    /// Replace the timeline with `next(current)` in one step.
    fn publish(&self, next: impl FnOnce(&Timeline) -> Timeline) {
        self.timeline.send_modify(|current| {
            let mut updated = next(current);
            updated.pending_sends = updated.messages.iter().filter(|m| m.is_optimistic()).count();
            *current = updated;
        });
    }
}

/// Coordinator for sending, loading and updating messages.
///
/// Construct once per session and share; all methods take `&self`.
pub struct MessagePipeline<R, S, C, E>
where
    R: MessageStore,
    S: KeyStore,
    C: Cipher,
    E: Environment,
{
    env: E,
    local_user: UserId,
    remote: R,
    keys: Arc<KeyResolver<S, C>>,
    config: PipelineConfig,
    conversations: Mutex<HashMap<ConversationId, Arc<ConversationSlot>>>,
    next_temp: AtomicU64,
}

impl<R, S, C, E> MessagePipeline<R, S, C, E>
where
    R: MessageStore,
    S: KeyStore,
    C: Cipher,
    E: Environment,
{
    /// Create a pipeline acting on behalf of `local_user`.
    pub fn new(
        env: E,
        local_user: UserId,
        remote: R,
        keys: Arc<KeyResolver<S, C>>,
        config: PipelineConfig,
    ) -> Self {
        Self {
            env,
            local_user,
            remote,
            keys,
            config,
            conversations: Mutex::new(HashMap::new()),
            next_temp: AtomicU64::new(1),
        }
    }

    /// User this pipeline acts for.
    pub fn local_user(&self) -> &UserId {
        &self.local_user
    }

    /// Shared key resolver.
    pub fn keys(&self) -> &Arc<KeyResolver<S, C>> {
        &self.keys
    }

    /// Remote message store.
    pub fn remote(&self) -> &R {
        &self.remote
    }

    /// Watch a conversation's timeline.
    pub fn subscribe(&self, conversation: &ConversationId) -> watch::Receiver<Timeline> {
        self.slot(conversation).timeline.subscribe()
    }

    /// Current timeline of a conversation.
    pub fn snapshot(&self, conversation: &ConversationId) -> Timeline {
        self.slot(conversation).timeline.borrow().clone()
    }

    /// Drop the local state of a conversation.
    ///
    /// Existing subscribers keep their last snapshot but see no further
    /// updates; later calls start again from an empty timeline. Sends
    /// already in flight still reach the remote store. Returns false if the
    /// conversation had no state.
    pub fn forget(&self, conversation: &ConversationId) -> bool {
        self.conversations
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(conversation)
            .is_some()
    }

    /// Prepare a two-party conversation with `peer`, deriving its initial
    /// key unless one is already stored.
    pub fn open_conversation(
        &self,
        conversation: &ConversationId,
        peer: &UserId,
    ) -> Result<KeyMaterial, PipelineError> {
        self.keys
            .initialize_conversation(conversation, &self.local_user, peer)
            .map_err(PipelineError::LocalStorage)
    }

    /// Send a message, showing it immediately as an optimistic entry.
    ///
    /// On success the entry is replaced by the confirmed message, which keeps
    /// the plaintext already known locally. On failure the entry is removed
    /// and the error returned.
    pub async fn send(
        &self,
        conversation: &ConversationId,
        sender: &UserId,
        draft: Draft,
    ) -> Result<Message, PipelineError> {
        let slot = self.slot(conversation);
        let temp_id = MessageId::Temporary(self.next_temp.fetch_add(1, Ordering::Relaxed));

        let optimistic = Message {
            id: temp_id.clone(),
            conversation_id: conversation.clone(),
            sender_id: sender.clone(),
            content: draft.content.clone(),
            kind: draft.kind,
            media_ref: draft.media_ref.clone(),
            created_at: self.env.now_millis(),
            is_delivered: false,
            is_read: false,
        };
        slot.publish(|current| {
            let mut next = current.clone();
            next.messages.push(optimistic);
            next
        });

        let delivered = {
            let _turn = slot.send_gate.lock().await;
            self.deliver(&slot, &temp_id, conversation, sender, &draft).await
        };

        // in_flight is cleared inside the publish so a concurrent load sees
        // either the optimistic entry with its in-flight marker or neither
        match delivered {
            Ok(record) => {
                let confirmed = Message::from_remote(record, draft.content);
                tracing::debug!(%conversation, %temp_id, id = %confirmed.id, "send confirmed");
                slot.publish(|current| {
                    slot.set_in_flight(None);
                    reconcile(current, &temp_id, &confirmed)
                });
                Ok(confirmed)
            },
            Err(e) => {
                tracing::warn!(%conversation, %temp_id, error = %e, "send failed, rolling back");
                slot.publish(|current| {
                    slot.set_in_flight(None);
                    let mut next = current.clone();
                    next.messages.retain(|message| message.id != temp_id);
                    next
                });
                Err(e)
            },
        }
    }

    /// Fetch the newest page of a conversation and publish it.
    ///
    /// Each body is recovered independently; one unreadable body becomes the
    /// sentinel without aborting the batch. Optimistic entries of sends in
    /// flight stay after the loaded messages, unless the page already holds
    /// the saved record, which then replaces the entry. Afterwards, incoming
    /// messages are marked read on a best-effort basis.
    pub async fn load(&self, conversation: &ConversationId) -> Result<Vec<Message>, PipelineError> {
        let slot = self.slot(conversation);
        let previous = slot.timeline.borrow().phase;
        slot.publish(|current| Timeline { phase: ConversationPhase::Loading, ..current.clone() });

        let loaded = match self.fetch(conversation).await {
            Ok(loaded) => loaded,
            Err(e) => {
                tracing::warn!(%conversation, error = %e, "load failed");
                slot.publish(|current| Timeline { phase: previous, ..current.clone() });
                return Err(e);
            },
        };

        slot.publish(|current| {
            let saved = slot.saved_in_flight(current, &loaded);
            let pending = current
                .messages
                .iter()
                .filter(|message| message.is_optimistic() && Some(&message.id) != saved.as_ref());
            let messages = loaded.iter().cloned().chain(pending.cloned()).collect();
            Timeline { phase: ConversationPhase::Loaded, messages, pending_sends: 0 }
        });
        tracing::debug!(%conversation, count = loaded.len(), "conversation loaded");

        if self.config.mark_read_on_load {
            let (marked, failure) = self.mark_incoming_read(conversation, &loaded).await;
            if let Some(e) = failure {
                tracing::warn!(%conversation, marked, error = %e, "marking messages read failed");
            }
        }

        Ok(loaded
            .iter()
            .map(|message| self.snapshot_of(&slot, &message.id).unwrap_or_else(|| message.clone()))
            .collect())
    }

    /// Mark a confirmed message as read. Idempotent.
    pub async fn mark_read(&self, id: &MessageId) -> Result<Message, PipelineError> {
        self.update(id, MessagePatch::read()).await
    }

    /// Mark a confirmed message as delivered. Idempotent.
    pub async fn mark_delivered(&self, id: &MessageId) -> Result<Message, PipelineError> {
        self.update(id, MessagePatch::delivered()).await
    }

    /// Mark every unread message from other participants in the current
    /// timeline as read. Returns how many were marked.
    ///
    /// Continues past individual failures and reports the first one.
    pub async fn mark_conversation_read(
        &self,
        conversation: &ConversationId,
    ) -> Result<usize, PipelineError> {
        let messages = self.snapshot(conversation).messages;
        match self.mark_incoming_read(conversation, &messages).await {
            (marked, None) => Ok(marked),
            (_, Some(e)) => Err(PipelineError::RemoteWrite(e)),
        }
    }

    /// Replace a confirmed message's body with the deletion marker.
    ///
    /// The marker is stored as plaintext and later displayed through the
    /// plaintext heuristic.
    pub async fn delete_message(&self, id: &MessageId) -> Result<Message, PipelineError> {
        self.update(id, MessagePatch::replace_body(DELETED_MARKER)).await
    }

    async fn deliver(
        &self,
        slot: &ConversationSlot,
        temp_id: &MessageId,
        conversation: &ConversationId,
        sender: &UserId,
        draft: &Draft,
    ) -> Result<RemoteMessage, PipelineError> {
        let key = self.keys.resolve(conversation, None).map_err(PipelineError::LocalStorage)?;

        let (ciphertext, integrity_tag) = if is_bodiless(draft.kind, &draft.content) {
            (String::new(), None)
        } else {
            let sealed = self.keys.seal(&key, &draft.content).map_err(PipelineError::Encryption)?;
            (sealed.ciphertext, self.config.attach_integrity_tags.then_some(sealed.tag))
        };

        let request = NewMessage {
            conversation_id: conversation.clone(),
            sender_id: sender.clone(),
            ciphertext,
            kind: draft.kind,
            media_ref: draft.media_ref.clone(),
            integrity_tag,
        };

        slot.set_in_flight(Some(InFlight {
            temp_id: temp_id.clone(),
            sender: sender.clone(),
            content: draft.content.clone(),
            kind: draft.kind,
            media_ref: draft.media_ref.clone(),
        }));
        self.remote.create_message(request).await.map_err(PipelineError::RemoteWrite)
    }

    async fn fetch(&self, conversation: &ConversationId) -> Result<Vec<Message>, PipelineError> {
        let records = self
            .remote
            .list_messages(conversation, self.config.page_size, 0)
            .await
            .map_err(PipelineError::RemoteRead)?;

        let key = self.keys.resolve(conversation, None).map_err(PipelineError::LocalStorage)?;

        Ok(records
            .into_iter()
            .map(|record| {
                let content = if is_bodiless(record.kind, &record.ciphertext) {
                    String::new()
                } else {
                    let opened = self.keys.open(
                        conversation,
                        &key,
                        &record.ciphertext,
                        record.integrity_tag.as_deref(),
                    );
                    if opened.recovery == Recovery::Unrecoverable {
                        tracing::warn!(%conversation, id = %record.id, "body unrecoverable");
                    }
                    opened.content
                };
                Message::from_remote(record, content)
            })
            .collect())
    }

    async fn update(&self, id: &MessageId, patch: MessagePatch) -> Result<Message, PipelineError> {
        let remote_id = id.remote_id().ok_or_else(|| PipelineError::Unconfirmed(id.clone()))?;
        let replaces_body = patch.ciphertext.clone();

        let record = self
            .remote
            .update_message(remote_id, patch)
            .await
            .map_err(PipelineError::RemoteWrite)?;

        let slot = self.slot(&record.conversation_id);
        let known = self.snapshot_of(&slot, id);
        let content = match (replaces_body, known) {
            (Some(body), _) => body,
            (None, Some(message)) => message.content,
            (None, None) => self.recover(&record),
        };

        let updated = Message::from_remote(record, content);
        slot.publish(|current| {
            let mut next = current.clone();
            if let Some(entry) = next.messages.iter_mut().find(|message| &message.id == id) {
                *entry = updated.clone();
            }
            next
        });

        Ok(updated)
    }

    /// Marks each unread message authored by someone else. Returns the
    /// number marked and the first failure, if any.
    async fn mark_incoming_read(
        &self,
        conversation: &ConversationId,
        messages: &[Message],
    ) -> (usize, Option<RemoteError>) {
        let mut marked = 0;
        let mut first_failure = None;

        for message in messages {
            if message.is_read || message.sender_id == self.local_user || message.is_optimistic() {
                continue;
            }

            match self.update(&message.id, MessagePatch::read()).await {
                Ok(_) => marked += 1,
                Err(PipelineError::RemoteWrite(e)) => {
                    tracing::debug!(%conversation, id = %message.id, error = %e, "mark read failed");
                    first_failure.get_or_insert(e);
                },
                Err(e) => {
                    tracing::debug!(%conversation, id = %message.id, error = %e, "mark read skipped");
                },
            }
        }

        (marked, first_failure)
    }

    /// Display content for a record that is not in any local timeline.
    fn recover(&self, record: &RemoteMessage) -> String {
        if is_bodiless(record.kind, &record.ciphertext) {
            return String::new();
        }

        match self.keys.open_message(
            &record.conversation_id,
            &record.ciphertext,
            record.integrity_tag.as_deref(),
        ) {
            Ok(opened) => opened.content,
            Err(e) => {
                tracing::warn!(id = %record.id, error = %e, "key lookup failed during update");
                self.keys.config().sentinel.clone()
            },
        }
    }

    fn snapshot_of(&self, slot: &ConversationSlot, id: &MessageId) -> Option<Message> {
        slot.timeline.borrow().get(id).cloned()
    }

    /// Slot of `conversation`, created on first use.
    ///
    /// Slots live for the pipeline's lifetime (one session) unless dropped
    /// with [`Self::forget`].
    fn slot(&self, conversation: &ConversationId) -> Arc<ConversationSlot> {
        let mut conversations = self.conversations.lock().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(
            conversations
                .entry(conversation.clone())
                .or_insert_with(|| Arc::new(ConversationSlot::new())),
        )
    }
}

/// Image messages without a caption carry no body to encrypt.
fn is_bodiless(kind: MessageKind, body: &str) -> bool {
    kind == MessageKind::Image && body.is_empty()
}

/// Swap the optimistic entry for its confirmed message.
///
/// A load that raced the send may already show the confirmed record; the
/// optimistic entry is then dropped instead. If that load took the entry
/// for another record with the same body, the confirmed message is
/// appended.
fn reconcile(current: &Timeline, temp_id: &MessageId, confirmed: &Message) -> Timeline {
    let mut next = current.clone();

    if next.messages.iter().any(|message| message.id == confirmed.id) {
        next.messages.retain(|message| &message.id != temp_id);
        if let Some(entry) = next.messages.iter_mut().find(|message| message.id == confirmed.id) {
            entry.content.clone_from(&confirmed.content);
        }
    } else if let Some(entry) = next.messages.iter_mut().find(|message| &message.id == temp_id) {
        *entry = confirmed.clone();
    } else {
        next.messages.push(confirmed.clone());
    }

    next
}
