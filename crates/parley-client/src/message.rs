//! Message and timeline types.
//!
//! In memory, [`Message::content`] is always plaintext (or the sentinel).
//! Ciphertext only exists in [`NewMessage`] and [`RemoteMessage`], the
//! shapes that cross the remote-store boundary.

use std::fmt;

/// Remote-store identifier of a conversation.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ConversationId(String);

impl ConversationId {
    /// Wrap a conversation id.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Raw id.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ConversationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ConversationId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

/// Remote-store identifier of a user.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct UserId(String);

impl UserId {
    /// Wrap a user id.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Raw id.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for UserId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

/// Identity of a message in the timeline.
///
/// A message carries a locally generated temporary id until the remote
/// store confirms it; from then on its identity is the remote id.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum MessageId {
    /// Client-generated, never sent to the remote store.
    Temporary(u64),
    /// Assigned by the remote store.
    Confirmed(String),
}

impl MessageId {
    /// True until the remote store has confirmed the message.
    pub fn is_temporary(&self) -> bool {
        matches!(self, Self::Temporary(_))
    }

    /// Remote id, if confirmed.
    pub fn remote_id(&self) -> Option<&str> {
        match self {
            Self::Temporary(_) => None,
            Self::Confirmed(id) => Some(id),
        }
    }
}

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Temporary(n) => write!(f, "temp-{n}"),
            Self::Confirmed(id) => f.write_str(id),
        }
    }
}

/// What a message carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MessageKind {
    /// Text body.
    Text,
    /// Image reference with an optional caption body.
    Image,
}

/// A message as shown in a conversation timeline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    /// Temporary until confirmed by the remote store.
    pub id: MessageId,
    /// Conversation the message belongs to.
    pub conversation_id: ConversationId,
    /// Author.
    pub sender_id: UserId,
    /// Plaintext, or the sentinel when the body could not be recovered.
    pub content: String,
    /// Text or image.
    pub kind: MessageKind,
    /// Uploaded media reference for image messages.
    pub media_ref: Option<String>,
    /// Creation time in milliseconds since the Unix epoch.
    pub created_at: u64,
    /// Remote store has delivered the message to the recipient.
    pub is_delivered: bool,
    /// Recipient has read the message.
    pub is_read: bool,
}

impl Message {
    /// Timeline entry for a confirmed remote record with recovered `content`.
    pub fn from_remote(record: RemoteMessage, content: String) -> Self {
        Self {
            id: MessageId::Confirmed(record.id),
            conversation_id: record.conversation_id,
            sender_id: record.sender_id,
            content,
            kind: record.kind,
            media_ref: record.media_ref,
            created_at: record.created_at,
            is_delivered: record.is_delivered,
            is_read: record.is_read,
        }
    }

    /// True while the entry is an optimistic, unconfirmed send.
    pub fn is_optimistic(&self) -> bool {
        self.id.is_temporary()
    }
}

/// Message as composed by the local user, before encryption.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Draft {
    /// Plaintext body (caption for images; may be empty).
    pub content: String,
    /// Text or image.
    pub kind: MessageKind,
    /// Uploaded media reference for image messages.
    pub media_ref: Option<String>,
}

impl Draft {
    /// A text message.
    pub fn text(content: impl Into<String>) -> Self {
        Self { content: content.into(), kind: MessageKind::Text, media_ref: None }
    }

    /// An image message with an optional caption.
    pub fn image(media_ref: impl Into<String>, caption: Option<String>) -> Self {
        Self {
            content: caption.unwrap_or_default(),
            kind: MessageKind::Image,
            media_ref: Some(media_ref.into()),
        }
    }
}

/// Create request sent to the remote store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewMessage {
    /// Target conversation.
    pub conversation_id: ConversationId,
    /// Author.
    pub sender_id: UserId,
    /// Base64 ciphertext, or empty for a caption-less image.
    pub ciphertext: String,
    /// Text or image.
    pub kind: MessageKind,
    /// Uploaded media reference for image messages.
    pub media_ref: Option<String>,
    /// Soft integrity tag over the plaintext, if enabled.
    pub integrity_tag: Option<String>,
}

/// Record as stored by the remote store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteMessage {
    /// Remote id.
    pub id: String,
    /// Conversation the record belongs to.
    pub conversation_id: ConversationId,
    /// Author.
    pub sender_id: UserId,
    /// Base64 ciphertext, plaintext marker, or empty.
    pub ciphertext: String,
    /// Text or image.
    pub kind: MessageKind,
    /// Uploaded media reference for image messages.
    pub media_ref: Option<String>,
    /// Soft integrity tag over the plaintext, if one was attached.
    pub integrity_tag: Option<String>,
    /// Creation time in milliseconds since the Unix epoch.
    pub created_at: u64,
    /// Last update time in milliseconds since the Unix epoch.
    pub updated_at: u64,
    /// Delivered flag.
    pub is_delivered: bool,
    /// Read flag.
    pub is_read: bool,
}

/// Partial update of a remote record. `None` fields are left unchanged.
///
/// Replacing the body drops any integrity tag, since the tag covered the
/// old plaintext.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MessagePatch {
    /// New read flag.
    pub is_read: Option<bool>,
    /// New delivered flag.
    pub is_delivered: Option<bool>,
    /// New body.
    pub ciphertext: Option<String>,
    /// New kind.
    pub kind: Option<MessageKind>,
}

impl MessagePatch {
    /// Mark as read.
    pub fn read() -> Self {
        Self { is_read: Some(true), ..Self::default() }
    }

    /// Mark as delivered.
    pub fn delivered() -> Self {
        Self { is_delivered: Some(true), ..Self::default() }
    }

    /// Replace the body with a plaintext marker and demote to text.
    pub fn replace_body(marker: impl Into<String>) -> Self {
        Self { ciphertext: Some(marker.into()), kind: Some(MessageKind::Text), ..Self::default() }
    }
}

/// Load state of a conversation timeline.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ConversationPhase {
    /// Nothing fetched yet.
    #[default]
    Empty,
    /// A load is in flight.
    Loading,
    /// History has been fetched at least once.
    Loaded,
}

/// Published snapshot of one conversation.
///
/// # Invariants
///
/// - `messages` is ordered by creation time, optimistic entries last
/// - At most one entry per logical message (temporary or confirmed)
/// - `pending_sends` equals the number of optimistic entries
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Timeline {
    /// Load state.
    pub phase: ConversationPhase,
    /// Visible messages.
    pub messages: Vec<Message>,
    /// Sends issued but not yet confirmed or rolled back.
    pub pending_sends: usize,
}

impl Timeline {
    /// True while at least one send is in flight (the `Sending` sub-state).
    pub fn is_sending(&self) -> bool {
        self.pending_sends > 0
    }

    /// Find a message by id.
    pub fn get(&self, id: &MessageId) -> Option<&Message> {
        self.messages.iter().find(|message| &message.id == id)
    }
}
