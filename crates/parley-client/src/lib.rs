//! Parley client core.
//!
//! Key resolution and the optimistic message pipeline for end-to-end
//! encrypted conversations. The remote message store and the local key
//! store are injected collaborators; this crate owns the per-conversation
//! timelines and the strategy chains that turn ids into keys and stored
//! bodies into displayable text.
//!
//! # Architecture
//!
//! ```text
//!            ┌──────────────────────┐
//!  caller ──►│   MessagePipeline    │──► MessageStore (remote, async)
//!            │  timelines, gating   │
//!            └──────────┬───────────┘
//!                       │
//!            ┌──────────▼───────────┐
//!            │     KeyResolver      │──► KeyStore (local, sync)
//!            │  strategies, cipher  │
//!            └──────────────────────┘
//! ```
//!
//! # Failure surface
//!
//! - Missing keys are absorbed by the resolution chain
//! - Unreadable bodies are absorbed per message as a sentinel
//! - Encryption, remote and local storage failures reach the caller as
//!   [`PipelineError`]; nothing is retried

#![forbid(unsafe_code)]
#![deny(missing_docs)]

mod config;
mod env;
mod error;
mod message;
mod pipeline;
mod remote;
mod resolver;

pub use config::{DELETED_MARKER, PipelineConfig, ResolverConfig, UNRECOVERABLE_SENTINEL};
pub use env::{Environment, ManualEnv, SystemEnv};
pub use error::{KeyError, PipelineError, RemoteError};
pub use message::{
    ConversationId, ConversationPhase, Draft, Message, MessageId, MessageKind, MessagePatch,
    NewMessage, RemoteMessage, Timeline, UserId,
};
pub use pipeline::MessagePipeline;
pub use remote::{ChaoticMessageStore, MemoryMessageStore, MessageStore};
pub use resolver::{
    KEY_STRATEGIES, KeyBackup, KeyResolver, KeyStrategy, Opened, RECOVERY_STRATEGIES, Recovery,
    RecoveryStrategy, ResolvedKey, Sealed, is_likely_plaintext,
};
