//! Key storage for Parley
//!
//! Durable, installation-local persistence of conversation and user keys.
//! One entry per scope, last writer wins, no versioning and no network I/O.
//!
//! The trait is synchronous (no async) like the rest of the storage layer;
//! callers that run on an async runtime treat each call as a short local
//! I/O boundary.
//!
//! # Implementations
//!
//! - [`MemoryKeyStore`]: process-local, for tests and ephemeral sessions
//! - [`RedbKeyStore`]: durable, survives process restarts
//! - [`ChaoticKeyStore`]: fault-injection wrapper for chaos tests

#![forbid(unsafe_code)]
#![deny(missing_docs)]

mod chaotic;
mod error;
mod memory;
mod redb;
mod scope;

pub use chaotic::ChaoticKeyStore;
pub use error::StoreError;
pub use memory::MemoryKeyStore;
pub use parley_crypto::KeyMaterial;
pub use scope::{CONVERSATION_PREFIX, ScopeId, USER_PREFIX};

pub use self::redb::RedbKeyStore;

/// Key-value persistence for key material.
///
/// Must be Clone (shared by the resolver and tooling), Send + Sync, and
/// synchronous. Implementations share internal state via Arc, so clones see
/// the same entries.
pub trait KeyStore: Clone + Send + Sync + 'static {
    /// Load the key stored under `scope`.
    ///
    /// Returns `None` if nothing is stored. Never mutates state.
    fn get(&self, scope: &ScopeId) -> Result<Option<KeyMaterial>, StoreError>;

    /// Store `key` under `scope`, replacing any previous value.
    fn set(&self, scope: &ScopeId, key: &KeyMaterial) -> Result<(), StoreError>;

    /// Remove every entry whose scope starts with `prefix`.
    ///
    /// Returns the number of entries removed.
    fn remove_all(&self, prefix: &str) -> Result<usize, StoreError>;

    /// All entries whose scope starts with `prefix`, ordered by scope.
    fn entries(&self, prefix: &str) -> Result<Vec<(ScopeId, KeyMaterial)>, StoreError>;
}
