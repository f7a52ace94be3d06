//! Chaotic remote store wrapper for fault injection testing
//!
//! Delegates to an underlying store but fails requests at a configured rate
//! before they reach it, so a failed create never leaves a record behind.

#![allow(clippy::disallowed_types, reason = "Locking simple RNG state")]

use std::sync::{
    Arc, Mutex,
    atomic::{AtomicUsize, Ordering},
};

use super::MessageStore;
use crate::{ConversationId, MessagePatch, NewMessage, RemoteError, RemoteMessage};

/// Chaotic remote store wrapper that randomly injects failures
///
/// Reads (`list_messages`) and writes (`create_message`, `update_message`)
/// fail independently. Rates of 0.0 and 1.0 are exact, so tests can force a
/// path deterministically.
#[derive(Clone)]
pub struct ChaoticMessageStore<S: MessageStore> {
    inner: S,
    read_failure_rate: f64,
    write_failure_rate: f64,
    /// LCG state for deterministic chaos
    rng: Arc<Mutex<u64>>,
    operation_count: Arc<AtomicUsize>,
}

impl<S: MessageStore> ChaoticMessageStore<S> {
    /// Wrap `inner` with separate read and write failure rates.
    ///
    /// # Panics
    ///
    /// Panics if either rate is not in [0.0, 1.0]
    pub fn new(inner: S, read_failure_rate: f64, write_failure_rate: f64) -> Self {
        Self::with_seed(inner, read_failure_rate, write_failure_rate, 0x1234_5678_9ABC_DEF0)
    }

    /// Create with explicit seed for reproducible chaos
    ///
    /// # Panics
    ///
    /// Panics if either rate is not in [0.0, 1.0]
    pub fn with_seed(inner: S, read_failure_rate: f64, write_failure_rate: f64, seed: u64) -> Self {
        assert!(
            (0.0..=1.0).contains(&read_failure_rate) && (0.0..=1.0).contains(&write_failure_rate),
            "failure rates must be between 0.0 and 1.0, got {read_failure_rate}/{write_failure_rate}"
        );

        Self {
            inner,
            read_failure_rate,
            write_failure_rate,
            rng: Arc::new(Mutex::new(seed)),
            operation_count: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Underlying store (for checking state after chaos).
    pub fn inner(&self) -> &S {
        &self.inner
    }

    /// Total number of requests attempted.
    pub fn operation_count(&self) -> usize {
        self.operation_count.load(Ordering::Relaxed)
    }

    fn check(&self, failure_rate: f64) -> Result<(), RemoteError> {
        // LCG constants from Numerical Recipes
        const A: u64 = 1_664_525;
        const C: u64 = 1_013_904_223;
        const M: u64 = 1u64 << 32;

        self.operation_count.fetch_add(1, Ordering::Relaxed);

        let roll = {
            let mut state = self
                .rng
                .lock()
                .map_err(|_| RemoteError::Unavailable("chaos rng mutex poisoned".to_string()))?;
            *state = (A.wrapping_mul(*state).wrapping_add(C)) % M;
            (*state as f64) / (M as f64)
        };

        if roll < failure_rate {
            return Err(RemoteError::Unavailable("chaotic failure injection".to_string()));
        }
        Ok(())
    }
}

impl<S: MessageStore> MessageStore for ChaoticMessageStore<S> {
    async fn create_message(&self, message: NewMessage) -> Result<RemoteMessage, RemoteError> {
        self.check(self.write_failure_rate)?;
        self.inner.create_message(message).await
    }

    async fn list_messages(
        &self,
        conversation: &ConversationId,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<RemoteMessage>, RemoteError> {
        self.check(self.read_failure_rate)?;
        self.inner.list_messages(conversation, limit, offset).await
    }

    async fn update_message(
        &self,
        id: &str,
        patch: MessagePatch,
    ) -> Result<RemoteMessage, RemoteError> {
        self.check(self.write_failure_rate)?;
        self.inner.update_message(id, patch).await
    }
}
