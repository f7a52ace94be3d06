//! Chaotic key store wrapper for fault injection testing
//!
//! Wraps another key store and fails operations at a configured rate, so
//! callers can be tested against `LocalStorageFailure` paths.

#![allow(clippy::disallowed_types, reason = "Locking simple RNG state")]

use std::sync::{
    Arc, Mutex,
    atomic::{AtomicUsize, Ordering},
};

use parley_crypto::KeyMaterial;

use super::{KeyStore, ScopeId, StoreError};

/// Chaotic key store wrapper that randomly injects failures
///
/// Reads and writes can be made to fail independently, which lets tests
/// exercise "key readable but not persistable" paths.
#[derive(Clone)]
pub struct ChaoticKeyStore<S: KeyStore> {
    inner: S,
    /// Failure rate for `get`/`entries` (0.0 = never, 1.0 = always)
    read_failure_rate: f64,
    /// Failure rate for `set`/`remove_all`
    write_failure_rate: f64,
    /// RNG state for deterministic chaos
    rng: Arc<Mutex<ChaoticRng>>,
    operation_count: Arc<AtomicUsize>,
}

/// Linear congruential generator, reproducible per seed.
struct ChaoticRng {
    state: u64,
}

impl ChaoticRng {
    fn new(seed: u64) -> Self {
        Self { state: seed }
    }

    /// Generate next random value [0.0, 1.0)
    fn next(&mut self) -> f64 {
        // LCG constants from Numerical Recipes
        const A: u64 = 1_664_525;
        const C: u64 = 1_013_904_223;
        const M: u64 = 1u64 << 32;

        self.state = (A.wrapping_mul(self.state).wrapping_add(C)) % M;
        (self.state as f64) / (M as f64)
    }
}

impl<S: KeyStore> ChaoticKeyStore<S> {
    /// Wrap `inner`, failing reads and writes at the same rate.
    ///
    /// # Panics
    ///
    /// Panics if `failure_rate` is not in [0.0, 1.0]
    pub fn new(inner: S, failure_rate: f64) -> Self {
        Self::with_rates(inner, failure_rate, failure_rate, 0x1234_5678_9ABC_DEF0)
    }

    /// Wrap `inner` with separate read and write failure rates.
    ///
    /// # Panics
    ///
    /// Panics if either rate is not in [0.0, 1.0]
    pub fn with_rates(inner: S, read_failure_rate: f64, write_failure_rate: f64, seed: u64) -> Self {
        assert!(
            (0.0..=1.0).contains(&read_failure_rate) && (0.0..=1.0).contains(&write_failure_rate),
            "failure rates must be between 0.0 and 1.0, got {read_failure_rate}/{write_failure_rate}"
        );

        Self {
            inner,
            read_failure_rate,
            write_failure_rate,
            rng: Arc::new(Mutex::new(ChaoticRng::new(seed))),
            operation_count: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Underlying store (for checking state after chaos).
    pub fn inner(&self) -> &S {
        &self.inner
    }

    /// Total number of operations attempted.
    pub fn operation_count(&self) -> usize {
        self.operation_count.load(Ordering::Relaxed)
    }

    fn check(&self, failure_rate: f64) -> Result<(), StoreError> {
        self.operation_count.fetch_add(1, Ordering::Relaxed);

        let roll = self
            .rng
            .lock()
            .map_err(|_| StoreError::Io("ChaoticRng mutex poisoned".to_string()))?
            .next();

        if roll < failure_rate {
            return Err(StoreError::Io("chaotic failure injection".to_string()));
        }
        Ok(())
    }
}

impl<S: KeyStore> KeyStore for ChaoticKeyStore<S> {
    fn get(&self, scope: &ScopeId) -> Result<Option<KeyMaterial>, StoreError> {
        self.check(self.read_failure_rate)?;
        self.inner.get(scope)
    }

    fn set(&self, scope: &ScopeId, key: &KeyMaterial) -> Result<(), StoreError> {
        self.check(self.write_failure_rate)?;
        self.inner.set(scope, key)
    }

    fn remove_all(&self, prefix: &str) -> Result<usize, StoreError> {
        self.check(self.write_failure_rate)?;
        self.inner.remove_all(prefix)
    }

    fn entries(&self, prefix: &str) -> Result<Vec<(ScopeId, KeyMaterial)>, StoreError> {
        self.check(self.read_failure_rate)?;
        self.inner.entries(prefix)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::MemoryKeyStore;

    #[test]
    fn zero_rate_never_fails() {
        let store = ChaoticKeyStore::new(MemoryKeyStore::new(), 0.0);
        for i in 0..100 {
            let scope = ScopeId::conversation(&i.to_string());
            store.set(&scope, &KeyMaterial::new("k")).unwrap();
            assert!(store.get(&scope).unwrap().is_some());
        }
        assert_eq!(store.operation_count(), 200);
    }

    #[test]
    fn full_rate_always_fails() {
        let store = ChaoticKeyStore::new(MemoryKeyStore::new(), 1.0);
        let result = store.set(&ScopeId::conversation("r1"), &KeyMaterial::new("k"));

        assert!(matches!(result, Err(StoreError::Io(_))));
        assert!(store.inner().is_empty());
    }

    #[test]
    fn write_only_failures_leave_reads_working() {
        let inner = MemoryKeyStore::new();
        inner.set(&ScopeId::conversation("r1"), &KeyMaterial::new("k")).unwrap();
        let store = ChaoticKeyStore::with_rates(inner, 0.0, 1.0, 7);

        assert!(store.get(&ScopeId::conversation("r1")).unwrap().is_some());
        assert!(store.set(&ScopeId::conversation("r2"), &KeyMaterial::new("k")).is_err());
    }

    #[test]
    fn same_seed_same_failures() {
        let a = ChaoticKeyStore::with_rates(MemoryKeyStore::new(), 0.5, 0.5, 42);
        let b = ChaoticKeyStore::with_rates(MemoryKeyStore::new(), 0.5, 0.5, 42);
        let scope = ScopeId::conversation("r1");

        for _ in 0..50 {
            assert_eq!(a.get(&scope).is_ok(), b.get(&scope).is_ok());
        }
    }
}
