#![allow(clippy::disallowed_types, reason = "Synchronous in-memory operations only")]

use std::{
    collections::BTreeMap,
    sync::{Arc, Mutex, MutexGuard},
};

use parley_crypto::KeyMaterial;

use super::{KeyStore, ScopeId, StoreError};

/// In-memory key store for tests and ephemeral sessions
///
/// Entries live in a `BTreeMap` so prefix scans come back ordered by scope.
/// State is wrapped in Arc<Mutex<>> so clones share entries. A poisoned
/// mutex surfaces as `StoreError::Io` rather than a panic.
#[derive(Clone, Default)]
pub struct MemoryKeyStore {
    inner: Arc<Mutex<BTreeMap<ScopeId, KeyMaterial>>>,
}

impl MemoryKeyStore {
    /// Create a new empty `MemoryKeyStore`
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored entries.
    pub fn len(&self) -> usize {
        self.lock().map(|entries| entries.len()).unwrap_or(0)
    }

    /// True if nothing is stored.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> Result<MutexGuard<'_, BTreeMap<ScopeId, KeyMaterial>>, StoreError> {
        self.inner.lock().map_err(|_| StoreError::Io("key store mutex poisoned".to_string()))
    }
}

impl KeyStore for MemoryKeyStore {
    fn get(&self, scope: &ScopeId) -> Result<Option<KeyMaterial>, StoreError> {
        Ok(self.lock()?.get(scope).cloned())
    }

    fn set(&self, scope: &ScopeId, key: &KeyMaterial) -> Result<(), StoreError> {
        self.lock()?.insert(scope.clone(), key.clone());
        Ok(())
    }

    fn remove_all(&self, prefix: &str) -> Result<usize, StoreError> {
        let mut entries = self.lock()?;
        let before = entries.len();
        entries.retain(|scope, _| !scope.as_str().starts_with(prefix));
        Ok(before - entries.len())
    }

    fn entries(&self, prefix: &str) -> Result<Vec<(ScopeId, KeyMaterial)>, StoreError> {
        Ok(self
            .lock()?
            .iter()
            .filter(|(scope, _)| scope.as_str().starts_with(prefix))
            .map(|(scope, key)| (scope.clone(), key.clone()))
            .collect())
    }
}
