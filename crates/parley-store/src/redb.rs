//! Redb-backed durable key store.
//!
//! Uses Redb's ACID transactions with Copy-on-Write for crash safety.
//! Keys survive process restarts; nothing is shared across installations.

use std::{path::Path, sync::Arc};

use parley_crypto::KeyMaterial;
use redb::{Database, ReadableTable, TableDefinition};

use super::{KeyStore, ScopeId, StoreError};

/// Table: keys
/// Key: scope id (`chat_key_<id>` / `user_key_<id>`)
/// Value: UTF-8 key text
const KEYS: TableDefinition<&str, &[u8]> = TableDefinition::new("keys");

/// Durable key store backed by Redb.
///
/// Thread-safe through Redb's internal locking. Clone is cheap (Arc).
#[derive(Clone)]
pub struct RedbKeyStore {
    db: Arc<Database>,
}

impl RedbKeyStore {
    /// Open or create a Redb database at the given path.
    ///
    /// Creates the KEYS table if it doesn't exist.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::Io` if the database cannot be opened or created.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let db = Database::create(path.as_ref()).map_err(io)?;

        let txn = db.begin_write().map_err(io)?;
        {
            let _ = txn.open_table(KEYS).map_err(io)?;
        }
        txn.commit().map_err(io)?;

        Ok(Self { db: Arc::new(db) })
    }

    /// Scopes under `prefix`, read inside an existing table handle.
    fn scan<T: ReadableTable<&'static str, &'static [u8]>>(
        table: &T,
        prefix: &str,
    ) -> Result<Vec<(String, Vec<u8>)>, StoreError> {
        let results = table.range(prefix..).map_err(io)?;

        let mut found = Vec::new();
        for result in results {
            let (key, value) = result.map_err(io)?;
            let scope = key.value();
            if !scope.starts_with(prefix) {
                break;
            }
            found.push((scope.to_string(), value.value().to_vec()));
        }

        Ok(found)
    }
}

impl KeyStore for RedbKeyStore {
    fn get(&self, scope: &ScopeId) -> Result<Option<KeyMaterial>, StoreError> {
        let txn = self.db.begin_read().map_err(io)?;
        let table = txn.open_table(KEYS).map_err(io)?;

        match table.get(scope.as_str()).map_err(io)? {
            Some(value) => decode(scope.as_str(), value.value().to_vec()).map(Some),
            None => Ok(None),
        }
    }

    fn set(&self, scope: &ScopeId, key: &KeyMaterial) -> Result<(), StoreError> {
        let txn = self.db.begin_write().map_err(io)?;
        {
            let mut table = txn.open_table(KEYS).map_err(io)?;
            table.insert(scope.as_str(), key.as_bytes()).map_err(io)?;
        }
        txn.commit().map_err(io)?;

        Ok(())
    }

    fn remove_all(&self, prefix: &str) -> Result<usize, StoreError> {
        let txn = self.db.begin_write().map_err(io)?;
        let removed;
        {
            let mut table = txn.open_table(KEYS).map_err(io)?;
            let doomed = Self::scan(&table, prefix)?;
            removed = doomed.len();

            for (scope, _) in doomed {
                table.remove(scope.as_str()).map_err(io)?;
            }
        }
        txn.commit().map_err(io)?;

        Ok(removed)
    }

    fn entries(&self, prefix: &str) -> Result<Vec<(ScopeId, KeyMaterial)>, StoreError> {
        let txn = self.db.begin_read().map_err(io)?;
        let table = txn.open_table(KEYS).map_err(io)?;

        Self::scan(&table, prefix)?
            .into_iter()
            .map(|(scope, bytes)| {
                let key = decode(&scope, bytes)?;
                Ok((ScopeId::from_raw(scope), key))
            })
            .collect()
    }
}

fn io(err: impl std::fmt::Display) -> StoreError {
    StoreError::Io(err.to_string())
}

fn decode(scope: &str, bytes: Vec<u8>) -> Result<KeyMaterial, StoreError> {
    String::from_utf8(bytes)
        .map(KeyMaterial::new)
        .map_err(|e| StoreError::Corrupt { scope: scope.to_string(), reason: e.to_string() })
}
