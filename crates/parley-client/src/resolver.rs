//! Conversation key resolution and body recovery.
//!
//! Turns a conversation id into usable key material, and a stored body into
//! displayable text, through two ordered strategy chains. Each chain is
//! evaluated front to back and stops at the first strategy that succeeds.
//!
//! ```text
//! resolve:  Stored ─► ParticipantDerived ─► RoomFallback
//! open:     ResolvedKey ─► FallbackKey ─► PlaintextHeuristic ─► sentinel
//! ```
//!
//! Resolution writes through to the [`KeyStore`], so every later call (and
//! every concurrent caller) converges on the same key without negotiation.
//!
//! # Known gap
//!
//! When a conversation's stored key is missing, the fallback key is derived
//! and persisted silently. Two devices that took different paths end up
//! with different keys, and there is no versioning or reconciliation to
//! repair that. Bodies written under the other key surface as the sentinel.

#![allow(clippy::disallowed_types, reason = "Synchronous cache operations only")]

use std::{
    collections::{BTreeMap, HashMap},
    fmt,
    sync::{Mutex, MutexGuard, PoisonError},
};

use parley_crypto::{
    Cipher, CipherError, KeyMaterial, SECURE_KEY_BYTES, derive_fallback_key, derive_room_key,
    generate_secure_key, integrity_tag, verify_tag,
};
use parley_store::{CONVERSATION_PREFIX, KeyStore, ScopeId, StoreError, USER_PREFIX};
use serde::{Deserialize, Serialize};

use crate::{ConversationId, KeyError, ResolverConfig, UserId};

/// Key resolution strategies, in evaluation order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyStrategy {
    /// Key already persisted for the conversation.
    Stored,
    /// Initial key derived from the two participant ids. Only attempted
    /// when participants are supplied.
    ParticipantDerived,
    /// Key derived from the conversation id alone.
    RoomFallback,
}

/// Fixed evaluation order of [`KeyStrategy`].
pub const KEY_STRATEGIES: [KeyStrategy; 3] =
    [KeyStrategy::Stored, KeyStrategy::ParticipantDerived, KeyStrategy::RoomFallback];

/// Body recovery strategies, in evaluation order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecoveryStrategy {
    /// Decrypt with the resolved conversation key.
    ResolvedKey,
    /// Decrypt with the per-room fallback key (when it differs).
    FallbackKey,
    /// Show content unchanged if it already looks like plaintext.
    PlaintextHeuristic,
}

/// Fixed evaluation order of [`RecoveryStrategy`].
pub const RECOVERY_STRATEGIES: [RecoveryStrategy; 3] = [
    RecoveryStrategy::ResolvedKey,
    RecoveryStrategy::FallbackKey,
    RecoveryStrategy::PlaintextHeuristic,
];

/// A resolved key and the strategy that produced it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedKey {
    /// Key material.
    pub key: KeyMaterial,
    /// Strategy that produced the key.
    pub source: KeyStrategy,
}

/// How a body was recovered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Recovery {
    /// Recovered by the given strategy.
    Recovered(RecoveryStrategy),
    /// Every strategy failed; content is the sentinel.
    Unrecoverable,
}

/// Displayable body produced by [`KeyResolver::open`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Opened {
    /// Plaintext, or the sentinel.
    pub content: String,
    /// Which strategy succeeded.
    pub recovery: Recovery,
}

/// Encrypted body ready for the remote store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sealed {
    /// Base64 ciphertext.
    pub ciphertext: String,
    /// Soft integrity tag over the plaintext under the same key.
    pub tag: String,
}

/// Exported key set for account recovery on another installation.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyBackup {
    /// The local user's own key.
    pub user_key: String,
    /// Conversation id to key text.
    pub conversation_keys: BTreeMap<String, String>,
}

impl fmt::Debug for KeyBackup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyBackup")
            .field("user_key", &"[REDACTED]")
            .field("conversations", &self.conversation_keys.len())
            .finish()
    }
}

/// Resolves conversation keys and recovers message bodies.
///
/// Owns the body cipher so that key choice and decryption attempts stay in
/// one place. Construct once and share (the pipeline takes it by `Arc`).
pub struct KeyResolver<S: KeyStore, C: Cipher> {
    store: S,
    cipher: C,
    config: ResolverConfig,
    /// Last key read from or written to the store, per conversation.
    cache: Mutex<HashMap<ConversationId, KeyMaterial>>,
}

impl<S: KeyStore, C: Cipher> KeyResolver<S, C> {
    /// Create a resolver over `store` using `cipher` for bodies.
    pub fn new(store: S, cipher: C, config: ResolverConfig) -> Self {
        Self { store, cipher, config, cache: Mutex::new(HashMap::new()) }
    }

    /// Body cipher.
    pub fn cipher(&self) -> &C {
        &self.cipher
    }

    /// Underlying key store.
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Active configuration.
    pub fn config(&self) -> &ResolverConfig {
        &self.config
    }

    /// Deterministic, order-independent initial key for two participants.
    pub fn derive_room_key(participant_a: &UserId, participant_b: &UserId) -> KeyMaterial {
        derive_room_key(participant_a.as_str(), participant_b.as_str())
    }

    /// Key for `conversation`, creating and persisting one if needed.
    pub fn resolve(
        &self,
        conversation: &ConversationId,
        participants: Option<(&UserId, &UserId)>,
    ) -> Result<KeyMaterial, StoreError> {
        self.resolve_with_source(conversation, participants).map(|resolved| resolved.key)
    }

    /// Like [`Self::resolve`], also reporting which strategy succeeded.
    pub fn resolve_with_source(
        &self,
        conversation: &ConversationId,
        participants: Option<(&UserId, &UserId)>,
    ) -> Result<ResolvedKey, StoreError> {
        // RoomFallback never declines, so it closes the chain
        for strategy in [KeyStrategy::Stored, KeyStrategy::ParticipantDerived] {
            if let Some(key) = self.attempt(strategy, conversation, participants)? {
                tracing::debug!(%conversation, ?strategy, "resolved conversation key");
                return Ok(ResolvedKey { key, source: strategy });
            }
        }

        tracing::debug!(%conversation, "no stored key, deriving room fallback");
        let key = self.room_fallback(conversation)?;
        Ok(ResolvedKey { key, source: KeyStrategy::RoomFallback })
    }

    /// Run a single key strategy.
    ///
    /// `Ok(None)` means the strategy declined and the next one should run.
    /// Deriving strategies persist what they derive.
    pub fn attempt(
        &self,
        strategy: KeyStrategy,
        conversation: &ConversationId,
        participants: Option<(&UserId, &UserId)>,
    ) -> Result<Option<KeyMaterial>, StoreError> {
        match strategy {
            KeyStrategy::Stored => self.stored_key(conversation),
            KeyStrategy::ParticipantDerived => match participants {
                Some((a, b)) => self.persist(conversation, Self::derive_room_key(a, b)).map(Some),
                None => Ok(None),
            },
            KeyStrategy::RoomFallback => self.room_fallback(conversation).map(Some),
        }
    }

    /// Set up the key of a new two-party conversation.
    ///
    /// Keeps an existing key; otherwise derives the participant key.
    pub fn initialize_conversation(
        &self,
        conversation: &ConversationId,
        participant_a: &UserId,
        participant_b: &UserId,
    ) -> Result<KeyMaterial, StoreError> {
        self.resolve(conversation, Some((participant_a, participant_b)))
    }

    /// Forget the remembered key for `conversation`.
    pub fn invalidate(&self, conversation: &ConversationId) {
        self.cache().remove(conversation);
    }

    /// Encrypt `plaintext` under `key` and compute its integrity tag.
    pub fn seal(&self, key: &KeyMaterial, plaintext: &str) -> Result<Sealed, CipherError> {
        let ciphertext = self.cipher.encrypt(plaintext, key)?;
        Ok(Sealed { ciphertext, tag: integrity_tag(plaintext, key) })
    }

    /// Turn a stored body into displayable text. Never fails.
    ///
    /// `key` is the conversation's resolved key; `tag` is the soft integrity
    /// tag stored with the body, if any.
    pub fn open(
        &self,
        conversation: &ConversationId,
        key: &KeyMaterial,
        body: &str,
        tag: Option<&str>,
    ) -> Opened {
        for strategy in RECOVERY_STRATEGIES {
            if let Some(content) = self.try_recover(strategy, conversation, key, body, tag) {
                return Opened { content, recovery: Recovery::Recovered(strategy) };
            }
        }

        tracing::warn!(%conversation, "all recovery strategies failed");
        Opened { content: self.config.sentinel.clone(), recovery: Recovery::Unrecoverable }
    }

    /// Resolve the conversation key, then [`Self::open`] the body.
    pub fn open_message(
        &self,
        conversation: &ConversationId,
        body: &str,
        tag: Option<&str>,
    ) -> Result<Opened, StoreError> {
        let key = self.resolve(conversation, None)?;
        Ok(self.open(conversation, &key, body, tag))
    }

    /// Run a single recovery strategy. `None` means it failed.
    pub fn try_recover(
        &self,
        strategy: RecoveryStrategy,
        conversation: &ConversationId,
        key: &KeyMaterial,
        body: &str,
        tag: Option<&str>,
    ) -> Option<String> {
        match strategy {
            RecoveryStrategy::ResolvedKey => self.decrypt_checked(conversation, key, body, tag),
            RecoveryStrategy::FallbackKey => {
                let fallback = derive_fallback_key(conversation.as_str());
                if &fallback == key {
                    return None;
                }
                self.decrypt_checked(conversation, &fallback, body, tag)
            },
            RecoveryStrategy::PlaintextHeuristic => {
                is_likely_plaintext(body, &self.config).then(|| body.to_string())
            },
        }
    }

    /// Generate and persist the local user's key unless one exists.
    ///
    /// `random` MUST come from a cryptographically secure source.
    pub fn initialize_user_key(
        &self,
        user: &UserId,
        random: [u8; SECURE_KEY_BYTES],
    ) -> Result<KeyMaterial, StoreError> {
        let scope = ScopeId::user(user.as_str());
        if let Some(existing) = self.store.get(&scope)? {
            return Ok(existing);
        }

        let key = generate_secure_key(random);
        self.store.set(&scope, &key)?;
        tracing::info!(%user, "generated user key");
        Ok(key)
    }

    /// Export the user key and every conversation key.
    pub fn backup_keys(&self, user: &UserId) -> Result<KeyBackup, KeyError> {
        let user_key = self
            .store
            .get(&ScopeId::user(user.as_str()))?
            .ok_or_else(|| KeyError::MissingUserKey(user.clone()))?;

        let conversation_keys = self
            .store
            .entries(CONVERSATION_PREFIX)?
            .into_iter()
            .filter_map(|(scope, key)| {
                scope.conversation_id().map(|id| (id.to_string(), key.as_str().to_string()))
            })
            .collect();

        Ok(KeyBackup { user_key: user_key.as_str().to_string(), conversation_keys })
    }

    /// Import a backup, overwriting keys with the same scope.
    pub fn restore_keys(&self, user: &UserId, backup: &KeyBackup) -> Result<(), StoreError> {
        self.store.set(&ScopeId::user(user.as_str()), &KeyMaterial::new(backup.user_key.as_str()))?;

        for (conversation, key) in &backup.conversation_keys {
            self.persist(&ConversationId::new(conversation.as_str()), KeyMaterial::new(key.as_str()))?;
        }

        tracing::info!(%user, conversations = backup.conversation_keys.len(), "restored keys");
        Ok(())
    }

    /// Remove every user and conversation key. Returns how many were removed.
    pub fn clear_all_keys(&self) -> Result<usize, StoreError> {
        self.cache().clear();
        let removed = self.store.remove_all(USER_PREFIX)? + self.store.remove_all(CONVERSATION_PREFIX)?;
        tracing::info!(removed, "cleared all keys");
        Ok(removed)
    }

    /// The store is authoritative; the memo only records what it returned.
    fn stored_key(&self, conversation: &ConversationId) -> Result<Option<KeyMaterial>, StoreError> {
        match self.store.get(&ScopeId::conversation(conversation.as_str()))? {
            Some(key) if key.is_empty() => {
                tracing::warn!(%conversation, "stored key is empty, treating as unavailable");
                self.cache().remove(conversation);
                Ok(None)
            },
            Some(key) => {
                let previous = self.cache().insert(conversation.clone(), key.clone());
                if previous.is_some_and(|previous| previous != key) {
                    tracing::debug!(%conversation, "stored key changed outside this resolver");
                }
                Ok(Some(key))
            },
            None => {
                self.cache().remove(conversation);
                Ok(None)
            },
        }
    }

    /// Key this resolver last read or wrote for `conversation`, without
    /// touching the store.
    pub fn last_resolved(&self, conversation: &ConversationId) -> Option<KeyMaterial> {
        self.cache().get(conversation).cloned()
    }

    fn room_fallback(&self, conversation: &ConversationId) -> Result<KeyMaterial, StoreError> {
        self.persist(conversation, derive_fallback_key(conversation.as_str()))
    }

    fn persist(
        &self,
        conversation: &ConversationId,
        key: KeyMaterial,
    ) -> Result<KeyMaterial, StoreError> {
        self.store.set(&ScopeId::conversation(conversation.as_str()), &key)?;
        self.cache().insert(conversation.clone(), key.clone());
        Ok(key)
    }

    fn decrypt_checked(
        &self,
        conversation: &ConversationId,
        key: &KeyMaterial,
        body: &str,
        tag: Option<&str>,
    ) -> Option<String> {
        match self.cipher.decrypt(body, key) {
            Ok(plaintext) => match tag {
                Some(tag) if !verify_tag(&plaintext, tag, key) => {
                    tracing::debug!(%conversation, "integrity tag mismatch");
                    None
                },
                _ => Some(plaintext),
            },
            Err(e) => {
                tracing::debug!(%conversation, error = %e, "decryption attempt failed");
                None
            },
        }
    }

    fn cache(&self) -> MutexGuard<'_, HashMap<ConversationId, KeyMaterial>> {
        self.cache.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// True if `content` should be shown as-is rather than as the sentinel.
///
/// Requires a non-empty string shorter than `plaintext_max_chars` whose
/// share of printable-ASCII characters (space through `~`, plus tab, CR and
/// LF) is at least `plaintext_min_ratio`.
pub fn is_likely_plaintext(content: &str, config: &ResolverConfig) -> bool {
    let total = content.chars().count();
    if total == 0 || total >= config.plaintext_max_chars {
        return false;
    }

    let printable = content
        .chars()
        .filter(|c| matches!(c, ' '..='~' | '\t' | '\n' | '\r'))
        .count();

    printable as f64 / total as f64 >= config.plaintext_min_ratio
}

#[cfg(test)]
mod tests {
    use parley_crypto::XorCipher;
    use parley_store::{ChaoticKeyStore, MemoryKeyStore};

    use super::*;

    fn resolver() -> KeyResolver<MemoryKeyStore, XorCipher> {
        KeyResolver::new(MemoryKeyStore::new(), XorCipher, ResolverConfig::default())
    }

    fn conv(id: &str) -> ConversationId {
        ConversationId::new(id)
    }

    #[test]
    fn stored_key_wins() {
        let resolver = resolver();
        resolver
            .store()
            .set(&ScopeId::conversation("r1"), &KeyMaterial::new("ab12"))
            .unwrap();

        let resolved = resolver.resolve_with_source(&conv("r1"), None).unwrap();
        assert_eq!(resolved.key, KeyMaterial::new("ab12"));
        assert_eq!(resolved.source, KeyStrategy::Stored);
    }

    #[test]
    fn direct_store_write_is_seen_by_next_resolve() {
        let resolver = resolver();
        let scope = ScopeId::conversation("r1");

        resolver.store().set(&scope, &KeyMaterial::new("ab12")).unwrap();
        assert_eq!(resolver.resolve(&conv("r1"), None).unwrap(), KeyMaterial::new("ab12"));

        resolver.store().set(&scope, &KeyMaterial::new("cd34")).unwrap();
        assert_eq!(resolver.resolve(&conv("r1"), None).unwrap(), KeyMaterial::new("cd34"));
        assert_eq!(resolver.last_resolved(&conv("r1")), Some(KeyMaterial::new("cd34")));
    }

    #[test]
    fn resolvers_sharing_a_store_converge() {
        let store = MemoryKeyStore::new();
        let first = KeyResolver::new(store.clone(), XorCipher, ResolverConfig::default());
        let second = KeyResolver::new(store, XorCipher, ResolverConfig::default());

        let derived = first.resolve(&conv("r1"), None).unwrap();
        assert_eq!(second.resolve(&conv("r1"), None).unwrap(), derived);

        second
            .restore_keys(
                &UserId::new("u1"),
                &KeyBackup {
                    user_key: "00".to_string(),
                    conversation_keys: BTreeMap::from([("r1".to_string(), "ef56".to_string())]),
                },
            )
            .unwrap();
        assert_eq!(first.resolve(&conv("r1"), None).unwrap(), KeyMaterial::new("ef56"));
    }

    #[test]
    fn missing_key_falls_back_and_persists() {
        let resolver = resolver();

        let first = resolver.resolve_with_source(&conv("r2"), None).unwrap();
        assert_eq!(first.source, KeyStrategy::RoomFallback);
        assert_eq!(first.key, derive_fallback_key("r2"));
        assert_eq!(
            resolver.store().get(&ScopeId::conversation("r2")).unwrap(),
            Some(first.key.clone())
        );

        let second = resolver.resolve_with_source(&conv("r2"), None).unwrap();
        assert_eq!(second.key, first.key);
        assert_eq!(second.source, KeyStrategy::Stored);
    }

    #[test]
    fn participants_derive_initial_key() {
        let resolver = resolver();
        let (a, b) = (UserId::new("alice"), UserId::new("bob"));

        let resolved = resolver.resolve_with_source(&conv("r3"), Some((&b, &a))).unwrap();
        assert_eq!(resolved.source, KeyStrategy::ParticipantDerived);
        assert_eq!(resolved.key, derive_room_key("alice", "bob"));
    }

    #[test]
    fn initialize_conversation_keeps_existing_key() {
        let resolver = resolver();
        resolver
            .store()
            .set(&ScopeId::conversation("r1"), &KeyMaterial::new("ab12"))
            .unwrap();

        let key = resolver
            .initialize_conversation(&conv("r1"), &UserId::new("a"), &UserId::new("b"))
            .unwrap();
        assert_eq!(key, KeyMaterial::new("ab12"));
    }

    #[test]
    fn empty_stored_key_is_treated_as_missing() {
        let resolver = resolver();
        resolver.store().set(&ScopeId::conversation("r1"), &KeyMaterial::new("")).unwrap();

        let resolved = resolver.resolve_with_source(&conv("r1"), None).unwrap();
        assert_eq!(resolved.source, KeyStrategy::RoomFallback);
    }

    #[test]
    fn stored_strategy_declines_without_side_effects() {
        let resolver = resolver();
        assert_eq!(resolver.attempt(KeyStrategy::Stored, &conv("r1"), None).unwrap(), None);
        assert!(resolver.store().is_empty());

        let declined = resolver.attempt(KeyStrategy::ParticipantDerived, &conv("r1"), None);
        assert_eq!(declined.unwrap(), None);
    }

    #[test]
    fn only_the_last_key_strategy_always_yields() {
        let resolver = resolver();
        let (last, rest) = KEY_STRATEGIES.split_last().unwrap();

        for &strategy in rest {
            assert_eq!(resolver.attempt(strategy, &conv("r9"), None).unwrap(), None);
        }
        assert!(resolver.attempt(*last, &conv("r9"), None).unwrap().is_some());
    }

    #[test]
    fn storage_failure_surfaces() {
        let resolver = KeyResolver::new(
            ChaoticKeyStore::new(MemoryKeyStore::new(), 1.0),
            XorCipher,
            ResolverConfig::default(),
        );

        assert!(matches!(resolver.resolve(&conv("r1"), None), Err(StoreError::Io(_))));
    }

    #[test]
    fn open_with_resolved_key() {
        let resolver = resolver();
        let key = KeyMaterial::new("ab12");
        let sealed = resolver.seal(&key, "hello").unwrap();

        let opened = resolver.open(&conv("r1"), &key, &sealed.ciphertext, Some(&sealed.tag));
        assert_eq!(opened.content, "hello");
        assert_eq!(opened.recovery, Recovery::Recovered(RecoveryStrategy::ResolvedKey));
    }

    #[test]
    fn open_falls_back_to_room_key_when_tag_rejects_resolved_key() {
        let resolver = resolver();
        let fallback = derive_fallback_key("r1");
        let sealed = resolver.seal(&fallback, "written before the key changed").unwrap();

        let opened = resolver.open(
            &conv("r1"),
            &KeyMaterial::new("ab12"),
            &sealed.ciphertext,
            Some(&sealed.tag),
        );
        assert_eq!(opened.content, "written before the key changed");
        assert_eq!(opened.recovery, Recovery::Recovered(RecoveryStrategy::FallbackKey));
    }

    #[test]
    fn open_shows_plaintext_unchanged() {
        let resolver = resolver();
        let body = "this was never encrypted, honest!";

        let opened = resolver.open(&conv("r1"), &KeyMaterial::new("ab12"), body, None);
        assert_eq!(opened.content, body);
        assert_eq!(opened.recovery, Recovery::Recovered(RecoveryStrategy::PlaintextHeuristic));
    }

    #[test]
    fn open_returns_sentinel_when_everything_fails() {
        let resolver = resolver();
        let body = "§§§ ÿÿÿ ☃☃☃ ΩΩΩ";

        let opened = resolver.open(&conv("r1"), &KeyMaterial::new("ab12"), body, None);
        assert_eq!(opened.content, crate::UNRECOVERABLE_SENTINEL);
        assert_eq!(opened.recovery, Recovery::Unrecoverable);
    }

    #[test]
    fn heuristic_thresholds() {
        let config = ResolverConfig::default();

        assert!(is_likely_plaintext("plain words", &config));
        assert!(!is_likely_plaintext("", &config));
        assert!(!is_likely_plaintext(&"a".repeat(1000), &config));
        assert!(is_likely_plaintext(&"a".repeat(999), &config));
        // 7 of 10 printable is exactly the threshold
        assert!(is_likely_plaintext("abcdefg☃☃☃", &config));
        assert!(!is_likely_plaintext("abcdef☃☃☃☃", &config));
    }

    #[test]
    fn user_key_is_generated_once() {
        let resolver = resolver();
        let user = UserId::new("u1");

        let first = resolver.initialize_user_key(&user, [1; SECURE_KEY_BYTES]).unwrap();
        let second = resolver.initialize_user_key(&user, [2; SECURE_KEY_BYTES]).unwrap();

        assert_eq!(first, second);
        assert_eq!(first.as_str(), "01".repeat(SECURE_KEY_BYTES));
    }

    #[test]
    fn backup_requires_user_key() {
        let resolver = resolver();
        let result = resolver.backup_keys(&UserId::new("nobody"));
        assert_eq!(result, Err(KeyError::MissingUserKey(UserId::new("nobody"))));
    }

    #[test]
    fn backup_restore_roundtrip() {
        let source = resolver();
        let user = UserId::new("u1");
        source.initialize_user_key(&user, [9; SECURE_KEY_BYTES]).unwrap();
        let r1 = source.resolve(&conv("r1"), None).unwrap();
        let r2 = source
            .initialize_conversation(&conv("r2"), &UserId::new("u1"), &UserId::new("u2"))
            .unwrap();

        let backup = source.backup_keys(&user).unwrap();
        assert_eq!(backup.conversation_keys.len(), 2);

        let target = resolver();
        target.restore_keys(&user, &backup).unwrap();

        assert_eq!(target.resolve(&conv("r1"), None).unwrap(), r1);
        assert_eq!(target.resolve(&conv("r2"), None).unwrap(), r2);
        assert_eq!(target.backup_keys(&user).unwrap(), backup);
    }

    #[test]
    fn backup_debug_is_redacted() {
        let backup = KeyBackup {
            user_key: "supersecret".to_string(),
            conversation_keys: BTreeMap::from([("r1".to_string(), "alsosecret".to_string())]),
        };
        let rendered = format!("{backup:?}");
        assert!(!rendered.contains("secret"));
    }

    #[test]
    fn clear_all_keys_drops_cache_too() {
        let resolver = resolver();
        resolver.initialize_user_key(&UserId::new("u1"), [3; SECURE_KEY_BYTES]).unwrap();
        resolver
            .initialize_conversation(&conv("r1"), &UserId::new("u1"), &UserId::new("u2"))
            .unwrap();

        assert_eq!(resolver.clear_all_keys().unwrap(), 2);
        assert!(resolver.store().is_empty());
        assert_eq!(resolver.last_resolved(&conv("r1")), None);

        let resolved = resolver.resolve_with_source(&conv("r1"), None).unwrap();
        assert_eq!(resolved.source, KeyStrategy::RoomFallback);
    }
}
