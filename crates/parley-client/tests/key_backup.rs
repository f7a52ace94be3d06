//! Key backup export and import across installations.

use parley_client::{ConversationId, KeyBackup, KeyResolver, ResolverConfig, UserId};
use parley_crypto::SealedCipher;
use parley_store::{KeyStore, MemoryKeyStore, RedbKeyStore, ScopeId};
use tempfile::TempDir;

#[test]
fn backup_survives_cbor_and_restores_into_fresh_store() {
    let dir = TempDir::new().unwrap();
    let user = UserId::new("u1");

    let source = KeyResolver::new(
        RedbKeyStore::open(dir.path().join("keys.redb")).unwrap(),
        SealedCipher,
        ResolverConfig::default(),
    );
    source.initialize_user_key(&user, [0x5a; 32]).unwrap();
    let r1 = source.resolve(&ConversationId::new("r1"), None).unwrap();
    let r2 = source
        .initialize_conversation(&ConversationId::new("r2"), &user, &UserId::new("u2"))
        .unwrap();

    let backup = source.backup_keys(&user).unwrap();
    let mut encoded = Vec::new();
    ciborium::into_writer(&backup, &mut encoded).unwrap();
    let decoded: KeyBackup = ciborium::from_reader(encoded.as_slice()).unwrap();
    assert_eq!(decoded, backup);

    let target =
        KeyResolver::new(MemoryKeyStore::new(), SealedCipher, ResolverConfig::default());
    target.restore_keys(&user, &decoded).unwrap();

    assert_eq!(target.resolve(&ConversationId::new("r1"), None).unwrap(), r1);
    assert_eq!(target.resolve(&ConversationId::new("r2"), None).unwrap(), r2);
    assert_eq!(
        target.store().get(&ScopeId::user("u1")).unwrap().map(|k| k.as_str().to_string()),
        Some("5a".repeat(32))
    );
}

#[test]
fn sealed_bodies_open_after_restore() {
    let user = UserId::new("u1");
    let r1 = ConversationId::new("r1");

    let source = KeyResolver::new(MemoryKeyStore::new(), SealedCipher, ResolverConfig::default());
    source.initialize_user_key(&user, [1; 32]).unwrap();
    let key = source.resolve(&r1, None).unwrap();
    let sealed = source.seal(&key, "see you on the other phone").unwrap();

    let target = KeyResolver::new(MemoryKeyStore::new(), SealedCipher, ResolverConfig::default());
    target.restore_keys(&user, &source.backup_keys(&user).unwrap()).unwrap();

    let opened = target.open_message(&r1, &sealed.ciphertext, Some(&sealed.tag)).unwrap();
    assert_eq!(opened.content, "see you on the other phone");
}
