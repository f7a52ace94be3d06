//! Deterministic key derivation for conversations.
//!
//! Both derivations expand a 32-bit rolling hash into a fixed-length
//! 32-character hex key (8 hex digits repeated four times). They are
//! reproducible on every device from public identifiers alone, which is
//! exactly why they are weak: anyone who knows the conversation id or the two
//! participant ids knows the key.

use crate::{KeyMaterial, integrity::rolling_hash};

/// Length in hex characters of every derived key.
pub const DERIVED_KEY_LEN: usize = 32;

/// Size of the entropy accepted by [`generate_secure_key`].
pub const SECURE_KEY_BYTES: usize = 32;

/// Derive the initial key for a two-party conversation.
///
/// Order-independent: participant ids are sorted before they are combined,
/// so `derive_room_key(a, b) == derive_room_key(b, a)`.
pub fn derive_room_key(participant_a: &str, participant_b: &str) -> KeyMaterial {
    let (first, second) = if participant_a <= participant_b {
        (participant_a, participant_b)
    } else {
        (participant_b, participant_a)
    };

    let mut combined = String::with_capacity(first.len() + second.len());
    combined.push_str(first);
    combined.push_str(second);

    expand(rolling_hash(&combined))
}

/// Derive the per-room fallback key from the conversation id alone.
pub fn derive_fallback_key(conversation_id: &str) -> KeyMaterial {
    expand(rolling_hash(&format!("chatroom_{conversation_id}_key")))
}

/// Render caller-provided entropy as a 64-character hex key.
///
/// Callers MUST supply cryptographically secure bytes in production.
pub fn generate_secure_key(random: [u8; SECURE_KEY_BYTES]) -> KeyMaterial {
    KeyMaterial::new(hex::encode(random))
}

fn expand(hash: i32) -> KeyMaterial {
    KeyMaterial::new(format!("{:08x}", hash.unsigned_abs()).repeat(4))
}
