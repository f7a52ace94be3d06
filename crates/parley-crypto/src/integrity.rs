//! Rolling checksum and the soft integrity tag built on it.
//!
//! The checksum is the classic 32-bit `h = h * 31 + unit` over UTF-16 code
//! units, rendered as the lowercase hex of its absolute value. Tags and
//! derived keys produced by existing installations depend on this exact
//! arithmetic, so it must not change.
//!
//! # Security
//!
//! This is NOT a MAC. Anyone can compute a valid tag for any text once the
//! key is known, and collisions are trivial to find. It only catches
//! accidental corruption and wrong-key decryptions that happen to produce
//! valid UTF-8. Use [`crate::SealedCipher`] where tamper evidence matters.

use crate::KeyMaterial;

/// 32-bit wrapping rolling hash over the UTF-16 code units of `text`.
pub fn rolling_hash(text: &str) -> i32 {
    text.encode_utf16()
        .fold(0i32, |hash, unit| hash.wrapping_shl(5).wrapping_sub(hash).wrapping_add(i32::from(unit)))
}

/// Rolling hash rendered as lowercase hex of its absolute value.
///
/// `i32::MIN` renders as `80000000`.
pub fn rolling_hash_hex(text: &str) -> String {
    format!("{:x}", rolling_hash(text).unsigned_abs())
}

/// Soft integrity tag over `plaintext + key`.
pub fn integrity_tag(plaintext: &str, key: &KeyMaterial) -> String {
    let mut combined = String::with_capacity(plaintext.len() + key.len());
    combined.push_str(plaintext);
    combined.push_str(key.as_str());
    rolling_hash_hex(&combined)
}

/// Check a tag produced by [`integrity_tag`].
pub fn verify_tag(plaintext: &str, tag: &str, key: &KeyMaterial) -> bool {
    integrity_tag(plaintext, key) == tag
}
