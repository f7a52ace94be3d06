//! Message body ciphers.
//!
//! [`Cipher`] is the seam between key management and the primitive that
//! actually transforms message bodies. Both implementations speak the same
//! `text -> base64 text` contract, so swapping one for the other changes
//! nothing upstream.

mod sealed;
mod xor;

pub use sealed::{NONCE_SIZE, SealedCipher, TAG_SIZE};
pub use xor::XorCipher;

use crate::{CipherError, KeyMaterial};

/// Symmetric transform between plaintext and base64 ciphertext.
///
/// # Invariants
///
/// - `decrypt(encrypt(s, k)?, k) == Ok(s)` for every string `s` and every
///   non-empty key `k`
/// - Neither method panics on any input
pub trait Cipher: Send + Sync + 'static {
    /// Encrypt `plaintext` under `key`, returning base64 text.
    fn encrypt(&self, plaintext: &str, key: &KeyMaterial) -> Result<String, CipherError>;

    /// Invert [`Cipher::encrypt`].
    fn decrypt(&self, ciphertext: &str, key: &KeyMaterial) -> Result<String, CipherError>;
}

impl<C: Cipher> Cipher for std::sync::Arc<C> {
    fn encrypt(&self, plaintext: &str, key: &KeyMaterial) -> Result<String, CipherError> {
        (**self).encrypt(plaintext, key)
    }

    fn decrypt(&self, ciphertext: &str, key: &KeyMaterial) -> Result<String, CipherError> {
        (**self).decrypt(ciphertext, key)
    }
}
