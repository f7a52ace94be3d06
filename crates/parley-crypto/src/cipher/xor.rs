//! Repeating-key XOR stream cipher.
//!
//! # Security
//!
//! Confidentiality here is nominal. There is no nonce, so equal plaintexts
//! under one key produce equal ciphertexts, and XOR of two ciphertexts
//! cancels the key. There is no authentication. It exists because messages
//! already at rest were written with it. New deployments should use
//! [`super::SealedCipher`].

use base64::{Engine, engine::general_purpose::STANDARD};

use super::Cipher;
use crate::{CipherError, KeyMaterial};

/// XOR of UTF-8 plaintext bytes against the key bytes, base64-encoded.
///
/// Keystream position is `byte_index % key_len`. Works on bytes, not on
/// chars or UTF-16 units, so supplementary-plane characters round-trip.
#[derive(Debug, Clone, Copy, Default)]
pub struct XorCipher;

impl XorCipher {
    /// Create the cipher.
    pub fn new() -> Self {
        Self
    }
}

impl Cipher for XorCipher {
    fn encrypt(&self, plaintext: &str, key: &KeyMaterial) -> Result<String, CipherError> {
        let stream = apply_keystream(plaintext.as_bytes(), key)?;
        Ok(STANDARD.encode(stream))
    }

    fn decrypt(&self, ciphertext: &str, key: &KeyMaterial) -> Result<String, CipherError> {
        if key.is_empty() {
            return Err(CipherError::EmptyKey);
        }

        let encrypted = STANDARD
            .decode(ciphertext)
            .map_err(|e| CipherError::malformed(format!("invalid base64: {e}")))?;
        let decrypted = apply_keystream(&encrypted, key)?;

        String::from_utf8(decrypted)
            .map_err(|e| CipherError::malformed(format!("invalid UTF-8 after decryption: {e}")))
    }
}

fn apply_keystream(input: &[u8], key: &KeyMaterial) -> Result<Vec<u8>, CipherError> {
    let key_bytes = key.as_bytes();
    if key_bytes.is_empty() {
        return Err(CipherError::EmptyKey);
    }

    Ok(input.iter().zip(key_bytes.iter().cycle()).map(|(byte, k)| byte ^ k).collect())
}
