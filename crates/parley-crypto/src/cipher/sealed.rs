//! Authenticated cipher using `XChaCha20-Poly1305`.
//!
//! Drop-in replacement for [`super::XorCipher`]: same key material, same
//! base64 text output. The textual key is expanded to a 32-byte AEAD key
//! with HKDF-SHA256, a fresh 24-byte nonce is drawn per message, and the
//! output is `base64(nonce || ciphertext || tag)`.

use base64::{Engine, engine::general_purpose::STANDARD};
use chacha20poly1305::{
    XChaCha20Poly1305, XNonce,
    aead::{Aead, KeyInit},
};
use hkdf::Hkdf;
use sha2::Sha256;
use zeroize::Zeroizing;

use super::Cipher;
use crate::{CipherError, KeyMaterial};

/// Size of the `XChaCha20` nonce prefix (24 bytes)
pub const NONCE_SIZE: usize = 24;

/// Poly1305 tag size (16 bytes)
pub const TAG_SIZE: usize = 16;

/// Label used for AEAD key expansion
const SEALED_KEY_LABEL: &[u8] = b"parleySealedBodyV1";

/// Authenticated encryption of message bodies.
#[derive(Debug, Clone, Copy, Default)]
pub struct SealedCipher;

impl SealedCipher {
    /// Create the cipher.
    pub fn new() -> Self {
        Self
    }

    /// Encrypt with an explicit nonce.
    ///
    /// Pure function for deterministic tests. Callers MUST NOT reuse a nonce
    /// under the same key.
    pub fn seal_with_nonce(
        &self,
        plaintext: &str,
        key: &KeyMaterial,
        nonce: [u8; NONCE_SIZE],
    ) -> Result<String, CipherError> {
        let cipher = aead_for(key)?;

        let Ok(ciphertext) = cipher.encrypt(XNonce::from_slice(&nonce), plaintext.as_bytes())
        else {
            return Err(CipherError::malformed("plaintext exceeds AEAD limits"));
        };

        let mut sealed = Vec::with_capacity(NONCE_SIZE + ciphertext.len());
        sealed.extend_from_slice(&nonce);
        sealed.extend_from_slice(&ciphertext);

        Ok(STANDARD.encode(sealed))
    }
}

impl Cipher for SealedCipher {
    fn encrypt(&self, plaintext: &str, key: &KeyMaterial) -> Result<String, CipherError> {
        let mut nonce = [0u8; NONCE_SIZE];
        getrandom::fill(&mut nonce).map_err(|e| CipherError::Entropy(e.to_string()))?;

        self.seal_with_nonce(plaintext, key, nonce)
    }

    fn decrypt(&self, ciphertext: &str, key: &KeyMaterial) -> Result<String, CipherError> {
        let cipher = aead_for(key)?;

        let sealed = STANDARD
            .decode(ciphertext)
            .map_err(|e| CipherError::malformed(format!("invalid base64: {e}")))?;

        if sealed.len() < NONCE_SIZE + TAG_SIZE {
            return Err(CipherError::malformed(format!(
                "sealed body too short: {} bytes",
                sealed.len()
            )));
        }

        let (nonce, body) = sealed.split_at(NONCE_SIZE);
        let plaintext = cipher
            .decrypt(XNonce::from_slice(nonce), body)
            .map_err(|_| CipherError::Authentication)?;

        String::from_utf8(plaintext)
            .map_err(|e| CipherError::malformed(format!("invalid UTF-8 after decryption: {e}")))
    }
}

fn aead_for(key: &KeyMaterial) -> Result<XChaCha20Poly1305, CipherError> {
    if key.is_empty() {
        return Err(CipherError::EmptyKey);
    }

    let hkdf = Hkdf::<Sha256>::new(None, key.as_bytes());
    let mut okm = Zeroizing::new([0u8; 32]);
    let Ok(()) = hkdf.expand(SEALED_KEY_LABEL, &mut *okm) else {
        unreachable!("32 bytes is a valid HKDF-SHA256 output length");
    };

    Ok(XChaCha20Poly1305::new((&*okm).into()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key() -> KeyMaterial {
        KeyMaterial::new("ab12")
    }

    #[test]
    fn encrypt_decrypt_roundtrip() {
        let cipher = SealedCipher::new();
        let encrypted = cipher.encrypt("hello 😀", &key()).unwrap();

        assert_eq!(cipher.decrypt(&encrypted, &key()).unwrap(), "hello 😀");
    }

    #[test]
    fn fresh_nonce_per_message() {
        let a = SealedCipher.encrypt("same", &key()).unwrap();
        let b = SealedCipher.encrypt("same", &key()).unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn explicit_nonce_is_deterministic() {
        let a = SealedCipher.seal_with_nonce("same", &key(), [7; NONCE_SIZE]).unwrap();
        let b = SealedCipher.seal_with_nonce("same", &key(), [7; NONCE_SIZE]).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn output_length_is_nonce_plus_body_plus_tag() {
        let encrypted = SealedCipher.seal_with_nonce("four", &key(), [0; NONCE_SIZE]).unwrap();
        let raw = STANDARD.decode(encrypted).unwrap();
        assert_eq!(raw.len(), NONCE_SIZE + 4 + TAG_SIZE);
    }

    #[test]
    fn wrong_key_fails_authentication() {
        let encrypted = SealedCipher.encrypt("secret", &key()).unwrap();
        let result = SealedCipher.decrypt(&encrypted, &KeyMaterial::new("ab13"));
        assert_eq!(result, Err(CipherError::Authentication));
    }

    #[test]
    fn tampered_body_fails_authentication() {
        let encrypted = SealedCipher.seal_with_nonce("secret", &key(), [1; NONCE_SIZE]).unwrap();
        let mut raw = STANDARD.decode(encrypted).unwrap();
        raw[NONCE_SIZE] ^= 0xFF;

        let result = SealedCipher.decrypt(&STANDARD.encode(raw), &key());
        assert_eq!(result, Err(CipherError::Authentication));
    }

    #[test]
    fn truncated_body_is_malformed() {
        let result = SealedCipher.decrypt(&STANDARD.encode([0u8; 10]), &key());
        assert!(matches!(result, Err(CipherError::Malformed { .. })));
    }

    #[test]
    fn empty_key_is_rejected() {
        assert_eq!(SealedCipher.encrypt("x", &KeyMaterial::new("")), Err(CipherError::EmptyKey));
    }
}
