//! Conversation key material.

use std::fmt;

use zeroize::{Zeroize, ZeroizeOnDrop};

/// Symmetric key material for one conversation (or one local user).
///
/// Keys are textual (lowercase hex in practice). Cipher operations consume
/// the UTF-8 bytes of the text, so `"ab12"` keys the stream with
/// `[0x61, 0x62, 0x31, 0x32]`.
///
/// The buffer is zeroized on drop and never printed by `Debug`.
#[derive(Clone, PartialEq, Eq, Zeroize, ZeroizeOnDrop)]
pub struct KeyMaterial(String);

impl KeyMaterial {
    /// Wrap existing key text.
    pub fn new(text: impl Into<String>) -> Self {
        Self(text.into())
    }

    /// Key text as stored.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Bytes that drive the cipher keystream.
    pub fn as_bytes(&self) -> &[u8] {
        self.0.as_bytes()
    }

    /// True if there are no key bytes.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Length of the key in bytes.
    pub fn len(&self) -> usize {
        self.0.len()
    }
}

impl fmt::Debug for KeyMaterial {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "KeyMaterial([REDACTED; {}])", self.0.len())
    }
}

impl From<&str> for KeyMaterial {
    fn from(text: &str) -> Self {
        Self::new(text)
    }
}

impl From<String> for KeyMaterial {
    fn from(text: String) -> Self {
        Self::new(text)
    }
}
