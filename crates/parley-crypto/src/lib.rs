//! Parley Cryptographic Primitives
//!
//! Stateless building blocks for conversation confidentiality: body ciphers,
//! a soft integrity tag, and deterministic key derivation. Pure functions
//! with deterministic outputs; callers provide entropy where it is needed
//! (the sealed cipher's default `encrypt` draws its nonce from the OS).
//!
//! # Key Lifecycle
//!
//! ```text
//! participant ids ──► derive_room_key ──┐
//!                                       ├──► KeyMaterial ──► Cipher ──► base64 body
//! conversation id ──► derive_fallback_key ┘
//! ```
//!
//! # Security
//!
//! [`XorCipher`] and [`integrity_tag`] are kept for compatibility with
//! bodies already at rest. They provide no real confidentiality and no
//! tamper evidence:
//! - No nonce: identical plaintexts produce identical ciphertexts
//! - Derived keys are computable from public identifiers
//! - The integrity tag is a 32-bit rolling checksum, not a MAC
//!
//! [`SealedCipher`] keeps the same text-in, text-out contract with
//! `XChaCha20-Poly1305`, a random nonce and an authentication tag. Prefer it
//! for new deployments.

#![forbid(unsafe_code)]
#![deny(missing_docs)]

mod cipher;
mod derivation;
mod error;
mod integrity;
mod key;

pub use cipher::{Cipher, NONCE_SIZE, SealedCipher, TAG_SIZE, XorCipher};
pub use derivation::{
    DERIVED_KEY_LEN, SECURE_KEY_BYTES, derive_fallback_key, derive_room_key, generate_secure_key,
};
pub use error::CipherError;
pub use integrity::{integrity_tag, rolling_hash, rolling_hash_hex, verify_tag};
pub use key::KeyMaterial;
