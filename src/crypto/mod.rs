//! Cryptographic primitives for the vault.
//!
//! ChaCha20 and Poly1305 are implemented here directly; key derivation
//! wraps Argon2id with a PBKDF2-HMAC-SHA-256 fallback.

pub mod aead;
pub(crate) mod chacha20;
pub mod kdf;
pub(crate) mod pbkdf2;
pub(crate) mod poly1305;

pub use aead::{decrypt, encrypt};
pub use kdf::{
    DerivedKey, Key, KdfMethod, KdfProfile, KdfStrategy, KeyDerivation, PrimitiveStatus,
    primary_available, primary_status,
};

/// Length of the salt (16 bytes).
pub const SALT_LEN: usize = 16;
/// Length of the nonce (12 bytes for ChaCha20-Poly1305).
pub const NONCE_LEN: usize = 12;
/// Length of the encryption key (32 bytes / 256 bits).
pub const KEY_LEN: usize = 32;
/// Length of the Poly1305 tag.
pub const TAG_LEN: usize = 16;
