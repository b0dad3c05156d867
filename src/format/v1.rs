//! File format v1.
//!
//! V1 File Format:
//! ```text
//! MAGIC "GUARDIAN" (8) | VERSION 0x01 (1) | SALT (16) | NONCE (12) | CIPHERTEXT || TAG (>= 16)
//! ```

use super::{Container, MAGIC, MAGIC_LEN, VER_LEN};
use crate::crypto::{NONCE_LEN, SALT_LEN};
use crate::error::VaultError;

/// Version byte of this layout.
pub const VERSION_V1: u8 = 1;

const SALT_OFFSET: usize = MAGIC_LEN + VER_LEN;
const NONCE_OFFSET: usize = SALT_OFFSET + SALT_LEN;
/// Offset of the encrypted payload.
pub const HEADER_LEN: usize = NONCE_OFFSET + NONCE_LEN;

/// Parses a v1 container. Magic, version and minimum length are checked by
/// the caller.
pub fn parse(data: &[u8]) -> Result<Container, VaultError> {
    if data.len() < HEADER_LEN {
        return Err(VaultError::TooShort {
            actual: data.len(),
            min: HEADER_LEN,
        });
    }

    let mut salt = [0u8; SALT_LEN];
    salt.copy_from_slice(&data[SALT_OFFSET..NONCE_OFFSET]);

    let mut nonce = [0u8; NONCE_LEN];
    nonce.copy_from_slice(&data[NONCE_OFFSET..HEADER_LEN]);

    Ok(Container {
        version: VERSION_V1,
        salt,
        nonce,
        ciphertext: data[HEADER_LEN..].to_vec(),
    })
}

/// Serializes a container to v1 bytes.
pub fn serialize(container: &Container) -> Vec<u8> {
    let mut buf = Vec::with_capacity(HEADER_LEN + container.ciphertext.len());

    buf.extend_from_slice(MAGIC);
    buf.push(VERSION_V1);
    buf.extend_from_slice(&container.salt);
    buf.extend_from_slice(&container.nonce);
    buf.extend_from_slice(&container.ciphertext);

    buf
}
