//! Cryptographically secure randomness for salts and nonces.

use getrandom::fill as os_fill;

use crate::crypto::{NONCE_LEN, SALT_LEN};
use crate::error::RandomError;

/// Fill buffer with cryptographically secure random bytes
pub fn fill(buf: &mut [u8]) -> Result<(), RandomError> {
    os_fill(buf).map_err(|_| RandomError)
}

/// Generate salt
pub fn generate_salt() -> Result<[u8; SALT_LEN], RandomError> {
    let mut salt = [0u8; SALT_LEN];
    fill(&mut salt)?;
    Ok(salt)
}

/// Generate a fresh nonce. Call once per encryption.
pub fn generate_nonce() -> Result<[u8; NONCE_LEN], RandomError> {
    let mut nonce = [0u8; NONCE_LEN];
    fill(&mut nonce)?;
    Ok(nonce)
}
