//! ChaCha20-Poly1305 authenticated encryption as used by the vault format.
//!
//! The Poly1305 one-time key is the first half of ChaCha20 block 0 under an
//! all-zero nonce; the payload keystream starts at block 1 under the caller's
//! nonce. The tag covers the ciphertext bytes only.

use subtle::ConstantTimeEq;
use zeroize::{Zeroize, Zeroizing};

use super::chacha20::{BLOCK_LEN, ChaCha20};
use super::poly1305::{self, KEY_LEN as MAC_KEY_LEN};
use super::{KEY_LEN, NONCE_LEN, TAG_LEN};
use crate::error::CipherError;

/// Largest plaintext the 32-bit counter can cover starting from block 1.
const MAX_MESSAGE_LEN: u64 = (u32::MAX as u64) * BLOCK_LEN as u64;

fn check_key(key: &[u8]) -> Result<&[u8; KEY_LEN], CipherError> {
    key.try_into().map_err(|_| CipherError::InvalidKeyLength {
        expected: KEY_LEN,
        actual: key.len(),
    })
}

fn check_nonce(nonce: &[u8]) -> Result<&[u8; NONCE_LEN], CipherError> {
    nonce.try_into().map_err(|_| CipherError::InvalidNonceLength {
        expected: NONCE_LEN,
        actual: nonce.len(),
    })
}

fn mac_key(key: &[u8; KEY_LEN]) -> Zeroizing<[u8; MAC_KEY_LEN]> {
    let mut block = ChaCha20::new(key, &[0u8; NONCE_LEN], 0).block();
    let mut otk = Zeroizing::new([0u8; MAC_KEY_LEN]);
    otk.copy_from_slice(&block[..MAC_KEY_LEN]);
    block.zeroize();
    otk
}

/// Encrypt plaintext, returning `ciphertext || tag`.
///
/// # Errors
///
/// Returns an error if the key is not 32 bytes, the nonce is not 12 bytes,
/// or the plaintext is too long for the block counter.
pub fn encrypt(key: &[u8], nonce: &[u8], plaintext: &[u8]) -> Result<Vec<u8>, CipherError> {
    let key = check_key(key)?;
    let nonce = check_nonce(nonce)?;
    if plaintext.len() as u64 > MAX_MESSAGE_LEN {
        return Err(CipherError::MessageTooLong);
    }

    let mut out = Vec::with_capacity(plaintext.len() + TAG_LEN);
    out.extend_from_slice(plaintext);
    ChaCha20::new(key, nonce, 1).apply_keystream(&mut out);

    let tag = poly1305::authenticate(&mac_key(key), &out);
    out.extend_from_slice(&tag);

    Ok(out)
}

/// Verify the tag and decrypt `ciphertext || tag`.
///
/// Nothing is decrypted unless the tag matches.
///
/// # Errors
///
/// Returns [`CipherError::AuthenticationFailed`] on tag mismatch, and a
/// parameter error for wrong key/nonce sizes or input shorter than a tag.
pub fn decrypt(
    key: &[u8],
    nonce: &[u8],
    ciphertext: &[u8],
) -> Result<Zeroizing<Vec<u8>>, CipherError> {
    let key = check_key(key)?;
    let nonce = check_nonce(nonce)?;
    if ciphertext.len() < TAG_LEN {
        return Err(CipherError::CiphertextTooShort {
            min: TAG_LEN,
            actual: ciphertext.len(),
        });
    }

    let (body, tag) = ciphertext.split_at(ciphertext.len() - TAG_LEN);
    let expected = poly1305::authenticate(&mac_key(key), body);

    if !bool::from(expected.ct_eq(tag)) {
        return Err(CipherError::AuthenticationFailed);
    }

    let mut plaintext = Zeroizing::new(body.to_vec());
    ChaCha20::new(key, nonce, 1).apply_keystream(&mut plaintext);
    Ok(plaintext)
}
