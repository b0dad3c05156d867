//! ChaCha20 stream cipher (20 rounds, 96-bit nonce, 32-bit block counter).

use zeroize::Zeroize;

use super::{KEY_LEN, NONCE_LEN};

/// Keystream produced per counter value.
pub(crate) const BLOCK_LEN: usize = 64;

/// "expand 32-byte k"
const SIGMA: [u32; 4] = [0x6170_7865, 0x3320_646e, 0x7962_2d32, 0x6b20_6574];

/// Cipher state: 4 constant words, 8 key words, counter, 3 nonce words.
pub(crate) struct ChaCha20 {
    state: [u32; 16],
}

impl ChaCha20 {
    pub(crate) fn new(key: &[u8; KEY_LEN], nonce: &[u8; NONCE_LEN], counter: u32) -> Self {
        let mut state = [0u32; 16];
        state[..4].copy_from_slice(&SIGMA);

        for (word, chunk) in state[4..12].iter_mut().zip(key.chunks_exact(4)) {
            *word = u32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]);
        }

        state[12] = counter;

        for (word, chunk) in state[13..].iter_mut().zip(nonce.chunks_exact(4)) {
            *word = u32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]);
        }

        Self { state }
    }

    /// Keystream block for the current counter. Does not advance.
    pub(crate) fn block(&self) -> [u8; BLOCK_LEN] {
        let mut working = self.state;

        for _ in 0..10 {
            // columns
            quarter_round(&mut working, 0, 4, 8, 12);
            quarter_round(&mut working, 1, 5, 9, 13);
            quarter_round(&mut working, 2, 6, 10, 14);
            quarter_round(&mut working, 3, 7, 11, 15);
            // diagonals
            quarter_round(&mut working, 0, 5, 10, 15);
            quarter_round(&mut working, 1, 6, 11, 12);
            quarter_round(&mut working, 2, 7, 8, 13);
            quarter_round(&mut working, 3, 4, 9, 14);
        }

        let mut out = [0u8; BLOCK_LEN];
        for (i, (mixed, initial)) in working.iter().zip(self.state.iter()).enumerate() {
            out[i * 4..i * 4 + 4].copy_from_slice(&mixed.wrapping_add(*initial).to_le_bytes());
        }
        working.zeroize();

        out
    }

    /// XORs the keystream into `buf`, one counter step per 64-byte chunk.
    ///
    /// The caller bounds the message length so the counter cannot wrap.
    pub(crate) fn apply_keystream(&mut self, buf: &mut [u8]) {
        for chunk in buf.chunks_mut(BLOCK_LEN) {
            let mut keystream = self.block();
            for (byte, key_byte) in chunk.iter_mut().zip(keystream.iter()) {
                *byte ^= key_byte;
            }
            keystream.zeroize();
            self.state[12] = self.state[12].wrapping_add(1);
        }
    }
}

impl Drop for ChaCha20 {
    fn drop(&mut self) {
        self.state.zeroize();
    }
}

#[inline(always)]
fn quarter_round(s: &mut [u32; 16], a: usize, b: usize, c: usize, d: usize) {
    s[a] = s[a].wrapping_add(s[b]);
    s[d] = (s[d] ^ s[a]).rotate_left(16);

    s[c] = s[c].wrapping_add(s[d]);
    s[b] = (s[b] ^ s[c]).rotate_left(12);

    s[a] = s[a].wrapping_add(s[b]);
    s[d] = (s[d] ^ s[a]).rotate_left(8);

    s[c] = s[c].wrapping_add(s[d]);
    s[b] = (s[b] ^ s[c]).rotate_left(7);
}
