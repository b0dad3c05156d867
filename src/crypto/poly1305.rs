//! Poly1305 one-time authenticator.
//!
//! Evaluates the message polynomial modulo 2^130 - 5 with the accumulator
//! and `r` held in five 26-bit limbs, so every partial product fits a u64.

use zeroize::Zeroize;

use super::TAG_LEN;

/// One-time key: clamped `r` followed by the pad `s`.
pub(crate) const KEY_LEN: usize = 32;

const CHUNK_LEN: usize = 16;
const LIMB_MASK: u32 = 0x03ff_ffff;
/// 2^128 expressed in the top limb.
const HIBIT: u32 = 1 << 24;

pub(crate) struct Poly1305 {
    r: [u32; 5],
    h: [u32; 5],
    pad: [u32; 4],
    buffer: [u8; CHUNK_LEN],
    buffered: usize,
}

#[inline(always)]
fn le32(bytes: &[u8]) -> u32 {
    u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]])
}

impl Poly1305 {
    pub(crate) fn new(key: &[u8; KEY_LEN]) -> Self {
        // clamp r while splitting into limbs
        let r = [
            le32(&key[0..4]) & 0x03ff_ffff,
            (le32(&key[3..7]) >> 2) & 0x03ff_ff03,
            (le32(&key[6..10]) >> 4) & 0x03ff_c0ff,
            (le32(&key[9..13]) >> 6) & 0x03f0_3fff,
            (le32(&key[12..16]) >> 8) & 0x000f_ffff,
        ];

        let pad = [
            le32(&key[16..20]),
            le32(&key[20..24]),
            le32(&key[24..28]),
            le32(&key[28..32]),
        ];

        Self {
            r,
            h: [0; 5],
            pad,
            buffer: [0; CHUNK_LEN],
            buffered: 0,
        }
    }

    pub(crate) fn update(&mut self, mut data: &[u8]) {
        if self.buffered > 0 {
            let take = (CHUNK_LEN - self.buffered).min(data.len());
            self.buffer[self.buffered..self.buffered + take].copy_from_slice(&data[..take]);
            self.buffered += take;
            data = &data[take..];

            if self.buffered < CHUNK_LEN {
                return;
            }
            let chunk = self.buffer;
            self.absorb(&chunk, HIBIT);
            self.buffered = 0;
        }

        let mut chunks = data.chunks_exact(CHUNK_LEN);
        for chunk in &mut chunks {
            self.absorb(chunk, HIBIT);
        }

        let rest = chunks.remainder();
        self.buffer[..rest.len()].copy_from_slice(rest);
        self.buffered = rest.len();
    }

    pub(crate) fn finalize(mut self) -> [u8; TAG_LEN] {
        if self.buffered > 0 {
            // trailing partial chunk: a single 1 byte then zeros, no 2^128 bit
            let mut last = [0u8; CHUNK_LEN];
            last[..self.buffered].copy_from_slice(&self.buffer[..self.buffered]);
            last[self.buffered] = 1;
            self.absorb(&last, 0);
            last.zeroize();
        }

        let [mut h0, mut h1, mut h2, mut h3, mut h4] = self.h;

        // fully carry h
        let mut c = h1 >> 26;
        h1 &= LIMB_MASK;
        h2 += c;
        c = h2 >> 26;
        h2 &= LIMB_MASK;
        h3 += c;
        c = h3 >> 26;
        h3 &= LIMB_MASK;
        h4 += c;
        c = h4 >> 26;
        h4 &= LIMB_MASK;
        h0 += c * 5;
        c = h0 >> 26;
        h0 &= LIMB_MASK;
        h1 += c;

        // g = h + 5 - 2^130
        let mut g0 = h0.wrapping_add(5);
        c = g0 >> 26;
        g0 &= LIMB_MASK;
        let mut g1 = h1.wrapping_add(c);
        c = g1 >> 26;
        g1 &= LIMB_MASK;
        let mut g2 = h2.wrapping_add(c);
        c = g2 >> 26;
        g2 &= LIMB_MASK;
        let mut g3 = h3.wrapping_add(c);
        c = g3 >> 26;
        g3 &= LIMB_MASK;
        let mut g4 = h4.wrapping_add(c).wrapping_sub(1 << 26);

        // select h if h < p, else g, without branching
        let mut mask = (g4 >> 31).wrapping_sub(1);
        g0 &= mask;
        g1 &= mask;
        g2 &= mask;
        g3 &= mask;
        g4 &= mask;
        mask = !mask;
        h0 = (h0 & mask) | g0;
        h1 = (h1 & mask) | g1;
        h2 = (h2 & mask) | g2;
        h3 = (h3 & mask) | g3;
        h4 = (h4 & mask) | g4;

        // repack into 4 x 32 bits
        let w0 = h0 | (h1 << 26);
        let w1 = (h1 >> 6) | (h2 << 20);
        let w2 = (h2 >> 12) | (h3 << 14);
        let w3 = (h3 >> 18) | (h4 << 8);

        // tag = (h + s) mod 2^128
        let mut f = u64::from(w0) + u64::from(self.pad[0]);
        let t0 = f as u32;
        f = u64::from(w1) + u64::from(self.pad[1]) + (f >> 32);
        let t1 = f as u32;
        f = u64::from(w2) + u64::from(self.pad[2]) + (f >> 32);
        let t2 = f as u32;
        f = u64::from(w3) + u64::from(self.pad[3]) + (f >> 32);
        let t3 = f as u32;

        let mut tag = [0u8; TAG_LEN];
        tag[0..4].copy_from_slice(&t0.to_le_bytes());
        tag[4..8].copy_from_slice(&t1.to_le_bytes());
        tag[8..12].copy_from_slice(&t2.to_le_bytes());
        tag[12..16].copy_from_slice(&t3.to_le_bytes());
        tag
    }

    /// h = (h + chunk) * r mod 2^130 - 5
    fn absorb(&mut self, chunk: &[u8], hibit: u32) {
        let [r0, r1, r2, r3, r4] = self.r;
        let (s1, s2, s3, s4) = (r1 * 5, r2 * 5, r3 * 5, r4 * 5);

        let [mut h0, mut h1, mut h2, mut h3, mut h4] = self.h;

        h0 += le32(&chunk[0..4]) & LIMB_MASK;
        h1 += (le32(&chunk[3..7]) >> 2) & LIMB_MASK;
        h2 += (le32(&chunk[6..10]) >> 4) & LIMB_MASK;
        h3 += (le32(&chunk[9..13]) >> 6) & LIMB_MASK;
        h4 += (le32(&chunk[12..16]) >> 8) | hibit;

        let m = |a: u32, b: u32| u64::from(a) * u64::from(b);

        let d0 = m(h0, r0) + m(h1, s4) + m(h2, s3) + m(h3, s2) + m(h4, s1);
        let mut d1 = m(h0, r1) + m(h1, r0) + m(h2, s4) + m(h3, s3) + m(h4, s2);
        let mut d2 = m(h0, r2) + m(h1, r1) + m(h2, r0) + m(h3, s4) + m(h4, s3);
        let mut d3 = m(h0, r3) + m(h1, r2) + m(h2, r1) + m(h3, r0) + m(h4, s4);
        let mut d4 = m(h0, r4) + m(h1, r3) + m(h2, r2) + m(h3, r1) + m(h4, r0);

        // partial reduction mod 2^130 - 5
        let mut c = (d0 >> 26) as u32;
        h0 = d0 as u32 & LIMB_MASK;
        d1 += u64::from(c);
        c = (d1 >> 26) as u32;
        h1 = d1 as u32 & LIMB_MASK;
        d2 += u64::from(c);
        c = (d2 >> 26) as u32;
        h2 = d2 as u32 & LIMB_MASK;
        d3 += u64::from(c);
        c = (d3 >> 26) as u32;
        h3 = d3 as u32 & LIMB_MASK;
        d4 += u64::from(c);
        c = (d4 >> 26) as u32;
        h4 = d4 as u32 & LIMB_MASK;
        h0 += c * 5;
        c = h0 >> 26;
        h0 &= LIMB_MASK;
        h1 += c;

        self.h = [h0, h1, h2, h3, h4];
    }
}

impl Drop for Poly1305 {
    fn drop(&mut self) {
        self.r.zeroize();
        self.h.zeroize();
        self.pad.zeroize();
        self.buffer.zeroize();
    }
}

/// One-shot MAC over `data`.
pub(crate) fn authenticate(key: &[u8; KEY_LEN], data: &[u8]) -> [u8; TAG_LEN] {
    let mut mac = Poly1305::new(key);
    mac.update(data);
    mac.finalize()
}
