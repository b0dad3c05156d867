//! PBKDF2 with HMAC-SHA-256 as the PRF.

use hmac::{Hmac, Mac};
use sha2::Sha256;
use zeroize::Zeroize;

use crate::error::KdfError;

type HmacSha256 = Hmac<Sha256>;

const PRF_LEN: usize = 32;

/// Fills `out` with PBKDF2-HMAC-SHA-256(password, salt, rounds).
pub(crate) fn pbkdf2_hmac_sha256(
    password: &[u8],
    salt: &[u8],
    rounds: u32,
    out: &mut [u8],
) -> Result<(), KdfError> {
    if rounds == 0 {
        return Err(KdfError::InvalidParameters(
            "pbkdf2 needs at least one round".into(),
        ));
    }

    let prf = HmacSha256::new_from_slice(password)
        .map_err(|e| KdfError::InvalidParameters(format!("hmac key rejected: {e}")))?;

    for (index, chunk) in out.chunks_mut(PRF_LEN).enumerate() {
        let block_index = u32::try_from(index + 1)
            .map_err(|_| KdfError::InvalidParameters("pbkdf2 output too long".into()))?;

        let mut u = [0u8; PRF_LEN];
        let mut mac = prf.clone();
        mac.update(salt);
        mac.update(&block_index.to_be_bytes());
        u.copy_from_slice(&mac.finalize().into_bytes());

        let mut t = u;
        for _ in 1..rounds {
            let mut mac = prf.clone();
            mac.update(&u);
            u.copy_from_slice(&mac.finalize().into_bytes());
            for (acc, x) in t.iter_mut().zip(u.iter()) {
                *acc ^= x;
            }
        }

        chunk.copy_from_slice(&t[..chunk.len()]);
        u.zeroize();
        t.zeroize();
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn derive_hex(password: &str, salt: &str, rounds: u32) -> String {
        let mut out = [0u8; 32];
        pbkdf2_hmac_sha256(password.as_bytes(), salt.as_bytes(), rounds, &mut out).unwrap();
        hex::encode(out)
    }

    #[test]
    fn single_round_vector() {
        assert_eq!(
            derive_hex("password", "salt", 1),
            "120fb6cffcf8b32c43e7225256c4f837a86548c92ccc35480805987cb70be17b"
        );
    }

    #[test]
    fn many_rounds_vector() {
        assert_eq!(
            derive_hex("password", "salt", 4096),
            "c5e478d59288c841aa530db6845c4c8d962893a001ce4e11a4963873aa98134a"
        );
    }

    #[test]
    fn longer_output_extends_shorter_one() {
        let mut short = [0u8; 32];
        let mut long = [0u8; 80];
        pbkdf2_hmac_sha256(b"pw", b"NaCl", 3, &mut short).unwrap();
        pbkdf2_hmac_sha256(b"pw", b"NaCl", 3, &mut long).unwrap();

        assert_eq!(short, long[..32]);
        assert_ne!(long[32..64], long[..32]);
    }

    #[test]
    fn zero_rounds_rejected() {
        let mut out = [0u8; 32];
        assert!(matches!(
            pbkdf2_hmac_sha256(b"pw", b"salt", 0, &mut out),
            Err(KdfError::InvalidParameters(_))
        ));
    }
}
