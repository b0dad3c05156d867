//! Sealing record collections into vault containers and back.

use tracing::{debug, warn};

use crate::crypto::{KdfMethod, KdfStrategy, KeyDerivation, aead};
use crate::error::{CipherError, KdfError, VaultError};
use crate::format::{self, Container};
use crate::random;
use crate::record::{Record, Timestamp};
use crate::store::{self, VaultPayload};

/// Seals and unseals vault containers.
///
/// Holds no secrets between calls; every seal draws a fresh salt and nonce.
#[derive(Debug, Clone, Copy, Default)]
pub struct VaultCodec {
    kdf: KeyDerivation,
}

impl VaultCodec {
    pub fn new() -> Self {
        Self::with_key_derivation(KeyDerivation::new())
    }

    pub fn with_key_derivation(kdf: KeyDerivation) -> Self {
        Self { kdf }
    }

    pub fn key_derivation(&self) -> &KeyDerivation {
        &self.kdf
    }

    /// Seals `records` into a new container. Both payload timestamps are
    /// set to now.
    ///
    /// # Errors
    ///
    /// Duplicate record ids, key derivation failures and an unavailable
    /// random source abort the seal; no partial container is returned.
    pub fn seal(&self, passphrase: &str, records: &[Record]) -> Result<Vec<u8>, VaultError> {
        let now = Timestamp::now();
        let plaintext = store::encode(records, now, now, None)?;
        self.seal_plaintext(passphrase, &plaintext)
    }

    /// Seals an existing payload, keeping its creation time and stamping
    /// its modification time with now.
    ///
    /// The payload is only stamped once the container is complete; on error
    /// it is left untouched.
    pub fn seal_payload(
        &self,
        passphrase: &str,
        payload: &mut VaultPayload,
    ) -> Result<Vec<u8>, VaultError> {
        let now = Timestamp::now();
        let plaintext = payload.to_json_at(now)?;
        let bytes = self.seal_plaintext(passphrase, &plaintext)?;
        payload.set_last_modified(now);
        Ok(bytes)
    }

    fn seal_plaintext(&self, passphrase: &str, plaintext: &[u8]) -> Result<Vec<u8>, VaultError> {
        let salt = random::generate_salt()?;
        let nonce = random::generate_nonce()?;

        let derived = self.kdf.derive(passphrase, &salt)?;
        let ciphertext = aead::encrypt(derived.key().as_bytes(), &nonce, plaintext)?;
        drop(derived);

        let bytes = format::serialize(&Container::new(salt, nonce, ciphertext))?;
        debug!(
            plaintext_len = plaintext.len(),
            container_len = bytes.len(),
            "sealed vault"
        );
        Ok(bytes)
    }

    /// Opens a container.
    ///
    /// The container's version selects a schedule of key derivations.
    /// Each is tried in turn while decryption keeps failing
    /// authentication. A step that would repeat an already tried method is
    /// skipped, as is one whose primitive turns out to be unavailable.
    ///
    /// # Errors
    ///
    /// - [`VaultError::TooShort`], [`VaultError::InvalidMagic`] or
    ///   [`VaultError::UnsupportedVersion`] before any key is derived
    /// - [`VaultError::Authentication`] when every step fails to authenticate
    /// - [`VaultError::MalformedContent`] when the payload decrypts but
    ///   does not have the vault structure
    /// - [`VaultError::Kdf`] when a derivation cannot get its memory
    pub fn unseal(&self, passphrase: &str, data: &[u8]) -> Result<VaultPayload, VaultError> {
        let container = format::parse(data)?;
        let version = format::lookup(container.version()).ok_or(VaultError::UnsupportedVersion {
            found: container.version(),
            expected: format::CURRENT_VERSION,
        })?;

        self.open_with_schedule(passphrase, &container, version.kdf_schedule)
    }

    fn open_with_schedule(
        &self,
        passphrase: &str,
        container: &Container,
        schedule: &[KdfStrategy],
    ) -> Result<VaultPayload, VaultError> {
        let mut tried: Vec<KdfMethod> = Vec::with_capacity(schedule.len());
        for (step, &strategy) in schedule.iter().enumerate() {
            if self
                .kdf
                .method_for(strategy)
                .is_some_and(|method| tried.contains(&method))
            {
                continue;
            }

            let derived = match self.kdf.derive_with(passphrase, container.salt(), strategy) {
                Ok(derived) => derived,
                Err(KdfError::PrimaryUnavailable) => {
                    debug!(?strategy, "key derivation unavailable, skipping");
                    continue;
                }
                Err(e) => return Err(e.into()),
            };
            let method = derived.method();
            tried.push(method);

            match aead::decrypt(
                derived.key().as_bytes(),
                container.nonce(),
                container.ciphertext(),
            ) {
                Ok(plaintext) => {
                    if step > 0 {
                        warn!(%method, "vault opened with an older key derivation");
                    }
                    return VaultPayload::from_json(&plaintext);
                }
                Err(CipherError::AuthenticationFailed) => {
                    debug!(%method, "authentication failed");
                }
                Err(other) => return Err(other.into()),
            }
        }

        Err(VaultError::Authentication)
    }
}
