//! Passphrase key derivation.
//!
//! Argon2id with fixed cost profiles is the primary primitive. The backend
//! is self-checked once per process; when it is unusable the current
//! profile falls back to PBKDF2-HMAC-SHA-256. Cost parameters are never lowered to make a
//! derivation fit: a scratch arena that cannot be allocated is an error.

use std::fmt;
use std::sync::OnceLock;
use std::time::Instant;

use argon2::{Algorithm, Argon2, Block, Params, Version};
use tracing::{debug, warn};
use zeroize::Zeroize;

use super::pbkdf2::pbkdf2_hmac_sha256;
use super::{KEY_LEN, SALT_LEN};
use crate::error::KdfError;

/// Iterations of the fallback derivation.
pub const PBKDF2_ITERATIONS: u32 = 100_000;

/// Bytes per Argon2 memory block.
const ARGON2_BLOCK_BYTES: usize = 1024;

/// Argon2id cost parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KdfProfile {
    mem_cost_kib: u32,
    time_cost: u32,
    parallelism: u32,
}

impl KdfProfile {
    /// Cost used for every new vault.
    pub const CURRENT: KdfProfile = KdfProfile {
        mem_cost_kib: 32 * 1024, // 32 MiB
        time_cost: 4,
        parallelism: 1,
    };

    /// Cost of vaults written before the memory cost was halved.
    pub const LEGACY: KdfProfile = KdfProfile {
        mem_cost_kib: 64 * 1024, // 64 MiB
        time_cost: 4,
        parallelism: 1,
    };

    pub fn mem_cost_kib(&self) -> u32 {
        self.mem_cost_kib
    }

    pub fn time_cost(&self) -> u32 {
        self.time_cost
    }

    pub fn parallelism(&self) -> u32 {
        self.parallelism
    }

    fn params(&self) -> Result<Params, KdfError> {
        Params::new(
            self.mem_cost_kib,
            self.time_cost,
            self.parallelism,
            Some(KEY_LEN),
        )
        .map_err(|e| KdfError::InvalidParameters(format!("argon2: {e}")))
    }
}

/// A derived 256-bit key. Zeroized on drop.
pub struct Key([u8; KEY_LEN]);

impl Key {
    pub fn as_bytes(&self) -> &[u8; KEY_LEN] {
        &self.0
    }
}

impl Drop for Key {
    fn drop(&mut self) {
        self.0.zeroize();
    }
}

impl fmt::Debug for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Key").field(&"[REDACTED]").finish()
    }
}

/// Which construction produced a key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KdfMethod {
    Argon2id(KdfProfile),
    Pbkdf2Sha256 { iterations: u32 },
}

impl fmt::Display for KdfMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KdfMethod::Argon2id(p) => write!(
                f,
                "argon2id (m={} KiB, t={}, p={})",
                p.mem_cost_kib, p.time_cost, p.parallelism
            ),
            KdfMethod::Pbkdf2Sha256 { iterations } => {
                write!(f, "pbkdf2-hmac-sha256 ({iterations} iterations)")
            }
        }
    }
}

/// A key together with the method that produced it.
#[derive(Debug)]
pub struct DerivedKey {
    key: Key,
    method: KdfMethod,
}

impl DerivedKey {
    pub fn key(&self) -> &Key {
        &self.key
    }

    pub fn method(&self) -> KdfMethod {
        self.method
    }

    /// True when the primary primitive was skipped.
    pub fn used_fallback(&self) -> bool {
        matches!(self.method, KdfMethod::Pbkdf2Sha256 { .. })
    }
}

/// What to attempt for one derivation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KdfStrategy {
    /// Argon2id at the current cost; PBKDF2 if the backend is unavailable.
    Current,
    /// Argon2id at the legacy cost. No fallback.
    Legacy,
    /// PBKDF2-HMAC-SHA-256 only.
    Fallback,
}

/// Diagnostics for the primary primitive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PrimitiveStatus {
    pub available: bool,
    pub algorithm: &'static str,
    pub version: u32,
}

/// Handle to an Argon2id backend that passed its self-check.
#[derive(Debug)]
pub(crate) struct Argon2Backend {
    algorithm: Algorithm,
    version: Version,
}

static BACKEND: OnceLock<Option<Argon2Backend>> = OnceLock::new();

fn backend() -> Option<&'static Argon2Backend> {
    BACKEND.get_or_init(Argon2Backend::self_check).as_ref()
}

/// Whether Argon2id can run in this process.
pub fn primary_available() -> bool {
    backend().is_some()
}

/// Status report for the primary primitive.
pub fn primary_status() -> PrimitiveStatus {
    PrimitiveStatus {
        available: primary_available(),
        algorithm: "argon2id",
        version: Version::V0x13 as u32,
    }
}

impl Argon2Backend {
    const CHECK_PROFILE: KdfProfile = KdfProfile {
        mem_cost_kib: Params::MIN_M_COST,
        time_cost: 1,
        parallelism: 1,
    };

    /// Runs a minimum-cost derivation twice. A backend that errors or
    /// disagrees with itself is treated as absent.
    fn self_check() -> Option<Self> {
        let backend = Self {
            algorithm: Algorithm::Argon2id,
            version: Version::V0x13,
        };
        let salt = [0x5au8; SALT_LEN];

        let first = backend.hash(b"self-check", &salt, Self::CHECK_PROFILE);
        let second = backend.hash(b"self-check", &salt, Self::CHECK_PROFILE);

        match (first, second) {
            (Ok(a), Ok(b)) if a.0 == b.0 && a.0 != [0u8; KEY_LEN] => {
                debug!("argon2id backend ready");
                Some(backend)
            }
            (Err(e), _) | (_, Err(e)) => {
                warn!(error = %e, "argon2id backend failed its self-check");
                None
            }
            _ => {
                warn!("argon2id backend produced inconsistent output");
                None
            }
        }
    }

    fn hash(
        &self,
        password: &[u8],
        salt: &[u8; SALT_LEN],
        profile: KdfProfile,
    ) -> Result<Key, KdfError> {
        let params = profile.params()?;
        let mut scratch = Scratch::allocate(params.block_count())?;

        let mut key = Key([0u8; KEY_LEN]);
        Argon2::new(self.algorithm, self.version, params)
            .hash_password_into_with_memory(
                password,
                salt,
                &mut key.0,
                scratch.blocks.as_mut_slice(),
            )
            .map_err(|e| {
                warn!(error = %e, "argon2id execution failed");
                KdfError::PrimaryUnavailable
            })?;

        Ok(key)
    }
}

/// Caller-owned working memory for Argon2. Zeroized on drop.
struct Scratch {
    blocks: Vec<Block>,
}

impl Scratch {
    fn allocate(block_count: usize) -> Result<Self, KdfError> {
        let required_bytes = block_count.saturating_mul(ARGON2_BLOCK_BYTES);

        let mut blocks = Vec::new();
        blocks
            .try_reserve_exact(block_count)
            .map_err(|_| KdfError::InsufficientMemory { required_bytes })?;
        blocks.resize(block_count, Block::default());

        Ok(Self { blocks })
    }
}

impl Drop for Scratch {
    fn drop(&mut self) {
        self.blocks.zeroize();
    }
}

/// Derives vault keys from passphrases.
///
/// Stateless apart from a reference to the process-wide Argon2id handle;
/// cheap to create and safe to share across threads.
#[derive(Debug, Clone, Copy)]
pub struct KeyDerivation {
    primary: Option<&'static Argon2Backend>,
}

impl Default for KeyDerivation {
    fn default() -> Self {
        Self::new()
    }
}

impl KeyDerivation {
    /// Uses Argon2id when the backend self-check succeeded.
    pub fn new() -> Self {
        Self { primary: backend() }
    }

    /// Never touches Argon2id, as on a host without the primitive.
    pub fn fallback_only() -> Self {
        Self { primary: None }
    }

    pub fn primary_available(&self) -> bool {
        self.primary.is_some()
    }

    /// The method `strategy` resolves to on this handle, or `None` when it
    /// cannot run at all.
    pub fn method_for(&self, strategy: KdfStrategy) -> Option<KdfMethod> {
        let pbkdf2 = KdfMethod::Pbkdf2Sha256 {
            iterations: PBKDF2_ITERATIONS,
        };
        match (strategy, self.primary) {
            (KdfStrategy::Current, Some(_)) => Some(KdfMethod::Argon2id(KdfProfile::CURRENT)),
            (KdfStrategy::Legacy, Some(_)) => Some(KdfMethod::Argon2id(KdfProfile::LEGACY)),
            (KdfStrategy::Current, None) | (KdfStrategy::Fallback, _) => Some(pbkdf2),
            (KdfStrategy::Legacy, None) => None,
        }
    }

    /// Derives with [`KdfStrategy::Current`], the only strategy used for
    /// sealing.
    ///
    /// # Errors
    ///
    /// Fails if the salt is not 16 bytes or the scratch memory cannot be
    /// allocated. An unavailable backend is not an error.
    pub fn derive(&self, passphrase: &str, salt: &[u8]) -> Result<DerivedKey, KdfError> {
        self.derive_with(passphrase, salt, KdfStrategy::Current)
    }

    /// Derives with an explicit strategy.
    pub fn derive_with(
        &self,
        passphrase: &str,
        salt: &[u8],
        strategy: KdfStrategy,
    ) -> Result<DerivedKey, KdfError> {
        let salt: &[u8; SALT_LEN] = salt.try_into().map_err(|_| KdfError::InvalidSaltLength {
            expected: SALT_LEN,
            actual: salt.len(),
        })?;

        match strategy {
            KdfStrategy::Current => match self.argon2(passphrase, salt, KdfProfile::CURRENT) {
                Err(KdfError::PrimaryUnavailable) => {
                    warn!("argon2id unavailable, deriving with pbkdf2-hmac-sha256");
                    self.pbkdf2(passphrase, salt)
                }
                other => other,
            },
            KdfStrategy::Legacy => self.argon2(passphrase, salt, KdfProfile::LEGACY),
            KdfStrategy::Fallback => self.pbkdf2(passphrase, salt),
        }
    }

    fn argon2(
        &self,
        passphrase: &str,
        salt: &[u8; SALT_LEN],
        profile: KdfProfile,
    ) -> Result<DerivedKey, KdfError> {
        let backend = self.primary.ok_or(KdfError::PrimaryUnavailable)?;

        let started = Instant::now();
        let key = backend.hash(passphrase.as_bytes(), salt, profile)?;
        let method = KdfMethod::Argon2id(profile);
        debug!(%method, elapsed_ms = started.elapsed().as_millis() as u64, "derived key");

        Ok(DerivedKey { key, method })
    }

    fn pbkdf2(&self, passphrase: &str, salt: &[u8; SALT_LEN]) -> Result<DerivedKey, KdfError> {
        let started = Instant::now();
        let mut key = Key([0u8; KEY_LEN]);
        pbkdf2_hmac_sha256(passphrase.as_bytes(), salt, PBKDF2_ITERATIONS, &mut key.0)?;
        let method = KdfMethod::Pbkdf2Sha256 {
            iterations: PBKDF2_ITERATIONS,
        };
        debug!(%method, elapsed_ms = started.elapsed().as_millis() as u64, "derived key");

        Ok(DerivedKey { key, method })
    }
}
