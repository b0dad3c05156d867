//! Container format for `.guardian` vault files.
//!
//! Provides version-aware parsing and serialization. Every version shares
//! the 8-byte magic and the version byte; what follows is version specific.

use tracing::debug;

use crate::crypto::{KdfStrategy, NONCE_LEN, SALT_LEN, TAG_LEN};
use crate::error::VaultError;

pub mod v1;

/// Magic bytes identifying a vault file ("GUARDIAN").
pub const MAGIC: &[u8; MAGIC_LEN] = b"GUARDIAN";
/// Length of magic bytes.
pub const MAGIC_LEN: usize = 8;
/// Length of version field.
pub const VER_LEN: usize = 1;
/// Latest format version
pub const CURRENT_VERSION: u8 = v1::VERSION_V1;
/// Shortest byte sequence that can be a container: header plus an empty
/// payload's tag.
pub const MIN_CONTAINER_LEN: usize = MAGIC_LEN + VER_LEN + SALT_LEN + NONCE_LEN + TAG_LEN;

/// Static description of one container version.
#[derive(Debug)]
pub struct FormatVersion {
    pub version: u8,
    /// Derivations to try when opening, in order. The first entry is the
    /// one used when the version was current.
    pub kdf_schedule: &'static [KdfStrategy],
}

/// Every version this build can open.
pub static VERSIONS: &[FormatVersion] = &[FormatVersion {
    version: v1::VERSION_V1,
    kdf_schedule: &[
        KdfStrategy::Current,
        KdfStrategy::Legacy,
        KdfStrategy::Fallback,
    ],
}];

/// Looks up a version in [`VERSIONS`].
pub fn lookup(version: u8) -> Option<&'static FormatVersion> {
    VERSIONS.iter().find(|v| v.version == version)
}

/// A parsed container: header fields plus `ciphertext || tag`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Container {
    version: u8,
    salt: [u8; SALT_LEN],
    nonce: [u8; NONCE_LEN],
    ciphertext: Vec<u8>,
}

impl Container {
    /// Creates a container in the current version.
    pub fn new(salt: [u8; SALT_LEN], nonce: [u8; NONCE_LEN], ciphertext: Vec<u8>) -> Self {
        Self {
            version: CURRENT_VERSION,
            salt,
            nonce,
            ciphertext,
        }
    }

    /// Returns the file format version.
    pub fn version(&self) -> u8 {
        self.version
    }

    /// Returns the salt used for key derivation.
    pub fn salt(&self) -> &[u8; SALT_LEN] {
        &self.salt
    }

    /// Returns the nonce used for encryption.
    pub fn nonce(&self) -> &[u8; NONCE_LEN] {
        &self.nonce
    }

    /// Returns the encrypted payload including its trailing tag.
    pub fn ciphertext(&self) -> &[u8] {
        &self.ciphertext
    }
}

/// Parses container bytes.
///
/// Automatically dispatches to the appropriate version parser.
///
/// # Errors
///
/// Returns an error if:
/// - The data is shorter than [`MIN_CONTAINER_LEN`]
/// - The magic bytes are invalid
/// - The version is unsupported
pub fn parse(data: &[u8]) -> Result<Container, VaultError> {
    if data.len() < MIN_CONTAINER_LEN {
        return Err(VaultError::TooShort {
            actual: data.len(),
            min: MIN_CONTAINER_LEN,
        });
    }

    if &data[..MAGIC_LEN] != MAGIC {
        return Err(VaultError::InvalidMagic);
    }

    let version = data[MAGIC_LEN];
    let container = match version {
        v1::VERSION_V1 => v1::parse(data)?,
        found => {
            return Err(VaultError::UnsupportedVersion {
                found,
                expected: CURRENT_VERSION,
            });
        }
    };

    debug!(
        version,
        ciphertext_len = container.ciphertext.len(),
        "parsed vault container"
    );
    Ok(container)
}

/// Serializes a container to bytes.
///
/// # Errors
///
/// Returns an error if the version is unsupported.
pub fn serialize(container: &Container) -> Result<Vec<u8>, VaultError> {
    match container.version() {
        v1::VERSION_V1 => Ok(v1::serialize(container)),
        found => Err(VaultError::UnsupportedVersion {
            found,
            expected: CURRENT_VERSION,
        }),
    }
}
