//! Error types for every layer of the vault engine.

use thiserror::Error;

/// Coarse classification callers use to pick a user-facing message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Caller bug: wrong buffer sizes, duplicate ids, truncated input.
    Parameter,
    /// Data problem: bad magic, unknown version, malformed payload.
    Format,
    /// Wrong passphrase or tampered container. Deliberately not split.
    Authentication,
    /// Host could not provide what the operation needs (memory, entropy).
    Resource,
}

/// The operating system refused to hand out random bytes.
#[derive(Debug, Error)]
#[error("OS random generator unavailable")]
pub struct RandomError;

/// Key derivation errors.
#[derive(Debug, Error)]
pub enum KdfError {
    /// Salt is not exactly 16 bytes
    #[error("invalid salt length: expected {expected}, got {actual}")]
    InvalidSaltLength {
        /// Expected length
        expected: usize,
        /// Actual length
        actual: usize,
    },

    /// Cost parameters rejected by the primitive
    #[error("invalid key derivation parameters: {0}")]
    InvalidParameters(String),

    /// Scratch arena for the memory-hard function could not be allocated
    #[error("insufficient memory for key derivation: {required_bytes} bytes required")]
    InsufficientMemory {
        /// Bytes the cost parameters demand
        required_bytes: usize,
    },

    /// Argon2id backend failed its start-up self-check
    #[error("argon2id backend unavailable")]
    PrimaryUnavailable,
}

/// AuthenticatedCipher errors. Never retried, never padded around.
#[derive(Debug, Error)]
pub enum CipherError {
    /// Key is not 32 bytes
    #[error("invalid key length: expected {expected}, got {actual}")]
    InvalidKeyLength {
        /// Expected length
        expected: usize,
        /// Actual length
        actual: usize,
    },

    /// Nonce is not 12 bytes
    #[error("invalid nonce length: expected {expected}, got {actual}")]
    InvalidNonceLength {
        /// Expected length
        expected: usize,
        /// Actual length
        actual: usize,
    },

    /// Input to decrypt cannot even hold a tag
    #[error("ciphertext too short: need at least {min} bytes, got {actual}")]
    CiphertextTooShort {
        /// Minimum length (the tag)
        min: usize,
        /// Actual length
        actual: usize,
    },

    /// Message would exhaust the 32-bit block counter
    #[error("message too long for a single nonce")]
    MessageTooLong,

    /// Tag mismatch
    #[error("authentication failed")]
    AuthenticationFailed,
}

impl CipherError {
    /// Classifies the error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            CipherError::AuthenticationFailed => ErrorKind::Authentication,
            _ => ErrorKind::Parameter,
        }
    }
}

/// Errors surfaced by sealing and unsealing a vault container.
#[derive(Debug, Error)]
pub enum VaultError {
    /// Container shorter than header plus tag
    #[error("invalid vault format: file too short ({actual} bytes, minimum {min})")]
    TooShort {
        /// Actual length
        actual: usize,
        /// Minimum valid container length
        min: usize,
    },

    /// Magic marker mismatch
    #[error("invalid vault format: incorrect magic header")]
    InvalidMagic,

    /// Version byte not in the version table
    #[error("unsupported vault version: {found}, expected version: {expected}")]
    UnsupportedVersion {
        /// Version byte read from the container
        found: u8,
        /// Version this build writes
        expected: u8,
    },

    /// Decrypted payload does not have the expected structure
    #[error("invalid vault format: {0}")]
    MalformedContent(String),

    /// Wrong passphrase or corrupted file; which one is never revealed
    #[error("invalid password or corrupted vault")]
    Authentication,

    /// Two records share one identifier
    #[error("duplicate record id '{0}'")]
    DuplicateRecordId(String),

    /// Payload could not be encoded
    #[error("failed to serialize vault payload: {0}")]
    Serialization(#[source] serde_json::Error),

    /// Key derivation failed and was not recoverable
    #[error(transparent)]
    Kdf(#[from] KdfError),

    /// Cipher rejected its inputs while sealing
    #[error(transparent)]
    Cipher(CipherError),

    /// No entropy for salt or nonce
    #[error(transparent)]
    Random(#[from] RandomError),
}

impl VaultError {
    /// Maps the error onto the coarse taxonomy.
    pub fn kind(&self) -> ErrorKind {
        match self {
            VaultError::TooShort { .. } | VaultError::DuplicateRecordId(_) => ErrorKind::Parameter,
            VaultError::InvalidMagic
            | VaultError::UnsupportedVersion { .. }
            | VaultError::MalformedContent(_)
            | VaultError::Serialization(_) => ErrorKind::Format,
            VaultError::Authentication => ErrorKind::Authentication,
            VaultError::Kdf(KdfError::InvalidSaltLength { .. })
            | VaultError::Kdf(KdfError::InvalidParameters(_)) => ErrorKind::Parameter,
            VaultError::Kdf(_) | VaultError::Random(_) => ErrorKind::Resource,
            VaultError::Cipher(e) => e.kind(),
        }
    }
}

impl From<CipherError> for VaultError {
    fn from(err: CipherError) -> Self {
        match err {
            CipherError::AuthenticationFailed => VaultError::Authentication,
            other => VaultError::Cipher(other),
        }
    }
}

/// Record collection errors.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Id already present
    #[error("record '{0}' already exists")]
    DuplicateId(String),
    /// Id or name not present
    #[error("record '{0}' not found")]
    NotFound(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn authentication_message_does_not_distinguish_causes() {
        let msg = VaultError::Authentication.to_string();
        assert_eq!(msg, "invalid password or corrupted vault");
    }

    #[test]
    fn tag_mismatch_becomes_authentication_error() {
        let err: VaultError = CipherError::AuthenticationFailed.into();
        assert!(matches!(err, VaultError::Authentication));
        assert_eq!(err.kind(), ErrorKind::Authentication);
    }

    #[test]
    fn parameter_errors_stay_parameter_errors() {
        let err: VaultError = CipherError::InvalidNonceLength {
            expected: 12,
            actual: 11,
        }
        .into();
        assert_eq!(err.kind(), ErrorKind::Parameter);
    }

    #[test]
    fn memory_failure_is_a_resource_error() {
        let err = VaultError::from(KdfError::InsufficientMemory {
            required_bytes: 1 << 30,
        });
        assert_eq!(err.kind(), ErrorKind::Resource);
    }

    #[test]
    fn version_and_magic_errors_are_distinct() {
        let version = VaultError::UnsupportedVersion {
            found: 9,
            expected: 1,
        };
        assert_eq!(version.kind(), ErrorKind::Format);
        assert!(version.to_string().contains("unsupported vault version: 9"));
        assert_ne!(version.to_string(), VaultError::InvalidMagic.to_string());
    }
}
