//! Encrypted credential vaults in the portable `.guardian` container.
//!
//! A vault is a list of [`Record`]s sealed under a passphrase: Argon2id
//! turns the passphrase and a random salt into a key, ChaCha20-Poly1305
//! encrypts the JSON payload, and the container prefixes magic, version,
//! salt and nonce. [`create_vault`] and [`open_vault`] are the byte-level
//! entry points; [`Vault`] adds a file on disk.

pub mod codec;
pub mod crypto;
pub mod error;
pub mod format;
pub mod random;
pub mod record;
pub mod storage;
pub mod store;

pub use crate::codec::VaultCodec;
pub use crate::crypto::{KeyDerivation, PrimitiveStatus, primary_available, primary_status};
pub use crate::error::{ErrorKind, VaultError};
pub use crate::record::{Record, Timestamp};
pub use crate::storage::Storage;
pub use crate::store::{ItemSize, VaultPayload, VaultSettings, ViewMode};

use anyhow::{Context, Result, bail};
use directories::ProjectDirs;
use tracing::info;
use zeroize::Zeroizing;

/// Seals `records` under `passphrase` into container bytes.
pub fn create_vault(passphrase: &str, records: &[Record]) -> Result<Vec<u8>, VaultError> {
    VaultCodec::new().seal(passphrase, records)
}

/// Opens container bytes, returning the records and timestamps.
pub fn open_vault(passphrase: &str, data: &[u8]) -> Result<VaultPayload, VaultError> {
    VaultCodec::new().unseal(passphrase, data)
}

/// Same as [`open_vault`].
pub fn load_vault(passphrase: &str, data: &[u8]) -> Result<VaultPayload, VaultError> {
    open_vault(passphrase, data)
}

/// A payload with no records, stamped now. Nothing is encrypted.
pub fn create_empty_vault() -> VaultPayload {
    VaultPayload::empty()
}

/// An unlocked vault file.
///
/// Keeps the passphrase (zeroized on drop) rather than a key so every
/// [`save`](Vault::save) can draw a fresh salt.
pub struct Vault {
    payload: VaultPayload,
    storage: Storage,
    passphrase: Zeroizing<String>,
    codec: VaultCodec,
}

impl Vault {
    pub fn init(passphrase: Zeroizing<String>) -> Result<Self> {
        Self::init_with_storage(passphrase, default_storage()?)
    }

    pub fn init_with_storage(passphrase: Zeroizing<String>, storage: Storage) -> Result<Self> {
        Self::init_with_storage_and_kdf(passphrase, storage, KeyDerivation::new())
    }

    /// Creates and writes an empty vault.
    ///
    /// # Errors
    ///
    /// Fails if the file already exists or sealing fails.
    pub fn init_with_storage_and_kdf(
        passphrase: Zeroizing<String>,
        storage: Storage,
        kdf: KeyDerivation,
    ) -> Result<Self> {
        if storage.exists() {
            bail!("vault already exists at {}", storage.path().display());
        }

        let mut vault = Self {
            payload: VaultPayload::empty(),
            storage,
            passphrase,
            codec: VaultCodec::with_key_derivation(kdf),
        };
        vault.save()?;
        info!(path = %vault.storage.path().display(), "vault created");

        Ok(vault)
    }

    pub fn open(passphrase: Zeroizing<String>) -> Result<Self> {
        Self::open_with_storage(passphrase, default_storage()?)
    }

    /// Reads and unseals an existing vault file.
    pub fn open_with_storage(passphrase: Zeroizing<String>, storage: Storage) -> Result<Self> {
        if !storage.exists() {
            bail!("vault does not exist at {}", storage.path().display());
        }

        let data = storage.load()?;
        let codec = VaultCodec::new();
        let payload = codec
            .unseal(&passphrase, &data)
            .context("failed to open vault")?;

        Ok(Self {
            payload,
            storage,
            passphrase,
            codec,
        })
    }

    pub fn add(&mut self, record: Record) -> Result<()> {
        self.payload.insert(record)?;
        Ok(())
    }

    pub fn get(&self, id: &str) -> Option<&Record> {
        self.payload.get(id)
    }

    /// Looks a record up by id, then by display name.
    pub fn find(&self, id_or_name: &str) -> Option<&Record> {
        self.payload
            .get(id_or_name)
            .or_else(|| self.payload.find_by_name(id_or_name))
    }

    pub fn update<F>(&mut self, id: &str, change: F) -> Result<()>
    where
        F: FnOnce(&mut Record),
    {
        self.payload.update(id, change)?;
        Ok(())
    }

    pub fn remove(&mut self, id: &str) -> Result<Record> {
        Ok(self.payload.remove(id)?)
    }

    pub fn records(&self) -> &[Record] {
        self.payload.entries()
    }

    pub fn payload(&self) -> &VaultPayload {
        &self.payload
    }

    pub fn settings_mut(&mut self) -> &mut VaultSettings {
        self.payload.settings_mut()
    }

    pub fn storage(&self) -> &Storage {
        &self.storage
    }

    /// Re-seals the payload with a fresh salt and nonce and writes it.
    pub fn save(&mut self) -> Result<()> {
        let bytes = self
            .codec
            .seal_payload(&self.passphrase, &mut self.payload)
            .context("failed to seal vault")?;
        self.storage.save(&bytes)?;
        Ok(())
    }

    /// Switches to a new passphrase and writes the vault.
    pub fn change_passphrase(&mut self, new_passphrase: Zeroizing<String>) -> Result<()> {
        let previous = std::mem::replace(&mut self.passphrase, new_passphrase);
        if let Err(e) = self.save() {
            self.passphrase = previous;
            return Err(e);
        }
        info!("vault passphrase changed");
        Ok(())
    }
}

/// `<data dir>/guardian/vault.guardian` for the current platform.
pub fn default_storage() -> Result<Storage> {
    let project_dirs = ProjectDirs::from("", "", "guardian")
        .context("could not determine platform directories")?;

    Ok(Storage::new(project_dirs.data_dir().join("vault.guardian")))
}

#[cfg(test)]
mod tests {
    use tempfile::tempdir;

    use super::*;

    fn pw(s: &str) -> Zeroizing<String> {
        Zeroizing::new(s.to_string())
    }

    fn fresh() -> (tempfile::TempDir, Storage, Vault) {
        let dir = tempdir().unwrap();
        let storage = Storage::new(dir.path().join("vault.guardian"));
        let vault = Vault::init_with_storage(pw("pw"), storage.clone()).unwrap();
        (dir, storage, vault)
    }

    #[test]
    fn init_and_open_roundtrip() {
        let (_dir, storage, mut vault) = fresh();
        vault
            .add(Record::new("A", "mail", "B").with_username("me"))
            .unwrap();
        vault.save().unwrap();

        let reopened = Vault::open_with_storage(pw("pw"), storage).unwrap();
        assert_eq!(reopened.get("A").unwrap().password, "B");
        assert_eq!(reopened.payload().created_at(), vault.payload().created_at());
    }

    #[test]
    fn init_fails_if_vault_exists() {
        let (_dir, storage, _vault) = fresh();
        assert!(Vault::init_with_storage(pw("pw"), storage).is_err());
    }

    #[test]
    fn open_fails_if_vault_missing() {
        let dir = tempdir().unwrap();
        let storage = Storage::new(dir.path().join("nothing.guardian"));
        assert!(Vault::open_with_storage(pw("pw"), storage).is_err());
    }

    #[test]
    fn wrong_passphrase_fails_with_authentication_error() {
        let (_dir, storage, _vault) = fresh();

        let err = match Vault::open_with_storage(pw("wrong"), storage) {
            Err(e) => e,
            Ok(_) => panic!("wrong passphrase opened the vault"),
        };
        let cause = err.downcast_ref::<VaultError>().unwrap();
        assert_eq!(cause.kind(), ErrorKind::Authentication);
    }

    #[test]
    fn each_save_uses_a_new_salt() {
        let (_dir, storage, mut vault) = fresh();
        let first = storage.load().unwrap();
        vault.save().unwrap();
        let second = storage.load().unwrap();

        assert_ne!(first[9..25], second[9..25]);
        assert_ne!(first[25..37], second[25..37]);
    }

    #[test]
    fn add_existing_id_fails() {
        let (_dir, _storage, mut vault) = fresh();
        vault.add(Record::new("A", "mail", "B")).unwrap();
        assert!(vault.add(Record::new("A", "mail", "C")).is_err());
    }

    #[test]
    fn update_and_remove_work() {
        let (_dir, _storage, mut vault) = fresh();
        vault.add(Record::new("A", "mail", "B")).unwrap();

        vault.update("A", |r| r.password = "C".into()).unwrap();
        assert_eq!(vault.get("A").unwrap().password, "C");
        assert!(vault.update("Z", |_| {}).is_err());

        assert_eq!(vault.remove("A").unwrap().id, "A");
        assert!(vault.get("A").is_none());
        assert!(vault.remove("A").is_err());
    }

    #[test]
    fn find_matches_id_then_name() {
        let (_dir, _storage, mut vault) = fresh();
        vault.add(Record::new("42", "GitHub", "x")).unwrap();

        assert_eq!(vault.find("42").unwrap().name, "GitHub");
        assert_eq!(vault.find("github").unwrap().id, "42");
        assert!(vault.find("gitlab").is_none());
    }

    #[test]
    fn change_passphrase_reseals_under_new_one() {
        let (_dir, storage, mut vault) = fresh();
        vault.add(Record::new("A", "mail", "B")).unwrap();
        vault.change_passphrase(pw("new")).unwrap();

        assert!(Vault::open_with_storage(pw("pw"), storage.clone()).is_err());
        let reopened = Vault::open_with_storage(pw("new"), storage).unwrap();
        assert_eq!(reopened.records().len(), 1);
    }

    #[test]
    fn settings_survive_save() {
        let (_dir, storage, mut vault) = fresh();
        vault.settings_mut().view_mode = Some(ViewMode::Grid);
        vault.save().unwrap();

        let reopened = Vault::open_with_storage(pw("pw"), storage).unwrap();
        assert_eq!(
            reopened.payload().settings().unwrap().view_mode,
            Some(ViewMode::Grid)
        );
    }

    #[test]
    fn empty_vault_constructor_encrypts_nothing() {
        let payload = create_empty_vault();
        assert!(payload.is_empty());
        assert_eq!(payload.created_at(), payload.last_modified());
    }
}
