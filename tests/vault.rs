use std::collections::HashSet;

use guardian_vault::{
    ErrorKind, KeyDerivation, Record, VaultCodec, VaultError, create_empty_vault, create_vault,
    load_vault, open_vault,
};
use proptest::prelude::*;

const SALT: std::ops::Range<usize> = 9..25;
const NONCE: std::ops::Range<usize> = 25..37;

fn example() -> Record {
    Record::new("1", "Example", "p4ss")
        .with_username("alice")
        .with_url("example.com")
}

#[test]
fn correct_horse_example_roundtrips() {
    let record = example();
    let sealed = create_vault("correct horse battery staple", std::slice::from_ref(&record)).unwrap();
    let payload = open_vault("correct horse battery staple", &sealed).unwrap();

    assert_eq!(payload.entries(), [record]);
    let record = &payload.entries()[0];
    assert_eq!(record.username.as_deref(), Some("alice"));
    assert_eq!(record.url.as_deref(), Some("example.com"));
    assert_eq!(record.notes, None);
}

#[test]
fn passphrase_case_matters() {
    let sealed = create_vault("correct horse battery staple", &[example()]).unwrap();
    let err = open_vault("Correct Horse Battery Staple", &sealed).unwrap_err();

    assert!(matches!(err, VaultError::Authentication));
    assert_eq!(err.kind(), ErrorKind::Authentication);
}

#[test]
fn wrong_passphrase_on_empty_vault_fails() {
    let sealed = create_vault("one", &[]).unwrap();
    assert!(matches!(
        open_vault("two", &sealed),
        Err(VaultError::Authentication)
    ));
}

#[test]
fn empty_vault_roundtrip() {
    let sealed = create_vault("pw", &[]).unwrap();
    // header, JSON with two 24-character timestamps, tag
    let json_len = br#"{"entries":[],"createdAt":"","lastModified":""}"#.len() + 48;
    assert_eq!(sealed.len(), 37 + json_len + 16);

    let payload = open_vault("pw", &sealed).unwrap();
    assert!(payload.is_empty());
    assert!(payload.created_at() <= payload.last_modified());
}

#[test]
fn order_is_preserved() {
    let records: Vec<_> = ["zeta", "alpha", "mid"]
        .iter()
        .enumerate()
        .map(|(i, name)| Record::new(i.to_string(), *name, format!("pw{i}")))
        .collect();

    let payload = open_vault("pw", &create_vault("pw", &records).unwrap()).unwrap();
    assert_eq!(payload.entries(), records.as_slice());
}

#[test]
fn load_vault_is_open_vault() {
    let sealed = create_vault("pw", &[example()]).unwrap();
    assert_eq!(
        load_vault("pw", &sealed).unwrap().entries(),
        open_vault("pw", &sealed).unwrap().entries()
    );
}

#[test]
fn bit_flips_in_ciphertext_are_detected() {
    let codec = VaultCodec::with_key_derivation(KeyDerivation::fallback_only());
    let sealed = codec.seal("pw", &[example()]).unwrap();
    let tag_start = sealed.len() - 16;

    for byte in (37..tag_start).step_by(11).chain(tag_start..sealed.len()) {
        let mut tampered = sealed.clone();
        tampered[byte] ^= 1 << (byte % 8);
        let err = codec.unseal("pw", &tampered).unwrap_err();
        assert!(
            matches!(err, VaultError::Authentication),
            "byte {byte}: {err:?}"
        );
    }
}

#[test]
fn tampering_detected_by_default_codec() {
    let mut sealed = create_vault("pw", &[example()]).unwrap();
    let last = sealed.len() - 1;
    sealed[last] ^= 0x80;

    assert!(matches!(
        open_vault("pw", &sealed),
        Err(VaultError::Authentication)
    ));
}

#[test]
fn magic_and_version_errors_are_distinct() {
    let sealed = create_vault("pw", &[]).unwrap();

    let mut bad_magic = sealed.clone();
    bad_magic[3] ^= 0xff;
    let magic_err = open_vault("pw", &bad_magic).unwrap_err();
    assert!(matches!(magic_err, VaultError::InvalidMagic));
    assert_eq!(magic_err.kind(), ErrorKind::Format);

    let mut bad_version = sealed;
    bad_version[8] = 0x02;
    let version_err = open_vault("pw", &bad_version).unwrap_err();
    assert!(matches!(
        version_err,
        VaultError::UnsupportedVersion { found: 2, .. }
    ));
    assert_eq!(version_err.kind(), ErrorKind::Format);
    assert_ne!(magic_err.to_string(), version_err.to_string());
}

#[test]
fn inputs_below_minimum_size_are_rejected() {
    let sealed = create_vault("pw", &[]).unwrap();
    for len in [0, 1, 8, 9, 37, 52] {
        let err = open_vault("pw", &sealed[..len]).unwrap_err();
        assert!(matches!(err, VaultError::TooShort { min: 53, .. }));
        assert_eq!(err.kind(), ErrorKind::Parameter);
    }
}

#[test]
fn salts_and_nonces_never_repeat() {
    let codec = VaultCodec::with_key_derivation(KeyDerivation::fallback_only());
    let mut salts = HashSet::new();
    let mut nonces = HashSet::new();

    for _ in 0..16 {
        let sealed = codec.seal("pw", &[example()]).unwrap();
        assert!(salts.insert(sealed[SALT].to_vec()));
        assert!(nonces.insert(sealed[NONCE].to_vec()));
    }
}

#[test]
fn kdf_is_deterministic_and_salt_sensitive() {
    let kdf = KeyDerivation::new();
    let salt = [0x24u8; 16];

    let a = kdf.derive("pw", &salt).unwrap();
    let b = kdf.derive("pw", &salt).unwrap();
    assert_eq!(a.key().as_bytes(), b.key().as_bytes());

    for i in [0, 7, 15] {
        let mut other = salt;
        other[i] ^= 1;
        let c = kdf.derive("pw", &other).unwrap();
        assert_ne!(a.key().as_bytes(), c.key().as_bytes());
    }
}

#[test]
fn empty_vault_constructor_has_timestamps() {
    let payload = create_empty_vault();
    assert!(payload.is_empty());
    assert_eq!(payload.created_at(), payload.last_modified());
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(8))]

    #[test]
    fn arbitrary_records_roundtrip(
        pass in "[ -~]{0,24}",
        fields in proptest::collection::vec(
            ("[a-z]{1,12}", "\\PC{0,32}", proptest::option::of("\\PC{0,16}")),
            0..6,
        ),
    ) {
        let records: Vec<Record> = fields
            .into_iter()
            .enumerate()
            .map(|(i, (name, password, notes))| {
                let mut record = Record::new(format!("id-{i}"), name, password);
                record.notes = notes;
                record
            })
            .collect();

        let codec = VaultCodec::with_key_derivation(KeyDerivation::fallback_only());
        let sealed = codec.seal(&pass, &records).unwrap();
        let payload = codec.unseal(&pass, &sealed).unwrap();
        prop_assert_eq!(payload.entries(), records.as_slice());
    }
}
