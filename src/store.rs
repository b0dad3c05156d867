use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use zeroize::Zeroizing;

use crate::error::{StoreError, VaultError};
use crate::record::{Record, Timestamp};

/// Grid or table listing.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ViewMode {
    Grid,
    Table,
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ItemSize {
    Small,
    Medium,
    Large,
}

/// Client preferences stored next to the records. Every field is optional
/// so clients that know fewer settings can still read the document.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct VaultSettings {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub theme: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub accent_color: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub view_mode: Option<ViewMode>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub item_size: Option<ItemSize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub clipboard_clear_seconds: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reveal_censor_seconds: Option<u32>,
}

/// The plaintext document sealed inside a container.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VaultPayload {
    entries: Vec<Record>,
    created_at: Timestamp,
    last_modified: Timestamp,
    settings: Option<VaultSettings>,
}

/// Borrowed view used for encoding, so sealing a slice of records does not
/// copy the secrets.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct PayloadDocument<'a> {
    entries: &'a [Record],
    created_at: Timestamp,
    last_modified: Timestamp,
    #[serde(skip_serializing_if = "Option::is_none")]
    settings: Option<&'a VaultSettings>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct FlatPayload {
    #[serde(default)]
    entries: Option<Vec<Record>>,
    #[serde(default)]
    created_at: Option<Timestamp>,
    #[serde(default)]
    last_modified: Option<Timestamp>,
    #[serde(default)]
    settings: Option<VaultSettings>,
}

/// Older clients wrapped the whole payload inside `entries`.
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct WrappedPayload {
    entries: NestedPayload,
    #[serde(default)]
    created_at: Option<Timestamp>,
    #[serde(default)]
    last_modified: Option<Timestamp>,
    #[serde(default)]
    settings: Option<VaultSettings>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct NestedPayload {
    entries: Vec<Record>,
    #[serde(default)]
    created_at: Option<Timestamp>,
    #[serde(default)]
    last_modified: Option<Timestamp>,
}

impl Default for VaultPayload {
    fn default() -> Self {
        Self::empty()
    }
}

impl VaultPayload {
    /// Payload holding `entries`, both timestamps now.
    pub fn new(entries: Vec<Record>) -> Self {
        let now = Timestamp::now();
        VaultPayload {
            entries,
            created_at: now,
            last_modified: now,
            settings: None,
        }
    }

    /// No records, both timestamps now. Nothing is encrypted.
    pub fn empty() -> Self {
        Self::new(Vec::new())
    }

    /// Replaces the creation time, e.g. to carry it over from a previous
    /// version of the vault.
    pub fn with_created_at(mut self, created_at: Timestamp) -> Self {
        self.created_at = created_at;
        self
    }

    pub fn with_settings(mut self, settings: VaultSettings) -> Self {
        self.settings = Some(settings);
        self
    }

    pub fn entries(&self) -> &[Record] {
        &self.entries
    }

    pub fn into_entries(self) -> Vec<Record> {
        self.entries
    }

    pub fn created_at(&self) -> Timestamp {
        self.created_at
    }

    pub fn last_modified(&self) -> Timestamp {
        self.last_modified
    }

    pub fn settings(&self) -> Option<&VaultSettings> {
        self.settings.as_ref()
    }

    pub fn settings_mut(&mut self) -> &mut VaultSettings {
        self.settings.get_or_insert_with(VaultSettings::default)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn touch(&mut self) {
        self.last_modified = Timestamp::now();
    }

    /// Appends a record. Ids are unique within a payload.
    pub fn insert(&mut self, record: Record) -> Result<(), StoreError> {
        if self.get(&record.id).is_some() {
            return Err(StoreError::DuplicateId(record.id.clone()));
        }
        self.entries.push(record);
        Ok(())
    }

    pub fn get(&self, id: &str) -> Option<&Record> {
        self.entries.iter().find(|r| r.id == id)
    }

    /// First record whose display name matches, ignoring ASCII case.
    pub fn find_by_name(&self, name: &str) -> Option<&Record> {
        self.entries
            .iter()
            .find(|r| r.name.eq_ignore_ascii_case(name))
    }

    /// Applies `change` to the record and bumps its modification time.
    pub fn update<F>(&mut self, id: &str, change: F) -> Result<(), StoreError>
    where
        F: FnOnce(&mut Record),
    {
        match self.entries.iter_mut().find(|r| r.id == id) {
            Some(record) => {
                change(record);
                record.touch();
                Ok(())
            }
            None => Err(StoreError::NotFound(id.to_string())),
        }
    }

    pub fn remove(&mut self, id: &str) -> Result<Record, StoreError> {
        match self.entries.iter().position(|r| r.id == id) {
            Some(index) => Ok(self.entries.remove(index)),
            None => Err(StoreError::NotFound(id.to_string())),
        }
    }

    /// Encodes the payload as a JSON document.
    pub(crate) fn to_json(&self) -> Result<Zeroizing<Vec<u8>>, VaultError> {
        self.to_json_at(self.last_modified)
    }

    /// Encodes the payload with `last_modified` in place of the stored value.
    pub(crate) fn to_json_at(
        &self,
        last_modified: Timestamp,
    ) -> Result<Zeroizing<Vec<u8>>, VaultError> {
        encode(
            &self.entries,
            self.created_at,
            last_modified,
            self.settings.as_ref(),
        )
    }

    pub(crate) fn set_last_modified(&mut self, last_modified: Timestamp) {
        self.last_modified = last_modified;
    }

    /// Decodes a JSON document, lifting the nested layout older clients
    /// wrote.
    ///
    /// Each layout is decoded straight from the bytes into records, so
    /// decrypted secrets never sit in an intermediate buffer.
    pub(crate) fn from_json(bytes: &[u8]) -> Result<Self, VaultError> {
        let flat_err = match serde_json::from_slice::<FlatPayload>(bytes) {
            Ok(flat) => {
                return Ok(VaultPayload {
                    entries: flat.entries.ok_or_else(|| missing("entries"))?,
                    created_at: flat.created_at.ok_or_else(|| missing("createdAt"))?,
                    last_modified: flat.last_modified.ok_or_else(|| missing("lastModified"))?,
                    settings: flat.settings,
                });
            }
            Err(e) => e,
        };

        match serde_json::from_slice::<WrappedPayload>(bytes) {
            Ok(wrapped) => {
                let now = Timestamp::now();
                let inner = wrapped.entries;
                Ok(VaultPayload {
                    entries: inner.entries,
                    created_at: inner.created_at.or(wrapped.created_at).unwrap_or(now),
                    last_modified: inner
                        .last_modified
                        .or(wrapped.last_modified)
                        .unwrap_or(now),
                    settings: wrapped.settings,
                })
            }
            Err(_) => Err(VaultError::MalformedContent(format!(
                "unreadable payload: {flat_err}"
            ))),
        }
    }
}

fn missing(field: &str) -> VaultError {
    VaultError::MalformedContent(format!("missing field '{field}'"))
}

/// Encodes a payload document from borrowed parts.
///
/// # Errors
///
/// Fails with [`VaultError::DuplicateRecordId`] when two records share an id.
pub(crate) fn encode(
    entries: &[Record],
    created_at: Timestamp,
    last_modified: Timestamp,
    settings: Option<&VaultSettings>,
) -> Result<Zeroizing<Vec<u8>>, VaultError> {
    let mut seen = HashSet::with_capacity(entries.len());
    for record in entries {
        if !seen.insert(record.id.as_str()) {
            return Err(VaultError::DuplicateRecordId(record.id.clone()));
        }
    }

    let document = PayloadDocument {
        entries,
        created_at,
        last_modified,
        settings,
    };
    serde_json::to_vec(&document)
        .map(Zeroizing::new)
        .map_err(VaultError::Serialization)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ts(text: &str) -> Timestamp {
        text.parse().unwrap()
    }

    #[test]
    fn empty_payload_has_no_entries_and_timestamps() {
        let payload = VaultPayload::empty();
        assert!(payload.is_empty());
        assert_eq!(payload.created_at(), payload.last_modified());
        assert!(payload.settings().is_none());
    }

    #[test]
    fn insert_works() {
        let mut payload = VaultPayload::empty();
        payload.insert(Record::new("A", "mail", "B")).unwrap();
        assert_eq!(payload.get("A").unwrap().password, "B");
    }

    #[test]
    fn insert_existing_id_fails() {
        let mut payload = VaultPayload::empty();
        payload.insert(Record::new("A", "mail", "B")).unwrap();
        match payload.insert(Record::new("A", "bank", "C")) {
            Err(StoreError::DuplicateId(id)) => assert_eq!(id, "A"),
            other => panic!("expected DuplicateId, got: {other:?}"),
        }
    }

    #[test]
    fn update_works_and_bumps_modification_time() {
        let mut payload = VaultPayload::empty();
        let mut record = Record::new("A", "mail", "B");
        record.last_modified = ts("2020-01-01T00:00:00.000Z");
        payload.insert(record).unwrap();

        payload.update("A", |r| r.password = "C".into()).unwrap();

        let record = payload.get("A").unwrap();
        assert_eq!(record.password, "C");
        assert!(record.last_modified > ts("2020-01-01T00:00:00.000Z"));
    }

    #[test]
    fn update_missing_id_fails() {
        let mut payload = VaultPayload::empty();
        match payload.update("A", |_| {}) {
            Err(StoreError::NotFound(id)) => assert_eq!(id, "A"),
            other => panic!("expected NotFound, got: {other:?}"),
        }
    }

    #[test]
    fn remove_works() {
        let mut payload = VaultPayload::empty();
        payload.insert(Record::new("A", "mail", "B")).unwrap();
        let removed = payload.remove("A").unwrap();
        assert_eq!(removed.id, "A");
        assert!(payload.get("A").is_none());
    }

    #[test]
    fn remove_missing_id_fails() {
        let mut payload = VaultPayload::empty();
        assert!(matches!(payload.remove("A"), Err(StoreError::NotFound(_))));
    }

    #[test]
    fn find_by_name_ignores_case() {
        let mut payload = VaultPayload::empty();
        payload.insert(Record::new("1", "GitHub", "x")).unwrap();
        assert_eq!(payload.find_by_name("github").unwrap().id, "1");
        assert!(payload.find_by_name("gitlab").is_none());
    }

    #[test]
    fn insertion_order_is_preserved() {
        let mut payload = VaultPayload::empty();
        for id in ["c", "a", "b"] {
            payload.insert(Record::new(id, id, "pw")).unwrap();
        }
        let ids: Vec<_> = payload.entries().iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, ["c", "a", "b"]);
    }

    #[test]
    fn json_document_uses_expected_field_names() {
        let payload = VaultPayload::new(vec![Record::new("1", "n", "p")]);
        let json: serde_json::Value = serde_json::from_slice(&payload.to_json().unwrap()).unwrap();

        assert!(json["entries"].is_array());
        assert!(json["createdAt"].is_string());
        assert!(json["lastModified"].is_string());
        assert!(json.get("settings").is_none());
    }

    #[test]
    fn json_roundtrip_keeps_settings() {
        let mut payload = VaultPayload::new(vec![Record::new("1", "n", "p")]);
        let settings = payload.settings_mut();
        settings.theme = Some("dark".into());
        settings.view_mode = Some(ViewMode::Table);
        settings.item_size = Some(ItemSize::Large);
        settings.clipboard_clear_seconds = Some(30);

        let decoded = VaultPayload::from_json(&payload.to_json().unwrap()).unwrap();
        assert_eq!(decoded, payload);

        let json: serde_json::Value = serde_json::from_slice(&payload.to_json().unwrap()).unwrap();
        assert_eq!(json["settings"]["viewMode"], "table");
        assert_eq!(json["settings"]["clipboardClearSeconds"], 30);
    }

    #[test]
    fn missing_entries_is_malformed() {
        let doc = br#"{"createdAt":"2024-01-01T00:00:00.000Z","lastModified":"2024-01-01T00:00:00.000Z"}"#;
        assert!(matches!(
            VaultPayload::from_json(doc),
            Err(VaultError::MalformedContent(_))
        ));
    }

    #[test]
    fn non_sequence_entries_is_malformed() {
        let doc = br#"{"entries":"nope","createdAt":"2024-01-01T00:00:00.000Z","lastModified":"2024-01-01T00:00:00.000Z"}"#;
        assert!(matches!(
            VaultPayload::from_json(doc),
            Err(VaultError::MalformedContent(_))
        ));
    }

    #[test]
    fn missing_timestamp_is_malformed() {
        let doc = br#"{"entries":[],"createdAt":"2024-01-01T00:00:00.000Z"}"#;
        match VaultPayload::from_json(doc) {
            Err(VaultError::MalformedContent(msg)) => assert!(msg.contains("lastModified")),
            other => panic!("expected MalformedContent, got: {other:?}"),
        }
    }

    #[test]
    fn non_json_is_malformed() {
        assert!(matches!(
            VaultPayload::from_json(b"\x00\x01garbage"),
            Err(VaultError::MalformedContent(_))
        ));
    }

    #[test]
    fn bad_record_error_names_the_field() {
        let doc = br#"{
            "entries": [{"id": "1", "name": "n",
                         "createdAt": "2024-01-01T00:00:00.000Z",
                         "lastModified": "2024-01-01T00:00:00.000Z"}],
            "createdAt": "2024-01-01T00:00:00.000Z",
            "lastModified": "2024-01-01T00:00:00.000Z"
        }"#;
        match VaultPayload::from_json(doc) {
            Err(VaultError::MalformedContent(msg)) => assert!(msg.contains("password"), "{msg}"),
            other => panic!("expected MalformedContent, got: {other:?}"),
        }
    }

    #[test]
    fn nested_legacy_layout_is_lifted() {
        let doc = br#"{
            "entries": {
                "entries": [{
                    "id": "1", "name": "n", "password": "p",
                    "createdAt": "2023-01-01T00:00:00.000Z",
                    "lastModified": "2023-01-01T00:00:00.000Z"
                }],
                "createdAt": "2023-01-01T00:00:00.000Z"
            },
            "lastModified": "2023-06-01T00:00:00.000Z"
        }"#;

        let payload = VaultPayload::from_json(doc).unwrap();
        assert_eq!(payload.len(), 1);
        assert_eq!(payload.created_at(), ts("2023-01-01T00:00:00.000Z"));
        assert_eq!(payload.last_modified(), ts("2023-06-01T00:00:00.000Z"));
    }

    #[test]
    fn encode_rejects_duplicate_ids() {
        let now = Timestamp::now();
        let records = [Record::new("x", "a", "1"), Record::new("x", "b", "2")];
        match encode(&records, now, now, None) {
            Err(VaultError::DuplicateRecordId(id)) => assert_eq!(id, "x"),
            other => panic!("expected DuplicateRecordId, got: {other:?}"),
        }
    }
}
