use crate::layout::StateLayout;
use crate::{fsync_dir, StoreError};
use contvol_schema::{
    AttributePath, Document, DocumentError, ResourceAddress, VolumeId, VolumeResourceModel,
};
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::Write;
use tempfile::NamedTempFile;

const MAX_ADDRESS_LEN: usize = 128;

/// Last committed state of one resource instance.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct StateRecord {
    pub address: ResourceAddress,
    pub resource_type: String,
    pub attributes: Document,
    pub created_at: String,
    pub updated_at: String,
    /// blake3 checksum for integrity verification. `None` for hand-written records.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub checksum: Option<String>,
}

impl StateRecord {
    pub fn new(
        address: impl Into<ResourceAddress>,
        resource_type: impl Into<String>,
        attributes: Document,
    ) -> Self {
        let now = chrono::Utc::now().to_rfc3339();
        Self {
            address: address.into(),
            resource_type: resource_type.into(),
            attributes,
            created_at: now.clone(),
            updated_at: now,
            checksum: None,
        }
    }

    /// Replace the attributes, keeping `created_at` and bumping `updated_at`.
    #[must_use]
    pub fn with_attributes(mut self, attributes: Document) -> Self {
        self.attributes = attributes;
        self.updated_at = chrono::Utc::now().to_rfc3339();
        self
    }

    pub fn model(&self) -> Result<VolumeResourceModel, DocumentError> {
        self.attributes.get()
    }

    pub fn volume_id(&self) -> Option<VolumeId> {
        self.attributes
            .get_attribute(&AttributePath::root("id"))
            .ok()
    }

    /// Checksum over the record content, excluding the checksum field itself.
    fn compute_checksum(&self) -> Result<String, StoreError> {
        let mut copy = self.clone();
        copy.checksum = None;
        let json = serde_json::to_string_pretty(&copy)?;
        Ok(blake3::hash(json.as_bytes()).to_hex().to_string())
    }
}

/// Addresses double as file names, so they are restricted to a safe charset.
pub fn validate_address(address: &str) -> Result<(), StoreError> {
    if address.is_empty() || address.len() > MAX_ADDRESS_LEN {
        return Err(StoreError::InvalidAddress(format!(
            "resource address must be 1-{MAX_ADDRESS_LEN} characters"
        )));
    }
    if address.starts_with('.') {
        return Err(StoreError::InvalidAddress(format!(
            "'{address}' must not start with '.'"
        )));
    }
    if !address
        .bytes()
        .all(|b| b.is_ascii_alphanumeric() || matches!(b, b'_' | b'-' | b'.'))
    {
        return Err(StoreError::InvalidAddress(format!(
            "'{address}' must match [a-zA-Z0-9_.-]"
        )));
    }
    Ok(())
}

pub struct StateStore {
    layout: StateLayout,
}

impl StateStore {
    pub fn new(layout: StateLayout) -> Self {
        Self { layout }
    }

    pub fn layout(&self) -> &StateLayout {
        &self.layout
    }

    pub fn put(&self, record: &StateRecord) -> Result<(), StoreError> {
        validate_address(&record.address)?;
        let dest = self.layout.record_path(&record.address);

        let mut with_checksum = record.clone();
        with_checksum.checksum = Some(with_checksum.compute_checksum()?);
        let content = serde_json::to_string_pretty(&with_checksum)?;

        let dir = self.layout.resources_dir();
        let mut tmp = NamedTempFile::new_in(&dir)?;
        tmp.write_all(content.as_bytes())?;
        tmp.as_file().sync_all()?;
        tmp.persist(&dest).map_err(|e| StoreError::Io(e.error))?;
        fsync_dir(&dir)?;

        tracing::debug!(address = %record.address, "state record written");
        Ok(())
    }

    pub fn get(&self, address: &str) -> Result<StateRecord, StoreError> {
        validate_address(address)?;
        let path = self.layout.record_path(address);
        if !path.exists() {
            return Err(StoreError::RecordNotFound(address.to_owned()));
        }
        let content = fs::read_to_string(&path)?;
        let record: StateRecord = serde_json::from_str(&content)?;

        if let Some(ref expected) = record.checksum {
            let actual = record.compute_checksum()?;
            if actual != *expected {
                return Err(StoreError::IntegrityFailure {
                    address: address.to_owned(),
                    expected: expected.clone(),
                    actual,
                });
            }
        }

        Ok(record)
    }

    /// Like `get()`, but a missing record is `Ok(None)`.
    pub fn find(&self, address: &str) -> Result<Option<StateRecord>, StoreError> {
        match self.get(address) {
            Ok(record) => Ok(Some(record)),
            Err(StoreError::RecordNotFound(_)) => Ok(None),
            Err(e) => Err(e),
        }
    }

    pub fn exists(&self, address: &str) -> bool {
        validate_address(address).is_ok() && self.layout.record_path(address).exists()
    }

    pub fn remove(&self, address: &str) -> Result<(), StoreError> {
        validate_address(address)?;
        let path = self.layout.record_path(address);
        if path.exists() {
            fs::remove_file(path)?;
            fsync_dir(&self.layout.resources_dir())?;
        }
        Ok(())
    }

    pub fn list(&self) -> Result<Vec<StateRecord>, StoreError> {
        let mut results = Vec::new();
        for entry in self.list_with_errors()? {
            match entry {
                Ok(record) => results.push(record),
                Err((name, e)) => {
                    tracing::warn!("skipping corrupted state record '{name}': {e}");
                }
            }
        }
        results.sort_by(|a, b| a.address.cmp(&b.address));
        Ok(results)
    }

    /// Like `list()`, but returns per-entry `Result`s so callers can surface
    /// individual corruption errors.
    #[allow(clippy::type_complexity)]
    pub fn list_with_errors(
        &self,
    ) -> Result<Vec<Result<StateRecord, (String, StoreError)>>, StoreError> {
        let dir = self.layout.resources_dir();
        if !dir.exists() {
            return Ok(Vec::new());
        }
        let mut results = Vec::new();
        for entry in fs::read_dir(dir)? {
            let entry = entry?;
            if entry.file_type()?.is_file() {
                let name = entry.file_name();
                let name_str = name.to_str().unwrap_or("").to_owned();
                if !name_str.is_empty() && !name_str.starts_with('.') {
                    match self.get(&name_str) {
                        Ok(record) => results.push(Ok(record)),
                        Err(e) => results.push(Err((name_str, e))),
                    }
                }
            }
        }
        Ok(results)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ADDR: &str = "imagetest_container_volume.cache";

    fn test_state_store() -> (tempfile::TempDir, StateStore) {
        let dir = tempfile::tempdir().unwrap();
        let layout = StateLayout::new(dir.path());
        layout.initialize().unwrap();
        (dir, StateStore::new(layout))
    }

    fn sample_record() -> StateRecord {
        let model = VolumeResourceModel::new("cache", "abc123").with_id("cache-0123456789ab");
        StateRecord {
            address: ADDR.into(),
            resource_type: "imagetest_container_volume".to_owned(),
            attributes: Document::from_model(&model).unwrap(),
            created_at: "2025-01-01T00:00:00Z".to_owned(),
            updated_at: "2025-01-01T00:00:00Z".to_owned(),
            checksum: None,
        }
    }

    #[test]
    fn record_roundtrip() {
        let (_dir, store) = test_state_store();
        let record = sample_record();
        store.put(&record).unwrap();
        let retrieved = store.get(ADDR).unwrap();
        assert_eq!(retrieved.attributes, record.attributes);
        assert_eq!(retrieved.created_at, record.created_at);
        assert!(retrieved.checksum.is_some(), "put() must embed a checksum");
    }

    #[test]
    fn typed_accessors() {
        let record = sample_record();
        assert_eq!(record.volume_id().unwrap(), "cache-0123456789ab");
        let model = record.model().unwrap();
        assert_eq!(model.name.as_deref(), Some("cache"));
        assert_eq!(model.seed(), Some("abc123"));
    }

    #[test]
    fn volume_id_absent_for_unknown() {
        let mut record = sample_record();
        record.attributes = Document::from_model(&VolumeResourceModel::new("a", "b")).unwrap();
        assert!(record.volume_id().is_none());
    }

    #[test]
    fn with_attributes_keeps_created_at() {
        let record = sample_record();
        let updated = record.clone().with_attributes(Document::new());
        assert_eq!(updated.created_at, record.created_at);
        assert_ne!(updated.updated_at, record.updated_at);
        assert!(updated.attributes.is_empty());
    }

    #[test]
    fn tampered_record_fails_integrity() {
        let (_dir, store) = test_state_store();
        store.put(&sample_record()).unwrap();
        let path = store.layout().record_path(ADDR);
        let content = fs::read_to_string(&path).unwrap();
        fs::write(&path, content.replace("\"cache\"", "\"other\"")).unwrap();
        assert!(matches!(
            store.get(ADDR),
            Err(StoreError::IntegrityFailure { .. })
        ));
    }

    #[test]
    fn record_without_checksum_accepted() {
        let (_dir, store) = test_state_store();
        let json = r#"{
            "address": "imagetest_container_volume.legacy",
            "resource_type": "imagetest_container_volume",
            "attributes": {"id": "legacy-1", "name": null, "inventory": null},
            "created_at": "2025-01-01T00:00:00Z",
            "updated_at": "2025-01-01T00:00:00Z"
        }"#;
        fs::write(
            store.layout().record_path("imagetest_container_volume.legacy"),
            json,
        )
        .unwrap();
        let record = store.get("imagetest_container_volume.legacy").unwrap();
        assert_eq!(record.volume_id().unwrap(), "legacy-1");
    }

    #[test]
    fn find_missing_is_none() {
        let (_dir, store) = test_state_store();
        assert!(store.find(ADDR).unwrap().is_none());
        assert!(matches!(
            store.get(ADDR),
            Err(StoreError::RecordNotFound(_))
        ));
    }

    #[test]
    fn exists_and_remove() {
        let (_dir, store) = test_state_store();
        assert!(!store.exists(ADDR));
        store.put(&sample_record()).unwrap();
        assert!(store.exists(ADDR));
        store.remove(ADDR).unwrap();
        assert!(!store.exists(ADDR));
        store.remove(ADDR).unwrap();
    }

    #[test]
    fn list_sorted_by_address() {
        let (_dir, store) = test_state_store();
        for addr in ["vol.b", "vol.a", "vol.c"] {
            let mut record = sample_record();
            record.address = addr.into();
            store.put(&record).unwrap();
        }
        let addresses: Vec<String> = store
            .list()
            .unwrap()
            .into_iter()
            .map(|r| r.address.into_inner())
            .collect();
        assert_eq!(addresses, ["vol.a", "vol.b", "vol.c"]);
    }

    #[test]
    fn list_skips_corruption() {
        let (_dir, store) = test_state_store();
        store.put(&sample_record()).unwrap();
        fs::write(store.layout().record_path("corrupt"), "NOT VALID JSON").unwrap();

        assert_eq!(store.list().unwrap().len(), 1);
        let results = store.list_with_errors().unwrap();
        assert_eq!(results.len(), 2);
        assert_eq!(results.iter().filter(|r| r.is_err()).count(), 1);
    }

    #[test]
    fn list_ignores_dotfiles() {
        let (_dir, store) = test_state_store();
        fs::write(store.layout().resources_dir().join(".tmpXYZ"), "partial").unwrap();
        assert!(store.list_with_errors().unwrap().is_empty());
    }

    #[test]
    fn validate_address_rules() {
        assert!(validate_address(ADDR).is_ok());
        assert!(validate_address("module.db-1_x").is_ok());
        assert!(validate_address("").is_err());
        assert!(validate_address(".hidden").is_err());
        assert!(validate_address("../escape").is_err());
        assert!(validate_address("has space").is_err());
        assert!(validate_address("a/b").is_err());
        assert!(validate_address(&"x".repeat(129)).is_err());
    }

    #[test]
    fn put_rejects_bad_address() {
        let (_dir, store) = test_state_store();
        let mut record = sample_record();
        record.address = "bad/address".into();
        assert!(matches!(
            store.put(&record),
            Err(StoreError::InvalidAddress(_))
        ));
    }
}
