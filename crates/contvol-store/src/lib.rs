//! Persisted resource state for contvol.
//!
//! This crate owns the on-disk snapshot the orchestrating engine reads and
//! writes between lifecycle operations: `StateLayout` for directory structure
//! and the format version marker, and `StateStore` for one checksummed
//! `StateRecord` per resource address, written atomically.

pub mod layout;
pub mod state;

pub use layout::{StateLayout, STATE_FORMAT_VERSION};
pub use state::{validate_address, StateRecord, StateStore};

use std::path::Path;
use thiserror::Error;

/// Fsync a directory so that a preceding `rename()` is durable.
pub(crate) fn fsync_dir(dir: &Path) -> Result<(), std::io::Error> {
    let f = std::fs::File::open(dir)?;
    f.sync_all()
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("store I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("integrity check failed for record '{address}': expected {expected}, got {actual}")]
    IntegrityFailure {
        address: String,
        expected: String,
        actual: String,
    },
    #[error("no state recorded for '{0}'")]
    RecordNotFound(String),
    #[error("state format version mismatch: expected {expected}, found {found}")]
    VersionMismatch { expected: u32, found: u32 },
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("invalid resource address: {0}")]
    InvalidAddress(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn store_error_display_record_not_found() {
        let e = StoreError::RecordNotFound("contvol_container_volume.cache".to_owned());
        assert!(e.to_string().contains("contvol_container_volume.cache"));
    }

    #[test]
    fn store_error_display_version_mismatch() {
        let e = StoreError::VersionMismatch {
            expected: 1,
            found: 7,
        };
        let msg = e.to_string();
        assert!(msg.contains('1'));
        assert!(msg.contains('7'));
    }

    #[test]
    fn store_error_display_integrity_failure() {
        let e = StoreError::IntegrityFailure {
            address: "a".to_owned(),
            expected: "exp".to_owned(),
            actual: "act".to_owned(),
        };
        let msg = e.to_string();
        assert!(msg.contains("exp"));
        assert!(msg.contains("act"));
    }
}
