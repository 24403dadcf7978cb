use crate::types::VolumeId;
use serde::{Deserialize, Serialize};

/// Namespace descriptor produced by an inventory source and consumed read-only.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct InventoryRef {
    pub seed: String,
}

impl InventoryRef {
    pub fn new(seed: impl Into<String>) -> Self {
        Self { seed: seed.into() }
    }
}

/// Typed view of a container volume record.
///
/// Every field may be null in framework terms: `id` is unknown until Create
/// computes it, and an imported record carries only `id` until a later plan
/// supplies `name` and `inventory`.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct VolumeResourceModel {
    #[serde(default)]
    pub id: Option<VolumeId>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub inventory: Option<InventoryRef>,
}

impl VolumeResourceModel {
    pub fn new(name: impl Into<String>, seed: impl Into<String>) -> Self {
        Self {
            id: None,
            name: Some(name.into()),
            inventory: Some(InventoryRef::new(seed)),
        }
    }

    #[must_use]
    pub fn with_id(mut self, id: impl Into<VolumeId>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn seed(&self) -> Option<&str> {
        self.inventory.as_ref().map(|inv| inv.seed.as_str())
    }

    /// True when a change between `self` and `other` would alter the computed id.
    pub fn identity_differs(&self, other: &Self) -> bool {
        self.name != other.name || self.seed() != other.seed()
    }
}
