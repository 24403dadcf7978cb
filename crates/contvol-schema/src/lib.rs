//! State model, attribute schema, and volume identity for contvol.
//!
//! This crate defines the schema layer: the typed resource model
//! (`VolumeResourceModel`), loosely-typed key/value records exchanged with the
//! orchestrating framework (`Document`), the attribute contract advertised for
//! the container volume resource (`ResourceSchema`), and deterministic
//! inventory-scoped identity derivation (`compute_volume_id`).

pub mod attributes;
pub mod document;
pub mod identity;
pub mod model;
pub mod types;

pub use attributes::{
    container_volume_schema, Attribute, AttributeKind, ResourceSchema, SchemaError,
    SchemaViolation,
};
pub use document::{AttributePath, Document, DocumentError};
pub use identity::{
    compute_volume_id, Blake3Encoder, IdentityEncoder, IdentityError, DEFAULT_TOKEN_LEN,
};
pub use model::{InventoryRef, VolumeResourceModel};
pub use types::{EncodedSeed, ResourceAddress, VolumeId};
