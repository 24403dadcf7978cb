//! Lifecycle orchestration for contvol container volumes.
//!
//! This crate ties together the schema, runtime clients and state store: the
//! `ContainerVolumeResource` controller implements create/read/update/delete
//! and import for one volume, `ProviderStore` carries the shared runtime client
//! and identity encoder, `ProviderConfig` loads them from TOML, and `Engine`
//! plays the orchestrating framework, diffing desired configuration against
//! persisted state under an exclusive store lock.

pub mod concurrency;
pub mod config;
pub mod engine;
pub mod lifecycle;
pub mod provider;
pub mod resource;

pub use concurrency::{install_signal_handler, StoreLock};
pub use config::{default_config_path, ConfigError, ProviderConfig};
pub use engine::{desired_config, ApplyResult, Engine, PlanAction};
pub use lifecycle::{validate_transition, LifecycleMode, LifecycleOp, ResourceState};
pub use provider::ProviderStore;
pub use resource::{ContainerVolumeResource, ReadOutcome, ResourceError};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CoreError {
    #[error("{0}")]
    Resource(#[from] ResourceError),
    #[error("{0}")]
    Schema(#[from] contvol_schema::SchemaError),
    #[error("failed to decode resource state: {0}")]
    Document(#[from] contvol_schema::DocumentError),
    #[error("failed to compute volume id: {0}")]
    Identity(#[from] contvol_schema::IdentityError),
    #[error("store error: {0}")]
    Store(#[from] contvol_store::StoreError),
    #[error("store lock: {0}")]
    Lock(String),
    #[error("runtime error: {0}")]
    Runtime(#[from] contvol_runtime::RuntimeError),
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),
    #[error("invalid lifecycle operation: {op} on {state} resource")]
    InvalidTransition { state: String, op: String },
    #[error("no resource recorded at '{0}'")]
    ResourceNotFound(String),
    #[error("volume '{0}' does not exist in the container runtime")]
    VolumeGone(String),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
