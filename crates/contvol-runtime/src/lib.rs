//! Container engine clients for contvol.
//!
//! This crate implements the runtime seam: the `RuntimeClient` trait for
//! volume create/inspect/remove, a Docker-compatible CLI client, an in-memory
//! mock client for tests and dry runs, prerequisite checks, and the
//! `OperationContext` that carries cancellation and deadlines into every
//! blocking runtime call.

pub mod backend;
pub mod context;
pub mod docker;
pub mod mock;
pub mod prereq;

pub use backend::{
    select_client, RuntimeClient, RuntimeSettings, Volume, VolumeCreateOptions, MANAGED_LABEL,
};
pub use context::{CancelFlag, OperationContext};
pub use docker::DockerCliClient;
pub use mock::MockRuntime;
pub use prereq::{check_runtime_prereqs, format_missing, MissingPrereq};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum RuntimeError {
    #[error("runtime I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("backend '{0}' is not available on this system")]
    BackendUnavailable(String),
    #[error("volume '{0}' already exists")]
    VolumeExists(String),
    #[error("volume '{0}' not found")]
    VolumeNotFound(String),
    #[error("{program} exited with status {status}: {stderr}")]
    CommandFailed {
        program: String,
        status: String,
        stderr: String,
    },
    #[error("unexpected runtime output: {0}")]
    InvalidOutput(String),
    #[error("operation cancelled")]
    Cancelled,
    #[error("operation deadline exceeded")]
    DeadlineExceeded,
    #[error("runtime execution failed: {0}")]
    ExecFailed(String),
}

impl RuntimeError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, RuntimeError::VolumeNotFound(_))
    }
}
