use crate::CoreError;
use serde::{Deserialize, Serialize};
use std::fmt;

/// How far lifecycle operations reach into the container runtime.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LifecycleMode {
    /// Read trusts persisted state, Update writes the plan as-is, and Delete
    /// leaves the runtime volume in place.
    #[default]
    Passthrough,
    /// Read inspects the runtime, Update recreates the volume when its id
    /// changes, and Delete removes the runtime volume.
    Reconcile,
}

impl fmt::Display for LifecycleMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LifecycleMode::Passthrough => write!(f, "passthrough"),
            LifecycleMode::Reconcile => write!(f, "reconcile"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ResourceState {
    Absent,
    Present,
}

impl fmt::Display for ResourceState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResourceState::Absent => write!(f, "absent"),
            ResourceState::Present => write!(f, "present"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleOp {
    Create,
    Read,
    Update,
    Delete,
    Import,
}

impl fmt::Display for LifecycleOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LifecycleOp::Create => write!(f, "create"),
            LifecycleOp::Read => write!(f, "read"),
            LifecycleOp::Update => write!(f, "update"),
            LifecycleOp::Delete => write!(f, "delete"),
            LifecycleOp::Import => write!(f, "import"),
        }
    }
}

/// Returns the state a resource is in after `op` succeeds.
pub fn validate_transition(
    state: ResourceState,
    op: LifecycleOp,
) -> Result<ResourceState, CoreError> {
    match (state, op) {
        (ResourceState::Absent, LifecycleOp::Create | LifecycleOp::Import)
        | (ResourceState::Present, LifecycleOp::Read | LifecycleOp::Update) => {
            Ok(ResourceState::Present)
        }
        (ResourceState::Present, LifecycleOp::Delete) => Ok(ResourceState::Absent),
        _ => Err(CoreError::InvalidTransition {
            state: state.to_string(),
            op: op.to_string(),
        }),
    }
}
