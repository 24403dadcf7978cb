use crate::context::OperationContext;
use crate::RuntimeError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Label stamped on every volume created through contvol.
pub const MANAGED_LABEL: &str = "contvol.managed";

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct VolumeCreateOptions {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub driver: Option<String>,
    #[serde(default)]
    pub labels: BTreeMap<String, String>,
}

impl VolumeCreateOptions {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            driver: None,
            labels: BTreeMap::new(),
        }
    }

    #[must_use]
    pub fn label(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.labels.insert(key.into(), value.into());
        self
    }

    #[must_use]
    pub fn labels(mut self, labels: &BTreeMap<String, String>) -> Self {
        self.labels
            .extend(labels.iter().map(|(k, v)| (k.clone(), v.clone())));
        self
    }
}

/// A volume as reported by the container engine.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Volume {
    pub name: String,
    pub driver: String,
    #[serde(default)]
    pub mountpoint: Option<String>,
    #[serde(default)]
    pub labels: BTreeMap<String, String>,
    #[serde(default)]
    pub created_at: Option<String>,
}

pub trait RuntimeClient: Send + Sync {
    fn name(&self) -> &str;

    fn available(&self) -> bool;

    /// Create a volume named `options.name`. Engines may reject a name that is
    /// already taken; callers must not assume idempotence.
    fn volume_create(
        &self,
        ctx: &OperationContext,
        options: &VolumeCreateOptions,
    ) -> Result<Volume, RuntimeError>;

    fn volume_inspect(&self, ctx: &OperationContext, name: &str) -> Result<Volume, RuntimeError>;

    fn volume_remove(
        &self,
        ctx: &OperationContext,
        name: &str,
        force: bool,
    ) -> Result<(), RuntimeError>;
}

fn default_backend() -> String {
    "docker".to_owned()
}

fn default_binary() -> String {
    "docker".to_owned()
}

fn default_timeout_secs() -> u64 {
    60
}

/// `[runtime]` section of the provider configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct RuntimeSettings {
    #[serde(default = "default_backend")]
    pub backend: String,
    #[serde(default = "default_binary")]
    pub binary: String,
    #[serde(default)]
    pub host: Option<String>,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for RuntimeSettings {
    fn default() -> Self {
        Self {
            backend: default_backend(),
            binary: default_binary(),
            host: None,
            timeout_secs: default_timeout_secs(),
        }
    }
}

pub fn select_client(settings: &RuntimeSettings) -> Result<Box<dyn RuntimeClient>, RuntimeError> {
    match settings.backend.as_str() {
        "docker" => Ok(Box::new(crate::docker::DockerCliClient::from_settings(
            settings,
        ))),
        "mock" => Ok(Box::new(crate::mock::MockRuntime::new())),
        other => Err(RuntimeError::BackendUnavailable(other.to_owned())),
    }
}
