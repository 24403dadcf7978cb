use crate::lifecycle::LifecycleMode;
use crate::provider::ProviderStore;
use contvol_runtime::{select_client, RuntimeError, RuntimeSettings, MANAGED_LABEL};
use contvol_schema::{Blake3Encoder, DEFAULT_TOKEN_LEN};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("config I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse {path}: {message}")]
    Parse { path: String, message: String },
    #[error("invalid value for '{key}': {message}")]
    Invalid { key: &'static str, message: String },
    #[error("HOME not set")]
    HomeNotSet,
}

fn default_type_name() -> String {
    "imagetest".to_owned()
}

fn default_token_len() -> usize {
    DEFAULT_TOKEN_LEN
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct IdentitySettings {
    #[serde(default = "default_token_len")]
    pub token_len: usize,
}

impl Default for IdentitySettings {
    fn default() -> Self {
        Self {
            token_len: default_token_len(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LifecycleSettings {
    #[serde(default)]
    pub mode: LifecycleMode,
}

/// Provider configuration, read from `config.toml`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ProviderConfig {
    #[serde(default = "default_type_name")]
    pub type_name: String,
    #[serde(default)]
    pub runtime: RuntimeSettings,
    #[serde(default)]
    pub identity: IdentitySettings,
    #[serde(default)]
    pub lifecycle: LifecycleSettings,
    #[serde(default)]
    pub labels: BTreeMap<String, String>,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            type_name: default_type_name(),
            runtime: RuntimeSettings::default(),
            identity: IdentitySettings::default(),
            lifecycle: LifecycleSettings::default(),
            labels: BTreeMap::new(),
        }
    }
}

impl ProviderConfig {
    pub fn from_toml_str(content: &str, origin: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content).map_err(|e| ConfigError::Parse {
            path: origin.to_owned(),
            message: e.to_string(),
        })?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content, &path.display().to_string())
    }

    /// Load `path` if it exists, otherwise fall back to defaults.
    pub fn load_or_default(path: &Path) -> Result<Self, ConfigError> {
        if path.exists() {
            Self::load(path)
        } else {
            tracing::debug!("no config at {}, using defaults", path.display());
            Ok(Self::default())
        }
    }

    /// Load `~/.config/contvol/config.toml`, or defaults when it is absent.
    pub fn load_default() -> Result<Self, ConfigError> {
        Self::load_or_default(&default_config_path()?)
    }

    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self).map_err(|e| ConfigError::Parse {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;
        std::fs::write(path, content)?;
        Ok(())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.type_name.is_empty()
            || !self
                .type_name
                .bytes()
                .all(|b| b.is_ascii_lowercase() || b.is_ascii_digit() || b == b'_')
        {
            return Err(ConfigError::Invalid {
                key: "type_name",
                message: format!("'{}' must match [a-z0-9_]+", self.type_name),
            });
        }
        if !matches!(self.runtime.backend.as_str(), "docker" | "mock") {
            return Err(ConfigError::Invalid {
                key: "runtime.backend",
                message: format!("unknown backend '{}' (docker, mock)", self.runtime.backend),
            });
        }
        if self.runtime.binary.trim().is_empty() {
            return Err(ConfigError::Invalid {
                key: "runtime.binary",
                message: "must not be empty".to_owned(),
            });
        }
        if self.runtime.timeout_secs == 0 {
            return Err(ConfigError::Invalid {
                key: "runtime.timeout_secs",
                message: "must be greater than zero".to_owned(),
            });
        }
        Blake3Encoder::with_token_len(self.identity.token_len).map_err(|e| {
            ConfigError::Invalid {
                key: "identity.token_len",
                message: e.to_string(),
            }
        })?;
        for key in self.labels.keys() {
            if key.is_empty() || key == MANAGED_LABEL {
                return Err(ConfigError::Invalid {
                    key: "labels",
                    message: format!("label key '{key}' is empty or reserved"),
                });
            }
        }
        Ok(())
    }

    pub fn resource_type(&self) -> String {
        crate::resource::ContainerVolumeResource::metadata(&self.type_name)
    }

    /// Build the shared provider dependencies this configuration describes.
    pub fn build_provider_store(&self) -> Result<ProviderStore, crate::CoreError> {
        self.validate()?;
        let client = select_client(&self.runtime)?;
        let encoder = Blake3Encoder::with_token_len(self.identity.token_len).map_err(|e| {
            ConfigError::Invalid {
                key: "identity.token_len",
                message: e.to_string(),
            }
        })?;
        Ok(ProviderStore::new(Arc::from(client), Arc::new(encoder))
            .with_labels(self.labels.clone())
            .with_mode(self.lifecycle.mode))
    }

    /// Check the runtime client can be constructed without building a store.
    pub fn runtime_reachable(&self) -> Result<bool, RuntimeError> {
        Ok(select_client(&self.runtime)?.available())
    }
}

pub fn default_config_path() -> Result<PathBuf, ConfigError> {
    let home = std::env::var("HOME").map_err(|_| ConfigError::HomeNotSet)?;
    Ok(PathBuf::from(home).join(".config/contvol/config.toml"))
}
