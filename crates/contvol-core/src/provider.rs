use crate::lifecycle::LifecycleMode;
use contvol_runtime::RuntimeClient;
use contvol_schema::IdentityEncoder;
use std::collections::BTreeMap;
use std::sync::Arc;

/// Provider-wide dependencies shared by every container volume resource.
///
/// Built once during provider configuration and handed to resources as
/// opaque provider data. Nothing here is mutated after construction.
pub struct ProviderStore {
    client: Arc<dyn RuntimeClient>,
    encoder: Arc<dyn IdentityEncoder>,
    labels: BTreeMap<String, String>,
    mode: LifecycleMode,
}

impl ProviderStore {
    pub fn new(client: Arc<dyn RuntimeClient>, encoder: Arc<dyn IdentityEncoder>) -> Self {
        Self {
            client,
            encoder,
            labels: BTreeMap::new(),
            mode: LifecycleMode::default(),
        }
    }

    /// Extra labels stamped on every created volume.
    #[must_use]
    pub fn with_labels(mut self, labels: BTreeMap<String, String>) -> Self {
        self.labels = labels;
        self
    }

    #[must_use]
    pub fn with_mode(mut self, mode: LifecycleMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn client(&self) -> &dyn RuntimeClient {
        self.client.as_ref()
    }

    pub fn encoder(&self) -> &dyn IdentityEncoder {
        self.encoder.as_ref()
    }

    pub fn labels(&self) -> &BTreeMap<String, String> {
        &self.labels
    }

    pub fn mode(&self) -> LifecycleMode {
        self.mode
    }
}

impl std::fmt::Debug for ProviderStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderStore")
            .field("client", &self.client.name())
            .field("labels", &self.labels)
            .field("mode", &self.mode)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use contvol_runtime::MockRuntime;
    use contvol_schema::Blake3Encoder;

    #[test]
    fn defaults_to_passthrough_without_labels() {
        let store = ProviderStore::new(Arc::new(MockRuntime::new()), Arc::new(Blake3Encoder::new()));
        assert_eq!(store.mode(), LifecycleMode::Passthrough);
        assert!(store.labels().is_empty());
        assert_eq!(store.client().name(), "mock");
    }

    #[test]
    fn builders_apply() {
        let mut labels = BTreeMap::new();
        labels.insert("team".to_owned(), "qa".to_owned());
        let store = ProviderStore::new(Arc::new(MockRuntime::new()), Arc::new(Blake3Encoder::new()))
            .with_labels(labels)
            .with_mode(LifecycleMode::Reconcile);
        assert_eq!(store.mode(), LifecycleMode::Reconcile);
        assert_eq!(store.labels()["team"], "qa");
        assert!(format!("{store:?}").contains("mock"));
    }
}
