//! The container volume resource: create/read/update/delete/import against a
//! container runtime, driven by loosely-typed plan, config and state records.

use crate::lifecycle::LifecycleMode;
use crate::provider::ProviderStore;
use contvol_runtime::{OperationContext, RuntimeError, VolumeCreateOptions, MANAGED_LABEL};
use contvol_schema::{
    compute_volume_id, container_volume_schema, AttributePath, Document, DocumentError,
    IdentityError, InventoryRef, ResourceSchema, VolumeId, VolumeResourceModel,
};
use std::any::Any;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, error, info, warn};

/// Suffix appended to the provider type name to form the resource type name.
pub const RESOURCE_SUFFIX: &str = "_container_volume";

#[derive(Debug, Error)]
pub enum ResourceError {
    #[error("provider not configured: no runtime client available")]
    Configuration,
    #[error("invalid provider data: expected ProviderStore")]
    InvalidProviderData,
    #[error("failed to compute volume id: {0}")]
    Encoding(#[from] IdentityError),
    #[error("failed to {action} volume: {source}")]
    Runtime {
        action: &'static str,
        source: RuntimeError,
    },
    #[error("failed to decode resource state: {0}")]
    StateDecode(#[from] DocumentError),
}

impl ResourceError {
    fn runtime(action: &'static str) -> impl FnOnce(RuntimeError) -> Self {
        move |source| ResourceError::Runtime { action, source }
    }

    /// The underlying runtime error, if the runtime rejected the call.
    pub fn runtime_error(&self) -> Option<&RuntimeError> {
        match self {
            ResourceError::Runtime { source, .. } => Some(source),
            _ => None,
        }
    }
}

/// Result of reading a resource's state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReadOutcome {
    Present(Document),
    /// The backing volume no longer exists; the caller should drop the record.
    Gone,
}

/// Lifecycle controller for one resource type.
///
/// Holds no per-instance state. Runtime client and encoder come from the
/// [`ProviderStore`] supplied during [`configure`](Self::configure); until
/// then every operation that needs them fails with
/// [`ResourceError::Configuration`].
#[derive(Debug, Default)]
pub struct ContainerVolumeResource {
    store: Option<Arc<ProviderStore>>,
}

fn id_path() -> AttributePath {
    AttributePath::root("id")
}

impl ContainerVolumeResource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_store(store: Arc<ProviderStore>) -> Self {
        Self { store: Some(store) }
    }

    pub fn metadata(provider_type_name: &str) -> String {
        format!("{provider_type_name}{RESOURCE_SUFFIX}")
    }

    pub fn schema() -> ResourceSchema {
        container_volume_schema()
    }

    /// Accept provider data from the framework. `None` means the provider has
    /// not been configured yet and is not an error.
    pub fn configure(
        &mut self,
        provider_data: Option<Arc<dyn Any + Send + Sync>>,
    ) -> Result<(), ResourceError> {
        let Some(data) = provider_data else {
            return Ok(());
        };
        match data.downcast::<ProviderStore>() {
            Ok(store) => {
                debug!(client = store.client().name(), mode = %store.mode(), "resource configured");
                self.store = Some(store);
                Ok(())
            }
            Err(_) => {
                error!("unexpected provider data type");
                Err(ResourceError::InvalidProviderData)
            }
        }
    }

    pub fn is_configured(&self) -> bool {
        self.store.is_some()
    }

    fn store(&self) -> Result<&ProviderStore, ResourceError> {
        self.store.as_deref().ok_or(ResourceError::Configuration)
    }

    /// Compute the id, create the runtime volume under it, and return the
    /// plan with `id` filled in. The seed comes from `config`, not `plan`.
    pub fn create(
        &self,
        ctx: &OperationContext,
        plan: &Document,
        config: &Document,
    ) -> Result<Document, ResourceError> {
        let store = self.store()?;
        let mut model: VolumeResourceModel = plan.get()?;
        let inventory: InventoryRef = config.get_attribute(&AttributePath::root("inventory"))?;
        let name = required_name(&model)?;
        info!(%name, "creating container volume");

        let id = compute_volume_id(&name, &inventory.seed, store.encoder())?;
        debug!(%id, "computed volume id");

        self.create_volume(ctx, store, &id)?;

        model.id = Some(id);
        Ok(Document::from_model(&model)?)
    }

    fn create_volume(
        &self,
        ctx: &OperationContext,
        store: &ProviderStore,
        id: &VolumeId,
    ) -> Result<(), ResourceError> {
        let options = VolumeCreateOptions::new(id.as_str())
            .label(MANAGED_LABEL, "true")
            .labels(store.labels());
        store
            .client()
            .volume_create(ctx, &options)
            .map_err(ResourceError::runtime("create"))
            .inspect_err(|e| error!(%id, "{e}"))?;
        Ok(())
    }

    /// Read prior state. In passthrough mode the record is returned unchanged
    /// once it decodes; in reconcile mode the runtime is asked first.
    pub fn read(
        &self,
        ctx: &OperationContext,
        state: &Document,
    ) -> Result<ReadOutcome, ResourceError> {
        let store = self.store()?;
        let model: VolumeResourceModel = state.get()?;

        if store.mode() == LifecycleMode::Passthrough {
            return Ok(ReadOutcome::Present(state.clone()));
        }

        let id = model
            .id
            .ok_or_else(|| DocumentError::MissingAttribute("id".to_owned()))?;
        match store.client().volume_inspect(ctx, &id) {
            Ok(volume) => {
                debug!(%id, driver = %volume.driver, "volume present");
                Ok(ReadOutcome::Present(state.clone()))
            }
            Err(e) if e.is_not_found() => {
                warn!(%id, "volume no longer exists in the runtime");
                Ok(ReadOutcome::Gone)
            }
            Err(e) => Err(ResourceError::runtime("inspect")(e)),
        }
    }

    /// Persist the plan. Passthrough mode never recomputes `id` and never
    /// touches the runtime, so a changed `name` leaves the old id in place.
    pub fn update(
        &self,
        ctx: &OperationContext,
        plan: &Document,
        prior: &Document,
    ) -> Result<Document, ResourceError> {
        let store = self.store()?;
        let mut planned: VolumeResourceModel = plan.get()?;

        if store.mode() == LifecycleMode::Passthrough {
            return Ok(Document::from_model(&planned)?);
        }

        let previous: VolumeResourceModel = prior.get()?;
        if !planned.identity_differs(&previous) {
            planned.id.clone_from(&previous.id);
            return Ok(Document::from_model(&planned)?);
        }

        let name = required_name(&planned)?;
        let seed = planned
            .seed()
            .ok_or_else(|| DocumentError::MissingAttribute("inventory.seed".to_owned()))?;
        let new_id = compute_volume_id(&name, seed, store.encoder())?;
        info!(old = ?previous.id, new = %new_id, "volume identity changed, recreating");

        if previous.id.as_ref() != Some(&new_id) {
            // A volume left behind by an earlier attempt is adopted.
            match self.create_volume(ctx, store, &new_id) {
                Err(ResourceError::Runtime {
                    source: RuntimeError::VolumeExists(_),
                    ..
                }) => debug!(%new_id, "adopting existing volume"),
                other => other?,
            }
            // The new volume exists, so its id is committed even if the old
            // one cannot be removed.
            if let Some(old_id) = &previous.id {
                if let Err(e) = remove_tolerating_absent(ctx, store, old_id) {
                    warn!(%old_id, "old volume left in the runtime: {e}");
                }
            }
        }

        planned.id = Some(new_id);
        Ok(Document::from_model(&planned)?)
    }

    /// Passthrough mode only decodes the prior state. Reconcile mode removes
    /// the runtime volume; a volume that is already gone is not an error.
    pub fn delete(&self, ctx: &OperationContext, state: &Document) -> Result<(), ResourceError> {
        let store = self.store()?;
        let model: VolumeResourceModel = state.get()?;

        if store.mode() == LifecycleMode::Passthrough {
            debug!(id = ?model.id, "delete leaves runtime volume in place");
            return Ok(());
        }

        match &model.id {
            Some(id) => remove_tolerating_absent(ctx, store, id),
            None => Ok(()),
        }
    }

    /// Map an externally supplied identifier directly onto `id`. No other
    /// attribute is populated and the identifier is not validated.
    pub fn import_state(&self, id: &str) -> Result<Document, ResourceError> {
        let mut state = Document::new();
        state.set_attribute(&id_path(), id)?;
        Ok(state)
    }
}

fn required_name(model: &VolumeResourceModel) -> Result<String, DocumentError> {
    match model.name.as_deref() {
        None => Err(DocumentError::MissingAttribute("name".to_owned())),
        Some("") => Err(DocumentError::EmptyAttribute("name".to_owned())),
        Some(name) => Ok(name.to_owned()),
    }
}

fn remove_tolerating_absent(
    ctx: &OperationContext,
    store: &ProviderStore,
    id: &VolumeId,
) -> Result<(), ResourceError> {
    match store.client().volume_remove(ctx, id, false) {
        Ok(()) => {
            debug!(%id, "volume removed");
            Ok(())
        }
        Err(e) if e.is_not_found() => {
            debug!(%id, "volume already absent");
            Ok(())
        }
        Err(e) => {
            error!(%id, "{e}");
            Err(ResourceError::runtime("remove")(e))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use contvol_runtime::{MockRuntime, RuntimeClient};
    use contvol_schema::Blake3Encoder;

    fn configured(mode: LifecycleMode) -> (Arc<MockRuntime>, ContainerVolumeResource) {
        let rt = Arc::new(MockRuntime::new());
        let store = ProviderStore::new(rt.clone(), Arc::new(Blake3Encoder::new())).with_mode(mode);
        (rt, ContainerVolumeResource::with_store(Arc::new(store)))
    }

    fn doc(model: &VolumeResourceModel) -> Document {
        Document::from_model(model).unwrap()
    }

    #[test]
    fn metadata_appends_suffix() {
        assert_eq!(
            ContainerVolumeResource::metadata("imagetest"),
            "imagetest_container_volume"
        );
    }

    #[test]
    fn schema_matches_attribute_contract() {
        let schema = ContainerVolumeResource::schema();
        assert!(schema.attributes["name"].required);
        assert!(schema.attributes["inventory"].required);
        assert!(schema.attributes["id"].computed);
    }

    #[test]
    fn configure_none_is_noop() {
        let mut r = ContainerVolumeResource::new();
        r.configure(None).unwrap();
        assert!(!r.is_configured());
    }

    #[test]
    fn configure_accepts_provider_store() {
        let mut r = ContainerVolumeResource::new();
        let store = ProviderStore::new(Arc::new(MockRuntime::new()), Arc::new(Blake3Encoder::new()));
        let data: Arc<dyn Any + Send + Sync> = Arc::new(store);
        r.configure(Some(data)).unwrap();
        assert!(r.is_configured());
    }

    #[test]
    fn configure_rejects_foreign_data() {
        let mut r = ContainerVolumeResource::new();
        let data: Arc<dyn Any + Send + Sync> = Arc::new(42_u32);
        let err = r.configure(Some(data)).unwrap_err();
        assert!(matches!(err, ResourceError::InvalidProviderData));
        assert!(!r.is_configured());
    }

    #[test]
    fn unconfigured_create_fails_fast() {
        let r = ContainerVolumeResource::new();
        let plan = doc(&VolumeResourceModel::new("cache", "abc123"));
        let err = r
            .create(&OperationContext::background(), &plan, &plan)
            .unwrap_err();
        assert!(matches!(err, ResourceError::Configuration));
    }

    #[test]
    fn create_labels_volume_as_managed() {
        let (rt, r) = configured(LifecycleMode::Passthrough);
        let plan = doc(&VolumeResourceModel::new("cache", "abc123"));
        let state = r
            .create(&OperationContext::background(), &plan, &plan)
            .unwrap();
        let id: String = state.get_attribute(&id_path()).unwrap();
        let vol = rt
            .volume_inspect(&OperationContext::background(), &id)
            .unwrap();
        assert_eq!(vol.labels[MANAGED_LABEL], "true");
    }

    #[test]
    fn create_reads_seed_from_config_not_plan() {
        let (rt, r) = configured(LifecycleMode::Passthrough);
        let plan = doc(&VolumeResourceModel::new("cache", "from-plan"));
        let config = doc(&VolumeResourceModel::new("cache", "from-config"));
        let state = r
            .create(&OperationContext::background(), &plan, &config)
            .unwrap();
        let expected = compute_volume_id("cache", "from-config", &Blake3Encoder::new()).unwrap();
        let id: VolumeId = state.get_attribute(&id_path()).unwrap();
        assert_eq!(id, expected);
        assert_eq!(rt.create_calls(), [expected.into_inner()]);
    }

    #[test]
    fn create_without_inventory_in_config_is_decode_error() {
        let (rt, r) = configured(LifecycleMode::Passthrough);
        let plan = doc(&VolumeResourceModel::new("cache", "abc123"));
        let mut config = Document::new();
        config.set_attribute(&AttributePath::root("name"), "cache").unwrap();
        let err = r
            .create(&OperationContext::background(), &plan, &config)
            .unwrap_err();
        assert!(matches!(err, ResourceError::StateDecode(_)));
        assert!(rt.create_calls().is_empty());
    }

    #[test]
    fn create_rejects_empty_name() {
        let (rt, r) = configured(LifecycleMode::Passthrough);
        let plan = doc(&VolumeResourceModel::new("", "abc123"));
        let err = r
            .create(&OperationContext::background(), &plan, &plan)
            .unwrap_err();
        assert!(matches!(
            err,
            ResourceError::StateDecode(DocumentError::EmptyAttribute(_))
        ));
        assert!(rt.create_calls().is_empty());
    }

    #[test]
    fn read_rejects_undecodable_state() {
        let (_rt, r) = configured(LifecycleMode::Passthrough);
        let mut state = Document::new();
        state.set_attribute(&AttributePath::root("name"), 17).unwrap();
        assert!(matches!(
            r.read(&OperationContext::background(), &state),
            Err(ResourceError::StateDecode(_))
        ));
    }

    #[test]
    fn runtime_error_message_is_verbatim() {
        let (rt, r) = configured(LifecycleMode::Passthrough);
        rt.fail_next_create("Cannot connect to the Docker daemon");
        let plan = doc(&VolumeResourceModel::new("cache", "abc123"));
        let err = r
            .create(&OperationContext::background(), &plan, &plan)
            .unwrap_err();
        assert!(err
            .to_string()
            .contains("Cannot connect to the Docker daemon"));
        assert!(err.runtime_error().is_some());
    }

    #[test]
    fn import_sets_only_id() {
        let r = ContainerVolumeResource::new();
        let state = r.import_state("anything goes").unwrap();
        assert_eq!(state.as_map().len(), 1);
        assert_eq!(state.as_map()["id"], "anything goes");
    }
}
