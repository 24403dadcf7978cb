use crate::concurrency::StoreLock;
use crate::config::ProviderConfig;
use crate::lifecycle::{validate_transition, LifecycleOp, ResourceState};
use crate::provider::ProviderStore;
use crate::resource::{ContainerVolumeResource, ReadOutcome};
use crate::CoreError;
use contvol_runtime::OperationContext;
use contvol_schema::{
    compute_volume_id, AttributePath, Document, ResourceSchema, VolumeId, VolumeResourceModel,
};
use contvol_store::{validate_address, StateLayout, StateRecord, StateStore};
use serde::Serialize;
use serde_json::Value;
use std::any::Any;
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PlanAction {
    Create,
    Update,
    NoOp,
}

impl fmt::Display for PlanAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PlanAction::Create => write!(f, "create"),
            PlanAction::Update => write!(f, "update"),
            PlanAction::NoOp => write!(f, "no-op"),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ApplyResult {
    pub action: PlanAction,
    pub record: StateRecord,
}

/// Configuration document for one volume, as a user would declare it.
pub fn desired_config(name: &str, seed: &str) -> Result<Document, CoreError> {
    let mut config = Document::new();
    config.set_attribute(&AttributePath::root("name"), name)?;
    config.set_attribute(&AttributePath::root("inventory").child("seed"), seed)?;
    Ok(config)
}

fn id_path() -> AttributePath {
    AttributePath::root("id")
}

fn logged<T>(op: &'static str, address: &str, result: Result<T, CoreError>) -> Result<T, CoreError> {
    result.inspect_err(|e| error!(op, %address, "{e}"))
}

/// Drives the volume resource the way a declarative framework would: diff
/// desired configuration against persisted state, call the matching lifecycle
/// operation, and commit the returned state.
///
/// Mutating operations hold an exclusive lock on the state root for their
/// whole duration, so operations on one address are never interleaved.
pub struct Engine {
    layout: StateLayout,
    state: StateStore,
    resource: ContainerVolumeResource,
    provider: Arc<ProviderStore>,
    schema: ResourceSchema,
    resource_type: String,
    timeout: Duration,
}

impl Engine {
    pub fn new(store_root: impl Into<PathBuf>, config: &ProviderConfig) -> Result<Self, CoreError> {
        let provider = config.build_provider_store()?;
        Self::with_provider(store_root, config, provider)
    }

    /// Like [`new`](Self::new), with a caller-built provider store.
    pub fn with_provider(
        store_root: impl Into<PathBuf>,
        config: &ProviderConfig,
        provider: ProviderStore,
    ) -> Result<Self, CoreError> {
        config.validate()?;
        let layout = StateLayout::new(store_root);
        let provider = Arc::new(provider);

        let mut resource = ContainerVolumeResource::new();
        let data: Arc<dyn Any + Send + Sync> = provider.clone();
        resource.configure(Some(data))?;

        Ok(Self {
            state: StateStore::new(layout.clone()),
            layout,
            resource,
            provider,
            schema: ContainerVolumeResource::schema(),
            resource_type: config.resource_type(),
            timeout: Duration::from_secs(config.runtime.timeout_secs),
        })
    }

    pub fn layout(&self) -> &StateLayout {
        &self.layout
    }

    pub fn provider(&self) -> &ProviderStore {
        &self.provider
    }

    pub fn schema(&self) -> &ResourceSchema {
        &self.schema
    }

    pub fn resource_type(&self) -> &str {
        &self.resource_type
    }

    fn lock(&self) -> Result<StoreLock, CoreError> {
        self.layout.initialize()?;
        StoreLock::acquire(&self.layout.lock_file())
    }

    fn op_context(&self, ctx: &OperationContext) -> OperationContext {
        ctx.clone().with_timeout(self.timeout)
    }

    fn require(&self, address: &str) -> Result<StateRecord, CoreError> {
        validate_address(address)?;
        self.state
            .find(address)?
            .ok_or_else(|| CoreError::ResourceNotFound(address.to_owned()))
    }

    /// The id Create would compute for `(name, seed)`. Touches nothing.
    pub fn volume_id(&self, name: &str, seed: &str) -> Result<VolumeId, CoreError> {
        Ok(compute_volume_id(name, seed, self.provider.encoder())?)
    }

    pub fn plan(&self, address: &str, config: &Document) -> Result<PlanAction, CoreError> {
        validate_address(address)?;
        self.schema.validate_config(config)?;

        let action = match self.state.find(address)? {
            None => PlanAction::Create,
            Some(record) => {
                let desired: VolumeResourceModel = config.get()?;
                if desired.identity_differs(&record.model()?) {
                    PlanAction::Update
                } else {
                    PlanAction::NoOp
                }
            }
        };
        debug!(%address, %action, "planned");
        Ok(action)
    }

    pub fn apply(
        &self,
        ctx: &OperationContext,
        address: &str,
        config: &Document,
    ) -> Result<ApplyResult, CoreError> {
        info!(%address, "apply");
        let _lock = self.lock()?;
        logged("apply", address, self.apply_locked(ctx, address, config))
    }

    fn apply_locked(
        &self,
        ctx: &OperationContext,
        address: &str,
        config: &Document,
    ) -> Result<ApplyResult, CoreError> {
        let action = self.plan(address, config)?;
        let ctx = self.op_context(ctx);

        let record = match action {
            PlanAction::Create => {
                validate_transition(ResourceState::Absent, LifecycleOp::Create)?;
                let mut plan = config.clone();
                plan.set_attribute(&id_path(), Value::Null)?;
                let state = self.resource.create(&ctx, &plan, config)?;
                let record = StateRecord::new(address, self.resource_type.as_str(), state);
                self.state.put(&record)?;
                record
            }
            PlanAction::Update => {
                let prior = self.require(address)?;
                validate_transition(ResourceState::Present, LifecycleOp::Update)?;
                let prior_id = prior
                    .attributes
                    .attribute(&id_path())
                    .cloned()
                    .unwrap_or(Value::Null);
                let mut plan = config.clone();
                plan.set_attribute(&id_path(), prior_id)?;
                let state = self.resource.update(&ctx, &plan, &prior.attributes)?;
                let record = prior.with_attributes(state);
                self.state.put(&record)?;
                record
            }
            PlanAction::NoOp => self.require(address)?,
        };

        Ok(ApplyResult { action, record })
    }

    /// Read the resource and commit what it reports. Returns `None` when the
    /// volume is gone and the record was dropped.
    pub fn refresh(
        &self,
        ctx: &OperationContext,
        address: &str,
    ) -> Result<Option<StateRecord>, CoreError> {
        info!(%address, "refresh");
        let _lock = self.lock()?;
        logged("refresh", address, self.refresh_locked(ctx, address))
    }

    fn refresh_locked(
        &self,
        ctx: &OperationContext,
        address: &str,
    ) -> Result<Option<StateRecord>, CoreError> {
        let prior = self.require(address)?;
        validate_transition(ResourceState::Present, LifecycleOp::Read)?;

        match self.resource.read(&self.op_context(ctx), &prior.attributes)? {
            ReadOutcome::Present(state) => {
                let record = if state == prior.attributes {
                    prior
                } else {
                    prior.with_attributes(state)
                };
                self.state.put(&record)?;
                Ok(Some(record))
            }
            ReadOutcome::Gone => {
                warn!(%address, "volume gone, dropping state record");
                self.state.remove(address)?;
                Ok(None)
            }
        }
    }

    /// Delete the resource, then drop its record. Returns the dropped record.
    pub fn destroy(&self, ctx: &OperationContext, address: &str) -> Result<StateRecord, CoreError> {
        info!(%address, "destroy");
        let _lock = self.lock()?;
        logged("destroy", address, self.destroy_locked(ctx, address))
    }

    fn destroy_locked(
        &self,
        ctx: &OperationContext,
        address: &str,
    ) -> Result<StateRecord, CoreError> {
        let prior = self.require(address)?;
        validate_transition(ResourceState::Present, LifecycleOp::Delete)?;
        self.resource
            .delete(&self.op_context(ctx), &prior.attributes)?;
        self.state.remove(address)?;
        Ok(prior)
    }

    /// Adopt an existing volume under `address`, then read it once.
    pub fn import(
        &self,
        ctx: &OperationContext,
        address: &str,
        id: &str,
    ) -> Result<StateRecord, CoreError> {
        info!(%address, %id, "import");
        let _lock = self.lock()?;
        logged("import", address, self.import_locked(ctx, address, id))
    }

    fn import_locked(
        &self,
        ctx: &OperationContext,
        address: &str,
        id: &str,
    ) -> Result<StateRecord, CoreError> {
        validate_address(address)?;
        let current = if self.state.exists(address) {
            ResourceState::Present
        } else {
            ResourceState::Absent
        };
        validate_transition(current, LifecycleOp::Import)?;

        let imported = self.resource.import_state(id)?;
        let state = match self.resource.read(&self.op_context(ctx), &imported)? {
            ReadOutcome::Present(state) => state,
            ReadOutcome::Gone => return Err(CoreError::VolumeGone(id.to_owned())),
        };
        let record = StateRecord::new(address, self.resource_type.as_str(), state);
        self.state.put(&record)?;
        Ok(record)
    }

    pub fn show(&self, address: &str) -> Result<StateRecord, CoreError> {
        self.require(address)
    }

    pub fn list(&self) -> Result<Vec<StateRecord>, CoreError> {
        Ok(self.state.list()?)
    }
}
