//! Controller-level behaviour of the container volume resource.

use contvol_core::{
    ContainerVolumeResource, LifecycleMode, ProviderStore, ReadOutcome, ResourceError,
};
use contvol_runtime::{
    MockRuntime, OperationContext, RuntimeClient, RuntimeError, VolumeCreateOptions,
};
use contvol_schema::{
    compute_volume_id, AttributePath, Blake3Encoder, Document, VolumeResourceModel,
};
use std::sync::Arc;

fn setup(mode: LifecycleMode) -> (Arc<MockRuntime>, ContainerVolumeResource) {
    let rt = Arc::new(MockRuntime::new());
    let store = ProviderStore::new(rt.clone(), Arc::new(Blake3Encoder::new())).with_mode(mode);
    (rt, ContainerVolumeResource::with_store(Arc::new(store)))
}

fn ctx() -> OperationContext {
    OperationContext::background()
}

fn plan_for(name: &str, seed: &str) -> Document {
    Document::from_model(&VolumeResourceModel::new(name, seed)).unwrap()
}

fn expected_id(name: &str, seed: &str) -> String {
    compute_volume_id(name, seed, &Blake3Encoder::new())
        .unwrap()
        .into_inner()
}

fn id_of(state: &Document) -> String {
    state.get_attribute(&AttributePath::root("id")).unwrap()
}

// --- Identity ---

#[test]
fn compute_id_is_deterministic() {
    assert_eq!(expected_id("cache", "abc123"), expected_id("cache", "abc123"));
}

#[test]
fn distinct_seeds_isolate_same_name() {
    assert_ne!(expected_id("cache", "run-1"), expected_id("cache", "run-2"));
}

// --- Create ---

#[test]
fn create_calls_runtime_once_with_computed_id() {
    let (rt, resource) = setup(LifecycleMode::Passthrough);
    let plan = plan_for("cache", "abc123");

    let state = resource.create(&ctx(), &plan, &plan).unwrap();

    let id = expected_id("cache", "abc123");
    assert!(id.starts_with("cache-"));
    assert_eq!(rt.create_calls(), [id.clone()]);
    assert_eq!(id_of(&state), id);
    let model: VolumeResourceModel = state.get().unwrap();
    assert_eq!(model.name.as_deref(), Some("cache"));
    assert_eq!(model.seed(), Some("abc123"));
}

#[test]
fn create_failure_returns_error_and_no_state() {
    let (rt, resource) = setup(LifecycleMode::Passthrough);
    rt.fail_next_create("daemon unreachable");
    let plan = plan_for("cache", "abc123");

    let err = resource.create(&ctx(), &plan, &plan).unwrap_err();
    assert!(matches!(err, ResourceError::Runtime { .. }));
    assert!(err.to_string().contains("daemon unreachable"));
    assert!(rt.volume_names().is_empty());
}

#[test]
fn create_duplicate_is_rejected_by_runtime() {
    let (rt, resource) = setup(LifecycleMode::Passthrough);
    let plan = plan_for("cache", "abc123");
    resource.create(&ctx(), &plan, &plan).unwrap();

    let err = resource.create(&ctx(), &plan, &plan).unwrap_err();
    assert!(matches!(
        err.runtime_error(),
        Some(RuntimeError::VolumeExists(_))
    ));
    assert_eq!(rt.create_calls().len(), 2);
}

#[test]
fn malformed_seed_aborts_before_runtime() {
    let (rt, resource) = setup(LifecycleMode::Passthrough);
    let plan = plan_for("cache", "has whitespace");

    let err = resource.create(&ctx(), &plan, &plan).unwrap_err();
    assert!(matches!(err, ResourceError::Encoding(_)));
    assert!(rt.create_calls().is_empty());
}

#[test]
fn unconfigured_operations_fail_fast() {
    let resource = ContainerVolumeResource::new();
    let plan = plan_for("cache", "abc123");
    assert!(matches!(
        resource.create(&ctx(), &plan, &plan),
        Err(ResourceError::Configuration)
    ));
    assert!(matches!(
        resource.read(&ctx(), &plan),
        Err(ResourceError::Configuration)
    ));
    assert!(matches!(
        resource.update(&ctx(), &plan, &plan),
        Err(ResourceError::Configuration)
    ));
    assert!(matches!(
        resource.delete(&ctx(), &plan),
        Err(ResourceError::Configuration)
    ));
}

#[test]
fn cancellation_reaches_runtime_call() {
    let (rt, resource) = setup(LifecycleMode::Passthrough);
    let ctx = ctx();
    ctx.cancel_flag().cancel();
    let plan = plan_for("cache", "abc123");

    let err = resource.create(&ctx, &plan, &plan).unwrap_err();
    assert!(matches!(err.runtime_error(), Some(RuntimeError::Cancelled)));
    assert!(rt.volume_names().is_empty());
}

// --- Read ---

#[test]
fn read_is_idempotent() {
    let (rt, resource) = setup(LifecycleMode::Passthrough);
    let plan = plan_for("cache", "abc123");
    let state = resource.create(&ctx(), &plan, &plan).unwrap();

    let first = resource.read(&ctx(), &state).unwrap();
    let ReadOutcome::Present(first) = first else {
        panic!("passthrough read must not report gone");
    };
    let second = resource.read(&ctx(), &first).unwrap();
    assert_eq!(second, ReadOutcome::Present(state.clone()));
    assert_eq!(first, state);
    assert!(rt.inspect_calls().is_empty());
}

#[test]
fn passthrough_read_does_not_detect_drift() {
    let (rt, resource) = setup(LifecycleMode::Passthrough);
    let plan = plan_for("cache", "abc123");
    let state = resource.create(&ctx(), &plan, &plan).unwrap();
    rt.drop_volume(&id_of(&state));

    assert_eq!(
        resource.read(&ctx(), &state).unwrap(),
        ReadOutcome::Present(state)
    );
}

// --- Update ---

#[test]
fn update_passes_plan_through_without_recomputing_id() {
    let (rt, resource) = setup(LifecycleMode::Passthrough);
    let plan = plan_for("cache", "abc123");
    let prior = resource.create(&ctx(), &plan, &plan).unwrap();
    let old_id = id_of(&prior);

    let renamed = Document::from_model(
        &VolumeResourceModel::new("renamed", "abc123").with_id(old_id.as_str()),
    )
    .unwrap();
    let state = resource.update(&ctx(), &renamed, &prior).unwrap();

    let model: VolumeResourceModel = state.get().unwrap();
    assert_eq!(model.name.as_deref(), Some("renamed"));
    assert_eq!(id_of(&state), old_id);
    assert_ne!(old_id, expected_id("renamed", "abc123"));
    assert_eq!(rt.create_calls().len(), 1);
    assert!(rt.remove_calls().is_empty());
}

// --- Delete ---

#[test]
fn delete_makes_no_runtime_removal() {
    let (rt, resource) = setup(LifecycleMode::Passthrough);
    let plan = plan_for("cache", "abc123");
    let state = resource.create(&ctx(), &plan, &plan).unwrap();

    resource.delete(&ctx(), &state).unwrap();

    assert!(rt.remove_calls().is_empty());
    assert_eq!(rt.volume_names(), [id_of(&state)]);
}

// --- Import ---

#[test]
fn import_sets_exactly_the_id() {
    let (rt, resource) = setup(LifecycleMode::Passthrough);
    let state = resource.import_state("myvol-abc123").unwrap();

    assert_eq!(id_of(&state), "myvol-abc123");
    let model: VolumeResourceModel = state.get().unwrap();
    assert_eq!(model.name, None);
    assert_eq!(model.inventory, None);
    assert_eq!(state.as_map().len(), 1);

    assert_eq!(
        resource.read(&ctx(), &state).unwrap(),
        ReadOutcome::Present(state)
    );
    assert!(rt.create_calls().is_empty());
}

// --- Reconcile mode ---

#[test]
fn reconcile_read_reports_gone_volume() {
    let (rt, resource) = setup(LifecycleMode::Reconcile);
    let plan = plan_for("cache", "abc123");
    let state = resource.create(&ctx(), &plan, &plan).unwrap();

    assert!(matches!(
        resource.read(&ctx(), &state).unwrap(),
        ReadOutcome::Present(_)
    ));
    rt.drop_volume(&id_of(&state));
    assert_eq!(resource.read(&ctx(), &state).unwrap(), ReadOutcome::Gone);
    assert_eq!(rt.inspect_calls().len(), 2);
}

#[test]
fn reconcile_read_surfaces_other_runtime_errors() {
    let (rt, resource) = setup(LifecycleMode::Reconcile);
    let plan = plan_for("cache", "abc123");
    let state = resource.create(&ctx(), &plan, &plan).unwrap();
    rt.fail_next_inspect("permission denied");

    let err = resource.read(&ctx(), &state).unwrap_err();
    assert!(err.to_string().contains("failed to inspect volume"));
}

#[test]
fn reconcile_update_recreates_on_identity_change() {
    let (rt, resource) = setup(LifecycleMode::Reconcile);
    let plan = plan_for("cache", "abc123");
    let prior = resource.create(&ctx(), &plan, &plan).unwrap();
    let old_id = id_of(&prior);

    let renamed = Document::from_model(
        &VolumeResourceModel::new("renamed", "abc123").with_id(old_id.as_str()),
    )
    .unwrap();
    let state = resource.update(&ctx(), &renamed, &prior).unwrap();

    let new_id = expected_id("renamed", "abc123");
    assert_eq!(id_of(&state), new_id);
    assert_eq!(rt.volume_names(), [new_id]);
    assert_eq!(rt.remove_calls(), [old_id]);
}

#[test]
fn reconcile_update_without_identity_change_is_quiet() {
    let (rt, resource) = setup(LifecycleMode::Reconcile);
    let plan = plan_for("cache", "abc123");
    let prior = resource.create(&ctx(), &plan, &plan).unwrap();

    let state = resource.update(&ctx(), &plan, &prior).unwrap();
    assert_eq!(id_of(&state), id_of(&prior));
    assert_eq!(rt.create_calls().len(), 1);
    assert!(rt.remove_calls().is_empty());
}

#[test]
fn reconcile_update_keeps_old_volume_when_create_fails() {
    let (rt, resource) = setup(LifecycleMode::Reconcile);
    let plan = plan_for("cache", "abc123");
    let prior = resource.create(&ctx(), &plan, &plan).unwrap();
    rt.fail_next_create("no space left on device");

    let reseeded = plan_for("cache", "run-2");
    assert!(resource.update(&ctx(), &reseeded, &prior).is_err());
    assert_eq!(rt.volume_names(), [id_of(&prior)]);
    assert!(rt.remove_calls().is_empty());
}

#[test]
fn reconcile_update_commits_new_id_when_old_removal_fails() {
    let (rt, resource) = setup(LifecycleMode::Reconcile);
    let plan = plan_for("cache", "s1");
    let prior = resource.create(&ctx(), &plan, &plan).unwrap();
    let old_id = id_of(&prior);
    rt.fail_next_remove("volume is in use");

    let renamed = plan_for("renamed", "s1");
    let state = resource.update(&ctx(), &renamed, &prior).unwrap();

    let new_id = expected_id("renamed", "s1");
    assert_eq!(id_of(&state), new_id);
    assert_eq!(rt.volume_names(), [old_id, new_id]);
}

#[test]
fn reconcile_update_adopts_volume_left_by_earlier_attempt() {
    let (rt, resource) = setup(LifecycleMode::Reconcile);
    let plan = plan_for("cache", "s1");
    let prior = resource.create(&ctx(), &plan, &plan).unwrap();
    let new_id = expected_id("renamed", "s1");
    rt.volume_create(&ctx(), &VolumeCreateOptions::new(new_id.as_str()))
        .unwrap();

    let state = resource
        .update(&ctx(), &plan_for("renamed", "s1"), &prior)
        .unwrap();

    assert_eq!(id_of(&state), new_id);
    assert_eq!(rt.volume_names(), [new_id]);
}

#[test]
fn reconcile_delete_removes_volume_and_tolerates_absence() {
    let (rt, resource) = setup(LifecycleMode::Reconcile);
    let plan = plan_for("cache", "abc123");
    let state = resource.create(&ctx(), &plan, &plan).unwrap();

    resource.delete(&ctx(), &state).unwrap();
    assert!(rt.volume_names().is_empty());

    resource.delete(&ctx(), &state).unwrap();
    assert_eq!(rt.remove_calls().len(), 2);
}

#[test]
fn reconcile_delete_surfaces_runtime_failure() {
    let (rt, resource) = setup(LifecycleMode::Reconcile);
    let plan = plan_for("cache", "abc123");
    let state = resource.create(&ctx(), &plan, &plan).unwrap();
    rt.fail_next_remove("volume is in use");

    let err = resource.delete(&ctx(), &state).unwrap_err();
    assert!(err.to_string().contains("volume is in use"));
    assert_eq!(rt.volume_names().len(), 1);
}
