use crate::backend::{RuntimeClient, Volume, VolumeCreateOptions};
use crate::context::OperationContext;
use crate::RuntimeError;
use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum MockOp {
    Create,
    Inspect,
    Remove,
}

#[derive(Default)]
struct MockState {
    volumes: BTreeMap<String, Volume>,
    creates: Vec<String>,
    inspects: Vec<String>,
    removes: Vec<String>,
    fail_next: Option<(MockOp, String)>,
}

impl MockState {
    fn take_failure(&mut self, op: MockOp) -> Option<RuntimeError> {
        match &self.fail_next {
            Some((pending, _)) if *pending == op => self
                .fail_next
                .take()
                .map(|(_, msg)| RuntimeError::ExecFailed(msg)),
            _ => None,
        }
    }
}

/// In-memory engine. Rejects duplicate names like a real daemon and records
/// every call so tests can assert exactly which runtime operations happened.
#[derive(Default)]
pub struct MockRuntime {
    state: Mutex<MockState>,
}

impl MockRuntime {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pre-populate a volume, as if it had been created out of band.
    #[must_use]
    pub fn with_volume(self, name: &str) -> Self {
        if let Ok(mut state) = self.state.lock() {
            state.volumes.insert(name.to_owned(), mock_volume(name, BTreeMap::new()));
        }
        self
    }

    fn lock(&self) -> Result<MutexGuard<'_, MockState>, RuntimeError> {
        self.state
            .lock()
            .map_err(|e| RuntimeError::ExecFailed(format!("mutex poisoned: {e}")))
    }

    pub fn fail_next_create(&self, message: &str) {
        self.set_failure(MockOp::Create, message);
    }

    pub fn fail_next_inspect(&self, message: &str) {
        self.set_failure(MockOp::Inspect, message);
    }

    pub fn fail_next_remove(&self, message: &str) {
        self.set_failure(MockOp::Remove, message);
    }

    fn set_failure(&self, op: MockOp, message: &str) {
        if let Ok(mut state) = self.state.lock() {
            state.fail_next = Some((op, message.to_owned()));
        }
    }

    /// Remove a volume behind the client's back, simulating out-of-band drift.
    pub fn drop_volume(&self, name: &str) {
        if let Ok(mut state) = self.state.lock() {
            state.volumes.remove(name);
        }
    }

    pub fn volume_names(&self) -> Vec<String> {
        self.state
            .lock()
            .map(|s| s.volumes.keys().cloned().collect())
            .unwrap_or_default()
    }

    pub fn create_calls(&self) -> Vec<String> {
        self.state
            .lock()
            .map(|s| s.creates.clone())
            .unwrap_or_default()
    }

    pub fn inspect_calls(&self) -> Vec<String> {
        self.state
            .lock()
            .map(|s| s.inspects.clone())
            .unwrap_or_default()
    }

    pub fn remove_calls(&self) -> Vec<String> {
        self.state
            .lock()
            .map(|s| s.removes.clone())
            .unwrap_or_default()
    }
}

fn mock_volume(name: &str, labels: BTreeMap<String, String>) -> Volume {
    Volume {
        name: name.to_owned(),
        driver: "local".to_owned(),
        mountpoint: Some(format!("/mock/volumes/{name}/_data")),
        labels,
        created_at: None,
    }
}

impl RuntimeClient for MockRuntime {
    fn name(&self) -> &'static str {
        "mock"
    }

    fn available(&self) -> bool {
        true
    }

    fn volume_create(
        &self,
        ctx: &OperationContext,
        options: &VolumeCreateOptions,
    ) -> Result<Volume, RuntimeError> {
        ctx.check()?;
        let mut state = self.lock()?;
        state.creates.push(options.name.clone());
        if let Some(err) = state.take_failure(MockOp::Create) {
            return Err(err);
        }
        if state.volumes.contains_key(&options.name) {
            return Err(RuntimeError::VolumeExists(options.name.clone()));
        }
        let mut volume = mock_volume(&options.name, options.labels.clone());
        if let Some(driver) = &options.driver {
            volume.driver.clone_from(driver);
        }
        state.volumes.insert(options.name.clone(), volume.clone());
        Ok(volume)
    }

    fn volume_inspect(&self, ctx: &OperationContext, name: &str) -> Result<Volume, RuntimeError> {
        ctx.check()?;
        let mut state = self.lock()?;
        state.inspects.push(name.to_owned());
        if let Some(err) = state.take_failure(MockOp::Inspect) {
            return Err(err);
        }
        state
            .volumes
            .get(name)
            .cloned()
            .ok_or_else(|| RuntimeError::VolumeNotFound(name.to_owned()))
    }

    fn volume_remove(
        &self,
        ctx: &OperationContext,
        name: &str,
        _force: bool,
    ) -> Result<(), RuntimeError> {
        ctx.check()?;
        let mut state = self.lock()?;
        state.removes.push(name.to_owned());
        if let Some(err) = state.take_failure(MockOp::Remove) {
            return Err(err);
        }
        match state.volumes.remove(name) {
            Some(_) => Ok(()),
            None => Err(RuntimeError::VolumeNotFound(name.to_owned())),
        }
    }
}
