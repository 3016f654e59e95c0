//! Execution registry - process-wide table of in-flight executions

use chrono::{DateTime, Utc};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use fnexec_core::{Error, ExecutionStatus, FunctionId, Result, RuntimeId};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::watch;

/// What the registry knows about one running execution.
pub struct ExecutionHandle {
    pub runtime_id: RuntimeId,
    pub function_id: FunctionId,
    /// Slot path resolved at invocation time. Never re-resolved.
    pub function_location: PathBuf,
    pub working_directory: PathBuf,
    pub started_at: DateTime<Utc>,
    status: watch::Sender<ExecutionStatus>,
}

impl ExecutionHandle {
    pub fn new(
        runtime_id: RuntimeId,
        function_id: FunctionId,
        function_location: PathBuf,
        working_directory: PathBuf,
    ) -> Self {
        let (status, _) = watch::channel(ExecutionStatus::Running);
        Self {
            runtime_id,
            function_id,
            function_location,
            working_directory,
            started_at: Utc::now(),
            status,
        }
    }

    pub fn status(&self) -> ExecutionStatus {
        *self.status.borrow()
    }

    pub fn set_status(&self, status: ExecutionStatus) {
        self.status.send_replace(status);
    }

    /// Watch status transitions of this execution.
    pub fn subscribe(&self) -> watch::Receiver<ExecutionStatus> {
        self.status.subscribe()
    }
}

impl std::fmt::Debug for ExecutionHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExecutionHandle")
            .field("runtime_id", &self.runtime_id)
            .field("function_id", &self.function_id)
            .field("function_location", &self.function_location)
            .field("working_directory", &self.working_directory)
            .field("started_at", &self.started_at)
            .field("status", &self.status())
            .finish()
    }
}

/// Internally synchronized: every insert, lookup and removal goes through the
/// map's shard locks, so concurrent workers never lose an insert or remove an
/// entry twice.
pub struct ExecutionRegistry {
    executions: DashMap<RuntimeId, Arc<ExecutionHandle>>,
}

impl Default for ExecutionRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl ExecutionRegistry {
    pub fn new() -> Self {
        Self {
            executions: DashMap::new(),
        }
    }

    /// Insert a new execution. Fails if the runtime id is already present.
    pub fn register(&self, handle: Arc<ExecutionHandle>) -> Result<()> {
        match self.executions.entry(handle.runtime_id) {
            Entry::Occupied(_) => Err(Error::DuplicateExecution(handle.runtime_id.to_string())),
            Entry::Vacant(slot) => {
                slot.insert(handle);
                Ok(())
            }
        }
    }

    /// Register and tie removal to the returned guard's lifetime.
    pub fn register_guarded(self: &Arc<Self>, handle: Arc<ExecutionHandle>) -> Result<Registration> {
        let runtime_id = handle.runtime_id;
        self.register(handle)?;
        Ok(Registration {
            registry: Arc::clone(self),
            runtime_id,
        })
    }

    pub fn lookup(&self, runtime_id: &RuntimeId) -> Result<Arc<ExecutionHandle>> {
        self.executions
            .get(runtime_id)
            .map(|e| e.value().clone())
            .ok_or_else(|| Error::ExecutionNotFound(runtime_id.to_string()))
    }

    /// Runtime ids currently registered, sorted.
    pub fn list_ids(&self) -> Vec<RuntimeId> {
        let mut ids: Vec<RuntimeId> = self.executions.iter().map(|e| *e.key()).collect();
        ids.sort();
        ids
    }

    pub fn unregister(&self, runtime_id: &RuntimeId) -> Option<Arc<ExecutionHandle>> {
        self.executions.remove(runtime_id).map(|(_, h)| h)
    }

    pub fn contains(&self, runtime_id: &RuntimeId) -> bool {
        self.executions.contains_key(runtime_id)
    }

    pub fn len(&self) -> usize {
        self.executions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.executions.is_empty()
    }
}

/// Removes its execution from the registry when dropped, including on panic
/// unwinding of the owning task.
pub struct Registration {
    registry: Arc<ExecutionRegistry>,
    runtime_id: RuntimeId,
}

impl Registration {
    pub fn runtime_id(&self) -> RuntimeId {
        self.runtime_id
    }

    /// Unregister now.
    pub fn release(self) {}
}

impl Drop for Registration {
    fn drop(&mut self) {
        self.registry.unregister(&self.runtime_id);
    }
}
