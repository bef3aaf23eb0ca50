//! In-process remote service.
//!
//! Models an authoritative server that deletes physically but remembers
//! deleted ids, so re-creating one fails with `Gone`. Supports failure
//! injection and records every call for side-effect assertions.

use crate::model::task::{Task, TaskId};
use crate::remote::{RemoteError, RemoteResult, RemoteService};
use async_trait::async_trait;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Mutex, MutexGuard};

/// One call observed by `MemoryRemoteService`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RemoteCall {
    List,
    Create(TaskId),
    Delete(TaskId),
}

impl RemoteCall {
    /// Whether the call asks the remote to change state.
    pub fn is_mutation(&self) -> bool {
        !matches!(self, Self::List)
    }
}

#[derive(Default)]
struct RemoteState {
    tasks: BTreeMap<TaskId, Task>,
    deleted_ids: BTreeSet<TaskId>,
    unreachable: bool,
    failing_creates: BTreeSet<TaskId>,
    failing_deletes: BTreeSet<TaskId>,
    calls: Vec<RemoteCall>,
}

#[derive(Default)]
pub struct MemoryRemoteService {
    state: Mutex<RemoteState>,
}

impl MemoryRemoteService {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_tasks(tasks: impl IntoIterator<Item = Task>) -> Self {
        let remote = Self::new();
        if let Ok(mut state) = remote.state.lock() {
            for task in tasks {
                state.tasks.insert(task.id.clone(), task);
            }
        }
        remote
    }

    /// Simulates another client deleting `id` upstream.
    pub fn delete_upstream(&self, id: &TaskId) {
        if let Ok(mut state) = self.lock() {
            state.tasks.remove(id);
            state.deleted_ids.insert(id.clone());
        }
    }

    /// Makes every call fail with `RemoteError::Unreachable`.
    pub fn set_unreachable(&self, unreachable: bool) {
        if let Ok(mut state) = self.lock() {
            state.unreachable = unreachable;
        }
    }

    pub fn fail_creates_for(&self, id: &TaskId) {
        if let Ok(mut state) = self.lock() {
            state.failing_creates.insert(id.clone());
        }
    }

    pub fn fail_deletes_for(&self, id: &TaskId) {
        if let Ok(mut state) = self.lock() {
            state.failing_deletes.insert(id.clone());
        }
    }

    /// Clears all injected failures.
    pub fn heal(&self) {
        if let Ok(mut state) = self.lock() {
            state.unreachable = false;
            state.failing_creates.clear();
            state.failing_deletes.clear();
        }
    }

    /// Tasks currently held by the remote, ordered by id.
    pub fn tasks(&self) -> Vec<Task> {
        self.lock()
            .map(|state| state.tasks.values().cloned().collect())
            .unwrap_or_default()
    }

    pub fn contains(&self, id: &TaskId) -> bool {
        self.lock()
            .map(|state| state.tasks.contains_key(id))
            .unwrap_or(false)
    }

    pub fn calls(&self) -> Vec<RemoteCall> {
        self.lock()
            .map(|state| state.calls.clone())
            .unwrap_or_default()
    }

    pub fn mutation_count(&self) -> usize {
        self.calls().iter().filter(|call| call.is_mutation()).count()
    }

    pub fn clear_calls(&self) {
        if let Ok(mut state) = self.lock() {
            state.calls.clear();
        }
    }

    fn lock(&self) -> RemoteResult<MutexGuard<'_, RemoteState>> {
        self.state
            .lock()
            .map_err(|_| RemoteError::Unreachable("memory remote lock poisoned".to_string()))
    }

    fn record(&self, call: RemoteCall) -> RemoteResult<MutexGuard<'_, RemoteState>> {
        let mut state = self.lock()?;
        state.calls.push(call);
        if state.unreachable {
            return Err(RemoteError::Unreachable("connection refused".to_string()));
        }
        Ok(state)
    }
}

#[async_trait]
impl RemoteService for MemoryRemoteService {
    async fn list(&self) -> RemoteResult<Vec<Task>> {
        let state = self.record(RemoteCall::List)?;
        Ok(state.tasks.values().cloned().collect())
    }

    async fn create(&self, task: &Task) -> RemoteResult<()> {
        let mut state = self.record(RemoteCall::Create(task.id.clone()))?;
        if state.failing_creates.contains(&task.id) {
            return Err(RemoteError::Status {
                status: 503,
                body: "injected create failure".to_string(),
            });
        }
        if state.deleted_ids.contains(&task.id) {
            return Err(RemoteError::Gone(task.id.clone()));
        }

        let mut stored = task.clone();
        stored.deleted = false;
        state.tasks.entry(task.id.clone()).or_insert(stored);
        Ok(())
    }

    async fn delete(&self, id: &TaskId) -> RemoteResult<()> {
        let mut state = self.record(RemoteCall::Delete(id.clone()))?;
        if state.failing_deletes.contains(id) {
            return Err(RemoteError::Status {
                status: 503,
                body: "injected delete failure".to_string(),
            });
        }
        if state.tasks.remove(id).is_some() {
            state.deleted_ids.insert(id.clone());
            return Ok(());
        }
        if state.deleted_ids.contains(id) {
            return Err(RemoteError::Gone(id.clone()));
        }
        Ok(())
    }
}
