//! In-process task store used by tests and offline demos.
//!
//! Follows the same contract as `SqliteTaskStore`, plus failure injection and
//! a write counter so reconciliation side effects can be asserted.

use crate::model::task::{Task, TaskId};
use crate::store::{StoreError, StoreResult, TaskListQuery, TaskStore};
use async_trait::async_trait;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Mutex, MutexGuard};

#[derive(Default)]
struct MemoryState {
    // Value carries the insertion sequence so scans keep creation order.
    tasks: BTreeMap<TaskId, (u64, Task)>,
    next_seq: u64,
    writes: usize,
    failing_writes: BTreeSet<TaskId>,
    fail_reads: bool,
}

/// `BTreeMap`-backed task store.
#[derive(Default)]
pub struct MemoryTaskStore {
    state: Mutex<MemoryState>,
}

impl MemoryTaskStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a store pre-populated with `tasks`, without counting writes.
    pub fn with_tasks(tasks: impl IntoIterator<Item = Task>) -> Self {
        let store = Self::new();
        if let Ok(mut state) = store.state.lock() {
            for task in tasks {
                insert(&mut state, task);
            }
        }
        store
    }

    /// Number of `put`/`delete` calls that reached the store.
    pub fn write_count(&self) -> usize {
        self.lock().map(|state| state.writes).unwrap_or_default()
    }

    /// Makes every write for `id` fail with `StoreError::Unavailable`.
    pub fn fail_writes_for(&self, id: &TaskId) {
        if let Ok(mut state) = self.lock() {
            state.failing_writes.insert(id.clone());
        }
    }

    /// Makes `get_all`/`get_by_id` fail until cleared.
    pub fn set_fail_reads(&self, fail: bool) {
        if let Ok(mut state) = self.lock() {
            state.fail_reads = fail;
        }
    }

    /// Returns every stored task, tombstones included, in creation order.
    pub fn snapshot(&self) -> Vec<Task> {
        self.lock()
            .map(|state| ordered(&state, TaskListQuery::all()))
            .unwrap_or_default()
    }

    fn lock(&self) -> StoreResult<MutexGuard<'_, MemoryState>> {
        self.state
            .lock()
            .map_err(|_| StoreError::Unavailable("memory store lock poisoned".to_string()))
    }

    fn lock_for_write(&self, id: &TaskId) -> StoreResult<MutexGuard<'_, MemoryState>> {
        let mut state = self.lock()?;
        state.writes += 1;
        if state.failing_writes.contains(id) {
            return Err(StoreError::Unavailable(format!("injected write failure for {id}")));
        }
        Ok(state)
    }

    fn lock_for_read(&self) -> StoreResult<MutexGuard<'_, MemoryState>> {
        let state = self.lock()?;
        if state.fail_reads {
            return Err(StoreError::Unavailable("injected read failure".to_string()));
        }
        Ok(state)
    }
}

#[async_trait]
impl TaskStore for MemoryTaskStore {
    async fn get_all(&self, query: TaskListQuery) -> StoreResult<Vec<Task>> {
        let state = self.lock_for_read()?;
        Ok(ordered(&state, query))
    }

    async fn get_by_id(&self, id: &TaskId) -> StoreResult<Option<Task>> {
        let state = self.lock_for_read()?;
        Ok(state.tasks.get(id).map(|(_, task)| task.clone()))
    }

    async fn put(&self, task: &Task) -> StoreResult<()> {
        task.validate()?;
        let mut state = self.lock_for_write(&task.id)?;
        insert(&mut state, task.clone());
        Ok(())
    }

    async fn delete(&self, id: &TaskId) -> StoreResult<()> {
        let mut state = self.lock_for_write(id)?;
        state.tasks.remove(id);
        Ok(())
    }
}

fn insert(state: &mut MemoryState, task: Task) {
    let seq = match state.tasks.get(&task.id) {
        Some((seq, _)) => *seq,
        None => {
            state.next_seq += 1;
            state.next_seq
        }
    };
    state.tasks.insert(task.id.clone(), (seq, task));
}

fn ordered(state: &MemoryState, query: TaskListQuery) -> Vec<Task> {
    let mut entries: Vec<&(u64, Task)> = state
        .tasks
        .values()
        .filter(|(_, task)| query.matches(task))
        .collect();
    entries.sort_by_key(|(seq, _)| *seq);
    entries.into_iter().map(|(_, task)| task.clone()).collect()
}
