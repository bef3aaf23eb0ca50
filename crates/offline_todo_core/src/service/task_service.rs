//! Task use-case service.

use crate::model::task::{Task, TaskId};
use crate::store::{StoreError, TaskListQuery, TaskStore};
use crate::sync::id_locks::IdLocks;
use log::info;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::sync::Arc;

pub type ServiceResult<T> = Result<T, ServiceError>;

#[derive(Debug)]
pub enum ServiceError {
    NotFound(TaskId),
    Store(StoreError),
}

impl Display for ServiceError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NotFound(id) => write!(f, "task not found: {id}"),
            Self::Store(err) => write!(f, "{err}"),
        }
    }
}

impl Error for ServiceError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::NotFound(_) => None,
            Self::Store(err) => Some(err),
        }
    }
}

impl From<StoreError> for ServiceError {
    fn from(value: StoreError) -> Self {
        Self::Store(value)
    }
}

/// Local task actions available to the user surface.
pub struct TaskService<S: ?Sized> {
    store: Arc<S>,
    locks: IdLocks,
}

impl<S: TaskStore + ?Sized> TaskService<S> {
    /// `locks` must be the registry the reconciler uses.
    pub fn new(store: Arc<S>, locks: IdLocks) -> Self {
        Self { store, locks }
    }

    /// Stores a new live task with a fresh id and returns it.
    pub async fn add_task(&self, text: impl Into<String>) -> ServiceResult<Task> {
        let task = Task::new(text);
        let _guard = self.locks.lock(&task.id).await;
        self.store.put(&task).await?;
        info!(
            "event=task_add module=service status=ok task_id={}",
            task.id
        );
        Ok(task)
    }

    /// Tombstones an existing task.
    ///
    /// Removing an already tombstoned task is a no-op. The record stays in the
    /// store until a synchronization pass confirms the remote delete.
    pub async fn remove_task(&self, id: &TaskId) -> ServiceResult<()> {
        let _guard = self.locks.lock(id).await;
        let mut task = self
            .store
            .get_by_id(id)
            .await?
            .ok_or_else(|| ServiceError::NotFound(id.clone()))?;
        if task.deleted {
            return Ok(());
        }

        task.soft_delete();
        self.store.put(&task).await?;
        info!(
            "event=task_remove module=service status=ok task_id={}",
            id
        );
        Ok(())
    }

    /// Returns one task, tombstoned or not.
    pub async fn get_task(&self, id: &TaskId) -> ServiceResult<Option<Task>> {
        Ok(self.store.get_by_id(id).await?)
    }

    /// The rendered view: live tasks only, in store order.
    pub async fn visible_tasks(&self) -> ServiceResult<Vec<Task>> {
        Ok(self.store.get_all(TaskListQuery::active()).await?)
    }

    /// Tombstones still waiting for remote confirmation.
    pub async fn pending_removals(&self) -> ServiceResult<Vec<Task>> {
        Ok(self.store.get_all(TaskListQuery::tombstoned()).await?)
    }
}
