//! Application facade: user actions followed by synchronization.
//!
//! Runs a pass on start and after every local mutation. Pass failures are
//! logged and never surface as user-action failures; the list always renders
//! from the local store.

use crate::model::task::{Task, TaskId};
use crate::remote::RemoteService;
use crate::service::task_service::{ServiceResult, TaskService};
use crate::store::TaskStore;
use crate::sync::engine::{SyncEngine, SyncResult};
use crate::sync::id_locks::IdLocks;
use crate::sync::reconciler::{Reconciler, SyncReport};
use log::warn;
use std::sync::Arc;

pub struct OfflineTodo<S: ?Sized, R: ?Sized> {
    tasks: TaskService<S>,
    engine: SyncEngine<S, R>,
    auto_sync: bool,
}

impl<S, R> OfflineTodo<S, R>
where
    S: TaskStore + ?Sized,
    R: RemoteService + ?Sized,
{
    pub fn new(store: Arc<S>, remote: Arc<R>, max_in_flight: usize) -> Self {
        let locks = IdLocks::new();
        let reconciler = Reconciler::new(store.clone(), remote, locks.clone())
            .with_max_in_flight(max_in_flight);
        Self {
            tasks: TaskService::new(store, locks),
            engine: SyncEngine::from_reconciler(reconciler),
            auto_sync: true,
        }
    }

    /// Disables passes on start and after mutations; `sync` still works.
    pub fn with_auto_sync(mut self, auto_sync: bool) -> Self {
        self.auto_sync = auto_sync;
        self
    }

    pub fn tasks(&self) -> &TaskService<S> {
        &self.tasks
    }

    pub fn engine(&self) -> &SyncEngine<S, R> {
        &self.engine
    }

    /// Startup: synchronize, then project the visible list.
    pub async fn start(&self) -> ServiceResult<Vec<Task>> {
        self.sync_quietly().await;
        self.tasks.visible_tasks().await
    }

    pub async fn add(&self, text: impl Into<String>) -> ServiceResult<Task> {
        let task = self.tasks.add_task(text).await?;
        self.sync_quietly().await;
        Ok(task)
    }

    pub async fn remove(&self, id: &TaskId) -> ServiceResult<()> {
        self.tasks.remove_task(id).await?;
        self.sync_quietly().await;
        Ok(())
    }

    pub async fn visible(&self) -> ServiceResult<Vec<Task>> {
        self.tasks.visible_tasks().await
    }

    /// Runs a pass and reports its outcome to the caller.
    pub async fn sync(&self) -> SyncResult<SyncReport> {
        self.engine.sync().await
    }

    async fn sync_quietly(&self) -> Option<SyncReport> {
        if !self.auto_sync {
            return None;
        }
        match self.engine.sync().await {
            Ok(report) => Some(report),
            Err(err) => {
                // Already logged by the engine; next trigger retries.
                warn!(
                    "event=auto_sync module=app status=skipped error={}",
                    err
                );
                None
            }
        }
    }
}
