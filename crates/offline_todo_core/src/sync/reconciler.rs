//! Reconciler: converges a local snapshot with a remote snapshot.
//!
//! # Responsibility
//! - Decide, per task id, which single mutation chain (if any) is needed.
//! - Execute those chains with bounded concurrency across ids.
//!
//! # Invariants
//! - Join is by `id` only; text is never compared or merged.
//! - A local tombstone is purged only after the remote delete succeeded or
//!   the remote reported `Gone`.
//! - A create that fails with `Gone` purges the local record instead of being
//!   retried.
//! - Remote-only records are adopted locally; records already known locally
//!   are never overwritten by the remote copy.
//! - Per-record failures are recorded in `SyncReport` and never abort the run.

use crate::model::task::{Task, TaskId};
use crate::remote::{RemoteError, RemoteService};
use crate::store::TaskStore;
use crate::sync::id_locks::IdLocks;
use futures::stream::{self, StreamExt};
use log::{debug, error, warn};
use std::collections::HashSet;
use std::sync::Arc;

/// Default bound on concurrently executing per-id chains.
pub const DEFAULT_MAX_IN_FLIGHT: usize = 8;

/// One per-id mutation chain decided by `plan_actions`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncAction {
    /// Local tombstone: delete remotely, then purge locally.
    DeleteRemote(TaskId),
    /// Live local record the remote has never listed.
    CreateRemote(Task),
    /// Remote record the local store has never seen.
    PullLocal(Task),
}

impl SyncAction {
    pub fn task_id(&self) -> &TaskId {
        match self {
            Self::DeleteRemote(id) => id,
            Self::CreateRemote(task) | Self::PullLocal(task) => &task.id,
        }
    }
}

/// Computes the actions that converge `local` with `remote`.
///
/// `local` must contain every local record including tombstones; `remote` the
/// remote listing. Returns at most one action per id, local actions first in
/// `local` order, then pulls in `remote` order. Already converged ids yield no
/// action, which is what makes a repeated pass side-effect free.
pub fn plan_actions(local: &[Task], remote: &[Task]) -> Vec<SyncAction> {
    let remote_ids: HashSet<&TaskId> = remote
        .iter()
        .filter(|task| task.is_active())
        .map(|task| &task.id)
        .collect();
    let local_ids: HashSet<&TaskId> = local.iter().map(|task| &task.id).collect();

    let mut actions = Vec::new();
    for task in local {
        if task.deleted {
            actions.push(SyncAction::DeleteRemote(task.id.clone()));
        } else if !remote_ids.contains(&task.id) {
            actions.push(SyncAction::CreateRemote(task.clone()));
        }
    }

    let mut pulled: HashSet<&TaskId> = HashSet::new();
    for task in remote {
        if !task.is_active() || local_ids.contains(&task.id) || !pulled.insert(&task.id) {
            continue;
        }
        let mut adopted = task.clone();
        adopted.deleted = false;
        actions.push(SyncAction::PullLocal(adopted));
    }

    actions
}

/// Outcome of one executed action.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActionOutcome {
    Created,
    /// Remote delete succeeded and the tombstone was purged.
    Deleted,
    /// Remote reported `Gone`; the local record was purged.
    PurgedGone,
    Pulled,
    /// Transient remote failure; the record is retried on the next pass.
    Pending,
    /// Local store write failed; the record is retried on the next pass.
    Failed,
}

/// Per-pass tally of reconciliation outcomes.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncReport {
    pub created: usize,
    pub deleted: usize,
    pub purged_gone: usize,
    pub pulled: usize,
    pub pending: usize,
    pub failed: usize,
}

impl SyncReport {
    pub fn record(&mut self, outcome: ActionOutcome) {
        match outcome {
            ActionOutcome::Created => self.created += 1,
            ActionOutcome::Deleted => self.deleted += 1,
            ActionOutcome::PurgedGone => self.purged_gone += 1,
            ActionOutcome::Pulled => self.pulled += 1,
            ActionOutcome::Pending => self.pending += 1,
            ActionOutcome::Failed => self.failed += 1,
        }
    }

    /// Whether every planned action completed.
    pub fn is_converged(&self) -> bool {
        self.pending == 0 && self.failed == 0
    }

    /// Number of actions that changed either store.
    pub fn touched(&self) -> usize {
        self.created + self.deleted + self.purged_gone + self.pulled
    }
}

/// Executes reconciliation against injected store and remote handles.
///
/// Holds no connection state of its own.
pub struct Reconciler<S: ?Sized, R: ?Sized> {
    store: Arc<S>,
    remote: Arc<R>,
    locks: IdLocks,
    max_in_flight: usize,
}

impl<S, R> Reconciler<S, R>
where
    S: TaskStore + ?Sized,
    R: RemoteService + ?Sized,
{
    pub fn new(store: Arc<S>, remote: Arc<R>, locks: IdLocks) -> Self {
        Self {
            store,
            remote,
            locks,
            max_in_flight: DEFAULT_MAX_IN_FLIGHT,
        }
    }

    /// Bounds concurrently executing per-id chains; `0` is treated as `1`.
    pub fn with_max_in_flight(mut self, max_in_flight: usize) -> Self {
        self.max_in_flight = max_in_flight.max(1);
        self
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    pub fn remote(&self) -> &Arc<R> {
        &self.remote
    }

    /// Runs one reconciliation over the given snapshots.
    ///
    /// Never fails as a whole; per-record failures are counted as `pending`
    /// (remote) or `failed` (local) and retried by the next pass.
    pub async fn reconcile(&self, local: &[Task], remote: &[Task]) -> SyncReport {
        let actions = plan_actions(local, remote);
        debug!(
            "event=sync_plan module=sync status=ok local_count={} remote_count={} action_count={}",
            local.len(),
            remote.len(),
            actions.len()
        );

        let outcomes: Vec<ActionOutcome> = stream::iter(actions)
            .map(|action| self.execute(action))
            .buffer_unordered(self.max_in_flight)
            .collect()
            .await;

        let mut report = SyncReport::default();
        for outcome in outcomes {
            report.record(outcome);
        }
        report
    }

    /// Executes one action while holding that id's lock.
    pub async fn execute(&self, action: SyncAction) -> ActionOutcome {
        let _guard = self.locks.lock(action.task_id()).await;
        match action {
            SyncAction::DeleteRemote(id) => self.push_delete(&id).await,
            SyncAction::CreateRemote(task) => self.push_create(&task).await,
            SyncAction::PullLocal(task) => self.pull(&task).await,
        }
    }

    async fn push_delete(&self, id: &TaskId) -> ActionOutcome {
        match self.remote.delete(id).await {
            Ok(()) => self.purge(id, ActionOutcome::Deleted).await,
            Err(RemoteError::Gone(_)) => self.purge(id, ActionOutcome::PurgedGone).await,
            Err(err) => {
                warn!(
                    "event=sync_delete module=sync status=pending task_id={} error_code={} error={}",
                    id,
                    err.code(),
                    err
                );
                ActionOutcome::Pending
            }
        }
    }

    async fn push_create(&self, task: &Task) -> ActionOutcome {
        match self.remote.create(task).await {
            Ok(()) => {
                debug!(
                    "event=sync_create module=sync status=ok task_id={}",
                    task.id
                );
                ActionOutcome::Created
            }
            Err(RemoteError::Gone(_)) => {
                warn!(
                    "event=sync_create module=sync status=gone task_id={} action=purge_local",
                    task.id
                );
                self.purge(&task.id, ActionOutcome::PurgedGone).await
            }
            Err(err) => {
                warn!(
                    "event=sync_create module=sync status=pending task_id={} error_code={} error={}",
                    task.id,
                    err.code(),
                    err
                );
                ActionOutcome::Pending
            }
        }
    }

    async fn pull(&self, task: &Task) -> ActionOutcome {
        match self.store.put(task).await {
            Ok(()) => {
                debug!("event=sync_pull module=sync status=ok task_id={}", task.id);
                ActionOutcome::Pulled
            }
            Err(err) => {
                error!(
                    "event=sync_pull module=sync status=error task_id={} error_code=store_put_failed error={}",
                    task.id, err
                );
                ActionOutcome::Failed
            }
        }
    }

    async fn purge(&self, id: &TaskId, outcome: ActionOutcome) -> ActionOutcome {
        match self.store.delete(id).await {
            Ok(()) => {
                debug!(
                    "event=sync_purge module=sync status=ok task_id={} outcome={:?}",
                    id, outcome
                );
                outcome
            }
            Err(err) => {
                error!(
                    "event=sync_purge module=sync status=error task_id={} error_code=store_delete_failed error={}",
                    id, err
                );
                ActionOutcome::Failed
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{plan_actions, SyncAction, SyncReport};
    use crate::model::task::{Task, TaskId};

    fn task(id: &str, text: &str) -> Task {
        Task::with_id(TaskId::parse(id).unwrap(), text)
    }

    fn tombstone(id: &str) -> Task {
        let mut task = task(id, "");
        task.soft_delete();
        task
    }

    #[test]
    fn plans_one_action_per_diverged_id() {
        let local = vec![task("1", "milk"), tombstone("2"), task("3", "bread")];
        let remote = vec![task("2", "old"), task("3", "bread"), task("4", "eggs")];

        let actions = plan_actions(&local, &remote);
        assert_eq!(
            actions,
            vec![
                SyncAction::CreateRemote(task("1", "milk")),
                SyncAction::DeleteRemote(TaskId::parse("2").unwrap()),
                SyncAction::PullLocal(task("4", "eggs")),
            ]
        );
    }

    #[test]
    fn tombstone_never_plans_create_even_without_remote_copy() {
        let actions = plan_actions(&[tombstone("1")], &[]);
        assert_eq!(
            actions,
            vec![SyncAction::DeleteRemote(TaskId::parse("1").unwrap())]
        );
    }

    #[test]
    fn text_differences_are_not_reconciled() {
        let actions = plan_actions(&[task("1", "local text")], &[task("1", "remote text")]);
        assert!(actions.is_empty());
    }

    #[test]
    fn local_tombstone_blocks_pull_of_remote_copy() {
        let actions = plan_actions(&[tombstone("1")], &[task("1", "milk")]);
        assert!(actions
            .iter()
            .all(|action| !matches!(action, SyncAction::PullLocal(_))));
    }

    #[test]
    fn duplicate_and_tombstoned_remote_entries_are_pulled_at_most_once() {
        let remote = vec![task("5", "first"), task("5", "second"), tombstone("6")];
        let actions = plan_actions(&[], &remote);
        assert_eq!(actions, vec![SyncAction::PullLocal(task("5", "first"))]);
    }

    #[test]
    fn report_counts_convergence() {
        let mut report = SyncReport::default();
        assert!(report.is_converged());
        report.record(super::ActionOutcome::Created);
        report.record(super::ActionOutcome::Pending);
        assert_eq!(report.touched(), 1);
        assert!(!report.is_converged());
    }
}
