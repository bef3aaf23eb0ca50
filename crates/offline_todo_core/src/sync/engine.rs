//! Synchronization pass driver.
//!
//! # Responsibility
//! - Fetch the remote listing and the local snapshot, then run the reconciler.
//! - Keep passes serial: a trigger that arrives mid-pass waits, and triggers
//!   that queued behind the same pass share one follow-up pass.
//!
//! # Invariants
//! - A failed snapshot fetch aborts the pass before any mutation.
//! - A pass result covers every trigger issued before that pass took its
//!   snapshots.

use crate::model::task::Task;
use crate::remote::{RemoteError, RemoteService};
use crate::store::{StoreError, TaskListQuery, TaskStore};
use crate::sync::id_locks::IdLocks;
use crate::sync::reconciler::{Reconciler, SyncReport};
use log::{error, info};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::Mutex;

pub type SyncResult<T> = Result<T, SyncError>;

/// Pass-level failure; no mutation was attempted.
#[derive(Debug, Clone)]
pub enum SyncError {
    /// The remote listing failed, so the remote state is unknown.
    RemoteUnavailable(RemoteError),
    /// The local snapshot could not be read.
    Store(Arc<StoreError>),
}

impl Display for SyncError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::RemoteUnavailable(err) => write!(f, "cannot connect to remote: {err}"),
            Self::Store(err) => write!(f, "cannot read local tasks: {err}"),
        }
    }
}

impl Error for SyncError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::RemoteUnavailable(err) => Some(err),
            Self::Store(err) => Some(err.as_ref()),
        }
    }
}

#[derive(Default)]
struct PassState {
    completed_generation: u64,
    last_result: Option<SyncResult<SyncReport>>,
}

/// Serial driver of reconciliation passes.
pub struct SyncEngine<S: ?Sized, R: ?Sized> {
    reconciler: Reconciler<S, R>,
    gate: Mutex<PassState>,
    requested_generation: AtomicU64,
}

impl<S, R> SyncEngine<S, R>
where
    S: TaskStore + ?Sized,
    R: RemoteService + ?Sized,
{
    pub fn new(store: Arc<S>, remote: Arc<R>, locks: IdLocks) -> Self {
        Self::from_reconciler(Reconciler::new(store, remote, locks))
    }

    pub fn from_reconciler(reconciler: Reconciler<S, R>) -> Self {
        Self {
            reconciler,
            gate: Mutex::new(PassState::default()),
            requested_generation: AtomicU64::new(0),
        }
    }

    pub fn reconciler(&self) -> &Reconciler<S, R> {
        &self.reconciler
    }

    /// Requests a pass and waits for a pass that covers this request.
    ///
    /// If another pass already started after this call was made and finished
    /// while this call waited, its result is returned without a new pass.
    pub async fn sync(&self) -> SyncResult<SyncReport> {
        let ticket = self.requested_generation.fetch_add(1, Ordering::SeqCst) + 1;
        let mut state = self.gate.lock().await;

        if state.completed_generation >= ticket {
            if let Some(result) = state.last_result.clone() {
                info!(
                    "event=sync_pass module=sync status=coalesced ticket={} covered_by={}",
                    ticket, state.completed_generation
                );
                return result;
            }
        }

        // Every trigger up to here happened before the snapshots below.
        let generation = self.requested_generation.load(Ordering::SeqCst);
        let result = self.run_pass(generation).await;
        state.completed_generation = generation;
        state.last_result = Some(result.clone());
        result
    }

    async fn run_pass(&self, generation: u64) -> SyncResult<SyncReport> {
        let started_at = Instant::now();
        info!(
            "event=sync_pass module=sync status=start generation={}",
            generation
        );

        let (remote_result, local_result) = futures::join!(
            self.reconciler.remote().list(),
            self.reconciler.store().get_all(TaskListQuery::all())
        );

        let remote_tasks = remote_result.map_err(|err| {
            error!(
                "event=sync_pass module=sync status=error generation={} duration_ms={} error_code=remote_list_failed error={}",
                generation,
                started_at.elapsed().as_millis(),
                err
            );
            SyncError::RemoteUnavailable(err)
        })?;
        let local_tasks: Vec<Task> = local_result.map_err(|err| {
            error!(
                "event=sync_pass module=sync status=error generation={} duration_ms={} error_code=local_snapshot_failed error={}",
                generation,
                started_at.elapsed().as_millis(),
                err
            );
            SyncError::Store(Arc::new(err))
        })?;

        let report = self
            .reconciler
            .reconcile(&local_tasks, &remote_tasks)
            .await;

        info!(
            "event=sync_pass module=sync status={} generation={} duration_ms={} created={} deleted={} purged_gone={} pulled={} pending={} failed={}",
            if report.is_converged() { "ok" } else { "partial" },
            generation,
            started_at.elapsed().as_millis(),
            report.created,
            report.deleted,
            report.purged_gone,
            report.pulled,
            report.pending,
            report.failed
        );
        Ok(report)
    }
}
