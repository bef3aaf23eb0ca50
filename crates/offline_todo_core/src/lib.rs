//! Core logic of the offline-first task list.
//!
//! Local writes land in a SQLite task store first; synchronization passes
//! reconcile that store with the remote task service using tombstones.

pub mod config;
pub mod db;
pub mod logging;
pub mod model;
pub mod remote;
pub mod service;
pub mod store;
pub mod sync;

pub use config::{AppConfig, ConfigError};
pub use logging::{default_log_level, init_logging, logging_status};
pub use model::task::{Task, TaskId, TaskValidationError};
pub use remote::http_remote::HttpRemoteService;
pub use remote::memory_remote::{MemoryRemoteService, RemoteCall};
pub use remote::{RemoteError, RemoteResult, RemoteService};
pub use service::app::OfflineTodo;
pub use service::task_service::{ServiceError, ServiceResult, TaskService};
pub use store::memory_store::MemoryTaskStore;
pub use store::sqlite_store::SqliteTaskStore;
pub use store::{StoreError, StoreResult, TaskListQuery, TaskStore};
pub use sync::engine::{SyncEngine, SyncError, SyncResult};
pub use sync::id_locks::IdLocks;
pub use sync::reconciler::{plan_actions, ActionOutcome, Reconciler, SyncAction, SyncReport};

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

#[cfg(test)]
mod tests {
    use super::core_version;

    #[test]
    fn version_is_not_empty() {
        assert!(!core_version().is_empty());
    }
}
