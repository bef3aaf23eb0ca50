//! Local record store contract and implementations.
//!
//! # Responsibility
//! - Define the keyed task collection the reconciler and service layer use.
//! - Isolate SQLite details behind the `TaskStore` trait.
//!
//! # Invariants
//! - `put` is an upsert keyed by task id.
//! - `delete` of an unknown id succeeds without effect.
//! - `get_all` never observes a partially written `put`.

pub mod memory_store;
pub mod sqlite_store;

use crate::db::DbError;
use crate::model::task::{Task, TaskId, TaskValidationError};
use async_trait::async_trait;
use std::error::Error;
use std::fmt::{Display, Formatter};

pub type StoreResult<T> = Result<T, StoreError>;

/// Error for local task persistence and query operations.
#[derive(Debug)]
pub enum StoreError {
    Validation(TaskValidationError),
    Db(DbError),
    InvalidData(String),
    UninitializedConnection {
        expected_version: u32,
        actual_version: u32,
    },
    MissingRequiredTable(&'static str),
    MissingRequiredColumn {
        table: &'static str,
        column: &'static str,
    },
    /// Backend rejected the operation without touching stored state.
    Unavailable(String),
}

impl Display for StoreError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Validation(err) => write!(f, "{err}"),
            Self::Db(err) => write!(f, "{err}"),
            Self::InvalidData(message) => write!(f, "invalid persisted task data: {message}"),
            Self::UninitializedConnection {
                expected_version,
                actual_version,
            } => write!(
                f,
                "connection is not migrated: expected schema version {expected_version}, got {actual_version}"
            ),
            Self::MissingRequiredTable(table) => write!(f, "required table is missing: {table}"),
            Self::MissingRequiredColumn { table, column } => {
                write!(f, "required column is missing: {table}.{column}")
            }
            Self::Unavailable(message) => write!(f, "task store unavailable: {message}"),
        }
    }
}

impl Error for StoreError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Validation(err) => Some(err),
            Self::Db(err) => Some(err),
            _ => None,
        }
    }
}

impl From<TaskValidationError> for StoreError {
    fn from(value: TaskValidationError) -> Self {
        Self::Validation(value)
    }
}

impl From<DbError> for StoreError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for StoreError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

/// Tombstone filter for `TaskStore::get_all`.
///
/// `deleted: None` returns every record, tombstones included.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TaskListQuery {
    pub deleted: Option<bool>,
}

impl TaskListQuery {
    pub fn all() -> Self {
        Self { deleted: None }
    }

    /// Only records that should be rendered.
    pub fn active() -> Self {
        Self {
            deleted: Some(false),
        }
    }

    /// Only records awaiting remote delete confirmation.
    pub fn tombstoned() -> Self {
        Self {
            deleted: Some(true),
        }
    }

    pub fn matches(&self, task: &Task) -> bool {
        match self.deleted {
            Some(deleted) => task.deleted == deleted,
            None => true,
        }
    }
}

/// Durable keyed collection of tasks.
#[async_trait]
pub trait TaskStore: Send + Sync {
    async fn get_all(&self, query: TaskListQuery) -> StoreResult<Vec<Task>>;
    async fn get_by_id(&self, id: &TaskId) -> StoreResult<Option<Task>>;
    async fn put(&self, task: &Task) -> StoreResult<()>;
    async fn delete(&self, id: &TaskId) -> StoreResult<()>;
}
