//! Remote authoritative task service contract and adapters.
//!
//! # Responsibility
//! - Define list/create/delete over the remote task collection.
//! - Classify failures into terminal (`Gone`) and transient outcomes.
//!
//! # Invariants
//! - `list` never returns tombstoned records; remote deletion is physical.
//! - `delete` of an id the remote never had succeeds.
//! - `create` of an id the remote deleted fails with `RemoteError::Gone`.

pub mod http_remote;
pub mod memory_remote;

use crate::model::task::{Task, TaskId};
use async_trait::async_trait;
use std::error::Error;
use std::fmt::{Display, Formatter};

pub type RemoteResult<T> = Result<T, RemoteError>;

/// Remote call failure taxonomy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RemoteError {
    /// The id was deleted upstream and must not be resurrected.
    Gone(TaskId),
    /// Transport-level failure: connect error, timeout, broken body.
    Unreachable(String),
    /// Non-success status other than the ones the protocol gives meaning to.
    Status { status: u16, body: String },
    /// Response body did not decode into tasks.
    Decode(String),
    /// Adapter could not be constructed from its configuration.
    InvalidEndpoint(String),
}

impl RemoteError {
    pub fn is_gone(&self) -> bool {
        matches!(self, Self::Gone(_))
    }

    /// Whether retrying on a later pass can succeed.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::Unreachable(_) | Self::Status { .. } | Self::Decode(_)
        )
    }

    /// Stable short code for `error_code=` log fields.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Gone(_) => "remote_gone",
            Self::Unreachable(_) => "remote_unreachable",
            Self::Status { .. } => "remote_status",
            Self::Decode(_) => "remote_decode",
            Self::InvalidEndpoint(_) => "remote_invalid_endpoint",
        }
    }
}

impl Display for RemoteError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Gone(id) => write!(f, "task {id} is gone on the remote"),
            Self::Unreachable(message) => write!(f, "remote unreachable: {message}"),
            Self::Status { status, body } => {
                write!(f, "remote responded with status {status}: {body}")
            }
            Self::Decode(message) => write!(f, "failed to decode remote response: {message}"),
            Self::InvalidEndpoint(message) => write!(f, "invalid remote endpoint: {message}"),
        }
    }
}

impl Error for RemoteError {}

/// Remote task collection addressed by id.
#[async_trait]
pub trait RemoteService: Send + Sync {
    /// Lists every non-deleted task the remote holds.
    async fn list(&self) -> RemoteResult<Vec<Task>>;

    /// Creates `task` remotely; idempotent by id.
    async fn create(&self, task: &Task) -> RemoteResult<()>;

    /// Deletes `id` remotely.
    ///
    /// May report `Gone` when the remote remembers an earlier delete; callers
    /// treat that like success.
    async fn delete(&self, id: &TaskId) -> RemoteResult<()>;
}
