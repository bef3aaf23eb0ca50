//! Task domain model.
//!
//! # Responsibility
//! - Define the task record and its stable identifier.
//! - Provide tombstone helpers for soft-delete semantics.
//!
//! # Invariants
//! - `id` is assigned once by the creator and never changes.
//! - `deleted` is the source of truth for tombstone state; a missing field on
//!   the wire means `false`.

use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};
use uuid::Uuid;

/// Stable identifier of a task, shared between local and remote stores.
///
/// Opaque to the system; the only operation that matters is equality.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaskId(String);

impl TaskId {
    /// Generates a fresh globally unique id for a locally created task.
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Wraps an id received from the remote or read back from storage.
    ///
    /// The value is kept byte for byte; only an empty id is rejected.
    pub fn new(value: impl Into<String>) -> Result<Self, TaskValidationError> {
        let id = Self(value.into());
        id.validate()?;
        Ok(id)
    }

    /// Parses an id typed by a user, trimming surrounding whitespace.
    pub fn parse(value: &str) -> Result<Self, TaskValidationError> {
        Self::new(value.trim())
    }

    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }

    fn validate(&self) -> Result<(), TaskValidationError> {
        if self.0.is_empty() {
            return Err(TaskValidationError::EmptyId);
        }
        Ok(())
    }
}

impl Display for TaskId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Validation failures for task records.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskValidationError {
    EmptyId,
}

impl Display for TaskValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::EmptyId => write!(f, "task id cannot be empty"),
        }
    }
}

impl Error for TaskValidationError {}

/// The sole entity of the task list.
///
/// Serialized as `{"_id": ..., "text": ..., "deleted": ...}` to match the
/// remote collection schema. `deleted` is omitted while `false`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
    #[serde(rename = "_id", alias = "id")]
    pub id: TaskId,
    #[serde(default)]
    pub text: String,
    /// Soft delete tombstone; kept until the remote confirms the delete.
    #[serde(default, skip_serializing_if = "is_false")]
    pub deleted: bool,
}

impl Task {
    /// Creates a live task with a freshly generated id.
    pub fn new(text: impl Into<String>) -> Self {
        Self::with_id(TaskId::generate(), text)
    }

    /// Creates a live task with a caller-provided id.
    ///
    /// Used by import/sync paths where identity already exists remotely.
    pub fn with_id(id: TaskId, text: impl Into<String>) -> Self {
        Self {
            id,
            text: text.into(),
            deleted: false,
        }
    }

    /// Marks this task as tombstoned.
    pub fn soft_delete(&mut self) {
        self.deleted = true;
    }

    /// Returns whether this task should be shown to the user.
    pub fn is_active(&self) -> bool {
        !self.deleted
    }

    /// Validates invariants that cannot be expressed in the type.
    ///
    /// Needed because ids also arrive through deserialization and storage.
    pub fn validate(&self) -> Result<(), TaskValidationError> {
        self.id.validate()
    }
}

fn is_false(value: &bool) -> bool {
    !*value
}
