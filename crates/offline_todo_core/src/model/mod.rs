//! Domain model for the offline task list.
//!
//! # Responsibility
//! - Define the canonical `Task` record shared by the local store, the remote
//!   wire format and the reconciler.
//!
//! # Invariants
//! - Every task is identified by a stable, client-generated `TaskId`.
//! - Deletion is a local tombstone until the remote confirms it.

pub mod task;
