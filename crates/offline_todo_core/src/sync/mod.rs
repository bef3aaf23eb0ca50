//! Local/remote reconciliation.
//!
//! # Responsibility
//! - Plan and execute the mutations that converge the local store with the
//!   remote service (`reconciler`).
//! - Drive serialized synchronization passes (`engine`).
//! - Serialize writers touching the same task id (`id_locks`).
//!
//! # Invariants
//! - Tombstones win over re-creation; `Gone` is never retried as a create.
//! - A single record's failure never aborts a pass.
//! - A failed remote listing aborts the pass before any mutation.

pub mod engine;
pub mod id_locks;
pub mod reconciler;
