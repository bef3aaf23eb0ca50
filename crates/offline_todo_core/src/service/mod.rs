//! Use-case services.
//!
//! # Responsibility
//! - Turn user actions (add, remove) into local store writes.
//! - Tie user actions to synchronization passes (`app`).
//!
//! # Invariants
//! - User writes take the same per-id lock as the reconciler.
//! - Services stay storage- and transport-agnostic.

pub mod app;
pub mod task_service;
