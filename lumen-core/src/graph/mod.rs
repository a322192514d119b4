//! Dependency Graph
//!
//! This module holds the bookkeeping half of the engine: which effects depend
//! on which (target, key) pairs, and the job queue that batches re-runs.
//!
//! # Overview
//!
//! Edges are stored in both directions:
//!
//! - The [`DependencyStore`] maps a target handle to a key-to-[`Dep`] table;
//!   each `Dep` holds the effects that read that key.
//! - Every effect keeps weak references to the `Dep`s it belongs to so it can
//!   remove itself before re-running.
//!
//! Targets are addressed by [`TargetId`] rather than by reference. A target
//! that is dropped invalidates its handle, and the store releases the entry.

mod operation;
mod scheduler;
mod store;

pub use operation::{Key, Operation, TargetId};
pub use scheduler::JobQueue;
pub use store::{Dep, DependencyStore, KeyToDep};
