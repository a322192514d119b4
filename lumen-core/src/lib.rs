//! Lumen Core
//!
//! This crate provides a fine-grained reactivity engine. It implements:
//!
//! - Observable proxies over records, sequences, maps and sets
//! - Property-level dependency tracking (track / trigger)
//! - Effects with cleanup-before-rerun, nesting and custom schedulers
//! - Refs for primitive values and cached computed values
//! - A job queue for batching effect re-runs
//!
//! # Architecture
//!
//! The crate is organized into several modules:
//!
//! - `observe`: Values, raw targets and the proxies that intercept access
//! - `reactive`: Effects, the runtime, refs and computed values
//! - `graph`: Operation/key vocabulary, the dependency store and the job queue
//! - `config`, `diagnostics`, `error`: Runtime tunables and failure reporting
//!
//! Everything is single-threaded. Each thread owns an independent reactive
//! graph.
//!
//! # Example
//!
//! ```rust,ignore
//! use lumen_core::observe::{reactive, Value};
//! use lumen_core::reactive::{derive, effect};
//!
//! // Create observable state
//! let state = reactive(Value::record([("count", 0)])).into_observed().unwrap();
//!
//! // Create a derived value
//! let doubled = {
//!     let state = state.clone();
//!     derive(move || state.get("count").as_int().unwrap_or(0) * 2)
//! };
//!
//! // Create an effect; it reacts for as long as the handle is kept
//! let _printer = effect(move || {
//!     println!("Doubled: {}", doubled.get());
//! });
//!
//! // Update the state
//! state.set("count", 5);
//! // Effect automatically runs, prints: "Doubled: 10"
//! ```

pub mod config;
pub mod diagnostics;
pub mod error;
pub mod graph;
pub mod observe;
pub mod reactive;

pub use config::{configure, RuntimeConfig};
pub use error::{Diagnostic, ReactiveError};
pub use graph::{JobQueue, Key, Operation, TargetId};
pub use observe::{observe, reactive, readonly, Mode, Observed, Scalar, Target, Value};
pub use reactive::{boxed, derive, derive_writable, effect, effect_with, stop, Computed, Effect, EffectOptions, Ref};
