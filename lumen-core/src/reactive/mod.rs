//! Reactive Primitives
//!
//! This module implements the effect runtime and the two value primitives
//! built on it: refs and computed values.
//!
//! # Concepts
//!
//! ## Effects
//!
//! An [`Effect`] is a computation that records every tracked read it makes
//! and re-runs when any of them changes. Its `scheduler` option lets a host
//! defer re-runs instead, e.g. into a [`JobQueue`](crate::graph::JobQueue).
//! The returned handle owns the effect; once every handle is dropped it no
//! longer reacts.
//!
//! ## Refs
//!
//! A [`Ref`] is a single reactive cell, for primitives that cannot be
//! wrapped in a proxy.
//!
//! ## Computed Values
//!
//! A [`Computed`] is a cached derived value. It is both an effect (it tracks
//! what its getter reads) and a source (effects reading it are invalidated
//! when its inputs change).
//!
//! # Implementation Notes
//!
//! Dependency tracking is automatic: a thread-local stack holds the running
//! effects, and [`Runtime::track`] subscribes the innermost one to whatever
//! is being read. Each thread therefore has an independent reactive graph.

mod computed;
mod context;
mod effect;
mod reference;
mod runtime;
mod subscriber;

pub use computed::{derive, derive_writable, Computed};
pub use context::{
    is_locked, is_tracking, lock, pause_tracking, resume_tracking, unlock, untracked,
    ReactiveContext,
};
pub use effect::{effect, effect_from, effect_with, stop, DebugHook, Effect, EffectOptions, Scheduler};
pub(crate) use effect::WeakEffect;
pub use reference::{boxed, is_ref, to_refs, Ref};
pub use runtime::{track, trigger, Runtime};
pub use subscriber::{Change, EffectId, TrackEvent};
