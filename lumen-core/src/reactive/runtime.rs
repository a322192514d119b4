//! Reactive Runtime
//!
//! The runtime connects reads to writes through the dependency store.
//!
//! # How It Works
//!
//! 1. When a tracked read happens inside a running effect,
//!    [`Runtime::track`] adds that effect to the (target, key) set and the
//!    effect records the reverse edge.
//!
//! 2. When a write changes a key, [`Runtime::trigger`] collects the effects
//!    of that key (plus the iteration key for shape changes, or every key for
//!    `Clear`) and dispatches them: computed effects first, then plain ones.
//!
//! 3. Computed effects only flip their dirty flag, so by the time a plain
//!    effect re-reads a computed value it recomputes from fresh state.
//!
//! # Storage
//!
//! The dependency store is thread-local. Targets address it by handle, and
//! a dropped target calls [`Runtime::forget`] so its entry is released. If
//! the store happens to be borrowed at that moment, the handle is parked and
//! released on the next access.

use std::cell::RefCell;

use indexmap::IndexMap;

use super::context::{self, ReactiveContext};
use super::effect::Effect;
use super::subscriber::{Change, EffectId, TrackEvent};
use crate::graph::{DependencyStore, Key, KeyToDep, Operation, TargetId};

thread_local! {
    static STORE: RefCell<DependencyStore> = RefCell::new(DependencyStore::new());
    static PENDING_FORGET: RefCell<Vec<TargetId>> = const { RefCell::new(Vec::new()) };
}

/// Run `f` against the store, releasing any parked targets first. Entries
/// evicted here are dropped only after the borrow ends.
fn with_store<R>(f: impl FnOnce(&mut DependencyStore) -> R) -> Option<R> {
    let (result, evicted) = STORE
        .try_with(|cell| {
            let mut store = cell.try_borrow_mut().ok()?;
            let parked: Vec<TargetId> = PENDING_FORGET
                .try_with(|pending| std::mem::take(&mut *pending.borrow_mut()))
                .unwrap_or_default();
            let evicted: Vec<KeyToDep> = parked
                .into_iter()
                .filter_map(|target| store.forget(target))
                .collect();
            Some((f(&mut store), evicted))
        })
        .ok()
        .flatten()?;
    drop(evicted);
    Some(result)
}

/// The reactive runtime of the current thread.
pub struct Runtime;

impl Runtime {
    /// Record that the running effect read `key` of `target`.
    pub fn track(target: TargetId, operation: Operation, key: Key) {
        if !context::is_tracking() {
            return;
        }
        let Some(effect) = ReactiveContext::current() else {
            return;
        };
        if !effect.is_active() {
            return;
        }

        let Some(dep) = with_store(|store| store.dep_for(target, key.clone())) else {
            return;
        };
        if !dep.insert(&effect) {
            return;
        }
        effect.add_dep(&dep);
        tracing::trace!(effect = %effect.id(), target_id = %target, %key, %operation, "tracked");

        effect.notify_track(&TrackEvent {
            effect: effect.id(),
            target,
            operation,
            key: Some(key),
            change: Change::none(),
        });
    }

    /// Notify every effect that depends on the changed key.
    pub fn trigger(target: TargetId, operation: Operation, key: Option<Key>, change: Change) {
        debug_assert!(!operation.is_read(), "read operation `{operation}` passed to trigger");

        let Some(deps) = with_store(|store| -> Option<Vec<_>> {
            let mut deps = Vec::new();
            match operation {
                Operation::Clear => return store.deps_of(target),
                Operation::Add | Operation::Delete => {
                    deps.extend(key.as_ref().and_then(|key| store.get(target, key)));
                    // Sequences depend on `length`, everything else on the
                    // synthetic iteration key; a target only ever has one.
                    deps.extend(store.get(target, &Key::Iterate));
                    deps.extend(store.get(target, &Key::Length));
                }
                Operation::Set | Operation::Get | Operation::Has | Operation::Iterate => {
                    deps.extend(key.as_ref().and_then(|key| store.get(target, key)));
                }
            }
            store.contains_target(target).then_some(deps)
        })
        .flatten() else {
            return;
        };

        let mut computed: IndexMap<EffectId, Effect> = IndexMap::new();
        let mut plain: IndexMap<EffectId, Effect> = IndexMap::new();
        for effect in deps.iter().flat_map(|dep| dep.effects()) {
            let bucket = if effect.is_computed() {
                &mut computed
            } else {
                &mut plain
            };
            bucket.entry(effect.id()).or_insert(effect);
        }

        for effect in computed.values().chain(plain.values()) {
            if !effect.is_active() {
                continue;
            }
            tracing::trace!(effect = %effect.id(), target_id = %target, %operation, "triggered");
            if effect.has_on_trigger() {
                effect.notify_trigger(&TrackEvent {
                    effect: effect.id(),
                    target,
                    operation,
                    key: key.clone(),
                    change: change.clone(),
                });
            }
            effect.schedule();
        }
    }

    /// Subscribe the running effect to every set `child` belongs to.
    ///
    /// Called after a computed value is read, so that an effect reading a
    /// chain of computed values is invalidated by their underlying sources.
    pub fn track_child_run(child: &Effect) {
        if !context::is_tracking() {
            return;
        }
        let Some(parent) = ReactiveContext::current() else {
            return;
        };
        if !parent.is_active() || parent == *child {
            return;
        }

        for dep in child.deps() {
            if dep.insert(&parent) {
                parent.add_dep(&dep);
            }
        }
    }

    /// Release all bookkeeping for a target that no longer exists.
    pub fn forget(target: TargetId) {
        match with_store(|store| store.forget(target)) {
            Some(evicted) => drop(evicted),
            None => {
                let _ = PENDING_FORGET.try_with(|pending| {
                    if let Ok(mut pending) = pending.try_borrow_mut() {
                        pending.push(target);
                    }
                });
            }
        }
    }

    /// Whether anything has ever tracked this target (and it is still alive).
    pub fn is_tracked(target: TargetId) -> bool {
        with_store(|store| store.contains_target(target)).unwrap_or(false)
    }

    /// Number of effects subscribed to (target, key).
    pub fn dependent_count(target: TargetId, key: &Key) -> usize {
        with_store(|store| store.get(target, key))
            .flatten()
            .map_or(0, |dep| dep.len())
    }

    /// Get the current effect being tracked, if any.
    pub fn current_effect() -> Option<Effect> {
        ReactiveContext::current()
    }

    /// Check if reads would currently be recorded.
    pub fn is_tracking() -> bool {
        context::is_tracking() && ReactiveContext::is_active()
    }
}

/// Record a read of `key` on `target`. See [`Runtime::track`].
pub fn track(target: TargetId, operation: Operation, key: Key) {
    Runtime::track(target, operation, key);
}

/// Notify dependents of a write. See [`Runtime::trigger`].
pub fn trigger(target: TargetId, operation: Operation, key: Option<Key>, change: Change) {
    Runtime::trigger(target, operation, key, change);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::observe::Value;
    use crate::reactive::EffectOptions;
    use std::cell::Cell;
    use std::rc::Rc;

    fn tracking_effect(target: TargetId, key: Key, runs: Rc<Cell<i32>>, computed: bool) -> Effect {
        let mut options = EffectOptions::new();
        if computed {
            options = options.computed();
        }
        Effect::with_options(
            move || {
                runs.set(runs.get() + 1);
                Runtime::track(target, Operation::Get, key.clone());
            },
            options,
        )
    }

    #[test]
    fn track_requires_running_effect() {
        let target = TargetId::new();
        Runtime::track(target, Operation::Get, Key::from("a"));
        assert!(!Runtime::is_tracked(target));
    }

    #[test]
    fn trigger_runs_dependents() {
        let target = TargetId::new();
        let runs = Rc::new(Cell::new(0));
        let _effect = tracking_effect(target, Key::from("a"), runs.clone(), false);

        assert_eq!(runs.get(), 1);
        assert_eq!(Runtime::dependent_count(target, &Key::from("a")), 1);

        Runtime::trigger(target, Operation::Set, Some(Key::from("a")), Change::none());
        assert_eq!(runs.get(), 2);

        // Unrelated keys do nothing
        Runtime::trigger(target, Operation::Set, Some(Key::from("b")), Change::none());
        assert_eq!(runs.get(), 2);
    }

    #[test]
    fn add_triggers_iteration_dependents() {
        let target = TargetId::new();
        let runs = Rc::new(Cell::new(0));
        let _effect = tracking_effect(target, Key::Iterate, runs.clone(), false);

        Runtime::trigger(target, Operation::Set, Some(Key::from("x")), Change::none());
        assert_eq!(runs.get(), 1);

        Runtime::trigger(target, Operation::Add, Some(Key::from("x")), Change::none());
        assert_eq!(runs.get(), 2);

        Runtime::trigger(target, Operation::Delete, Some(Key::from("x")), Change::none());
        assert_eq!(runs.get(), 3);
    }

    #[test]
    fn clear_triggers_every_key() {
        let target = TargetId::new();
        let a = Rc::new(Cell::new(0));
        let b = Rc::new(Cell::new(0));
        let _ea = tracking_effect(target, Key::from("a"), a.clone(), false);
        let _eb = tracking_effect(target, Key::from("b"), b.clone(), false);

        Runtime::trigger(target, Operation::Clear, None, Change::none());
        assert_eq!(a.get(), 2);
        assert_eq!(b.get(), 2);
    }

    #[test]
    fn computed_effects_dispatch_first() {
        let target = TargetId::new();
        let order = Rc::new(RefCell::new(Vec::new()));

        let plain_order = order.clone();
        let plain = Effect::with_options(
            move || Runtime::track(target, Operation::Get, Key::Value),
            EffectOptions::new().scheduler(move |_| plain_order.borrow_mut().push("plain")),
        );
        let computed_order = order.clone();
        let computed = Effect::with_options(
            move || Runtime::track(target, Operation::Get, Key::Value),
            EffectOptions::new()
                .computed()
                .scheduler(move |_| computed_order.borrow_mut().push("computed")),
        );

        Runtime::trigger(target, Operation::Set, Some(Key::Value), Change::none());
        assert_eq!(*order.borrow(), vec!["computed", "plain"]);

        plain.stop();
        computed.stop();
    }

    #[test]
    fn paused_tracking_records_nothing() {
        let target = TargetId::new();
        let _effect = Effect::new(move || {
            context::untracked(|| Runtime::track(target, Operation::Get, Key::Value));
        });
        assert_eq!(Runtime::dependent_count(target, &Key::Value), 0);
    }

    #[test]
    fn on_track_fires_once_per_edge() {
        let target = TargetId::new();
        let events = Rc::new(RefCell::new(Vec::new()));
        let events_clone = events.clone();

        let _effect = Effect::with_options(
            move || {
                Runtime::track(target, Operation::Get, Key::from("a"));
                Runtime::track(target, Operation::Get, Key::from("a"));
                Runtime::track(target, Operation::Has, Key::from("b"));
            },
            EffectOptions::new().on_track(move |event| events_clone.borrow_mut().push(event.clone())),
        );

        let events = events.borrow();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].operation, Operation::Get);
        assert_eq!(events[1].operation, Operation::Has);
        assert_eq!(events[1].key, Some(Key::from("b")));
    }

    #[test]
    fn on_trigger_sees_the_change_before_scheduling() {
        let target = TargetId::new();
        let log = Rc::new(RefCell::new(Vec::new()));

        let (hook_log, scheduler_log) = (log.clone(), log.clone());
        let effect = Effect::with_options(
            move || Runtime::track(target, Operation::Get, Key::from("count")),
            EffectOptions::new()
                .on_trigger(move |event| hook_log.borrow_mut().push(Some(event.clone())))
                .scheduler(move |_| scheduler_log.borrow_mut().push(None)),
        );

        Runtime::trigger(
            target,
            Operation::Set,
            Some(Key::from("count")),
            Change::new(Some(Value::Int(1)), Some(Value::Int(2))),
        );

        assert_eq!(
            *log.borrow(),
            vec![
                Some(TrackEvent {
                    effect: effect.id(),
                    target,
                    operation: Operation::Set,
                    key: Some(Key::from("count")),
                    change: Change::new(Some(Value::Int(1)), Some(Value::Int(2))),
                }),
                None,
            ]
        );

        // Stopped effects are neither reported nor scheduled
        effect.stop();
        Runtime::trigger(target, Operation::Set, Some(Key::from("count")), Change::none());
        assert_eq!(log.borrow().len(), 2);
    }

    #[test]
    fn forget_releases_target() {
        let target = TargetId::new();
        let runs = Rc::new(Cell::new(0));
        let effect = tracking_effect(target, Key::from("a"), runs.clone(), false);
        assert!(Runtime::is_tracked(target));

        Runtime::forget(target);
        assert!(!Runtime::is_tracked(target));
        assert_eq!(effect.dependency_count(), 0);

        Runtime::trigger(target, Operation::Set, Some(Key::from("a")), Change::none());
        assert_eq!(runs.get(), 1);
    }
}
