//! Integration Tests for Reactive System
//!
//! These tests verify that proxies, effects, refs and computed values work
//! together correctly.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use lumen_core::diagnostics;
use lumen_core::graph::{JobQueue, Key};
use lumen_core::observe::{self, reactive, readonly, Observed, Target, Value};
use lumen_core::reactive::{
    boxed, derive, effect, effect_with, pause_tracking, resume_tracking, stop, untracked,
    Effect, EffectOptions, Runtime,
};
use lumen_core::{Diagnostic, ReactiveError};

fn state(fields: Value) -> Observed {
    reactive(fields).into_observed().expect("structured value")
}

fn count_of(state: &Observed) -> i64 {
    state.get("count").as_int().unwrap_or(-1)
}

/// Test that wrapping twice yields the same proxy.
#[test]
fn wrapping_is_idempotent() {
    let raw = Value::record([("count", 0)]);

    let mutable = reactive(raw.clone());
    assert_eq!(reactive(mutable.clone()), mutable);
    assert_eq!(reactive(raw.clone()), mutable);

    let frozen = readonly(raw);
    assert_eq!(readonly(frozen.clone()), frozen);
}

/// Test that read-only proxies always wrap the raw target.
#[test]
fn readonly_of_mutable_wraps_raw() {
    let raw = Value::record([("count", 0)]);
    let mutable = reactive(raw.clone());
    let frozen = readonly(mutable.clone());

    assert_eq!(observe::to_raw(&frozen), raw);
    let frozen = frozen.as_observed().expect("proxy");
    let mutable = mutable.as_observed().expect("proxy");
    assert!(frozen.raw().ptr_eq(&mutable.raw()));
    assert_ne!(frozen, mutable);
}

/// Test the basic track/trigger round trip.
#[test]
fn effect_tracks_property() {
    let state = state(Value::record([("count", 0)]));
    let dummy = Rc::new(Cell::new(-1));

    let (state_clone, dummy_clone) = (state.clone(), dummy.clone());
    let _effect = effect(move || dummy_clone.set(count_of(&state_clone)));
    assert_eq!(dummy.get(), 0);

    state.set("count", 1);
    assert_eq!(dummy.get(), 1);
}

/// Test that a stopped effect no longer reacts.
#[test]
fn stop_halts_propagation() {
    let state = state(Value::record([("count", 0)]));
    let dummy = Rc::new(Cell::new(-1));

    let (state_clone, dummy_clone) = (state.clone(), dummy.clone());
    let runner = effect(move || dummy_clone.set(count_of(&state_clone)));

    state.set("count", 1);
    assert_eq!(dummy.get(), 1);

    stop(&runner);
    state.set("count", 2);
    assert_eq!(dummy.get(), 1);

    // A stopped effect can still be invoked by hand, untracked
    runner.run();
    assert_eq!(dummy.get(), 2);
    state.set("count", 3);
    assert_eq!(dummy.get(), 2);
}

/// Test that computed chains recompute at most once per change.
#[test]
fn computed_chain_recomputes_once() {
    let state = state(Value::record([("count", 0)]));
    let b_runs = Rc::new(Cell::new(0));
    let c_runs = Rc::new(Cell::new(0));

    let b = {
        let (state, runs) = (state.clone(), b_runs.clone());
        derive(move || {
            runs.set(runs.get() + 1);
            count_of(&state)
        })
    };
    let c = {
        let (b, runs) = (b.clone(), c_runs.clone());
        derive(move || {
            runs.set(runs.get() + 1);
            b.get() + 1
        })
    };

    assert_eq!(c.get(), 1);
    assert_eq!((b_runs.get(), c_runs.get()), (1, 1));

    // Repeated reads without writes never recompute
    assert_eq!(c.get(), 1);
    assert_eq!(c.get(), 1);
    assert_eq!((b_runs.get(), c_runs.get()), (1, 1));

    state.set("count", 5);
    assert_eq!(c.get(), 6);
    assert_eq!((b_runs.get(), c_runs.get()), (2, 2));
}

/// Test that a computed value is re-validated before a plain effect reads it.
#[test]
fn computed_resolves_before_plain_effects() {
    let state = state(Value::record([("count", 0)]));
    let derived = {
        let state = state.clone();
        derive(move || count_of(&state) * 10)
    };

    let seen = Rc::new(RefCell::new(Vec::new()));
    let (derived_clone, seen_clone) = (derived.clone(), seen.clone());
    let _effect = effect(move || seen_clone.borrow_mut().push(derived_clone.get()));

    state.set("count", 1);
    state.set("count", 2);
    assert_eq!(*seen.borrow(), vec![0, 10, 20]);
}

/// Test that appending produces one net notification.
#[test]
fn push_notifies_once() {
    let list = reactive(Value::list(["a", "b"])).into_observed().expect("list");
    let runs = Rc::new(Cell::new(0));
    let last_len = Rc::new(Cell::new(0));

    let (list_clone, runs_clone, len_clone) = (list.clone(), runs.clone(), last_len.clone());
    let _effect = effect(move || {
        runs_clone.set(runs_clone.get() + 1);
        len_clone.set(list_clone.len());
    });
    assert_eq!(runs.get(), 1);

    list.push("c");
    assert_eq!(runs.get(), 2);
    assert_eq!(last_len.get(), 3);
}

/// Test that untaken branches are no longer dependencies.
#[test]
fn conditional_dependencies_are_cleaned_up() {
    let state = state(Value::record([
        ("flag", Value::Bool(true)),
        ("a", Value::from("a")),
        ("b", Value::from("b")),
    ]));
    let runs = Rc::new(Cell::new(0));
    let seen = Rc::new(RefCell::new(Value::Null));

    let (state_clone, runs_clone, seen_clone) = (state.clone(), runs.clone(), seen.clone());
    let _effect = effect(move || {
        runs_clone.set(runs_clone.get() + 1);
        let branch = if state_clone.get("flag").as_bool() == Some(true) {
            state_clone.get("a")
        } else {
            state_clone.get("b")
        };
        *seen_clone.borrow_mut() = branch;
    });
    assert_eq!(*seen.borrow(), Value::from("a"));

    state.set("flag", false);
    assert_eq!(*seen.borrow(), Value::from("b"));
    assert_eq!(runs.get(), 2);

    // "a" is no longer read
    state.set("a", "changed");
    assert_eq!(runs.get(), 2);
    assert_eq!(Runtime::dependent_count(state.id(), &Key::from("a")), 0);

    state.set("b", "changed");
    assert_eq!(runs.get(), 3);
}

/// Test that nested effects track into their own effect only.
#[test]
fn nested_effects_track_separately() {
    let state = state(Value::record([("outer", 0), ("inner", 0)]));
    let outer_runs = Rc::new(Cell::new(0));
    let inner_runs = Rc::new(Cell::new(0));
    let children: Rc<RefCell<Vec<Effect>>> = Rc::new(RefCell::new(Vec::new()));

    let (state_o, outer_o, inner_o, children_o) =
        (state.clone(), outer_runs.clone(), inner_runs.clone(), children.clone());
    let _outer = effect(move || {
        outer_o.set(outer_o.get() + 1);
        state_o.get("outer");

        let (state_i, inner_i) = (state_o.clone(), inner_o.clone());
        let child = effect(move || {
            inner_i.set(inner_i.get() + 1);
            state_i.get("inner");
        });
        // Only the latest child stays subscribed
        for previous in children_o.borrow_mut().drain(..) {
            previous.stop();
        }
        children_o.borrow_mut().push(child);
    });
    assert_eq!((outer_runs.get(), inner_runs.get()), (1, 1));

    state.set("inner", 1);
    assert_eq!((outer_runs.get(), inner_runs.get()), (1, 2));

    state.set("outer", 1);
    assert_eq!((outer_runs.get(), inner_runs.get()), (2, 3));
}

/// Test that an effect writing what it reads does not loop.
#[test]
fn self_mutating_effect_runs_once_per_write() {
    let state = state(Value::record([("count", 0)]));
    let runs = Rc::new(Cell::new(0));

    let (state_clone, runs_clone) = (state.clone(), runs.clone());
    let _effect = effect(move || {
        runs_clone.set(runs_clone.get() + 1);
        let next = count_of(&state_clone) + 1;
        state_clone.set("count", next);
    });
    assert_eq!(runs.get(), 1);
    assert_eq!(count_of(&state), 1);

    state.set("count", 10);
    assert_eq!(runs.get(), 2);
    assert_eq!(count_of(&state), 11);
}

/// Test that a scheduler replaces immediate re-runs and batches writes.
#[test]
fn job_queue_batches_writes() {
    let queue = JobQueue::new();
    let state = state(Value::record([("count", 0)]));
    let seen = Rc::new(RefCell::new(Vec::new()));

    let (state_clone, seen_clone) = (state.clone(), seen.clone());
    let _effect = effect_with(
        move || seen_clone.borrow_mut().push(count_of(&state_clone)),
        EffectOptions {
            scheduler: Some(queue.scheduler()),
            ..EffectOptions::default()
        },
    );

    state.set("count", 1);
    state.set("count", 2);
    state.set("count", 3);
    assert_eq!(*seen.borrow(), vec![0]);

    queue.flush().unwrap();
    assert_eq!(*seen.borrow(), vec![0, 3]);
}

/// Test that runaway re-queueing aborts the flush.
#[test]
fn runaway_flush_is_an_error() {
    let queue = JobQueue::new();
    let state = state(Value::record([("count", 0)]));

    let looping = {
        let (queue, state) = (queue.clone(), state.clone());
        let slot: Rc<RefCell<Option<Effect>>> = Rc::new(RefCell::new(None));
        let slot_clone = slot.clone();
        let effect = effect_with(
            move || {
                let next = count_of(&state) + 1;
                state.set("count", next);
                if let Some(me) = slot_clone.borrow().as_ref() {
                    queue.queue_job(me);
                }
            },
            EffectOptions::new().lazy(),
        );
        *slot.borrow_mut() = Some(effect.clone());
        (effect, slot)
    };

    queue.queue_job(&looping.0);
    let error = queue.flush().unwrap_err();
    assert!(matches!(error, ReactiveError::RecursionLimitExceeded { .. }));
    assert!(error.to_string().contains("maximum recursive updates"));

    looping.1.borrow_mut().take();
}

/// Test that refs are reactive and auto-unwrap inside records.
#[test]
fn refs_track_and_unwrap() {
    let count = boxed(1);
    let holder = state(Value::record([("count", Value::Ref(count.clone()))]));
    let dummy = Rc::new(Cell::new(0));

    let (holder_clone, dummy_clone) = (holder.clone(), dummy.clone());
    let _effect = effect(move || dummy_clone.set(count_of(&holder_clone)));
    assert_eq!(dummy.get(), 1);

    count.set(2);
    assert_eq!(dummy.get(), 2);

    // Writing a plain value goes into the ref
    holder.set("count", 3);
    assert_eq!(count.get(), Value::Int(3));
    assert_eq!(dummy.get(), 3);
}

/// Test that paused tracking creates no dependencies.
#[test]
fn paused_tracking_creates_no_edges() {
    let state = state(Value::record([("count", 0)]));
    let runs = Rc::new(Cell::new(0));

    let (state_clone, runs_clone) = (state.clone(), runs.clone());
    let _effect = effect(move || {
        runs_clone.set(runs_clone.get() + 1);
        untracked(|| count_of(&state_clone));
    });
    state.set("count", 1);
    assert_eq!(runs.get(), 1);

    pause_tracking();
    let state_clone = state.clone();
    let _paused = effect(move || {
        count_of(&state_clone);
    });
    resume_tracking();
    assert_eq!(Runtime::dependent_count(state.id(), &Key::from("count")), 0);
}

/// Test that locked read-only proxies refuse writes with a diagnostic.
#[test]
fn readonly_writes_are_refused() {
    diagnostics::take();
    let raw = Target::record([("count", 0)]);
    let frozen = readonly(Value::Target(raw.clone())).into_observed().expect("proxy");

    assert!(frozen.set("count", 1));
    assert_eq!(raw.get_raw("count"), Some(Value::Int(0)));
    assert!(matches!(
        diagnostics::take().as_slice(),
        [Diagnostic::ReadonlySet { .. }]
    ));

    let computed = derive(|| 1);
    computed.set(2);
    assert_eq!(diagnostics::take(), vec![Diagnostic::ReadonlyComputed]);
}

/// Test that dropping a target releases its bookkeeping.
#[test]
fn dropped_targets_are_forgotten() {
    let id = {
        let state = state(Value::record([("count", 0)]));
        let state_clone = state.clone();
        let watcher = effect(move || {
            count_of(&state_clone);
        });
        assert!(Runtime::is_tracked(state.id()));
        let id = state.id();
        watcher.stop();
        id
    };
    assert!(!Runtime::is_tracked(id));
}

/// Test that a live-but-unreferenced effect does not keep its target alive.
#[test]
fn dropping_state_and_watcher_releases_the_target() {
    let seen = Rc::new(Cell::new(-1));
    let id = {
        let state = state(Value::record([("count", 0)]));
        let (state_clone, seen_clone) = (state.clone(), seen.clone());
        let _watcher = effect(move || seen_clone.set(count_of(&state_clone)));
        assert!(Runtime::is_tracked(state.id()));
        assert_eq!(seen.get(), 0);
        state.id()
    };
    assert!(!Runtime::is_tracked(id));
    assert_eq!(Rc::strong_count(&seen), 1);
}
