//! Reactive Context
//!
//! The reactive context tracks which effect is currently running. When a
//! trackable source is read, the effect on top of the stack becomes one of
//! its dependents.
//!
//! # Implementation
//!
//! A thread-local stack holds the running effects, innermost last. Running an
//! effect pushes it and returns a guard that pops it again on drop, so the
//! stack stays balanced even if the effect body panics.
//!
//! Two more thread-local flags live here:
//!
//! - `tracking`: when paused, reads create no edges for any effect.
//! - `locked`: while set, read-only proxies refuse writes.

use std::cell::{Cell, RefCell};

use super::effect::Effect;
use super::subscriber::EffectId;

thread_local! {
    static CONTEXT_STACK: RefCell<Vec<Effect>> = const { RefCell::new(Vec::new()) };
    static TRACKING: Cell<bool> = const { Cell::new(true) };
    static LOCKED: Cell<bool> = const { Cell::new(true) };
}

/// Guard that pops the running effect when dropped.
pub struct ReactiveContext {
    effect_id: EffectId,
}

impl ReactiveContext {
    /// Push `effect` as the current effect until the guard drops.
    pub fn enter(effect: &Effect) -> Self {
        CONTEXT_STACK.with(|stack| stack.borrow_mut().push(effect.clone()));
        Self {
            effect_id: effect.id(),
        }
    }

    /// Check if any effect is running.
    pub fn is_active() -> bool {
        CONTEXT_STACK.with(|stack| !stack.borrow().is_empty())
    }

    /// The innermost running effect.
    pub fn current() -> Option<Effect> {
        CONTEXT_STACK.with(|stack| stack.borrow().last().cloned())
    }

    /// Whether `id` is anywhere on the stack.
    pub fn contains(id: EffectId) -> bool {
        CONTEXT_STACK.with(|stack| stack.borrow().iter().any(|effect| effect.id() == id))
    }

    /// Number of effects currently running.
    pub fn depth() -> usize {
        CONTEXT_STACK.with(|stack| stack.borrow().len())
    }
}

impl Drop for ReactiveContext {
    fn drop(&mut self) {
        let popped = CONTEXT_STACK
            .try_with(|stack| stack.borrow_mut().pop())
            .ok()
            .flatten();

        // Verify we're popping the right context.
        if let Some(effect) = popped {
            debug_assert_eq!(
                effect.id(),
                self.effect_id,
                "ReactiveContext mismatch: expected {:?}, got {:?}",
                self.effect_id,
                effect.id()
            );
        }
    }
}

/// Stop recording dependencies on this thread.
pub fn pause_tracking() {
    TRACKING.with(|tracking| tracking.set(false));
}

/// Resume recording dependencies on this thread.
pub fn resume_tracking() {
    TRACKING.with(|tracking| tracking.set(true));
}

/// Whether reads currently create dependency edges.
pub fn is_tracking() -> bool {
    TRACKING.with(Cell::get)
}

/// Run `f` without recording dependencies, restoring the previous state after.
pub fn untracked<R>(f: impl FnOnce() -> R) -> R {
    struct Restore(bool);

    impl Drop for Restore {
        fn drop(&mut self) {
            let _ = TRACKING.try_with(|tracking| tracking.set(self.0));
        }
    }

    let _restore = Restore(TRACKING.with(|tracking| tracking.replace(false)));
    f()
}

/// Re-enable read-only protection.
pub fn lock() {
    LOCKED.with(|locked| locked.set(true));
}

/// Let read-only proxies accept writes until [`lock`] is called.
pub fn unlock() {
    LOCKED.with(|locked| locked.set(false));
}

/// Whether read-only proxies currently refuse writes.
pub fn is_locked() -> bool {
    LOCKED.with(Cell::get)
}
