//! Computed Implementation
//!
//! A Computed is a cached derived value that re-evaluates only when read
//! after one of its dependencies changed.
//!
//! # How Computed Values Work
//!
//! 1. Construction creates a lazy inner effect over the getter. Nothing is
//!    computed yet and the value starts dirty.
//!
//! 2. Reading while dirty runs the inner effect, which recomputes the cache
//!    and re-collects dependencies, then clears the dirty flag. If the effect
//!    cannot run (the getter reads its own value, or nesting hit the
//!    recursion limit) the flag stays set and the last value, if any, is
//!    served.
//!
//! 3. When a dependency changes, the inner effect's scheduler only sets the
//!    dirty flag. However many sources change, the value recomputes at most
//!    once per read.
//!
//! 4. After every read, the computed's dependency sets are shared with the
//!    effect doing the reading, so `c = derive(|| b.get() + 1)` is invalidated
//!    by whatever `b` reads.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::Rc;

use super::context::ReactiveContext;
use super::effect::{Effect, EffectOptions};
use super::runtime::Runtime;
use crate::diagnostics;
use crate::error::{Diagnostic, ReactiveError};

struct ComputedInner<T> {
    dirty: Rc<Cell<bool>>,
    value: Rc<RefCell<Option<T>>>,
    setter: Option<Box<dyn Fn(T)>>,
    effect: Effect,
}

/// A cached value derived from reactive state.
pub struct Computed<T: Clone + 'static> {
    inner: Rc<ComputedInner<T>>,
}

impl<T: Clone + 'static> Computed<T> {
    /// Create a read-only computed value. The getter does not run until the
    /// first read.
    pub fn new<F>(getter: F) -> Self
    where
        F: Fn() -> T + 'static,
    {
        Self::build(getter, None)
    }

    /// Create a computed value whose writes are forwarded to `setter`.
    pub fn writable<F, S>(getter: F, setter: S) -> Self
    where
        F: Fn() -> T + 'static,
        S: Fn(T) + 'static,
    {
        Self::build(getter, Some(Box::new(setter)))
    }

    fn build<F>(getter: F, setter: Option<Box<dyn Fn(T)>>) -> Self
    where
        F: Fn() -> T + 'static,
    {
        let dirty = Rc::new(Cell::new(true));
        let value: Rc<RefCell<Option<T>>> = Rc::new(RefCell::new(None));

        let cache = Rc::clone(&value);
        let invalidate = Rc::clone(&dirty);
        let effect = Effect::with_options(
            move || {
                let next = getter();
                cache.replace(Some(next));
            },
            EffectOptions::new()
                .lazy()
                .computed()
                .scheduler(move |_| invalidate.set(true)),
        );

        Self {
            inner: Rc::new(ComputedInner {
                dirty,
                value,
                setter,
                effect,
            }),
        }
    }

    /// Get the current value, recomputing if a dependency changed since the
    /// last read.
    ///
    /// Fails only when the value has never been computed and cannot be
    /// computed now.
    pub fn try_get(&self) -> Result<T, ReactiveError> {
        let effect = &self.inner.effect;
        if self.inner.dirty.get() {
            if effect.run() {
                self.inner.dirty.set(false);
            } else if ReactiveContext::contains(effect.id()) {
                diagnostics::emit(Diagnostic::CircularComputed {
                    effect: effect.id(),
                });
            }
        }
        Runtime::track_child_run(effect);

        self.inner
            .value
            .borrow()
            .clone()
            .ok_or_else(|| ReactiveError::ComputedUnavailable {
                effect: effect.id(),
            })
    }

    /// Write through the setter. Read-only computed values refuse the write
    /// with a diagnostic.
    pub fn set(&self, value: T) {
        match &self.inner.setter {
            Some(setter) => setter(value),
            None => diagnostics::emit(Diagnostic::ReadonlyComputed),
        }
    }

    /// The inner effect. Stopping it freezes the cached value.
    pub fn effect(&self) -> &Effect {
        &self.inner.effect
    }

    pub fn is_dirty(&self) -> bool {
        self.inner.dirty.get()
    }

    pub fn is_writable(&self) -> bool {
        self.inner.setter.is_some()
    }

    /// Check if the computed has a cached value.
    pub fn has_value(&self) -> bool {
        self.inner.value.borrow().is_some()
    }

    pub fn ptr_eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }
}

impl<T: Clone + Default + 'static> Computed<T> {
    /// Get the current value. See [`Computed::try_get`]; where that fails,
    /// the failure has been reported as a diagnostic and `T::default()` is
    /// returned.
    pub fn get(&self) -> T {
        self.try_get().unwrap_or_else(|error| {
            tracing::debug!(%error, "computed value unavailable");
            T::default()
        })
    }
}

impl<T: Clone + 'static> Clone for Computed<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl<T> fmt::Debug for Computed<T>
where
    T: Clone + fmt::Debug + 'static,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Computed")
            .field("effect", &self.inner.effect.id())
            .field("dirty", &self.is_dirty())
            .field("writable", &self.is_writable())
            .field("value", &self.inner.value.try_borrow().ok().and_then(|v| v.clone()))
            .finish()
    }
}

/// Create a read-only computed value.
pub fn derive<T, F>(getter: F) -> Computed<T>
where
    T: Clone + 'static,
    F: Fn() -> T + 'static,
{
    Computed::new(getter)
}

/// Create a computed value with a setter.
pub fn derive_writable<T, F, S>(getter: F, setter: S) -> Computed<T>
where
    T: Clone + 'static,
    F: Fn() -> T + 'static,
    S: Fn(T) + 'static,
{
    Computed::writable(getter, setter)
}
