//! Effect Implementation
//!
//! An Effect is a computation that re-runs whenever the reactive state it
//! read last time changes.
//!
//! # How Effects Work
//!
//! 1. When created, the effect runs its function immediately (unless lazy)
//!    to establish initial dependencies.
//!
//! 2. Before every run, the effect removes itself from every dependency set
//!    it joined previously. Reads during the run re-establish exactly the
//!    edges the current run needs, so branches no longer taken stop
//!    triggering it.
//!
//! 3. When a dependency changes, the effect's `scheduler` is called if it has
//!    one; otherwise the effect re-runs synchronously.
//!
//! 4. An effect that is already running is never re-entered. This is what
//!    keeps an effect that writes to state it reads from looping.
//!
//! # Stopping
//!
//! [`Effect::stop`] severs every edge, fires `on_stop`, and marks the effect
//! inactive. An inactive effect is never triggered again; calling
//! [`Effect::run`] on it just calls the function without tracking.
//!
//! # Ownership
//!
//! [`Effect`] handles own the effect. Dependency sets only hold weak
//! references, so dropping the last handle ends the effect as if it had
//! been stopped, minus `on_stop`.

use std::cell::{Cell, RefCell};
use std::rc::{Rc, Weak};

use smallvec::SmallVec;

use super::context::ReactiveContext;
use super::subscriber::{EffectId, TrackEvent};
use crate::config;
use crate::diagnostics;
use crate::error::Diagnostic;
use crate::graph::Dep;

/// Substitute for immediate re-execution, e.g. a job queue.
pub type Scheduler = Rc<dyn Fn(&Effect)>;

/// Debugger hook receiving track or trigger events.
pub type DebugHook = Rc<dyn Fn(&TrackEvent)>;

/// Options accepted by [`effect_with`].
#[derive(Clone, Default)]
pub struct EffectOptions {
    /// Do not run on creation.
    pub lazy: bool,

    /// Marks the inner effect of a computed value. Computed effects are
    /// dispatched before plain effects in a trigger pass.
    pub computed: bool,

    pub scheduler: Option<Scheduler>,
    pub on_track: Option<DebugHook>,
    pub on_trigger: Option<DebugHook>,
    pub on_stop: Option<Rc<dyn Fn()>>,
}

impl EffectOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn lazy(mut self) -> Self {
        self.lazy = true;
        self
    }

    pub fn computed(mut self) -> Self {
        self.computed = true;
        self
    }

    pub fn scheduler(mut self, scheduler: impl Fn(&Effect) + 'static) -> Self {
        self.scheduler = Some(Rc::new(scheduler));
        self
    }

    pub fn on_track(mut self, hook: impl Fn(&TrackEvent) + 'static) -> Self {
        self.on_track = Some(Rc::new(hook));
        self
    }

    pub fn on_trigger(mut self, hook: impl Fn(&TrackEvent) + 'static) -> Self {
        self.on_trigger = Some(Rc::new(hook));
        self
    }

    pub fn on_stop(mut self, hook: impl Fn() + 'static) -> Self {
        self.on_stop = Some(Rc::new(hook));
        self
    }
}

impl std::fmt::Debug for EffectOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EffectOptions")
            .field("lazy", &self.lazy)
            .field("computed", &self.computed)
            .field("scheduler", &self.scheduler.is_some())
            .field("on_track", &self.on_track.is_some())
            .field("on_trigger", &self.on_trigger.is_some())
            .field("on_stop", &self.on_stop.is_some())
            .finish()
    }
}

struct EffectInner {
    id: EffectId,
    run: Rc<dyn Fn()>,
    active: Cell<bool>,
    /// Dependency sets this effect currently belongs to.
    deps: RefCell<SmallVec<[Weak<Dep>; 4]>>,
    options: EffectOptions,
    run_count: Cell<usize>,
}

impl Drop for EffectInner {
    fn drop(&mut self) {
        for dep in self.deps.get_mut().drain(..).filter_map(|dep| dep.upgrade()) {
            dep.remove(self.id);
        }
    }
}

/// Handle to a tracked computation.
///
/// Cloning the handle shares the same effect. The effect lives as long as
/// some handle does; keep one for as long as it should react.
#[derive(Clone)]
pub struct Effect {
    inner: Rc<EffectInner>,
}

/// Non-owning reference to an effect, as held by dependency sets.
pub(crate) struct WeakEffect {
    inner: Weak<EffectInner>,
}

impl WeakEffect {
    pub(crate) fn upgrade(&self) -> Option<Effect> {
        self.inner.upgrade().map(|inner| Effect { inner })
    }

    pub(crate) fn is_alive(&self) -> bool {
        self.inner.strong_count() > 0
    }
}

impl Effect {
    /// Create an effect and run it once.
    pub fn new<F>(run: F) -> Self
    where
        F: Fn() + 'static,
    {
        Self::with_options(run, EffectOptions::default())
    }

    /// Create an effect with explicit options.
    pub fn with_options<F>(run: F, options: EffectOptions) -> Self
    where
        F: Fn() + 'static,
    {
        Self::from_raw(Rc::new(run), options)
    }

    fn from_raw(run: Rc<dyn Fn()>, options: EffectOptions) -> Self {
        let lazy = options.lazy;
        let effect = Self {
            inner: Rc::new(EffectInner {
                id: EffectId::new(),
                run,
                active: Cell::new(true),
                deps: RefCell::new(SmallVec::new()),
                options,
                run_count: Cell::new(0),
            }),
        };
        tracing::debug!(effect = %effect.id(), lazy, computed = effect.is_computed(), "effect created");

        if !lazy {
            effect.run();
        }
        effect
    }

    pub fn id(&self) -> EffectId {
        self.inner.id
    }

    /// The wrapped function, shared with this effect.
    pub fn raw(&self) -> Rc<dyn Fn()> {
        Rc::clone(&self.inner.run)
    }

    pub fn is_active(&self) -> bool {
        self.inner.active.get()
    }

    pub fn is_computed(&self) -> bool {
        self.inner.options.computed
    }

    /// Number of tracked runs so far.
    pub fn run_count(&self) -> usize {
        self.inner.run_count.get()
    }

    /// Number of dependency sets this effect currently belongs to.
    pub fn dependency_count(&self) -> usize {
        self.inner
            .deps
            .borrow()
            .iter()
            .filter(|dep| dep.strong_count() > 0)
            .count()
    }

    /// Execute the effect, re-collecting its dependencies.
    ///
    /// Returns false if the body was not called: the effect is already
    /// running further up the stack, or nesting reached the recursion limit.
    pub fn run(&self) -> bool {
        if !self.is_active() {
            (self.inner.run)();
            return true;
        }
        if ReactiveContext::contains(self.id()) {
            return false;
        }

        let limit = config::recursion_limit();
        if ReactiveContext::depth() >= limit {
            diagnostics::emit(Diagnostic::RecursionLimit {
                effect: self.id(),
                limit,
            });
            return false;
        }

        self.cleanup();
        let _ctx = ReactiveContext::enter(self);
        self.inner.run_count.set(self.inner.run_count.get() + 1);
        (self.inner.run)();
        true
    }

    /// Stop the effect permanently. Calling this more than once is a no-op.
    pub fn stop(&self) {
        if !self.is_active() {
            return;
        }
        self.cleanup();
        if let Some(on_stop) = &self.inner.options.on_stop {
            on_stop();
        }
        self.inner.active.set(false);
        tracing::debug!(effect = %self.id(), "effect stopped");
    }

    /// Remove this effect from every dependency set it belongs to.
    pub(crate) fn cleanup(&self) {
        let deps = std::mem::take(&mut *self.inner.deps.borrow_mut());
        for dep in deps.iter().filter_map(Weak::upgrade) {
            dep.remove(self.id());
        }
    }

    pub(crate) fn downgrade(&self) -> WeakEffect {
        WeakEffect {
            inner: Rc::downgrade(&self.inner),
        }
    }

    /// Record the reverse edge for a set this effect just joined.
    pub(crate) fn add_dep(&self, dep: &Rc<Dep>) {
        self.inner.deps.borrow_mut().push(Rc::downgrade(dep));
    }

    /// Live dependency sets, in the order they were joined.
    pub(crate) fn deps(&self) -> Vec<Rc<Dep>> {
        self.inner
            .deps
            .borrow()
            .iter()
            .filter_map(Weak::upgrade)
            .collect()
    }

    /// Hand the effect to its scheduler, or run it now.
    pub(crate) fn schedule(&self) {
        match &self.inner.options.scheduler {
            Some(scheduler) => scheduler(self),
            None => {
                self.run();
            }
        }
    }

    pub(crate) fn has_on_trigger(&self) -> bool {
        self.inner.options.on_trigger.is_some()
    }

    pub(crate) fn notify_track(&self, event: &TrackEvent) {
        if let Some(hook) = &self.inner.options.on_track {
            hook(event);
        }
    }

    pub(crate) fn notify_trigger(&self, event: &TrackEvent) {
        if let Some(hook) = &self.inner.options.on_trigger {
            hook(event);
        }
    }
}

impl PartialEq for Effect {
    fn eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }
}

impl Eq for Effect {}

impl std::fmt::Debug for Effect {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Effect")
            .field("id", &self.id())
            .field("active", &self.is_active())
            .field("computed", &self.is_computed())
            .field("run_count", &self.run_count())
            .field("dependency_count", &self.dependency_count())
            .finish()
    }
}

/// Create an effect and run it once.
pub fn effect<F>(run: F) -> Effect
where
    F: Fn() + 'static,
{
    Effect::new(run)
}

/// Create an effect with explicit options.
pub fn effect_with<F>(run: F, options: EffectOptions) -> Effect
where
    F: Fn() + 'static,
{
    Effect::with_options(run, options)
}

/// Create a new effect over the body of an existing one.
pub fn effect_from(existing: &Effect, options: EffectOptions) -> Effect {
    Effect::from_raw(existing.raw(), options)
}

/// Stop an effect. See [`Effect::stop`].
pub fn stop(effect: &Effect) {
    effect.stop();
}
