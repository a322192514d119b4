//! Dependency Store
//!
//! Maps a target handle to its per-key dependency sets. The store owns the
//! sets, and edges are weak in both directions: a set refers to its effects
//! weakly and effects refer back to their sets weakly. Neither side keeps the
//! other (or whatever an effect's closure captured) alive.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use indexmap::IndexMap;

use super::operation::{Key, TargetId};
use crate::reactive::{Effect, EffectId, WeakEffect};

/// The set of effects depending on one (target, key) pair.
///
/// Insertion order is preserved so effects are notified in the order they
/// first subscribed. Members are held weakly; an effect whose last handle is
/// dropped leaves every set it belonged to.
pub struct Dep {
    target: TargetId,
    key: Key,
    effects: RefCell<IndexMap<EffectId, WeakEffect>>,
}

impl Dep {
    fn new(target: TargetId, key: Key) -> Rc<Self> {
        Rc::new(Self {
            target,
            key,
            effects: RefCell::new(IndexMap::new()),
        })
    }

    /// The target this set belongs to.
    pub fn target(&self) -> TargetId {
        self.target
    }

    /// The key this set belongs to.
    pub fn key(&self) -> &Key {
        &self.key
    }

    pub fn contains(&self, id: EffectId) -> bool {
        self.effects.borrow().contains_key(&id)
    }

    /// Add an effect. Returns false if it was already a member.
    pub fn insert(&self, effect: &Effect) -> bool {
        let mut effects = self.effects.borrow_mut();
        if effects.contains_key(&effect.id()) {
            return false;
        }
        effects.insert(effect.id(), effect.downgrade());
        true
    }

    /// Remove an effect. Returns false if it was not a member.
    pub fn remove(&self, id: EffectId) -> bool {
        self.effects
            .try_borrow_mut()
            .is_ok_and(|mut effects| effects.shift_remove(&id).is_some())
    }

    /// Snapshot of the members that are still alive.
    pub fn effects(&self) -> Vec<Effect> {
        self.effects
            .borrow()
            .values()
            .filter_map(WeakEffect::upgrade)
            .collect()
    }

    /// Number of live members.
    pub fn len(&self) -> usize {
        self.effects
            .borrow()
            .values()
            .filter(|effect| effect.is_alive())
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl std::fmt::Debug for Dep {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dep")
            .field("target", &self.target)
            .field("key", &self.key)
            .field("len", &self.len())
            .finish()
    }
}

/// Per-target dependency mapping.
pub type KeyToDep = IndexMap<Key, Rc<Dep>>;

/// Registry of every dependency set, keyed by target handle.
#[derive(Debug, Default)]
pub struct DependencyStore {
    targets: HashMap<TargetId, KeyToDep>,
}

impl DependencyStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Locate or create the set for (target, key).
    pub fn dep_for(&mut self, target: TargetId, key: Key) -> Rc<Dep> {
        let deps = self.targets.entry(target).or_default();
        Rc::clone(
            deps.entry(key.clone())
                .or_insert_with(|| Dep::new(target, key)),
        )
    }

    /// The set for (target, key), if anything ever tracked it.
    pub fn get(&self, target: TargetId, key: &Key) -> Option<Rc<Dep>> {
        self.targets.get(&target)?.get(key).cloned()
    }

    /// Every set registered for a target, or `None` if it was never tracked.
    pub fn deps_of(&self, target: TargetId) -> Option<Vec<Rc<Dep>>> {
        self.targets
            .get(&target)
            .map(|deps| deps.values().cloned().collect())
    }

    pub fn contains_target(&self, target: TargetId) -> bool {
        self.targets.contains_key(&target)
    }

    /// Detach a target's mapping. The caller decides when it is dropped.
    pub fn forget(&mut self, target: TargetId) -> Option<KeyToDep> {
        self.targets.remove(&target)
    }

    /// Number of targets with bookkeeping.
    pub fn target_count(&self) -> usize {
        self.targets.len()
    }
}
