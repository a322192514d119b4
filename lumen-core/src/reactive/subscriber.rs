//! Subscriber identity and debugger events.
//!
//! Every effect (plain or computed) gets an [`EffectId`]. Debug hooks receive
//! a [`TrackEvent`] describing the edge that was created or the change that
//! fired.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::graph::{Key, Operation, TargetId};
use crate::observe::Value;

/// Unique identifier for an effect.
///
/// Dependency sets are keyed by this ID, which makes re-tracking the same
/// effect on the same key a no-op.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EffectId(u64);

impl EffectId {
    /// Generate a new unique effect ID.
    pub fn new() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(0);
        Self(COUNTER.fetch_add(1, Ordering::Relaxed))
    }
}

impl Default for EffectId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for EffectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "effect#{}", self.0)
    }
}

/// Old and new values attached to a trigger, when known.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Change {
    pub old_value: Option<Value>,
    pub new_value: Option<Value>,
}

impl Change {
    /// No value information.
    pub fn none() -> Self {
        Self::default()
    }

    pub fn new(old_value: Option<Value>, new_value: Option<Value>) -> Self {
        Self {
            old_value,
            new_value,
        }
    }
}

/// Payload passed to `on_track` and `on_trigger` hooks.
#[derive(Debug, Clone, PartialEq)]
pub struct TrackEvent {
    pub effect: EffectId,
    pub target: TargetId,
    pub operation: Operation,
    pub key: Option<Key>,
    pub change: Change,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn effect_ids_are_unique() {
        let id1 = EffectId::new();
        let id2 = EffectId::new();
        let id3 = EffectId::new();

        assert_ne!(id1, id2);
        assert_ne!(id2, id3);
        assert_ne!(id1, id3);
    }

    #[test]
    fn change_none_is_empty() {
        let change = Change::none();
        assert!(change.old_value.is_none());
        assert!(change.new_value.is_none());
    }
}
