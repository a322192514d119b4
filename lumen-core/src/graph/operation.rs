//! Graph Vocabulary
//!
//! Identifiers, operation kinds and property keys shared by the dependency
//! store and the interception layer.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::observe::Scalar;

/// Stable handle attached to every trackable source (raw targets and refs).
///
/// The dependency store is keyed by this handle instead of by the source
/// itself, so bookkeeping never keeps a source alive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TargetId(u64);

impl TargetId {
    /// Generate a new unique target ID.
    pub fn new() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(0);
        Self(COUNTER.fetch_add(1, Ordering::Relaxed))
    }

    /// Get the raw ID value.
    pub fn raw(&self) -> u64 {
        self.0
    }
}

impl Default for TargetId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for TargetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// The kind of access or mutation that reached a target.
///
/// Reads (`Get`, `Has`, `Iterate`) are tracked; writes (`Set`, `Add`,
/// `Delete`, `Clear`) are triggered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    /// A property or element was read.
    Get,

    /// Key membership was tested.
    Has,

    /// The set of keys was enumerated.
    Iterate,

    /// An existing key received a different value.
    Set,

    /// A key that did not exist was created.
    Add,

    /// An existing key was removed.
    Delete,

    /// The whole container was emptied.
    Clear,
}

impl Operation {
    /// Whether this operation is recorded by `track` rather than `trigger`.
    pub fn is_read(self) -> bool {
        matches!(self, Operation::Get | Operation::Has | Operation::Iterate)
    }

    /// Whether this operation changes which keys exist.
    pub fn changes_shape(self) -> bool {
        matches!(self, Operation::Add | Operation::Delete)
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Operation::Get => "get",
            Operation::Has => "has",
            Operation::Iterate => "iterate",
            Operation::Set => "set",
            Operation::Add => "add",
            Operation::Delete => "delete",
            Operation::Clear => "clear",
        };
        f.write_str(name)
    }
}

/// A property key within one target.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Key {
    /// A named record field, a map key or a set member.
    Field(Scalar),

    /// A sequence position.
    Index(usize),

    /// The reported size of a sequence.
    Length,

    /// Synthetic key standing for "the set of keys" of a non-sequence target.
    Iterate,

    /// Synthetic key standing for the single cell of a ref.
    Value,
}

impl Key {
    /// The key that enumeration of a target depends on.
    pub fn iteration(is_sequence: bool) -> Self {
        if is_sequence {
            Key::Length
        } else {
            Key::Iterate
        }
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Key::Field(scalar) => write!(f, "{scalar}"),
            Key::Index(index) => write!(f, "{index}"),
            Key::Length => f.write_str("length"),
            Key::Iterate => f.write_str("<iterate>"),
            Key::Value => f.write_str("<value>"),
        }
    }
}

impl From<&str> for Key {
    fn from(name: &str) -> Self {
        Key::Field(Scalar::Str(name.to_owned()))
    }
}

impl From<String> for Key {
    fn from(name: String) -> Self {
        Key::Field(Scalar::Str(name))
    }
}

impl From<usize> for Key {
    fn from(index: usize) -> Self {
        Key::Index(index)
    }
}

impl From<i64> for Key {
    fn from(value: i64) -> Self {
        Key::Field(Scalar::Int(value))
    }
}

impl From<bool> for Key {
    fn from(value: bool) -> Self {
        Key::Field(Scalar::Bool(value))
    }
}

impl From<Scalar> for Key {
    fn from(scalar: Scalar) -> Self {
        Key::Field(scalar)
    }
}
