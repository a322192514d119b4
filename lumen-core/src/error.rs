//! Error Types
//!
//! Two tiers of failure exist:
//!
//! - [`ReactiveError`] is a hard failure returned to the host.
//! - [`Diagnostic`] is a soft failure. The offending operation is swallowed
//!   and the diagnostic is logged (see [`crate::diagnostics`]).

use thiserror::Error;

use crate::graph::{Key, TargetId};
use crate::observe::ContainerKind;
use crate::reactive::EffectId;

/// A failure that aborts the current operation.
#[derive(Debug, Error)]
pub enum ReactiveError {
    /// A job kept re-queueing itself during one flush.
    #[error(
        "maximum recursive updates exceeded: effect {effect} was queued more than {limit} times \
         in one flush; it is probably mutating state that it also reads"
    )]
    RecursionLimitExceeded { effect: EffectId, limit: usize },

    /// A computed value was read before it could ever be evaluated, e.g. from
    /// inside its own getter.
    #[error("computed value (effect {effect}) has no value yet and cannot be evaluated here")]
    ComputedUnavailable { effect: EffectId },

    /// A runtime configuration document could not be parsed.
    #[error("invalid runtime configuration: {0}")]
    Config(#[from] serde_json::Error),
}

/// A non-fatal problem. The operation that caused it was refused or ignored.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum Diagnostic {
    #[error("set operation on key \"{key}\" failed: target {target} is readonly")]
    ReadonlySet { target: TargetId, key: Key },

    #[error("delete operation on key \"{key}\" failed: target {target} is readonly")]
    ReadonlyDelete { target: TargetId, key: Key },

    #[error("write operation failed: computed value is readonly")]
    ReadonlyComputed,

    #[error("value cannot be made reactive: {value}")]
    NotObservable { value: String },

    #[error("`{operation}` is not supported on {kind} target {target}")]
    UnsupportedOperation {
        target: TargetId,
        kind: ContainerKind,
        operation: &'static str,
    },

    #[error("write refused: sequence {target} would grow to {len} elements, limit is {limit}")]
    SequenceTooLong {
        target: TargetId,
        len: usize,
        limit: usize,
    },

    #[error("computed value read itself while evaluating (effect {effect})")]
    CircularComputed { effect: EffectId },

    #[error("effect {effect} was not run: nested effect depth reached {limit}")]
    RecursionLimit { effect: EffectId, limit: usize },
}

impl Diagnostic {
    /// Whether this diagnostic should be logged at error level.
    pub fn is_severe(&self) -> bool {
        matches!(self, Diagnostic::RecursionLimit { .. })
    }
}
