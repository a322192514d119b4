//! Observable Values
//!
//! This module turns plain structured data into observable state.
//!
//! # Concepts
//!
//! ## Targets
//!
//! A [`Target`] is a raw record, sequence, map or set. It carries a stable
//! [`TargetId`](crate::graph::TargetId) that the dependency store is keyed
//! by, so bookkeeping never keeps a target alive.
//!
//! ## Proxies
//!
//! An [`Observed`] proxy wraps a target in one of two [`Mode`]s. Reads
//! through the proxy are tracked and writes are triggered. For each
//! (target, mode) pair at most one proxy is alive at a time, so wrapping is
//! idempotent:
//!
//! ```rust,ignore
//! let state = reactive(Value::record([("count", 0)]));
//! assert_eq!(reactive(state.clone()), state);
//! ```
//!
//! A read-only proxy never wraps a mutable proxy; it wraps the raw target.
//! Asking for a mutable proxy of a read-only one returns the read-only proxy.

mod identity;
mod json;
mod proxy;
mod value;

pub use proxy::{Mode, Observed};
pub use value::{Container, ContainerKind, Scalar, Target, Value};

use crate::config;
use crate::diagnostics;
use crate::error::Diagnostic;

/// Wrap a structured value in a proxy of the given mode.
///
/// Primitives, refs and targets marked non-reactive come back unchanged
/// (with a diagnostic when `dev_diagnostics` is on).
pub fn observe(value: impl Into<Value>, mode: Mode) -> Value {
    let value = value.into();
    let observable = match &value {
        Value::Target(target) => !target.is_non_reactive(),
        Value::Observed(_) => true,
        _ => false,
    };
    if !observable {
        if config::dev_diagnostics() {
            diagnostics::emit(Diagnostic::NotObservable {
                value: value.to_string(),
            });
        }
        return value;
    }
    wrap_nested(value, mode)
}

/// Mutable proxy of a structured value.
pub fn reactive(value: impl Into<Value>) -> Value {
    observe(value, Mode::Mutable)
}

/// Read-only proxy of a structured value.
pub fn readonly(value: impl Into<Value>) -> Value {
    observe(value, Mode::Readonly)
}

/// Wrap without diagnostics. Used for values read out of a proxy.
pub(crate) fn wrap_nested(value: Value, mode: Mode) -> Value {
    match value {
        Value::Target(target) if target.is_non_reactive() => Value::Target(target),
        Value::Target(target) => {
            let mode = if target.is_marked_readonly() {
                Mode::Readonly
            } else {
                mode
            };
            Value::Observed(Observed::wrap(target, mode))
        }
        Value::Observed(observed) if observed.mode() == Mode::Mutable && mode == Mode::Readonly => {
            Value::Observed(Observed::wrap(observed.raw(), Mode::Readonly))
        }
        other => other,
    }
}

/// The raw target behind a proxy; anything else is returned as-is.
pub fn to_raw(value: &Value) -> Value {
    value.clone().into_raw()
}

/// Whether the value is a proxy of either mode.
pub fn is_reactive(value: &Value) -> bool {
    matches!(value, Value::Observed(_))
}

pub fn is_readonly(value: &Value) -> bool {
    value.as_observed().is_some_and(Observed::is_readonly)
}

fn underlying(value: &Value) -> Option<Target> {
    match value {
        Value::Target(target) => Some(target.clone()),
        Value::Observed(observed) => Some(observed.raw()),
        _ => None,
    }
}

/// Make every future mutable wrap of this target read-only instead.
pub fn mark_readonly(value: Value) -> Value {
    if let Some(target) = underlying(&value) {
        target.mark_readonly();
    }
    value
}

/// Exclude this target from wrapping altogether.
pub fn mark_non_reactive(value: Value) -> Value {
    if let Some(target) = underlying(&value) {
        target.mark_non_reactive();
    }
    value
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{configure, RuntimeConfig};

    #[test]
    fn wrapping_is_idempotent() {
        let raw = Value::record([("count", 0)]);
        let first = reactive(raw.clone());
        assert_eq!(reactive(raw.clone()), first);
        assert_eq!(reactive(first.clone()), first);

        let frozen = readonly(raw);
        assert_eq!(readonly(frozen.clone()), frozen);
        assert_ne!(frozen, first);
    }

    #[test]
    fn readonly_wraps_the_raw_target() {
        let raw = Value::list([1, 2]);
        let mutable = reactive(raw.clone());
        let frozen = readonly(mutable.clone());

        assert_eq!(to_raw(&frozen), raw);
        assert_eq!(to_raw(&mutable), raw);
        assert!(is_readonly(&frozen));

        // Mutable wrapping cannot unlock a read-only proxy
        assert_eq!(reactive(frozen.clone()), frozen);
    }

    #[test]
    fn primitives_are_returned_unchanged() {
        configure(RuntimeConfig {
            dev_diagnostics: true,
            ..RuntimeConfig::default()
        });
        diagnostics::take();

        assert_eq!(reactive(5), Value::Int(5));
        assert!(!is_reactive(&reactive("text")));
        assert_eq!(diagnostics::take().len(), 2);

        configure(RuntimeConfig {
            dev_diagnostics: false,
            ..RuntimeConfig::default()
        });
        reactive(5);
        assert!(diagnostics::take().is_empty());
        configure(RuntimeConfig::default());
    }

    #[test]
    fn markers_change_wrapping() {
        let frozen_raw = mark_readonly(Value::record([("a", 1)]));
        assert!(is_readonly(&reactive(frozen_raw)));

        let opaque = mark_non_reactive(Value::map([("k", 1)]));
        assert!(!is_reactive(&reactive(opaque.clone())));

        let parent = reactive(Value::record([("child", opaque)]));
        let child = parent.as_observed().map(|p| p.get("child"));
        assert!(child.is_some_and(|c| c.as_target().is_some()));
    }
}
