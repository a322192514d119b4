//! Observed Proxies
//!
//! An [`Observed`] wraps one raw [`Target`] in a [`Mode`]. Every access goes
//! through an explicit accessor that records or notifies dependencies:
//!
//! | accessor                 | tracks                    | triggers                |
//! |--------------------------|---------------------------|-------------------------|
//! | `get`                    | `Get` on the key          |                         |
//! | `has`                    | `Has` on the key          |                         |
//! | `keys`, `len`, `entries` | the iteration key         |                         |
//! | `set`                    |                           | `Add` or `Set`          |
//! | `delete`, `pop`          |                           | `Delete`                |
//! | `add`                    |                           | `Add`                   |
//! | `clear`                  |                           | `Clear`                 |
//!
//! Sequences use `length` as their iteration key; every other container uses
//! the synthetic [`Key::Iterate`].
//!
//! Nested containers are wrapped on access, in the parent's mode. Refs held
//! by records and maps are unwrapped on read; sequences hand them out as-is.
//! In every container, a plain value written over a ref is stored into the
//! ref instead.
//!
//! Sequences grow by padding with nulls, up to
//! [`RuntimeConfig::max_sequence_len`](crate::RuntimeConfig::max_sequence_len).

use std::fmt;
use std::rc::{Rc, Weak};

use super::identity;
use super::value::{Container, ContainerKind, Scalar, Target, Value};
use crate::config;
use crate::diagnostics;
use crate::error::Diagnostic;
use crate::graph::{Key, Operation, TargetId};
use crate::reactive::{self, Change, Runtime};

/// Access mode of a proxy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Mode {
    Mutable,
    Readonly,
}

pub(crate) struct ObservedInner {
    target: Target,
    mode: Mode,
}

/// An intercepting handle over a raw target.
///
/// Two `Observed` values are equal only if they are the same proxy.
#[derive(Clone)]
pub struct Observed {
    inner: Rc<ObservedInner>,
}

impl Observed {
    /// The cached proxy for (target, mode), creating it if needed.
    pub(crate) fn wrap(target: Target, mode: Mode) -> Self {
        if let Some(existing) = identity::lookup(target.id(), mode) {
            return existing;
        }
        let observed = Self {
            inner: Rc::new(ObservedInner { target, mode }),
        };
        identity::insert(&observed);
        tracing::trace!(target_id = %observed.id(), ?mode, "proxy created");
        observed
    }

    pub(super) fn from_inner(inner: Rc<ObservedInner>) -> Self {
        Self { inner }
    }

    pub(super) fn downgrade(&self) -> Weak<ObservedInner> {
        Rc::downgrade(&self.inner)
    }

    pub fn mode(&self) -> Mode {
        self.inner.mode
    }

    pub fn is_readonly(&self) -> bool {
        self.inner.mode == Mode::Readonly
    }

    /// The wrapped target.
    pub fn raw(&self) -> Target {
        self.inner.target.clone()
    }

    pub fn id(&self) -> TargetId {
        self.inner.target.id()
    }

    pub fn kind(&self) -> ContainerKind {
        self.inner.target.kind()
    }

    /// Read a property.
    ///
    /// Missing keys and keys the container has no room for read as null.
    pub fn get(&self, key: impl Into<Key>) -> Value {
        let Some(key) = self.normalize(key.into()) else {
            return Value::Null;
        };
        let value = self.read(&key).unwrap_or_default();
        self.present(value)
    }

    /// Tracked lookup through the prototype chain, before unwrapping.
    pub(crate) fn read(&self, key: &Key) -> Option<Value> {
        Runtime::track(self.id(), Operation::Get, key.clone());
        lookup(&self.inner.target, key)
    }

    /// Write a property. Returns false if the container cannot hold the key.
    pub fn set(&self, key: impl Into<Key>, value: impl Into<Value>) -> bool {
        let receiver = self.inner.target.clone();
        self.set_with_receiver(key.into(), value.into(), &receiver)
    }

    /// Write as if the assignment started at `receiver`, a record whose
    /// prototype chain reaches this proxy. The value is stored on the
    /// receiver and this proxy notifies nobody.
    pub fn set_with_receiver(&self, key: Key, value: Value, receiver: &Target) -> bool {
        if self.refuses_writes() {
            diagnostics::emit(Diagnostic::ReadonlySet {
                target: self.id(),
                key,
            });
            return true;
        }
        let target = &self.inner.target;
        if target.kind() == ContainerKind::Set {
            self.unsupported("set");
            return false;
        }
        let Some(key) = self.normalize(key) else {
            self.unsupported("set");
            return false;
        };
        let value = value.into_raw();
        if let Some(len) = self.required_len(&key, &value) {
            let limit = config::max_sequence_len();
            if len > limit {
                diagnostics::emit(Diagnostic::SequenceTooLong {
                    target: self.id(),
                    len,
                    limit,
                });
                return false;
            }
        }

        if !value.is_ref() {
            if let Some(Value::Ref(cell)) = lookup_raw(target, &key) {
                cell.set(value);
                return true;
            }
        }

        let is_receiver = receiver.ptr_eq(target);
        let had_key = target.with_data(|data| data.has(&key));

        if !had_key {
            if let Some(Value::Observed(parent)) = target.prototype() {
                parent.set_with_receiver(key.clone(), value.clone(), receiver);
                if is_receiver && target.with_data(|data| data.has(&key)) {
                    Runtime::trigger(
                        self.id(),
                        Operation::Add,
                        Some(key),
                        Change::new(None, Some(value)),
                    );
                }
                return true;
            }
        }

        if !is_receiver {
            receiver.with_data_mut(|data| {
                if let Some(key) = data.normalize(key) {
                    data.store(&key, value);
                }
            });
            return true;
        }

        let previous = target.with_data_mut(|data| data.store(&key, value.clone()));
        self.notify_write(key, had_key, previous, value);
        true
    }

    fn notify_write(&self, key: Key, had_key: bool, previous: Option<Value>, value: Value) {
        let id = self.id();
        if key == Key::Length {
            let old_len = previous.and_then(|len| len.as_int()).unwrap_or_default();
            let new_len = self.inner.target.len() as i64;
            if old_len == new_len {
                return;
            }
            Runtime::trigger(
                id,
                Operation::Set,
                Some(Key::Length),
                Change::new(Some(Value::Int(old_len)), Some(Value::Int(new_len))),
            );
            // Truncated positions are gone; readers of them must re-run.
            for index in new_len..old_len {
                Runtime::trigger(
                    id,
                    Operation::Set,
                    Some(Key::Index(index as usize)),
                    Change::none(),
                );
            }
            return;
        }

        if !had_key {
            Runtime::trigger(id, Operation::Add, Some(key), Change::new(None, Some(value)));
        } else if previous.as_ref() != Some(&value) {
            Runtime::trigger(id, Operation::Set, Some(key), Change::new(previous, Some(value)));
        }
    }

    /// Whether the key exists, on the target or along its prototype chain.
    pub fn has(&self, key: impl Into<Key>) -> bool {
        let Some(key) = self.normalize(key.into()) else {
            return false;
        };
        Runtime::track(self.id(), Operation::Has, key.clone());
        let target = &self.inner.target;
        if target.with_data(|data| data.has(&key)) {
            return true;
        }
        match target.prototype() {
            Some(Value::Observed(parent)) => parent.has(key),
            Some(Value::Target(parent)) => lookup_raw(&parent, &key).is_some(),
            _ => false,
        }
    }

    /// Remove a key. Returns whether it existed.
    ///
    /// Deleting a sequence element leaves a null hole; later positions do
    /// not move.
    pub fn delete(&self, key: impl Into<Key>) -> bool {
        let key = key.into();
        if self.refuses_writes() {
            diagnostics::emit(Diagnostic::ReadonlyDelete {
                target: self.id(),
                key,
            });
            return true;
        }
        let key = match self.normalize(key) {
            Some(Key::Length) | None => {
                self.unsupported("delete");
                return false;
            }
            Some(key) => key,
        };

        let removed = self.inner.target.with_data_mut(|data| {
            if data.has(&key) {
                data.remove(&key)
            } else {
                None
            }
        });
        match removed {
            Some(old) => {
                Runtime::trigger(self.id(), Operation::Delete, Some(key), Change::new(Some(old), None));
                true
            }
            None => false,
        }
    }

    fn iteration_key(&self) -> Key {
        Key::iteration(self.kind() == ContainerKind::List)
    }

    fn track_iteration(&self) {
        let key = self.iteration_key();
        let operation = if key == Key::Length {
            Operation::Get
        } else {
            Operation::Iterate
        };
        Runtime::track(self.id(), operation, key);
    }

    /// Own keys in order.
    pub fn keys(&self) -> Vec<Key> {
        self.track_iteration();
        self.inner.target.with_data(Container::keys)
    }

    pub fn len(&self) -> usize {
        self.track_iteration();
        self.inner.target.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Own `(key, value)` pairs, each read as by [`Observed::get`].
    pub fn entries(&self) -> Vec<(Key, Value)> {
        self.keys()
            .into_iter()
            .map(|key| {
                let value = self.get(key.clone());
                (key, value)
            })
            .collect()
    }

    /// Append to a sequence and return the new length.
    pub fn push(&self, value: impl Into<Value>) -> usize {
        let target = &self.inner.target;
        if target.kind() != ContainerKind::List {
            self.unsupported("push");
            return target.len();
        }
        let len = target.len();
        if self.refuses_writes() {
            diagnostics::emit(Diagnostic::ReadonlySet {
                target: self.id(),
                key: Key::Index(len),
            });
            return len;
        }
        if !self.set(Key::Index(len), value) {
            return target.len();
        }
        // Already equal after the append, so this is silent.
        self.set(Key::Length, Value::Int(len as i64 + 1));
        target.len()
    }

    /// Remove and return the last element of a sequence.
    pub fn pop(&self) -> Value {
        let target = &self.inner.target;
        if target.kind() != ContainerKind::List {
            self.unsupported("pop");
            return Value::Null;
        }
        let Some(index) = target.len().checked_sub(1) else {
            return Value::Null;
        };
        if self.refuses_writes() {
            diagnostics::emit(Diagnostic::ReadonlyDelete {
                target: self.id(),
                key: Key::Index(index),
            });
            return self.present(target.get_raw(index).unwrap_or_default());
        }

        let removed = target.with_data_mut(|data| match data {
            Container::List(items) => items.pop(),
            _ => None,
        });
        Runtime::trigger(
            self.id(),
            Operation::Delete,
            Some(Key::Index(index)),
            Change::new(removed.clone(), None),
        );
        self.present(removed.unwrap_or_default())
    }

    /// Resize a sequence, padding with nulls.
    pub fn set_len(&self, len: usize) -> bool {
        if self.kind() != ContainerKind::List {
            self.unsupported("set_len");
            return false;
        }
        self.set(Key::Length, Value::Int(len as i64))
    }

    /// Insert a set member. Returns false if it was already present.
    pub fn add(&self, member: impl Into<Scalar>) -> bool {
        let member = member.into();
        let key = Key::Field(member.clone());
        if self.refuses_writes() {
            diagnostics::emit(Diagnostic::ReadonlySet {
                target: self.id(),
                key,
            });
            return true;
        }
        if self.kind() != ContainerKind::Set {
            self.unsupported("add");
            return false;
        }

        let inserted = self
            .inner
            .target
            .with_data_mut(|data| data.store(&key, Value::Null).is_none());
        if inserted {
            Runtime::trigger(
                self.id(),
                Operation::Add,
                Some(key),
                Change::new(None, Some(Value::from(member))),
            );
        }
        inserted
    }

    /// Empty a map or set.
    pub fn clear(&self) {
        if self.refuses_writes() {
            diagnostics::emit(Diagnostic::ReadonlyDelete {
                target: self.id(),
                key: Key::Iterate,
            });
            return;
        }
        if !matches!(self.kind(), ContainerKind::Map | ContainerKind::Set) {
            self.unsupported("clear");
            return;
        }

        let old = self.inner.target.with_data_mut(Container::take);
        if !old.is_empty() {
            Runtime::trigger(self.id(), Operation::Clear, None, Change::none());
        }
    }

    /// The sequence length a write of `value` at `key` would produce, if it
    /// grows the sequence.
    fn required_len(&self, key: &Key, value: &Value) -> Option<usize> {
        if self.kind() != ContainerKind::List {
            return None;
        }
        let len = match key {
            Key::Index(index) => index.saturating_add(1),
            Key::Length => value.as_int().and_then(|n| usize::try_from(n).ok())?,
            _ => return None,
        };
        (len > self.inner.target.len()).then_some(len)
    }

    fn normalize(&self, key: Key) -> Option<Key> {
        self.inner.target.with_data(|data| data.normalize(key))
    }

    fn refuses_writes(&self) -> bool {
        self.is_readonly() && reactive::is_locked()
    }

    fn unsupported(&self, operation: &'static str) {
        diagnostics::emit(Diagnostic::UnsupportedOperation {
            target: self.id(),
            kind: self.kind(),
            operation,
        });
    }

    /// Unwrap refs (not for sequences) and wrap nested containers in this
    /// proxy's mode.
    fn present(&self, value: Value) -> Value {
        let value = match value {
            Value::Ref(cell) if self.kind() != ContainerKind::List => cell.get(),
            other => other,
        };
        super::wrap_nested(value, self.inner.mode)
    }
}

/// Own value, else the nearest prototype's. Observed prototypes track the
/// read on their own target.
fn lookup(target: &Target, key: &Key) -> Option<Value> {
    if let Some(value) = target.with_data(|data| data.get(key)) {
        return Some(value);
    }
    match target.prototype()? {
        Value::Observed(parent) => parent.read(key),
        Value::Target(parent) => lookup(&parent, key),
        _ => None,
    }
}

/// Like [`lookup`], without tracking.
fn lookup_raw(target: &Target, key: &Key) -> Option<Value> {
    if let Some(value) = target.with_data(|data| data.get(key)) {
        return Some(value);
    }
    match target.prototype()? {
        Value::Observed(parent) => lookup_raw(&parent.raw(), key),
        Value::Target(parent) => lookup_raw(&parent, key),
        _ => None,
    }
}

impl PartialEq for Observed {
    fn eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }
}

impl Eq for Observed {}

impl fmt::Debug for Observed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Observed")
            .field("target", &self.inner.target)
            .field("mode", &self.inner.mode)
            .finish()
    }
}
