//! Ref Implementation
//!
//! A Ref is a reactive single-value box. It makes primitives observable,
//! since only structured values can be wrapped in a proxy.
//!
//! # How Refs Work
//!
//! 1. Every cell ref has its own [`TargetId`]. Reads track the synthetic
//!    [`Key::Value`] on that handle; writes trigger it.
//!
//! 2. Structured values are wrapped in a mutable proxy on the way in, so
//!    `r.get()` of a ref holding a record yields an observable record.
//!
//! 3. [`to_refs`] turns each property of an observed container into a ref
//!    that reads and writes through the container, so splitting a container
//!    into separate bindings keeps per-property reactivity.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use indexmap::IndexMap;

use super::computed::Computed;
use super::runtime::Runtime;
use super::subscriber::Change;
use crate::graph::{Key, Operation, TargetId};
use crate::observe::{self, Observed, Value};

enum RefSource {
    /// A value owned by the ref itself.
    Cell(RefCell<Value>),

    /// A property of an observed container.
    Property { object: Observed, key: Key },

    /// A computed value exposed as a ref.
    Derived(Computed<Value>),
}

struct RefInner {
    id: TargetId,
    source: RefSource,
}

impl Drop for RefInner {
    fn drop(&mut self) {
        Runtime::forget(self.id);
    }
}

/// A reactive box holding one [`Value`].
///
/// Cloning a `Ref` shares the same cell.
#[derive(Clone)]
pub struct Ref {
    inner: Rc<RefInner>,
}

/// Structured values become mutable proxies; everything else is stored as-is.
fn convert(value: Value) -> Value {
    if value.is_structured() {
        observe::reactive(value)
    } else {
        value
    }
}

impl Ref {
    /// Box a value. A value that already is a ref is returned unchanged.
    pub fn new(value: impl Into<Value>) -> Self {
        let value: Value = value.into();
        match value {
            Value::Ref(existing) => existing,
            other => Self::from_source(RefSource::Cell(RefCell::new(convert(other)))),
        }
    }

    /// Expose a computed value through the ref interface.
    pub fn from_computed(computed: Computed<Value>) -> Self {
        Self::from_source(RefSource::Derived(computed))
    }

    fn property(object: Observed, key: Key) -> Self {
        Self::from_source(RefSource::Property { object, key })
    }

    fn from_source(source: RefSource) -> Self {
        Self {
            inner: Rc::new(RefInner {
                id: TargetId::new(),
                source,
            }),
        }
    }

    /// The handle reads and writes of this ref are tracked under.
    pub fn id(&self) -> TargetId {
        self.inner.id
    }

    /// Read the value, tracking the read.
    pub fn get(&self) -> Value {
        match &self.inner.source {
            RefSource::Cell(cell) => {
                Runtime::track(self.inner.id, Operation::Get, Key::Value);
                cell.borrow().clone()
            }
            RefSource::Property { object, key } => object.get(key.clone()),
            RefSource::Derived(computed) => computed.get(),
        }
    }

    /// Replace the value and notify readers.
    pub fn set(&self, value: impl Into<Value>) {
        match &self.inner.source {
            RefSource::Cell(cell) => {
                let value = convert(value.into());
                let old = cell.replace(value.clone());
                Runtime::trigger(
                    self.inner.id,
                    Operation::Set,
                    Some(Key::Value),
                    Change::new(Some(old), Some(value)),
                );
            }
            RefSource::Property { object, key } => {
                object.set(key.clone(), value);
            }
            RefSource::Derived(computed) => computed.set(value.into()),
        }
    }

    /// Set the value from the current one. The read is not tracked.
    pub fn update<F>(&self, f: F)
    where
        F: FnOnce(&Value) -> Value,
    {
        let current = crate::reactive::untracked(|| self.get());
        self.set(f(&current));
    }

    pub fn ptr_eq(&self, other: &Ref) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }
}

impl PartialEq for Ref {
    fn eq(&self, other: &Self) -> bool {
        self.ptr_eq(other)
    }
}

impl fmt::Debug for Ref {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut debug = f.debug_struct("Ref");
        debug.field("id", &self.inner.id);
        match &self.inner.source {
            RefSource::Cell(cell) => match cell.try_borrow() {
                Ok(value) => debug.field("value", &*value),
                Err(_) => debug.field("value", &"<borrowed>"),
            },
            RefSource::Property { object, key } => {
                debug.field("object", &object.id()).field("key", key)
            }
            RefSource::Derived(computed) => debug.field("computed", &computed.effect().id()),
        };
        debug.finish()
    }
}

/// Box a value. See [`Ref::new`].
pub fn boxed(value: impl Into<Value>) -> Ref {
    Ref::new(value)
}

/// Whether a value is a ref.
pub fn is_ref(value: &Value) -> bool {
    value.is_ref()
}

/// One ref per own property of `object`, each reading and writing through
/// the container.
pub fn to_refs(object: &Observed) -> IndexMap<Key, Ref> {
    object
        .raw()
        .with_data(|data| data.keys())
        .into_iter()
        .map(|key| (key.clone(), Ref::property(object.clone(), key)))
        .collect()
}
