//! Values and Raw Targets
//!
//! [`Value`] is the dynamic data model the engine observes. Structured values
//! live in a [`Target`]: a shared, identity-bearing container (record,
//! sequence, keyed map or set). Targets never track or trigger by
//! themselves; that happens through an [`Observed`] proxy.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::Rc;

use indexmap::{IndexMap, IndexSet};

use super::identity;
use super::proxy::Observed;
use crate::graph::{Key, TargetId};
use crate::reactive::{Ref, Runtime};

/// A hashable value usable as a map key or set member.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Scalar {
    Bool(bool),
    Int(i64),
    Str(String),
}

impl fmt::Display for Scalar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Scalar::Bool(value) => write!(f, "{value}"),
            Scalar::Int(value) => write!(f, "{value}"),
            Scalar::Str(value) => f.write_str(value),
        }
    }
}

impl From<&str> for Scalar {
    fn from(value: &str) -> Self {
        Scalar::Str(value.to_owned())
    }
}

impl From<String> for Scalar {
    fn from(value: String) -> Self {
        Scalar::Str(value)
    }
}

impl From<i64> for Scalar {
    fn from(value: i64) -> Self {
        Scalar::Int(value)
    }
}

impl From<i32> for Scalar {
    fn from(value: i32) -> Self {
        Scalar::Int(i64::from(value))
    }
}

impl From<bool> for Scalar {
    fn from(value: bool) -> Self {
        Scalar::Bool(value)
    }
}

impl From<Scalar> for Value {
    fn from(scalar: Scalar) -> Self {
        match scalar {
            Scalar::Bool(value) => Value::Bool(value),
            Scalar::Int(value) => Value::Int(value),
            Scalar::Str(value) => Value::Str(value),
        }
    }
}

/// A dynamically typed value.
#[derive(Clone, Default)]
pub enum Value {
    #[default]
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    /// A raw structured container.
    Target(Target),
    /// A proxy over a structured container.
    Observed(Observed),
    /// A reactive single-value box.
    Ref(Ref),
}

impl Value {
    /// A raw record built from `(field, value)` pairs.
    pub fn record<K, V>(fields: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<Value>,
    {
        Value::Target(Target::record(fields))
    }

    /// A raw sequence.
    pub fn list<V: Into<Value>>(items: impl IntoIterator<Item = V>) -> Self {
        Value::Target(Target::list(items))
    }

    /// A raw keyed map.
    pub fn map<K, V>(entries: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<Scalar>,
        V: Into<Value>,
    {
        Value::Target(Target::map(entries))
    }

    /// A raw set.
    pub fn set<M: Into<Scalar>>(members: impl IntoIterator<Item = M>) -> Self {
        Value::Target(Target::set(members))
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Whether this value is a container (raw or proxied).
    pub fn is_structured(&self) -> bool {
        matches!(self, Value::Target(_) | Value::Observed(_))
    }

    pub fn is_ref(&self) -> bool {
        matches!(self, Value::Ref(_))
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(value) => Some(*value),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(value) => Some(*value),
            _ => None,
        }
    }

    pub fn as_float(&self) -> Option<f64> {
        match self {
            Value::Float(value) => Some(*value),
            Value::Int(value) => Some(*value as f64),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(value) => Some(value),
            _ => None,
        }
    }

    pub fn as_target(&self) -> Option<&Target> {
        match self {
            Value::Target(target) => Some(target),
            _ => None,
        }
    }

    pub fn as_observed(&self) -> Option<&Observed> {
        match self {
            Value::Observed(observed) => Some(observed),
            _ => None,
        }
    }

    pub fn into_observed(self) -> Option<Observed> {
        match self {
            Value::Observed(observed) => Some(observed),
            _ => None,
        }
    }

    pub fn as_ref_cell(&self) -> Option<&Ref> {
        match self {
            Value::Ref(cell) => Some(cell),
            _ => None,
        }
    }

    /// The scalar form of a primitive, if it has one.
    pub fn as_scalar(&self) -> Option<Scalar> {
        match self {
            Value::Bool(value) => Some(Scalar::Bool(*value)),
            Value::Int(value) => Some(Scalar::Int(*value)),
            Value::Str(value) => Some(Scalar::Str(value.clone())),
            _ => None,
        }
    }

    /// The value with any proxy replaced by its raw target.
    pub fn into_raw(self) -> Value {
        match self {
            Value::Observed(observed) => Value::Target(observed.raw()),
            other => other,
        }
    }

    /// The identity handle of a container or ref.
    pub fn target_id(&self) -> Option<TargetId> {
        match self {
            Value::Target(target) => Some(target.id()),
            Value::Observed(observed) => Some(observed.id()),
            Value::Ref(cell) => Some(cell.id()),
            _ => None,
        }
    }
}

/// Primitives compare by value (NaN equals NaN, so rewriting it is not a
/// change); containers, proxies and refs compare by identity.
impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Null, Value::Null) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Int(a), Value::Int(b)) => a == b,
            (Value::Float(a), Value::Float(b)) => a == b || (a.is_nan() && b.is_nan()),
            (Value::Str(a), Value::Str(b)) => a == b,
            (Value::Target(a), Value::Target(b)) => a.ptr_eq(b),
            (Value::Observed(a), Value::Observed(b)) => a == b,
            (Value::Ref(a), Value::Ref(b)) => a.ptr_eq(b),
            _ => false,
        }
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => f.write_str("Null"),
            Value::Bool(value) => write!(f, "Bool({value})"),
            Value::Int(value) => write!(f, "Int({value})"),
            Value::Float(value) => write!(f, "Float({value})"),
            Value::Str(value) => write!(f, "Str({value:?})"),
            Value::Target(target) => fmt::Debug::fmt(target, f),
            Value::Observed(observed) => fmt::Debug::fmt(observed, f),
            Value::Ref(cell) => fmt::Debug::fmt(cell, f),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => f.write_str("null"),
            Value::Bool(value) => write!(f, "{value}"),
            Value::Int(value) => write!(f, "{value}"),
            Value::Float(value) => write!(f, "{value}"),
            Value::Str(value) => f.write_str(value),
            Value::Target(target) => write!(f, "[{} {}]", target.kind(), target.id()),
            Value::Observed(observed) => write!(f, "[{} proxy {}]", observed.kind(), observed.id()),
            Value::Ref(cell) => write!(f, "[ref {}]", cell.id()),
        }
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Value::Bool(value)
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Value::Int(value)
    }
}

impl From<i32> for Value {
    fn from(value: i32) -> Self {
        Value::Int(i64::from(value))
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Value::Float(value)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::Str(value.to_owned())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::Str(value)
    }
}

impl From<Target> for Value {
    fn from(target: Target) -> Self {
        Value::Target(target)
    }
}

impl From<Observed> for Value {
    fn from(observed: Observed) -> Self {
        Value::Observed(observed)
    }
}

impl From<Ref> for Value {
    fn from(cell: Ref) -> Self {
        Value::Ref(cell)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(value: Option<T>) -> Self {
        value.map_or(Value::Null, Into::into)
    }
}

/// The shape of a structured container.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ContainerKind {
    Record,
    List,
    Map,
    Set,
}

impl fmt::Display for ContainerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ContainerKind::Record => "record",
            ContainerKind::List => "list",
            ContainerKind::Map => "map",
            ContainerKind::Set => "set",
        };
        f.write_str(name)
    }
}

/// The storage behind a [`Target`].
#[derive(Debug, Clone)]
pub enum Container {
    Record(IndexMap<String, Value>),
    List(Vec<Value>),
    Map(IndexMap<Scalar, Value>),
    Set(IndexSet<Scalar>),
}

impl Container {
    pub fn kind(&self) -> ContainerKind {
        match self {
            Container::Record(_) => ContainerKind::Record,
            Container::List(_) => ContainerKind::List,
            Container::Map(_) => ContainerKind::Map,
            Container::Set(_) => ContainerKind::Set,
        }
    }

    pub fn len(&self) -> usize {
        match self {
            Container::Record(fields) => fields.len(),
            Container::List(items) => items.len(),
            Container::Map(entries) => entries.len(),
            Container::Set(members) => members.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Rewrite `key` into this container's canonical key form, or `None` if
    /// the container has no such key space.
    pub fn normalize(&self, key: Key) -> Option<Key> {
        match self {
            Container::Record(_) => match key {
                Key::Field(Scalar::Str(name)) => Some(Key::Field(Scalar::Str(name))),
                Key::Field(scalar) => Some(Key::Field(Scalar::Str(scalar.to_string()))),
                Key::Index(index) => Some(Key::Field(Scalar::Str(index.to_string()))),
                Key::Length => Some(Key::Field(Scalar::Str("length".to_owned()))),
                Key::Iterate | Key::Value => None,
            },
            Container::List(_) => match key {
                Key::Index(index) => Some(Key::Index(index)),
                Key::Length => Some(Key::Length),
                Key::Field(Scalar::Int(index)) => usize::try_from(index).ok().map(Key::Index),
                Key::Field(Scalar::Str(name)) if name == "length" => Some(Key::Length),
                Key::Field(Scalar::Str(name)) => name.parse().ok().map(Key::Index),
                Key::Field(Scalar::Bool(_)) | Key::Iterate | Key::Value => None,
            },
            Container::Map(_) | Container::Set(_) => match key {
                Key::Field(scalar) => Some(Key::Field(scalar)),
                Key::Index(index) => i64::try_from(index).ok().map(|i| Key::Field(Scalar::Int(i))),
                Key::Length | Key::Iterate | Key::Value => None,
            },
        }
    }

    /// Own value at a normalized key.
    pub fn get(&self, key: &Key) -> Option<Value> {
        match (self, key) {
            (Container::Record(fields), Key::Field(Scalar::Str(name))) => fields.get(name).cloned(),
            (Container::List(items), Key::Index(index)) => items.get(*index).cloned(),
            (Container::List(items), Key::Length) => Some(Value::Int(items.len() as i64)),
            (Container::Map(entries), Key::Field(scalar)) => entries.get(scalar).cloned(),
            (Container::Set(members), Key::Field(scalar)) => {
                members.contains(scalar).then(|| Value::from(scalar.clone()))
            }
            _ => None,
        }
    }

    /// Whether a normalized key exists as an own key.
    pub fn has(&self, key: &Key) -> bool {
        match (self, key) {
            (Container::Record(fields), Key::Field(Scalar::Str(name))) => fields.contains_key(name),
            (Container::List(items), Key::Index(index)) => *index < items.len(),
            (Container::List(_), Key::Length) => true,
            (Container::Map(entries), Key::Field(scalar)) => entries.contains_key(scalar),
            (Container::Set(members), Key::Field(scalar)) => members.contains(scalar),
            _ => false,
        }
    }

    /// Store `value` at a normalized key, returning the previous value.
    ///
    /// Writing past the end of a sequence pads it with nulls; writing
    /// `length` resizes it.
    pub fn store(&mut self, key: &Key, value: Value) -> Option<Value> {
        match (self, key) {
            (Container::Record(fields), Key::Field(Scalar::Str(name))) => {
                fields.insert(name.clone(), value)
            }
            (Container::List(items), Key::Index(index)) => {
                if *index < items.len() {
                    Some(std::mem::replace(&mut items[*index], value))
                } else {
                    items.resize(*index, Value::Null);
                    items.push(value);
                    None
                }
            }
            (Container::List(items), Key::Length) => {
                let old = items.len();
                let len = value.as_int().and_then(|n| usize::try_from(n).ok()).unwrap_or(old);
                items.resize(len, Value::Null);
                Some(Value::Int(old as i64))
            }
            (Container::Map(entries), Key::Field(scalar)) => entries.insert(scalar.clone(), value),
            (Container::Set(members), Key::Field(scalar)) => {
                let existed = !members.insert(scalar.clone());
                existed.then(|| Value::from(scalar.clone()))
            }
            _ => None,
        }
    }

    /// Remove a normalized key, returning the removed value.
    ///
    /// Sequence elements are replaced by null rather than shifted, so the
    /// positions of the remaining elements do not change.
    pub fn remove(&mut self, key: &Key) -> Option<Value> {
        match (self, key) {
            (Container::Record(fields), Key::Field(Scalar::Str(name))) => fields.shift_remove(name),
            (Container::List(items), Key::Index(index)) if *index < items.len() => {
                Some(std::mem::take(&mut items[*index]))
            }
            (Container::Map(entries), Key::Field(scalar)) => entries.shift_remove(scalar),
            (Container::Set(members), Key::Field(scalar)) => members
                .shift_remove(scalar)
                .then(|| Value::from(scalar.clone())),
            _ => None,
        }
    }

    /// Own keys in iteration order.
    pub fn keys(&self) -> Vec<Key> {
        match self {
            Container::Record(fields) => fields
                .keys()
                .map(|name| Key::Field(Scalar::Str(name.clone())))
                .collect(),
            Container::List(items) => (0..items.len()).map(Key::Index).collect(),
            Container::Map(entries) => entries.keys().cloned().map(Key::Field).collect(),
            Container::Set(members) => members.iter().cloned().map(Key::Field).collect(),
        }
    }

    /// Remove everything, handing back the old contents.
    pub fn take(&mut self) -> Container {
        let empty = match self {
            Container::Record(_) => Container::Record(IndexMap::new()),
            Container::List(_) => Container::List(Vec::new()),
            Container::Map(_) => Container::Map(IndexMap::new()),
            Container::Set(_) => Container::Set(IndexSet::new()),
        };
        std::mem::replace(self, empty)
    }
}

pub(crate) struct TargetInner {
    id: TargetId,
    data: RefCell<Container>,
    prototype: RefCell<Option<Value>>,
    marked_readonly: Cell<bool>,
    non_reactive: Cell<bool>,
}

impl Drop for TargetInner {
    fn drop(&mut self) {
        Runtime::forget(self.id);
        identity::forget(self.id);
    }
}

/// A raw structured container with a stable identity.
///
/// Cloning a `Target` shares the same container.
#[derive(Clone)]
pub struct Target {
    inner: Rc<TargetInner>,
}

impl Target {
    pub fn new(container: Container) -> Self {
        Self {
            inner: Rc::new(TargetInner {
                id: TargetId::new(),
                data: RefCell::new(container),
                prototype: RefCell::new(None),
                marked_readonly: Cell::new(false),
                non_reactive: Cell::new(false),
            }),
        }
    }

    pub fn record<K, V>(fields: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<Value>,
    {
        Self::new(Container::Record(
            fields
                .into_iter()
                .map(|(name, value)| (name.into(), value.into().into_raw()))
                .collect(),
        ))
    }

    pub fn list<V: Into<Value>>(items: impl IntoIterator<Item = V>) -> Self {
        Self::new(Container::List(
            items.into_iter().map(|item| item.into().into_raw()).collect(),
        ))
    }

    pub fn map<K, V>(entries: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<Scalar>,
        V: Into<Value>,
    {
        Self::new(Container::Map(
            entries
                .into_iter()
                .map(|(key, value)| (key.into(), value.into().into_raw()))
                .collect(),
        ))
    }

    pub fn set<M: Into<Scalar>>(members: impl IntoIterator<Item = M>) -> Self {
        Self::new(Container::Set(members.into_iter().map(Into::into).collect()))
    }

    pub fn id(&self) -> TargetId {
        self.inner.id
    }

    pub fn kind(&self) -> ContainerKind {
        self.inner.data.borrow().kind()
    }

    pub fn is_sequence(&self) -> bool {
        self.kind() == ContainerKind::List
    }

    pub fn ptr_eq(&self, other: &Target) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }

    /// Read the raw container. No dependency is recorded.
    pub fn with_data<R>(&self, f: impl FnOnce(&Container) -> R) -> R {
        f(&self.inner.data.borrow())
    }

    /// Mutate the raw container. No notification is sent.
    pub fn with_data_mut<R>(&self, f: impl FnOnce(&mut Container) -> R) -> R {
        f(&mut self.inner.data.borrow_mut())
    }

    /// Untracked own lookup.
    pub fn get_raw(&self, key: impl Into<Key>) -> Option<Value> {
        let data = self.inner.data.borrow();
        let key = data.normalize(key.into())?;
        data.get(&key)
    }

    pub fn len(&self) -> usize {
        self.inner.data.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Record whose missing fields are read from `prototype`.
    ///
    /// Only records accept a prototype; returns false otherwise.
    pub fn set_prototype(&self, prototype: Option<Value>) -> bool {
        if self.kind() != ContainerKind::Record {
            return false;
        }
        let prototype = prototype.filter(|value| {
            value
                .as_target()
                .map(Target::kind)
                .or_else(|| value.as_observed().map(Observed::kind))
                == Some(ContainerKind::Record)
        });
        *self.inner.prototype.borrow_mut() = prototype;
        true
    }

    pub fn prototype(&self) -> Option<Value> {
        self.inner.prototype.borrow().clone()
    }

    pub(crate) fn mark_readonly(&self) {
        self.inner.marked_readonly.set(true);
    }

    pub(crate) fn is_marked_readonly(&self) -> bool {
        self.inner.marked_readonly.get()
    }

    pub(crate) fn mark_non_reactive(&self) {
        self.inner.non_reactive.set(true);
    }

    pub(crate) fn is_non_reactive(&self) -> bool {
        self.inner.non_reactive.get()
    }
}

impl PartialEq for Target {
    fn eq(&self, other: &Self) -> bool {
        self.ptr_eq(other)
    }
}

impl Eq for Target {}

impl fmt::Debug for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut debug = f.debug_struct("Target");
        debug.field("id", &self.id());
        match self.inner.data.try_borrow() {
            Ok(data) => debug.field("kind", &data.kind()).field("len", &data.len()),
            Err(_) => debug.field("data", &"<borrowed>"),
        };
        debug.finish()
    }
}
