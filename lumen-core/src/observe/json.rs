//! JSON conversion.
//!
//! JSON documents convert into raw targets (objects become records, arrays
//! become sequences). Snapshots back out are untracked and never recurse
//! into a container that is already being written.

use std::collections::HashSet;

use serde_json::{Map, Number};

use super::value::{Container, Target, Value};
use crate::graph::TargetId;
use crate::reactive;

impl From<serde_json::Value> for Value {
    fn from(json: serde_json::Value) -> Self {
        match json {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(value) => Value::Bool(value),
            serde_json::Value::Number(number) => match number.as_i64() {
                Some(int) => Value::Int(int),
                None => number.as_f64().map_or(Value::Null, Value::Float),
            },
            serde_json::Value::String(value) => Value::Str(value),
            serde_json::Value::Array(items) => Value::list(items.into_iter().map(Value::from)),
            serde_json::Value::Object(fields) => {
                Value::record(fields.into_iter().map(|(name, value)| (name, Value::from(value))))
            }
        }
    }
}

impl Value {
    /// Snapshot as JSON without tracking any read.
    ///
    /// Maps become objects keyed by the key's display form and sets become
    /// arrays. Cycles and non-finite floats become `null`.
    pub fn to_json(&self) -> serde_json::Value {
        reactive::untracked(|| to_json(self, &mut HashSet::new()))
    }
}

fn to_json(value: &Value, visiting: &mut HashSet<TargetId>) -> serde_json::Value {
    match value {
        Value::Null => serde_json::Value::Null,
        Value::Bool(value) => serde_json::Value::Bool(*value),
        Value::Int(value) => serde_json::Value::Number(Number::from(*value)),
        Value::Float(value) => Number::from_f64(*value).map_or(serde_json::Value::Null, serde_json::Value::Number),
        Value::Str(value) => serde_json::Value::String(value.clone()),
        Value::Target(target) => target_to_json(target, visiting),
        Value::Observed(observed) => target_to_json(&observed.raw(), visiting),
        Value::Ref(cell) => to_json(&cell.get(), visiting),
    }
}

fn target_to_json(target: &Target, visiting: &mut HashSet<TargetId>) -> serde_json::Value {
    if !visiting.insert(target.id()) {
        return serde_json::Value::Null;
    }
    let snapshot = target.with_data(Container::clone);
    let json = match snapshot {
        Container::Record(fields) => serde_json::Value::Object(
            fields
                .iter()
                .map(|(name, value)| (name.clone(), to_json(value, visiting)))
                .collect::<Map<_, _>>(),
        ),
        Container::List(items) => {
            serde_json::Value::Array(items.iter().map(|item| to_json(item, visiting)).collect())
        }
        Container::Map(entries) => serde_json::Value::Object(
            entries
                .iter()
                .map(|(key, value)| (key.to_string(), to_json(value, visiting)))
                .collect::<Map<_, _>>(),
        ),
        Container::Set(members) => serde_json::Value::Array(
            members
                .iter()
                .map(|member| to_json(&Value::from(member.clone()), visiting))
                .collect(),
        ),
    };
    visiting.remove(&target.id());
    json
}
