//! Deeply immutable value trees.
//!
//! Payloads enter the store as plain `serde_json::Value`s and are frozen into
//! `Frozen` before they are written to a snapshot. Every interior node is
//! reference counted, so cloning a `Frozen` never copies the tree. Reads thaw
//! the value back into a plain `Value`.

use std::sync::Arc;

use serde::Serialize;
use serde_json::{Map, Number, Value};

use crate::error::ConversionError;

#[derive(Debug, Clone, PartialEq)]
pub enum Frozen {
    Null,
    Bool(bool),
    Number(Number),
    String(Arc<str>),
    List(Arc<[Frozen]>),
    /// Keys keep the order they were frozen in.
    Map(Arc<[(Arc<str>, Frozen)]>),
}

impl Frozen {
    /// Freeze a plain value, recursively.
    pub fn freeze(value: &Value) -> Self {
        match value {
            Value::Null => Frozen::Null,
            Value::Bool(b) => Frozen::Bool(*b),
            Value::Number(n) => Frozen::Number(n.clone()),
            Value::String(s) => Frozen::String(Arc::from(s.as_str())),
            Value::Array(items) => Frozen::List(items.iter().map(Frozen::freeze).collect()),
            Value::Object(map) => Frozen::Map(
                map.iter()
                    .map(|(k, v)| (Arc::from(k.as_str()), Frozen::freeze(v)))
                    .collect(),
            ),
        }
    }

    /// Freeze an error payload. Sequences become lists, mappings become maps,
    /// a null payload becomes an empty map. Other scalars have no keyed form
    /// and are rejected.
    pub fn freeze_error(value: &Value) -> Result<Self, ConversionError> {
        match value {
            Value::Array(_) | Value::Object(_) => Ok(Frozen::freeze(value)),
            Value::Null => Ok(Frozen::Map(Arc::from(Vec::new()))),
            other => Err(ConversionError::UnsupportedErrorShape {
                kind: kind_of(other),
            }),
        }
    }

    /// Freeze anything serde can turn into a plain value.
    pub fn from_serialize<T: Serialize + ?Sized>(value: &T) -> Result<Self, ConversionError> {
        let plain = serde_json::to_value(value)?;
        Ok(Frozen::freeze(&plain))
    }

    /// Convert back into a plain value.
    pub fn thaw(&self) -> Value {
        match self {
            Frozen::Null => Value::Null,
            Frozen::Bool(b) => Value::Bool(*b),
            Frozen::Number(n) => Value::Number(n.clone()),
            Frozen::String(s) => Value::String(s.to_string()),
            Frozen::List(items) => Value::Array(items.iter().map(Frozen::thaw).collect()),
            Frozen::Map(entries) => {
                let mut map = Map::with_capacity(entries.len());
                for (k, v) in entries.iter() {
                    map.insert(k.to_string(), v.thaw());
                }
                Value::Object(map)
            }
        }
    }

    pub fn is_scalar(&self) -> bool {
        !matches!(self, Frozen::List(_) | Frozen::Map(_))
    }

    /// True for lists and maps with no entries.
    pub fn is_empty(&self) -> bool {
        match self {
            Frozen::List(items) => items.is_empty(),
            Frozen::Map(entries) => entries.is_empty(),
            _ => false,
        }
    }

    pub fn len(&self) -> usize {
        match self {
            Frozen::List(items) => items.len(),
            Frozen::Map(entries) => entries.len(),
            _ => 0,
        }
    }

    /// Look up a key of a map node.
    pub fn get(&self, key: &str) -> Option<&Frozen> {
        match self {
            Frozen::Map(entries) => entries
                .iter()
                .find(|(k, _)| k.as_ref() == key)
                .map(|(_, v)| v),
            _ => None,
        }
    }

    /// Index into a list node.
    pub fn at(&self, index: usize) -> Option<&Frozen> {
        match self {
            Frozen::List(items) => items.get(index),
            _ => None,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Frozen::Null => "null",
            Frozen::Bool(_) => "bool",
            Frozen::Number(_) => "number",
            Frozen::String(_) => "string",
            Frozen::List(_) => "list",
            Frozen::Map(_) => "map",
        }
    }
}

impl From<&Value> for Frozen {
    fn from(value: &Value) -> Self {
        Frozen::freeze(value)
    }
}

impl From<&Frozen> for Value {
    fn from(frozen: &Frozen) -> Self {
        frozen.thaw()
    }
}

fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn thaw_reproduces_nested_payload() {
        let payload = json!({
            "id": 1,
            "name": "Ann",
            "tags": ["a", "b"],
            "address": {"city": "Lyon", "zip": null},
            "active": false
        });
        assert_eq!(Frozen::freeze(&payload).thaw(), payload);
    }

    #[test]
    fn map_keys_keep_insertion_order() {
        let payload: Value = serde_json::from_str(r#"{"zeta": 1, "alpha": 2, "mid": 3}"#).unwrap();

        let thawed = Frozen::freeze(&payload).thaw();

        let keys: Vec<&String> = thawed.as_object().unwrap().keys().collect();
        assert_eq!(keys, ["zeta", "alpha", "mid"]);
    }

    #[test]
    fn clone_shares_the_tree() {
        let frozen = Frozen::freeze(&json!({"items": [1, 2, 3]}));
        let copy = frozen.clone();
        match (&frozen, &copy) {
            (Frozen::Map(a), Frozen::Map(b)) => assert!(Arc::ptr_eq(a, b)),
            _ => panic!("expected maps"),
        }
    }

    #[test]
    fn empty_collections_are_empty_but_scalars_are_not() {
        assert!(Frozen::freeze(&json!({})).is_empty());
        assert!(Frozen::freeze(&json!([])).is_empty());
        assert!(!Frozen::freeze(&json!(0)).is_empty());
        assert!(!Frozen::freeze(&json!("")).is_empty());
        assert!(Frozen::freeze(&json!(false)).is_scalar());
        assert!(Frozen::Null.is_scalar());
    }

    #[test]
    fn error_payload_shapes() {
        let list = Frozen::freeze_error(&json!(["a", "b"])).unwrap();
        assert_eq!(list.kind(), "list");
        assert_eq!(list.at(1), Some(&Frozen::String(Arc::from("b"))));

        let map = Frozen::freeze_error(&json!({"field": "required"})).unwrap();
        assert_eq!(map.kind(), "map");
        assert_eq!(map.get("field").map(Frozen::thaw), Some(json!("required")));

        assert_eq!(Frozen::freeze_error(&Value::Null).unwrap().thaw(), json!({}));
    }

    #[test]
    fn scalar_error_payload_is_rejected() {
        let err = Frozen::freeze_error(&json!("boom")).unwrap_err();
        assert!(matches!(
            err,
            ConversionError::UnsupportedErrorShape { kind: "string" }
        ));
    }

    #[test]
    fn from_serialize_reports_unrepresentable_values() {
        use std::collections::HashMap;

        // Maps with non-string keys have no JSON form.
        let mut bad: HashMap<(u8, u8), u8> = HashMap::new();
        bad.insert((1, 2), 3);
        assert!(matches!(
            Frozen::from_serialize(&bad),
            Err(ConversionError::Serialize(_))
        ));

        let ok = Frozen::from_serialize(&vec![1, 2]).unwrap();
        assert_eq!(ok.thaw(), json!([1, 2]));
    }
}
