//! Key casing helpers for the external record format.
//!
//! Serialized modules use PascalCase keys (first character upper-cased) to
//! match the field naming of the engine that consumes them. Deserialization
//! accepts either spelling; the two accepted spellings of each field live in
//! one [`FieldAlias`] constant next to the module that owns the field, and
//! [`RecordReader`] consults that pair once per lookup.

use std::collections::HashMap;
use std::hash::BuildHasher;

use serde_json::{Map, Value};

/// The two accepted spellings of one record field.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FieldAlias {
    pub camel: &'static str,
    pub pascal: &'static str,
}

impl FieldAlias {
    pub const fn new(camel: &'static str, pascal: &'static str) -> Self {
        Self { camel, pascal }
    }
}

pub const TYPE: FieldAlias = FieldAlias::new("type", "Type");
pub const ID: FieldAlias = FieldAlias::new("id", "Id");

/// Upper-case the first character of `key`.
pub fn to_pascal_case(key: &str) -> String {
    let mut chars = key.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// Recursively rewrite every object key with [`to_pascal_case`].
///
/// Arrays are mapped element-wise; scalars pass through unchanged.
pub fn pascal_keys(value: Value) -> Value {
    match value {
        Value::Object(map) => Value::Object(
            map.into_iter()
                .map(|(k, v)| (to_pascal_case(&k), pascal_keys(v)))
                .collect(),
        ),
        Value::Array(items) => Value::Array(items.into_iter().map(pascal_keys).collect()),
        other => other,
    }
}

/// Inverse of [`pascal_keys`]: lower-case the first character of every key.
#[cfg(test)]
pub(crate) fn camel_keys(value: Value) -> Value {
    match value {
        Value::Object(map) => Value::Object(
            map.into_iter()
                .map(|(k, v)| {
                    let mut chars = k.chars();
                    let key = match chars.next() {
                        Some(first) => first.to_lowercase().chain(chars).collect(),
                        None => String::new(),
                    };
                    (key, camel_keys(v))
                })
                .collect(),
        ),
        Value::Array(items) => Value::Array(items.into_iter().map(camel_keys).collect()),
        other => other,
    }
}

/// Spelling under which `key` is stored in a user-keyed map.
///
/// Serialized maps come back with PascalCase keys, so `gold` also finds an
/// entry restored as `Gold`. Keys not present either way are returned as is.
pub fn stored_key<V, S: BuildHasher>(map: &HashMap<String, V, S>, key: &str) -> String {
    if map.contains_key(key) {
        return key.to_string();
    }
    let pascal = to_pascal_case(key);
    if map.contains_key(&pascal) {
        pascal
    } else {
        key.to_string()
    }
}

/// Read-only view over a record that resolves fields by either spelling.
///
/// Every typed getter returns `None` when the field is absent, `null`, or
/// has the wrong JSON type, so callers can default silently.
#[derive(Clone, Copy, Debug)]
pub struct RecordReader<'a> {
    map: &'a Map<String, Value>,
}

impl<'a> RecordReader<'a> {
    /// Wrap a record. Returns `None` if `value` is not an object.
    pub fn new(value: &'a Value) -> Option<Self> {
        value.as_object().map(|map| Self { map })
    }

    pub fn from_map(map: &'a Map<String, Value>) -> Self {
        Self { map }
    }

    /// Raw lookup: PascalCase first, then camelCase. `null` counts as absent.
    pub fn get(&self, field: &FieldAlias) -> Option<&'a Value> {
        self.map
            .get(field.pascal)
            .filter(|v| !v.is_null())
            .or_else(|| self.map.get(field.camel).filter(|v| !v.is_null()))
    }

    pub fn f32(&self, field: &FieldAlias) -> Option<f32> {
        self.get(field).and_then(Value::as_f64).map(|v| v as f32)
    }

    pub fn f64(&self, field: &FieldAlias) -> Option<f64> {
        self.get(field).and_then(Value::as_f64)
    }

    /// Non-negative integer; float values are truncated.
    pub fn u32(&self, field: &FieldAlias) -> Option<u32> {
        let value = self.get(field)?;
        value
            .as_u64()
            .map(|v| v.min(u32::MAX as u64) as u32)
            .or_else(|| {
                value
                    .as_f64()
                    .filter(|v| *v >= 0.0)
                    .map(|v| v as u32)
            })
    }

    pub fn u64(&self, field: &FieldAlias) -> Option<u64> {
        let value = self.get(field)?;
        value
            .as_u64()
            .or_else(|| value.as_f64().filter(|v| *v >= 0.0).map(|v| v as u64))
    }

    pub fn i64(&self, field: &FieldAlias) -> Option<i64> {
        let value = self.get(field)?;
        value.as_i64().or_else(|| value.as_f64().map(|v| v as i64))
    }

    pub fn bool(&self, field: &FieldAlias) -> Option<bool> {
        self.get(field).and_then(Value::as_bool)
    }

    pub fn str(&self, field: &FieldAlias) -> Option<&'a str> {
        self.get(field).and_then(Value::as_str)
    }

    pub fn array(&self, field: &FieldAlias) -> Option<&'a Vec<Value>> {
        self.get(field).and_then(Value::as_array)
    }

    pub fn object(&self, field: &FieldAlias) -> Option<&'a Map<String, Value>> {
        self.get(field).and_then(Value::as_object)
    }
}
