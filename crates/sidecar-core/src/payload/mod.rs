//! Settings payload: value model and on-disk codec.
//!
//! Sidecar files hold one serialized table in Lua constructor syntax,
//! preceded by a marker comment:
//!
//! ```text
//! -- we can read Lua syntax here!
//! return {
//!     ["doc_path"] = "/books/novel.epub",
//!     ["last_page"] = 42,
//! }
//! ```
//!
//! Keys are kept in a `BTreeMap`, so encoding is deterministic.

mod decode;
mod encode;

pub use decode::{PayloadError, decode};
pub use encode::{MARKER_COMMENT, encode};

use std::collections::BTreeMap;

/// Reserved key holding the owning document's identifier.
pub const DOC_PATH_KEY: &str = "doc_path";

/// Key naming an external cache artifact owned by the document.
pub const CACHE_FILE_KEY: &str = "cache_file_path";

/// A table key. Integer keys sort before string keys.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Key {
    Index(i64),
    Name(String),
}

impl From<&str> for Key {
    fn from(s: &str) -> Self {
        Key::Name(s.to_string())
    }
}

impl From<String> for Key {
    fn from(s: String) -> Self {
        Key::Name(s)
    }
}

impl From<i64> for Key {
    fn from(i: i64) -> Self {
        Key::Index(i)
    }
}

pub type Table = BTreeMap<Key, Value>;

#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Bool(bool),
    Integer(i64),
    Number(f64),
    String(String),
    /// A table with keys exactly `1..=n`.
    Array(Vec<Value>),
    Table(Table),
}

impl Value {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Integer(i) => Some(*i),
            _ => None,
        }
    }

    /// Numeric view of either number representation.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Integer(i) => Some(*i as f64),
            Value::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&[Value]> {
        match self {
            Value::Array(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_table(&self) -> Option<&Table> {
        match self {
            Value::Table(t) => Some(t),
            _ => None,
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Integer(i)
    }
}

impl From<i32> for Value {
    fn from(i: i32) -> Self {
        Value::Integer(i64::from(i))
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Number(n)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

impl From<Vec<Value>> for Value {
    fn from(items: Vec<Value>) -> Self {
        Value::Array(items)
    }
}

impl From<Table> for Value {
    fn from(t: Table) -> Self {
        Value::Table(t)
    }
}

// ============================================================================
// SettingsBlob
// ============================================================================

/// The top-level settings table of one document.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SettingsBlob {
    table: Table,
}

impl SettingsBlob {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }

    pub fn len(&self) -> usize {
        self.table.len()
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.table.get(&Key::from(key))
    }

    pub fn contains(&self, key: &str) -> bool {
        self.table.contains_key(&Key::from(key))
    }

    /// Insert a value, returning the previous one.
    pub fn set(&mut self, key: &str, value: impl Into<Value>) -> Option<Value> {
        self.table.insert(Key::from(key), value.into())
    }

    pub fn remove(&mut self, key: &str) -> Option<Value> {
        self.table.remove(&Key::from(key))
    }

    pub fn doc_path(&self) -> Option<&str> {
        self.get(DOC_PATH_KEY).and_then(Value::as_str)
    }

    /// Overwrite the reserved identifier key.
    pub fn stamp_doc_path(&mut self, doc_id: &str) {
        self.set(DOC_PATH_KEY, doc_id);
    }

    pub fn table(&self) -> &Table {
        &self.table
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Key, &Value)> {
        self.table.iter()
    }

    pub fn into_table(self) -> Table {
        self.table
    }
}

impl From<Table> for SettingsBlob {
    fn from(table: Table) -> Self {
        Self { table }
    }
}

// ============================================================================
// JSON bridge
// ============================================================================

impl From<&Value> for serde_json::Value {
    fn from(value: &Value) -> Self {
        match value {
            Value::Bool(b) => serde_json::Value::Bool(*b),
            Value::Integer(i) => serde_json::Value::from(*i),
            // Non-finite floats have no JSON form.
            Value::Number(n) => serde_json::Number::from_f64(*n)
                .map(serde_json::Value::Number)
                .unwrap_or(serde_json::Value::Null),
            Value::String(s) => serde_json::Value::String(s.clone()),
            Value::Array(items) => {
                serde_json::Value::Array(items.iter().map(serde_json::Value::from).collect())
            }
            Value::Table(t) => table_to_json(t),
        }
    }
}

fn table_to_json(table: &Table) -> serde_json::Value {
    let map = table
        .iter()
        .map(|(k, v)| {
            let key = match k {
                Key::Index(i) => i.to_string(),
                Key::Name(s) => s.clone(),
            };
            (key, serde_json::Value::from(v))
        })
        .collect();
    serde_json::Value::Object(map)
}

impl From<&SettingsBlob> for serde_json::Value {
    fn from(blob: &SettingsBlob) -> Self {
        table_to_json(&blob.table)
    }
}

impl Value {
    /// Convert from JSON. `null` has no counterpart and yields `None`;
    /// null members of objects and arrays are dropped.
    pub fn from_json(json: &serde_json::Value) -> Option<Value> {
        match json {
            serde_json::Value::Null => None,
            serde_json::Value::Bool(b) => Some(Value::Bool(*b)),
            serde_json::Value::Number(n) => match n.as_i64() {
                Some(i) => Some(Value::Integer(i)),
                None => n.as_f64().map(Value::Number),
            },
            serde_json::Value::String(s) => Some(Value::String(s.clone())),
            serde_json::Value::Array(items) => Some(Value::Array(
                items.iter().filter_map(Value::from_json).collect(),
            )),
            serde_json::Value::Object(map) => Some(Value::Table(
                map.iter()
                    .filter_map(|(k, v)| Value::from_json(v).map(|v| (Key::from(k.as_str()), v)))
                    .collect(),
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_blob_set_get_remove() {
        let mut blob = SettingsBlob::new();
        assert!(blob.is_empty());
        assert!(blob.set("page", 42).is_none());
        assert_eq!(blob.get("page"), Some(&Value::Integer(42)));
        assert_eq!(blob.set("page", 43), Some(Value::Integer(42)));
        assert!(blob.contains("page"));
        assert_eq!(blob.remove("page"), Some(Value::Integer(43)));
        assert!(blob.is_empty());
    }

    #[test]
    fn test_stamp_doc_path_overrides() {
        let mut blob = SettingsBlob::new();
        blob.set(DOC_PATH_KEY, "/old/place.pdf");
        blob.stamp_doc_path("/new/place.pdf");
        assert_eq!(blob.doc_path(), Some("/new/place.pdf"));
    }

    #[test]
    fn test_key_order_indices_first() {
        let mut table = Table::new();
        table.insert(Key::from("b"), Value::from(1));
        table.insert(Key::Index(2), Value::from(1));
        table.insert(Key::from("a"), Value::from(1));
        table.insert(Key::Index(1), Value::from(1));
        let keys: Vec<_> = table.keys().cloned().collect();
        assert_eq!(
            keys,
            vec![Key::Index(1), Key::Index(2), Key::from("a"), Key::from("b")]
        );
    }

    #[test]
    fn test_json_bridge() {
        let json = json!({
            "page": 42,
            "percent": 0.5,
            "flags": [true, false],
            "nested": {"title": "Novel", "gone": null},
        });
        let value = Value::from_json(&json).unwrap();
        let table = value.as_table().unwrap();
        assert_eq!(table[&Key::from("page")], Value::Integer(42));
        assert_eq!(table[&Key::from("percent")], Value::Number(0.5));
        let nested = table[&Key::from("nested")].as_table().unwrap();
        assert_eq!(nested.len(), 1);

        let back = serde_json::Value::from(&value);
        assert_eq!(back["nested"]["title"], "Novel");
        assert_eq!(back["flags"][1], false);
    }

    #[test]
    fn test_json_null_has_no_value() {
        assert!(Value::from_json(&serde_json::Value::Null).is_none());
    }
}
