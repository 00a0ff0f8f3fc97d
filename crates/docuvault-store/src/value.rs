//! Typed document and value model.
//!
//! Documents are flat maps of named values. The value model is deliberately
//! small: it covers exactly what the encryption layer stores (strings,
//! opaque binary, UUID key ids, alt-name arrays, nested master-key
//! descriptors, timestamps).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

/// A single field value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Value {
    /// Absent / null.
    Null,
    /// Boolean.
    Bool(bool),
    /// 64-bit integer.
    Int(i64),
    /// UTF-8 string.
    String(String),
    /// Opaque binary payload.
    #[serde(with = "base64_serde")]
    Binary(Vec<u8>),
    /// UUID, used for data-key identifiers.
    Uuid(Uuid),
    /// UTC timestamp.
    Timestamp(DateTime<Utc>),
    /// Array of values.
    Array(Vec<Value>),
    /// Nested document.
    Document(Document),
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Self::String(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Self::String(s)
    }
}

impl From<Vec<u8>> for Value {
    fn from(b: Vec<u8>) -> Self {
        Self::Binary(b)
    }
}

impl From<Uuid> for Value {
    fn from(u: Uuid) -> Self {
        Self::Uuid(u)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Self::Int(i)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Self::Bool(b)
    }
}

impl From<DateTime<Utc>> for Value {
    fn from(t: DateTime<Utc>) -> Self {
        Self::Timestamp(t)
    }
}

impl From<Vec<Value>> for Value {
    fn from(a: Vec<Value>) -> Self {
        Self::Array(a)
    }
}

impl From<Document> for Value {
    fn from(d: Document) -> Self {
        Self::Document(d)
    }
}

/// A document: an ordered map of field names to values.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Document(BTreeMap<String, Value>);

impl Document {
    /// Creates an empty document.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts a field, replacing any previous value.
    pub fn insert(&mut self, field: impl Into<String>, value: impl Into<Value>) -> &mut Self {
        self.0.insert(field.into(), value.into());
        self
    }

    /// Returns a field's value, if present.
    #[must_use]
    pub fn get(&self, field: &str) -> Option<&Value> {
        self.0.get(field)
    }

    /// Returns true if the field exists (including explicit `Null`).
    #[must_use]
    pub fn contains_field(&self, field: &str) -> bool {
        self.0.contains_key(field)
    }

    /// Removes a field, returning its value.
    pub fn remove(&mut self, field: &str) -> Option<Value> {
        self.0.remove(field)
    }

    /// Returns the number of fields.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns true if the document has no fields.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Iterates over `(field, value)` pairs in field order.
    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.0.iter()
    }
}

/// A single-field equality filter.
///
/// Matching follows document-store semantics: a filter value equal to any
/// element of an array field matches the document, in addition to exact
/// scalar equality. This is what makes `keyAltNames == name` lookups work
/// against the alt-name array.
#[derive(Debug, Clone, PartialEq)]
pub struct Filter {
    field: String,
    value: Value,
}

impl Filter {
    /// Builds an equality filter on a single field.
    pub fn eq(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self {
            field: field.into(),
            value: value.into(),
        }
    }

    /// Returns the filtered field name.
    #[must_use]
    pub fn field(&self) -> &str {
        &self.field
    }

    /// Returns the probe value.
    #[must_use]
    pub fn value(&self) -> &Value {
        &self.value
    }

    /// Returns true if `doc` satisfies the filter.
    #[must_use]
    pub fn matches(&self, doc: &Document) -> bool {
        match doc.get(&self.field) {
            Some(Value::Array(items)) => {
                items.contains(&self.value) || self.value == Value::Array(items.clone())
            }
            Some(v) => *v == self.value,
            None => false,
        }
    }
}

mod base64_serde {
    use base64::{engine::general_purpose::STANDARD, Engine};
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&STANDARD.encode(bytes))
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Vec<u8>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        STANDARD.decode(&s).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_filter_scalar_equality() {
        let mut doc = Document::new();
        doc.insert("name", "Frida Kahlo");

        assert!(Filter::eq("name", "Frida Kahlo").matches(&doc));
        assert!(!Filter::eq("name", "Diego Rivera").matches(&doc));
        assert!(!Filter::eq("missing", "x").matches(&doc));
    }

    #[test]
    fn test_filter_matches_array_element() {
        let mut doc = Document::new();
        doc.insert(
            "keyAltNames",
            vec![Value::from("primary"), Value::from("backup")],
        );

        assert!(Filter::eq("keyAltNames", "primary").matches(&doc));
        assert!(Filter::eq("keyAltNames", "backup").matches(&doc));
        assert!(!Filter::eq("keyAltNames", "other").matches(&doc));
    }

    #[test]
    fn test_binary_round_trips_through_serde() {
        let mut doc = Document::new();
        doc.insert("keyMaterial", vec![0u8, 1, 2, 255]);

        let json = serde_json::to_string(&doc).unwrap();
        let back: Document = serde_json::from_str(&json).unwrap();
        assert_eq!(back, doc);
    }
}
