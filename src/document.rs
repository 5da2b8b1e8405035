//! Document record, field map, and partial-update patch types.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::types::{DocId, TimestampMs};

/// Field map of a document. Values are untyped JSON.
pub type Fields = Map<String, Value>;

/// One document of a remote collection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    /// Server-assigned, immutable identifier.
    pub id: DocId,
    /// Feature-specific content.
    pub fields: Fields,
}

impl Document {
    /// Builds a document from an id and field map.
    pub fn new(id: impl Into<DocId>, fields: Fields) -> Self {
        Self {
            id: id.into(),
            fields,
        }
    }

    /// Returns the raw value stored under `name`.
    pub fn field(&self, name: &str) -> Option<&Value> {
        self.fields.get(name)
    }

    /// Returns the string under `name`, or `""` when missing or not a string.
    pub fn str_field(&self, name: &str) -> &str {
        self.fields.get(name).and_then(Value::as_str).unwrap_or("")
    }

    /// Returns the timestamp under `name`, or the epoch for legacy records
    /// that never had one.
    pub fn timestamp_or_epoch(&self, name: &str) -> TimestampMs {
        self.fields.get(name).and_then(Value::as_u64).unwrap_or(0)
    }

    /// Returns the array under `name`; missing or non-array values read as empty.
    pub fn array_field(&self, name: &str) -> &[Value] {
        self.fields
            .get(name)
            .and_then(Value::as_array)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }
}

/// Sparse patch: every present field replaces the document's value.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct FieldPatch {
    /// Replacement values.
    pub set: Fields,
}

impl FieldPatch {
    /// Returns an empty patch.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds one field replacement.
    pub fn with(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.set.insert(name.into(), value.into());
        self
    }

    /// Returns true when no fields are set.
    pub fn is_empty(&self) -> bool {
        self.set.is_empty()
    }

    /// Applies this patch in place to `doc`.
    pub fn apply_to(&self, doc: &mut Document) {
        for (name, value) in &self.set {
            doc.fields.insert(name.clone(), value.clone());
        }
    }
}

impl From<Fields> for FieldPatch {
    fn from(set: Fields) -> Self {
        Self { set }
    }
}

/// Appends `element` to the array stored under `field`, creating the array
/// when the field is absent. Duplicates are kept.
///
/// Returns `false` without touching the document when the field holds a
/// non-array value.
pub fn append_to_array(doc: &mut Document, field: &str, element: Value) -> bool {
    match doc.fields.get_mut(field) {
        Some(Value::Array(items)) => {
            items.push(element);
            true
        }
        Some(_) => false,
        None => {
            doc.fields
                .insert(field.to_string(), Value::Array(vec![element]));
            true
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn doc(value: Value) -> Document {
        let Value::Object(fields) = value else {
            panic!("object expected");
        };
        Document::new("d1", fields)
    }

    #[test]
    fn patch_replaces_only_named_fields() {
        let mut d = doc(json!({"name": "Milk", "link": "http://x"}));
        FieldPatch::new().with("name", "Oat milk").apply_to(&mut d);
        assert_eq!(d.str_field("name"), "Oat milk");
        assert_eq!(d.str_field("link"), "http://x");
    }

    #[test]
    fn append_keeps_duplicates_and_rejects_scalars() {
        let mut d = doc(json!({"replies": [], "title": "t"}));
        assert!(append_to_array(&mut d, "replies", json!("a")));
        assert!(append_to_array(&mut d, "replies", json!("a")));
        assert_eq!(d.array_field("replies").len(), 2);
        assert!(!append_to_array(&mut d, "title", json!("b")));
        assert!(append_to_array(&mut d, "tags", json!("x")));
        assert_eq!(d.array_field("tags"), &[json!("x")]);
    }

    #[test]
    fn legacy_missing_fields_read_as_defaults() {
        let d = doc(json!({"name": 3}));
        assert_eq!(d.timestamp_or_epoch("createdAt"), 0);
        assert_eq!(d.str_field("name"), "");
        assert!(d.array_field("replies").is_empty());
    }
}
