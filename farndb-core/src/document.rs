//! The document model: schema-less JSON objects plus engine-managed metadata.
//!
//! A [`Document`] is a JSON object that always carries three fields owned by the engine:
//!
//! - `_id` - an opaque string, unique within its collection and never changed after insert
//! - `_created_at` - set once when the document is inserted
//! - `_updated_at` - set on insert and refreshed by every update
//!
//! Caller-supplied data travels as [`Fields`] (for inserts) or [`Patch`] (for updates).
//! Any engine-managed key present in caller data is ignored.

use std::ops::Index;

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use serde_json::{Map, Value, from_value};

use crate::error::{DocumentStoreError, DocumentStoreResult};

/// Field holding the document identifier.
pub const ID_FIELD: &str = "_id";
/// Field holding the insertion timestamp.
pub const CREATED_AT_FIELD: &str = "_created_at";
/// Field holding the last-modification timestamp.
pub const UPDATED_AT_FIELD: &str = "_updated_at";
/// Fields owned by the engine. Caller values for these keys are discarded.
pub const RESERVED_FIELDS: [&str; 3] = [ID_FIELD, CREATED_AT_FIELD, UPDATED_AT_FIELD];

/// The raw field map backing documents, fields and predicates.
pub type FieldMap = Map<String, Value>;

static NULL: Value = Value::Null;

/// Returns `true` if `field` is managed by the engine.
pub fn is_reserved(field: &str) -> bool {
    RESERVED_FIELDS.contains(&field)
}

/// Formats a timestamp the way the engine writes `_created_at` and `_updated_at`.
pub fn format_timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Micros, true)
}

/// Parses a stored timestamp.
///
/// Accepts RFC 3339 strings as written by the engine, and epoch seconds (integer or
/// fractional) as found in older files.
pub fn parse_timestamp(value: &Value) -> Option<DateTime<Utc>> {
    match value {
        Value::String(text) => DateTime::parse_from_rfc3339(text)
            .ok()
            .map(|at| at.with_timezone(&Utc)),
        Value::Number(number) => {
            let seconds = number.as_f64()?;
            let micros = (seconds * 1_000_000.0).round() as i64;

            DateTime::from_timestamp_micros(micros)
        },
        _ => None,
    }
}

pub(crate) fn value_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

/// Caller-supplied document content.
///
/// Built either from a JSON object (`Fields::try_from(json!({...}))`) or incrementally
/// with [`Fields::with`].
///
/// # Example
///
/// ```ignore
/// use farndb::document::Fields;
///
/// let fields = Fields::new()
///     .with("name", "Alice")
///     .with("age", 25);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Fields(FieldMap);

/// A set of fields to overlay onto matching documents during an update.
///
/// A `null` value overwrites the field with JSON `null`; it does not remove the field.
pub type Patch = Fields;

impl Fields {
    /// Creates an empty field set.
    pub fn new() -> Self {
        Self(FieldMap::new())
    }

    /// Adds a field and returns the updated set.
    pub fn with(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.0.insert(field.into(), value.into());
        self
    }

    /// Inserts a field, returning the previous value if there was one.
    pub fn insert(&mut self, field: impl Into<String>, value: impl Into<Value>) -> Option<Value> {
        self.0.insert(field.into(), value.into())
    }

    /// Returns the value of a field.
    pub fn get(&self, field: &str) -> Option<&Value> {
        self.0.get(field)
    }

    /// Number of fields.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns `true` if there are no fields.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Iterates over the fields that are not engine-managed.
    pub fn user_fields(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.0
            .iter()
            .filter(|(field, _)| !is_reserved(field))
    }

    /// Consumes the set and returns the raw map.
    pub fn into_inner(self) -> FieldMap {
        self.0
    }
}

impl From<FieldMap> for Fields {
    fn from(map: FieldMap) -> Self {
        Self(map)
    }
}

impl TryFrom<Value> for Fields {
    type Error = DocumentStoreError;

    fn try_from(value: Value) -> Result<Self, Self::Error> {
        match value {
            Value::Object(map) => Ok(Self(map)),
            other => Err(DocumentStoreError::InvalidDocument(format!(
                "expected a JSON object, found {}",
                value_kind(&other)
            ))),
        }
    }
}

impl<K: Into<String>, V: Into<Value>> FromIterator<(K, V)> for Fields {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(
            iter.into_iter()
                .map(|(field, value)| (field.into(), value.into()))
                .collect()
        )
    }
}

/// A stored document.
///
/// Documents are only created by the engine, so the metadata fields are always present.
/// Loading a document whose `_id` is missing or not a string fails.
///
/// Indexing with a field name returns `Value::Null` for missing fields, like
/// `serde_json::Value` does:
///
/// ```ignore
/// let alice = users.find_one(json!({"name": "Alice"})).await?.unwrap();
/// assert_eq!(alice["age"], 26);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(into = "FieldMap", try_from = "FieldMap")]
pub struct Document(FieldMap);

impl Document {
    /// Creates a document from caller fields, stamping it with `id` and the current time.
    ///
    /// Engine-managed keys in `fields` are dropped. Always succeeds.
    pub fn new(id: impl Into<String>, fields: Fields) -> Self {
        Self::new_at(id, fields, Utc::now())
    }

    pub(crate) fn new_at(id: impl Into<String>, fields: Fields, at: DateTime<Utc>) -> Self {
        let stamp = Value::String(format_timestamp(at));
        let mut map = FieldMap::with_capacity(fields.len() + RESERVED_FIELDS.len());

        map.insert(ID_FIELD.to_string(), Value::String(id.into()));
        map.insert(CREATED_AT_FIELD.to_string(), stamp.clone());
        map.insert(UPDATED_AT_FIELD.to_string(), stamp);

        for (field, value) in fields.into_inner() {
            if !is_reserved(&field) {
                map.insert(field, value);
            }
        }

        Self(map)
    }

    /// Returns a copy of this document with `patch` overlaid and `_updated_at` refreshed.
    ///
    /// `_id` and `_created_at` are preserved; engine-managed keys in the patch are ignored.
    pub fn apply_update(&self, patch: &Patch) -> Self {
        self.apply_update_at(patch, Utc::now())
    }

    pub(crate) fn apply_update_at(&self, patch: &Patch, at: DateTime<Utc>) -> Self {
        let mut map = self.0.clone();

        for (field, value) in patch.user_fields() {
            map.insert(field.clone(), value.clone());
        }

        map.insert(UPDATED_AT_FIELD.to_string(), Value::String(format_timestamp(at)));

        Self(map)
    }

    /// The document identifier.
    pub fn id(&self) -> &str {
        self.0
            .get(ID_FIELD)
            .and_then(Value::as_str)
            .unwrap_or_default()
    }

    /// When the document was inserted, if the stored timestamp is readable.
    pub fn created_at(&self) -> Option<DateTime<Utc>> {
        self.0
            .get(CREATED_AT_FIELD)
            .and_then(parse_timestamp)
    }

    /// When the document was last inserted or updated, if the stored timestamp is readable.
    pub fn updated_at(&self) -> Option<DateTime<Utc>> {
        self.0
            .get(UPDATED_AT_FIELD)
            .and_then(parse_timestamp)
    }

    /// Returns the value of a field, metadata included.
    pub fn get(&self, field: &str) -> Option<&Value> {
        self.0.get(field)
    }

    /// Returns `true` if the document has the field.
    pub fn contains(&self, field: &str) -> bool {
        self.0.contains_key(field)
    }

    /// The full field map, metadata included.
    pub fn fields(&self) -> &FieldMap {
        &self.0
    }

    /// Iterates over the caller-owned fields, skipping engine metadata.
    pub fn user_fields(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.0
            .iter()
            .filter(|(field, _)| !is_reserved(field))
    }

    /// Deserializes the document into a typed value.
    ///
    /// Metadata fields are included, so `T` may declare `_id` and the timestamps or
    /// ignore them.
    ///
    /// # Errors
    ///
    /// Returns [`DocumentStoreError::Serialization`] if the document does not fit `T`.
    pub fn deserialize_into<T: DeserializeOwned>(&self) -> DocumentStoreResult<T> {
        Ok(from_value(Value::Object(self.0.clone()))?)
    }

    /// Consumes the document and returns the raw map.
    pub fn into_inner(self) -> FieldMap {
        self.0
    }

    /// Consumes the document and returns it as a JSON value.
    pub fn into_value(self) -> Value {
        Value::Object(self.0)
    }
}

impl From<Document> for FieldMap {
    fn from(document: Document) -> Self {
        document.0
    }
}

impl TryFrom<FieldMap> for Document {
    type Error = DocumentStoreError;

    fn try_from(map: FieldMap) -> Result<Self, Self::Error> {
        match map.get(ID_FIELD) {
            Some(Value::String(_)) => Ok(Self(map)),
            Some(other) => Err(DocumentStoreError::InvalidDocument(format!(
                "`{ID_FIELD}` must be a string, found {}",
                value_kind(other)
            ))),
            None => Err(DocumentStoreError::InvalidDocument(format!(
                "missing `{ID_FIELD}` field"
            ))),
        }
    }
}

impl TryFrom<Value> for Document {
    type Error = DocumentStoreError;

    fn try_from(value: Value) -> Result<Self, Self::Error> {
        match value {
            Value::Object(map) => Document::try_from(map),
            other => Err(DocumentStoreError::InvalidDocument(format!(
                "expected a JSON object, found {}",
                value_kind(&other)
            ))),
        }
    }
}

impl Index<&str> for Document {
    type Output = Value;

    fn index(&self, field: &str) -> &Value {
        self.0.get(field).unwrap_or(&NULL)
    }
}
