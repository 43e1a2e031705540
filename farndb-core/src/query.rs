//! Flat equality predicates and the matcher that evaluates them.
//!
//! A [`Predicate`] maps field names to expected values. A document matches when it has
//! every listed field and each value is structurally equal to the expected one. There
//! are no operators and no nesting of conditions; an empty predicate matches everything.
//!
//! ```ignore
//! use farndb::query::Predicate;
//!
//! let adults_named_alice = Predicate::new()
//!     .with("name", "Alice")
//!     .with("age", 30);
//! ```

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{
    document::{Document, FieldMap, value_kind},
    error::DocumentStoreError,
};

/// Structural view of a JSON value used for equality checks.
///
/// Integers and floats compare by numeric value, so `26` matches `26.0`. Objects compare
/// without regard to key order.
#[derive(Debug)]
pub(crate) enum Comparable<'a> {
    Null,
    Bool(bool),
    Integer(i128),
    Float(f64),
    String(&'a str),
    Array(Vec<Comparable<'a>>),
    Map(HashMap<&'a str, Comparable<'a>>),
}

impl<'a> From<&'a Value> for Comparable<'a> {
    fn from(value: &'a Value) -> Self {
        match value {
            Value::Null => Comparable::Null,
            Value::Bool(value) => Comparable::Bool(*value),
            Value::Number(number) => match (number.as_i64(), number.as_u64()) {
                (Some(value), _) => Comparable::Integer(value as i128),
                (None, Some(value)) => Comparable::Integer(value as i128),
                _ => Comparable::Float(number.as_f64().unwrap_or(f64::NAN)),
            },
            Value::String(value) => Comparable::String(value),
            Value::Array(arr) => Comparable::Array(
                arr
                    .iter()
                    .map(Comparable::from)
                    .collect::<Vec<_>>()
            ),
            Value::Object(map) => Comparable::Map(
                map
                    .iter()
                    .map(|(k, v)| (k.as_str(), Comparable::from(v)))
                    .collect::<HashMap<_, _>>()
            ),
        }
    }
}

impl<'a> PartialEq for Comparable<'a> {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Comparable::Null, Comparable::Null) => true,
            (Comparable::Bool(a), Comparable::Bool(b)) => a == b,
            (Comparable::Integer(a), Comparable::Integer(b)) => a == b,
            (Comparable::Float(a), Comparable::Float(b)) => a == b,
            (Comparable::Integer(a), Comparable::Float(b))
            | (Comparable::Float(b), Comparable::Integer(a)) => integer_equals_float(*a, *b),
            (Comparable::String(a), Comparable::String(b)) => a == b,
            (Comparable::Array(a), Comparable::Array(b)) => a == b,
            (Comparable::Map(a), Comparable::Map(b)) => a == b,
            _ => false,
        }
    }
}

/// Exact comparison: the float must be integral and convert back to the same integer.
fn integer_equals_float(integer: i128, float: f64) -> bool {
    // rounds up to 2^127, the first float outside the i128 range
    const LIMIT: f64 = i128::MAX as f64;

    float.is_finite()
        && float.fract() == 0.0
        && (-LIMIT..LIMIT).contains(&float)
        && float as i128 == integer
}

/// Deep structural equality between two JSON values.
pub fn values_equal(left: &Value, right: &Value) -> bool {
    Comparable::from(left) == Comparable::from(right)
}

/// A flat equality filter: field name to expected value.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Predicate(FieldMap);

impl Predicate {
    /// Creates an empty predicate, which matches every document.
    pub fn new() -> Self {
        Self(FieldMap::new())
    }

    /// Alias for [`Predicate::new`] that reads better at call sites.
    pub fn all() -> Self {
        Self::new()
    }

    /// Requires `field` to equal `value`.
    pub fn with(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.0.insert(field.into(), value.into());
        self
    }

    /// Returns `true` if the predicate has no conditions.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Number of conditions.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Iterates over the `(field, expected)` pairs.
    pub fn conditions(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.0.iter()
    }

    /// Evaluates the predicate against a document. See [`matches`].
    pub fn matches(&self, document: &Document) -> bool {
        matches(document, self)
    }
}

impl From<FieldMap> for Predicate {
    fn from(map: FieldMap) -> Self {
        Self(map)
    }
}

impl TryFrom<Value> for Predicate {
    type Error = DocumentStoreError;

    fn try_from(value: Value) -> Result<Self, Self::Error> {
        match value {
            Value::Object(map) => Ok(Self(map)),
            // `null` is accepted as "no filter"
            Value::Null => Ok(Self::new()),
            other => Err(DocumentStoreError::InvalidPredicate(format!(
                "expected a JSON object, found {}",
                value_kind(&other)
            ))),
        }
    }
}

impl<K: Into<String>, V: Into<Value>> FromIterator<(K, V)> for Predicate {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(
            iter.into_iter()
                .map(|(field, value)| (field.into(), value.into()))
                .collect()
        )
    }
}

/// Returns `true` if `document` satisfies every condition in `predicate`.
///
/// A field listed in the predicate but absent from the document is a mismatch, even
/// when the expected value is `null`. Never fails.
pub fn matches(document: &Document, predicate: &Predicate) -> bool {
    predicate
        .conditions()
        .all(|(field, expected)| match document.get(field) {
            Some(actual) => values_equal(actual, expected),
            None => false,
        })
}
