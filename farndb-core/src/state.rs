//! The in-memory image of a whole store and its on-disk JSON form.
//!
//! On disk a store is one JSON object whose keys are collection names and whose values
//! are arrays of documents:
//!
//! ```text
//! {
//!   "users": [
//!     { "_id": "…", "_created_at": "…", "_updated_at": "…", "name": "Alice" }
//!   ]
//! }
//! ```
//!
//! Collection keys are written in sorted order and document fields in insertion order,
//! so successive saves diff cleanly.

use std::{collections::BTreeMap, path::Path};

use serde_json::{Map, Value};

use crate::{
    collection::Collection,
    document::{Document, value_kind},
    error::{DocumentStoreError, DocumentStoreResult},
};

/// Every collection of a store, keyed by name.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StoreState {
    collections: BTreeMap<String, Collection>,
}

impl StoreState {
    /// Creates an empty state.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the named collection, if it exists.
    pub fn collection(&self, name: &str) -> Option<&Collection> {
        self.collections.get(name)
    }

    /// Returns the named collection, if it exists.
    pub fn collection_mut(&mut self, name: &str) -> Option<&mut Collection> {
        self.collections.get_mut(name)
    }

    /// Returns the named collection, creating it empty if needed.
    pub fn collection_or_create(&mut self, name: &str) -> &mut Collection {
        self.collections
            .entry(name.to_string())
            .or_insert_with(|| Collection::new(name))
    }

    /// Removes a collection, returning it if it existed.
    pub fn remove_collection(&mut self, name: &str) -> Option<Collection> {
        self.collections.remove(name)
    }

    /// Returns `true` if the collection exists.
    pub fn contains(&self, name: &str) -> bool {
        self.collections.contains_key(name)
    }

    /// Collection names in sorted order.
    pub fn collection_names(&self) -> Vec<String> {
        self.collections
            .keys()
            .cloned()
            .collect()
    }

    /// Iterates over the collections in name order.
    pub fn collections(&self) -> impl Iterator<Item = &Collection> {
        self.collections.values()
    }

    /// Total number of documents across all collections.
    pub fn document_count(&self) -> usize {
        self.collections
            .values()
            .map(Collection::len)
            .sum()
    }

    /// Builds the JSON value written to disk.
    pub fn to_value(&self) -> Value {
        Value::Object(
            self.collections
                .iter()
                .map(|(name, collection)| {
                    (
                        name.clone(),
                        Value::Array(
                            collection
                                .documents()
                                .iter()
                                .cloned()
                                .map(Document::into_value)
                                .collect()
                        ),
                    )
                })
                .collect::<Map<String, Value>>()
        )
    }

    /// Serializes the state, indented when `pretty` is set.
    ///
    /// # Errors
    ///
    /// Returns [`DocumentStoreError::Serialization`] if encoding fails.
    pub fn to_bytes(&self, pretty: bool) -> DocumentStoreResult<Vec<u8>> {
        let value = self.to_value();

        Ok(match pretty {
            true => serde_json::to_vec_pretty(&value)?,
            false => serde_json::to_vec(&value)?,
        })
    }

    /// Rebuilds a state from its JSON value. `origin` is only used in error messages.
    ///
    /// # Errors
    ///
    /// Returns [`DocumentStoreError::CorruptStore`] if the value is not an object of
    /// arrays of documents, a document lacks a string `_id`, or an ID repeats within a
    /// collection.
    pub fn from_value(value: Value, origin: &Path) -> DocumentStoreResult<Self> {
        let map = match value {
            Value::Object(map) => map,
            other => {
                return Err(DocumentStoreError::corrupt(
                    origin,
                    format!("top level must be an object, found {}", value_kind(&other)),
                ));
            },
        };

        let mut collections = BTreeMap::new();

        for (name, entries) in map {
            let entries = match entries {
                Value::Array(entries) => entries,
                other => {
                    return Err(DocumentStoreError::corrupt(
                        origin,
                        format!("collection {name} must be an array, found {}", value_kind(&other)),
                    ));
                },
            };

            let documents = entries
                .into_iter()
                .enumerate()
                .map(|(index, entry)| {
                    Document::try_from(entry).map_err(|err| {
                        DocumentStoreError::corrupt(
                            origin,
                            format!("collection {name}, entry {index}: {}", reason(err)),
                        )
                    })
                })
                .collect::<DocumentStoreResult<Vec<_>>>()?;

            let collection = Collection::from_documents(name.clone(), documents)
                .map_err(|err| DocumentStoreError::corrupt(origin, reason(err)))?;

            collections.insert(name, collection);
        }

        Ok(Self { collections })
    }

    /// Parses the on-disk bytes. `origin` is only used in error messages.
    ///
    /// # Errors
    ///
    /// Returns [`DocumentStoreError::CorruptStore`] if the bytes are not valid JSON or do
    /// not describe a store. See [`StoreState::from_value`].
    pub fn from_slice(bytes: &[u8], origin: &Path) -> DocumentStoreResult<Self> {
        let value = serde_json::from_slice::<Value>(bytes)
            .map_err(|err| DocumentStoreError::corrupt(origin, err.to_string()))?;

        Self::from_value(value, origin)
    }
}

fn reason(err: DocumentStoreError) -> String {
    match err {
        DocumentStoreError::InvalidDocument(reason) => reason,
        other => other.to_string(),
    }
}
