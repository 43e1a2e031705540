//! Collections of documents.
//!
//! This module provides two types:
//!
//! - [`Collection`] - the in-memory, insertion-ordered set of documents that the store owns
//! - [`CollectionRef`] - a borrowed handle bound to a [`DocumentStore`] and a collection name,
//!   so per-collection calls don't have to repeat the name
//!
//! # Example
//!
//! ```ignore
//! use serde_json::json;
//!
//! # async fn example(store: &farndb::store::DocumentStore<impl farndb::backend::StoreBackend>) -> farndb::error::DocumentStoreResult<()> {
//! let users = store.collection("users");
//! let id = users.insert(json!({"name": "Alice", "age": 25})).await?;
//! assert_eq!(users.count(json!({})).await?, 1);
//! # Ok(()) }
//! ```

use std::collections::HashSet;

use serde_json::Value;
use uuid::Uuid;

use crate::{
    backend::StoreBackend,
    document::{Document, Fields, Patch},
    error::{DocumentStoreError, DocumentStoreResult},
    query::{Predicate, matches},
    store::DocumentStore,
};

/// Generates a fresh document identifier.
pub fn generate_id() -> String {
    Uuid::new_v4().to_string()
}

/// A named, insertion-ordered set of documents.
///
/// IDs are unique within a collection. Updates keep documents in place and deletes keep
/// the relative order of the survivors.
#[derive(Debug, Clone, PartialEq)]
pub struct Collection {
    name: String,
    documents: Vec<Document>,
    ids: HashSet<String>,
}

impl Collection {
    /// Creates an empty collection.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            documents: Vec::new(),
            ids: HashSet::new(),
        }
    }

    /// Rebuilds a collection from stored documents, keeping their order.
    ///
    /// # Errors
    ///
    /// Returns [`DocumentStoreError::InvalidDocument`] if two documents share an ID.
    pub fn from_documents(
        name: impl Into<String>,
        documents: Vec<Document>,
    ) -> DocumentStoreResult<Self> {
        let name = name.into();
        let mut ids = HashSet::with_capacity(documents.len());

        for document in &documents {
            if !ids.insert(document.id().to_string()) {
                return Err(DocumentStoreError::InvalidDocument(format!(
                    "duplicate id {} in collection {}",
                    document.id(),
                    name
                )));
            }
        }

        Ok(Self { name, documents, ids })
    }

    /// Returns the name of this collection.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Number of documents.
    pub fn len(&self) -> usize {
        self.documents.len()
    }

    /// Returns `true` if the collection holds no documents.
    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }

    /// All documents in insertion order.
    pub fn documents(&self) -> &[Document] {
        &self.documents
    }

    /// Looks a document up by ID.
    pub fn get(&self, id: &str) -> Option<&Document> {
        if !self.ids.contains(id) {
            return None;
        }

        self.documents
            .iter()
            .find(|document| document.id() == id)
    }

    /// Appends a new document built from `fields` and returns its ID.
    pub fn insert(&mut self, fields: Fields) -> String {
        self.insert_with(fields, generate_id)
    }

    /// Like [`Collection::insert`], drawing candidate IDs from `next_id` until one is
    /// not already taken.
    pub fn insert_with(&mut self, fields: Fields, mut next_id: impl FnMut() -> String) -> String {
        let id = loop {
            let candidate = next_id();

            if !self.ids.contains(&candidate) {
                break candidate;
            }
        };

        self.ids.insert(id.clone());
        self.documents.push(Document::new(id.clone(), fields));

        id
    }

    /// Lazily yields the documents matching `predicate`, in insertion order.
    pub fn find<'a>(&'a self, predicate: &'a Predicate) -> impl Iterator<Item = &'a Document> + 'a {
        self.documents
            .iter()
            .filter(move |document| matches(document, predicate))
    }

    /// Returns the first document matching `predicate`.
    pub fn find_one(&self, predicate: &Predicate) -> Option<&Document> {
        self.documents
            .iter()
            .find(|document| matches(document, predicate))
    }

    /// Applies `patch` to every matching document and returns how many were updated.
    pub fn update(&mut self, predicate: &Predicate, patch: &Patch) -> usize {
        let mut updated = 0;

        for document in self.documents.iter_mut() {
            if matches(document, predicate) {
                *document = document.apply_update(patch);
                updated += 1;
            }
        }

        updated
    }

    /// Removes every matching document and returns how many were removed.
    pub fn delete(&mut self, predicate: &Predicate) -> usize {
        let before = self.documents.len();
        let ids = &mut self.ids;

        self.documents.retain(|document| {
            if matches(document, predicate) {
                ids.remove(document.id());
                false
            } else {
                true
            }
        });

        before - self.documents.len()
    }

    /// Counts the documents matching `predicate`.
    pub fn count(&self, predicate: &Predicate) -> usize {
        self.find(predicate).count()
    }
}

/// A handle to one collection of a [`DocumentStore`].
///
/// Every call goes through the store, so mutations are persisted exactly as if they
/// had been made on the store directly.
#[derive(Debug)]
pub struct CollectionRef<'a, B: StoreBackend> {
    name: String,
    store: &'a DocumentStore<B>,
}

impl<'a, B: StoreBackend> CollectionRef<'a, B> {
    pub(crate) fn new(name: String, store: &'a DocumentStore<B>) -> Self {
        Self { name, store }
    }

    /// Returns the name of this collection.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Inserts a document. See [`DocumentStore::insert`].
    pub async fn insert<F>(&self, fields: F) -> DocumentStoreResult<String>
    where
        F: TryInto<Fields>,
        F::Error: Into<DocumentStoreError>,
    {
        self.store
            .insert(&self.name, fields)
            .await
    }

    /// Finds matching documents. See [`DocumentStore::find`].
    pub async fn find<P>(&self, predicate: P) -> DocumentStoreResult<Vec<Document>>
    where
        P: TryInto<Predicate>,
        P::Error: Into<DocumentStoreError>,
    {
        self.store
            .find(&self.name, predicate)
            .await
    }

    /// Finds the first matching document. See [`DocumentStore::find_one`].
    pub async fn find_one<P>(&self, predicate: P) -> DocumentStoreResult<Option<Document>>
    where
        P: TryInto<Predicate>,
        P::Error: Into<DocumentStoreError>,
    {
        self.store
            .find_one(&self.name, predicate)
            .await
    }

    /// Updates matching documents. See [`DocumentStore::update`].
    pub async fn update<P, U>(&self, predicate: P, patch: U) -> DocumentStoreResult<usize>
    where
        P: TryInto<Predicate>,
        P::Error: Into<DocumentStoreError>,
        U: TryInto<Patch>,
        U::Error: Into<DocumentStoreError>,
    {
        self.store
            .update(&self.name, predicate, patch)
            .await
    }

    /// Deletes matching documents. See [`DocumentStore::delete`].
    pub async fn delete<P>(&self, predicate: P) -> DocumentStoreResult<usize>
    where
        P: TryInto<Predicate>,
        P::Error: Into<DocumentStoreError>,
    {
        self.store
            .delete(&self.name, predicate)
            .await
    }

    /// Counts matching documents. See [`DocumentStore::count`].
    pub async fn count<P>(&self, predicate: P) -> DocumentStoreResult<usize>
    where
        P: TryInto<Predicate>,
        P::Error: Into<DocumentStoreError>,
    {
        self.store
            .count(&self.name, predicate)
            .await
    }

    /// Counts every document in the collection.
    pub async fn count_all(&self) -> DocumentStoreResult<usize> {
        self.count(Value::Null).await
    }

    /// Drops the whole collection. See [`DocumentStore::drop_collection`].
    pub async fn drop_collection(self) -> DocumentStoreResult<bool> {
        self.store
            .drop_collection(&self.name)
            .await
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn fields(value: Value) -> Fields {
        Fields::try_from(value).unwrap()
    }

    fn pred(value: Value) -> Predicate {
        Predicate::try_from(value).unwrap()
    }

    fn names(collection: &Collection) -> Vec<String> {
        collection
            .documents()
            .iter()
            .map(|doc| doc["name"].as_str().unwrap_or_default().to_string())
            .collect()
    }

    fn people() -> Collection {
        let mut collection = Collection::new("people");

        for (name, team) in [("Ann", "red"), ("Bea", "blue"), ("Cid", "red"), ("Dee", "blue")] {
            collection.insert(fields(json!({"name": name, "team": team})));
        }

        collection
    }

    #[test]
    fn insert_returns_unique_stable_ids() {
        let mut collection = Collection::new("users");
        let first = collection.insert(fields(json!({"name": "Ann"})));
        let second = collection.insert(fields(json!({"name": "Bea"})));

        assert_ne!(first, second);
        assert_eq!(collection.get(&first).unwrap()["name"], "Ann");
        assert_eq!(collection.find_one(&pred(json!({"_id": second}))).unwrap()["name"], "Bea");
    }

    #[test]
    fn insert_regenerates_colliding_ids() {
        let mut collection = Collection::new("users");
        let mut candidates = vec!["b", "a", "a"];

        let first = collection.insert_with(fields(json!({})), || "a".to_string());
        let second = collection.insert_with(fields(json!({})), || {
            candidates
                .pop()
                .unwrap_or("z")
                .to_string()
        });

        assert_eq!(first, "a");
        assert_eq!(second, "b");
        assert_eq!(collection.len(), 2);
    }

    #[test]
    fn find_preserves_insertion_order_and_restarts() {
        let collection = people();
        let red = pred(json!({"team": "red"}));

        let first: Vec<_> = collection.find(&red).map(|doc| doc["name"].clone()).collect();
        let again: Vec<_> = collection.find(&red).map(|doc| doc["name"].clone()).collect();

        assert_eq!(first, vec![json!("Ann"), json!("Cid")]);
        assert_eq!(first, again);
        assert_eq!(collection.find(&pred(json!({"team": "green"}))).count(), 0);
    }

    #[test]
    fn update_keeps_positions() {
        let mut collection = people();
        let updated = collection.update(&pred(json!({"team": "blue"})), &fields(json!({"team": "green"})));

        assert_eq!(updated, 2);
        assert_eq!(names(&collection), vec!["Ann", "Bea", "Cid", "Dee"]);
        assert_eq!(collection.documents()[1]["team"], "green");
        assert_eq!(collection.documents()[3]["team"], "green");
        assert_eq!(collection.update(&pred(json!({"team": "blue"})), &fields(json!({"x": 1}))), 0);
    }

    #[test]
    fn delete_keeps_survivor_order_and_is_idempotent() {
        let mut collection = people();
        let red = pred(json!({"team": "red"}));

        assert_eq!(collection.delete(&red), 2);
        assert_eq!(collection.delete(&red), 0);
        assert_eq!(names(&collection), vec!["Bea", "Dee"]);
    }

    #[test]
    fn deleted_ids_are_released() {
        let mut collection = Collection::new("users");
        let id = collection.insert_with(fields(json!({"n": 1})), || "fixed".to_string());

        collection.delete(&Predicate::all());
        assert!(collection.get(&id).is_none());

        let again = collection.insert_with(fields(json!({"n": 2})), || "fixed".to_string());
        assert_eq!(again, "fixed");
    }

    #[test]
    fn find_one_outlives_its_predicate() {
        let collection = people();

        let found = {
            let predicate = pred(json!({"team": "blue"}));
            collection.find_one(&predicate)
        };

        assert_eq!(found.unwrap()["name"], "Bea");
        assert!(collection.find_one(&pred(json!({"team": "green"}))).is_none());
    }

    #[test]
    fn count_defaults_to_all() {
        let collection = people();

        assert_eq!(collection.count(&Predicate::all()), 4);
        assert_eq!(collection.count(&pred(json!({"team": "red"}))), 2);
    }

    #[test]
    fn from_documents_rejects_duplicate_ids() {
        let doc = Document::new("same", Fields::new());
        let result = Collection::from_documents("dupes", vec![doc.clone(), doc]);

        assert!(matches!(result, Err(DocumentStoreError::InvalidDocument(_))));
    }
}
