//! Main document store interface.
//!
//! [`DocumentStore`] owns the in-memory image of every collection and a backend that
//! persists it. Reads are served from memory. Every mutation goes through one private
//! choke point that applies the change to a copy of the current state, hands the whole
//! copy to the backend, and publishes it only once the backend reports success. A failed
//! save therefore leaves the store exactly as it was before the call.
//!
//! # Example
//!
//! ```ignore
//! use farndb::{memory::InMemoryStore, store::DocumentStore};
//! use serde_json::json;
//!
//! let store = DocumentStore::open(InMemoryStore::new()).await?;
//!
//! let id = store.insert("users", json!({"name": "Alice", "age": 25})).await?;
//! store.update("users", json!({"name": "Alice"}), json!({"age": 26})).await?;
//!
//! let alice = store.find_one("users", json!({"_id": id})).await?;
//! # Ok::<(), farndb::error::DocumentStoreError>(())
//! ```

use std::{fmt, path::Path};

use mea::{mutex::Mutex, rwlock::RwLock};
use tracing::{debug, info, warn};

use crate::{
    backend::StoreBackend,
    collection::CollectionRef,
    document::{Document, Fields, Patch},
    error::{DocumentStoreError, DocumentStoreResult},
    query::Predicate,
    state::StoreState,
};

/// A document store bound to a specific backend implementation.
///
/// The store can be shared between tasks behind an `Arc`. Mutations are serialized
/// against each other; reads run concurrently and always see the last committed state.
///
/// # Type Parameters
///
/// * `B` - The backend implementation type
pub struct DocumentStore<B: StoreBackend> {
    backend: B,
    state: RwLock<StoreState>,
    writer: Mutex<()>,
}

impl<B: StoreBackend> fmt::Debug for DocumentStore<B> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DocumentStore")
            .field("backend", &self.backend)
            .finish_non_exhaustive()
    }
}

/// Outcome of a mutation closure: the value returned to the caller and whether the
/// state actually changed.
struct Applied<T> {
    output: T,
    changed: bool,
}

impl<T> Applied<T> {
    fn new(output: T, changed: bool) -> Self {
        Self { output, changed }
    }
}

impl<B: StoreBackend> DocumentStore<B> {
    /// Opens a store, loading the last committed state from `backend`.
    ///
    /// # Errors
    ///
    /// Returns [`DocumentStoreError::CorruptStore`] if the persisted data is unreadable,
    /// or [`DocumentStoreError::IoFailure`] if it cannot be read at all.
    pub async fn open(backend: B) -> DocumentStoreResult<Self> {
        let state = backend.load().await?;

        info!(
            target: "farndb::store",
            location = ?backend.location(),
            collections = state.collection_names().len(),
            documents = state.document_count(),
            "opened document store"
        );

        Ok(Self {
            backend,
            state: RwLock::new(state),
            writer: Mutex::new(()),
        })
    }

    /// Returns the backend this store persists to.
    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Gets a handle to the collection with the given name.
    ///
    /// The collection does not need to exist; it is created by the first insert.
    pub fn collection<'a>(&'a self, name: &str) -> CollectionRef<'a, B> {
        CollectionRef::new(name.to_string(), self)
    }

    /// Inserts a document and returns its generated ID.
    ///
    /// Creates the collection if it does not exist. Caller-supplied `_id`,
    /// `_created_at` and `_updated_at` fields are ignored.
    ///
    /// # Arguments
    ///
    /// * `collection` - The target collection name
    /// * `fields` - The document fields, as [`Fields`] or a JSON object
    ///
    /// # Errors
    ///
    /// Returns [`DocumentStoreError::InvalidDocument`] if `fields` is not an object, or
    /// the backend's error if the new state cannot be persisted.
    pub async fn insert<F>(&self, collection: &str, fields: F) -> DocumentStoreResult<String>
    where
        F: TryInto<Fields>,
        F::Error: Into<DocumentStoreError>,
    {
        let fields: Fields = argument(fields)?;

        self.mutate("insert", collection, |state| {
            Applied::new(
                state
                    .collection_or_create(collection)
                    .insert(fields),
                true,
            )
        })
        .await
    }

    /// Returns every document in `collection` matching `predicate`, in insertion order.
    ///
    /// A missing collection yields an empty vector.
    ///
    /// # Errors
    ///
    /// Returns [`DocumentStoreError::InvalidPredicate`] if `predicate` is not an object.
    pub async fn find<P>(&self, collection: &str, predicate: P) -> DocumentStoreResult<Vec<Document>>
    where
        P: TryInto<Predicate>,
        P::Error: Into<DocumentStoreError>,
    {
        let predicate: Predicate = argument(predicate)?;
        let state = self.state.read().await;

        Ok(state
            .collection(collection)
            .map(|coll| {
                coll.find(&predicate)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }

    /// Returns the first document in `collection` matching `predicate`, or `None`.
    ///
    /// # Errors
    ///
    /// Returns [`DocumentStoreError::InvalidPredicate`] if `predicate` is not an object.
    pub async fn find_one<P>(&self, collection: &str, predicate: P) -> DocumentStoreResult<Option<Document>>
    where
        P: TryInto<Predicate>,
        P::Error: Into<DocumentStoreError>,
    {
        let predicate: Predicate = argument(predicate)?;
        let state = self.state.read().await;

        Ok(state
            .collection(collection)
            .and_then(|coll| coll.find_one(&predicate))
            .cloned())
    }

    /// Overlays `patch` onto every matching document and returns how many were updated.
    ///
    /// A field set to `null` in the patch is stored as `null`, not removed. Nothing is
    /// written when no document matches.
    ///
    /// # Errors
    ///
    /// Returns a validation error if `predicate` or `patch` is not an object, or the
    /// backend's error if the new state cannot be persisted.
    pub async fn update<P, U>(&self, collection: &str, predicate: P, patch: U) -> DocumentStoreResult<usize>
    where
        P: TryInto<Predicate>,
        P::Error: Into<DocumentStoreError>,
        U: TryInto<Patch>,
        U::Error: Into<DocumentStoreError>,
    {
        let predicate: Predicate = argument(predicate)?;
        let patch: Patch = argument(patch)?;

        self.mutate("update", collection, |state| {
            let updated = state
                .collection_mut(collection)
                .map(|coll| coll.update(&predicate, &patch))
                .unwrap_or(0);

            Applied::new(updated, updated > 0)
        })
        .await
    }

    /// Removes every matching document and returns how many were removed.
    ///
    /// # Errors
    ///
    /// Returns [`DocumentStoreError::InvalidPredicate`] if `predicate` is not an object,
    /// or the backend's error if the new state cannot be persisted.
    pub async fn delete<P>(&self, collection: &str, predicate: P) -> DocumentStoreResult<usize>
    where
        P: TryInto<Predicate>,
        P::Error: Into<DocumentStoreError>,
    {
        let predicate: Predicate = argument(predicate)?;

        self.mutate("delete", collection, |state| {
            let deleted = state
                .collection_mut(collection)
                .map(|coll| coll.delete(&predicate))
                .unwrap_or(0);

            Applied::new(deleted, deleted > 0)
        })
        .await
    }

    /// Counts the documents in `collection` matching `predicate`.
    ///
    /// Pass `serde_json::Value::Null` or [`Predicate::all`] to count everything.
    ///
    /// # Errors
    ///
    /// Returns [`DocumentStoreError::InvalidPredicate`] if `predicate` is not an object.
    pub async fn count<P>(&self, collection: &str, predicate: P) -> DocumentStoreResult<usize>
    where
        P: TryInto<Predicate>,
        P::Error: Into<DocumentStoreError>,
    {
        let predicate: Predicate = argument(predicate)?;
        let state = self.state.read().await;

        Ok(state
            .collection(collection)
            .map(|coll| coll.count(&predicate))
            .unwrap_or(0))
    }

    /// Lists all collections in the store, sorted by name.
    pub async fn list_collections(&self) -> DocumentStoreResult<Vec<String>> {
        Ok(self
            .state
            .read()
            .await
            .collection_names())
    }

    /// Creates an empty collection. Returns `false` if it already existed.
    ///
    /// # Errors
    ///
    /// Returns the backend's error if the new state cannot be persisted.
    pub async fn create_collection(&self, name: &str) -> DocumentStoreResult<bool> {
        self.mutate("create_collection", name, |state| {
            let created = !state.contains(name);

            if created {
                state.collection_or_create(name);
            }

            Applied::new(created, created)
        })
        .await
    }

    /// Drops a collection and all of its documents. Returns `false` if it did not exist.
    ///
    /// # Errors
    ///
    /// Returns the backend's error if the new state cannot be persisted.
    pub async fn drop_collection(&self, name: &str) -> DocumentStoreResult<bool> {
        self.mutate("drop_collection", name, |state| {
            let dropped = state
                .remove_collection(name)
                .is_some();

            Applied::new(dropped, dropped)
        })
        .await
    }

    /// Writes a copy of the committed store to `destination`.
    ///
    /// This is independent of the automatic backup a backend may keep. Mutations are
    /// held off while the copy is taken.
    ///
    /// # Errors
    ///
    /// Returns [`DocumentStoreError::IoFailure`] if the copy cannot be written.
    pub async fn backup(&self, destination: impl AsRef<Path>) -> DocumentStoreResult<()> {
        let destination = destination.as_ref();
        let _writer = self.writer.lock().await;
        let state = self.state.read().await.clone();

        self.backend
            .backup_to(destination, &state)
            .await?;

        info!(target: "farndb::store", destination = %destination.display(), "wrote backup");

        Ok(())
    }

    /// Returns a copy of the whole committed state.
    pub async fn snapshot(&self) -> StoreState {
        self.state.read().await.clone()
    }

    /// Shuts down the store and releases backend resources.
    ///
    /// Every successful mutation has already been persisted, so nothing is flushed here.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend fails to shut down.
    pub async fn shutdown(self) -> DocumentStoreResult<()> {
        self.backend.shutdown().await?;

        Ok(())
    }

    /// The single path through which state changes.
    ///
    /// Runs `apply` on a copy of the committed state while holding the writer lock. If the
    /// copy changed it is saved, and published only after the save succeeds.
    async fn mutate<T>(
        &self,
        operation: &'static str,
        collection: &str,
        apply: impl FnOnce(&mut StoreState) -> Applied<T>,
    ) -> DocumentStoreResult<T> {
        let _writer = self.writer.lock().await;
        let mut next = self.state.read().await.clone();

        let Applied { output, changed } = apply(&mut next);

        if !changed {
            return Ok(output);
        }

        if let Err(err) = self.backend.save(&next).await {
            warn!(
                target: "farndb::store",
                operation,
                collection,
                error = %err,
                "persisting failed, changes rolled back"
            );

            return Err(err);
        }

        *self.state.write().await = next;

        debug!(target: "farndb::store", operation, collection, "committed");

        Ok(output)
    }
}

/// Converts a caller argument, surfacing a failed conversion as a validation error.
fn argument<T, A>(value: A) -> DocumentStoreResult<T>
where
    A: TryInto<T>,
    A::Error: Into<DocumentStoreError>,
{
    value
        .try_into()
        .map_err(Into::into)
}
