//! Storage backend abstraction for the document store.
//!
//! A backend is the persistence layer of a [`DocumentStore`](crate::store::DocumentStore):
//! it turns a [`StoreState`] into durable bytes and back. Backends hold no document state
//! between calls; the store owns everything in memory and hands the backend a complete
//! snapshot on every commit.
//!
//! # Traits
//!
//! - [`StoreBackend`]: load, save and back up whole store snapshots
//! - [`StoreBackendBuilder`]: factory trait for creating backend instances
//!
//! # Examples
//!
//! ```ignore
//! use farndb::{backend::StoreBackendBuilder, json::JsonFileStore, store::DocumentStore};
//!
//! let backend = JsonFileStore::builder()
//!     .path("data/app.json")
//!     .build()
//!     .await?;
//! let store = DocumentStore::open(backend).await?;
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

use async_trait::async_trait;
use std::{fmt::Debug, path::Path};

use crate::{error::DocumentStoreResult, state::StoreState};

/// Abstract interface for persisting whole-store snapshots.
///
/// # Contract
///
/// - [`load`](StoreBackend::load) on a backend that has never been saved to returns an
///   empty state, not an error.
/// - [`save`](StoreBackend::save) either durably replaces the previous snapshot or fails
///   leaving it untouched. A partially written snapshot must never become visible to a
///   later `load`.
///
/// # Thread Safety
///
/// The store serializes all `save` calls itself; `load` is only called while opening.
/// Backends still have to be `Send + Sync` so the store can be shared across tasks.
///
/// # Concurrency Across Processes
///
/// Nothing coordinates two processes writing the same location. Doing so is outside the
/// supported model and gives undefined results.
#[async_trait]
pub trait StoreBackend: Send + Sync + Debug {
    /// Reads the last committed snapshot.
    ///
    /// # Errors
    ///
    /// Returns [`DocumentStoreError::CorruptStore`](crate::error::DocumentStoreError::CorruptStore)
    /// if stored data exists but cannot be decoded, or
    /// [`DocumentStoreError::IoFailure`](crate::error::DocumentStoreError::IoFailure) if it
    /// cannot be read.
    async fn load(&self) -> DocumentStoreResult<StoreState>;

    /// Durably replaces the committed snapshot with `state`.
    ///
    /// # Errors
    ///
    /// Returns an error if any step fails; the previous snapshot must remain intact.
    async fn save(&self, state: &StoreState) -> DocumentStoreResult<()>;

    /// Writes a copy of the committed snapshot to `destination`.
    ///
    /// `state` is the store's current in-memory image, which always equals the committed
    /// snapshot. Backends with nothing committed yet write it instead.
    ///
    /// # Errors
    ///
    /// Returns an error if the copy cannot be written.
    async fn backup_to(&self, destination: &Path, state: &StoreState) -> DocumentStoreResult<()>;

    /// Where this backend keeps its data, if it is file based.
    fn location(&self) -> Option<&Path> {
        None
    }

    /// Cleanly shuts down the backend, releasing all resources.
    ///
    /// The default implementation is a no-op.
    async fn shutdown(self) -> DocumentStoreResult<()>
    where
        Self: Sized,
    {
        Ok(())
    }
}

/// Factory trait for backends that need asynchronous or fallible setup.
#[async_trait]
pub trait StoreBackendBuilder {
    type Backend: StoreBackend;

    async fn build(self) -> DocumentStoreResult<Self::Backend>;
}
