//! farndb: a small embedded JSON document store.
//!
//! This crate is the entry point for users of farndb. It re-exports the core types and
//! the available storage backends, and provides [`open`] for the common case of a
//! store kept in one JSON file.
//!
//! # Features
//!
//! - **Schema-less documents** - Any JSON object can be stored; IDs and timestamps are managed for you
//! - **Equality queries** - Find, update, delete and count with flat field-equals-value filters
//! - **Crash-safe persistence** - Every change is written through a temp file, backup and atomic rename
//! - **Concurrent use** - One store can be shared between tasks; writers are serialized
//!
//! # Quick Start
//!
//! ```ignore
//! use farndb::prelude::*;
//! use serde_json::json;
//!
//! #[tokio::main]
//! async fn main() -> DocumentStoreResult<()> {
//!     let store = farndb::open("farndb.json").await?;
//!
//!     let id = store.insert("users", json!({"name": "Alice", "age": 25})).await?;
//!     assert_eq!(store.count("users", json!({})).await?, 1);
//!
//!     store.update("users", json!({"name": "Alice"}), json!({"age": 26})).await?;
//!
//!     let alice = store
//!         .find_one("users", json!({"name": "Alice"}))
//!         .await?
//!         .expect("just inserted");
//!     assert_eq!(alice["age"], 26);
//!     assert_eq!(alice.id(), id);
//!
//!     store.delete("users", json!({"name": "Alice"})).await?;
//!     store.backup("farndb-backup.json").await?;
//!
//!     Ok(())
//! }
//! ```
//!
//! # Typed Documents
//!
//! Stored documents can be read back into your own types with
//! [`Document::deserialize_into`](document::Document::deserialize_into):
//!
//! ```ignore
//! #[derive(serde::Deserialize)]
//! struct User {
//!     name: String,
//!     age: u32,
//! }
//!
//! let users: Vec<User> = store
//!     .find("users", json!({}))
//!     .await?
//!     .iter()
//!     .map(|doc| doc.deserialize_into())
//!     .collect::<DocumentStoreResult<_>>()?;
//! ```
//!
//! # Backends
//!
//! - [`json`] - One JSON file on disk (requires the `json` feature, on by default)
//! - [`memory`] - In-memory storage for tests and throwaway stores

pub mod prelude;

pub use farndb_core::{backend, collection, document, error, query, state, store};

// Re-export serde_json for building documents and predicates
pub use serde_json;

#[cfg(feature = "json")]
use std::path::PathBuf;

#[cfg(feature = "json")]
use farndb_core::{backend::StoreBackendBuilder, error::DocumentStoreResult, store::DocumentStore};

/// In-memory storage backend implementations.
pub mod memory {
    pub use farndb_memory::{InMemoryStore, InMemoryStoreBuilder};
}

/// JSON file storage backend implementations.
///
/// This module is only available when the `json` feature is enabled.
#[cfg(feature = "json")]
pub mod json {
    pub use farndb_json::{
        JsonFileStore, JsonFileStoreBuilder,
        atomic::{AtomicWrite, backup_path, temp_path, write_atomic},
    };
}

/// Opens the store kept in the JSON file at `path`, with default options.
///
/// A missing file is not an error: the store starts empty and the file (and any missing
/// parent directories) is created by the first change.
///
/// # Errors
///
/// Returns [`CorruptStore`](error::DocumentStoreError::CorruptStore) if the file exists
/// but does not hold a valid store, or
/// [`IoFailure`](error::DocumentStoreError::IoFailure) if it cannot be read.
#[cfg(feature = "json")]
pub async fn open(path: impl Into<PathBuf>) -> DocumentStoreResult<DocumentStore<json::JsonFileStore>> {
    let backend = json::JsonFileStore::builder()
        .path(path)
        .build()
        .await?;

    DocumentStore::open(backend).await
}
