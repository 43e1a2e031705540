//! Convenient re-exports of commonly used types from farndb.
//!
//! ```ignore
//! use farndb::prelude::*;
//! ```

pub use farndb_core::{
    backend::{StoreBackend, StoreBackendBuilder},
    collection::{Collection, CollectionRef},
    document::{Document, Fields, Patch},
    error::{DocumentStoreError, DocumentStoreResult},
    query::Predicate,
    store::DocumentStore,
};
