//! JSON file backend for farndb.
//!
//! This crate provides [`JsonFileStore`], which keeps a whole store in a single JSON file
//! on disk. The file is readable and hand-editable:
//!
//! ```text
//! {
//!   "users": [
//!     { "_id": "…", "_created_at": "…", "_updated_at": "…", "name": "Alice" }
//!   ]
//! }
//! ```
//!
//! # Durability
//!
//! Saves never modify the store file in place. The new contents are written to
//! `<path>.tmp`, the old file is copied to `<path>.bak`, and the temporary file is then
//! renamed over the original. See [`atomic`] for the individual steps.
//!
//! Only one process may write a given file. Nothing locks it against other writers.
//!
//! All file access is blocking `std::fs` I/O performed inside the async backend
//! methods. A save stalls the executor thread that runs it until the file and its
//! directory are synced.
//!
//! # Example
//!
//! ```ignore
//! use farndb::{backend::StoreBackendBuilder, json::JsonFileStore, store::DocumentStore};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let backend = JsonFileStore::builder()
//!         .path("data/app.json")
//!         .build()
//!         .await?;
//!     let store = DocumentStore::open(backend).await?;
//!
//!     Ok(())
//! }
//! ```

#[allow(unused_extern_crates)]
extern crate self as farndb_json;

pub mod atomic;
pub mod store;

pub use store::{JsonFileStore, JsonFileStoreBuilder};
