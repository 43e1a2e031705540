//! Core of farndb, a small embedded JSON document store.
//!
//! This crate holds everything that does not depend on where the data is kept:
//!
//! - **Documents** ([`document`]) - Schema-less JSON documents with engine-managed ID and timestamps
//! - **Queries** ([`query`]) - Flat equality predicates and the matcher that evaluates them
//! - **Collections** ([`collection`]) - Insertion-ordered document sets and the per-collection handle
//! - **Store state** ([`state`]) - The whole store as one value, and its JSON encoding
//! - **Store backend abstraction** ([`backend`]) - Traits for persisting whole-store snapshots
//! - **Document store** ([`store`]) - The database handle, with its single mutation choke point
//! - **Error handling** ([`error`]) - Error types and result types
//!
//! # Example
//!
//! ```ignore
//! use farndb_core::store::DocumentStore;
//! use farndb_memory::InMemoryStore;
//! use serde_json::json;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let store = DocumentStore::open(InMemoryStore::new()).await?;
//!
//!     store.insert("users", json!({"name": "Alice", "age": 25})).await?;
//!     assert_eq!(store.count("users", json!({"age": 25})).await?, 1);
//!
//!     Ok(())
//! }
//! ```

#[allow(unused_extern_crates)]
extern crate self as farndb_core;

pub mod backend;
pub mod collection;
pub mod document;
pub mod error;
pub mod query;
pub mod state;
pub mod store;
