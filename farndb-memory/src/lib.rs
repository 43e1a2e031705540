//! In-memory storage backend for farndb.
//!
//! This crate provides [`InMemoryStore`], a [`StoreBackend`](farndb_core::backend::StoreBackend)
//! that keeps the encoded store in memory instead of a file. It is meant for tests and
//! for short-lived stores that never need to outlive the process.
//!
//! # Features
//!
//! - **Same codec as the file backend** - Snapshots are stored as the exact JSON a file would hold
//! - **Shared clones** - Clones see the same snapshot, so a store can be reopened over it
//! - **Fault injection** - Saves can be forced to fail to exercise rollback
//!
//! # Quick Start
//!
//! ```ignore
//! use farndb::{prelude::*, memory::InMemoryStore};
//! use serde_json::json;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let backend = InMemoryStore::builder().build().await?;
//!     let store = DocumentStore::open(backend).await?;
//!
//!     let users = store.collection("users");
//!     users.insert(json!({"name": "Alice"})).await?;
//!
//!     Ok(())
//! }
//! ```

#[allow(unused_extern_crates)]
extern crate self as farndb_memory;

pub mod store;

pub use store::{InMemoryStore, InMemoryStoreBuilder, MEMORY_ORIGIN};
