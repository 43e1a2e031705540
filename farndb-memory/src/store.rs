//! In-memory storage implementation for document stores.
//!
//! The backend keeps the last saved snapshot as encoded JSON bytes, so every save and
//! load goes through the same codec the file backend uses. Nothing touches the disk
//! except an explicit backup.

use std::{
    fs,
    path::Path,
    sync::{
        Arc,
        atomic::{AtomicBool, AtomicUsize, Ordering},
    },
};

use async_trait::async_trait;
use mea::rwlock::RwLock;
use tracing::debug;

use farndb_core::{
    backend::{StoreBackend, StoreBackendBuilder},
    error::{DocumentStoreError, DocumentStoreResult},
    state::StoreState,
};

/// Name used in place of a path when reporting errors about in-memory data.
pub const MEMORY_ORIGIN: &str = ":memory:";

/// Thread-safe in-memory storage backend.
///
/// # Thread Safety
///
/// `InMemoryStore` is cloneable and uses `Arc`-wrapped internal state. Clones share the
/// same snapshot, which makes it possible to reopen a [`DocumentStore`] over the data a
/// previous one saved.
///
/// # Fault Injection
///
/// [`InMemoryStore::fail_saves`] makes every following save fail with an I/O error, to
/// exercise the rollback path of the store.
///
/// # Example
///
/// ```ignore
/// use farndb_memory::InMemoryStore;
/// use farndb_core::store::DocumentStore;
/// use serde_json::json;
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let backend = InMemoryStore::new();
///     let store = DocumentStore::open(backend.clone()).await?;
///
///     store.insert("users", json!({"name": "Alice"})).await?;
///     assert_eq!(backend.save_count(), 1);
///
///     Ok(())
/// }
/// ```
///
/// [`DocumentStore`]: farndb_core::store::DocumentStore
#[derive(Default, Clone, Debug)]
pub struct InMemoryStore {
    /// Encoded form of the last saved snapshot, `None` until the first save
    contents: Arc<RwLock<Option<Vec<u8>>>>,
    failing: Arc<AtomicBool>,
    saves: Arc<AtomicUsize>,
    pretty: bool,
}

impl InMemoryStore {
    /// Creates a new empty in-memory backend.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a builder for constructing an `InMemoryStore` with custom options.
    pub fn builder() -> InMemoryStoreBuilder {
        InMemoryStoreBuilder::default()
    }

    /// Makes subsequent saves fail (`true`) or succeed again (`false`).
    pub fn fail_saves(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// Number of successful saves so far.
    pub fn save_count(&self) -> usize {
        self.saves.load(Ordering::SeqCst)
    }

    /// Returns the encoded snapshot as it would appear on disk.
    pub async fn contents(&self) -> Option<Vec<u8>> {
        self.contents.read().await.clone()
    }
}

#[async_trait]
impl StoreBackend for InMemoryStore {
    async fn load(&self) -> DocumentStoreResult<StoreState> {
        match self.contents.read().await.as_deref() {
            Some(bytes) => StoreState::from_slice(bytes, Path::new(MEMORY_ORIGIN)),
            None => Ok(StoreState::new()),
        }
    }

    async fn save(&self, state: &StoreState) -> DocumentStoreResult<()> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(DocumentStoreError::io(
                MEMORY_ORIGIN,
                std::io::Error::other("saves are set to fail"),
            ));
        }

        let bytes = state.to_bytes(self.pretty)?;
        let len = bytes.len();

        *self.contents.write().await = Some(bytes);
        self.saves.fetch_add(1, Ordering::SeqCst);

        debug!(target: "farndb::memory", bytes = len, "saved snapshot");

        Ok(())
    }

    async fn backup_to(&self, destination: &Path, state: &StoreState) -> DocumentStoreResult<()> {
        let bytes = match self.contents.read().await.clone() {
            Some(bytes) => bytes,
            None => state.to_bytes(self.pretty)?,
        };

        fs::write(destination, bytes).map_err(|err| DocumentStoreError::io(destination, err))?;

        Ok(())
    }
}

/// Builder for constructing [`InMemoryStore`] instances.
///
/// # Example
///
/// ```ignore
/// use farndb_memory::InMemoryStore;
/// use farndb_core::backend::StoreBackendBuilder;
///
/// let backend = InMemoryStore::builder()
///     .contents(br#"{"users": []}"#.to_vec())
///     .build()
///     .await?;
/// ```
#[derive(Default, Debug)]
pub struct InMemoryStoreBuilder {
    contents: Option<Vec<u8>>,
    pretty: bool,
}

impl InMemoryStoreBuilder {
    /// Starts from previously encoded data instead of an empty store.
    ///
    /// The bytes are not validated here; a bad snapshot surfaces as
    /// [`DocumentStoreError::CorruptStore`] when the store is opened.
    #[must_use]
    pub fn contents(mut self, bytes: Vec<u8>) -> Self {
        self.contents = Some(bytes);
        self
    }

    /// Indents saved snapshots, as the file backend does by default.
    #[must_use]
    pub fn pretty(mut self, pretty: bool) -> Self {
        self.pretty = pretty;
        self
    }
}

#[async_trait]
impl StoreBackendBuilder for InMemoryStoreBuilder {
    type Backend = InMemoryStore;

    async fn build(self) -> DocumentStoreResult<Self::Backend> {
        Ok(InMemoryStore {
            contents: Arc::new(RwLock::new(self.contents)),
            pretty: self.pretty,
            ..InMemoryStore::default()
        })
    }
}
