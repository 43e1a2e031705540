use std::{
    fs,
    io::ErrorKind,
    path::{Path, PathBuf},
};

use async_trait::async_trait;
use tracing::{debug, info};

use farndb_core::{
    backend::{StoreBackend, StoreBackendBuilder},
    error::{DocumentStoreError, DocumentStoreResult},
    state::StoreState,
};

use crate::atomic::{AtomicWrite, write_atomic};

/// Store backend that keeps the whole store in one JSON file.
///
/// Every save rewrites the file through the atomic write protocol described in
/// [`atomic`](crate::atomic), keeping the previous version as `<path>.bak` unless
/// backups are turned off.
///
/// # Blocking I/O
///
/// File reads, writes and fsyncs run with `std::fs` directly inside the async methods,
/// on whatever executor thread polls them. Each call blocks that thread for the length
/// of one whole-file write.
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    path: PathBuf,
    pretty: bool,
    backup: bool,
    sync: bool,
    create_dirs: bool,
}

impl JsonFileStore {
    /// Creates a backend for `path` with default options.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            pretty: true,
            backup: true,
            sync: true,
            create_dirs: true,
        }
    }

    pub fn builder() -> JsonFileStoreBuilder {
        JsonFileStoreBuilder::default()
    }

    /// The store file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn atomic_write(&self) -> AtomicWrite {
        AtomicWrite::new(&self.path)
            .backup(self.backup)
            .sync(self.sync)
            .create_dirs(self.create_dirs)
    }
}

#[async_trait]
impl StoreBackend for JsonFileStore {
    async fn load(&self) -> DocumentStoreResult<StoreState> {
        match fs::read(&self.path) {
            Ok(bytes) => StoreState::from_slice(&bytes, &self.path),
            Err(err) if err.kind() == ErrorKind::NotFound => {
                debug!(target: "farndb::json", path = %self.path.display(), "no store file yet, starting empty");

                Ok(StoreState::new())
            },
            Err(err) => Err(DocumentStoreError::io(&self.path, err)),
        }
    }

    async fn save(&self, state: &StoreState) -> DocumentStoreResult<()> {
        let bytes = state.to_bytes(self.pretty)?;

        write_atomic(self.atomic_write(), &bytes)
    }

    async fn backup_to(&self, destination: &Path, state: &StoreState) -> DocumentStoreResult<()> {
        // Read the committed file in full before anything is written, so a destination
        // that resolves to the store file itself cannot truncate it.
        let bytes = match fs::read(&self.path) {
            Ok(bytes) => bytes,
            Err(err) if err.kind() == ErrorKind::NotFound => state.to_bytes(self.pretty)?,
            Err(err) => return Err(DocumentStoreError::io(&self.path, err)),
        };

        let write = AtomicWrite::new(destination)
            .backup(false)
            .sync(self.sync)
            .create_dirs(false);

        write_atomic(write, &bytes)
    }

    fn location(&self) -> Option<&Path> {
        Some(&self.path)
    }
}

/// Builder for [`JsonFileStore`].
///
/// # Example
///
/// ```ignore
/// use farndb::{backend::StoreBackendBuilder, json::JsonFileStore};
///
/// let backend = JsonFileStore::builder()
///     .path("data/app.json")
///     .pretty(false)
///     .build()
///     .await?;
/// ```
#[derive(Debug, Clone)]
pub struct JsonFileStoreBuilder {
    path: Option<PathBuf>,
    pretty: bool,
    backup: bool,
    sync: bool,
    create_dirs: bool,
}

impl Default for JsonFileStoreBuilder {
    fn default() -> Self {
        Self {
            path: None,
            pretty: true,
            backup: true,
            sync: true,
            create_dirs: true,
        }
    }
}

impl JsonFileStoreBuilder {
    /// Sets the store file. Required.
    #[must_use]
    pub fn path(mut self, path: impl Into<PathBuf>) -> Self {
        self.path = Some(path.into());
        self
    }

    /// Indent the JSON (default: `true`).
    #[must_use]
    pub fn pretty(mut self, pretty: bool) -> Self {
        self.pretty = pretty;
        self
    }

    /// Keep the previous file as `<path>.bak` on every save (default: `true`).
    #[must_use]
    pub fn backup(mut self, backup: bool) -> Self {
        self.backup = backup;
        self
    }

    /// Fsync the new file and its directory on every save (default: `true`).
    #[must_use]
    pub fn sync(mut self, sync: bool) -> Self {
        self.sync = sync;
        self
    }

    /// Create missing parent directories on save (default: `true`).
    #[must_use]
    pub fn create_dirs(mut self, create_dirs: bool) -> Self {
        self.create_dirs = create_dirs;
        self
    }
}

#[async_trait]
impl StoreBackendBuilder for JsonFileStoreBuilder {
    type Backend = JsonFileStore;

    async fn build(self) -> DocumentStoreResult<Self::Backend> {
        let path = self
            .path
            .ok_or_else(|| DocumentStoreError::Initialization("a store path is required".to_string()))?;

        if path.is_dir() {
            return Err(DocumentStoreError::Initialization(format!(
                "{} is a directory",
                path.display()
            )));
        }

        info!(
            target: "farndb::json",
            path = %path.display(),
            pretty = self.pretty,
            backup = self.backup,
            sync = self.sync,
            "configured json file store"
        );

        Ok(JsonFileStore {
            path,
            pretty: self.pretty,
            backup: self.backup,
            sync: self.sync,
            create_dirs: self.create_dirs,
        })
    }
}
