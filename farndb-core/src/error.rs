//! Error types and result types for document store operations.
//!
//! Every fallible operation in farndb returns [`DocumentStoreResult<T>`]. Errors are
//! always surfaced to the direct caller; the engine never retries on its own.

use std::{convert::Infallible, io, path::PathBuf};

use serde_json::Error as SerdeJsonError;
use thiserror::Error;

/// Represents all possible errors that can occur when interacting with a document store.
///
/// A lookup that matches nothing is not an error: `find_one` reports it as `None`.
#[derive(Error, Debug)]
pub enum DocumentStoreError {
    /// Serialization/deserialization error when converting documents to or from JSON.
    #[error("Serialization error: {0}")]
    Serialization(String),
    /// Error during backend construction, such as a builder missing a required option.
    #[error("Initialization error: {0}")]
    Initialization(String),
    /// The store file exists but does not hold a valid store.
    ///
    /// This is fatal at open time; nothing in the file is discarded or repaired.
    #[error("Corrupt store at {path}: {reason}")]
    CorruptStore {
        /// Location of the offending file.
        path: PathBuf,
        /// What was wrong with it.
        reason: String,
    },
    /// A file-system operation failed while reading or persisting the store.
    ///
    /// When raised by a mutating call the in-memory state has already been rolled
    /// back to the last committed snapshot.
    #[error("I/O failure on {path}: {source}")]
    IoFailure {
        /// The path the failed operation was acting on.
        path: PathBuf,
        /// The underlying error.
        #[source]
        source: io::Error,
    },
    /// Document fields or an update patch were not a JSON object.
    #[error("Invalid document: {0}")]
    InvalidDocument(String),
    /// A query predicate was not a JSON object.
    #[error("Invalid predicate: {0}")]
    InvalidPredicate(String),
}

/// A specialized `Result` type for document store operations.
pub type DocumentStoreResult<T> = Result<T, DocumentStoreError>;

impl DocumentStoreError {
    /// Wraps an I/O error together with the path it occurred on.
    pub fn io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        DocumentStoreError::IoFailure { path: path.into(), source }
    }

    /// Builds a [`DocumentStoreError::CorruptStore`] for the given path.
    pub fn corrupt(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        DocumentStoreError::CorruptStore {
            path: path.into(),
            reason: reason.into(),
        }
    }
}

impl From<SerdeJsonError> for DocumentStoreError {
    fn from(err: SerdeJsonError) -> Self {
        DocumentStoreError::Serialization(err.to_string())
    }
}

// Lets already-typed arguments flow through the same `TryInto` bounds as raw JSON.
impl From<Infallible> for DocumentStoreError {
    fn from(err: Infallible) -> Self {
        match err {}
    }
}
