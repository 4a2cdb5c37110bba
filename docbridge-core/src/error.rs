//! Error types and result types for document database operations.
//!
//! This module provides comprehensive error handling for all database access operations.
//! Use [`DocumentDbResult<T>`] as the return type for fallible operations.

use bson::error::Error as BsonError;
use serde_json::Error as SerdeJsonError;
use thiserror::Error;

/// Represents all possible errors that can occur when accessing a document database.
///
/// This enum covers serialization errors, filter validation, the optimistic-update
/// lifecycle, and backend-specific errors.
#[derive(Error, Debug)]
pub enum DocumentDbError {
    /// Serialization/deserialization error when converting between document formats.
    #[error("Serialization error: {0}")]
    Serialization(String),
    /// Error during connection setup or database initialization.
    #[error("Initialization error: {0}")]
    Initialization(String),
    /// The backend did not acknowledge an insert. The argument is the collection name.
    #[error("Document was not inserted into collection {0}")]
    InsertionFailed(String),
    /// The snapshot passed to `update`/`patch` no longer matches a stored document.
    /// Distinct from a generic lookup miss: the caller holds a stale snapshot.
    /// The argument is the collection name.
    #[error("Document not found for updating in collection {0}")]
    NotFoundForUpdate(String),
    /// A write violated a unique-index constraint.
    /// The first argument is the indexed field, the second the collection name.
    #[error("Duplicate value for unique field {0} in collection {1}")]
    DuplicateKey(String, String),
    /// A canonical filter is structurally invalid and cannot be dispatched.
    #[error("Invalid filter: {0}")]
    InvalidFilter(String),
    /// The requested operation is not supported by this backend or document shape.
    #[error("Unsupported operation: {0}")]
    Unsupported(String),
    /// An error occurred in the underlying storage backend or driver.
    #[error("Backend error: {0}")]
    Backend(String),
}

/// A specialized `Result` type for document database operations.
///
/// This type alias is used throughout the crate to indicate operations that may fail
/// with a [`DocumentDbError`].
pub type DocumentDbResult<T> = Result<T, DocumentDbError>;

impl From<BsonError> for DocumentDbError {
    fn from(err: BsonError) -> Self {
        DocumentDbError::Serialization(err.to_string())
    }
}

impl From<SerdeJsonError> for DocumentDbError {
    fn from(err: SerdeJsonError) -> Self {
        DocumentDbError::Serialization(err.to_string())
    }
}
