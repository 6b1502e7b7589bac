//! Error taxonomy for the persistence and retrieval layers.
//!
//! Storage failures are typed so callers can tell an unopened (or closed)
//! engine apart from an unavailable medium or a rejected write. "Not found"
//! is never an error: single-entity lookups return `Option`, and deletes or
//! content updates return a `bool`.

/// Result alias used by every [`Store`](crate::store::Store) operation.
pub type Result<T> = std::result::Result<T, StorageError>;

/// Failure raised by a storage backend.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StorageError {
    /// The engine was used before it was opened, or after it was closed.
    #[error("storage not initialized")]
    NotInitialized,

    /// The underlying medium could not serve the request.
    #[error("storage unavailable: {0}")]
    Unavailable(String),

    /// A write was rejected by a schema constraint, or a stored row could
    /// not be reconstructed into a valid entry.
    #[error("constraint violation: {0}")]
    ConstraintViolation(String),
}

/// Failure constructing or parsing an entry model value.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EntryError {
    #[error("entry content must not be empty")]
    EmptyContent,

    #[error("unknown context type: '{0}'")]
    UnknownType(String),

    #[error("unknown context source: '{0}'")]
    UnknownSource(String),
}

impl From<EntryError> for StorageError {
    fn from(err: EntryError) -> Self {
        StorageError::ConstraintViolation(err.to_string())
    }
}

impl From<tantivy::TantivyError> for StorageError {
    fn from(err: tantivy::TantivyError) -> Self {
        StorageError::Unavailable(format!("search index: {}", err))
    }
}
