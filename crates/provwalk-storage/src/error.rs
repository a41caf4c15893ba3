//! Storage error types

use thiserror::Error;

/// Result type alias for storage operations
pub type StorageResult<T> = std::result::Result<T, StorageError>;

/// Storage-specific error types
#[derive(Error, Debug)]
pub enum StorageError {
    #[error("Database error: {0}")]
    Database(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Entity not found: {0}")]
    EntityNotFound(String),

    #[error("Duplicate entity: {0}")]
    DuplicateEntity(String),

    #[error("Invalid link: {0}")]
    InvalidLink(String),

    #[error("Unsupported query: {0}")]
    UnsupportedQuery(String),

    #[error("Snapshot error: {0}")]
    Snapshot(String),
}

impl From<StorageError> for provwalk_core::Error {
    fn from(err: StorageError) -> Self {
        provwalk_core::Error::Storage(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_converts_into_core_storage_error() {
        let err: provwalk_core::Error = StorageError::EntityNotFound("node 7".to_string()).into();
        assert!(matches!(err, provwalk_core::Error::Storage(_)));
        assert_eq!(err.to_string(), "Storage error: Entity not found: node 7");
    }
}
