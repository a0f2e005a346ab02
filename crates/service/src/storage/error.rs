use thiserror::Error;

/// Failures surfaced by a [`UserStore`](super::UserStore).
#[derive(Debug, Error)]
pub enum StoreError {
    /// The record could not be serialized.
    #[error("encoding error: {0}")]
    Encoding(String),
    /// A stored value could not be decoded. The data on disk is not trustworthy.
    #[error("corrupted value for key {key:?}: {reason}")]
    Corruption { key: String, reason: String },
    #[error("not found: {0}")]
    NotFound(String),
    #[error("already exists: {0}")]
    Conflict(String),
    /// Transaction or I/O failure in the storage engine.
    #[error("storage error: {0}")]
    Storage(String),
    /// A blocking storage task panicked or was cancelled.
    #[error("storage task failed: {0}")]
    Task(String),
}

impl StoreError {
    /// Corruption must halt the process instead of serving undefined state.
    pub fn is_fatal(&self) -> bool {
        matches!(self, StoreError::Corruption { .. })
    }

    pub fn not_found(name: &str) -> Self {
        Self::NotFound(format!("user {name:?}"))
    }

    pub fn conflict(name: &str) -> Self {
        Self::Conflict(format!("user {name:?}"))
    }
}

impl From<redb::Error> for StoreError {
    fn from(err: redb::Error) -> Self {
        StoreError::Storage(err.to_string())
    }
}

impl From<redb::DatabaseError> for StoreError {
    fn from(err: redb::DatabaseError) -> Self {
        StoreError::Storage(err.to_string())
    }
}

impl From<redb::TransactionError> for StoreError {
    fn from(err: redb::TransactionError) -> Self {
        StoreError::Storage(err.to_string())
    }
}

impl From<redb::TableError> for StoreError {
    fn from(err: redb::TableError) -> Self {
        StoreError::Storage(err.to_string())
    }
}

impl From<redb::StorageError> for StoreError {
    fn from(err: redb::StorageError) -> Self {
        StoreError::Storage(err.to_string())
    }
}

impl From<redb::CommitError> for StoreError {
    fn from(err: redb::CommitError) -> Self {
        StoreError::Storage(err.to_string())
    }
}

impl From<std::io::Error> for StoreError {
    fn from(err: std::io::Error) -> Self {
        StoreError::Storage(err.to_string())
    }
}

impl From<tokio::task::JoinError> for StoreError {
    fn from(err: tokio::task::JoinError) -> Self {
        StoreError::Task(err.to_string())
    }
}
