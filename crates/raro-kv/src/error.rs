use thiserror::Error;

#[derive(Debug, Error)]
pub enum KvError {
    #[error("key not found")]
    NotFound,

    #[error("store is closed")]
    Closed,

    #[error("store is read-only")]
    ReadOnly,

    #[error("write-write conflict")]
    Conflict,

    #[error("io error: {0}")]
    IOError(#[from] std::io::Error),

    #[error("encoding error: {0}")]
    Codec(#[from] bincode::Error),

    #[error("storage backend error: {0}")]
    Backend(String),
}

impl From<redb::DatabaseError> for KvError {
    fn from(e: redb::DatabaseError) -> Self {
        KvError::Backend(e.to_string())
    }
}

impl From<redb::TransactionError> for KvError {
    fn from(e: redb::TransactionError) -> Self {
        KvError::Backend(e.to_string())
    }
}

impl From<redb::TableError> for KvError {
    fn from(e: redb::TableError) -> Self {
        KvError::Backend(e.to_string())
    }
}

impl From<redb::StorageError> for KvError {
    fn from(e: redb::StorageError) -> Self {
        KvError::Backend(e.to_string())
    }
}

impl From<redb::CommitError> for KvError {
    fn from(e: redb::CommitError) -> Self {
        KvError::Backend(e.to_string())
    }
}
