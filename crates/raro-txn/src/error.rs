use thiserror::Error;

#[derive(Debug, Error)]
pub enum TxnError {
    #[error("transaction is not active")]
    TxNotActive,

    #[error("transaction timed out")]
    TxTimeout,

    #[error("vertex already exists: {0}")]
    DuplicateVertex(String),

    #[error("edge already exists: {0}")]
    DuplicateEdge(String),

    #[error("vertex not found: {0}")]
    VertexNotFound(String),

    #[error("edge not found: {0}")]
    EdgeNotFound(String),

    #[error("write attempted in a read-only transaction")]
    ReadOnlyViolation,

    #[error("transaction was aborted by the manager")]
    AbortedByManager,

    #[error("savepoint not found: {0}")]
    SavepointNotFound(String),

    #[error("storage error: {0}")]
    Backend(String),
}

impl From<raro_kv::KvError> for TxnError {
    fn from(e: raro_kv::KvError) -> Self {
        match e {
            raro_kv::KvError::ReadOnly => TxnError::ReadOnlyViolation,
            other => TxnError::Backend(other.to_string()),
        }
    }
}

impl From<raro_graph::GraphError> for TxnError {
    fn from(e: raro_graph::GraphError) -> Self {
        match e {
            raro_graph::GraphError::DuplicateVertex(id) => TxnError::DuplicateVertex(id),
            raro_graph::GraphError::DuplicateEdge(id) => TxnError::DuplicateEdge(id),
            raro_graph::GraphError::VertexNotFound(id) => TxnError::VertexNotFound(id),
            raro_graph::GraphError::EdgeNotFound(id) => TxnError::EdgeNotFound(id),
            raro_graph::GraphError::NotFound(id) => TxnError::VertexNotFound(id),
            other => TxnError::Backend(other.to_string()),
        }
    }
}
