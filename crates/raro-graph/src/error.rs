use thiserror::Error;

#[derive(Debug, Error)]
pub enum GraphError {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("vertex already exists: {0}")]
    DuplicateVertex(String),

    #[error("edge already exists: {0}")]
    DuplicateEdge(String),

    #[error("vertex not found: {0}")]
    VertexNotFound(String),

    #[error("edge not found: {0}")]
    EdgeNotFound(String),

    #[error("vertex {0} still has {1} referencing edge(s)")]
    ReferentialIntegrity(String, usize),

    #[error("invalid key: {0}")]
    InvalidKey(String),

    #[error("write-write conflict")]
    Conflict,

    #[error("invalid traversal direction")]
    InvalidDirection,

    #[error("io error: {0}")]
    IOError(String),

    #[error("store closed")]
    Closed,
}

impl From<raro_kv::KvError> for GraphError {
    fn from(e: raro_kv::KvError) -> Self {
        match e {
            raro_kv::KvError::Closed => GraphError::Closed,
            raro_kv::KvError::Conflict => GraphError::Conflict,
            other => GraphError::IOError(other.to_string()),
        }
    }
}

impl From<serde_json::Error> for GraphError {
    fn from(e: serde_json::Error) -> Self {
        GraphError::IOError(e.to_string())
    }
}
