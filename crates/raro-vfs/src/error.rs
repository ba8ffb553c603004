use std::io;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum VfsError {
    #[error("path not found: {0}")]
    NotFound(PathBuf),

    #[error("path escapes sandbox root: {0}")]
    PathEscape(PathBuf),

    #[error("vfs is read-only")]
    ReadOnly,

    #[error("io error at {path}: {source}")]
    IOError { path: PathBuf, source: io::Error },
}

impl VfsError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        VfsError::IOError {
            path: path.into(),
            source,
        }
    }
}
