// crates/raro-vfs/src/lib.rs
// Purpose: Per-project sandboxed filesystem facade (RFS).
// Architecture: Infrastructure layer, no dependency on the rest of the workspace.
// Dependencies: std::fs

mod error;
mod path;
mod walk;

pub use error::VfsError;
pub use walk::{VisitAction, Visitor};

use std::fs::{self, Metadata};
use std::io;
use std::path::{Path, PathBuf};

pub type Result<T> = std::result::Result<T, VfsError>;

/// A filesystem sandbox rooted at a single directory.
///
/// Every relative path handed to a `Vfs` method is resolved against `root`
/// and rejected with [`VfsError::PathEscape`] if the resolved path would
/// leave it, even transiently through `..` segments.
pub struct Vfs {
    root: PathBuf,
    read_only: bool,
}

impl Vfs {
    /// Opens (and creates, if missing) a sandbox rooted at `root`.
    pub fn open(root: impl Into<PathBuf>, read_only: bool) -> Result<Self> {
        let root = root.into();
        fs::create_dir_all(&root).map_err(|e| VfsError::io(&root, e))?;
        let root = fs::canonicalize(&root).map_err(|e| VfsError::io(&root, e))?;
        Ok(Self { root, read_only })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn read(&self, rel: impl AsRef<Path>) -> Result<Vec<u8>> {
        let abs = self.resolve(rel.as_ref())?;
        match fs::read(&abs) {
            Ok(bytes) => Ok(bytes),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                Err(VfsError::NotFound(rel.as_ref().to_path_buf()))
            }
            Err(e) => Err(VfsError::io(rel.as_ref(), e)),
        }
    }

    pub fn write(&self, rel: impl AsRef<Path>, bytes: &[u8]) -> Result<()> {
        self.ensure_writable()?;
        let abs = self.resolve(rel.as_ref())?;
        if let Some(parent) = abs.parent() {
            fs::create_dir_all(parent).map_err(|e| VfsError::io(rel.as_ref(), e))?;
        }
        fs::write(&abs, bytes).map_err(|e| VfsError::io(rel.as_ref(), e))?;
        tracing::debug!(path = %rel.as_ref().display(), bytes = bytes.len(), "vfs write");
        Ok(())
    }

    pub fn append(&self, rel: impl AsRef<Path>, bytes: &[u8]) -> Result<()> {
        use std::io::Write;
        self.ensure_writable()?;
        let abs = self.resolve(rel.as_ref())?;
        if let Some(parent) = abs.parent() {
            fs::create_dir_all(parent).map_err(|e| VfsError::io(rel.as_ref(), e))?;
        }
        let mut f = fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&abs)
            .map_err(|e| VfsError::io(rel.as_ref(), e))?;
        f.write_all(bytes).map_err(|e| VfsError::io(rel.as_ref(), e))?;
        Ok(())
    }

    pub fn exists(&self, rel: impl AsRef<Path>) -> Result<bool> {
        let abs = self.resolve(rel.as_ref())?;
        Ok(abs.exists())
    }

    pub fn list(&self, rel: impl AsRef<Path>) -> Result<Vec<PathBuf>> {
        let abs = self.resolve(rel.as_ref())?;
        let entries = fs::read_dir(&abs).map_err(|e| {
            if e.kind() == io::ErrorKind::NotFound {
                VfsError::NotFound(rel.as_ref().to_path_buf())
            } else {
                VfsError::io(rel.as_ref(), e)
            }
        })?;
        let mut out = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| VfsError::io(rel.as_ref(), e))?;
            out.push(entry.path());
        }
        Ok(out)
    }

    pub fn stat(&self, rel: impl AsRef<Path>) -> Result<Metadata> {
        let abs = self.resolve(rel.as_ref())?;
        fs::metadata(&abs).map_err(|e| {
            if e.kind() == io::ErrorKind::NotFound {
                VfsError::NotFound(rel.as_ref().to_path_buf())
            } else {
                VfsError::io(rel.as_ref(), e)
            }
        })
    }

    pub fn remove(&self, rel: impl AsRef<Path>) -> Result<()> {
        self.ensure_writable()?;
        let abs = self.resolve(rel.as_ref())?;
        let meta = fs::metadata(&abs).map_err(|e| {
            if e.kind() == io::ErrorKind::NotFound {
                VfsError::NotFound(rel.as_ref().to_path_buf())
            } else {
                VfsError::io(rel.as_ref(), e)
            }
        })?;
        if meta.is_dir() {
            fs::remove_dir_all(&abs).map_err(|e| VfsError::io(rel.as_ref(), e))?;
        } else {
            fs::remove_file(&abs).map_err(|e| VfsError::io(rel.as_ref(), e))?;
        }
        tracing::info!(path = %rel.as_ref().display(), "vfs remove");
        Ok(())
    }

    /// Depth-first walk starting at `rel`, pruning subtrees the visitor marks `SkipDir`.
    pub fn walk(&self, rel: impl AsRef<Path>, visitor: &mut dyn Visitor) -> Result<()> {
        let abs = self.resolve(rel.as_ref())?;
        walk::walk_dir(&abs, visitor);
        Ok(())
    }

    fn ensure_writable(&self) -> Result<()> {
        if self.read_only {
            return Err(VfsError::ReadOnly);
        }
        Ok(())
    }

    fn resolve(&self, rel: &Path) -> Result<PathBuf> {
        path::resolve_within(&self.root, rel)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_parent_escape() {
        let dir = tempfile::tempdir().unwrap();
        let vfs = Vfs::open(dir.path(), false).unwrap();
        let err = vfs.read("../../etc/passwd").unwrap_err();
        assert!(matches!(err, VfsError::PathEscape(_)));
    }

    #[test]
    fn write_then_read_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let vfs = Vfs::open(dir.path(), false).unwrap();
        vfs.write("a/b/c.txt", b"hello").unwrap();
        assert_eq!(vfs.read("a/b/c.txt").unwrap(), b"hello");
        assert!(vfs.exists("a/b/c.txt").unwrap());
    }

    #[test]
    fn read_only_rejects_writes() {
        let dir = tempfile::tempdir().unwrap();
        let vfs = Vfs::open(dir.path(), true).unwrap();
        let err = vfs.write("x.txt", b"no").unwrap_err();
        assert!(matches!(err, VfsError::ReadOnly));
    }

    #[test]
    fn missing_read_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let vfs = Vfs::open(dir.path(), false).unwrap();
        let err = vfs.read("nope.txt").unwrap_err();
        assert!(matches!(err, VfsError::NotFound(_)));
    }

    #[test]
    fn walk_respects_skip_dir() {
        let dir = tempfile::tempdir().unwrap();
        let vfs = Vfs::open(dir.path(), false).unwrap();
        vfs.write("keep/a.txt", b"1").unwrap();
        vfs.write("skip/b.txt", b"2").unwrap();

        struct Collector(Vec<PathBuf>);
        impl Visitor for Collector {
            fn visit(
                &mut self,
                path: &Path,
                metadata: Option<&Metadata>,
                _enter_error: Option<&io::Error>,
            ) -> VisitAction {
                if metadata.map(|m| m.is_dir()).unwrap_or(false)
                    && path.file_name().map(|n| n == "skip").unwrap_or(false)
                {
                    return VisitAction::SkipDir;
                }
                self.0.push(path.to_path_buf());
                VisitAction::Continue
            }
        }

        let mut collector = Collector(Vec::new());
        vfs.walk(".", &mut collector).unwrap();
        assert!(collector.0.iter().any(|p| p.ends_with("a.txt")));
        assert!(!collector.0.iter().any(|p| p.ends_with("b.txt")));
    }
}
