use std::fs::{self, Metadata};
use std::io;
use std::path::Path;

/// What a [`Visitor`] wants to happen after being shown an entry.
pub enum VisitAction {
    Continue,
    SkipDir,
}

/// Receives `(absolute_path, metadata, enter_error)` for each entry visited
/// during a depth-first [`crate::Vfs::walk`]. `enter_error` is set when the
/// entry's metadata could not be read (e.g. a broken symlink); `metadata` is
/// `None` in that case.
pub trait Visitor {
    fn visit(
        &mut self,
        path: &Path,
        metadata: Option<&Metadata>,
        enter_error: Option<&io::Error>,
    ) -> VisitAction;
}

pub(crate) fn walk_dir(dir: &Path, visitor: &mut dyn Visitor) {
    let entries = match fs::read_dir(dir) {
        Ok(e) => e,
        Err(_) => return,
    };
    for entry in entries.flatten() {
        let path = entry.path();
        match entry.metadata() {
            Ok(meta) => {
                let is_dir = meta.is_dir();
                match visitor.visit(&path, Some(&meta), None) {
                    VisitAction::SkipDir => continue,
                    VisitAction::Continue => {
                        if is_dir {
                            walk_dir(&path, visitor);
                        }
                    }
                }
            }
            Err(e) => {
                visitor.visit(&path, None, Some(&e));
            }
        }
    }
}
