// [[RARO]]/apps/kernel-server/src/fs_manager.rs
// Purpose: Lays out and opens a project's persisted state root.
// Architecture: Infrastructure Helper Layer.
// Dependencies: raro-vfs, raro-kv, std::path

use std::path::{Path, PathBuf};

use raro_kv::KvStore;
use raro_vfs::Vfs;

/// `DATA_ROOT/<project_id>/{vfs,kv,snapshots}` per the persisted state
/// layout: `vfs/` is agent-visible files, `kv/` is the embedded store's own
/// data files, `snapshots/` holds `backup()` output.
pub struct ProjectLayout {
    root: PathBuf,
}

impl ProjectLayout {
    pub fn new(data_root: impl AsRef<Path>, project_id: &str) -> Self {
        Self {
            root: data_root.as_ref().join(project_id),
        }
    }

    pub fn vfs_root(&self) -> PathBuf {
        self.root.join("vfs")
    }

    pub fn kv_path(&self) -> PathBuf {
        self.root.join("kv").join("store.redb")
    }

    pub fn snapshots_dir(&self) -> PathBuf {
        self.root.join("snapshots")
    }

    /// An agent's own subtree within the project VFS, per the "every agent
    /// owns its VFS subtree" resource policy.
    pub fn agent_vfs(&self, agent_id: &str) -> std::io::Result<Vfs> {
        let root = self.vfs_root().join(agent_id);
        Vfs::open(root, false).map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e))
    }

    pub fn open_kv(&self) -> raro_kv::Result<KvStore> {
        if let Some(parent) = self.kv_path().parent() {
            std::fs::create_dir_all(parent).ok();
        }
        std::fs::create_dir_all(self.snapshots_dir()).ok();
        KvStore::open(self.kv_path())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn agent_vfs_is_sandboxed_under_the_project_root() {
        let dir = tempfile::tempdir().unwrap();
        let layout = ProjectLayout::new(dir.path(), "proj-1");
        let vfs = layout.agent_vfs("agent-a").unwrap();
        assert!(vfs.root().starts_with(dir.path()));
    }
}
