//! VFS mount table with longest-prefix routing.
//!
//! Routes filesystem operations to the appropriate backend based on path.

use std::collections::BTreeMap;
use std::sync::Arc;

use parking_lot::RwLock;

use super::error::{VfsError, VfsResult};
use super::ops::Adapter;
use super::path;
use super::routed::{Router, Routed};
use super::virtual_dir::{MountIndex, VirtualDirectory};

/// Information about a mount point.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MountInfo {
    /// The mount path (e.g., "/mnt/project").
    pub path: String,
    /// Whether this mount is read-only.
    pub read_only: bool,
}

/// Mount points, keyed by normalized prefix.
#[derive(Default)]
pub struct MountRegistry {
    mounts: RwLock<BTreeMap<String, Arc<dyn Adapter>>>,
}

impl MountIndex for MountRegistry {
    fn prefixes(&self) -> Vec<String> {
        self.mounts.read().keys().cloned().collect()
    }
}

/// Routes filesystem operations to mounted backends.
///
/// Mount points are matched by longest prefix. For example, if `/mnt` and
/// `/mnt/project` are both mounted, a path like `/mnt/project/src/main.rs`
/// will be routed to the `/mnt/project` mount.
pub struct MountTable {
    registry: Arc<MountRegistry>,
}

impl std::fmt::Debug for MountTable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MountTable")
            .field("mounts", &self.registry.prefixes())
            .finish()
    }
}

impl Default for MountTable {
    fn default() -> Self {
        Self::new()
    }
}

impl MountTable {
    /// Create a new empty mount table.
    pub fn new() -> Self {
        Self {
            registry: Arc::new(MountRegistry::default()),
        }
    }

    /// Mount a filesystem at the given path.
    ///
    /// Fails if something is already mounted there; unmount it first.
    pub fn mount(&self, prefix: &str, fs: impl Adapter + 'static) -> VfsResult<()> {
        self.mount_arc(prefix, Arc::new(fs))
    }

    /// Mount a filesystem (already wrapped in Arc) at the given path.
    pub fn mount_arc(&self, prefix: &str, fs: Arc<dyn Adapter>) -> VfsResult<()> {
        let prefix = path::normalize(prefix);
        let mut mounts = self.registry.mounts.write();
        if mounts.contains_key(&prefix) {
            return Err(VfsError::already_mounted(prefix));
        }
        tracing::info!(prefix = %prefix, read_only = fs.read_only(), "mounted");
        mounts.insert(prefix, fs);
        Ok(())
    }

    /// Unmount the filesystem at the given path.
    ///
    /// Returns `true` if a mount was removed, `false` if nothing was mounted there.
    pub fn unmount(&self, prefix: &str) -> bool {
        let prefix = path::normalize(prefix);
        let removed = self.registry.mounts.write().remove(&prefix).is_some();
        if removed {
            tracing::info!(prefix = %prefix, "unmounted");
        } else {
            tracing::debug!(prefix = %prefix, "unmount of unbound prefix");
        }
        removed
    }

    /// List all current mounts.
    pub fn list_mounts(&self) -> Vec<MountInfo> {
        self.registry
            .mounts
            .read()
            .iter()
            .map(|(path, fs)| MountInfo {
                path: path.clone(),
                read_only: fs.read_only(),
            })
            .collect()
    }

    /// Most specific mount owning `path`, with its prefix.
    ///
    /// Walks from the path itself up through its ancestors to the root.
    pub fn select_delegate(&self, path: &str) -> VfsResult<(String, Arc<dyn Adapter>)> {
        let normalized = path::normalize(path);
        let mounts = self.registry.mounts.read();
        path::ancestors(&normalized)
            .find_map(|candidate| {
                mounts
                    .get(&candidate)
                    .map(|fs| (candidate.clone(), Arc::clone(fs)))
            })
            .ok_or_else(|| VfsError::no_mount_point(normalized))
    }

    /// Like [`select_delegate`](Self::select_delegate), returning the path
    /// local to the selected mount instead of the prefix.
    pub fn resolve_local(&self, path: &str) -> VfsResult<(Arc<dyn Adapter>, String)> {
        let normalized = path::normalize(path);
        let (prefix, fs) = self.select_delegate(&normalized)?;
        Ok((fs, path::strip_prefix(&normalized, &prefix)))
    }
}

impl Router for MountTable {
    fn route(&self, path: &str) -> VfsResult<(Arc<dyn Adapter>, String)> {
        match self.resolve_local(path) {
            Ok(found) => Ok(found),
            Err(VfsError::NoMountPoint(missed))
                if path::is_root(&missed) || self.registry.has_mounts_below(&missed) =>
            {
                let index: Arc<dyn MountIndex> = self.registry.clone();
                let fallback: Arc<dyn Adapter> = Arc::new(VirtualDirectory::new(index));
                Ok((fallback, missed))
            }
            Err(e) => Err(e),
        }
    }

    fn mounted_children(&self, path: &str) -> Vec<String> {
        self.registry.children_of(path)
    }
}

/// Adapter view of a [`MountTable`].
pub type MountAdapter = Routed<MountTable>;

impl Default for MountAdapter {
    fn default() -> Self {
        Routed::new(MountTable::new())
    }
}

impl MountAdapter {
    /// Create an adapter over an empty mount table.
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn mount(&self, prefix: &str, fs: impl Adapter + 'static) -> VfsResult<()> {
        self.router().mount(prefix, fs)
    }

    pub fn mount_arc(&self, prefix: &str, fs: Arc<dyn Adapter>) -> VfsResult<()> {
        self.router().mount_arc(prefix, fs)
    }

    pub fn unmount(&self, prefix: &str) -> bool {
        self.router().unmount(prefix)
    }

    pub fn list_mounts(&self) -> Vec<MountInfo> {
        self.router().list_mounts()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vfs::backends::MemoryBackend;

    fn memory_with(path: &str, data: &[u8]) -> MemoryBackend {
        let fs = MemoryBackend::new();
        fs.create_file(path, true).unwrap();
        fs.write(path, data, false).unwrap();
        fs
    }

    #[test]
    fn test_basic_mount() {
        let table = MountAdapter::empty();
        table.mount("/scratch", memory_with("/test.txt", b"hello")).unwrap();

        let data = table.read("/scratch/test.txt").unwrap();
        assert_eq!(data, b"hello");
    }

    #[test]
    fn test_multiple_mounts() {
        let table = MountAdapter::empty();
        table.mount("/scratch", memory_with("/a.txt", b"scratch")).unwrap();
        table.mount("/data", memory_with("/b.txt", b"data")).unwrap();

        assert_eq!(table.read("/scratch/a.txt").unwrap(), b"scratch");
        assert_eq!(table.read("/data/b.txt").unwrap(), b"data");
    }

    #[test]
    fn test_nested_mount() {
        let table = MountAdapter::empty();
        table.mount("/mnt", memory_with("/outer.txt", b"outer")).unwrap();
        table.mount("/mnt/project", memory_with("/inner.txt", b"inner")).unwrap();

        // /mnt/outer.txt should come from outer mount
        assert_eq!(table.read("/mnt/outer.txt").unwrap(), b"outer");

        // /mnt/project/inner.txt should come from inner mount
        assert_eq!(table.read("/mnt/project/inner.txt").unwrap(), b"inner");
    }

    #[test]
    fn test_longest_prefix_local_paths() {
        let table = MountTable::new();
        let a: Arc<dyn Adapter> = Arc::new(MemoryBackend::new());
        let ab: Arc<dyn Adapter> = Arc::new(MemoryBackend::new());
        table.mount_arc("/a", Arc::clone(&a)).unwrap();
        table.mount_arc("/a/b", Arc::clone(&ab)).unwrap();

        let (fs, local) = table.resolve_local("/a/b/c").unwrap();
        assert!(Arc::ptr_eq(&fs, &ab));
        assert_eq!(local, "/c");

        let (fs, local) = table.resolve_local("/a/x").unwrap();
        assert!(Arc::ptr_eq(&fs, &a));
        assert_eq!(local, "/x");

        let (prefix, _) = table.select_delegate("/a/b").unwrap();
        assert_eq!(prefix, "/a/b");
    }

    #[test]
    fn test_select_delegate_miss_names_path() {
        let table = MountTable::new();
        table.mount("/a", MemoryBackend::new()).unwrap();

        let result = table.select_delegate("/nothing/here.txt");
        assert!(matches!(result, Err(VfsError::NoMountPoint(p)) if p == "/nothing/here.txt"));
    }

    #[test]
    fn test_double_mount_fails() {
        let table = MountAdapter::empty();
        table.mount("/data", MemoryBackend::new()).unwrap();

        let result = table.mount("/data/", MemoryBackend::new());
        assert!(matches!(result, Err(VfsError::AlreadyMounted(p)) if p == "/data"));
    }

    #[test]
    fn test_list_root() {
        let table = MountAdapter::empty();
        table.mount("/scratch", MemoryBackend::new()).unwrap();
        table.mount("/mnt/a", MemoryBackend::new()).unwrap();
        table.mount("/mnt/b", MemoryBackend::new()).unwrap();

        let entries = table.list("/").unwrap();
        let names: Vec<_> = entries.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, vec!["mnt", "scratch"]);
        assert!(entries.iter().all(|e| e.kind.is_dir()));
    }

    #[test]
    fn test_virtual_intermediate() {
        let table = MountAdapter::empty();
        table.mount("/a/b", MemoryBackend::new()).unwrap();

        assert!(table.exists("/a").unwrap());
        assert!(table.is_directory("/a").unwrap());
        let names: Vec<_> = table.list("/a").unwrap().into_iter().map(|e| e.name).collect();
        assert_eq!(names, vec!["b"]);

        assert!(!table.exists("/c").unwrap());
        assert!(matches!(table.create_file("/c", false), Err(VfsError::NoMountPoint(_))));
        assert!(matches!(table.create_file("/a/new", false), Err(VfsError::NoMountPoint(_))));
    }

    #[test]
    fn test_unmount() {
        let table = MountAdapter::empty();
        table.mount("/scratch", memory_with("/test.txt", b"data")).unwrap();

        assert!(table.read("/scratch/test.txt").is_ok());

        assert!(table.unmount("/scratch"));
        assert!(!table.unmount("/scratch"));

        assert!(table.read("/scratch/test.txt").is_err());
    }

    #[test]
    fn test_unmount_restores_outer() {
        let table = MountAdapter::empty();
        table.mount("/", memory_with("/data/x", b"outer")).unwrap();
        table.mount("/data", memory_with("/x", b"inner")).unwrap();
        assert_eq!(table.read("/data/x").unwrap(), b"inner");

        table.unmount("/data");
        assert_eq!(table.read("/data/x").unwrap(), b"outer");
    }

    #[test]
    fn test_list_mounts() {
        let table = MountAdapter::empty();
        table.mount("/scratch", MemoryBackend::new()).unwrap();
        let mut ro = MemoryBackend::new();
        ro.set_read_only(true);
        table.mount("/data", ro).unwrap();

        let mounts = table.list_mounts();
        assert_eq!(
            mounts,
            vec![
                MountInfo {
                    path: "/data".into(),
                    read_only: true
                },
                MountInfo {
                    path: "/scratch".into(),
                    read_only: false
                },
            ]
        );
    }

    #[test]
    fn test_root_mount() {
        let table = MountAdapter::empty();
        table.mount("/", memory_with("/at-root.txt", b"root file")).unwrap();

        let data = table.read("/at-root.txt").unwrap();
        assert_eq!(data, b"root file");
    }

    #[test]
    fn test_root_mount_lists_nested_mounts() {
        let table = MountAdapter::empty();
        table.mount("/", memory_with("/etc.txt", b"")).unwrap();
        table.mount("/srv", MemoryBackend::new()).unwrap();

        let names: Vec<_> = table.list("/").unwrap().into_iter().map(|e| e.name).collect();
        assert_eq!(names, vec!["etc.txt", "srv"]);
        assert!(table.stat("/srv").unwrap().is_dir());
    }

    #[test]
    fn test_write_through_table() {
        let table = MountAdapter::empty();
        table.mount("/scratch", MemoryBackend::new()).unwrap();

        table.create_file("/scratch/new.txt", false).unwrap();
        table.write("/scratch/new.txt", b"created", false).unwrap();

        let data = table.read("/scratch/new.txt").unwrap();
        assert_eq!(data, b"created");
    }

    #[test]
    fn test_errors_name_full_path() {
        let table = MountAdapter::empty();
        table.mount("/srv", MemoryBackend::new()).unwrap();

        let result = table.read("/srv/missing.txt");
        assert!(matches!(result, Err(VfsError::NotFound(p)) if p == "/srv/missing.txt"));
    }

    #[test]
    fn test_stat_root() {
        let table = MountAdapter::empty();
        let attr = table.stat("/").unwrap();
        assert!(attr.is_dir());
    }

    #[test]
    fn test_cross_mount_rename_moves() {
        let table = MountAdapter::empty();
        table.mount("/a", MemoryBackend::new()).unwrap();
        table.mount("/b", MemoryBackend::new()).unwrap();

        table.write("/a/file.txt", b"moving", true).unwrap();
        table.rename("/a/file.txt", "/b/file.txt").unwrap();

        assert!(!table.exists("/a/file.txt").unwrap());
        assert_eq!(table.read("/b/file.txt").unwrap(), b"moving");
    }
}
