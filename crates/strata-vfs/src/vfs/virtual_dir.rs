//! Directories that exist only because something is mounted beneath them.

use std::collections::BTreeSet;
use std::sync::Arc;

use super::error::{VfsError, VfsResult};
use super::ops::Adapter;
use super::path;
use super::types::{DirEntry, FileAttr, SetAttr};

/// Read access to the set of bound prefixes of a mount registry.
pub trait MountIndex: Send + Sync {
    /// Every bound prefix, normalized.
    fn prefixes(&self) -> Vec<String>;

    /// Names directly below `path` on the way to a bound prefix.
    fn children_of(&self, path: &str) -> Vec<String> {
        let prefixes = self.prefixes();
        children_below(prefixes.iter().map(String::as_str), path)
    }

    /// True if at least one prefix lies strictly below `path`.
    fn has_mounts_below(&self, path: &str) -> bool {
        self.prefixes()
            .iter()
            .any(|prefix| path::next_segment(path, prefix).is_some())
    }
}

/// Distinct first segments below `dir` of every prefix under it, sorted.
pub fn children_below<'a>(prefixes: impl IntoIterator<Item = &'a str>, dir: &str) -> Vec<String> {
    prefixes
        .into_iter()
        .filter_map(|prefix| path::next_segment(dir, prefix))
        .map(str::to_string)
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

/// Adapter answering for synthesized directories.
///
/// Paths are in the frame of the mount registry. The root and every strict
/// ancestor of a bound prefix are empty read-only directories whose children
/// are the next segments toward the mounts; everything else is missing.
pub struct VirtualDirectory {
    index: Arc<dyn MountIndex>,
}

impl VirtualDirectory {
    pub fn new(index: Arc<dyn MountIndex>) -> Self {
        Self { index }
    }

    fn is_virtual(&self, path: &str) -> bool {
        path::is_root(path) || self.index.has_mounts_below(path)
    }

    fn refuse<T>(&self, path: &str) -> VfsResult<T> {
        let normalized = path::normalize(path);
        if self.is_virtual(&normalized) {
            Err(VfsError::read_only(normalized))
        } else {
            Err(VfsError::not_found(normalized))
        }
    }
}

impl std::fmt::Debug for VirtualDirectory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VirtualDirectory")
            .field("prefixes", &self.index.prefixes())
            .finish()
    }
}

impl Adapter for VirtualDirectory {
    fn stat(&self, path: &str) -> VfsResult<FileAttr> {
        let normalized = path::normalize(path);
        if self.is_virtual(&normalized) {
            Ok(FileAttr::virtual_directory())
        } else {
            Err(VfsError::not_found(normalized))
        }
    }

    fn list(&self, path: &str) -> VfsResult<Vec<DirEntry>> {
        let normalized = path::normalize(path);
        if !self.is_virtual(&normalized) {
            return Err(VfsError::not_found(normalized));
        }
        Ok(self
            .index
            .children_of(&normalized)
            .into_iter()
            .map(DirEntry::directory)
            .collect())
    }

    fn read(&self, path: &str) -> VfsResult<Vec<u8>> {
        let normalized = path::normalize(path);
        if self.is_virtual(&normalized) {
            Err(VfsError::is_a_directory(normalized))
        } else {
            Err(VfsError::not_found(normalized))
        }
    }

    fn write(&self, path: &str, _data: &[u8], _create: bool) -> VfsResult<()> {
        self.refuse(path)
    }

    fn append(&self, path: &str, _data: &[u8], _create: bool) -> VfsResult<()> {
        self.refuse(path)
    }

    fn truncate(&self, path: &str, _size: u64) -> VfsResult<()> {
        self.refuse(path)
    }

    fn create_file(&self, path: &str, _parents: bool) -> VfsResult<FileAttr> {
        self.refuse(path)
    }

    fn create_directory(&self, path: &str, _parents: bool) -> VfsResult<FileAttr> {
        self.refuse(path)
    }

    fn delete(&self, path: &str, _recursive: bool) -> VfsResult<()> {
        self.refuse(path)
    }

    fn rename(&self, from: &str, _to: &str) -> VfsResult<()> {
        self.refuse(from)
    }

    fn setattr(&self, path: &str, _attr: SetAttr) -> VfsResult<FileAttr> {
        self.refuse(path)
    }

    fn read_only(&self) -> bool {
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Fixed(Vec<&'static str>);

    impl MountIndex for Fixed {
        fn prefixes(&self) -> Vec<String> {
            self.0.iter().map(|p| p.to_string()).collect()
        }
    }

    fn virtual_dir(prefixes: Vec<&'static str>) -> VirtualDirectory {
        VirtualDirectory::new(Arc::new(Fixed(prefixes)))
    }

    #[test]
    fn test_children_below() {
        let prefixes = ["/mnt/a", "/mnt/b/c", "/srv", "/mnt/a/deep"];
        assert_eq!(children_below(prefixes, "/"), vec!["mnt", "srv"]);
        assert_eq!(children_below(prefixes, "/mnt"), vec!["a", "b"]);
        assert!(children_below(prefixes, "/srv").is_empty());
    }

    #[test]
    fn test_ancestor_of_mount_is_directory() {
        let dir = virtual_dir(vec!["/a/b"]);

        let attr = dir.stat("/a").unwrap();
        assert!(attr.is_dir());
        assert_eq!(attr.perm, 0o555);
        assert!(dir.exists("/").unwrap());
        assert!(dir.is_directory("/a").unwrap());

        let names: Vec<_> = dir.list("/a").unwrap().into_iter().map(|e| e.name).collect();
        assert_eq!(names, vec!["b"]);
    }

    #[test]
    fn test_unrelated_path_is_missing() {
        let dir = virtual_dir(vec!["/a/b"]);
        assert!(matches!(dir.stat("/z"), Err(VfsError::NotFound(p)) if p == "/z"));
        assert!(!dir.exists("/a/b/c").unwrap());
    }

    #[test]
    fn test_writes_refused() {
        let dir = virtual_dir(vec!["/a/b"]);
        assert!(dir.read_only());
        assert!(matches!(dir.create_file("/a", false), Err(VfsError::ReadOnly(_))));
        assert!(matches!(dir.delete("/a", true), Err(VfsError::ReadOnly(_))));
        assert!(matches!(dir.read("/a"), Err(VfsError::IsADirectory(_))));
    }
}
