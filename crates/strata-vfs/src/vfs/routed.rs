//! The routing decorator.
//!
//! Every composition adapter is a [`Routed`] over some [`Router`]: the
//! router decides which inner adapter owns a path and what that adapter
//! calls it, and `Routed` forwards the operation. Mount points that sit
//! inside the owner's namespace are merged into its listings, and a path
//! the owner doesn't have but that leads to a mount reports as a directory.

use std::path::PathBuf;
use std::sync::Arc;

use parking_lot::RwLock;

use super::error::{VfsError, VfsResult};
use super::ops::{Adapter, FileStream, Resolved};
use super::path;
use super::types::{CopyOptions, DirEntry, FileAttr, OpenFlags, SetAttr, StatFs};

/// Decides which adapter owns a path.
pub trait Router: Send + Sync {
    /// The owning adapter and the path in its terms.
    fn route(&self, path: &str) -> VfsResult<(Arc<dyn Adapter>, String)>;

    /// Names directly below `path` that lead to other bindings of this router.
    fn mounted_children(&self, path: &str) -> Vec<String> {
        let _ = path;
        Vec::new()
    }

    /// Whether the composed namespace refuses writes as a whole.
    fn read_only(&self) -> bool {
        false
    }
}

/// Generic forwarding adapter.
pub struct Routed<R> {
    router: R,
}

impl<R: Router> Routed<R> {
    pub fn new(router: R) -> Self {
        Self { router }
    }

    /// The router this adapter forwards through.
    pub fn router(&self) -> &R {
        &self.router
    }

    fn route(&self, path: &str) -> VfsResult<(String, Arc<dyn Adapter>, String)> {
        let full = path::normalize(path);
        let (adapter, local) = self.router.route(&full)?;
        tracing::trace!(path = %full, local = %local, "routed");
        Ok((full, adapter, local))
    }
}

impl<R> std::fmt::Debug for Routed<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Routed")
            .field("router", &std::any::type_name::<R>())
            .finish()
    }
}

/// Re-express a path reported by an inner adapter in the caller's frame.
fn rebase_path(reported: &str, full: &str, local: &str) -> String {
    if !reported.starts_with('/') {
        return reported.to_string();
    }
    let prefix = if path::is_root(local) {
        full
    } else if let Some(prefix) = full.strip_suffix(local) {
        prefix
    } else {
        return reported.to_string();
    };
    if prefix.is_empty() || path::is_root(prefix) {
        reported.to_string()
    } else if path::is_root(reported) {
        prefix.to_string()
    } else {
        format!("{prefix}{reported}")
    }
}

/// Errors from an inner adapter name paths in its own terms; name them in ours.
fn rebase_error(err: VfsError, full: &str, local: &str) -> VfsError {
    let rebase = |p: String| rebase_path(&p, full, local);
    match err {
        VfsError::NotFound(p) => VfsError::NotFound(rebase(p)),
        VfsError::AlreadyExists(p) => VfsError::AlreadyExists(rebase(p)),
        VfsError::NotADirectory(p) => VfsError::NotADirectory(rebase(p)),
        VfsError::IsADirectory(p) => VfsError::IsADirectory(rebase(p)),
        VfsError::NotAFile(p) => VfsError::NotAFile(rebase(p)),
        VfsError::NotASymlink(p) => VfsError::NotASymlink(rebase(p)),
        VfsError::DirectoryNotEmpty(p) => VfsError::DirectoryNotEmpty(rebase(p)),
        VfsError::ReadOnly(p) => VfsError::ReadOnly(rebase(p)),
        VfsError::NoMountPoint(p) => VfsError::NoMountPoint(rebase(p)),
        other => other,
    }
}

impl<R: Router> Adapter for Routed<R> {
    fn resolve_local(&self, path: &str) -> VfsResult<Option<Resolved>> {
        let (_, adapter, local) = self.route(path)?;
        match adapter.resolve_local(&local)? {
            Some(deeper) => Ok(Some(deeper)),
            None => Ok(Some(Resolved { adapter, local })),
        }
    }

    fn has_mounts_below(&self, path: &str) -> VfsResult<bool> {
        let (full, adapter, local) = self.route(path)?;
        if !self.router.mounted_children(&full).is_empty() {
            return Ok(true);
        }
        adapter.has_mounts_below(&local)
    }

    fn stat(&self, path: &str) -> VfsResult<FileAttr> {
        let (full, adapter, local) = self.route(path)?;
        match adapter.stat(&local) {
            Ok(attr) => Ok(attr),
            Err(e) if e.is_not_found() && !self.router.mounted_children(&full).is_empty() => {
                Ok(FileAttr::virtual_directory())
            }
            Err(e) => Err(rebase_error(e, &full, &local)),
        }
    }

    fn list(&self, path: &str) -> VfsResult<Vec<DirEntry>> {
        let (full, adapter, local) = self.route(path)?;
        let mounted = self.router.mounted_children(&full);

        let mut entries = match adapter.list(&local) {
            Ok(entries) => entries,
            Err(e) if e.is_not_found() && !mounted.is_empty() => Vec::new(),
            Err(e) => return Err(rebase_error(e, &full, &local)),
        };
        if mounted.is_empty() {
            return Ok(entries);
        }

        // A mount shadows whatever the owner has under the same name
        entries.retain(|entry| !mounted.contains(&entry.name));
        entries.extend(mounted.into_iter().map(DirEntry::directory));
        entries.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(entries)
    }

    fn read(&self, path: &str) -> VfsResult<Vec<u8>> {
        let (full, adapter, local) = self.route(path)?;
        adapter
            .read(&local)
            .map_err(|e| rebase_error(e, &full, &local))
    }

    fn read_link(&self, path: &str) -> VfsResult<String> {
        let (full, adapter, local) = self.route(path)?;
        adapter
            .read_link(&local)
            .map_err(|e| rebase_error(e, &full, &local))
    }

    fn write(&self, path: &str, data: &[u8], create: bool) -> VfsResult<()> {
        let (full, adapter, local) = self.route(path)?;
        adapter
            .write(&local, data, create)
            .map_err(|e| rebase_error(e, &full, &local))
    }

    fn append(&self, path: &str, data: &[u8], create: bool) -> VfsResult<()> {
        let (full, adapter, local) = self.route(path)?;
        adapter
            .append(&local, data, create)
            .map_err(|e| rebase_error(e, &full, &local))
    }

    fn truncate(&self, path: &str, size: u64) -> VfsResult<()> {
        let (full, adapter, local) = self.route(path)?;
        adapter
            .truncate(&local, size)
            .map_err(|e| rebase_error(e, &full, &local))
    }

    fn create_file(&self, path: &str, parents: bool) -> VfsResult<FileAttr> {
        let (full, adapter, local) = self.route(path)?;
        adapter
            .create_file(&local, parents)
            .map_err(|e| rebase_error(e, &full, &local))
    }

    fn create_directory(&self, path: &str, parents: bool) -> VfsResult<FileAttr> {
        let (full, adapter, local) = self.route(path)?;
        adapter
            .create_directory(&local, parents)
            .map_err(|e| rebase_error(e, &full, &local))
    }

    fn delete(&self, path: &str, recursive: bool) -> VfsResult<()> {
        let (full, adapter, local) = self.route(path)?;
        adapter
            .delete(&local, recursive)
            .map_err(|e| rebase_error(e, &full, &local))
    }

    fn rename(&self, from: &str, to: &str) -> VfsResult<()> {
        let (from_full, from_adapter, from_local) = self.route(from)?;
        let (to_full, to_adapter, to_local) = self.route(to)?;

        if Arc::ptr_eq(&from_adapter, &to_adapter) {
            return from_adapter
                .rename(&from_local, &to_local)
                .map_err(|e| rebase_error(e, &from_full, &from_local));
        }

        // Different owners: copy across, then remove the source
        tracing::debug!(from = %from_full, to = %to_full, "rename crosses adapters");
        from_adapter
            .stat(&from_local)
            .map_err(|e| rebase_error(e, &from_full, &from_local))?;
        from_adapter
            .move_to(
                &from_local,
                &*to_adapter,
                &to_local,
                CopyOptions::new().recursive().overwrite(),
            )
            .map_err(|e| {
                let at_destination = e.path().is_some_and(|p| path::is_within(p, &to_local));
                if at_destination {
                    rebase_error(e, &to_full, &to_local)
                } else {
                    rebase_error(e, &from_full, &from_local)
                }
            })
    }

    fn setattr(&self, path: &str, attr: SetAttr) -> VfsResult<FileAttr> {
        let (full, adapter, local) = self.route(path)?;
        adapter
            .setattr(&local, attr)
            .map_err(|e| rebase_error(e, &full, &local))
    }

    fn symlink(&self, path: &str, target: &str) -> VfsResult<FileAttr> {
        let (full, adapter, local) = self.route(path)?;
        adapter
            .symlink(&local, target)
            .map_err(|e| rebase_error(e, &full, &local))
    }

    fn open(&self, path: &str, flags: OpenFlags) -> VfsResult<Box<dyn FileStream>> {
        let (full, adapter, local) = self.route(path)?;
        adapter
            .open(&local, flags)
            .map_err(|e| rebase_error(e, &full, &local))
    }

    fn read_only(&self) -> bool {
        self.router.read_only()
    }

    fn statfs(&self) -> VfsResult<StatFs> {
        let (_, adapter, _) = self.route(path::ROOT)?;
        adapter.statfs()
    }

    fn real_path(&self, path: &str) -> VfsResult<Option<PathBuf>> {
        let (full, adapter, local) = self.route(path)?;
        adapter
            .real_path(&local)
            .map_err(|e| rebase_error(e, &full, &local))
    }
}

/// Routes everything to one adapter, unchanged.
pub struct Fixed {
    inner: Arc<dyn Adapter>,
}

impl Fixed {
    pub fn new(inner: Arc<dyn Adapter>) -> Self {
        Self { inner }
    }
}

impl Router for Fixed {
    fn route(&self, path: &str) -> VfsResult<(Arc<dyn Adapter>, String)> {
        Ok((Arc::clone(&self.inner), path::normalize(path)))
    }

    fn read_only(&self) -> bool {
        self.inner.read_only()
    }
}

/// Single-delegate wrapper.
pub type DelegateAdapter = Routed<Fixed>;

impl DelegateAdapter {
    /// Wrap an adapter.
    pub fn wrap(inner: impl Adapter + 'static) -> Self {
        Routed::new(Fixed::new(Arc::new(inner)))
    }

    /// The wrapped adapter.
    pub fn inner(&self) -> &Arc<dyn Adapter> {
        &self.router().inner
    }
}

/// Routes everything to a delegate that can be swapped at runtime.
pub struct RootSlot {
    inner: RwLock<Arc<dyn Adapter>>,
}

impl Router for RootSlot {
    fn route(&self, path: &str) -> VfsResult<(Arc<dyn Adapter>, String)> {
        Ok((Arc::clone(&*self.inner.read()), path::normalize(path)))
    }

    fn read_only(&self) -> bool {
        self.inner.read().read_only()
    }
}

/// Stable entry point of a filesystem.
///
/// Handles taken on the root keep working when the delegate behind it is
/// replaced.
pub type RootAdapter = Routed<RootSlot>;

impl RootAdapter {
    pub fn with_delegate(inner: Arc<dyn Adapter>) -> Self {
        Routed::new(RootSlot {
            inner: RwLock::new(inner),
        })
    }

    /// The current delegate.
    pub fn delegate(&self) -> Arc<dyn Adapter> {
        Arc::clone(&*self.router().inner.read())
    }

    /// Swap in a new delegate, returning the old one.
    pub fn replace(&self, inner: Arc<dyn Adapter>) -> Arc<dyn Adapter> {
        tracing::info!("replacing root delegate");
        std::mem::replace(&mut *self.router().inner.write(), inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vfs::backends::MemoryBackend;

    #[test]
    fn test_delegate_forwards() {
        let mem = MemoryBackend::new();
        mem.write("/a.txt", b"inner", true).unwrap();
        let wrapped = DelegateAdapter::wrap(mem);

        assert_eq!(wrapped.read("/a.txt").unwrap(), b"inner");
        wrapped.write("/b.txt", b"through", true).unwrap();
        assert_eq!(wrapped.inner().read("/b.txt").unwrap(), b"through");
        assert!(!wrapped.read_only());
    }

    #[test]
    fn test_resolve_local_flattens() {
        let mem: Arc<dyn Adapter> = Arc::new(MemoryBackend::new());
        let outer = DelegateAdapter::wrap(DelegateAdapter::new(Fixed::new(Arc::clone(&mem))));

        let resolved = outer.resolve_local("/x/../y").unwrap().unwrap();
        assert!(Arc::ptr_eq(&resolved.adapter, &mem));
        assert_eq!(resolved.local, "/y");
    }

    #[test]
    fn test_root_replace() {
        let first = MemoryBackend::new();
        first.write("/which", b"first", true).unwrap();
        let second = MemoryBackend::new();
        second.write("/which", b"second", true).unwrap();

        let root = RootAdapter::with_delegate(Arc::new(first));
        assert_eq!(root.read("/which").unwrap(), b"first");

        let old = root.replace(Arc::new(second));
        assert_eq!(root.read("/which").unwrap(), b"second");
        assert_eq!(old.read("/which").unwrap(), b"first");
    }

    #[test]
    fn test_cross_adapter_rename_names_full_paths() {
        let table = crate::vfs::MountAdapter::empty();
        table.mount("/a", MemoryBackend::new()).unwrap();
        table.mount("/b", MemoryBackend::new()).unwrap();

        assert!(matches!(
            table.rename("/a/missing", "/b/x"),
            Err(VfsError::NotFound(p)) if p == "/a/missing"
        ));

        table.create_file("/a/dir/f", true).unwrap();
        table.write("/b/file", b"x", true).unwrap();
        assert!(matches!(
            table.rename("/a/dir", "/b/file"),
            Err(VfsError::NotADirectory(p)) if p == "/b/file"
        ));
    }

    #[test]
    fn test_has_mounts_below() {
        let table = crate::vfs::MountAdapter::empty();
        table.mount("/", MemoryBackend::new()).unwrap();
        table.mount("/data/archive", MemoryBackend::new()).unwrap();
        let root = RootAdapter::with_delegate(Arc::new(table));

        assert!(root.has_mounts_below("/").unwrap());
        assert!(root.has_mounts_below("/data").unwrap());
        assert!(!root.has_mounts_below("/data/archive").unwrap());
        assert!(!root.has_mounts_below("/other").unwrap());
    }

    #[test]
    fn test_rebase_path() {
        assert_eq!(rebase_path("/c", "/a/b/c", "/c"), "/a/b/c");
        assert_eq!(rebase_path("/", "/a/b", "/"), "/a/b");
        assert_eq!(rebase_path("/x/y", "/srv/x/y", "/x/y"), "/srv/x/y");
        assert_eq!(rebase_path("/x", "/x", "/x"), "/x");
        assert_eq!(rebase_path("cannot remove root", "/a", "/"), "cannot remove root");
    }
}
