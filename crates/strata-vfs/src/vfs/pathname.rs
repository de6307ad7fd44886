//! Paths bound to a filesystem.
//!
//! A [`Pathname`] pairs a normalized virtual path with the root adapter it
//! is resolved against. Every operation goes through the root with the full
//! path, so mounts and virtual directories apply. The owning adapter and
//! local path are looked up on first use and remembered for the lifetime
//! of the instance; existence and type never are.

use std::fmt;
use std::hash::{Hash, Hasher};
use std::path::PathBuf;
use std::sync::{Arc, OnceLock};
use std::time::SystemTime;

use super::error::{VfsError, VfsResult};
use super::filter::{self, ListFilter, ListedEntry};
use super::ops::{Adapter, FileStream, Resolved, copy_tree};
use super::path;
use super::types::{CopyOptions, FileAttr, OpenFlags, SetAttr, StatFs};
use super::validate;

/// A virtual path and the root it lives under.
#[derive(Clone)]
pub struct Pathname {
    full: String,
    root: Arc<dyn Adapter>,
    resolved: OnceLock<Resolved>,
}

impl Pathname {
    pub fn new(root: Arc<dyn Adapter>, path: &str) -> Self {
        Self {
            full: path::normalize(path),
            root,
            resolved: OnceLock::new(),
        }
    }

    /// The normalized absolute path.
    pub fn full(&self) -> &str {
        &self.full
    }

    /// Final segment; empty for the root.
    pub fn name(&self) -> &str {
        path::file_name(&self.full)
    }

    pub fn is_root(&self) -> bool {
        path::is_root(&self.full)
    }

    /// The containing directory. The root is its own parent.
    pub fn parent(&self) -> Pathname {
        Pathname::new(Arc::clone(&self.root), &path::parent(&self.full))
    }

    /// A path below this one.
    pub fn child(&self, segment: &str) -> Pathname {
        Pathname::new(Arc::clone(&self.root), &path::join(&self.full, segment))
    }

    /// The adapter this path is resolved against.
    pub fn root_adapter(&self) -> &Arc<dyn Adapter> {
        &self.root
    }

    // ========================================================================
    // Resolution
    // ========================================================================

    fn resolved(&self) -> VfsResult<&Resolved> {
        if let Some(resolved) = self.resolved.get() {
            return Ok(resolved);
        }
        let resolved = match self.root.resolve_local(&self.full)? {
            Some(resolved) => resolved,
            None => Resolved {
                adapter: Arc::clone(&self.root),
                local: self.full.clone(),
            },
        };
        tracing::trace!(path = %self.full, local = %resolved.local, "resolved");
        Ok(self.resolved.get_or_init(|| resolved))
    }

    /// The path as the owning adapter knows it.
    pub fn local(&self) -> VfsResult<&str> {
        Ok(&self.resolved()?.local)
    }

    /// The adapter that actually owns this path.
    pub fn local_adapter(&self) -> VfsResult<Arc<dyn Adapter>> {
        Ok(Arc::clone(&self.resolved()?.adapter))
    }

    // ========================================================================
    // Existence and type
    // ========================================================================

    pub fn exists(&self) -> VfsResult<bool> {
        self.root.exists(&self.full)
    }

    pub fn is_file(&self) -> VfsResult<bool> {
        self.root.is_file(&self.full)
    }

    pub fn is_directory(&self) -> VfsResult<bool> {
        self.root.is_directory(&self.full)
    }

    pub fn is_link(&self) -> VfsResult<bool> {
        self.root.is_link(&self.full)
    }

    // ========================================================================
    // Metadata
    // ========================================================================

    pub fn stat(&self) -> VfsResult<FileAttr> {
        validate::require_exists(&*self.root, &self.full)
    }

    fn set(&self, attr: SetAttr) -> VfsResult<FileAttr> {
        validate::require_exists(&*self.root, &self.full)?;
        self.root.setattr(&self.full, attr)
    }

    pub fn size(&self) -> VfsResult<u64> {
        Ok(self.stat()?.size)
    }

    pub fn modified_time(&self) -> VfsResult<SystemTime> {
        Ok(self.stat()?.mtime)
    }

    pub fn set_modified_time(&self, mtime: SystemTime) -> VfsResult<()> {
        self.set(SetAttr::new().with_mtime(mtime)).map(drop)
    }

    pub fn accessed_time(&self) -> VfsResult<Option<SystemTime>> {
        Ok(self.stat()?.atime)
    }

    pub fn set_accessed_time(&self, atime: SystemTime) -> VfsResult<()> {
        self.set(SetAttr::new().with_atime(atime)).map(drop)
    }

    pub fn created_time(&self) -> VfsResult<Option<SystemTime>> {
        Ok(self.stat()?.ctime)
    }

    pub fn owner(&self) -> VfsResult<Option<u32>> {
        Ok(self.stat()?.uid)
    }

    pub fn set_owner(&self, uid: u32) -> VfsResult<()> {
        self.set(SetAttr::new().with_uid(uid)).map(drop)
    }

    pub fn group(&self) -> VfsResult<Option<u32>> {
        Ok(self.stat()?.gid)
    }

    pub fn set_group(&self, gid: u32) -> VfsResult<()> {
        self.set(SetAttr::new().with_gid(gid)).map(drop)
    }

    /// Permission bits (e.g. `0o644`).
    pub fn permissions(&self) -> VfsResult<u32> {
        Ok(self.stat()?.perm)
    }

    pub fn set_permissions(&self, perm: u32) -> VfsResult<()> {
        self.set(SetAttr::new().with_perm(perm)).map(drop)
    }

    /// Host path backing this one, if the owning adapter has one.
    pub fn real_path(&self) -> VfsResult<Option<PathBuf>> {
        self.root.real_path(&self.full)
    }

    /// Disk statistics of the owning adapter.
    pub fn statfs(&self) -> VfsResult<StatFs> {
        self.local_adapter()?.statfs()
    }

    // ========================================================================
    // Contents
    // ========================================================================

    pub fn contents(&self) -> VfsResult<Vec<u8>> {
        validate::require_file(&*self.root, &self.full)?;
        self.root.read(&self.full)
    }

    /// Contents as UTF-8 text.
    pub fn contents_string(&self) -> VfsResult<String> {
        String::from_utf8(self.contents()?)
            .map_err(|e| VfsError::other(format!("{}: {e}", self.full)))
    }

    /// Replace the contents, creating the file if needed.
    pub fn set_contents(&self, data: impl AsRef<[u8]>) -> VfsResult<()> {
        self.root.write(&self.full, data.as_ref(), true)
    }

    /// Append to the contents, creating the file if needed.
    pub fn append_contents(&self, data: impl AsRef<[u8]>) -> VfsResult<()> {
        self.root.append(&self.full, data.as_ref(), true)
    }

    pub fn truncate(&self, size: u64) -> VfsResult<()> {
        validate::require_file(&*self.root, &self.full)?;
        self.root.truncate(&self.full, size)
    }

    pub fn open(&self, flags: OpenFlags) -> VfsResult<Box<dyn FileStream>> {
        if !flags.create {
            validate::require_file(&*self.root, &self.full)?;
        }
        self.root.open(&self.full, flags)
    }

    // ========================================================================
    // Structure
    // ========================================================================

    /// Create this directory. With `parents`, an existing directory is fine.
    pub fn create_directory(&self, parents: bool) -> VfsResult<()> {
        if !parents {
            validate::require_absent(&*self.root, &self.full)?;
        }
        self.root.create_directory(&self.full, parents).map(drop)
    }

    /// Create this file empty.
    pub fn create_file(&self, parents: bool) -> VfsResult<()> {
        validate::require_absent(&*self.root, &self.full)?;
        self.root.create_file(&self.full, parents).map(drop)
    }

    pub fn delete(&self, recursive: bool) -> VfsResult<()> {
        validate::require_exists(&*self.root, &self.full)?;
        self.root.delete(&self.full, recursive)
    }

    /// Copy this file or tree to `dst`, possibly on another adapter.
    #[tracing::instrument(skip(self, dst, opts), fields(from = %self.full, to = %dst.full), name = "pathname.copy")]
    pub fn copy_to(&self, dst: &Pathname, opts: CopyOptions) -> VfsResult<()> {
        validate::require_exists(&*self.root, &self.full)?;
        self.require_outside(dst)?;
        let target = dst.resolved()?;
        validate::require_writable(&*target.adapter, dst.full())?;

        if self.root.has_mounts_below(&self.full)? {
            // Mounted subtrees only show up in the composed view
            tracing::debug!("copy spans mounts");
            return copy_tree(&*self.root, &self.full, &*dst.root, &dst.full, opts);
        }

        let src = self.resolved()?;
        tracing::debug!(local_from = %src.local, local_to = %target.local, "copy");
        src.adapter
            .copy_to(&src.local, &*target.adapter, &target.local, opts)
    }

    /// Move this file or tree to `dst`, possibly on another adapter.
    #[tracing::instrument(skip(self, dst, opts), fields(from = %self.full, to = %dst.full), name = "pathname.move")]
    pub fn move_to(&self, dst: &Pathname, opts: CopyOptions) -> VfsResult<()> {
        validate::require_exists(&*self.root, &self.full)?;
        self.require_outside(dst)?;
        if self.root.has_mounts_below(&self.full)? {
            return Err(VfsError::unsupported(format!(
                "cannot move {}: mounts lie below it",
                self.full
            )));
        }
        if !opts.overwrite {
            validate::require_absent(&*dst.root, dst.full())?;
        }
        let src = self.resolved()?;
        let target = dst.resolved()?;
        validate::require_writable(&*src.adapter, &self.full)?;
        validate::require_writable(&*target.adapter, dst.full())?;

        tracing::debug!(local_from = %src.local, local_to = %target.local, "move");
        if Arc::ptr_eq(&src.adapter, &target.adapter) {
            src.adapter.rename(&src.local, &target.local)
        } else {
            src.adapter
                .move_to(&src.local, &*target.adapter, &target.local, opts)
        }
    }

    /// Refuse a transfer into this path's own subtree.
    fn require_outside(&self, dst: &Pathname) -> VfsResult<()> {
        if Arc::ptr_eq(&self.root, &dst.root) && path::is_within(&dst.full, &self.full) {
            return Err(VfsError::invalid_path(dst.full.clone()));
        }
        Ok(())
    }

    /// Make this path a link pointing at `target`.
    pub fn symlink_to(&self, target: &str) -> VfsResult<()> {
        validate::require_absent(&*self.root, &self.full)?;
        self.root.symlink(&self.full, target).map(drop)
    }

    pub fn read_link(&self) -> VfsResult<String> {
        validate::require_exists(&*self.root, &self.full)?;
        self.root.read_link(&self.full)
    }

    // ========================================================================
    // Listing
    // ========================================================================

    /// Filtered entries of this directory.
    pub fn entries(&self, filter: impl Into<ListFilter>) -> VfsResult<Vec<ListedEntry>> {
        validate::require_directory(&*self.root, &self.full)?;
        filter::list(&*self.root, &self.full, &filter.into())
    }

    /// Filtered paths of this directory.
    pub fn ls(&self, filter: impl Into<ListFilter>) -> VfsResult<Vec<Pathname>> {
        Ok(self
            .entries(filter)?
            .into_iter()
            .map(|entry| Pathname::new(Arc::clone(&self.root), &entry.path))
            .collect())
    }

    /// Number of entries the filter accepts.
    pub fn count(&self, filter: impl Into<ListFilter>) -> VfsResult<usize> {
        Ok(self.entries(filter)?.len())
    }

    /// Iterate over filtered paths.
    pub fn iter(&self, filter: impl Into<ListFilter>) -> VfsResult<std::vec::IntoIter<Pathname>> {
        Ok(self.ls(filter)?.into_iter())
    }
}

impl PartialEq for Pathname {
    fn eq(&self, other: &Self) -> bool {
        self.full == other.full
    }
}

impl Eq for Pathname {}

impl Hash for Pathname {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.full.hash(state);
    }
}

impl fmt::Display for Pathname {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.full)
    }
}

impl fmt::Debug for Pathname {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Pathname").field(&self.full).finish()
    }
}

impl AsRef<str> for Pathname {
    fn as_ref(&self) -> &str {
        &self.full
    }
}
