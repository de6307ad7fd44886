//! The adapter contract.
//!
//! Every backing store and every composition node implements [`Adapter`].
//! Paths are always adapter-local, normalized absolute strings (`/` is the
//! adapter's own root). A composition adapter rewrites the path and forwards;
//! it never hands a [`Pathname`](super::Pathname) across the boundary.

use std::io::{self, Cursor, Read, Seek, SeekFrom, Write};
use std::path::PathBuf;
use std::sync::Arc;

use super::path;
use super::types::{CopyOptions, DirEntry, FileAttr, OpenFlags, SetAttr, StatFs};
use super::{VfsError, VfsResult};

/// A byte stream opened on a file.
pub trait FileStream: Read + Write + Seek + Send {}

impl<T: Read + Write + Seek + Send> FileStream for T {}

/// The adapter that owns a path, plus the path in that adapter's terms.
#[derive(Clone)]
pub struct Resolved {
    pub adapter: Arc<dyn Adapter>,
    pub local: String,
}

impl std::fmt::Debug for Resolved {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Resolved")
            .field("adapter", &"<dyn Adapter>")
            .field("local", &self.local)
            .finish()
    }
}

/// Filesystem capability surface.
pub trait Adapter: Send + Sync {
    // ========================================================================
    // Resolution
    // ========================================================================

    /// Find the adapter that actually owns `path`.
    ///
    /// Leaf adapters own everything they are asked about and return `None`.
    /// Composition adapters return the inner adapter and the rewritten path,
    /// already resolved all the way down.
    fn resolve_local(&self, path: &str) -> VfsResult<Option<Resolved>> {
        let _ = path;
        Ok(None)
    }

    /// True if other adapters are grafted strictly below `path`.
    ///
    /// Leaf adapters have nothing mounted in them and answer `false`.
    fn has_mounts_below(&self, path: &str) -> VfsResult<bool> {
        let _ = path;
        Ok(false)
    }

    // ========================================================================
    // Reading
    // ========================================================================

    /// Get attributes. Links report their target's type with `is_link` set.
    fn stat(&self, path: &str) -> VfsResult<FileAttr>;

    /// Raw directory entries, without `.`/`..`.
    fn list(&self, path: &str) -> VfsResult<Vec<DirEntry>>;

    /// Whole file contents.
    fn read(&self, path: &str) -> VfsResult<Vec<u8>>;

    /// Read symbolic link target.
    fn read_link(&self, path: &str) -> VfsResult<String> {
        Err(VfsError::not_a_symlink(path))
    }

    // ========================================================================
    // Writing
    // ========================================================================

    /// Replace file contents, creating the file when `create` is set.
    fn write(&self, path: &str, data: &[u8], create: bool) -> VfsResult<()>;

    /// Append to a file, creating it when `create` is set.
    fn append(&self, path: &str, data: &[u8], create: bool) -> VfsResult<()>;

    /// Truncate (or extend) a file to `size` bytes.
    fn truncate(&self, path: &str, size: u64) -> VfsResult<()>;

    /// Create an empty file. With `parents`, missing directories are created.
    fn create_file(&self, path: &str, parents: bool) -> VfsResult<FileAttr>;

    /// Create a directory. With `parents`, behaves like `mkdir -p`.
    fn create_directory(&self, path: &str, parents: bool) -> VfsResult<FileAttr>;

    /// Delete a file, link or directory. Non-empty directories need `recursive`.
    fn delete(&self, path: &str, recursive: bool) -> VfsResult<()>;

    /// Rename within this adapter.
    fn rename(&self, from: &str, to: &str) -> VfsResult<()>;

    /// Set attributes.
    fn setattr(&self, path: &str, attr: SetAttr) -> VfsResult<FileAttr>;

    /// Create a symbolic link at `path` pointing to `target`.
    fn symlink(&self, path: &str, target: &str) -> VfsResult<FileAttr> {
        let _ = target;
        Err(VfsError::unsupported(format!("symlinks: {path}")))
    }

    /// Open a stream on a file.
    ///
    /// Adapters without native streams hand out a read-only snapshot.
    fn open(&self, path: &str, flags: OpenFlags) -> VfsResult<Box<dyn FileStream>> {
        if flags.writes() {
            return Err(VfsError::unsupported(format!("writable stream: {path}")));
        }
        Ok(Box::new(SnapshotStream::new(path, self.read(path)?)))
    }

    // ========================================================================
    // Cross-adapter transfer
    // ========================================================================

    /// Copy `src` (local to self) to `dst_path` (local to `dst`).
    fn copy_to(
        &self,
        src: &str,
        dst: &dyn Adapter,
        dst_path: &str,
        opts: CopyOptions,
    ) -> VfsResult<()> {
        copy_tree(self, src, dst, dst_path, opts)
    }

    /// Copy `src_path` (local to `src`) to `dst` (local to self).
    fn copy_from(
        &self,
        dst: &str,
        src: &dyn Adapter,
        src_path: &str,
        opts: CopyOptions,
    ) -> VfsResult<()> {
        copy_tree(src, src_path, self, dst, opts)
    }

    /// Move `src` (local to self) to `dst_path` (local to `dst`).
    fn move_to(
        &self,
        src: &str,
        dst: &dyn Adapter,
        dst_path: &str,
        opts: CopyOptions,
    ) -> VfsResult<()> {
        self.copy_to(src, dst, dst_path, opts.recursive())?;
        self.delete(src, true)
    }

    /// Move `src_path` (local to `src`) to `dst` (local to self).
    fn move_from(
        &self,
        dst: &str,
        src: &dyn Adapter,
        src_path: &str,
        opts: CopyOptions,
    ) -> VfsResult<()> {
        self.copy_from(dst, src, src_path, opts.recursive())?;
        src.delete(src_path, true)
    }

    // ========================================================================
    // Metadata
    // ========================================================================

    /// Returns true if this filesystem is read-only.
    fn read_only(&self) -> bool;

    /// Get filesystem statistics.
    fn statfs(&self) -> VfsResult<StatFs> {
        Ok(StatFs::default())
    }

    /// Host path backing `path`, for adapters that have one.
    fn real_path(&self, path: &str) -> VfsResult<Option<PathBuf>> {
        let _ = path;
        Ok(None)
    }

    // ========================================================================
    // Convenience methods (default implementations)
    // ========================================================================

    /// Check if a path exists. Only "not found" maps to `false`.
    fn exists(&self, path: &str) -> VfsResult<bool> {
        match self.stat(path) {
            Ok(_) => Ok(true),
            Err(e) if e.is_not_found() => Ok(false),
            Err(e) => Err(e),
        }
    }

    /// True if `path` exists and is a file (or a link to one).
    fn is_file(&self, path: &str) -> VfsResult<bool> {
        match self.stat(path) {
            Ok(attr) => Ok(attr.is_file()),
            Err(e) if e.is_not_found() => Ok(false),
            Err(e) => Err(e),
        }
    }

    /// True if `path` exists and is a directory (or a link to one).
    fn is_directory(&self, path: &str) -> VfsResult<bool> {
        match self.stat(path) {
            Ok(attr) => Ok(attr.is_dir()),
            Err(e) if e.is_not_found() => Ok(false),
            Err(e) => Err(e),
        }
    }

    /// True if `path` is a symbolic link.
    fn is_link(&self, path: &str) -> VfsResult<bool> {
        match self.stat(path) {
            Ok(attr) => Ok(attr.is_symlink()),
            Err(e) if e.is_not_found() => Ok(false),
            Err(e) => Err(e),
        }
    }
}

/// Copy a file or tree between two adapters using only the contract.
pub fn copy_tree<S, D>(
    src: &S,
    src_path: &str,
    dst: &D,
    dst_path: &str,
    opts: CopyOptions,
) -> VfsResult<()>
where
    S: Adapter + ?Sized,
    D: Adapter + ?Sized,
{
    let attr = src.stat(src_path)?;

    if attr.is_dir() && attr.is_symlink() && opts.recursive {
        // Recreate the link instead of walking into it.
        let target = src.read_link(src_path)?;
        dst.symlink(dst_path, &target)?;
        return Ok(());
    }

    if attr.is_dir() {
        if !opts.recursive {
            return Err(VfsError::is_a_directory(src_path));
        }
        match dst.stat(dst_path) {
            Ok(existing) if existing.is_dir() => {}
            Ok(_) => return Err(VfsError::not_a_directory(dst_path)),
            Err(e) if e.is_not_found() => {
                dst.create_directory(dst_path, opts.parents)?;
            }
            Err(e) => return Err(e),
        }
        let child_opts = CopyOptions {
            parents: false,
            ..opts
        };
        for entry in src.list(src_path)? {
            copy_tree(
                src,
                &path::join(src_path, &entry.name),
                dst,
                &path::join(dst_path, &entry.name),
                child_opts,
            )?;
        }
        return Ok(());
    }

    match dst.stat(dst_path) {
        Ok(existing) if existing.is_dir() => return Err(VfsError::is_a_directory(dst_path)),
        Ok(_) if !opts.overwrite => return Err(VfsError::already_exists(dst_path)),
        Ok(_) => {}
        Err(e) if e.is_not_found() => {
            if opts.parents {
                dst.create_directory(&path::parent(dst_path), true)?;
            }
        }
        Err(e) => return Err(e),
    }

    let data = src.read(src_path)?;
    dst.write(dst_path, &data, true)
}

/// Read-only in-memory stream over a snapshot of a file.
pub struct SnapshotStream {
    path: String,
    cursor: Cursor<Vec<u8>>,
}

impl SnapshotStream {
    pub fn new(path: impl Into<String>, data: Vec<u8>) -> Self {
        Self {
            path: path.into(),
            cursor: Cursor::new(data),
        }
    }
}

impl Read for SnapshotStream {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.cursor.read(buf)
    }
}

impl Seek for SnapshotStream {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        self.cursor.seek(pos)
    }
}

impl Write for SnapshotStream {
    fn write(&mut self, _buf: &[u8]) -> io::Result<usize> {
        Err(VfsError::read_only(self.path.clone()).into())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}
