//! Stat and listing cache in front of a slow adapter.
//!
//! Invalidation rules:
//!
//! - a mutation of `p` evicts `stat(p)` and the listing of `parent(p)`;
//! - creating with `parents` also evicts every ancestor of `p`;
//! - `delete`, `rename` and moves evict everything cached at or below `p`.
//!
//! Writable streams evict their path when opened and again when flushed or
//! dropped. The cache owns the paths it fronts, so resolution stops here
//! and transfers keep going through it.

use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::PathBuf;
use std::sync::Arc;

use dashmap::DashMap;

use super::error::VfsResult;
use super::ops::{Adapter, FileStream};
use super::path;
use super::types::{CopyOptions, DirEntry, FileAttr, OpenFlags, SetAttr, StatFs};

#[derive(Default)]
struct CacheState {
    stats: DashMap<String, FileAttr>,
    listings: DashMap<String, Vec<DirEntry>>,
}

impl CacheState {
    /// Evict `stat(p)` and the listing of `parent(p)`.
    fn touch(&self, path: &str) {
        self.stats.remove(path);
        self.listings.remove(path);
        self.listings.remove(&path::parent(path));
    }

    /// Evict `p` and every ancestor.
    fn touch_ancestors(&self, path: &str) {
        for ancestor in path::ancestors(path) {
            self.stats.remove(&ancestor);
            self.listings.remove(&ancestor);
        }
    }

    /// Evict everything at or below `p`, plus the listing of `parent(p)`.
    fn touch_subtree(&self, path: &str) {
        self.stats.retain(|cached, _| !path::is_within(cached, path));
        self.listings.retain(|cached, _| !path::is_within(cached, path));
        self.listings.remove(&path::parent(path));
        tracing::debug!(path = %path, "evicted cached subtree");
    }
}

/// Caching decorator.
pub struct CachedAdapter<A> {
    inner: A,
    state: Arc<CacheState>,
}

impl<A: Adapter> CachedAdapter<A> {
    pub fn new(inner: A) -> Self {
        Self {
            inner,
            state: Arc::new(CacheState::default()),
        }
    }

    pub fn inner(&self) -> &A {
        &self.inner
    }

    /// Forget everything cached at or below `path`.
    pub fn invalidate(&self, path: &str) {
        self.state.touch_subtree(&path::normalize(path));
    }

    /// Forget everything.
    pub fn clear(&self) {
        self.state.stats.clear();
        self.state.listings.clear();
    }

    /// Number of cached stats and listings.
    pub fn cached(&self) -> (usize, usize) {
        (self.state.stats.len(), self.state.listings.len())
    }

    fn after<T>(&self, path: &str, result: VfsResult<T>) -> VfsResult<T> {
        // Failed mutations may still have changed something
        self.state.touch(path);
        result
    }
}

impl<A: Adapter> Adapter for CachedAdapter<A> {
    fn stat(&self, path: &str) -> VfsResult<FileAttr> {
        let normalized = path::normalize(path);
        if let Some(hit) = self.state.stats.get(&normalized) {
            return Ok(hit.clone());
        }
        let attr = self.inner.stat(&normalized)?;
        self.state.stats.insert(normalized, attr.clone());
        Ok(attr)
    }

    fn list(&self, path: &str) -> VfsResult<Vec<DirEntry>> {
        let normalized = path::normalize(path);
        if let Some(hit) = self.state.listings.get(&normalized) {
            return Ok(hit.clone());
        }
        let entries = self.inner.list(&normalized)?;
        self.state.listings.insert(normalized, entries.clone());
        Ok(entries)
    }

    fn read(&self, path: &str) -> VfsResult<Vec<u8>> {
        self.inner.read(path)
    }

    fn read_link(&self, path: &str) -> VfsResult<String> {
        self.inner.read_link(path)
    }

    fn write(&self, path: &str, data: &[u8], create: bool) -> VfsResult<()> {
        let normalized = path::normalize(path);
        let result = self.inner.write(&normalized, data, create);
        self.after(&normalized, result)
    }

    fn append(&self, path: &str, data: &[u8], create: bool) -> VfsResult<()> {
        let normalized = path::normalize(path);
        let result = self.inner.append(&normalized, data, create);
        self.after(&normalized, result)
    }

    fn truncate(&self, path: &str, size: u64) -> VfsResult<()> {
        let normalized = path::normalize(path);
        let result = self.inner.truncate(&normalized, size);
        self.after(&normalized, result)
    }

    fn create_file(&self, path: &str, parents: bool) -> VfsResult<FileAttr> {
        let normalized = path::normalize(path);
        let result = self.inner.create_file(&normalized, parents);
        if parents {
            self.state.touch_ancestors(&normalized);
        }
        self.after(&normalized, result)
    }

    fn create_directory(&self, path: &str, parents: bool) -> VfsResult<FileAttr> {
        let normalized = path::normalize(path);
        let result = self.inner.create_directory(&normalized, parents);
        if parents {
            self.state.touch_ancestors(&normalized);
        }
        self.after(&normalized, result)
    }

    fn delete(&self, path: &str, recursive: bool) -> VfsResult<()> {
        let normalized = path::normalize(path);
        let result = self.inner.delete(&normalized, recursive);
        self.state.touch_subtree(&normalized);
        result
    }

    fn rename(&self, from: &str, to: &str) -> VfsResult<()> {
        let from = path::normalize(from);
        let to = path::normalize(to);
        let result = self.inner.rename(&from, &to);
        self.state.touch_subtree(&from);
        self.state.touch_subtree(&to);
        result
    }

    fn setattr(&self, path: &str, attr: SetAttr) -> VfsResult<FileAttr> {
        let normalized = path::normalize(path);
        let result = self.inner.setattr(&normalized, attr);
        self.after(&normalized, result)
    }

    fn symlink(&self, path: &str, target: &str) -> VfsResult<FileAttr> {
        let normalized = path::normalize(path);
        let result = self.inner.symlink(&normalized, target);
        self.after(&normalized, result)
    }

    fn open(&self, path: &str, flags: OpenFlags) -> VfsResult<Box<dyn FileStream>> {
        let normalized = path::normalize(path);
        if !flags.writes() {
            return self.inner.open(&normalized, flags);
        }
        let stream = self.after(&normalized, self.inner.open(&normalized, flags))?;
        Ok(Box::new(EvictingStream {
            inner: stream,
            state: Arc::clone(&self.state),
            path: normalized,
        }))
    }

    fn move_to(
        &self,
        src: &str,
        dst: &dyn Adapter,
        dst_path: &str,
        opts: CopyOptions,
    ) -> VfsResult<()> {
        let normalized = path::normalize(src);
        let result = self.inner.move_to(&normalized, dst, dst_path, opts);
        self.state.touch_subtree(&normalized);
        result
    }

    fn move_from(
        &self,
        dst: &str,
        src: &dyn Adapter,
        src_path: &str,
        opts: CopyOptions,
    ) -> VfsResult<()> {
        let normalized = path::normalize(dst);
        let result = self.inner.move_from(&normalized, src, src_path, opts);
        self.state.touch_subtree(&normalized);
        result
    }

    fn copy_from(
        &self,
        dst: &str,
        src: &dyn Adapter,
        src_path: &str,
        opts: CopyOptions,
    ) -> VfsResult<()> {
        let normalized = path::normalize(dst);
        let result = self.inner.copy_from(&normalized, src, src_path, opts);
        self.state.touch_subtree(&normalized);
        result
    }

    fn read_only(&self) -> bool {
        self.inner.read_only()
    }

    fn statfs(&self) -> VfsResult<StatFs> {
        self.inner.statfs()
    }

    fn real_path(&self, path: &str) -> VfsResult<Option<PathBuf>> {
        self.inner.real_path(path)
    }

    fn has_mounts_below(&self, path: &str) -> VfsResult<bool> {
        self.inner.has_mounts_below(path)
    }
}

/// Writable stream that keeps the cache honest.
struct EvictingStream {
    inner: Box<dyn FileStream>,
    state: Arc<CacheState>,
    path: String,
}

impl Read for EvictingStream {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.inner.read(buf)
    }
}

impl Seek for EvictingStream {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        self.inner.seek(pos)
    }
}

impl Write for EvictingStream {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.inner.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        let result = self.inner.flush();
        self.state.touch(&self.path);
        result
    }
}

impl Drop for EvictingStream {
    fn drop(&mut self) {
        if let Err(e) = self.inner.flush() {
            tracing::warn!(path = %self.path, error = %e, "flush on drop failed");
        }
        self.state.touch(&self.path);
    }
}
