//! In-memory filesystem backend.
//!
//! Used for scratch space and testing. All data is ephemeral.

use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::io::{self, Cursor, Read, Seek, SeekFrom, Write};
use std::ops::Bound;
use std::sync::Arc;
use std::time::SystemTime;

use crate::vfs::error::{VfsError, VfsResult};
use crate::vfs::ops::{Adapter, FileStream};
use crate::vfs::path;
use crate::vfs::types::{DirEntry, FileAttr, FileType, OpenFlags, SetAttr};

/// Links are followed at most this many times before giving up.
const MAX_LINK_DEPTH: usize = 32;

/// Entry in the memory filesystem.
#[derive(Debug, Clone)]
enum Entry {
    File { data: Vec<u8>, attr: FileAttr },
    Directory { attr: FileAttr },
    Symlink { target: String, attr: FileAttr },
}

impl Entry {
    fn attr(&self) -> &FileAttr {
        match self {
            Entry::File { attr, .. } => attr,
            Entry::Directory { attr } => attr,
            Entry::Symlink { attr, .. } => attr,
        }
    }

    fn attr_mut(&mut self) -> &mut FileAttr {
        match self {
            Entry::File { attr, .. } => attr,
            Entry::Directory { attr } => attr,
            Entry::Symlink { attr, .. } => attr,
        }
    }

    fn is_dir(&self) -> bool {
        matches!(self, Entry::Directory { .. })
    }
}

type Store = Arc<RwLock<BTreeMap<String, Entry>>>;

/// In-memory filesystem backend.
///
/// Keys are normalized absolute paths. Links are resolved at the final path
/// component only; intermediate components must be real directories.
#[derive(Debug)]
pub struct MemoryBackend {
    entries: Store,
    read_only: bool,
}

impl Default for MemoryBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryBackend {
    /// Create a new empty in-memory filesystem.
    pub fn new() -> Self {
        let mut entries = BTreeMap::new();
        // Root directory always exists
        entries.insert(
            path::ROOT.to_string(),
            Entry::Directory {
                attr: FileAttr::directory(0o755),
            },
        );
        Self {
            entries: Arc::new(RwLock::new(entries)),
            read_only: false,
        }
    }

    /// Set whether this filesystem refuses writes.
    pub fn set_read_only(&mut self, read_only: bool) {
        self.read_only = read_only;
    }

    fn check_writable(&self, path: &str) -> VfsResult<()> {
        if self.read_only {
            Err(VfsError::read_only(path))
        } else {
            Ok(())
        }
    }

    /// Where a link at `link` pointing to `target` leads.
    fn link_target(link: &str, target: &str) -> String {
        if target.starts_with('/') {
            path::normalize(target)
        } else {
            path::join(&path::parent(link), target)
        }
    }

    /// Follow links at `path` until reaching a non-link (or a missing entry).
    fn follow(entries: &BTreeMap<String, Entry>, path: &str) -> VfsResult<String> {
        let mut current = path.to_string();
        for _ in 0..MAX_LINK_DEPTH {
            match entries.get(&current) {
                Some(Entry::Symlink { target, .. }) => {
                    current = Self::link_target(&current, target);
                }
                _ => return Ok(current),
            }
        }
        Err(VfsError::other(format!(
            "too many levels of symbolic links: {path}"
        )))
    }

    /// Type an entry presents to callers, following links.
    fn presented_kind(entries: &BTreeMap<String, Entry>, path: &str) -> FileType {
        Self::follow(entries, path)
            .ok()
            .and_then(|target| entries.get(&target).map(Entry::is_dir))
            .map(|is_dir| {
                if is_dir {
                    FileType::Directory
                } else {
                    FileType::File
                }
            })
            .unwrap_or(FileType::File)
    }

    /// The parent of `path` must be an existing directory.
    fn require_parent_dir(entries: &BTreeMap<String, Entry>, path: &str) -> VfsResult<()> {
        let parent = path::parent(path);
        let resolved = Self::follow(entries, &parent)?;
        match entries.get(&resolved) {
            Some(Entry::Directory { .. }) => Ok(()),
            Some(_) => Err(VfsError::not_a_directory(parent)),
            None => Err(VfsError::not_found(parent)),
        }
    }

    /// Ensure all parent directories exist.
    fn ensure_parents(entries: &mut BTreeMap<String, Entry>, path: &str) -> VfsResult<()> {
        let parent = path::parent(path);
        let mut chain: Vec<String> = path::ancestors(&parent).collect();
        chain.reverse();
        for dir in chain {
            let resolved = Self::follow(entries, &dir)?;
            match entries.get(&resolved) {
                Some(Entry::Directory { .. }) => {}
                Some(_) => return Err(VfsError::not_a_directory(dir)),
                None => {
                    entries.insert(
                        resolved,
                        Entry::Directory {
                            attr: FileAttr::directory(0o755),
                        },
                    );
                }
            }
        }
        Ok(())
    }

    /// Keys strictly below `dir`.
    fn descendants<'a>(
        entries: &'a BTreeMap<String, Entry>,
        dir: &str,
    ) -> impl Iterator<Item = (&'a String, &'a Entry)> + use<'a> {
        let prefix = if path::is_root(dir) {
            dir.to_string()
        } else {
            format!("{dir}/")
        };
        entries
            .range::<str, _>((Bound::Included(prefix.as_str()), Bound::Unbounded))
            .skip_while({
                let dir = dir.to_string();
                move |(k, _)| **k == dir
            })
            .take_while(move |(k, _)| k.starts_with(&prefix))
    }

    fn with_file<T>(
        &self,
        path: &str,
        create: bool,
        f: impl FnOnce(&mut Vec<u8>) -> T,
    ) -> VfsResult<T> {
        let mut entries = self.entries.write();
        let target = Self::follow(&entries, path)?;
        if !entries.contains_key(&target) {
            if !create {
                return Err(VfsError::not_found(path));
            }
            Self::require_parent_dir(&entries, &target)?;
            entries.insert(
                target.clone(),
                Entry::File {
                    data: Vec::new(),
                    attr: FileAttr::file(0, 0o644),
                },
            );
        }
        match entries.get_mut(&target) {
            Some(Entry::File { data, attr }) => {
                let out = f(&mut *data);
                attr.size = data.len() as u64;
                attr.mtime = SystemTime::now();
                Ok(out)
            }
            Some(_) => Err(VfsError::is_a_directory(path)),
            None => Err(VfsError::not_found(path)),
        }
    }
}

impl Adapter for MemoryBackend {
    fn stat(&self, path: &str) -> VfsResult<FileAttr> {
        let normalized = path::normalize(path);
        let entries = self.entries.read();

        match entries.get(&normalized) {
            Some(Entry::Symlink { attr, .. }) => {
                let mut attr = attr.clone();
                attr.kind = Self::presented_kind(&entries, &normalized);
                attr.is_link = true;
                Ok(attr)
            }
            Some(entry) => Ok(entry.attr().clone()),
            None => Err(VfsError::not_found(normalized)),
        }
    }

    fn list(&self, path: &str) -> VfsResult<Vec<DirEntry>> {
        let normalized = path::normalize(path);
        let entries = self.entries.read();

        let dir = Self::follow(&entries, &normalized)?;
        match entries.get(&dir) {
            Some(Entry::Directory { .. }) => {}
            Some(_) => return Err(VfsError::not_a_directory(normalized)),
            None => return Err(VfsError::not_found(normalized)),
        }

        let mut result = Vec::new();
        for (key, entry) in Self::descendants(&entries, &dir) {
            if path::parent(key) != dir {
                continue;
            }
            let name = path::file_name(key).to_string();
            let item = match entry {
                Entry::File { .. } => DirEntry::file(name),
                Entry::Directory { .. } => DirEntry::directory(name),
                Entry::Symlink { .. } => {
                    DirEntry::new(name, Self::presented_kind(&entries, key)).linked()
                }
            };
            result.push(item);
        }
        Ok(result)
    }

    fn read(&self, path: &str) -> VfsResult<Vec<u8>> {
        let normalized = path::normalize(path);
        let entries = self.entries.read();
        let target = Self::follow(&entries, &normalized)?;

        match entries.get(&target) {
            Some(Entry::File { data, .. }) => Ok(data.clone()),
            Some(_) => Err(VfsError::is_a_directory(normalized)),
            None => Err(VfsError::not_found(normalized)),
        }
    }

    fn read_link(&self, path: &str) -> VfsResult<String> {
        let normalized = path::normalize(path);
        let entries = self.entries.read();

        match entries.get(&normalized) {
            Some(Entry::Symlink { target, .. }) => Ok(target.clone()),
            Some(_) => Err(VfsError::not_a_symlink(normalized)),
            None => Err(VfsError::not_found(normalized)),
        }
    }

    fn write(&self, path: &str, data: &[u8], create: bool) -> VfsResult<()> {
        let normalized = path::normalize(path);
        self.check_writable(&normalized)?;
        self.with_file(&normalized, create, |contents| {
            contents.clear();
            contents.extend_from_slice(data);
        })
    }

    fn append(&self, path: &str, data: &[u8], create: bool) -> VfsResult<()> {
        let normalized = path::normalize(path);
        self.check_writable(&normalized)?;
        self.with_file(&normalized, create, |contents| {
            contents.extend_from_slice(data);
        })
    }

    fn truncate(&self, path: &str, size: u64) -> VfsResult<()> {
        let normalized = path::normalize(path);
        self.check_writable(&normalized)?;
        self.with_file(&normalized, false, |contents| {
            contents.resize(size as usize, 0);
        })
    }

    fn create_file(&self, path: &str, parents: bool) -> VfsResult<FileAttr> {
        let normalized = path::normalize(path);
        self.check_writable(&normalized)?;
        let mut entries = self.entries.write();

        if entries.contains_key(&normalized) {
            return Err(VfsError::already_exists(normalized));
        }
        if parents {
            Self::ensure_parents(&mut entries, &normalized)?;
        } else {
            Self::require_parent_dir(&entries, &normalized)?;
        }

        let attr = FileAttr::file(0, 0o644);
        entries.insert(
            normalized,
            Entry::File {
                data: Vec::new(),
                attr: attr.clone(),
            },
        );
        Ok(attr)
    }

    fn create_directory(&self, path: &str, parents: bool) -> VfsResult<FileAttr> {
        let normalized = path::normalize(path);
        self.check_writable(&normalized)?;
        let mut entries = self.entries.write();

        // Check if something already exists
        if let Some(existing) = entries.get(&normalized) {
            return match existing {
                Entry::Directory { attr } if parents => Ok(attr.clone()),
                _ => Err(VfsError::already_exists(normalized)),
            };
        }
        if parents {
            Self::ensure_parents(&mut entries, &normalized)?;
        } else {
            Self::require_parent_dir(&entries, &normalized)?;
        }

        let attr = FileAttr::directory(0o755);
        entries.insert(normalized, Entry::Directory { attr: attr.clone() });
        Ok(attr)
    }

    fn delete(&self, path: &str, recursive: bool) -> VfsResult<()> {
        let normalized = path::normalize(path);
        self.check_writable(&normalized)?;
        if path::is_root(&normalized) {
            return Err(VfsError::permission_denied("cannot remove root"));
        }

        let mut entries = self.entries.write();
        match entries.get(&normalized) {
            Some(Entry::Directory { .. }) => {
                let children: Vec<String> = Self::descendants(&entries, &normalized)
                    .map(|(k, _)| k.clone())
                    .collect();
                if !children.is_empty() && !recursive {
                    return Err(VfsError::directory_not_empty(normalized));
                }
                for child in children {
                    entries.remove(&child);
                }
                entries.remove(&normalized);
                Ok(())
            }
            Some(_) => {
                entries.remove(&normalized);
                Ok(())
            }
            None => Err(VfsError::not_found(normalized)),
        }
    }

    fn rename(&self, from: &str, to: &str) -> VfsResult<()> {
        let from_normalized = path::normalize(from);
        let to_normalized = path::normalize(to);
        self.check_writable(&from_normalized)?;
        if from_normalized == to_normalized {
            return Ok(());
        }
        if path::is_root(&from_normalized) || path::is_within(&to_normalized, &from_normalized) {
            return Err(VfsError::invalid_path(format!(
                "cannot move {from_normalized} to {to_normalized}"
            )));
        }

        let mut entries = self.entries.write();
        if !entries.contains_key(&from_normalized) {
            return Err(VfsError::not_found(from_normalized));
        }
        Self::require_parent_dir(&entries, &to_normalized)?;

        // Replace whatever is at the destination, unless it's a populated directory
        if entries.contains_key(&to_normalized) {
            if Self::descendants(&entries, &to_normalized).next().is_some() {
                return Err(VfsError::directory_not_empty(to_normalized));
            }
            entries.remove(&to_normalized);
        }

        let moved: Vec<String> = std::iter::once(from_normalized.clone())
            .chain(Self::descendants(&entries, &from_normalized).map(|(k, _)| k.clone()))
            .collect();
        for old in moved {
            if let Some(entry) = entries.remove(&old) {
                let suffix = &old[from_normalized.len()..];
                entries.insert(format!("{to_normalized}{suffix}"), entry);
            }
        }
        Ok(())
    }

    fn setattr(&self, path: &str, set: SetAttr) -> VfsResult<FileAttr> {
        let normalized = path::normalize(path);
        self.check_writable(&normalized)?;
        let mut entries = self.entries.write();
        let target = Self::follow(&entries, &normalized)?;

        let entry = entries
            .get_mut(&target)
            .ok_or_else(|| VfsError::not_found(normalized.clone()))?;

        // Handle size change (requires access to data for files)
        if let Some(size) = set.size {
            match entry {
                Entry::File { data, attr } => {
                    data.resize(size as usize, 0);
                    attr.size = size;
                }
                _ => return Err(VfsError::is_a_directory(normalized)),
            }
        }

        // Handle other attribute changes
        let attr = entry.attr_mut();
        if let Some(mtime) = set.mtime {
            attr.mtime = mtime;
        }
        if let Some(atime) = set.atime {
            attr.atime = Some(atime);
        }
        if let Some(perm) = set.perm {
            attr.perm = perm;
        }
        if let Some(uid) = set.uid {
            attr.uid = Some(uid);
        }
        if let Some(gid) = set.gid {
            attr.gid = Some(gid);
        }

        Ok(entry.attr().clone())
    }

    fn symlink(&self, path: &str, target: &str) -> VfsResult<FileAttr> {
        let normalized = path::normalize(path);
        self.check_writable(&normalized)?;
        let mut entries = self.entries.write();

        if entries.contains_key(&normalized) {
            return Err(VfsError::already_exists(normalized));
        }
        Self::require_parent_dir(&entries, &normalized)?;

        let attr = FileAttr::symlink(target.len() as u64, FileType::File);
        entries.insert(
            normalized.clone(),
            Entry::Symlink {
                target: target.to_string(),
                attr,
            },
        );
        drop(entries);
        self.stat(&normalized)
    }

    fn open(&self, path: &str, flags: OpenFlags) -> VfsResult<Box<dyn FileStream>> {
        let normalized = path::normalize(path);
        if flags.writes() {
            self.check_writable(&normalized)?;
        }
        let mut entries = self.entries.write();
        let target = Self::follow(&entries, &normalized)?;

        let exists = entries.contains_key(&target);
        if exists && flags.create && flags.exclusive {
            return Err(VfsError::already_exists(normalized));
        }
        if !exists {
            if !flags.create {
                return Err(VfsError::not_found(normalized));
            }
            Self::require_parent_dir(&entries, &target)?;
            entries.insert(
                target.clone(),
                Entry::File {
                    data: Vec::new(),
                    attr: FileAttr::file(0, 0o644),
                },
            );
        }

        let data = match entries.get(&target) {
            Some(Entry::File { data, .. }) if !flags.truncate => data.clone(),
            Some(Entry::File { .. }) => Vec::new(),
            Some(_) => return Err(VfsError::is_a_directory(normalized)),
            None => return Err(VfsError::not_found(normalized)),
        };
        drop(entries);

        let mut cursor = Cursor::new(data);
        if flags.append {
            cursor.seek(SeekFrom::End(0))?;
        }
        Ok(Box::new(MemoryStream {
            store: Arc::clone(&self.entries),
            path: target,
            cursor,
            writable: flags.writes(),
            append: flags.append,
            dirty: flags.truncate,
        }))
    }

    fn read_only(&self) -> bool {
        self.read_only
    }
}

/// Stream over a memory file. Writes land in a private buffer and are
/// published to the store on `flush` (and on drop).
struct MemoryStream {
    store: Store,
    path: String,
    cursor: Cursor<Vec<u8>>,
    writable: bool,
    append: bool,
    dirty: bool,
}

impl MemoryStream {
    fn commit(&mut self) -> io::Result<()> {
        if !self.dirty {
            return Ok(());
        }
        let mut entries = self.store.write();
        match entries.get_mut(&self.path) {
            Some(Entry::File { data, attr }) => {
                data.clone_from(self.cursor.get_ref());
                attr.size = data.len() as u64;
                attr.mtime = SystemTime::now();
                self.dirty = false;
                Ok(())
            }
            Some(_) => Err(VfsError::is_a_directory(self.path.clone()).into()),
            None => Err(VfsError::not_found(self.path.clone()).into()),
        }
    }
}

impl Read for MemoryStream {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.cursor.read(buf)
    }
}

impl Seek for MemoryStream {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        self.cursor.seek(pos)
    }
}

impl Write for MemoryStream {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if !self.writable {
            return Err(VfsError::read_only(self.path.clone()).into());
        }
        if self.append {
            self.cursor.seek(SeekFrom::End(0))?;
        }
        let written = self.cursor.write(buf)?;
        self.dirty = true;
        Ok(written)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.commit()
    }
}

impl Drop for MemoryStream {
    fn drop(&mut self) {
        if let Err(e) = self.commit() {
            tracing::warn!(path = %self.path, error = %e, "dropping unflushed memory stream");
        }
    }
}
