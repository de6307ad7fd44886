//! Local filesystem backend.
//!
//! Provides access to real filesystem paths, with path security
//! to prevent escaping the root directory.

use std::fs;
use std::io;
use std::os::unix::fs::{MetadataExt, PermissionsExt};
use std::path::{Path, PathBuf};

use crate::vfs::error::{VfsError, VfsResult};
use crate::vfs::ops::{Adapter, FileStream};
use crate::vfs::path;
use crate::vfs::types::{DirEntry, FileAttr, FileType, OpenFlags, SetAttr, StatFs};

/// Local filesystem backend.
///
/// All operations are relative to `root`. For example, if `root` is
/// `/home/amy/project`, then `read("/src/main.rs")` reads
/// `/home/amy/project/src/main.rs`.
///
/// Path security is enforced: links that lead outside the root are refused.
#[derive(Debug, Clone)]
pub struct LocalBackend {
    root: PathBuf,
    read_only: bool,
}

impl LocalBackend {
    /// Create a new local filesystem rooted at the given path.
    ///
    /// The root is canonicalized at construction time to handle symlinks
    /// (e.g. macOS `/tmp` → `/private/tmp`).
    pub fn new(root: impl Into<PathBuf>) -> Self {
        let root: PathBuf = root.into();
        let root = dunce::canonicalize(&root).unwrap_or(root);
        Self {
            root,
            read_only: false,
        }
    }

    /// Create a read-only local filesystem.
    pub fn read_only(root: impl Into<PathBuf>) -> Self {
        let mut backend = Self::new(root);
        backend.read_only = true;
        backend
    }

    /// Set whether this filesystem is read-only.
    pub fn set_read_only(&mut self, read_only: bool) {
        self.read_only = read_only;
    }

    /// Get the root path.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Host path for a local path, without following links.
    fn host_path(&self, path: &str) -> PathBuf {
        let normalized = path::normalize(path);
        let relative = normalized.trim_start_matches('/');
        if relative.is_empty() {
            self.root.clone()
        } else {
            self.root.join(relative)
        }
    }

    /// Resolve a local path to a host path within the root.
    ///
    /// Returns an error if a link along the way leads outside the root.
    fn resolve(&self, path: &str) -> VfsResult<PathBuf> {
        let full = self.host_path(path);

        // For new files, canonicalize parent and append filename
        let canonical = if full.exists() {
            dunce::canonicalize(&full).map_err(|e| io_error(path, e))?
        } else {
            match (full.parent(), full.file_name()) {
                (Some(parent), Some(name)) if parent.exists() => dunce::canonicalize(parent)
                    .map_err(|e| io_error(path, e))?
                    .join(name),
                // Parent doesn't exist, will fail on actual operation
                _ => full,
            }
        };

        if !canonical.starts_with(&self.root) {
            return Err(VfsError::path_escapes_root(format!(
                "{} is not under {}",
                canonical.display(),
                self.root.display()
            )));
        }

        Ok(canonical)
    }

    /// Resolve a local path without following a link in its final segment.
    ///
    /// Links along the parent chain are followed and must stay inside the root.
    fn resolve_entry(&self, path: &str) -> VfsResult<PathBuf> {
        let normalized = path::normalize(path);
        if path::is_root(&normalized) {
            return Ok(self.root.clone());
        }
        let parent = self.resolve(&path::parent(&normalized))?;
        Ok(parent.join(path::file_name(&normalized)))
    }

    /// Metadata of a link's target, when the target stays inside the root.
    fn contained_target(&self, full_path: &Path) -> Option<fs::Metadata> {
        let canonical = dunce::canonicalize(full_path).ok()?;
        if canonical.starts_with(&self.root) {
            fs::metadata(&canonical).ok()
        } else {
            None
        }
    }

    /// Check if write operations are allowed.
    fn check_writable(&self, path: &str) -> VfsResult<()> {
        if self.read_only {
            Err(VfsError::read_only(path))
        } else {
            Ok(())
        }
    }

    /// Convert std::fs::Metadata to FileAttr.
    ///
    /// `link_meta` is the metadata of the path itself, `target_meta` of
    /// whatever it points to (absent for dangling links).
    fn metadata_to_attr(link_meta: &fs::Metadata, target_meta: Option<&fs::Metadata>) -> FileAttr {
        let meta = target_meta.unwrap_or(link_meta);
        let kind = if meta.is_dir() {
            FileType::Directory
        } else {
            FileType::File
        };

        FileAttr {
            size: meta.len(),
            kind,
            is_link: link_meta.file_type().is_symlink(),
            perm: meta.permissions().mode() & 0o7777,
            mtime: meta.modified().unwrap_or(std::time::SystemTime::UNIX_EPOCH),
            atime: meta.accessed().ok(),
            ctime: meta.created().ok(),
            nlink: meta.nlink() as u32,
            uid: Some(meta.uid()),
            gid: Some(meta.gid()),
        }
    }
}

/// Map a host I/O error onto the shared vocabulary, naming the local path.
fn io_error(path: &str, e: io::Error) -> VfsError {
    match e.kind() {
        io::ErrorKind::NotFound => VfsError::not_found(path),
        io::ErrorKind::AlreadyExists => VfsError::already_exists(path),
        io::ErrorKind::PermissionDenied => VfsError::permission_denied(path),
        io::ErrorKind::NotADirectory => VfsError::not_a_directory(path),
        io::ErrorKind::IsADirectory => VfsError::is_a_directory(path),
        io::ErrorKind::DirectoryNotEmpty => VfsError::directory_not_empty(path),
        _ => VfsError::Io(e),
    }
}

impl Adapter for LocalBackend {
    fn stat(&self, path: &str) -> VfsResult<FileAttr> {
        let full_path = self.resolve_entry(path)?;
        let link_meta = fs::symlink_metadata(&full_path).map_err(|e| io_error(path, e))?;
        if link_meta.file_type().is_symlink() {
            let target_meta = self.contained_target(&full_path);
            return Ok(Self::metadata_to_attr(&link_meta, target_meta.as_ref()));
        }
        Ok(Self::metadata_to_attr(&link_meta, None))
    }

    fn list(&self, path: &str) -> VfsResult<Vec<DirEntry>> {
        let full_path = self.resolve(path)?;
        let mut entries = Vec::new();

        for entry in fs::read_dir(&full_path).map_err(|e| io_error(path, e))? {
            let entry = entry.map_err(VfsError::from)?;
            let file_type = entry.file_type().map_err(VfsError::from)?;
            let name = entry.file_name().to_string_lossy().into_owned();

            let item = if file_type.is_symlink() {
                let target_is_dir = fs::metadata(entry.path())
                    .map(|m| m.is_dir())
                    .unwrap_or(false);
                let kind = if target_is_dir {
                    FileType::Directory
                } else {
                    FileType::File
                };
                DirEntry::new(name, kind).linked()
            } else if file_type.is_dir() {
                DirEntry::directory(name)
            } else {
                DirEntry::file(name)
            };
            entries.push(item);
        }

        entries.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(entries)
    }

    fn read(&self, path: &str) -> VfsResult<Vec<u8>> {
        let full_path = self.resolve(path)?;
        if full_path.is_dir() {
            return Err(VfsError::is_a_directory(path));
        }
        fs::read(&full_path).map_err(|e| io_error(path, e))
    }

    fn read_link(&self, path: &str) -> VfsResult<String> {
        let full_path = self.resolve_entry(path)?;
        let meta = fs::symlink_metadata(&full_path).map_err(|e| io_error(path, e))?;
        if !meta.file_type().is_symlink() {
            return Err(VfsError::not_a_symlink(path));
        }
        let target = fs::read_link(&full_path).map_err(|e| io_error(path, e))?;
        Ok(target.to_string_lossy().into_owned())
    }

    fn write(&self, path: &str, data: &[u8], create: bool) -> VfsResult<()> {
        use std::io::Write;

        self.check_writable(path)?;
        let full_path = self.resolve(path)?;

        let mut file = fs::OpenOptions::new()
            .write(true)
            .truncate(true)
            .create(create)
            .open(&full_path)
            .map_err(|e| io_error(path, e))?;
        file.write_all(data).map_err(VfsError::from)
    }

    fn append(&self, path: &str, data: &[u8], create: bool) -> VfsResult<()> {
        use std::io::Write;

        self.check_writable(path)?;
        let full_path = self.resolve(path)?;

        let mut file = fs::OpenOptions::new()
            .append(true)
            .create(create)
            .open(&full_path)
            .map_err(|e| io_error(path, e))?;
        file.write_all(data).map_err(VfsError::from)
    }

    fn truncate(&self, path: &str, size: u64) -> VfsResult<()> {
        self.check_writable(path)?;
        let full_path = self.resolve(path)?;

        let file = fs::OpenOptions::new()
            .write(true)
            .open(&full_path)
            .map_err(|e| io_error(path, e))?;

        file.set_len(size).map_err(VfsError::from)
    }

    fn create_file(&self, path: &str, parents: bool) -> VfsResult<FileAttr> {
        self.check_writable(path)?;
        let full_path = self.resolve(path)?;

        if parents {
            if let Some(parent) = full_path.parent() {
                fs::create_dir_all(parent).map_err(|e| io_error(path, e))?;
            }
        }

        let file = fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&full_path)
            .map_err(|e| io_error(path, e))?;

        let meta = file.metadata().map_err(VfsError::from)?;
        Ok(Self::metadata_to_attr(&meta, None))
    }

    fn create_directory(&self, path: &str, parents: bool) -> VfsResult<FileAttr> {
        use std::os::unix::fs::DirBuilderExt;

        self.check_writable(path)?;
        let full_path = self.resolve(path)?;

        fs::DirBuilder::new()
            .mode(0o755)
            .recursive(parents)
            .create(&full_path)
            .map_err(|e| io_error(path, e))?;

        let meta = fs::metadata(&full_path).map_err(|e| io_error(path, e))?;
        Ok(Self::metadata_to_attr(&meta, None))
    }

    fn delete(&self, path: &str, recursive: bool) -> VfsResult<()> {
        self.check_writable(path)?;
        if path::is_root(&path::normalize(path)) {
            return Err(VfsError::permission_denied("cannot remove root"));
        }

        let full_path = self.resolve_entry(path)?;
        let meta = fs::symlink_metadata(&full_path).map_err(|e| io_error(path, e))?;

        let result = if meta.is_dir() {
            if recursive {
                fs::remove_dir_all(&full_path)
            } else {
                fs::remove_dir(&full_path)
            }
        } else {
            fs::remove_file(&full_path)
        };
        result.map_err(|e| io_error(path, e))
    }

    fn rename(&self, from: &str, to: &str) -> VfsResult<()> {
        self.check_writable(from)?;
        let from_path = self.resolve_entry(from)?;
        let to_path = self.resolve(to)?;

        fs::rename(&from_path, &to_path).map_err(|e| io_error(from, e))
    }

    fn setattr(&self, path: &str, attr: SetAttr) -> VfsResult<FileAttr> {
        self.check_writable(path)?;
        let full_path = self.resolve(path)?;

        // Handle size
        if let Some(size) = attr.size {
            let file = fs::OpenOptions::new()
                .write(true)
                .open(&full_path)
                .map_err(|e| io_error(path, e))?;
            file.set_len(size).map_err(VfsError::from)?;
        }

        // Handle permissions
        if let Some(perm) = attr.perm {
            fs::set_permissions(&full_path, fs::Permissions::from_mode(perm))
                .map_err(|e| io_error(path, e))?;
        }

        // Handle times
        if attr.mtime.is_some() || attr.atime.is_some() {
            let mut times = fs::FileTimes::new();
            if let Some(mtime) = attr.mtime {
                times = times.set_modified(mtime);
            }
            if let Some(atime) = attr.atime {
                times = times.set_accessed(atime);
            }
            let file = fs::File::open(&full_path).map_err(|e| io_error(path, e))?;
            file.set_times(times).map_err(VfsError::from)?;
        }

        // Handle ownership
        if attr.uid.is_some() || attr.gid.is_some() {
            std::os::unix::fs::chown(&full_path, attr.uid, attr.gid)
                .map_err(|e| io_error(path, e))?;
        }

        self.stat(path)
    }

    fn symlink(&self, path: &str, target: &str) -> VfsResult<FileAttr> {
        self.check_writable(path)?;
        let full_path = self.resolve(path)?;

        std::os::unix::fs::symlink(target, &full_path).map_err(|e| io_error(path, e))?;

        self.stat(path)
    }

    fn open(&self, path: &str, flags: OpenFlags) -> VfsResult<Box<dyn FileStream>> {
        if flags.writes() {
            self.check_writable(path)?;
        }
        let full_path = self.resolve(path)?;

        let file = fs::OpenOptions::new()
            .read(flags.read)
            .write(flags.write && !flags.append)
            .append(flags.append)
            .create(flags.create && !flags.exclusive)
            .create_new(flags.create && flags.exclusive)
            .truncate(flags.truncate)
            .open(&full_path)
            .map_err(|e| io_error(path, e))?;

        Ok(Box::new(file))
    }

    fn read_only(&self) -> bool {
        self.read_only
    }

    fn statfs(&self) -> VfsResult<StatFs> {
        #[cfg(unix)]
        {
            use rustix::fs::statvfs;

            let stat = statvfs(&self.root).map_err(|e| VfsError::Io(e.into()))?;

            Ok(StatFs {
                blocks: stat.f_blocks,
                bfree: stat.f_bfree,
                bavail: stat.f_bavail,
                files: stat.f_files,
                ffree: stat.f_ffree,
                bsize: stat.f_bsize as u32,
                namelen: stat.f_namemax as u32,
                frsize: stat.f_frsize as u32,
            })
        }

        #[cfg(not(unix))]
        {
            Ok(StatFs::default())
        }
    }

    fn real_path(&self, path: &str) -> VfsResult<Option<PathBuf>> {
        let full = self.host_path(path);

        // Use dunce for clean canonical paths (no \\?\ on Windows)
        let canonical = dunce::canonicalize(&full).map_err(|e| io_error(path, e))?;

        // Security check: ensure path is under root
        if !canonical.starts_with(&self.root) {
            return Err(VfsError::path_escapes_root(path));
        }

        Ok(Some(canonical))
    }
}
