//! Core VFS types.
//!
//! Attributes and entries are plain data so that adapters on either side of
//! a mount boundary can exchange them without knowing each other.

use serde::{Deserialize, Serialize};
use std::ops::BitOr;
use std::time::SystemTime;

/// File type enumeration.
///
/// Links are not a separate type: a link reports the type of its target and
/// sets `is_link` on the attribute or entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FileType {
    /// Regular file.
    File,
    /// Directory.
    Directory,
}

impl FileType {
    /// Returns true if this is a regular file.
    pub fn is_file(&self) -> bool {
        matches!(self, FileType::File)
    }

    /// Returns true if this is a directory.
    pub fn is_dir(&self) -> bool {
        matches!(self, FileType::Directory)
    }
}

/// Type bitmask (`FILE`, `DIRECTORY`, `LINK`), OR-combinable.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TypeMask(pub u32);

impl TypeMask {
    pub const FILE: TypeMask = TypeMask(0x1);
    pub const DIRECTORY: TypeMask = TypeMask(0x2);
    pub const LINK: TypeMask = TypeMask(0x4);

    /// Raw bits.
    pub fn bits(self) -> u32 {
        self.0
    }

    /// True if every bit of `other` is set.
    pub fn contains(self, other: TypeMask) -> bool {
        self.0 & other.0 == other.0
    }

    /// True if any bit of `other` is set.
    pub fn intersects(self, other: TypeMask) -> bool {
        self.0 & other.0 != 0
    }
}

impl BitOr for TypeMask {
    type Output = TypeMask;

    fn bitor(self, rhs: TypeMask) -> TypeMask {
        TypeMask(self.0 | rhs.0)
    }
}

/// File attributes (metadata).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileAttr {
    /// Size in bytes.
    pub size: u64,
    /// File type (of the link target, for links).
    pub kind: FileType,
    /// Whether the path itself is a symbolic link.
    pub is_link: bool,
    /// Unix permissions (e.g., 0o644).
    pub perm: u32,
    /// Last modification time.
    pub mtime: SystemTime,
    /// Last access time (optional).
    pub atime: Option<SystemTime>,
    /// Creation time (optional).
    pub ctime: Option<SystemTime>,
    /// Number of hard links.
    pub nlink: u32,
    /// User ID (optional, for local fs).
    pub uid: Option<u32>,
    /// Group ID (optional, for local fs).
    pub gid: Option<u32>,
}

impl FileAttr {
    /// Create attributes for a new file.
    pub fn file(size: u64, perm: u32) -> Self {
        let now = SystemTime::now();
        Self {
            size,
            kind: FileType::File,
            is_link: false,
            perm,
            mtime: now,
            atime: Some(now),
            ctime: Some(now),
            nlink: 1,
            uid: None,
            gid: None,
        }
    }

    /// Create attributes for a new directory.
    pub fn directory(perm: u32) -> Self {
        let now = SystemTime::now();
        Self {
            size: 0,
            kind: FileType::Directory,
            is_link: false,
            perm,
            mtime: now,
            atime: Some(now),
            ctime: Some(now),
            nlink: 2, // . and ..
            uid: None,
            gid: None,
        }
    }

    /// Attributes of a synthesized directory that exists only because of
    /// mounts beneath it: empty, read-only, ownerless, epoch times.
    pub fn virtual_directory() -> Self {
        Self {
            size: 0,
            kind: FileType::Directory,
            is_link: false,
            perm: 0o555,
            mtime: SystemTime::UNIX_EPOCH,
            atime: None,
            ctime: None,
            nlink: 2,
            uid: None,
            gid: None,
        }
    }

    /// Create attributes for a symlink pointing at something of `target_kind`.
    pub fn symlink(target_len: u64, target_kind: FileType) -> Self {
        let now = SystemTime::now();
        Self {
            size: target_len,
            kind: target_kind,
            is_link: true,
            perm: 0o777,
            mtime: now,
            atime: Some(now),
            ctime: Some(now),
            nlink: 1,
            uid: None,
            gid: None,
        }
    }

    /// Returns true if this is a regular file.
    pub fn is_file(&self) -> bool {
        self.kind.is_file()
    }

    /// Returns true if this is a directory.
    pub fn is_dir(&self) -> bool {
        self.kind.is_dir()
    }

    /// Returns true if this is a symbolic link.
    pub fn is_symlink(&self) -> bool {
        self.is_link
    }

    /// The type bitmask for this entry.
    pub fn type_bits(&self) -> TypeMask {
        let base = match self.kind {
            FileType::File => TypeMask::FILE,
            FileType::Directory => TypeMask::DIRECTORY,
        };
        if self.is_link { base | TypeMask::LINK } else { base }
    }
}

/// Directory entry as returned by an adapter's raw listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DirEntry {
    /// Entry name (not full path).
    pub name: String,
    /// Entry type.
    pub kind: FileType,
    /// Whether the entry is a symbolic link.
    #[serde(default)]
    pub is_link: bool,
}

impl DirEntry {
    /// Create a new directory entry.
    pub fn new(name: impl Into<String>, kind: FileType) -> Self {
        Self {
            name: name.into(),
            kind,
            is_link: false,
        }
    }

    /// Create a file entry.
    pub fn file(name: impl Into<String>) -> Self {
        Self::new(name, FileType::File)
    }

    /// Create a directory entry.
    pub fn directory(name: impl Into<String>) -> Self {
        Self::new(name, FileType::Directory)
    }

    /// Mark the entry as a symbolic link.
    pub fn linked(mut self) -> Self {
        self.is_link = true;
        self
    }

    /// Hidden entries are the ones whose name starts with a dot.
    pub fn is_hidden(&self) -> bool {
        self.name.starts_with('.')
    }
}

/// Attributes to set (for setattr operation).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SetAttr {
    /// New size (truncate/extend).
    pub size: Option<u64>,
    /// New modification time.
    pub mtime: Option<SystemTime>,
    /// New access time.
    pub atime: Option<SystemTime>,
    /// New permissions.
    pub perm: Option<u32>,
    /// New user ID.
    pub uid: Option<u32>,
    /// New group ID.
    pub gid: Option<u32>,
}

impl SetAttr {
    /// Create a new empty SetAttr.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the size.
    pub fn with_size(mut self, size: u64) -> Self {
        self.size = Some(size);
        self
    }

    /// Set the modification time.
    pub fn with_mtime(mut self, mtime: SystemTime) -> Self {
        self.mtime = Some(mtime);
        self
    }

    /// Set the access time.
    pub fn with_atime(mut self, atime: SystemTime) -> Self {
        self.atime = Some(atime);
        self
    }

    /// Set permissions.
    pub fn with_perm(mut self, perm: u32) -> Self {
        self.perm = Some(perm);
        self
    }

    /// Set the owning user.
    pub fn with_uid(mut self, uid: u32) -> Self {
        self.uid = Some(uid);
        self
    }

    /// Set the owning group.
    pub fn with_gid(mut self, gid: u32) -> Self {
        self.gid = Some(gid);
        self
    }

    /// True if nothing would change.
    pub fn is_empty(&self) -> bool {
        self.size.is_none()
            && self.mtime.is_none()
            && self.atime.is_none()
            && self.perm.is_none()
            && self.uid.is_none()
            && self.gid.is_none()
    }
}

/// Filesystem statistics.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatFs {
    /// Total blocks.
    pub blocks: u64,
    /// Free blocks.
    pub bfree: u64,
    /// Available blocks (to non-root).
    pub bavail: u64,
    /// Total inodes.
    pub files: u64,
    /// Free inodes.
    pub ffree: u64,
    /// Block size.
    pub bsize: u32,
    /// Maximum name length.
    pub namelen: u32,
    /// Fragment size.
    pub frsize: u32,
}

impl Default for StatFs {
    fn default() -> Self {
        Self {
            blocks: 1024 * 1024,      // 1M blocks
            bfree: 512 * 1024,        // 512K free
            bavail: 512 * 1024,       // same for non-root
            files: 1024 * 1024,       // 1M inodes
            ffree: 512 * 1024,        // 512K free
            bsize: 4096,              // 4KB blocks
            namelen: 255,             // standard
            frsize: 4096,             // same as bsize
        }
    }
}

/// Open file flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OpenFlags {
    /// Read access requested.
    pub read: bool,
    /// Write access requested.
    pub write: bool,
    /// Append mode.
    pub append: bool,
    /// Create if not exists.
    pub create: bool,
    /// Truncate on open.
    pub truncate: bool,
    /// Exclusive create (fail if exists).
    pub exclusive: bool,
}

impl Default for OpenFlags {
    fn default() -> Self {
        Self {
            read: true,
            write: false,
            append: false,
            create: false,
            truncate: false,
            exclusive: false,
        }
    }
}

impl OpenFlags {
    /// Read-only access.
    pub fn read() -> Self {
        Self::default()
    }

    /// Write access (also enables read).
    pub fn write() -> Self {
        Self {
            read: true,
            write: true,
            ..Default::default()
        }
    }

    /// Append to the end, creating the file if needed.
    pub fn append() -> Self {
        Self {
            read: true,
            write: true,
            append: true,
            create: true,
            ..Default::default()
        }
    }

    /// Create with write access.
    pub fn create() -> Self {
        Self {
            read: true,
            write: true,
            create: true,
            ..Default::default()
        }
    }

    /// Create exclusively (fail if exists).
    pub fn create_exclusive() -> Self {
        Self {
            read: true,
            write: true,
            create: true,
            exclusive: true,
            ..Default::default()
        }
    }

    /// Create and truncate.
    pub fn create_truncate() -> Self {
        Self {
            read: true,
            write: true,
            create: true,
            truncate: true,
            ..Default::default()
        }
    }

    /// True if the stream may modify the file.
    pub fn writes(&self) -> bool {
        self.write || self.append || self.truncate
    }
}

/// Options for copy and move.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CopyOptions {
    /// Copy directories with their contents.
    pub recursive: bool,
    /// Replace files that already exist at the destination.
    pub overwrite: bool,
    /// Create missing parent directories of the destination.
    pub parents: bool,
}

impl CopyOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn recursive(mut self) -> Self {
        self.recursive = true;
        self
    }

    pub fn overwrite(mut self) -> Self {
        self.overwrite = true;
        self
    }

    pub fn parents(mut self) -> Self {
        self.parents = true;
        self
    }
}
