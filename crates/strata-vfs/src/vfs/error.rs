//! VFS error types.

use std::io;
use thiserror::Error;

/// Broad category of a [`VfsError`].
///
/// Composition code uses this to tell "the path is not there" apart from
/// "the backing store failed" without matching on every variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FaultClass {
    /// No adapter is bound for the path and no virtual directory applies.
    Resolution,
    /// The target is missing or has the wrong type.
    State,
    /// The owning adapter's native operation failed.
    Operation,
    /// The caller passed something malformed.
    Usage,
}

/// VFS error type.
#[derive(Debug, Error)]
pub enum VfsError {
    /// No mount point for path.
    #[error("no mount point for path: {0}")]
    NoMountPoint(String),

    /// File or directory not found.
    #[error("not found: {0}")]
    NotFound(String),

    /// Path already exists.
    #[error("already exists: {0}")]
    AlreadyExists(String),

    /// Expected a directory.
    #[error("not a directory: {0}")]
    NotADirectory(String),

    /// Expected a file, found a directory.
    #[error("is a directory: {0}")]
    IsADirectory(String),

    /// Expected a file.
    #[error("not a file: {0}")]
    NotAFile(String),

    /// Not a symbolic link.
    #[error("not a symbolic link: {0}")]
    NotASymlink(String),

    /// Directory not empty.
    #[error("directory not empty: {0}")]
    DirectoryNotEmpty(String),

    /// Permission denied.
    #[error("permission denied: {0}")]
    PermissionDenied(String),

    /// Filesystem is read-only.
    #[error("filesystem is read-only: {0}")]
    ReadOnly(String),

    /// Path escapes root (security violation).
    #[error("path escapes root: {0}")]
    PathEscapesRoot(String),

    /// The adapter does not implement this operation.
    #[error("unsupported operation: {0}")]
    Unsupported(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Other error.
    #[error("{0}")]
    Other(String),

    /// Prefix is already bound in a mount table.
    #[error("already mounted: {0}")]
    AlreadyMounted(String),

    /// Registration handle is not (or no longer) registered at the prefix.
    #[error("unknown registration {id} at {prefix}")]
    UnknownRegistration { prefix: String, id: u64 },

    /// Malformed listing filter.
    #[error("invalid filter: {0}")]
    InvalidFilter(String),

    /// Invalid path.
    #[error("invalid path: {0}")]
    InvalidPath(String),

    /// Malformed mount configuration.
    #[error("invalid config: {0}")]
    InvalidConfig(String),
}

impl VfsError {
    /// Create a NoMountPoint error.
    pub fn no_mount_point(path: impl Into<String>) -> Self {
        Self::NoMountPoint(path.into())
    }

    /// Create a NotFound error.
    pub fn not_found(path: impl Into<String>) -> Self {
        Self::NotFound(path.into())
    }

    /// Create an AlreadyExists error.
    pub fn already_exists(path: impl Into<String>) -> Self {
        Self::AlreadyExists(path.into())
    }

    /// Create a NotADirectory error.
    pub fn not_a_directory(path: impl Into<String>) -> Self {
        Self::NotADirectory(path.into())
    }

    /// Create an IsADirectory error.
    pub fn is_a_directory(path: impl Into<String>) -> Self {
        Self::IsADirectory(path.into())
    }

    /// Create a NotAFile error.
    pub fn not_a_file(path: impl Into<String>) -> Self {
        Self::NotAFile(path.into())
    }

    /// Create a NotASymlink error.
    pub fn not_a_symlink(path: impl Into<String>) -> Self {
        Self::NotASymlink(path.into())
    }

    /// Create a DirectoryNotEmpty error.
    pub fn directory_not_empty(path: impl Into<String>) -> Self {
        Self::DirectoryNotEmpty(path.into())
    }

    /// Create a PermissionDenied error.
    pub fn permission_denied(path: impl Into<String>) -> Self {
        Self::PermissionDenied(path.into())
    }

    /// Create a ReadOnly error.
    pub fn read_only(path: impl Into<String>) -> Self {
        Self::ReadOnly(path.into())
    }

    /// Create a PathEscapesRoot error.
    pub fn path_escapes_root(path: impl Into<String>) -> Self {
        Self::PathEscapesRoot(path.into())
    }

    /// Create an Unsupported error.
    pub fn unsupported(what: impl Into<String>) -> Self {
        Self::Unsupported(what.into())
    }

    /// Create an AlreadyMounted error.
    pub fn already_mounted(prefix: impl Into<String>) -> Self {
        Self::AlreadyMounted(prefix.into())
    }

    /// Create an InvalidFilter error.
    pub fn invalid_filter(msg: impl Into<String>) -> Self {
        Self::InvalidFilter(msg.into())
    }

    /// Create an InvalidPath error.
    pub fn invalid_path(path: impl Into<String>) -> Self {
        Self::InvalidPath(path.into())
    }

    /// Create an InvalidConfig error.
    pub fn invalid_config(msg: impl Into<String>) -> Self {
        Self::InvalidConfig(msg.into())
    }

    /// Create an Other error.
    pub fn other(msg: impl Into<String>) -> Self {
        Self::Other(msg.into())
    }

    /// The fault class this error belongs to.
    pub fn class(&self) -> FaultClass {
        match self {
            VfsError::NoMountPoint(_) => FaultClass::Resolution,
            VfsError::NotFound(_)
            | VfsError::AlreadyExists(_)
            | VfsError::NotADirectory(_)
            | VfsError::IsADirectory(_)
            | VfsError::NotAFile(_)
            | VfsError::NotASymlink(_)
            | VfsError::DirectoryNotEmpty(_) => FaultClass::State,
            VfsError::PermissionDenied(_)
            | VfsError::ReadOnly(_)
            | VfsError::PathEscapesRoot(_)
            | VfsError::Unsupported(_)
            | VfsError::Io(_)
            | VfsError::Other(_) => FaultClass::Operation,
            VfsError::AlreadyMounted(_)
            | VfsError::UnknownRegistration { .. }
            | VfsError::InvalidFilter(_)
            | VfsError::InvalidPath(_)
            | VfsError::InvalidConfig(_) => FaultClass::Usage,
        }
    }

    /// The path an error names, for the variants that carry one.
    pub fn path(&self) -> Option<&str> {
        match self {
            VfsError::NoMountPoint(p)
            | VfsError::NotFound(p)
            | VfsError::AlreadyExists(p)
            | VfsError::NotADirectory(p)
            | VfsError::IsADirectory(p)
            | VfsError::NotAFile(p)
            | VfsError::NotASymlink(p)
            | VfsError::DirectoryNotEmpty(p)
            | VfsError::ReadOnly(p) => Some(p),
            _ => None,
        }
    }

    /// True when the error means "nothing lives at this path".
    ///
    /// Host I/O errors of kind `NotFound` count too, so local adapters can
    /// pass `std::io::Error` through unchanged.
    pub fn is_not_found(&self) -> bool {
        match self {
            VfsError::NotFound(_) | VfsError::NoMountPoint(_) => true,
            VfsError::Io(e) => e.kind() == io::ErrorKind::NotFound,
            _ => false,
        }
    }
}

/// Convert VfsError to std::io::Error for compatibility.
impl From<VfsError> for io::Error {
    fn from(e: VfsError) -> Self {
        match e {
            VfsError::NoMountPoint(msg) => io::Error::new(io::ErrorKind::NotFound, msg),
            VfsError::NotFound(msg) => io::Error::new(io::ErrorKind::NotFound, msg),
            VfsError::AlreadyExists(msg) => io::Error::new(io::ErrorKind::AlreadyExists, msg),
            VfsError::NotADirectory(msg) => io::Error::new(io::ErrorKind::NotADirectory, msg),
            VfsError::IsADirectory(msg) => io::Error::new(io::ErrorKind::IsADirectory, msg),
            VfsError::NotAFile(msg) => io::Error::new(io::ErrorKind::InvalidInput, msg),
            VfsError::NotASymlink(msg) => io::Error::new(io::ErrorKind::InvalidInput, msg),
            VfsError::DirectoryNotEmpty(msg) => {
                io::Error::new(io::ErrorKind::DirectoryNotEmpty, msg)
            }
            VfsError::PermissionDenied(msg) => {
                io::Error::new(io::ErrorKind::PermissionDenied, msg)
            }
            VfsError::ReadOnly(msg) => io::Error::new(io::ErrorKind::ReadOnlyFilesystem, msg),
            VfsError::PathEscapesRoot(msg) => {
                io::Error::new(io::ErrorKind::PermissionDenied, msg)
            }
            VfsError::Unsupported(msg) => io::Error::new(io::ErrorKind::Unsupported, msg),
            VfsError::Io(e) => e,
            VfsError::Other(msg) => io::Error::other(msg),
            VfsError::AlreadyMounted(msg) => io::Error::new(io::ErrorKind::AlreadyExists, msg),
            e @ VfsError::UnknownRegistration { .. } => {
                io::Error::new(io::ErrorKind::InvalidInput, e.to_string())
            }
            VfsError::InvalidFilter(msg) => io::Error::new(io::ErrorKind::InvalidInput, msg),
            VfsError::InvalidPath(msg) => io::Error::new(io::ErrorKind::InvalidInput, msg),
            VfsError::InvalidConfig(msg) => io::Error::new(io::ErrorKind::InvalidData, msg),
        }
    }
}

/// VFS result type.
pub type VfsResult<T> = Result<T, VfsError>;
