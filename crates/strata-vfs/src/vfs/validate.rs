//! Shared existence and type checks.
//!
//! Adapters and the facade run these before operations that need a target
//! of a particular shape, so "missing" and "wrong type" read the same no
//! matter which store is underneath.

use super::ops::Adapter;
use super::types::FileAttr;
use super::{VfsError, VfsResult};

/// The target must exist.
///
/// A path no mount owns stays a resolution fault.
pub fn require_exists<A: Adapter + ?Sized>(adapter: &A, path: &str) -> VfsResult<FileAttr> {
    adapter.stat(path).map_err(|e| match e {
        VfsError::NoMountPoint(_) => e,
        e if e.is_not_found() => VfsError::not_found(path),
        e => e,
    })
}

/// The target must exist and be a file.
pub fn require_file<A: Adapter + ?Sized>(adapter: &A, path: &str) -> VfsResult<FileAttr> {
    let attr = require_exists(adapter, path)?;
    if attr.is_dir() {
        return Err(VfsError::not_a_file(path));
    }
    Ok(attr)
}

/// The target must exist and be a directory.
pub fn require_directory<A: Adapter + ?Sized>(adapter: &A, path: &str) -> VfsResult<FileAttr> {
    let attr = require_exists(adapter, path)?;
    if !attr.is_dir() {
        return Err(VfsError::not_a_directory(path));
    }
    Ok(attr)
}

/// Nothing may exist at the target yet.
pub fn require_absent<A: Adapter + ?Sized>(adapter: &A, path: &str) -> VfsResult<()> {
    if adapter.exists(path)? {
        return Err(VfsError::already_exists(path));
    }
    Ok(())
}

/// The adapter must accept writes.
pub fn require_writable<A: Adapter + ?Sized>(adapter: &A, path: &str) -> VfsResult<()> {
    if adapter.read_only() {
        return Err(VfsError::read_only(path));
    }
    Ok(())
}
