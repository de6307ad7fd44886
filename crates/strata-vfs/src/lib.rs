//! # strata-vfs
//!
//! Mount-aware virtual filesystem.
//!
//! A [`Filesystem`] hands out [`Pathname`]s that resolve through a root
//! adapter. The root can delegate to a single store or to a mount table
//! grafting many stores together:
//! - Paths resolve to the most specific mount and a path local to it
//! - Directories above mount points exist virtually
//! - Listings go through one filter pipeline whatever the store

pub mod config;
pub mod filesystem;
pub mod vfs;

pub use config::{BackendKind, MountConfig, VfsConfig};
pub use filesystem::Filesystem;
pub use vfs::{
    Adapter, CopyOptions, FileAttr, FileType, ListFilter, ListFlags, ListedEntry, Pathname,
    VfsError, VfsResult,
};
