//! Virtual Filesystem abstraction.
//!
//! One path-addressed API over many stores, with stores grafted into a
//! single namespace by mounting them at arbitrary paths.
//! Key components:
//!
//! - [`Adapter`] - Core trait every store and composition implements
//! - [`Routed`] - Decorator that forwards calls through a [`Router`]
//! - [`MountTable`] - Routes operations to adapters by longest prefix
//! - [`Aggregate`] - Routes by a pluggable [`SelectionStrategy`]
//! - [`ListFilter`] - Type, glob and predicate filtering for listings
//! - [`Pathname`] - A path bound to a root adapter
//!
//! ## Design Decisions
//!
//! - **Paths, not handles**: adapters take normalized absolute strings
//!   local to themselves. Composition layers strip and re-add prefixes.
//! - **Longest-prefix routing**: `/data/archive` mounted separately wins
//!   over `/data` for its own subtree.
//! - **Virtual directories**: the root and every ancestor of a mount point
//!   exist even when no adapter stores them.
//! - **Errors name the caller's path**: faults raised below a mount are
//!   reported with the full virtual path.

pub mod backends;
mod aggregate;
mod cache;
mod error;
pub mod filter;
mod glob;
mod mount;
mod ops;
pub mod path;
mod pathname;
mod routed;
mod types;
pub mod validate;
mod virtual_dir;

pub use aggregate::{
    Aggregate, AggregateAdapter, FirstRegistered, HighestPriority, MostRecent, Registration,
    RegistrationId, SelectionStrategy,
};
pub use backends::{LocalBackend, MemoryBackend, TempBackend};
pub use cache::CachedAdapter;
pub use error::{FaultClass, VfsError, VfsResult};
pub use filter::{FilterArg, FilterSpec, ListFilter, ListFlags, ListedEntry, Predicate};
pub use glob::Glob;
pub use mount::{MountAdapter, MountInfo, MountRegistry, MountTable};
pub use ops::{Adapter, FileStream, Resolved, SnapshotStream, copy_tree};
pub use pathname::Pathname;
pub use routed::{DelegateAdapter, Fixed, RootAdapter, RootSlot, Routed, Router};
pub use types::{
    CopyOptions, DirEntry, FileAttr, FileType, OpenFlags, SetAttr, StatFs, TypeMask,
};
pub use virtual_dir::{MountIndex, VirtualDirectory, children_below};
