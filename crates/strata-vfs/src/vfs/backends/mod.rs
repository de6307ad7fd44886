//! VFS backends.
//!
//! Backends implement [`Adapter`](crate::vfs::Adapter) for different storage types.

mod local;
mod memory;
mod temp;

pub use local::LocalBackend;
pub use memory::MemoryBackend;
pub use temp::{TempBackend, TempRoot};
