//! Scratch space on local disk.

use std::path::Path;
use std::sync::Arc;

use tempfile::TempDir;

use super::LocalBackend;
use crate::vfs::error::VfsResult;
use crate::vfs::ops::Adapter;
use crate::vfs::path;
use crate::vfs::routed::{Router, Routed};

/// A temporary directory and the local backend rooted on it.
///
/// The directory is removed when this is dropped.
pub struct TempRoot {
    dir: TempDir,
    local: Arc<LocalBackend>,
}

impl Router for TempRoot {
    fn route(&self, path: &str) -> VfsResult<(Arc<dyn Adapter>, String)> {
        let local: Arc<dyn Adapter> = self.local.clone();
        Ok((local, path::normalize(path)))
    }
}

/// Local backend over a fresh temporary directory.
pub type TempBackend = Routed<TempRoot>;

impl TempBackend {
    /// Create a temporary directory in the system temp location.
    pub fn create() -> VfsResult<Self> {
        Self::with_prefix("strata-")
    }

    /// Create a temporary directory whose name starts with `prefix`.
    pub fn with_prefix(prefix: &str) -> VfsResult<Self> {
        let dir = tempfile::Builder::new().prefix(prefix).tempdir()?;
        let local = Arc::new(LocalBackend::new(dir.path()));
        tracing::debug!(root = %dir.path().display(), "created temp backend");
        Ok(Routed::new(TempRoot { dir, local }))
    }

    /// Host path of the temporary directory.
    pub fn path(&self) -> &Path {
        self.router().dir.path()
    }

    /// The backend doing the work.
    pub fn local(&self) -> &LocalBackend {
        &self.router().local
    }
}
