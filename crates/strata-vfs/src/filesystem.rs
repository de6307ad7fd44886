//! The filesystem facade.

use std::sync::Arc;

use crate::config::VfsConfig;
use crate::vfs::{
    Adapter, MountAdapter, MountInfo, Pathname, RootAdapter, StatFs, VfsError, VfsResult,
};

/// Entry point for path-addressed access.
///
/// Every [`Pathname`] handed out resolves through the same [`RootAdapter`],
/// so replacing the root or changing mounts is visible to paths created
/// afterwards.
#[derive(Clone)]
pub struct Filesystem {
    root: Arc<RootAdapter>,
    mounts: Option<Arc<MountAdapter>>,
}

impl Filesystem {
    /// A filesystem over a single adapter.
    pub fn new(adapter: impl Adapter + 'static) -> Self {
        Self::from_arc(Arc::new(adapter))
    }

    pub fn from_arc(adapter: Arc<dyn Adapter>) -> Self {
        Self {
            root: Arc::new(RootAdapter::with_delegate(adapter)),
            mounts: None,
        }
    }

    /// A filesystem over an empty mount table.
    pub fn mounted() -> Self {
        let table = Arc::new(MountAdapter::empty());
        let delegate: Arc<dyn Adapter> = table.clone();
        Self {
            root: Arc::new(RootAdapter::with_delegate(delegate)),
            mounts: Some(table),
        }
    }

    /// A mounted filesystem laid out by `config`, mounting in order.
    #[tracing::instrument(skip(config), name = "filesystem.from_config")]
    pub fn from_config(config: &VfsConfig) -> VfsResult<Self> {
        let fs = Self::mounted();
        for mount in &config.mounts {
            fs.mount_arc(&mount.path, mount.build()?)?;
        }
        tracing::info!(mounts = config.mounts.len(), "filesystem configured");
        Ok(fs)
    }

    /// A path in this filesystem.
    pub fn path(&self, path: &str) -> Pathname {
        let root: Arc<dyn Adapter> = self.root.clone();
        Pathname::new(root, path)
    }

    /// The root adapter every path resolves through.
    pub fn root(&self) -> &Arc<RootAdapter> {
        &self.root
    }

    /// Swap the adapter behind the root, returning the previous one.
    ///
    /// The mount table, if any, stays reachable through [`mounts`](Self::mounts)
    /// only while it is still the delegate.
    pub fn replace_root(&mut self, adapter: Arc<dyn Adapter>) -> Arc<dyn Adapter> {
        let previous = self.root.replace(adapter);
        let still_mounted = match (&self.mounts, self.root.delegate()) {
            (Some(table), current) => {
                let table: Arc<dyn Adapter> = table.clone();
                Arc::ptr_eq(&table, &current)
            }
            (None, _) => false,
        };
        if !still_mounted {
            self.mounts = None;
        }
        previous
    }

    /// The mount table, when the root delegates to one.
    pub fn mount_table(&self) -> Option<&Arc<MountAdapter>> {
        self.mounts.as_ref()
    }

    fn table(&self) -> VfsResult<&Arc<MountAdapter>> {
        self.mounts
            .as_ref()
            .ok_or_else(|| VfsError::unsupported("filesystem has no mount table"))
    }

    pub fn mount(&self, prefix: &str, adapter: impl Adapter + 'static) -> VfsResult<()> {
        self.table()?.mount(prefix, adapter)
    }

    pub fn mount_arc(&self, prefix: &str, adapter: Arc<dyn Adapter>) -> VfsResult<()> {
        self.table()?.mount_arc(prefix, adapter)
    }

    /// Remove the mount at exactly `prefix`.
    pub fn unmount(&self, prefix: &str) -> VfsResult<bool> {
        Ok(self.table()?.unmount(prefix))
    }

    pub fn mounts(&self) -> VfsResult<Vec<MountInfo>> {
        Ok(self.table()?.list_mounts())
    }

    pub fn read_only(&self) -> bool {
        self.root.read_only()
    }

    pub fn statfs(&self) -> VfsResult<StatFs> {
        self.root.statfs()
    }
}

impl std::fmt::Debug for Filesystem {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Filesystem")
            .field("mounted", &self.mounts.is_some())
            .finish_non_exhaustive()
    }
}
