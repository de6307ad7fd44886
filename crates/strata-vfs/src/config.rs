//! Mount layout configuration.
//!
//! ```toml
//! [[mount]]
//! path = "/"
//! backend = "memory"
//!
//! [[mount]]
//! path = "/src"
//! backend = "local"
//! root = "/home/amy/project"
//! read_only = true
//! cache = true
//! ```

use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use strum::EnumString;

use crate::vfs::{
    Adapter, CachedAdapter, LocalBackend, MemoryBackend, TempBackend, VfsError, VfsResult,
};

/// Kind of store behind a mount.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, EnumString)]
#[serde(rename_all = "lowercase")]
#[strum(ascii_case_insensitive, serialize_all = "lowercase")]
pub enum BackendKind {
    /// A host directory.
    Local,
    /// Process memory.
    Memory,
    /// A temporary host directory removed with the mount.
    Temp,
}

impl BackendKind {
    /// Parse from string (case-insensitive).
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Option<Self> {
        <Self as FromStr>::from_str(s).ok()
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            BackendKind::Local => "local",
            BackendKind::Memory => "memory",
            BackendKind::Temp => "temp",
        }
    }
}

impl std::fmt::Display for BackendKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One `[[mount]]` entry.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MountConfig {
    /// Virtual mount point.
    pub path: String,
    pub backend: BackendKind,
    /// Host directory; required for `local`, refused otherwise.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub root: Option<PathBuf>,
    #[serde(default)]
    pub read_only: bool,
    /// Wrap the backend in a stat/listing cache.
    #[serde(default)]
    pub cache: bool,
}

impl MountConfig {
    pub fn new(path: impl Into<String>, backend: BackendKind) -> Self {
        Self {
            path: path.into(),
            backend,
            root: None,
            read_only: false,
            cache: false,
        }
    }

    pub fn with_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.root = Some(root.into());
        self
    }

    pub fn with_read_only(mut self, read_only: bool) -> Self {
        self.read_only = read_only;
        self
    }

    pub fn with_cache(mut self, cache: bool) -> Self {
        self.cache = cache;
        self
    }

    /// Construct the adapter this entry describes.
    pub fn build(&self) -> VfsResult<Arc<dyn Adapter>> {
        if self.backend != BackendKind::Local && self.root.is_some() {
            return Err(VfsError::invalid_config(format!(
                "{}: `root` only applies to local mounts",
                self.path
            )));
        }

        let adapter: Arc<dyn Adapter> = match self.backend {
            BackendKind::Local => {
                let root = self.root.as_ref().ok_or_else(|| {
                    VfsError::invalid_config(format!("{}: local mount needs `root`", self.path))
                })?;
                if !root.is_dir() {
                    return Err(VfsError::invalid_config(format!(
                        "{}: {} is not a directory",
                        self.path,
                        root.display()
                    )));
                }
                let mut local = LocalBackend::new(root);
                local.set_read_only(self.read_only);
                self.wrap(local)
            }
            BackendKind::Memory => {
                let mut memory = MemoryBackend::new();
                memory.set_read_only(self.read_only);
                self.wrap(memory)
            }
            BackendKind::Temp => {
                if self.read_only {
                    return Err(VfsError::invalid_config(format!(
                        "{}: temp mounts are always writable",
                        self.path
                    )));
                }
                self.wrap(TempBackend::create()?)
            }
        };

        tracing::debug!(
            path = %self.path,
            backend = %self.backend,
            read_only = self.read_only,
            cache = self.cache,
            "built mount"
        );
        Ok(adapter)
    }

    fn wrap<A: Adapter + 'static>(&self, adapter: A) -> Arc<dyn Adapter> {
        if self.cache {
            Arc::new(CachedAdapter::new(adapter))
        } else {
            Arc::new(adapter)
        }
    }
}

/// A filesystem layout: mounts applied in order.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct VfsConfig {
    #[serde(default, rename = "mount")]
    pub mounts: Vec<MountConfig>,
}

impl VfsConfig {
    pub fn from_toml_str(text: &str) -> VfsResult<Self> {
        toml::from_str(text).map_err(|e| VfsError::invalid_config(e.to_string()))
    }

    pub fn load(path: impl AsRef<Path>) -> VfsResult<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)?;
        tracing::debug!(config = %path.display(), "loading vfs config");
        Self::from_toml_str(&text)
    }

    pub fn to_toml_string(&self) -> VfsResult<String> {
        toml::to_string(self).map_err(|e| VfsError::invalid_config(e.to_string()))
    }

    pub fn mount(mut self, mount: MountConfig) -> Self {
        self.mounts.push(mount);
        self
    }
}
