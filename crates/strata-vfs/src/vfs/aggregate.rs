//! Mount registry with pluggable selection.
//!
//! Unlike [`MountTable`](super::MountTable), several adapters may be
//! registered at the same prefix. For a path, the candidates are the
//! registrations at its most specific registered prefix, and a
//! [`SelectionStrategy`] picks the winner among them.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use dashmap::DashMap;
use parking_lot::RwLock;

use super::error::{VfsError, VfsResult};
use super::ops::Adapter;
use super::path;
use super::routed::{Router, Routed};
use super::virtual_dir::{MountIndex, VirtualDirectory};

/// Opaque handle returned by [`Aggregate::add_adapter`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RegistrationId(u64);

impl RegistrationId {
    pub fn get(self) -> u64 {
        self.0
    }
}

/// One adapter registered at a prefix.
#[derive(Clone)]
pub struct Registration {
    pub id: RegistrationId,
    pub prefix: String,
    pub adapter: Arc<dyn Adapter>,
    pub priority: i32,
}

impl std::fmt::Debug for Registration {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Registration")
            .field("id", &self.id)
            .field("prefix", &self.prefix)
            .field("priority", &self.priority)
            .finish()
    }
}

/// Picks the owner of a path among the candidates at its prefix.
///
/// Candidates arrive in registration order. Returning `None` means no
/// candidate is acceptable and the path is unowned.
pub trait SelectionStrategy: Send + Sync {
    fn select(&self, path: &str, candidates: &[Registration]) -> Option<usize>;
}

impl<F> SelectionStrategy for F
where
    F: Fn(&str, &[Registration]) -> Option<usize> + Send + Sync,
{
    fn select(&self, path: &str, candidates: &[Registration]) -> Option<usize> {
        self(path, candidates)
    }
}

/// The latest registration wins.
#[derive(Debug, Clone, Copy, Default)]
pub struct MostRecent;

impl SelectionStrategy for MostRecent {
    fn select(&self, _path: &str, candidates: &[Registration]) -> Option<usize> {
        candidates.len().checked_sub(1)
    }
}

/// The earliest registration wins.
#[derive(Debug, Clone, Copy, Default)]
pub struct FirstRegistered;

impl SelectionStrategy for FirstRegistered {
    fn select(&self, _path: &str, candidates: &[Registration]) -> Option<usize> {
        if candidates.is_empty() { None } else { Some(0) }
    }
}

/// The highest priority wins; ties go to the latest registration.
#[derive(Debug, Clone, Copy, Default)]
pub struct HighestPriority;

impl SelectionStrategy for HighestPriority {
    fn select(&self, _path: &str, candidates: &[Registration]) -> Option<usize> {
        candidates
            .iter()
            .enumerate()
            .max_by_key(|(idx, reg)| (reg.priority, *idx))
            .map(|(idx, _)| idx)
    }
}

/// Registrations grouped by prefix, in registration order.
#[derive(Default)]
struct AggregateRegistry {
    by_prefix: RwLock<BTreeMap<String, Vec<Registration>>>,
}

impl MountIndex for AggregateRegistry {
    fn prefixes(&self) -> Vec<String> {
        self.by_prefix.read().keys().cloned().collect()
    }
}

/// Candidate set at one registered prefix.
#[derive(Clone)]
struct Candidates {
    prefix: String,
    registrations: Arc<[Registration]>,
}

/// Router over an aggregate registry.
pub struct Aggregate<S> {
    registry: Arc<AggregateRegistry>,
    strategy: S,
    next_id: AtomicU64,
    /// Keyed by registered prefix.
    candidates: DashMap<String, Candidates>,
}

impl<S: SelectionStrategy> Aggregate<S> {
    pub fn new(strategy: S) -> Self {
        Self {
            registry: Arc::new(AggregateRegistry::default()),
            strategy,
            next_id: AtomicU64::new(1),
            candidates: DashMap::new(),
        }
    }

    /// Register an adapter at `prefix` with priority 0.
    pub fn add_adapter(&self, prefix: &str, adapter: Arc<dyn Adapter>) -> RegistrationId {
        self.add_adapter_with_priority(prefix, adapter, 0)
    }

    /// Register an adapter at `prefix`.
    pub fn add_adapter_with_priority(
        &self,
        prefix: &str,
        adapter: Arc<dyn Adapter>,
        priority: i32,
    ) -> RegistrationId {
        let prefix = path::normalize(prefix);
        let id = RegistrationId(self.next_id.fetch_add(1, Ordering::Relaxed));
        let mut by_prefix = self.registry.by_prefix.write();
        by_prefix.entry(prefix.clone()).or_default().push(Registration {
            id,
            prefix: prefix.clone(),
            adapter,
            priority,
        });
        self.invalidate(&prefix);
        tracing::debug!(prefix = %prefix, id = id.0, priority, "registered adapter");
        id
    }

    /// Remove one registration (`Some(id)`) or every registration at `prefix`.
    ///
    /// Returns how many registrations were removed. Naming a handle that is
    /// not registered at `prefix` is an error.
    pub fn remove_adapter(&self, prefix: &str, id: Option<RegistrationId>) -> VfsResult<usize> {
        let prefix = path::normalize(prefix);
        let removed = {
            let mut by_prefix = self.registry.by_prefix.write();
            let removed = match id {
                Some(id) => {
                    let unknown = || VfsError::UnknownRegistration {
                        prefix: prefix.clone(),
                        id: id.0,
                    };
                    let regs = by_prefix.get_mut(&prefix).ok_or_else(&unknown)?;
                    let before = regs.len();
                    regs.retain(|reg| reg.id != id);
                    if regs.len() == before {
                        return Err(unknown());
                    }
                    if regs.is_empty() {
                        by_prefix.remove(&prefix);
                    }
                    1
                }
                None => by_prefix.remove(&prefix).map_or(0, |regs| regs.len()),
            };
            self.invalidate(&prefix);
            removed
        };
        tracing::debug!(prefix = %prefix, removed, "removed adapters");
        Ok(removed)
    }

    /// Registrations at exactly `prefix`, in registration order.
    pub fn registrations(&self, prefix: &str) -> Vec<Registration> {
        self.registry
            .by_prefix
            .read()
            .get(&path::normalize(prefix))
            .cloned()
            .unwrap_or_default()
    }

    /// The registration that owns `path`.
    pub fn select_adapter(&self, path: &str) -> VfsResult<Registration> {
        let normalized = path::normalize(path);
        let candidates = self.candidates_for(&normalized)?;
        tracing::trace!(
            path = %normalized,
            prefix = %candidates.prefix,
            count = candidates.registrations.len(),
            "selecting adapter"
        );
        self.strategy
            .select(&normalized, &candidates.registrations)
            .and_then(|idx| candidates.registrations.get(idx).cloned())
            .ok_or_else(|| VfsError::no_mount_point(normalized))
    }

    /// Number of prefixes with a cached candidate set.
    pub fn cached_prefixes(&self) -> usize {
        self.candidates.len()
    }

    /// Candidates at the most specific registered prefix of `path`.
    ///
    /// The registry read lock is held across the cache fill, so a fill can't
    /// race with the invalidation of a registration change.
    fn candidates_for(&self, path: &str) -> VfsResult<Candidates> {
        let by_prefix = self.registry.by_prefix.read();
        let (prefix, regs) = path::ancestors(path)
            .find_map(|candidate| {
                by_prefix
                    .get(&candidate)
                    .filter(|regs| !regs.is_empty())
                    .map(|regs| (candidate, regs))
            })
            .ok_or_else(|| VfsError::no_mount_point(path))?;

        if let Some(hit) = self.candidates.get(&prefix) {
            return Ok(hit.clone());
        }
        let found = Candidates {
            prefix: prefix.clone(),
            registrations: regs.as_slice().into(),
        };
        self.candidates.insert(prefix, found.clone());
        Ok(found)
    }

    /// Drop cached candidate sets at or below `prefix`.
    ///
    /// Callers hold the registry write lock.
    fn invalidate(&self, prefix: &str) {
        let before = self.candidates.len();
        self.candidates
            .retain(|cached, _| !path::is_within(cached, prefix));
        let dropped = before.saturating_sub(self.candidates.len());
        if dropped > 0 {
            tracing::debug!(prefix = %prefix, dropped, "invalidated candidate cache");
        }
    }
}

impl<S: SelectionStrategy> Router for Aggregate<S> {
    fn route(&self, path: &str) -> VfsResult<(Arc<dyn Adapter>, String)> {
        match self.select_adapter(path) {
            Ok(reg) => Ok((reg.adapter, path::strip_prefix(path, &reg.prefix))),
            Err(VfsError::NoMountPoint(missed))
                if path::is_root(&missed) || self.registry.has_mounts_below(&missed) =>
            {
                let index: Arc<dyn MountIndex> = self.registry.clone();
                let fallback: Arc<dyn Adapter> = Arc::new(VirtualDirectory::new(index));
                Ok((fallback, missed))
            }
            Err(e) => Err(e),
        }
    }

    fn mounted_children(&self, path: &str) -> Vec<String> {
        self.registry.children_of(path)
    }
}

/// Adapter view of an [`Aggregate`].
pub type AggregateAdapter<S> = Routed<Aggregate<S>>;

impl<S: SelectionStrategy> AggregateAdapter<S> {
    pub fn with_strategy(strategy: S) -> Self {
        Routed::new(Aggregate::new(strategy))
    }

    pub fn add_adapter(&self, prefix: &str, adapter: Arc<dyn Adapter>) -> RegistrationId {
        self.router().add_adapter(prefix, adapter)
    }

    pub fn add_adapter_with_priority(
        &self,
        prefix: &str,
        adapter: Arc<dyn Adapter>,
        priority: i32,
    ) -> RegistrationId {
        self.router()
            .add_adapter_with_priority(prefix, adapter, priority)
    }

    pub fn remove_adapter(&self, prefix: &str, id: Option<RegistrationId>) -> VfsResult<usize> {
        self.router().remove_adapter(prefix, id)
    }

    pub fn select_adapter(&self, path: &str) -> VfsResult<Registration> {
        self.router().select_adapter(path)
    }
}
