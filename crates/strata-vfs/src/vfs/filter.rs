//! Directory listing filters.
//!
//! A [`ListFilter`] collects flags, globs and predicates; [`ListFilter::compile`]
//! turns it into a [`FilterSpec`] for one directory, and [`list`] walks the
//! directory through any [`Adapter`] applying it.
//!
//! Flags fall into three groups that default independently: visibility
//! (`HIDDEN`, `VISIBLE`), kind (`FILES`, `DIRECTORIES`) and link class
//! (`LINKS`, `OPAQUE`). A group with no bit set accepts everything. Globs
//! and predicates are ANDed.

use std::collections::HashSet;
use std::ops::{BitOr, BitOrAssign};
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use super::error::{VfsError, VfsResult};
use super::glob::Glob;
use super::ops::Adapter;
use super::path;
use super::types::{FileType, TypeMask};

/// Listing flags, OR-combinable.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ListFlags(pub u32);

impl ListFlags {
    pub const NONE: ListFlags = ListFlags(0);
    /// Include `.` and `..`.
    pub const ALL: ListFlags = ListFlags(1);
    pub const HIDDEN: ListFlags = ListFlags(2);
    pub const VISIBLE: ListFlags = ListFlags(4);
    pub const FILES: ListFlags = ListFlags(128);
    pub const DIRECTORIES: ListFlags = ListFlags(256);
    pub const LINKS: ListFlags = ListFlags(512);
    /// Entries that are not links.
    pub const OPAQUE: ListFlags = ListFlags(1024);
    pub const RECURSIVE: ListFlags = ListFlags(8192);

    const VISIBILITY: ListFlags = ListFlags(2 | 4);
    const KINDS: ListFlags = ListFlags(128 | 256);
    const LINK_CLASS: ListFlags = ListFlags(512 | 1024);
    const KNOWN: ListFlags = ListFlags(1 | 2 | 4 | 128 | 256 | 512 | 1024 | 8192);

    /// Raw bits.
    pub fn bits(self) -> u32 {
        self.0
    }

    /// True if every bit of `other` is set.
    pub fn contains(self, other: ListFlags) -> bool {
        self.0 & other.0 == other.0
    }

    /// True if any bit of `other` is set.
    pub fn intersects(self, other: ListFlags) -> bool {
        self.0 & other.0 != 0
    }

    /// The bits of `group`, or the whole group when none are set.
    fn group_or_all(self, group: ListFlags) -> ListFlags {
        let bits = self.0 & group.0;
        if bits == 0 { group } else { ListFlags(bits) }
    }
}

impl BitOr for ListFlags {
    type Output = ListFlags;

    fn bitor(self, rhs: ListFlags) -> ListFlags {
        ListFlags(self.0 | rhs.0)
    }
}

impl BitOrAssign for ListFlags {
    fn bitor_assign(&mut self, rhs: ListFlags) {
        self.0 |= rhs.0;
    }
}

/// One entry of a filtered listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListedEntry {
    /// Absolute path in the listed namespace.
    pub path: String,
    /// Final segment (`.`/`..` for the self references).
    pub name: String,
    pub kind: FileType,
    pub is_link: bool,
}

impl ListedEntry {
    pub fn is_dir(&self) -> bool {
        self.kind.is_dir()
    }

    pub fn is_file(&self) -> bool {
        self.kind.is_file()
    }

    pub fn is_hidden(&self) -> bool {
        self.name.starts_with('.')
    }

    fn is_self_reference(&self) -> bool {
        self.name == "." || self.name == ".."
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

/// Arbitrary entry predicate.
pub type Predicate = Arc<dyn Fn(&ListedEntry) -> bool + Send + Sync>;

/// One argument of a freely mixed filter list.
#[derive(Clone)]
pub enum FilterArg {
    Flags(ListFlags),
    Glob(String),
    Predicate(Predicate),
    Group(Vec<FilterArg>),
}

impl FilterArg {
    pub fn predicate(f: impl Fn(&ListedEntry) -> bool + Send + Sync + 'static) -> Self {
        FilterArg::Predicate(Arc::new(f))
    }
}

impl std::fmt::Debug for FilterArg {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FilterArg::Flags(flags) => f.debug_tuple("Flags").field(flags).finish(),
            FilterArg::Glob(glob) => f.debug_tuple("Glob").field(glob).finish(),
            FilterArg::Predicate(_) => f.write_str("Predicate(..)"),
            FilterArg::Group(args) => f.debug_tuple("Group").field(args).finish(),
        }
    }
}

impl From<ListFlags> for FilterArg {
    fn from(flags: ListFlags) -> Self {
        FilterArg::Flags(flags)
    }
}

impl From<&str> for FilterArg {
    fn from(glob: &str) -> Self {
        FilterArg::Glob(glob.to_string())
    }
}

impl From<String> for FilterArg {
    fn from(glob: String) -> Self {
        FilterArg::Glob(glob)
    }
}

impl From<Vec<FilterArg>> for FilterArg {
    fn from(args: Vec<FilterArg>) -> Self {
        FilterArg::Group(args)
    }
}

/// Filter builder.
#[derive(Clone, Default)]
pub struct ListFilter {
    flags: ListFlags,
    globs: Vec<String>,
    predicates: Vec<Predicate>,
}

impl std::fmt::Debug for ListFilter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ListFilter")
            .field("flags", &self.flags)
            .field("globs", &self.globs)
            .field("predicates", &self.predicates.len())
            .finish()
    }
}

impl ListFilter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from a mixed argument list; groups are flattened.
    pub fn from_args(args: impl IntoIterator<Item = FilterArg>) -> Self {
        args.into_iter().fold(Self::new(), Self::arg)
    }

    /// OR flags into the filter.
    pub fn flags(mut self, flags: ListFlags) -> Self {
        self.flags |= flags;
        self
    }

    pub fn recursive(self) -> Self {
        self.flags(ListFlags::RECURSIVE)
    }

    /// Require a glob match. Relative patterns are taken from the listed directory.
    pub fn glob(mut self, pattern: impl Into<String>) -> Self {
        self.globs.push(pattern.into());
        self
    }

    /// Require a predicate to hold.
    pub fn predicate(mut self, f: impl Fn(&ListedEntry) -> bool + Send + Sync + 'static) -> Self {
        self.predicates.push(Arc::new(f));
        self
    }

    pub fn arg(self, arg: FilterArg) -> Self {
        match arg {
            FilterArg::Flags(flags) => self.flags(flags),
            FilterArg::Glob(glob) => self.glob(glob),
            FilterArg::Predicate(p) => {
                let mut this = self;
                this.predicates.push(p);
                this
            }
            FilterArg::Group(args) => args.into_iter().fold(self, Self::arg),
        }
    }

    /// Resolve the filter against the directory being listed.
    pub fn compile(&self, dir: &str) -> VfsResult<FilterSpec> {
        let unknown = self.flags.0 & !ListFlags::KNOWN.0;
        if unknown != 0 {
            return Err(VfsError::invalid_filter(format!(
                "unknown list flag bits {unknown:#x}"
            )));
        }

        let dir = path::normalize(dir);
        let globs = self
            .globs
            .iter()
            .map(|pattern| Glob::anchored(pattern, &dir))
            .collect::<VfsResult<Vec<_>>>()?;

        let mut glob_prefixes = Vec::new();
        let mut seen = HashSet::new();
        for glob in &globs {
            for prefix in glob.prefixes(&dir)? {
                if seen.insert(prefix.as_str().to_string()) {
                    glob_prefixes.push(prefix);
                }
            }
        }

        Ok(FilterSpec {
            recursive: self.flags.contains(ListFlags::RECURSIVE),
            include_dots: self.flags.contains(ListFlags::ALL),
            visibility: self.flags.group_or_all(ListFlags::VISIBILITY),
            kinds: self.flags.group_or_all(ListFlags::KINDS),
            link_class: self.flags.group_or_all(ListFlags::LINK_CLASS),
            globs,
            glob_prefixes,
            predicates: self.predicates.clone(),
        })
    }
}

impl From<ListFlags> for ListFilter {
    fn from(flags: ListFlags) -> Self {
        ListFilter::new().flags(flags)
    }
}

impl From<&str> for ListFilter {
    fn from(glob: &str) -> Self {
        ListFilter::new().glob(glob)
    }
}

impl From<FilterArg> for ListFilter {
    fn from(arg: FilterArg) -> Self {
        ListFilter::new().arg(arg)
    }
}

impl From<Vec<FilterArg>> for ListFilter {
    fn from(args: Vec<FilterArg>) -> Self {
        ListFilter::from_args(args)
    }
}

/// A filter resolved for one listing call.
pub struct FilterSpec {
    pub recursive: bool,
    pub include_dots: bool,
    visibility: ListFlags,
    kinds: ListFlags,
    link_class: ListFlags,
    globs: Vec<Glob>,
    glob_prefixes: Vec<Glob>,
    predicates: Vec<Predicate>,
}

impl FilterSpec {
    /// Entry types this filter can accept.
    pub fn type_mask(&self) -> TypeMask {
        let mut mask = TypeMask::default();
        if self.kinds.contains(ListFlags::FILES) {
            mask = mask | TypeMask::FILE;
        }
        if self.kinds.contains(ListFlags::DIRECTORIES) {
            mask = mask | TypeMask::DIRECTORY;
        }
        if self.link_class.contains(ListFlags::LINKS) {
            mask = mask | TypeMask::LINK;
        }
        mask
    }

    /// Anchored glob patterns.
    pub fn globs(&self) -> impl Iterator<Item = &str> {
        self.globs.iter().map(Glob::as_str)
    }

    /// Directory patterns that force descent.
    pub fn glob_prefixes(&self) -> impl Iterator<Item = &str> {
        self.glob_prefixes.iter().map(Glob::as_str)
    }

    /// True if the entry belongs in the result.
    pub fn accepts(&self, entry: &ListedEntry) -> bool {
        // `.` and `..` are shown whenever asked for, regardless of visibility
        if !entry.is_self_reference() {
            let wanted = if entry.is_hidden() {
                ListFlags::HIDDEN
            } else {
                ListFlags::VISIBLE
            };
            if !self.visibility.contains(wanted) {
                return false;
            }
        }

        let kind = if entry.is_dir() {
            ListFlags::DIRECTORIES
        } else {
            ListFlags::FILES
        };
        if !self.kinds.contains(kind) {
            return false;
        }

        let class = if entry.is_link {
            ListFlags::LINKS
        } else {
            ListFlags::OPAQUE
        };
        if !self.link_class.contains(class) {
            return false;
        }

        self.globs.iter().all(|glob| glob.is_match(&entry.path))
            && self.predicates.iter().all(|p| p(entry))
    }

    /// True if the listing should descend into the entry.
    pub fn should_expand(&self, entry: &ListedEntry) -> bool {
        if !entry.is_dir() || entry.is_link || entry.is_self_reference() {
            return false;
        }
        self.recursive || self.glob_prefixes.iter().any(|g| g.is_match(&entry.path))
    }
}

/// List `dir` through `adapter`, applying `filter`.
///
/// Children of an expanded directory follow it directly (depth-first,
/// pre-order). Each directory is expanded at most once.
pub fn list(adapter: &dyn Adapter, dir: &str, filter: &ListFilter) -> VfsResult<Vec<ListedEntry>> {
    let dir = path::normalize(dir);
    let spec = filter.compile(&dir)?;
    let mut out = Vec::new();

    if spec.include_dots {
        let dots = [(".", dir.clone()), ("..", path::parent(&dir))];
        for (name, target) in dots {
            let entry = ListedEntry {
                path: target,
                name: name.to_string(),
                kind: FileType::Directory,
                is_link: false,
            };
            if spec.accepts(&entry) {
                out.push(entry);
            }
        }
    }

    let mut expanded = HashSet::new();
    expanded.insert(dir.clone());
    walk(adapter, &dir, &spec, &mut expanded, &mut out)?;

    tracing::trace!(dir = %dir, count = out.len(), "listed");
    Ok(out)
}

fn walk(
    adapter: &dyn Adapter,
    dir: &str,
    spec: &FilterSpec,
    expanded: &mut HashSet<String>,
    out: &mut Vec<ListedEntry>,
) -> VfsResult<()> {
    for raw in adapter.list(dir)? {
        let entry = ListedEntry {
            path: path::join(dir, &raw.name),
            name: raw.name,
            kind: raw.kind,
            is_link: raw.is_link,
        };
        let descend = spec.should_expand(&entry) && expanded.insert(entry.path.clone());
        let child_dir = descend.then(|| entry.path.clone());

        if spec.accepts(&entry) {
            out.push(entry);
        }
        if let Some(child_dir) = child_dir {
            walk(adapter, &child_dir, spec, expanded, out)?;
        }
    }
    Ok(())
}
