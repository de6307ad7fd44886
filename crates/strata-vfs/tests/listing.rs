//! Integration tests for the listing filter pipeline.
//!
//! The same tree is served from memory and from local disk, and each
//! filter must give the same answer on both.

use std::sync::Arc;

use strata_vfs::vfs::{Adapter, FilterArg, LocalBackend, MemoryBackend};
use strata_vfs::{Filesystem, ListFilter, ListFlags, ListedEntry, VfsError};

// ============================================================================
// Shared test setup
// ============================================================================

/// ```text
/// /d/
///   a.txt
///   b.log
///   .hidden
///   x/
///     y/z.txt
///     w.txt
///   q/
///     z.txt
///   link.txt -> a.txt
/// ```
fn populate(adapter: &dyn Adapter) {
    adapter.create_directory("/d/x/y", true).unwrap();
    adapter.create_directory("/d/q", false).unwrap();
    for file in ["/d/a.txt", "/d/b.log", "/d/.hidden", "/d/x/y/z.txt", "/d/x/w.txt", "/d/q/z.txt"] {
        adapter.write(file, file.as_bytes(), true).unwrap();
    }
    adapter.symlink("/d/link.txt", "a.txt").unwrap();
}

fn memory_fs() -> Filesystem {
    let memory = MemoryBackend::new();
    populate(&memory);
    Filesystem::new(memory)
}

fn local_fs() -> (tempfile::TempDir, Filesystem) {
    let dir = tempfile::tempdir().unwrap();
    let local = LocalBackend::new(dir.path());
    populate(&local);
    (dir, Filesystem::new(local))
}

fn paths(fs: &Filesystem, filter: impl Into<ListFilter>) -> Vec<String> {
    let mut out: Vec<String> = fs
        .path("/d")
        .entries(filter)
        .unwrap()
        .into_iter()
        .map(|e| e.path)
        .collect();
    out.sort();
    out
}

fn on_both(check: impl Fn(&Filesystem)) {
    check(&memory_fs());
    let (_dir, local) = local_fs();
    check(&local);
}

// ============================================================================
// Defaults
// ============================================================================

#[test]
fn test_default_lists_immediate_children_without_dots() {
    on_both(|fs| {
        assert_eq!(
            paths(fs, ListFilter::new()),
            vec!["/d/.hidden", "/d/a.txt", "/d/b.log", "/d/link.txt", "/d/q", "/d/x"]
        );
    });
}

#[test]
fn test_all_adds_self_references() {
    on_both(|fs| {
        let entries = fs.path("/d").entries(ListFlags::ALL).unwrap();
        assert_eq!(entries[0].name, ".");
        assert_eq!(entries[0].path, "/d");
        assert_eq!(entries[1].name, "..");
        assert_eq!(entries[1].path, "/");
        assert_eq!(entries.len(), 8);

        let dirs = fs
            .path("/d")
            .entries(ListFlags::ALL | ListFlags::DIRECTORIES | ListFlags::VISIBLE)
            .unwrap();
        let names: Vec<&str> = dirs.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, vec![".", "..", "q", "x"]);
    });
}

// ============================================================================
// Flag groups
// ============================================================================

#[test]
fn test_visibility_group() {
    on_both(|fs| {
        assert_eq!(paths(fs, ListFlags::HIDDEN), vec!["/d/.hidden"]);
        assert!(!paths(fs, ListFlags::VISIBLE).contains(&"/d/.hidden".to_string()));
        assert_eq!(
            paths(fs, ListFlags::HIDDEN | ListFlags::VISIBLE),
            paths(fs, ListFilter::new())
        );
    });
}

#[test]
fn test_kind_and_link_groups() {
    on_both(|fs| {
        assert_eq!(paths(fs, ListFlags::DIRECTORIES), vec!["/d/q", "/d/x"]);
        assert_eq!(paths(fs, ListFlags::LINKS), vec!["/d/link.txt"]);
        assert_eq!(
            paths(fs, ListFlags::FILES | ListFlags::OPAQUE | ListFlags::VISIBLE),
            vec!["/d/a.txt", "/d/b.log"]
        );

        let link = fs.path("/d").entries(ListFlags::LINKS).unwrap().remove(0);
        assert!(link.is_file());
        assert!(link.is_link);
    });
}

#[test]
fn test_criteria_are_anded() {
    on_both(|fs| {
        let filter = ListFilter::new()
            .flags(ListFlags::FILES)
            .glob("*.txt")
            .predicate(|e: &ListedEntry| !e.is_link);
        assert_eq!(paths(fs, filter), vec!["/d/a.txt"]);

        let nothing = ListFilter::new().glob("*.txt").glob("*.log");
        assert!(paths(fs, nothing).is_empty());
    });
}

// ============================================================================
// Recursion and globs
// ============================================================================

#[test]
fn test_recursive_pre_order() {
    on_both(|fs| {
        let entries = fs
            .path("/d")
            .entries(ListFilter::new().recursive().flags(ListFlags::VISIBLE))
            .unwrap();
        let ordered: Vec<&str> = entries.iter().map(|e| e.path.as_str()).collect();

        let x = ordered.iter().position(|p| *p == "/d/x").unwrap();
        let y = ordered.iter().position(|p| *p == "/d/x/y").unwrap();
        let z = ordered.iter().position(|p| *p == "/d/x/y/z.txt").unwrap();
        assert!(x < y && y < z);
        assert_eq!(entries.len(), 9);
    });
}

#[test]
fn test_glob_prefix_descends_only_where_needed() {
    on_both(|fs| {
        assert_eq!(paths(fs, "x/*/z.txt"), vec!["/d/x/y/z.txt"]);
        assert_eq!(paths(fs, "*/z.txt"), vec!["/d/q/z.txt"]);
        assert_eq!(paths(fs, "**/z.txt"), vec!["/d/q/z.txt", "/d/x/y/z.txt"]);
        assert_eq!(
            paths(fs, ListFilter::new().recursive().glob("**/z.txt")),
            paths(fs, "**/z.txt")
        );
    });
}

#[test]
fn test_recursive_does_not_follow_directory_links() {
    let memory = MemoryBackend::new();
    populate(&memory);
    memory.symlink("/d/x/back", "/d").unwrap();
    let fs = Filesystem::new(memory);

    let entries = fs.path("/d").entries(ListFilter::new().recursive()).unwrap();
    let back = entries.iter().find(|e| e.path == "/d/x/back").unwrap();
    assert!(back.is_dir() && back.is_link);
    assert!(!entries.iter().any(|e| e.path.starts_with("/d/x/back/")));
}

// ============================================================================
// Argument mixing
// ============================================================================

#[test]
fn test_mixed_arguments() {
    on_both(|fs| {
        let args: Vec<FilterArg> = vec![
            ListFlags::FILES.into(),
            vec![FilterArg::from("*.txt"), ListFlags::OPAQUE.into()].into(),
            FilterArg::predicate(|e| e.name.starts_with('a')),
        ];
        assert_eq!(paths(fs, args), vec!["/d/a.txt"]);
    });
}

#[test]
fn test_invalid_filters_are_usage_faults() {
    let fs = memory_fs();
    assert!(matches!(
        fs.path("/d").entries(ListFlags(1 << 20)),
        Err(VfsError::InvalidFilter(_))
    ));
    assert!(matches!(
        fs.path("/d").entries(""),
        Err(VfsError::InvalidFilter(_))
    ));
    assert!(matches!(
        fs.path("/d/a.txt").entries(ListFilter::new()),
        Err(VfsError::NotADirectory(_))
    ));
}

// ============================================================================
// Mounts
// ============================================================================

#[test]
fn test_filters_apply_across_mounts() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter("strata_vfs=trace")
        .with_test_writer()
        .try_init();

    let fs = Filesystem::mounted();
    let memory: Arc<dyn Adapter> = Arc::new(MemoryBackend::new());
    populate(&*memory);
    fs.mount_arc("/", memory).unwrap();

    let (_dir, disk) = local_fs();
    let disk_root: Arc<dyn Adapter> = disk.root().clone();
    fs.mount_arc("/d/x/mnt", disk_root).unwrap();

    let found: Vec<String> = fs
        .path("/d")
        .entries(ListFilter::new().recursive().glob("**/z.txt"))
        .unwrap()
        .into_iter()
        .map(|e| e.path)
        .collect();
    assert!(found.contains(&"/d/x/mnt/d/x/y/z.txt".to_string()));
    assert!(found.contains(&"/d/q/z.txt".to_string()));

    let dirs = fs.path("/d/x").ls(ListFlags::DIRECTORIES).unwrap();
    let names: Vec<&str> = dirs.iter().map(|p| p.name()).collect();
    assert_eq!(names, vec!["mnt", "y"]);
}
