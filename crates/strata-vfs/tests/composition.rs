//! Integration tests for mount composition through the facade.
//!
//! Every test goes through [`Filesystem`] and [`Pathname`], so the root
//! adapter, mount table and virtual directories all see each call.

use std::sync::Arc;

use strata_vfs::vfs::{
    Adapter, AggregateAdapter, CachedAdapter, CopyOptions, HighestPriority, LocalBackend,
    MemoryBackend, MountInfo, TempBackend, path,
};
use strata_vfs::{Filesystem, ListFilter, ListFlags, VfsError};

// ============================================================================
// Shared test setup
// ============================================================================

fn memory_with(files: &[(&str, &str)]) -> Arc<dyn Adapter> {
    let memory = MemoryBackend::new();
    for (path, data) in files {
        memory.create_file(path, true).unwrap();
        memory.write(path, data.as_bytes(), false).unwrap();
    }
    Arc::new(memory)
}

fn names(fs: &Filesystem, dir: &str, filter: impl Into<ListFilter>) -> Vec<String> {
    fs.path(dir)
        .ls(filter)
        .unwrap()
        .iter()
        .map(|p| p.name().to_string())
        .collect()
}

// ============================================================================
// Paths
// ============================================================================

#[test]
fn test_normalization_is_idempotent() {
    for raw in ["", "/", "a/b", "//a//b/", "/a/./b/../c", "/../..", "a/b/../../.."] {
        let once = path::normalize(raw);
        assert_eq!(path::normalize(&once), once, "normalizing {raw:?}");
        assert!(once.starts_with('/'));
        assert!(once == "/" || !once.ends_with('/'));
    }
}

#[test]
fn test_pathname_equality_uses_normalized_path() {
    let fs = Filesystem::new(MemoryBackend::new());
    assert_eq!(fs.path("/a/b/"), fs.path("a//./b"));
    assert_eq!(fs.path("/a/b").to_string(), "/a/b");
}

// ============================================================================
// Resolution
// ============================================================================

#[test]
fn test_longest_prefix_wins() {
    let fs = Filesystem::mounted();
    let outer = memory_with(&[("/b/x", "outer")]);
    let inner = memory_with(&[("/x", "inner")]);
    fs.mount_arc("/a", Arc::clone(&outer)).unwrap();
    fs.mount_arc("/a/b", Arc::clone(&inner)).unwrap();

    let p = fs.path("/a/b/x");
    assert!(Arc::ptr_eq(&p.local_adapter().unwrap(), &inner));
    assert_eq!(p.local().unwrap(), "/x");
    assert_eq!(p.contents().unwrap(), b"inner");

    let q = fs.path("/a/bx");
    assert!(Arc::ptr_eq(&q.local_adapter().unwrap(), &outer));
    assert_eq!(q.local().unwrap(), "/bx");
}

#[test]
fn test_unmount_restores_outer_mount() {
    let fs = Filesystem::mounted();
    fs.mount_arc("/a", memory_with(&[("/b/x", "outer")])).unwrap();
    fs.mount_arc("/a/b", memory_with(&[("/x", "inner")])).unwrap();
    assert_eq!(fs.path("/a/b/x").contents().unwrap(), b"inner");

    assert!(fs.unmount("/a/b").unwrap());
    assert_eq!(fs.path("/a/b/x").contents().unwrap(), b"outer");
}

#[test]
fn test_mount_unmount_round_trip() {
    let fs = Filesystem::mounted();
    fs.mount("/", MemoryBackend::new()).unwrap();
    let before: Vec<MountInfo> = fs.mounts().unwrap();

    fs.mount("/tmp", MemoryBackend::new()).unwrap();
    fs.path("/tmp/scratch").set_contents("s").unwrap();
    assert!(fs.unmount("/tmp").unwrap());

    assert_eq!(fs.mounts().unwrap(), before);
    assert!(!fs.path("/tmp/scratch").exists().unwrap());
}

#[test]
fn test_virtual_directories_emerge() {
    let fs = Filesystem::mounted();
    fs.mount("/a/b/c", MemoryBackend::new()).unwrap();

    assert!(fs.path("/").is_directory().unwrap());
    assert!(fs.path("/a").is_directory().unwrap());
    assert!(fs.path("/a/b").is_directory().unwrap());
    assert_eq!(names(&fs, "/", ListFlags::NONE), vec!["a"]);
    assert_eq!(names(&fs, "/a/b", ListFlags::NONE), vec!["c"]);

    assert!(matches!(fs.path("/a").delete(true), Err(VfsError::ReadOnly(_))));
    assert!(matches!(
        fs.path("/a/new.txt").set_contents("x"),
        Err(VfsError::NoMountPoint(_))
    ));
    assert!(!fs.path("/z").exists().unwrap());
}

#[test]
fn test_errors_name_the_full_path() {
    let fs = Filesystem::mounted();
    fs.mount("/data", MemoryBackend::new()).unwrap();

    match fs.path("/data/missing.txt").contents() {
        Err(VfsError::NotFound(p)) => assert_eq!(p, "/data/missing.txt"),
        other => panic!("expected NotFound, got {other:?}"),
    }
    match fs.path("/elsewhere/file").contents() {
        Err(VfsError::NoMountPoint(p)) => assert_eq!(p, "/elsewhere/file"),
        other => panic!("expected NoMountPoint, got {other:?}"),
    }
}

// ============================================================================
// End to end
// ============================================================================

#[test]
fn test_nested_mount_listing_end_to_end() {
    let fs = Filesystem::mounted();
    let m1 = memory_with(&[("/readme.md", "root"), ("/etc/hosts", "localhost")]);
    let m2 = memory_with(&[("/x.txt", "served"), ("/sub/y.txt", "deeper")]);
    fs.mount_arc("/", Arc::clone(&m1)).unwrap();
    fs.mount_arc("/srv", Arc::clone(&m2)).unwrap();

    assert_eq!(names(&fs, "/srv", ListFlags::FILES), vec!["x.txt"]);

    let dirs = fs.path("/").ls(ListFlags::DIRECTORIES).unwrap();
    let srv = dirs.iter().find(|p| p.name() == "srv").unwrap();
    assert!(Arc::ptr_eq(&srv.local_adapter().unwrap(), &m2));
    assert_eq!(srv.local().unwrap(), "/");
    assert!(dirs.iter().any(|p| p.name() == "etc"));

    let all: Vec<String> = fs
        .path("/")
        .entries(ListFilter::new().recursive().flags(ListFlags::FILES))
        .unwrap()
        .into_iter()
        .map(|e| e.path)
        .collect();
    assert!(all.contains(&"/srv/sub/y.txt".to_string()));
    assert!(all.contains(&"/etc/hosts".to_string()));
}

#[test]
fn test_cross_mount_copy_and_move() {
    let fs = Filesystem::mounted();
    fs.mount("/mem", MemoryBackend::new()).unwrap();
    let temp = TempBackend::create().unwrap();
    let host = temp.path().to_path_buf();
    fs.mount("/disk", temp).unwrap();

    let src = fs.path("/mem/project");
    src.child("src").create_directory(true).unwrap();
    src.child("src/main.rs").set_contents("fn main() {}").unwrap();

    src.copy_to(&fs.path("/disk/copy"), CopyOptions::new().recursive())
        .unwrap();
    assert_eq!(
        std::fs::read_to_string(host.join("copy/src/main.rs")).unwrap(),
        "fn main() {}"
    );

    src.move_to(&fs.path("/disk/moved"), CopyOptions::new()).unwrap();
    assert!(!src.exists().unwrap());
    assert!(fs.path("/disk/moved/src/main.rs").is_file().unwrap());

    let real = fs.path("/disk/moved").real_path().unwrap().unwrap();
    assert!(real.ends_with("moved"));
}

fn tree(fs: &Filesystem, dir: &str) -> Vec<String> {
    let mut paths: Vec<String> = fs
        .path(dir)
        .entries(ListFilter::new().recursive())
        .unwrap()
        .into_iter()
        .map(|e| e.path)
        .collect();
    paths.sort();
    paths
}

#[test]
fn test_copy_carries_nested_mounts() {
    let fs = Filesystem::mounted();
    fs.mount_arc("/data", memory_with(&[("/top.txt", "top")])).unwrap();
    fs.mount_arc("/data/archive", memory_with(&[("/old.txt", "old")])).unwrap();
    fs.mount("/dst", MemoryBackend::new()).unwrap();

    fs.path("/data")
        .copy_to(&fs.path("/dst/c"), CopyOptions::new().recursive())
        .unwrap();
    assert_eq!(
        tree(&fs, "/dst/c"),
        vec!["/dst/c/archive", "/dst/c/archive/old.txt", "/dst/c/top.txt"]
    );
    assert_eq!(fs.path("/dst/c/archive/old.txt").contents().unwrap(), b"old");
}

#[test]
fn test_copy_from_virtual_directory() {
    let fs = Filesystem::mounted();
    fs.mount_arc("/mnt/a", memory_with(&[("/note", "n")])).unwrap();
    fs.mount("/dst", MemoryBackend::new()).unwrap();

    fs.path("/mnt")
        .copy_to(&fs.path("/dst/m"), CopyOptions::new().recursive())
        .unwrap();
    assert_eq!(tree(&fs, "/dst/m"), vec!["/dst/m/a", "/dst/m/a/note"]);
}

#[test]
fn test_move_keeps_mounted_subtrees_in_place() {
    let fs = Filesystem::mounted();
    fs.mount_arc("/data", memory_with(&[("/top.txt", "top")])).unwrap();
    fs.mount_arc("/data/archive", memory_with(&[("/old.txt", "old")])).unwrap();
    fs.mount("/dst", MemoryBackend::new()).unwrap();

    assert!(matches!(
        fs.path("/data").move_to(&fs.path("/dst/m"), CopyOptions::new()),
        Err(VfsError::Unsupported(_))
    ));
    assert!(fs.path("/data/top.txt").exists().unwrap());
    assert!(!fs.path("/dst/m").exists().unwrap());

    assert!(matches!(
        fs.path("/data")
            .copy_to(&fs.path("/data/inner"), CopyOptions::new().recursive()),
        Err(VfsError::InvalidPath(p)) if p == "/data/inner"
    ));
}

#[test]
fn test_read_only_mount() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("keep.txt"), "k").unwrap();

    let fs = Filesystem::mounted();
    fs.mount("/", MemoryBackend::new()).unwrap();
    fs.mount("/ro", LocalBackend::read_only(dir.path())).unwrap();

    assert_eq!(fs.path("/ro/keep.txt").contents().unwrap(), b"k");
    assert!(matches!(
        fs.path("/ro/keep.txt").set_contents("x"),
        Err(VfsError::ReadOnly(_))
    ));
    assert!(fs.mounts().unwrap().iter().any(|m| m.path == "/ro" && m.read_only));
}

#[test]
fn test_aggregate_behind_facade() {
    let aggregate = Arc::new(AggregateAdapter::with_strategy(HighestPriority));
    let low = memory_with(&[("/who", "low")]);
    let high = memory_with(&[("/who", "high")]);
    aggregate.add_adapter_with_priority("/", Arc::clone(&high), 10);
    aggregate.add_adapter_with_priority("/", Arc::clone(&low), 1);

    let root: Arc<dyn Adapter> = aggregate.clone();
    let fs = Filesystem::from_arc(root);
    assert_eq!(fs.path("/who").contents().unwrap(), b"high");
    assert!(Arc::ptr_eq(&fs.path("/who").local_adapter().unwrap(), &high));
}

#[test]
fn test_cached_mount_sees_writes_through_facade() {
    let fs = Filesystem::mounted();
    fs.mount("/c", CachedAdapter::new(MemoryBackend::new())).unwrap();

    let dir = fs.path("/c");
    assert_eq!(dir.count(ListFlags::NONE).unwrap(), 0);
    dir.child("a.txt").set_contents("1").unwrap();
    assert_eq!(dir.count(ListFlags::NONE).unwrap(), 1);
    dir.child("a.txt").delete(false).unwrap();
    assert_eq!(dir.count(ListFlags::NONE).unwrap(), 0);
}
