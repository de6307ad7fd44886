//! Virtual path normalization.
//!
//! Every path that crosses the composition layer goes through [`normalize`]
//! first. The result uses `/` separators, contains no `.` or `..` segments
//! and no empty segments, starts with `/` (or a preserved drive prefix such
//! as `C:/`) and only ends with `/` when it is the root itself.

/// The root path.
pub const ROOT: &str = "/";

/// Normalize a virtual path.
///
/// `..` at the root is dropped rather than rejected, so the result always
/// stays inside the namespace.
pub fn normalize(path: &str) -> String {
    let path = path.replace('\\', "/");
    let (prefix, rest) = split_drive(&path);

    let mut segments: Vec<&str> = Vec::new();
    for segment in rest.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                segments.pop();
            }
            s => segments.push(s),
        }
    }

    let mut out = String::with_capacity(path.len() + 1);
    out.push_str(prefix);
    out.push('/');
    out.push_str(&segments.join("/"));
    out
}

/// Split off a leading drive letter (`C:`), if any.
fn split_drive(path: &str) -> (&str, &str) {
    let bytes = path.as_bytes();
    if bytes.len() >= 2 && bytes[0].is_ascii_alphabetic() && bytes[1] == b':' {
        path.split_at(2)
    } else {
        ("", path)
    }
}

/// True if `path` denotes a root (`/` or `C:/`).
pub fn is_root(path: &str) -> bool {
    let (_, rest) = split_drive(path);
    rest == "/" || rest.is_empty()
}

/// Parent of a normalized path. The root is its own parent.
pub fn parent(path: &str) -> String {
    if is_root(path) {
        return path.to_string();
    }
    match path.rfind('/') {
        Some(idx) => {
            let (prefix, _) = split_drive(path);
            if idx <= prefix.len() {
                format!("{prefix}/")
            } else {
                path[..idx].to_string()
            }
        }
        None => ROOT.to_string(),
    }
}

/// Final segment of a normalized path; empty for the root.
pub fn file_name(path: &str) -> &str {
    if is_root(path) {
        return "";
    }
    path.rsplit('/').next().unwrap_or("")
}

/// Join a relative segment (or sub-path) onto a normalized base and normalize.
pub fn join(base: &str, child: &str) -> String {
    normalize(&format!("{base}/{child}"))
}

/// Iterate over `path` and its ancestors, most specific first, ending at the root.
pub fn ancestors(path: &str) -> impl Iterator<Item = String> + use<> {
    let mut next = Some(path.to_string());
    std::iter::from_fn(move || {
        let current = next.take()?;
        if !is_root(&current) {
            next = Some(parent(&current));
        }
        Some(current)
    })
}

/// True if `path` equals `prefix` or lies beneath it.
pub fn is_within(path: &str, prefix: &str) -> bool {
    if is_root(prefix) {
        return true;
    }
    path == prefix
        || (path.len() > prefix.len()
            && path.starts_with(prefix)
            && path.as_bytes()[prefix.len()] == b'/')
}

/// Path of `path` relative to `prefix`, as an absolute path (`/` if equal).
///
/// Callers must ensure `is_within(path, prefix)`.
pub fn strip_prefix(path: &str, prefix: &str) -> String {
    if is_root(prefix) {
        return path.to_string();
    }
    let rest = &path[prefix.len()..];
    if rest.is_empty() {
        ROOT.to_string()
    } else {
        rest.to_string()
    }
}

/// The segment directly below `dir` on the way to `descendant`, if
/// `descendant` lies strictly beneath `dir`.
pub fn next_segment<'a>(dir: &str, descendant: &'a str) -> Option<&'a str> {
    if descendant == dir || !is_within(descendant, dir) {
        return None;
    }
    let rest = if is_root(dir) {
        descendant.trim_start_matches('/')
    } else {
        &descendant[dir.len() + 1..]
    };
    rest.split('/').next().filter(|s| !s.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_basic() {
        assert_eq!(normalize("/a/b/c"), "/a/b/c");
        assert_eq!(normalize("a/b"), "/a/b");
        assert_eq!(normalize(""), "/");
        assert_eq!(normalize("/"), "/");
        assert_eq!(normalize("//a///b//"), "/a/b");
    }

    #[test]
    fn test_normalize_dots() {
        assert_eq!(normalize("/a/./b/../c"), "/a/c");
        assert_eq!(normalize("/../../a"), "/a");
        assert_eq!(normalize("/a/b/../.."), "/");
        assert_eq!(normalize("./x"), "/x");
    }

    #[test]
    fn test_normalize_backslashes_and_drive() {
        assert_eq!(normalize("a\\b\\c"), "/a/b/c");
        assert_eq!(normalize("C:\\Users\\..\\tmp"), "C:/tmp");
        assert_eq!(normalize("C:"), "C:/");
        assert_eq!(normalize("d:/x/"), "d:/x");
    }

    #[test]
    fn test_normalize_idempotent() {
        for p in ["", "/", "a/../b", "C:\\a\\.\\b", "//x//y/..", "/srv/x.txt", "..", "a/b/c/"] {
            let once = normalize(p);
            assert_eq!(normalize(&once), once, "not idempotent for {p:?}");
        }
    }

    #[test]
    fn test_parent_and_name() {
        assert_eq!(parent("/a/b"), "/a");
        assert_eq!(parent("/a"), "/");
        assert_eq!(parent("/"), "/");
        assert_eq!(parent("C:/x"), "C:/");
        assert_eq!(file_name("/a/b.txt"), "b.txt");
        assert_eq!(file_name("/"), "");
    }

    #[test]
    fn test_ancestors() {
        let all: Vec<_> = ancestors("/a/b/c").collect();
        assert_eq!(all, vec!["/a/b/c", "/a/b", "/a", "/"]);
        let root: Vec<_> = ancestors("/").collect();
        assert_eq!(root, vec!["/"]);
    }

    #[test]
    fn test_within_and_strip() {
        assert!(is_within("/a/b", "/a"));
        assert!(is_within("/a", "/a"));
        assert!(!is_within("/ab", "/a"));
        assert!(is_within("/anything", "/"));
        assert_eq!(strip_prefix("/a/b/c", "/a/b"), "/c");
        assert_eq!(strip_prefix("/a/b", "/a/b"), "/");
        assert_eq!(strip_prefix("/x", "/"), "/x");
    }

    #[test]
    fn test_next_segment() {
        assert_eq!(next_segment("/", "/mnt/a"), Some("mnt"));
        assert_eq!(next_segment("/mnt", "/mnt/a/b"), Some("a"));
        assert_eq!(next_segment("/mnt", "/mnt"), None);
        assert_eq!(next_segment("/mnt", "/other"), None);
    }
}
