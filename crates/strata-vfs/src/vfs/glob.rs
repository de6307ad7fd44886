//! Glob patterns over virtual paths.
//!
//! Patterns are matched against whole normalized paths. `*` and `?` stay
//! within one segment, `**` spans any number of segments, `[abc]`/`[!abc]`
//! are character classes and `{a,b}` is alternation.

use globset::{GlobBuilder, GlobMatcher};

use super::error::{VfsError, VfsResult};
use super::path;

/// A compiled glob.
#[derive(Debug, Clone)]
pub struct Glob {
    pattern: String,
    matcher: GlobMatcher,
}

impl Glob {
    /// Compile a pattern as given.
    pub fn new(pattern: &str) -> VfsResult<Self> {
        if pattern.is_empty() {
            return Err(VfsError::invalid_filter("empty glob pattern"));
        }
        let matcher = GlobBuilder::new(pattern)
            .literal_separator(true)
            .backslash_escape(true)
            .build()
            .map_err(|e| VfsError::invalid_filter(format!("glob {pattern:?}: {e}")))?
            .compile_matcher();
        Ok(Self {
            pattern: pattern.to_string(),
            matcher,
        })
    }

    /// Compile a pattern relative to `dir`. Absolute patterns are kept as-is.
    pub fn anchored(pattern: &str, dir: &str) -> VfsResult<Self> {
        if pattern.is_empty() {
            return Err(VfsError::invalid_filter("empty glob pattern"));
        }
        if pattern.starts_with('/') {
            Self::new(&path::normalize(pattern))
        } else {
            Self::new(&path::join(dir, pattern))
        }
    }

    /// The pattern text.
    pub fn as_str(&self) -> &str {
        &self.pattern
    }

    /// True if the whole path matches.
    pub fn is_match(&self, path: &str) -> bool {
        self.matcher.is_match(path)
    }

    /// Patterns for the directories between `dir` and this glob's leaves.
    ///
    /// For `/d/x/*/z.txt` listed from `/d` these are `/d/x` and `/d/x/*`:
    /// a directory matching one of them may contain a match further down.
    pub fn prefixes(&self, dir: &str) -> VfsResult<Vec<Glob>> {
        if self.pattern == dir || !path::is_within(&self.pattern, dir) {
            return Ok(Vec::new());
        }
        let rest = if path::is_root(dir) {
            self.pattern.trim_start_matches('/')
        } else {
            &self.pattern[dir.len() + 1..]
        };

        let segments = split_segments(rest);
        let mut prefixes = Vec::with_capacity(segments.len().saturating_sub(1));
        for depth in 1..segments.len() {
            let partial = segments[..depth].join("/");
            prefixes.push(Glob::new(&path::join(dir, &partial))?);
        }
        Ok(prefixes)
    }
}

/// Split on `/` outside of `[...]` and `{...}`.
fn split_segments(pattern: &str) -> Vec<&str> {
    let mut segments = Vec::new();
    let mut braces = 0usize;
    let mut in_class = false;
    let mut start = 0;

    for (idx, c) in pattern.char_indices() {
        match c {
            '[' if !in_class => in_class = true,
            ']' if in_class => in_class = false,
            '{' if !in_class => braces += 1,
            '}' if !in_class && braces > 0 => braces -= 1,
            '/' if !in_class && braces == 0 => {
                segments.push(&pattern[start..idx]);
                start = idx + 1;
            }
            _ => {}
        }
    }
    segments.push(&pattern[start..]);
    segments.retain(|s| !s.is_empty());
    segments
}

#[cfg(test)]
mod tests {
    use super::*;

    fn matches(pattern: &str, path: &str) -> bool {
        Glob::new(pattern).unwrap().is_match(path)
    }

    #[test]
    fn test_star_stays_in_segment() {
        assert!(matches("/d/*.txt", "/d/a.txt"));
        assert!(!matches("/d/*.txt", "/d/x/a.txt"));
        assert!(!matches("/d/*.txt", "/d/a.log"));
        assert!(matches("/d/?.txt", "/d/a.txt"));
        assert!(!matches("/d/?.txt", "/d/ab.txt"));
    }

    #[test]
    fn test_double_star() {
        assert!(matches("/d/**/*.rs", "/d/main.rs"));
        assert!(matches("/d/**/*.rs", "/d/src/vfs/mod.rs"));
        assert!(matches("/d/**", "/d/any/depth"));
        assert!(!matches("/d/**/*.rs", "/e/main.rs"));
    }

    #[test]
    fn test_classes_and_alternation() {
        assert!(matches("/[abc].txt", "/b.txt"));
        assert!(!matches("/[!abc].txt", "/b.txt"));
        assert!(matches("/[!abc].txt", "/z.txt"));
        assert!(matches("/*.{txt,log}", "/a.log"));
        assert!(!matches("/*.{txt,log}", "/a.md"));
        assert!(matches("/a+b.txt", "/a+b.txt"));
    }

    #[test]
    fn test_invalid_patterns() {
        assert!(matches!(Glob::new(""), Err(VfsError::InvalidFilter(_))));
        assert!(matches!(Glob::new("/[abc"), Err(VfsError::InvalidFilter(_))));
        assert!(matches!(Glob::new("/{a,b"), Err(VfsError::InvalidFilter(_))));
    }

    #[test]
    fn test_anchored() {
        let glob = Glob::anchored("*.txt", "/srv").unwrap();
        assert_eq!(glob.as_str(), "/srv/*.txt");
        assert!(glob.is_match("/srv/x.txt"));

        let glob = Glob::anchored("/etc/*.conf", "/srv").unwrap();
        assert_eq!(glob.as_str(), "/etc/*.conf");
    }

    #[test]
    fn test_prefixes() {
        let glob = Glob::anchored("x/*/z.txt", "/d").unwrap();
        let prefixes: Vec<_> = glob
            .prefixes("/d")
            .unwrap()
            .iter()
            .map(|g| g.as_str().to_string())
            .collect();
        assert_eq!(prefixes, vec!["/d/x", "/d/x/*"]);

        let root = Glob::anchored("x/*/z.txt", "/").unwrap();
        assert_eq!(root.prefixes("/").unwrap().len(), 2);

        let flat = Glob::anchored("*.txt", "/d").unwrap();
        assert!(flat.prefixes("/d").unwrap().is_empty());

        let elsewhere = Glob::new("/e/x/y").unwrap();
        assert!(elsewhere.prefixes("/d").unwrap().is_empty());
    }

    #[test]
    fn test_split_respects_groups() {
        assert_eq!(split_segments("a/{b/c,d}/e"), vec!["a", "{b/c,d}", "e"]);
        assert_eq!(split_segments("a/[/]/e"), vec!["a", "[/]", "e"]);
    }
}
