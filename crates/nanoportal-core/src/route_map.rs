//! Explicit path maps consulted before positional decomposition.
//!
//! A map rewrites a request path into another path, which is then routed
//! as if it had been requested directly:
//!
//! ```rust
//! use nanoportal_core::RouteMap;
//!
//! let mut map = RouteMap::new();
//! map.map("show/*", "/foo/bar/*");
//! map.map("about", "/pages/show/about");
//!
//! assert_eq!(map.apply("show/456").as_deref(), Some("foo/bar/456"));
//! assert_eq!(map.apply("about").as_deref(), Some("pages/show/about"));
//! assert_eq!(map.apply("contact"), None);
//! ```

use crate::request::normalize_path;

/// One registered `pattern -> target` rewrite.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MapEntry {
    /// Path template; a trailing `*` segment matches any remainder
    pub pattern: String,
    /// Replacement; `*` is filled with the captured remainder
    pub target: String,
}

impl MapEntry {
    fn new(pattern: &str, target: &str) -> Self {
        Self {
            pattern: normalize_path(pattern),
            target: target.to_string(),
        }
    }

    /// Literal prefix of a wildcard pattern, or `None` for exact patterns
    fn wildcard_prefix(&self) -> Option<&str> {
        if self.pattern == "*" {
            return Some("");
        }
        self.pattern.strip_suffix("/*")
    }

    /// Match `path` and return the rewritten path.
    fn rewrite(&self, path: &str) -> Option<String> {
        match self.wildcard_prefix() {
            Some("") => Some(self.substitute(path)),
            Some(prefix) => {
                if path == prefix {
                    Some(self.substitute(""))
                } else {
                    let rest = path.strip_prefix(prefix)?.strip_prefix('/')?;
                    Some(self.substitute(rest))
                }
            }
            None if self.pattern == path => Some(normalize_path(&self.target)),
            None => None,
        }
    }

    fn substitute(&self, capture: &str) -> String {
        normalize_path(&self.target.replace('*', capture))
    }
}

/// Ordered list of explicit maps. First registered match wins.
#[derive(Debug, Clone, Default)]
pub struct RouteMap {
    entries: Vec<MapEntry>,
}

impl RouteMap {
    /// Create an empty map
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a rewrite. Surrounding slashes on the pattern are ignored.
    pub fn map(&mut self, pattern: &str, target: &str) {
        self.entries.push(MapEntry::new(pattern, target));
    }

    /// Rewrite a normalized path using the first matching entry.
    pub fn apply(&self, path: &str) -> Option<String> {
        self.entries.iter().find_map(|entry| entry.rewrite(path))
    }

    /// Like [`apply`](Self::apply), skipping entries whose index is in
    /// `fired`. Returns the index of the entry used.
    pub(crate) fn apply_unfired(&self, path: &str, fired: &[usize]) -> Option<(usize, String)> {
        self.entries
            .iter()
            .enumerate()
            .filter(|(index, _)| !fired.contains(index))
            .find_map(|(index, entry)| entry.rewrite(path).map(|rewritten| (index, rewritten)))
    }

    /// Registered entries in order
    pub fn entries(&self) -> &[MapEntry] {
        &self.entries
    }

    /// Number of registered entries
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True if nothing is registered
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exact_match() {
        let mut map = RouteMap::new();
        map.map("/about/", "/pages/about");

        assert_eq!(map.apply("about").as_deref(), Some("pages/about"));
        assert_eq!(map.apply("about/us"), None);
        assert_eq!(map.apply("abouts"), None);
    }

    #[test]
    fn test_wildcard_keeps_remainder_as_one_capture() {
        let mut map = RouteMap::new();
        map.map("show/*", "/foo/bar/*");

        assert_eq!(map.apply("show/456").as_deref(), Some("foo/bar/456"));
        assert_eq!(map.apply("show/4/5/6").as_deref(), Some("foo/bar/4/5/6"));
        assert_eq!(map.apply("show").as_deref(), Some("foo/bar"));
        assert_eq!(map.apply("shows/1"), None);
    }

    #[test]
    fn test_first_registered_wins() {
        let mut map = RouteMap::new();
        map.map("blog/*", "/first/*");
        map.map("blog/latest", "/second");

        assert_eq!(map.apply("blog/latest").as_deref(), Some("first/latest"));
    }

    #[test]
    fn test_catch_all() {
        let mut map = RouteMap::new();
        map.map("*", "/static/serve/*");

        assert_eq!(map.apply("css/site.css").as_deref(), Some("static/serve/css/site.css"));
        assert_eq!(map.apply("").as_deref(), Some("static/serve"));
    }

    #[test]
    fn test_apply_unfired_skips_used_entries() {
        let mut map = RouteMap::new();
        map.map("*", "/static/serve/*");
        map.map("static/*", "/assets/*");

        let (first, path) = map.apply_unfired("a.css", &[]).unwrap();
        assert_eq!((first, path.as_str()), (0, "static/serve/a.css"));
        let (second, path) = map.apply_unfired(&path, &[first]).unwrap();
        assert_eq!((second, path.as_str()), (1, "assets/serve/a.css"));
        assert_eq!(map.apply_unfired(&path, &[first, second]), None);
    }

    #[test]
    fn test_map_is_case_sensitive() {
        let mut map = RouteMap::new();
        map.map("Show/*", "/foo/bar/*");
        assert_eq!(map.apply("show/1"), None);
    }

    #[test]
    fn test_entries_preserve_order() {
        let mut map = RouteMap::new();
        assert!(map.is_empty());
        map.map("a", "/b");
        map.map("c/*", "/d/*");
        assert_eq!(map.len(), 2);
        assert_eq!(map.entries()[1].pattern, "c/*");
    }
}
