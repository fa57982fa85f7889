//! The client-side stat cache.
//!
//! A tree mirroring the server namespace: each node is a directory that,
//! once explicitly listed, maps child names to their attributes. Mutating
//! operations invalidate the affected node so a stale entry never survives
//! past the operation that changed it.

use std::collections::HashMap;

use crate::wire::Attrs;

#[derive(Debug, Default)]
struct Node {
    /// Present once the directory has been `readdir`'d in full; absent for
    /// directories we've only ever stat'd individually (spec invariant (b):
    /// "reads may return cached attributes only when the enclosing
    /// directory was explicitly listed").
    children: Option<HashMap<String, Attrs>>,
}

/// A directory-tree cache of attributes, keyed by canonical path.
#[derive(Debug, Default)]
pub(crate) struct StatCache {
    nodes: HashMap<String, Node>,
}

fn split_parent(path: &str) -> (&str, &str) {
    match path.trim_end_matches('/').rfind('/') {
        Some(0) => ("/", &path[1..]),
        Some(idx) => (&path[..idx], &path[idx + 1..]),
        None => ("", path),
    }
}

impl StatCache {
    /// Look up a cached attribute record for `path`, only returning `Some`
    /// when its parent directory was explicitly listed.
    pub(crate) fn get(&self, path: &str) -> Option<&Attrs> {
        let (parent, name) = split_parent(path);

        self.nodes
            .get(parent)
            .and_then(|node| node.children.as_ref())
            .and_then(|children| children.get(name))
    }

    /// Record the full listing of `dir`, replacing any prior listing.
    pub(crate) fn populate(&mut self, dir: &str, entries: impl IntoIterator<Item = (String, Attrs)>) {
        let node = self.nodes.entry(dir.to_string()).or_default();
        node.children = Some(entries.into_iter().collect());
    }

    /// Insert or refresh a single cached attribute, without marking the
    /// parent as "fully listed".
    pub(crate) fn insert_unlisted(&mut self, path: &str, attrs: Attrs) {
        let (parent, name) = split_parent(path);
        let node = self.nodes.entry(parent.to_string()).or_default();

        if let Some(children) = &mut node.children {
            children.insert(name.to_string(), attrs);
        }
    }

    /// Invalidate `path` — removes its entry from its parent's listing and
    /// drops any listing cached under `path` itself (it may have been a
    /// directory).
    pub(crate) fn invalidate(&mut self, path: &str) {
        let (parent, name) = split_parent(path);

        if let Some(node) = self.nodes.get_mut(parent) {
            if let Some(children) = &mut node.children {
                children.remove(name);
            }
        }

        self.nodes.remove(path);
    }

    /// Invalidate both `old` and `new` paths of a `rename`.
    pub(crate) fn invalidate_pair(&mut self, old: &str, new: &str) {
        self.invalidate(old);
        self.invalidate(new);
    }

    /// Convert a node found to have become a directory in-place (spec:
    /// "if a file is found to have become a directory, the node is
    /// converted"): simply drop any stale file-shaped bookkeeping by
    /// invalidating, the next `readdir`/`stat` repopulates it correctly.
    pub(crate) fn convert_to_directory(&mut self, path: &str) {
        self.invalidate(path);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cache_hit_requires_directory_listing() {
        let mut cache = StatCache::default();

        assert!(cache.get("/tmp/a").is_none());

        cache.populate("/tmp", [("a".to_string(), Attrs::default())]);

        assert!(cache.get("/tmp/a").is_some());
        assert!(cache.get("/tmp/b").is_none());
    }

    #[test]
    fn invalidate_removes_from_parent_listing() {
        let mut cache = StatCache::default();
        cache.populate("/tmp", [("a".to_string(), Attrs::default())]);

        cache.invalidate("/tmp/a");

        assert!(cache.get("/tmp/a").is_none());
    }

    #[test]
    fn split_parent_handles_root_children() {
        assert_eq!(split_parent("/a"), ("/", "a"));
        assert_eq!(split_parent("/a/b"), ("/a", "b"));
    }
}
