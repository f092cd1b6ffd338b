//! Persistent, structurally-shared path map used to represent a commit's
//! manifest (the full set of live paths at that point in history).
//!
//! Each path component is a node in a trie; subtrees are reference-counted
//! and never mutated in place, so copying an entire directory (the dumpfile
//! translator's `copy_from` and the fast-import `C`/`R` fileops) is an O(1)
//! pointer clone of the shared subtree rather than an O(files) walk. Mutating
//! a single path clones only the spine from the root down to that path.

use std::collections::BTreeMap;
use std::sync::Arc;

use bstr::{BString, ByteSlice};

#[derive(Debug)]
struct Node<T> {
    /// Present when this node itself names a live file (not just a
    /// directory prefix of other paths).
    leaf: Option<T>,
    children: BTreeMap<BString, Arc<Node<T>>>,
}

impl<T> Node<T> {
    fn empty() -> Self {
        Node { leaf: None, children: BTreeMap::new() }
    }

    fn is_empty(&self) -> bool {
        self.leaf.is_none() && self.children.is_empty()
    }
}

impl<T> Default for Node<T> {
    fn default() -> Self {
        Node::empty()
    }
}

/// A snapshot of the live paths in a manifest, mapping each path to a value
/// `T` (typically a blob reference). Cheap to clone: cloning a `PathMap`
/// just bumps the root `Arc`'s refcount.
#[derive(Debug)]
pub struct PathMap<T> {
    root: Arc<Node<T>>,
}

impl<T> Clone for PathMap<T> {
    fn clone(&self) -> Self {
        PathMap { root: Arc::clone(&self.root) }
    }
}

impl<T> Default for PathMap<T> {
    fn default() -> Self {
        PathMap { root: Arc::new(Node::empty()) }
    }
}

fn split_path(path: &[u8]) -> Vec<&[u8]> {
    path.split(|&b| b == b'/').filter(|c| !c.is_empty()).collect()
}

impl<T: Clone> PathMap<T> {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn get(&self, path: &[u8]) -> Option<&T> {
        let components = split_path(path);
        let mut node = &self.root;
        for comp in &components {
            node = node.children.get(*comp)?;
        }
        node.leaf.as_ref()
    }

    /// Sets the value at `path`, cloning the spine from the root to the
    /// leaf's parent. Sibling subtrees are untouched and shared with the
    /// map this was cloned from.
    pub fn set(&mut self, path: &[u8], value: T) {
        let components = split_path(path);
        Self::set_rec(&mut self.root, &components, value);
    }

    fn set_rec(node: &mut Arc<Node<T>>, components: &[&[u8]], value: T) {
        let node = Arc::make_mut(node);
        match components.split_first() {
            None => node.leaf = Some(value),
            Some((head, rest)) => {
                let child = node
                    .children
                    .entry(BString::from(*head))
                    .or_insert_with(|| Arc::new(Node::empty()));
                Self::set_rec(child, rest, value);
            }
        }
    }

    /// Removes the value at an exact path. No-op if absent.
    pub fn remove(&mut self, path: &[u8]) {
        let components = split_path(path);
        Self::remove_rec(&mut self.root, &components);
    }

    fn remove_rec(node: &mut Arc<Node<T>>, components: &[&[u8]]) {
        match components.split_first() {
            None => {
                let n = Arc::make_mut(node);
                n.leaf = None;
            }
            Some((head, rest)) => {
                let n = Arc::make_mut(node);
                let Some(child) = n.children.get_mut(*head) else { return };
                Self::remove_rec(child, rest);
                if child.is_empty() {
                    n.children.remove(*head);
                }
            }
        }
    }

    /// Removes every path under `prefix` (a whole directory subtree),
    /// equivalent to fast-import's `D <dir>` semantics when `dir` names a
    /// directory rather than a file.
    pub fn remove_subtree(&mut self, prefix: &[u8]) {
        let components = split_path(prefix);
        Self::remove_subtree_rec(&mut self.root, &components);
    }

    fn remove_subtree_rec(node: &mut Arc<Node<T>>, components: &[&[u8]]) {
        match components.split_first() {
            None => {
                let n = Arc::make_mut(node);
                *n = Node::empty();
            }
            Some((head, rest)) => {
                let n = Arc::make_mut(node);
                let Some(child) = n.children.get_mut(*head) else { return };
                Self::remove_subtree_rec(child, rest);
                if child.is_empty() {
                    n.children.remove(*head);
                }
            }
        }
    }

    /// Copies every path under `source` to the corresponding path under
    /// `dest` within this same map, replacing whatever was already at
    /// `dest`. This is the operation a persistent trie makes cheap: the
    /// source subtree is shared, not walked.
    pub fn copy_from(&mut self, source: &[u8], dest: &[u8]) {
        let src_components = split_path(source);
        let Some(subtree) = Self::find(&self.root, &src_components) else { return };
        let subtree = Arc::clone(subtree);
        let dst_components = split_path(dest);
        Self::graft(&mut self.root, &dst_components, subtree);
    }

    /// Copies every path under `src_prefix` in `other` to `dst_prefix` in
    /// `self`, replacing whatever was already at `dst_prefix`. Unlike
    /// [`PathMap::copy_from`], the source lives in a different map
    /// entirely — the cross-revision case the dumpfile translator's
    /// directory-copy expansion needs (phase 4 grafts a past revision's
    /// snapshot onto the revision under construction). Still O(1)-ish: the
    /// matched subtree is an `Arc` clone, never walked file-by-file.
    pub fn copy_from_map(&mut self, dst_prefix: &[u8], other: &PathMap<T>, src_prefix: &[u8]) {
        let src_components = split_path(src_prefix);
        let Some(subtree) = Self::find(&other.root, &src_components) else { return };
        let subtree = Arc::clone(subtree);
        let dst_components = split_path(dst_prefix);
        Self::graft(&mut self.root, &dst_components, subtree);
    }

    fn find<'a>(node: &'a Arc<Node<T>>, components: &[&[u8]]) -> Option<&'a Arc<Node<T>>> {
        match components.split_first() {
            None => Some(node),
            Some((head, rest)) => Self::find(node.children.get(*head)?, rest),
        }
    }

    fn graft(node: &mut Arc<Node<T>>, components: &[&[u8]], subtree: Arc<Node<T>>) {
        match components.split_first() {
            None => *node = subtree,
            Some((head, rest)) => {
                let n = Arc::make_mut(node);
                let child = n
                    .children
                    .entry(BString::from(*head))
                    .or_insert_with(|| Arc::new(Node::empty()));
                Self::graft(child, rest, subtree);
            }
        }
    }

    /// Renames `source` to `dest`: a copy followed by removing the source,
    /// matching fast-import's `R` fileop.
    pub fn rename(&mut self, source: &[u8], dest: &[u8]) {
        self.copy_from(source, dest);
        self.remove_subtree(source);
    }

    /// Iterates all live `(path, value)` pairs in lexicographic path order.
    pub fn iter(&self) -> impl Iterator<Item = (BString, &T)> {
        let mut out = Vec::new();
        Self::walk(&self.root, &mut BString::from(""), &mut out);
        out.into_iter()
    }

    fn walk<'a>(node: &'a Arc<Node<T>>, prefix: &mut BString, out: &mut Vec<(BString, &'a T)>) {
        if let Some(v) = &node.leaf {
            out.push((prefix.clone(), v));
        }
        for (name, child) in &node.children {
            let base_len = prefix.len();
            if !prefix.is_empty() {
                prefix.push(b'/');
            }
            prefix.extend_from_slice(name);
            Self::walk(child, prefix, out);
            prefix.truncate(base_len);
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.root.is_empty()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.iter().count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_get_roundtrip() {
        let mut map = PathMap::new();
        map.set(b"a/b/c.txt", 1);
        map.set(b"a/b/d.txt", 2);
        assert_eq!(map.get(b"a/b/c.txt"), Some(&1));
        assert_eq!(map.get(b"a/b/d.txt"), Some(&2));
        assert_eq!(map.get(b"a/b/missing.txt"), None);
    }

    #[test]
    fn clone_is_structurally_shared() {
        let mut map = PathMap::new();
        map.set(b"a/b.txt", 1);
        let snapshot = map.clone();
        map.set(b"a/c.txt", 2);
        assert_eq!(snapshot.get(b"a/c.txt"), None);
        assert_eq!(map.get(b"a/c.txt"), Some(&2));
        assert_eq!(snapshot.get(b"a/b.txt"), Some(&1));
    }

    #[test]
    fn copy_from_duplicates_subtree() {
        let mut map = PathMap::new();
        map.set(b"trunk/src/main.rs", 1);
        map.set(b"trunk/README", 2);
        map.copy_from(b"trunk", b"branches/stable");
        assert_eq!(map.get(b"branches/stable/src/main.rs"), Some(&1));
        assert_eq!(map.get(b"branches/stable/README"), Some(&2));
        assert_eq!(map.get(b"trunk/src/main.rs"), Some(&1));
    }

    #[test]
    fn copy_from_map_grafts_subtree_from_another_map() {
        let mut trunk = PathMap::new();
        trunk.set(b"trunk/src/main.rs", 1);
        trunk.set(b"trunk/README", 2);

        let mut branch = PathMap::new();
        branch.copy_from_map(b"branches/stable", &trunk, b"trunk");

        assert_eq!(branch.get(b"branches/stable/src/main.rs"), Some(&1));
        assert_eq!(branch.get(b"branches/stable/README"), Some(&2));
        assert!(trunk.get(b"branches/stable/src/main.rs").is_none(), "source map is untouched");
    }

    #[test]
    fn rename_moves_subtree() {
        let mut map = PathMap::new();
        map.set(b"old/file.txt", 1);
        map.rename(b"old", b"new");
        assert_eq!(map.get(b"old/file.txt"), None);
        assert_eq!(map.get(b"new/file.txt"), Some(&1));
    }

    #[test]
    fn remove_subtree_prunes_empty_parents() {
        let mut map = PathMap::new();
        map.set(b"a/b/c.txt", 1);
        map.remove_subtree(b"a/b");
        assert!(map.is_empty());
    }

    #[test]
    fn iter_is_lexicographic() {
        let mut map = PathMap::new();
        map.set(b"b.txt", 1);
        map.set(b"a.txt", 2);
        let paths: Vec<_> = map.iter().map(|(p, _)| p).collect();
        assert_eq!(paths, vec![BString::from("a.txt"), BString::from("b.txt")]);
    }
}
