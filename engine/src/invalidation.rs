//! InvalidationTree - size-bounded record of changed live subtrees.
//!
//! Entries are keyed by containment path: the tracked root followed by each
//! node handle down to the changed node. Entries are created lazily along an
//! invalidated path. Once the total number of entries exceeds the size limit,
//! precision is traded for memory: subtrees are collapsed into opaque entries
//! meaning "this node and everything below it needs synchronization".
//!
//! # Rebalancing
//!
//! After every [`InvalidationTree::invalidate`] the tree is rebalanced
//! bottom-up against the limit. A node that cannot keep one entry per direct
//! child collapses. Otherwise its children are levelled down toward a common
//! cap, largest first, so big subtrees keep the most detail and small ones only
//! lose it once they are the largest remaining.

use crate::{error::Result, Error};
use indexmap::IndexMap;
use std::fmt::Debug;
use std::hash::Hash;

#[derive(Debug, Clone)]
struct Entry<K> {
    id: K,
    /// Entries in this subtree, this one included
    subtree_size: usize,
    node_needs_update: bool,
    /// Opaque: everything below needs synchronization, `children` is empty
    all_descendants_need_update: bool,
    children: IndexMap<K, Entry<K>>,
}

impl<K: Clone + Eq + Hash> Entry<K> {
    fn new(id: K) -> Self {
        Self {
            id,
            subtree_size: 1,
            node_needs_update: false,
            all_descendants_need_update: false,
            children: IndexMap::new(),
        }
    }

    fn collapse(&mut self) {
        self.node_needs_update = true;
        self.all_descendants_need_update = true;
        self.children.clear();
        self.subtree_size = 1;
    }

    fn recompute_size(&mut self) {
        self.subtree_size = 1 + self
            .children
            .values()
            .map(|child| child.subtree_size)
            .sum::<usize>();
    }

    fn invalidate(&mut self, rest: &[K], including_descendants: bool) {
        let Some((head, tail)) = rest.split_first() else {
            self.node_needs_update = true;
            if including_descendants {
                self.collapse();
            }
            return;
        };
        if self.all_descendants_need_update {
            return;
        }
        self.children
            .entry(head.clone())
            .or_insert_with(|| Entry::new(head.clone()))
            .invalidate(tail, including_descendants);
        self.recompute_size();
    }

    fn rebalance(&mut self, limit: usize) {
        if self.subtree_size <= limit {
            return;
        }
        if self.children.len() + 1 > limit {
            self.collapse();
            return;
        }

        let sizes: Vec<usize> = self.children.values().map(|c| c.subtree_size).collect();
        let caps = level_caps(&sizes, limit - 1);
        for (child, cap) in self.children.values_mut().zip(caps) {
            if cap < child.subtree_size {
                child.rebalance(cap);
            }
        }
        self.recompute_size();
    }
}

/// Caps that bring `sizes` down to a total of `budget`.
///
/// The largest sizes are levelled down together to a common value; ties keep
/// their order and the rounding remainder goes to the earliest. Requires
/// `budget >= sizes.len()`.
fn level_caps(sizes: &[usize], budget: usize) -> Vec<usize> {
    let mut caps = sizes.to_vec();
    let total: usize = sizes.iter().sum();
    if total <= budget {
        return caps;
    }
    let excess = total - budget;

    let mut order: Vec<usize> = (0..sizes.len()).collect();
    order.sort_by(|&a, &b| sizes[b].cmp(&sizes[a]));

    let mut prefix = 0;
    for k in 1..=order.len() {
        prefix += sizes[order[k - 1]];
        if prefix < excess {
            continue;
        }
        // Level of the top k must not drop below the next size.
        let floor = order.get(k).map_or(1, |&next| sizes[next].max(1));
        let kept = prefix - excess;
        let level = kept / k;
        if level < floor {
            continue;
        }
        let remainder = kept - level * k;
        for (rank, &i) in order[..k].iter().enumerate() {
            caps[i] = (level + usize::from(rank < remainder)).min(sizes[i]);
        }
        break;
    }
    caps
}

/// Tracks which nodes below a root need synchronization.
#[derive(Debug, Clone)]
pub struct InvalidationTree<K> {
    root: Entry<K>,
    size_limit: usize,
}

impl<K: Clone + Eq + Hash + Debug> InvalidationTree<K> {
    /// Create an empty tree tracking `root` with at most `size_limit` entries.
    pub fn new(root: K, size_limit: usize) -> Result<Self> {
        if size_limit == 0 {
            return Err(Error::InvalidSizeLimit(size_limit));
        }
        Ok(Self {
            root: Entry::new(root),
            size_limit,
        })
    }

    /// The tracked root.
    pub fn root(&self) -> &K {
        &self.root.id
    }

    pub fn size_limit(&self) -> usize {
        self.size_limit
    }

    /// Number of entries, root included.
    pub fn size(&self) -> usize {
        self.root.subtree_size
    }

    /// Record that the node at `path` changed.
    ///
    /// With `including_descendants` its whole subtree is marked as well.
    pub fn invalidate(&mut self, path: &[K], including_descendants: bool) -> Result<()> {
        let rest = self.relative(path).ok_or(Error::ForeignPath)?;
        self.root.invalidate(rest, including_descendants);
        self.root.rebalance(self.size_limit);
        tracing::trace!(depth = path.len(), size = self.size(), "path invalidated");
        Ok(())
    }

    /// Whether the node at `path` itself must be re-read.
    pub fn needs_synchronization(&self, path: &[K]) -> bool {
        let Some(rest) = self.relative(path) else {
            return false;
        };
        let mut entry = &self.root;
        for id in rest {
            if entry.all_descendants_need_update {
                return true;
            }
            match entry.children.get(id) {
                Some(child) => entry = child,
                None => return false,
            }
        }
        entry.node_needs_update
    }

    /// Whether anything below the node at `path` must be re-read.
    pub fn needs_descent_into_subtree(&self, path: &[K]) -> bool {
        let Some(rest) = self.relative(path) else {
            return false;
        };
        let mut entry = &self.root;
        if entry.all_descendants_need_update {
            return true;
        }
        for id in rest {
            match entry.children.get(id) {
                Some(child) => entry = child,
                None => return false,
            }
            if entry.all_descendants_need_update {
                return true;
            }
        }
        // Entries only exist along invalidated paths.
        !entry.children.is_empty()
    }

    pub fn has_any_invalidations(&self) -> bool {
        self.root.node_needs_update
            || self.root.all_descendants_need_update
            || !self.root.children.is_empty()
    }

    /// Forget every invalidation, typically after a full export.
    pub fn reset(&mut self) {
        self.root = Entry::new(self.root.id.clone());
    }

    fn relative<'p>(&self, path: &'p [K]) -> Option<&'p [K]> {
        match path.split_first() {
            Some((first, rest)) if *first == self.root.id => Some(rest),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn path<'a>(ids: &[&'a str]) -> Vec<&'a str> {
        ids.to_vec()
    }

    #[test]
    fn rejects_zero_limit() {
        assert_eq!(
            InvalidationTree::new("root", 0).unwrap_err(),
            Error::InvalidSizeLimit(0)
        );
    }

    #[test]
    fn fresh_tree_is_clean() {
        let tree = InvalidationTree::new("root", 10).unwrap();
        assert_eq!(tree.size(), 1);
        assert!(!tree.has_any_invalidations());
        assert!(!tree.needs_synchronization(&path(&["root"])));
        assert!(!tree.needs_descent_into_subtree(&path(&["root"])));
    }

    #[test]
    fn invalidate_single_node() {
        let mut tree = InvalidationTree::new("root", 10).unwrap();
        tree.invalidate(&path(&["root", "a", "b"]), false).unwrap();

        assert_eq!(tree.size(), 3);
        assert!(tree.has_any_invalidations());
        assert!(tree.needs_synchronization(&path(&["root", "a", "b"])));
        assert!(!tree.needs_synchronization(&path(&["root", "a"])));
        assert!(!tree.needs_synchronization(&path(&["root"])));
        assert!(tree.needs_descent_into_subtree(&path(&["root"])));
        assert!(tree.needs_descent_into_subtree(&path(&["root", "a"])));
        assert!(!tree.needs_descent_into_subtree(&path(&["root", "a", "b"])));
        assert!(!tree.needs_synchronization(&path(&["root", "c"])));
    }

    #[test]
    fn invalidate_including_descendants() {
        let mut tree = InvalidationTree::new("root", 10).unwrap();
        tree.invalidate(&path(&["root", "a", "b", "c"]), false).unwrap();
        tree.invalidate(&path(&["root", "a"]), true).unwrap();

        assert_eq!(tree.size(), 2);
        assert!(tree.needs_synchronization(&path(&["root", "a"])));
        assert!(tree.needs_synchronization(&path(&["root", "a", "x", "y"])));
        assert!(tree.needs_descent_into_subtree(&path(&["root", "a", "x"])));
        assert!(!tree.needs_synchronization(&path(&["root", "d"])));
    }

    #[test]
    fn limit_two_collapses_intermediate_node() {
        let mut tree = InvalidationTree::new("root", 2).unwrap();
        tree.invalidate(&path(&["root", "x", "y"]), false).unwrap();
        assert_eq!(tree.size(), 2);
        assert!(tree.needs_synchronization(&path(&["root", "x", "y"])));
        assert!(tree.needs_synchronization(&path(&["root", "x", "z"])));

        tree.invalidate(&path(&["root", "x", "z"]), false).unwrap();
        assert_eq!(tree.size(), 2);
        assert!(tree.needs_descent_into_subtree(&path(&["root", "x"])));
    }

    #[test]
    fn root_collapses_when_children_exceed_limit() {
        let mut tree = InvalidationTree::new("root", 2).unwrap();
        tree.invalidate(&path(&["root", "a"]), false).unwrap();
        tree.invalidate(&path(&["root", "b"]), false).unwrap();

        assert_eq!(tree.size(), 1);
        assert!(tree.needs_synchronization(&path(&["root"])));
        assert!(tree.needs_synchronization(&path(&["root", "anything"])));
    }

    #[test]
    fn largest_subtree_keeps_most_entries() {
        let mut tree = InvalidationTree::new("r", 4).unwrap();
        tree.invalidate(&path(&["r", "a", "a1"]), false).unwrap();
        tree.invalidate(&path(&["r", "a", "a2"]), false).unwrap();
        assert_eq!(tree.size(), 4);

        tree.invalidate(&path(&["r", "b"]), false).unwrap();
        assert_eq!(tree.size(), 3);
        assert!(tree.needs_synchronization(&path(&["r", "a", "a3"])));
        assert!(tree.needs_synchronization(&path(&["r", "b"])));
        assert!(!tree.needs_synchronization(&path(&["r"])));
        assert!(!tree.needs_descent_into_subtree(&path(&["r", "b"])));
    }

    #[test]
    fn foreign_paths() {
        let mut tree = InvalidationTree::new("root", 10).unwrap();
        assert_eq!(
            tree.invalidate(&path(&["other", "a"]), false).unwrap_err(),
            Error::ForeignPath
        );
        assert_eq!(tree.invalidate(&[], false).unwrap_err(), Error::ForeignPath);

        tree.invalidate(&path(&["root"]), true).unwrap();
        assert!(!tree.needs_synchronization(&path(&["other"])));
        assert!(!tree.needs_descent_into_subtree(&[]));
    }

    #[test]
    fn reset_clears_everything() {
        let mut tree = InvalidationTree::new("root", 10).unwrap();
        tree.invalidate(&path(&["root", "a"]), true).unwrap();
        tree.reset();

        assert_eq!(tree.size(), 1);
        assert!(!tree.has_any_invalidations());
        assert_eq!(*tree.root(), "root");
    }

    #[test]
    fn level_caps_favors_large_sizes() {
        assert_eq!(level_caps(&[5, 3, 1], 6), vec![3, 2, 1]);
        assert_eq!(level_caps(&[1, 5], 3), vec![1, 2]);
        assert_eq!(level_caps(&[2, 2], 3), vec![2, 1]);
        assert_eq!(level_caps(&[4, 4, 4], 3), vec![1, 1, 1]);
        assert_eq!(level_caps(&[2, 1], 5), vec![2, 1]);
    }
}
