//! Export - serialize a live subtree back into specification form.
//!
//! An export of a freshly imported tree equals the imported specification up
//! to generated identities. [`export_incremental`] produces the same result as
//! [`export_node`] but only re-reads the parts of the tree an
//! [`InvalidationTree`] marks as changed, reusing everything else from the
//! previous export.

use crate::{
    error::Result,
    index::{self, SpecEntry},
    InvalidationTree, LiveTree, NodeData, ID_PROPERTY_KEY,
};
use std::collections::HashMap;

/// Export `node` and its whole subtree.
pub fn export_node<T: LiveTree>(tree: &T, node: &T::NodeRef) -> NodeData {
    let mut data = export_shallow(tree, node);
    data.children = tree
        .all_children(node)
        .iter()
        .map(|child| export_node(tree, child))
        .collect();
    data
}

/// Export `root` reusing unchanged subtrees of `previous`.
///
/// `invalidations` must track `root` and hold every change made since
/// `previous` was exported. Reset it once the result is stored.
pub fn export_incremental<T: LiveTree>(
    tree: &T,
    root: &T::NodeRef,
    previous: &NodeData,
    invalidations: &InvalidationTree<T::NodeRef>,
) -> Result<NodeData> {
    let cache = index::build_spec_index(previous)?;
    let mut path = vec![root.clone()];
    let mut reused = 0;
    let data = export_cached(tree, root, &cache, invalidations, &mut path, &mut reused);
    tracing::debug!(reused, "incremental export finished");
    Ok(data)
}

fn export_cached<T: LiveTree>(
    tree: &T,
    node: &T::NodeRef,
    cache: &HashMap<&str, SpecEntry<'_>>,
    invalidations: &InvalidationTree<T::NodeRef>,
    path: &mut Vec<T::NodeRef>,
    reused: &mut usize,
) -> NodeData {
    let unchanged = !invalidations.needs_synchronization(path)
        && !invalidations.needs_descent_into_subtree(path);
    if unchanged {
        if let Some(entry) = tree
            .original_id(node)
            .and_then(|id| cache.get(id.as_str()).copied())
        {
            *reused += 1;
            let mut data = entry.node.clone();
            // Moves notify the parents only.
            data.role = tree.role_in_parent(node);
            return data;
        }
    }

    let mut data = export_shallow(tree, node);
    for child in tree.all_children(node) {
        path.push(child.clone());
        let exported = export_cached(tree, &child, cache, invalidations, path, reused);
        data.children.push(exported);
        path.pop();
    }
    data
}

/// A node without its children.
fn export_shallow<T: LiveTree>(tree: &T, node: &T::NodeRef) -> NodeData {
    let properties = tree
        .property_roles(node)
        .into_iter()
        .filter(|role| role != ID_PROPERTY_KEY)
        .filter_map(|role| {
            let value = tree.property(node, &role)?;
            Some((role, value))
        })
        .collect();
    let references = tree
        .reference_roles(node)
        .into_iter()
        .filter_map(|role| {
            let target = tree.reference_target(node, &role)?;
            let id = tree.original_id(&target)?;
            Some((role, id))
        })
        .collect();

    NodeData {
        id: tree.original_id(node),
        concept: tree.concept(node),
        role: tree.role_in_parent(node),
        children: Vec::new(),
        properties,
        references,
    }
}
