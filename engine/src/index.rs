//! Identity indexes built once per synchronization call.
//!
//! - spec index: identity -> specification node (and its specification parent)
//! - existing index: identity -> live node, over a snapshot taken before any
//!   structural edit
//! - reference index: identity -> live node, over every node that still exists
//!   once additions, moves and deletions are done

use crate::{error::Result, Error, LiveTree, NodeData, OriginalId};
use std::collections::HashMap;

/// A specification node together with its specification parent.
#[derive(Debug, Clone, Copy)]
pub struct SpecEntry<'s> {
    pub node: &'s NodeData,
    /// `None` for the specification root
    pub parent: Option<&'s NodeData>,
}

/// Index every specification node that has an identity, in pre-order.
///
/// Fails on the first duplicated identity.
pub fn build_spec_index(root: &NodeData) -> Result<HashMap<&str, SpecEntry<'_>>> {
    let mut index = HashMap::new();
    let mut stack = vec![SpecEntry {
        node: root,
        parent: None,
    }];
    while let Some(entry) = stack.pop() {
        if let Some(id) = entry.node.original_id() {
            if index.insert(id, entry).is_some() {
                return Err(Error::DuplicateSpecId(id.to_string()));
            }
        }
        stack.extend(entry.node.children.iter().rev().map(|child| SpecEntry {
            node: child,
            parent: Some(entry.node),
        }));
    }
    Ok(index)
}

/// Index the pre-mutation snapshot of live nodes by identity.
pub fn build_existing_index<T: LiveTree>(
    tree: &T,
    snapshot: &[T::NodeRef],
) -> Result<HashMap<OriginalId, T::NodeRef>> {
    index_by_identity(tree, snapshot.iter())
}

/// Index live nodes for reference resolution.
pub fn build_ref_index<'n, T>(
    tree: &T,
    nodes: impl IntoIterator<Item = &'n T::NodeRef>,
) -> Result<HashMap<OriginalId, T::NodeRef>>
where
    T: LiveTree,
    T::NodeRef: 'n,
{
    index_by_identity(tree, nodes)
}

fn index_by_identity<'n, T>(
    tree: &T,
    nodes: impl IntoIterator<Item = &'n T::NodeRef>,
) -> Result<HashMap<OriginalId, T::NodeRef>>
where
    T: LiveTree,
    T::NodeRef: 'n,
{
    let mut index = HashMap::new();
    for node in nodes {
        if let Some(id) = tree.original_id(node) {
            if let Some(previous) = index.insert(id.clone(), node.clone()) {
                if &previous != node {
                    return Err(Error::DuplicateLiveId(id));
                }
            }
        }
    }
    Ok(index)
}
