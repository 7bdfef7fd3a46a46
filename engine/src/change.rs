//! Change notifications emitted by a live tree.
//!
//! A change source reports every committed edit exactly once through a
//! [`ChangeVisitor`]. [`crate::MemoryTree`] records its edits as a journal of
//! [`TreeChange`] values which can be replayed into any visitor later, e.g.
//! once the importer has finished.

use crate::{error::Result, Role};
use serde::{Deserialize, Serialize};

/// Receiver of per-node change notifications.
pub trait ChangeVisitor<N> {
    /// The node was attached to a different parent or role.
    fn containment_changed(&mut self, node: &N) -> Result<()>;

    /// Children of `node` in `role` were added, removed or reordered.
    fn children_changed(&mut self, node: &N, role: Option<&str>) -> Result<()>;

    fn reference_changed(&mut self, node: &N, role: &str) -> Result<()>;

    fn property_changed(&mut self, node: &N, role: &str) -> Result<()>;

    fn node_added(&mut self, node: &N) -> Result<()>;

    fn node_removed(&mut self, node: &N) -> Result<()>;
}

/// A single journaled edit notification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum TreeChange<N> {
    ContainmentChanged { node: N },
    ChildrenChanged { node: N, role: Option<Role> },
    ReferenceChanged { node: N, role: Role },
    PropertyChanged { node: N, role: Role },
    NodeAdded { node: N },
    NodeRemoved { node: N },
}

impl<N> TreeChange<N> {
    /// The node this notification is about.
    pub fn node(&self) -> &N {
        match self {
            TreeChange::ContainmentChanged { node }
            | TreeChange::ChildrenChanged { node, .. }
            | TreeChange::ReferenceChanged { node, .. }
            | TreeChange::PropertyChanged { node, .. }
            | TreeChange::NodeAdded { node }
            | TreeChange::NodeRemoved { node } => node,
        }
    }

    /// Deliver this notification to a visitor.
    pub fn dispatch<V>(&self, visitor: &mut V) -> Result<()>
    where
        V: ChangeVisitor<N> + ?Sized,
    {
        match self {
            TreeChange::ContainmentChanged { node } => visitor.containment_changed(node),
            TreeChange::ChildrenChanged { node, role } => {
                visitor.children_changed(node, role.as_deref())
            }
            TreeChange::ReferenceChanged { node, role } => visitor.reference_changed(node, role),
            TreeChange::PropertyChanged { node, role } => visitor.property_changed(node, role),
            TreeChange::NodeAdded { node } => visitor.node_added(node),
            TreeChange::NodeRemoved { node } => visitor.node_removed(node),
        }
    }
}

/// Deliver a journal of notifications to a visitor, in order.
pub fn replay<N, V>(changes: &[TreeChange<N>], visitor: &mut V) -> Result<()>
where
    V: ChangeVisitor<N> + ?Sized,
{
    for change in changes {
        change.dispatch(visitor)?;
    }
    Ok(())
}
