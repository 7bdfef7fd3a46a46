//! The capability set a live tree must offer to be synchronized.
//!
//! The importer, the exporter and the invalidating visitor are generic over
//! [`LiveTree`]; any storage backend that can answer these queries and apply
//! these edits can be synchronized. [`crate::MemoryTree`] is the in-memory
//! implementation shipped with the engine.
//!
//! Roles are optional: a child without a role lives in the default slot.
//! Indexes passed to and returned from the tree are positions among the
//! siblings sharing the same role.

use crate::{error::Result, OriginalId, Role, ID_PROPERTY_KEY};
use std::fmt::Debug;
use std::hash::Hash;

/// A mutable, ordered tree of nodes with properties and references.
pub trait LiveTree {
    /// Handle to a node of this tree.
    type NodeRef: Clone + Eq + Hash + Debug;

    /// Concept (type) of a node.
    fn concept(&self, node: &Self::NodeRef) -> Option<String>;

    /// Value of a property.
    fn property(&self, node: &Self::NodeRef, role: &str) -> Option<String>;

    /// Roles of all properties currently set on a node.
    fn property_roles(&self, node: &Self::NodeRef) -> Vec<Role>;

    /// Set (`Some`) or remove (`None`) a property.
    fn set_property(&mut self, node: &Self::NodeRef, role: &str, value: Option<&str>)
        -> Result<()>;

    /// Target of a reference.
    fn reference_target(&self, node: &Self::NodeRef, role: &str) -> Option<Self::NodeRef>;

    /// Roles of all references currently set on a node.
    fn reference_roles(&self, node: &Self::NodeRef) -> Vec<Role>;

    /// Set (`Some`) or clear (`None`) a reference.
    fn set_reference_target(
        &mut self,
        node: &Self::NodeRef,
        role: &str,
        target: Option<&Self::NodeRef>,
    ) -> Result<()>;

    /// All children in order, across roles.
    fn all_children(&self, node: &Self::NodeRef) -> Vec<Self::NodeRef>;

    /// Parent of a node, `None` for the root or a detached node.
    fn parent(&self, node: &Self::NodeRef) -> Option<Self::NodeRef>;

    /// Role the node occupies in its parent.
    fn role_in_parent(&self, node: &Self::NodeRef) -> Option<Role>;

    /// Create a child at `index` among the parent's children in `role`.
    fn add_new_child(
        &mut self,
        parent: &Self::NodeRef,
        role: Option<&str>,
        index: usize,
        concept: Option<&str>,
    ) -> Result<Self::NodeRef>;

    /// Attach `child` under `new_parent` in `role` at `index`.
    ///
    /// `index` is the final position among the role's children once `child`
    /// has been detached from wherever it was.
    fn move_child(
        &mut self,
        new_parent: &Self::NodeRef,
        role: Option<&str>,
        index: usize,
        child: &Self::NodeRef,
    ) -> Result<()>;

    /// Remove a direct child and its whole subtree. References into the
    /// removed subtree are cleared.
    fn remove_child(&mut self, parent: &Self::NodeRef, child: &Self::NodeRef) -> Result<()>;

    /// Children in a given role, in order.
    fn children(&self, node: &Self::NodeRef, role: Option<&str>) -> Vec<Self::NodeRef> {
        self.all_children(node)
            .into_iter()
            .filter(|child| self.role_in_parent(child).as_deref() == role)
            .collect()
    }

    /// Position of a node among its parent's children in the same role.
    fn index(&self, node: &Self::NodeRef) -> usize {
        let Some(parent) = self.parent(node) else {
            return 0;
        };
        let role = self.role_in_parent(node);
        self.children(&parent, role.as_deref())
            .iter()
            .position(|sibling| sibling == node)
            .unwrap_or(0)
    }

    /// Stable identity stored in the reserved property.
    fn original_id(&self, node: &Self::NodeRef) -> Option<OriginalId> {
        self.property(node, ID_PROPERTY_KEY)
    }

    /// All descendants in pre-order, excluding `node` itself.
    fn descendants(&self, node: &Self::NodeRef) -> Vec<Self::NodeRef> {
        let mut result = Vec::new();
        let mut stack: Vec<Self::NodeRef> = self.all_children(node).into_iter().rev().collect();
        while let Some(current) = stack.pop() {
            stack.extend(self.all_children(&current).into_iter().rev());
            result.push(current);
        }
        result
    }

    /// Whether `ancestor` is `node` itself or one of its ancestors.
    fn is_ancestor_of(&self, ancestor: &Self::NodeRef, node: &Self::NodeRef) -> bool {
        let mut current = Some(node.clone());
        while let Some(n) = current {
            if &n == ancestor {
                return true;
            }
            current = self.parent(&n);
        }
        false
    }

    /// Handles from `root` down to `node`, both included.
    ///
    /// `None` when `node` is not attached below `root`.
    fn containment_path(
        &self,
        root: &Self::NodeRef,
        node: &Self::NodeRef,
    ) -> Option<Vec<Self::NodeRef>> {
        let mut path = vec![node.clone()];
        let mut current = node.clone();
        while &current != root {
            current = self.parent(&current)?;
            path.push(current.clone());
        }
        path.reverse();
        Some(path)
    }
}
