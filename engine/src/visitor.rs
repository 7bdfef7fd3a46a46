//! Feeds live tree change notifications into an [`InvalidationTree`].

use crate::{error::Result, ChangeVisitor, InvalidationTree, LiveTree, ID_PROPERTY_KEY};

/// A [`ChangeVisitor`] that invalidates the containment path of every
/// changed node.
///
/// Structural notifications are covered by the parent's children change, so
/// containment changes and removals are ignored, as are writes of the
/// identity property.
pub struct InvalidatingVisitor<'a, T: LiveTree> {
    tree: &'a T,
    invalidations: &'a mut InvalidationTree<T::NodeRef>,
}

impl<'a, T: LiveTree> InvalidatingVisitor<'a, T> {
    pub fn new(tree: &'a T, invalidations: &'a mut InvalidationTree<T::NodeRef>) -> Self {
        Self {
            tree,
            invalidations,
        }
    }

    fn invalidate(&mut self, node: &T::NodeRef) -> Result<()> {
        match self.tree.containment_path(self.invalidations.root(), node) {
            Some(path) => self.invalidations.invalidate(&path, false),
            None => {
                tracing::trace!(?node, "change outside the tracked root");
                Ok(())
            }
        }
    }
}

impl<T: LiveTree> ChangeVisitor<T::NodeRef> for InvalidatingVisitor<'_, T> {
    fn containment_changed(&mut self, _node: &T::NodeRef) -> Result<()> {
        Ok(())
    }

    fn children_changed(&mut self, node: &T::NodeRef, _role: Option<&str>) -> Result<()> {
        self.invalidate(node)
    }

    fn reference_changed(&mut self, node: &T::NodeRef, _role: &str) -> Result<()> {
        self.invalidate(node)
    }

    fn property_changed(&mut self, node: &T::NodeRef, role: &str) -> Result<()> {
        if role == ID_PROPERTY_KEY {
            return Ok(());
        }
        self.invalidate(node)
    }

    fn node_added(&mut self, node: &T::NodeRef) -> Result<()> {
        self.invalidate(node)
    }

    fn node_removed(&mut self, _node: &T::NodeRef) -> Result<()> {
        Ok(())
    }
}
