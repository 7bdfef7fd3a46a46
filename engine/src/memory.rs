//! MemoryTree - an in-memory live tree.
//!
//! Nodes live in a map keyed by [`NodeId`]. Each node keeps a single ordered
//! child list across all roles; role-local indexes are positions among the
//! children sharing a role. Every committed edit is journaled as
//! [`TreeChange`] notifications which callers drain with
//! [`MemoryTree::take_changes`].

use crate::{
    change::TreeChange, error::Result, index, Error, LiveTree, NodeData, OriginalId, Role,
    ID_PROPERTY_KEY,
};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::fmt;

/// Handle to a node of a [`MemoryTree`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NodeId(u64);

impl NodeId {
    pub fn as_u64(self) -> u64 {
        self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Debug, Clone, Default)]
struct Node {
    concept: Option<String>,
    parent: Option<NodeId>,
    role: Option<Role>,
    properties: BTreeMap<Role, String>,
    references: BTreeMap<Role, NodeId>,
    children: Vec<NodeId>,
}

/// An in-memory tree with a change journal.
#[derive(Debug, Clone)]
pub struct MemoryTree {
    nodes: HashMap<NodeId, Node>,
    root: NodeId,
    next_id: u64,
    /// Notifications for edits not yet drained
    changes: Vec<TreeChange<NodeId>>,
}

impl Default for MemoryTree {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryTree {
    /// Create a tree holding only an empty root.
    pub fn new() -> Self {
        let root = NodeId(1);
        let mut nodes = HashMap::new();
        nodes.insert(root, Node::default());
        Self {
            nodes,
            root,
            next_id: 2,
            changes: Vec::new(),
        }
    }

    /// Load a tree from an exported snapshot.
    ///
    /// The snapshot root becomes the tree root. References are resolved by
    /// identity once all nodes exist; unresolvable targets are dropped. The
    /// journal starts out empty.
    pub fn from_data(data: &NodeData) -> Result<Self> {
        let mut tree = Self::new();
        let root = tree.root;
        tree.node_mut(root)?.concept = data.concept.clone();

        let mut pending_refs = Vec::new();
        tree.load(root, data, &mut pending_refs)?;

        let mut all = vec![root];
        all.extend(tree.descendants(&root));
        let by_id = index::build_ref_index(&tree, all.iter())?;

        for (node, role, target) in pending_refs {
            match by_id.get(target.as_str()) {
                Some(target_node) => tree.set_reference_target(&node, &role, Some(target_node))?,
                None => tracing::warn!(%node, %role, %target, "dropping unresolved reference"),
            }
        }

        tree.changes.clear();
        Ok(tree)
    }

    fn load(
        &mut self,
        node: NodeId,
        data: &NodeData,
        pending_refs: &mut Vec<(NodeId, Role, OriginalId)>,
    ) -> Result<()> {
        for (role, value) in &data.properties {
            if role != ID_PROPERTY_KEY {
                self.set_property(&node, role, Some(value))?;
            }
        }
        if let Some(id) = data.original_id() {
            self.set_property(&node, ID_PROPERTY_KEY, Some(id))?;
        }
        for (role, target) in &data.references {
            pending_refs.push((node, role.clone(), target.clone()));
        }

        for child in &data.children {
            let role = child.role.as_deref();
            let index = self.children(&node, role).len();
            let created = self.add_new_child(&node, role, index, child.concept.as_deref())?;
            self.load(created, child, pending_refs)?;
        }
        Ok(())
    }

    /// The root node.
    pub fn root(&self) -> NodeId {
        self.root
    }

    /// Number of nodes, root included.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Whether the tree holds nothing but its root.
    pub fn is_empty(&self) -> bool {
        self.nodes.len() <= 1
    }

    /// Check if a node exists.
    pub fn contains(&self, node: NodeId) -> bool {
        self.nodes.contains_key(&node)
    }

    /// Find a node by its stable identity.
    pub fn find(&self, original_id: &str) -> Option<NodeId> {
        self.nodes.iter().find_map(|(id, node)| {
            (node.properties.get(ID_PROPERTY_KEY).map(String::as_str) == Some(original_id))
                .then_some(*id)
        })
    }

    /// Notifications journaled since the last drain.
    pub fn changes(&self) -> &[TreeChange<NodeId>] {
        &self.changes
    }

    /// Drain the journal.
    pub fn take_changes(&mut self) -> Vec<TreeChange<NodeId>> {
        std::mem::take(&mut self.changes)
    }

    fn node(&self, id: NodeId) -> Result<&Node> {
        self.nodes
            .get(&id)
            .ok_or_else(|| Error::NodeNotFound(id.to_string()))
    }

    fn node_mut(&mut self, id: NodeId) -> Result<&mut Node> {
        self.nodes
            .get_mut(&id)
            .ok_or_else(|| Error::NodeNotFound(id.to_string()))
    }

    fn allocate(&mut self) -> NodeId {
        let id = NodeId(self.next_id);
        self.next_id += 1;
        id
    }

    /// Positions in the parent's child list of the children filling `role`,
    /// skipping `except`.
    fn role_slots(
        &self,
        parent: NodeId,
        role: Option<&str>,
        except: Option<NodeId>,
    ) -> Result<Vec<usize>> {
        let node = self.node(parent)?;
        Ok(node
            .children
            .iter()
            .enumerate()
            .filter(|(_, child)| Some(**child) != except)
            .filter(|(_, child)| {
                self.nodes
                    .get(child)
                    .is_some_and(|c| c.role.as_deref() == role)
            })
            .map(|(position, _)| position)
            .collect())
    }

    /// Position in the parent's child list where a child must be inserted to
    /// land at `index` within `role`.
    fn insert_position(&self, parent: NodeId, role: Option<&str>, index: usize) -> Result<usize> {
        let slots = self.role_slots(parent, role, None)?;
        if index > slots.len() {
            return Err(Error::IndexOutOfBounds {
                role: role.unwrap_or_default().to_string(),
                index,
                len: slots.len(),
            });
        }
        Ok(match slots.get(index) {
            Some(&position) => position,
            None => match slots.last() {
                Some(&last) => last + 1,
                None => self.node(parent)?.children.len(),
            },
        })
    }
}

impl LiveTree for MemoryTree {
    type NodeRef = NodeId;

    fn concept(&self, node: &NodeId) -> Option<String> {
        self.nodes.get(node).and_then(|n| n.concept.clone())
    }

    fn property(&self, node: &NodeId, role: &str) -> Option<String> {
        self.nodes
            .get(node)
            .and_then(|n| n.properties.get(role).cloned())
    }

    fn property_roles(&self, node: &NodeId) -> Vec<Role> {
        self.nodes
            .get(node)
            .map(|n| n.properties.keys().cloned().collect())
            .unwrap_or_default()
    }

    fn set_property(&mut self, node: &NodeId, role: &str, value: Option<&str>) -> Result<()> {
        let entry = self.node_mut(*node)?;
        let changed = match value {
            Some(value) => {
                entry
                    .properties
                    .insert(role.to_string(), value.to_string())
                    .as_deref()
                    != Some(value)
            }
            None => entry.properties.remove(role).is_some(),
        };
        if changed {
            self.changes.push(TreeChange::PropertyChanged {
                node: *node,
                role: role.to_string(),
            });
        }
        Ok(())
    }

    fn reference_target(&self, node: &NodeId, role: &str) -> Option<NodeId> {
        self.nodes
            .get(node)
            .and_then(|n| n.references.get(role).copied())
    }

    fn reference_roles(&self, node: &NodeId) -> Vec<Role> {
        self.nodes
            .get(node)
            .map(|n| n.references.keys().cloned().collect())
            .unwrap_or_default()
    }

    fn set_reference_target(
        &mut self,
        node: &NodeId,
        role: &str,
        target: Option<&NodeId>,
    ) -> Result<()> {
        if let Some(target) = target {
            self.node(*target)?;
        }
        let entry = self.node_mut(*node)?;
        let previous = match target {
            Some(target) => entry.references.insert(role.to_string(), *target),
            None => entry.references.remove(role),
        };
        if previous != target.copied() {
            self.changes.push(TreeChange::ReferenceChanged {
                node: *node,
                role: role.to_string(),
            });
        }
        Ok(())
    }

    fn all_children(&self, node: &NodeId) -> Vec<NodeId> {
        self.nodes
            .get(node)
            .map(|n| n.children.clone())
            .unwrap_or_default()
    }

    fn parent(&self, node: &NodeId) -> Option<NodeId> {
        self.nodes.get(node).and_then(|n| n.parent)
    }

    fn role_in_parent(&self, node: &NodeId) -> Option<Role> {
        self.nodes.get(node).and_then(|n| n.role.clone())
    }

    fn add_new_child(
        &mut self,
        parent: &NodeId,
        role: Option<&str>,
        index: usize,
        concept: Option<&str>,
    ) -> Result<NodeId> {
        let position = self.insert_position(*parent, role, index)?;
        let id = self.allocate();
        self.nodes.insert(
            id,
            Node {
                concept: concept.map(str::to_string),
                parent: Some(*parent),
                role: role.map(str::to_string),
                ..Node::default()
            },
        );
        self.node_mut(*parent)?.children.insert(position, id);

        self.changes.push(TreeChange::NodeAdded { node: id });
        self.changes.push(TreeChange::ChildrenChanged {
            node: *parent,
            role: role.map(str::to_string),
        });
        Ok(id)
    }

    fn move_child(
        &mut self,
        new_parent: &NodeId,
        role: Option<&str>,
        index: usize,
        child: &NodeId,
    ) -> Result<()> {
        if *child == self.root {
            return Err(Error::InvalidMove("cannot move the root".into()));
        }
        let (old_parent, old_role) = {
            let node = self.node(*child)?;
            (node.parent, node.role.clone())
        };
        if self.is_ancestor_of(child, new_parent) {
            return Err(Error::InvalidMove(format!(
                "{child} cannot be moved below itself ({new_parent})"
            )));
        }

        // Validate before detaching so a failed move leaves the tree untouched.
        let len = self.role_slots(*new_parent, role, Some(*child))?.len();
        if index > len {
            return Err(Error::IndexOutOfBounds {
                role: role.unwrap_or_default().to_string(),
                index,
                len,
            });
        }

        if let Some(old) = old_parent {
            self.node_mut(old)?.children.retain(|c| c != child);
        }
        let position = self.insert_position(*new_parent, role, index)?;
        self.node_mut(*new_parent)?.children.insert(position, *child);
        {
            let node = self.node_mut(*child)?;
            node.parent = Some(*new_parent);
            node.role = role.map(str::to_string);
        }

        let new_role = role.map(str::to_string);
        match old_parent {
            Some(old) if old == *new_parent && old_role == new_role => {}
            Some(old) => self.changes.push(TreeChange::ChildrenChanged {
                node: old,
                role: old_role,
            }),
            None => {}
        }
        self.changes.push(TreeChange::ChildrenChanged {
            node: *new_parent,
            role: new_role,
        });
        self.changes
            .push(TreeChange::ContainmentChanged { node: *child });
        Ok(())
    }

    fn remove_child(&mut self, parent: &NodeId, child: &NodeId) -> Result<()> {
        let role = {
            let node = self.node(*child)?;
            if node.parent != Some(*parent) {
                return Err(Error::NodeNotFound(format!(
                    "{child} is not a child of {parent}"
                )));
            }
            node.role.clone()
        };
        self.node_mut(*parent)?.children.retain(|c| c != child);

        let mut removed = HashSet::new();
        let mut stack = vec![*child];
        while let Some(id) = stack.pop() {
            if let Some(node) = self.nodes.remove(&id) {
                stack.extend(node.children.iter().rev());
                self.changes.push(TreeChange::NodeRemoved { node: id });
                removed.insert(id);
            }
        }

        // Survivors must not keep handles into the removed subtree.
        let mut dangling = Vec::new();
        for (id, node) in &mut self.nodes {
            node.references.retain(|role, target| {
                let keep = !removed.contains(target);
                if !keep {
                    dangling.push((*id, role.clone()));
                }
                keep
            });
        }
        dangling.sort();
        for (node, role) in dangling {
            tracing::debug!(%node, %role, "cleared reference into removed subtree");
            self.changes.push(TreeChange::ReferenceChanged { node, role });
        }

        self.changes.push(TreeChange::ChildrenChanged {
            node: *parent,
            role,
        });
        Ok(())
    }
}
