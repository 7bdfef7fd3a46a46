//! Import - reconcile a live tree with a specification tree.
//!
//! Nodes are matched purely by stable identity. One call performs a single
//! ordered pass:
//!
//! # Algorithm
//!
//! 1. Index the specification (duplicates fail before any edit)
//! 2. Establish the root identity and sync the root's properties
//! 3. Snapshot all live descendants and index them by identity
//! 4. Sync properties of every snapshot node with a specification counterpart
//! 5. Reorder children already under the right parent and role
//! 6. Add missing children, recursively in specification order
//! 7. Move nodes attached under the wrong parent or role, never below themselves
//! 8. Index every node for reference resolution and sync references
//! 9. Delete, top-down, every child whose identity is not specified
//!
//! Every placement goes through [`corrected_index`], which turns a node's
//! position among its specification siblings into a position in the live
//! sibling list as it is at that moment: that list still contains nodes about
//! to be deleted or moved away, and lacks specified siblings not yet inserted
//! or moved in.

use crate::{
    error::Result,
    ids::{with_assigned_ids, IdPolicy, IdScheme},
    index::{self, SpecEntry},
    stats::{Addition, Deletion, ImportObserver, Move, PropertyChange, ReferenceChange},
    Error, LiveTree, NodeData, OriginalId, Role, ID_PROPERTY_KEY,
};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

/// Options controlling an import.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ImportOptions {
    /// Fail on references whose target cannot be resolved instead of clearing them
    pub strict_references: bool,
    /// Identity scheme for specification nodes without an identity
    pub id_scheme: IdScheme,
}

/// Synchronizes live trees with specification trees.
///
/// An importer holds no state between calls apart from its observer, so one
/// instance can import into any number of trees, one call at a time.
pub struct Importer<O = ()> {
    options: ImportOptions,
    id_policy: Box<dyn IdPolicy>,
    observer: O,
}

impl Default for Importer<()> {
    fn default() -> Self {
        Self::new(ImportOptions::default())
    }
}

impl Importer<()> {
    /// Create an importer without an observer.
    pub fn new(options: ImportOptions) -> Self {
        Self {
            options,
            id_policy: Box::new(options.id_scheme),
            observer: (),
        }
    }
}

impl<O: ImportObserver> Importer<O> {
    /// Report every edit to `observer`.
    pub fn with_observer<P: ImportObserver>(self, observer: P) -> Importer<P> {
        Importer {
            options: self.options,
            id_policy: self.id_policy,
            observer,
        }
    }

    /// Replace the identity policy selected by the options.
    pub fn with_id_policy(mut self, policy: impl IdPolicy + 'static) -> Self {
        self.id_policy = Box::new(policy);
        self
    }

    pub fn options(&self) -> &ImportOptions {
        &self.options
    }

    pub fn observer(&self) -> &O {
        &self.observer
    }

    pub fn observer_mut(&mut self) -> &mut O {
        &mut self.observer
    }

    pub fn into_observer(self) -> O {
        self.observer
    }

    /// Make the subtree below `root` match `data`.
    ///
    /// `data` describes `root` itself: its properties and references apply to
    /// `root`, its children become `root`'s children. Edits applied before an
    /// error are kept.
    pub fn import<T: LiveTree>(
        &mut self,
        tree: &mut T,
        root: &T::NodeRef,
        data: &NodeData,
    ) -> Result<()> {
        let data = with_assigned_ids(data, self.id_policy.as_mut());
        let spec_by_id = index::build_spec_index(&data)?;

        let span = tracing::debug_span!("import", specified = spec_by_id.len());
        let _guard = span.enter();

        let mut run = ImportRun {
            tree,
            observer: &mut self.observer,
            strict_references: self.options.strict_references,
            spec_root: &data,
            root: root.clone(),
            spec_by_id,
            existing_by_id: HashMap::new(),
            created: Vec::new(),
            created_by_id: HashMap::new(),
            ref_by_id: HashMap::new(),
            counts: EditCounts::default(),
        };
        run.execute()
    }
}

/// Position at which a node lands among its live same-role siblings.
///
/// `spec_siblings` holds the identities of the parent's specification
/// children in the node's role, `raw` the node's position among them and
/// `live_siblings` the identities of the parent's current children in that
/// role, without the node itself.
///
/// ```text
/// offset = (# earlier live siblings with no specification counterpart)
///        - (# earlier specification siblings not yet among the live siblings)
/// target = clamp(raw + offset, 0, live_siblings.len())
/// ```
pub fn corrected_index(
    spec_siblings: &[&str],
    raw: usize,
    live_siblings: &[Option<OriginalId>],
) -> usize {
    let raw = raw.min(spec_siblings.len());
    let live: HashSet<&str> = live_siblings
        .iter()
        .flatten()
        .map(String::as_str)
        .collect();
    let specified: HashSet<&str> = spec_siblings.iter().copied().collect();

    let missing = spec_siblings[..raw]
        .iter()
        .filter(|id| !live.contains(*id))
        .count();

    // Earlier siblings already in place are in specification order; the node
    // goes right after the last of them.
    let mut placed = raw - missing;
    let mut foreign = 0;
    for sibling in live_siblings {
        if placed == 0 {
            break;
        }
        match sibling.as_deref() {
            Some(id) if specified.contains(id) => placed -= 1,
            _ => foreign += 1,
        }
    }

    (raw + foreign - missing).min(live_siblings.len())
}

/// Identities of a specification node's children in `role`.
fn spec_siblings<'s>(parent: &'s NodeData, role: Option<&'s str>) -> Vec<&'s str> {
    parent
        .children_in_role(role)
        .filter_map(NodeData::original_id)
        .collect()
}

#[derive(Debug, Default)]
struct EditCounts {
    added: usize,
    moved: usize,
    deleted: usize,
    properties: usize,
    references: usize,
}

/// Where a node sits in the live tree.
struct Placement<N> {
    parent: Option<N>,
    role: Option<Role>,
    index: usize,
}

/// A node attached under the wrong parent or role.
struct PendingMove<'s, N> {
    node: N,
    spec: &'s NodeData,
    parent_spec: &'s NodeData,
    target: N,
}

/// First pending move whose target is not inside the moved subtree.
fn next_applicable_move<T: LiveTree>(
    tree: &T,
    pending: &[PendingMove<'_, T::NodeRef>],
) -> Option<usize> {
    pending
        .iter()
        .position(|m| !tree.is_ancestor_of(&m.node, &m.target))
}

/// State of a single import call.
struct ImportRun<'t, 's, T: LiveTree, O> {
    tree: &'t mut T,
    observer: O,
    strict_references: bool,
    spec_root: &'s NodeData,
    root: T::NodeRef,
    spec_by_id: HashMap<&'s str, SpecEntry<'s>>,
    /// Live nodes by identity, as they were before any structural edit
    existing_by_id: HashMap<OriginalId, T::NodeRef>,
    created: Vec<T::NodeRef>,
    created_by_id: HashMap<&'s str, T::NodeRef>,
    /// Every node by identity once additions and moves are done
    ref_by_id: HashMap<OriginalId, T::NodeRef>,
    counts: EditCounts,
}

impl<'t, 's, T: LiveTree, O: ImportObserver> ImportRun<'t, 's, T, O> {
    fn execute(&mut self) -> Result<()> {
        let root = self.root.clone();
        let spec_root = self.spec_root;

        self.sync_identity(&root, spec_root)?;
        self.sync_properties(&root, spec_root)?;

        let snapshot = self.tree.descendants(&root);
        self.existing_by_id = index::build_existing_index(&*self.tree, &snapshot)?;
        tracing::debug!(existing = snapshot.len(), "indexed live nodes");

        for node in &snapshot {
            if let Some(spec) = self.spec_for(node) {
                self.sync_properties(node, spec)?;
            }
        }

        self.sort_existing_children(&snapshot)?;
        tracing::debug!(moved = self.counts.moved, "sorted existing children");

        self.add_missing_children(spec_root, &root)?;
        tracing::debug!(added = self.counts.added, "added missing children");

        self.move_across_parents()?;

        // Only nodes that survive the deletion pass may be reference targets.
        let mut kept = Vec::with_capacity(1 + snapshot.len() + self.created.len());
        kept.push((root.clone(), spec_root));
        for node in snapshot.iter().chain(self.created.iter()) {
            if let Some(spec) = self.spec_for(node) {
                kept.push((node.clone(), spec));
            }
        }
        self.ref_by_id =
            index::build_ref_index(&*self.tree, kept.iter().map(|(node, _)| node))?;
        for (node, spec) in &kept {
            self.sync_references(node, spec)?;
        }
        tracing::debug!(references = self.counts.references, "synced references");

        self.delete_extra_children(&root)?;

        tracing::info!(
            added = self.counts.added,
            moved = self.counts.moved,
            deleted = self.counts.deleted,
            properties = self.counts.properties,
            references = self.counts.references,
            "import finished"
        );
        Ok(())
    }

    /// Specification counterpart of a live node.
    fn spec_for(&self, node: &T::NodeRef) -> Option<&'s NodeData> {
        if *node == self.root {
            return Some(self.spec_root);
        }
        let id = self.tree.original_id(node)?;
        self.spec_by_id
            .get(id.as_str())
            .map(|entry| entry.node)
            .filter(|spec| !std::ptr::eq(*spec, self.spec_root))
    }

    /// Live counterpart of a specification node, once it exists.
    fn live_for(&self, spec: &NodeData) -> Option<T::NodeRef> {
        if std::ptr::eq(spec, self.spec_root) {
            return Some(self.root.clone());
        }
        let id = spec.original_id()?;
        self.existing_by_id
            .get(id)
            .or_else(|| self.created_by_id.get(id))
            .cloned()
    }

    /// Identities of a live parent's children in `role`, skipping `except`.
    fn sibling_ids(
        &self,
        parent: &T::NodeRef,
        role: Option<&str>,
        except: Option<&T::NodeRef>,
    ) -> Vec<Option<OriginalId>> {
        self.tree
            .children(parent, role)
            .iter()
            .filter(|child| Some(*child) != except)
            .map(|child| self.tree.original_id(child))
            .collect()
    }

    fn placement(&self, node: &T::NodeRef) -> Placement<T::NodeRef> {
        Placement {
            parent: self.tree.parent(node),
            role: self.tree.role_in_parent(node),
            index: self.tree.index(node),
        }
    }

    fn sync_identity(&mut self, node: &T::NodeRef, spec: &NodeData) -> Result<()> {
        let Some(expected) = spec.original_id() else {
            return Ok(());
        };
        match self.tree.original_id(node) {
            Some(actual) if actual == expected => Ok(()),
            Some(actual) => Err(Error::IdentityMismatch {
                expected: expected.to_string(),
                actual,
            }),
            None => self.tree.set_property(node, ID_PROPERTY_KEY, Some(expected)),
        }
    }

    fn sync_properties(&mut self, node: &T::NodeRef, spec: &NodeData) -> Result<()> {
        for (role, value) in &spec.properties {
            if role == ID_PROPERTY_KEY {
                continue;
            }
            if self.tree.property(node, role).as_deref() != Some(value.as_str()) {
                self.tree.set_property(node, role, Some(value))?;
                self.property_changed(node, role);
            }
        }
        for role in self.tree.property_roles(node) {
            if role != ID_PROPERTY_KEY && !spec.properties.contains_key(&role) {
                self.tree.set_property(node, &role, None)?;
                self.property_changed(node, &role);
            }
        }
        Ok(())
    }

    fn sort_existing_children(&mut self, snapshot: &[T::NodeRef]) -> Result<()> {
        let parents = std::iter::once(self.root.clone()).chain(snapshot.iter().cloned());
        for parent in parents {
            let Some(spec) = self.spec_for(&parent) else {
                continue;
            };
            for role in spec.child_roles() {
                let siblings = spec_siblings(spec, role);
                for (raw, id) in siblings.iter().enumerate() {
                    let Some(child) = self.existing_by_id.get(*id).cloned() else {
                        continue;
                    };
                    if self.tree.parent(&child).as_ref() != Some(&parent)
                        || self.tree.role_in_parent(&child).as_deref() != role
                    {
                        continue;
                    }

                    let live = self.sibling_ids(&parent, role, Some(&child));
                    let target = corrected_index(&siblings, raw, &live);
                    if self.tree.index(&child) == target {
                        continue;
                    }

                    let old = O::ENABLED.then(|| self.placement(&child));
                    self.tree.move_child(&parent, role, target, &child)?;
                    self.node_moved(&child, old);
                }
            }
        }
        Ok(())
    }

    fn add_missing_children(&mut self, spec: &'s NodeData, parent: &T::NodeRef) -> Result<()> {
        for role in spec.child_roles() {
            let siblings = spec_siblings(spec, role);
            for (raw, child_spec) in spec.children_in_role(role).enumerate() {
                let Some(id) = child_spec.original_id() else {
                    continue;
                };
                let child = match self.existing_by_id.get(id) {
                    Some(existing) => existing.clone(),
                    None => self.create_child(parent, role, &siblings, raw, child_spec)?,
                };
                self.add_missing_children(child_spec, &child)?;
            }
        }
        Ok(())
    }

    fn create_child(
        &mut self,
        parent: &T::NodeRef,
        role: Option<&str>,
        siblings: &[&str],
        raw: usize,
        spec: &'s NodeData,
    ) -> Result<T::NodeRef> {
        let id = spec
            .original_id()
            .ok_or_else(|| Error::InvalidData("specification node without identity".into()))?;

        let live = self.sibling_ids(parent, role, None);
        let index = corrected_index(siblings, raw, &live);
        let child = self
            .tree
            .add_new_child(parent, role, index, spec.concept.as_deref())?;
        self.tree.set_property(&child, ID_PROPERTY_KEY, Some(id))?;

        self.counts.added += 1;
        if O::ENABLED {
            let parent_id = self.tree.original_id(parent);
            self.observer.node_added(Addition {
                node_id: id.to_string(),
                parent_id,
                role: role.map(str::to_string),
                index,
                concept: spec.concept.clone(),
            });
        }

        self.created_by_id.insert(id, child.clone());
        self.created.push(child.clone());
        self.sync_properties(&child, spec)?;
        Ok(child)
    }

    fn move_across_parents(&mut self) -> Result<()> {
        let mut pending = Vec::new();
        let mut stack = vec![self.spec_root];
        while let Some(parent_spec) = stack.pop() {
            for spec in &parent_spec.children {
                let Some(node) = spec
                    .original_id()
                    .and_then(|id| self.existing_by_id.get(id))
                    .cloned()
                else {
                    continue;
                };
                let target = self.live_for(parent_spec).ok_or_else(|| {
                    Error::NodeNotFound(parent_spec.original_id().unwrap_or_default().to_string())
                })?;
                if self.tree.parent(&node).as_ref() != Some(&target)
                    || self.tree.role_in_parent(&node) != spec.role
                {
                    pending.push(PendingMove {
                        node,
                        spec,
                        parent_spec,
                        target,
                    });
                }
            }
            stack.extend(parent_spec.children.iter().rev());
        }
        tracing::debug!(pending = pending.len(), "moving nodes across parents");

        while !pending.is_empty() {
            let Some(position) = next_applicable_move(&*self.tree, &pending) else {
                let stuck = pending
                    .iter()
                    .filter_map(|m| m.spec.original_id())
                    .map(str::to_string)
                    .collect();
                return Err(Error::CyclicMove(stuck));
            };
            let m = pending.remove(position);

            let role = m.spec.role.as_deref();
            let siblings = spec_siblings(m.parent_spec, role);
            let raw = siblings
                .iter()
                .position(|id| Some(*id) == m.spec.original_id())
                .unwrap_or(siblings.len());
            let live = self.sibling_ids(&m.target, role, Some(&m.node));
            let index = corrected_index(&siblings, raw, &live);

            let old = O::ENABLED.then(|| self.placement(&m.node));
            self.tree.move_child(&m.target, role, index, &m.node)?;
            self.node_moved(&m.node, old);
        }
        Ok(())
    }

    fn sync_references(&mut self, node: &T::NodeRef, spec: &NodeData) -> Result<()> {
        for (role, target_id) in &spec.references {
            let target = self.ref_by_id.get(target_id).cloned();
            if target.is_none() {
                let node_id = self.tree.original_id(node).unwrap_or_default();
                if self.strict_references {
                    return Err(Error::UnresolvedReference {
                        node: node_id,
                        role: role.clone(),
                        target: target_id.clone(),
                    });
                }
                tracing::warn!(node = %node_id, %role, target = %target_id, "clearing unresolved reference");
            }
            if self.tree.reference_target(node, role) != target {
                self.tree.set_reference_target(node, role, target.as_ref())?;
                self.reference_changed(node, role);
            }
        }
        for role in self.tree.reference_roles(node) {
            if !spec.references.contains_key(&role)
                && self.tree.reference_target(node, &role).is_some()
            {
                self.tree.set_reference_target(node, &role, None)?;
                self.reference_changed(node, &role);
            }
        }
        Ok(())
    }

    fn delete_extra_children(&mut self, parent: &T::NodeRef) -> Result<()> {
        for child in self.tree.all_children(parent) {
            if self.spec_for(&child).is_none() {
                self.delete_child(parent, &child)?;
            }
        }
        // Re-read: the list above still holds the removed children.
        for child in self.tree.all_children(parent) {
            self.delete_extra_children(&child)?;
        }
        Ok(())
    }

    fn delete_child(&mut self, parent: &T::NodeRef, child: &T::NodeRef) -> Result<()> {
        let event = O::ENABLED.then(|| Deletion {
            node_id: self.tree.original_id(child),
            parent_id: self.tree.original_id(parent),
            role: self.tree.role_in_parent(child),
            descendant_ids: self
                .tree
                .descendants(child)
                .iter()
                .filter_map(|d| self.tree.original_id(d))
                .collect(),
        });
        self.tree.remove_child(parent, child)?;

        self.counts.deleted += 1;
        if let Some(event) = event {
            self.observer.node_deleted(event);
        }
        Ok(())
    }

    fn node_moved(&mut self, node: &T::NodeRef, old: Option<Placement<T::NodeRef>>) {
        self.counts.moved += 1;
        let Some(old) = old else {
            return;
        };
        let new = self.placement(node);
        let node_id = self.tree.original_id(node).unwrap_or_default();
        let old_parent_id = old.parent.and_then(|p| self.tree.original_id(&p));
        let new_parent_id = new.parent.and_then(|p| self.tree.original_id(&p));
        self.observer.node_moved(Move {
            node_id,
            old_parent_id,
            new_parent_id,
            old_role: old.role,
            new_role: new.role,
            old_index: old.index,
            new_index: new.index,
        });
    }

    fn property_changed(&mut self, node: &T::NodeRef, role: &str) {
        self.counts.properties += 1;
        if O::ENABLED {
            let node_id = self.tree.original_id(node);
            self.observer.property_changed(PropertyChange {
                node_id,
                role: role.to_string(),
            });
        }
    }

    fn reference_changed(&mut self, node: &T::NodeRef, role: &str) {
        self.counts.references += 1;
        if O::ENABLED {
            let node_id = self.tree.original_id(node);
            self.observer.reference_changed(ReferenceChange {
                node_id,
                role: role.to_string(),
            });
        }
    }
}
