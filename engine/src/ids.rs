//! Identity assignment for specification nodes that arrive without one.
//!
//! Matching between a specification and a live tree is purely by stable
//! identity, so every node below the specification root needs one before
//! indexing. Nodes that already carry an identity are never touched.

use crate::{NodeData, OriginalId};
use serde::{Deserialize, Serialize};
use std::borrow::Cow;

/// Assigns stable identities to anonymous specification nodes.
pub trait IdPolicy {
    /// Identity for the node at `index` among the `role` children of the
    /// node identified by `parent_id`.
    fn assign(&mut self, parent_id: &str, role: Option<&str>, index: usize) -> OriginalId;
}

/// Built-in identity policies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IdScheme {
    /// Derive the identity from the parent identity, role and index (default).
    ///
    /// Deterministic: importing the same anonymous spec twice is idempotent.
    #[default]
    Positional,
    /// A fresh random UUID per node and per call.
    Random,
}

impl IdPolicy for IdScheme {
    fn assign(&mut self, parent_id: &str, role: Option<&str>, index: usize) -> OriginalId {
        match self {
            IdScheme::Positional => format!("{}/{}[{}]", parent_id, role.unwrap_or_default(), index),
            IdScheme::Random => uuid::Uuid::new_v4().to_string(),
        }
    }
}

impl<F> IdPolicy for F
where
    F: FnMut(&str, Option<&str>, usize) -> OriginalId,
{
    fn assign(&mut self, parent_id: &str, role: Option<&str>, index: usize) -> OriginalId {
        self(parent_id, role, index)
    }
}

/// Return `data` with identities filled in below the root.
///
/// Borrows when nothing is missing.
pub fn with_assigned_ids<'a>(data: &'a NodeData, policy: &mut dyn IdPolicy) -> Cow<'a, NodeData> {
    if data.descendants_have_ids() {
        return Cow::Borrowed(data);
    }
    let mut owned = data.clone();
    let root_id = owned.original_id().unwrap_or_default().to_string();
    assign_children(&mut owned, &root_id, policy);
    Cow::Owned(owned)
}

fn assign_children(node: &mut NodeData, parent_id: &str, policy: &mut dyn IdPolicy) {
    let roles: Vec<Option<String>> = node
        .child_roles()
        .into_iter()
        .map(|role| role.map(str::to_string))
        .collect();

    for role in roles {
        let mut index = 0;
        for child in node
            .children
            .iter_mut()
            .filter(|child| child.role == role)
        {
            if child.original_id().is_none() {
                child.id = Some(policy.assign(parent_id, role.as_deref(), index));
            }
            index += 1;
        }
    }

    for child in &mut node.children {
        let id = child.original_id().unwrap_or_default().to_string();
        assign_children(child, &id, policy);
    }
}
