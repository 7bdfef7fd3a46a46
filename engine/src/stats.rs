//! Observation of the edits performed by an import.
//!
//! The importer reports every structural, property and reference edit to an
//! [`ImportObserver`]. `()` is the disabled observer: its `ENABLED` constant is
//! `false`, so the importer never even builds the event values.
//! [`ImportStats`] records everything for inspection and testing.

use crate::{OriginalId, Role};
use serde::{Deserialize, Serialize};

/// A node created by the importer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Addition {
    pub node_id: OriginalId,
    pub parent_id: Option<OriginalId>,
    pub role: Option<Role>,
    pub index: usize,
    pub concept: Option<String>,
}

/// A live node removed together with its subtree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Deletion {
    pub node_id: Option<OriginalId>,
    pub parent_id: Option<OriginalId>,
    pub role: Option<Role>,
    /// Identities of every removed descendant, in pre-order
    pub descendant_ids: Vec<OriginalId>,
}

/// A node relocated to another position, role or parent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Move {
    pub node_id: OriginalId,
    pub old_parent_id: Option<OriginalId>,
    pub new_parent_id: Option<OriginalId>,
    pub old_role: Option<Role>,
    pub new_role: Option<Role>,
    pub old_index: usize,
    pub new_index: usize,
}

/// A property set or removed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PropertyChange {
    pub node_id: Option<OriginalId>,
    pub role: Role,
}

/// A reference set or cleared.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReferenceChange {
    pub node_id: Option<OriginalId>,
    pub role: Role,
}

/// Receiver of import edit events.
pub trait ImportObserver {
    /// When `false` the importer skips building events entirely.
    const ENABLED: bool = true;

    fn node_added(&mut self, _event: Addition) {}
    fn node_deleted(&mut self, _event: Deletion) {}
    fn node_moved(&mut self, _event: Move) {}
    fn property_changed(&mut self, _event: PropertyChange) {}
    fn reference_changed(&mut self, _event: ReferenceChange) {}
}

impl ImportObserver for () {
    const ENABLED: bool = false;
}

impl<O: ImportObserver + ?Sized> ImportObserver for &mut O {
    const ENABLED: bool = O::ENABLED;

    fn node_added(&mut self, event: Addition) {
        (**self).node_added(event)
    }

    fn node_deleted(&mut self, event: Deletion) {
        (**self).node_deleted(event)
    }

    fn node_moved(&mut self, event: Move) {
        (**self).node_moved(event)
    }

    fn property_changed(&mut self, event: PropertyChange) {
        (**self).property_changed(event)
    }

    fn reference_changed(&mut self, event: ReferenceChange) {
        (**self).reference_changed(event)
    }
}

/// Every edit recorded by one or more imports.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportStats {
    pub additions: Vec<Addition>,
    pub deletions: Vec<Deletion>,
    pub moves: Vec<Move>,
    pub property_changes: Vec<PropertyChange>,
    pub reference_changes: Vec<ReferenceChange>,
}

/// Edit counts of an [`ImportStats`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatsSummary {
    pub additions: usize,
    pub deletions: usize,
    pub moves: usize,
    pub property_changes: usize,
    pub reference_changes: usize,
}

impl StatsSummary {
    pub fn total(&self) -> usize {
        self.additions + self.deletions + self.moves + self.property_changes + self.reference_changes
    }
}

impl ImportStats {
    pub fn new() -> Self {
        Self::default()
    }

    /// Total number of recorded edits.
    pub fn total(&self) -> usize {
        self.summary().total()
    }

    /// Check if no edit was recorded.
    pub fn is_empty(&self) -> bool {
        self.total() == 0
    }

    pub fn summary(&self) -> StatsSummary {
        StatsSummary {
            additions: self.additions.len(),
            deletions: self.deletions.len(),
            moves: self.moves.len(),
            property_changes: self.property_changes.len(),
            reference_changes: self.reference_changes.len(),
        }
    }

    /// Forget everything recorded so far.
    pub fn clear(&mut self) {
        *self = Self::default();
    }
}

impl ImportObserver for ImportStats {
    fn node_added(&mut self, event: Addition) {
        self.additions.push(event);
    }

    fn node_deleted(&mut self, event: Deletion) {
        self.deletions.push(event);
    }

    fn node_moved(&mut self, event: Move) {
        self.moves.push(event);
    }

    fn property_changed(&mut self, event: PropertyChange) {
        self.property_changes.push(event);
    }

    fn reference_changed(&mut self, event: ReferenceChange) {
        self.reference_changes.push(event);
    }
}
