//! Specification nodes: the portable, serialized shape of a tree.
//!
//! A [`NodeData`] tree describes the desired state of a live tree. It is also
//! what the exporter produces, so an exported snapshot can be fed straight back
//! into the importer. Properties and references use `BTreeMap` so serialization
//! order is deterministic.

use crate::{error::Result, Error, OriginalId, Role};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Reserved property holding a live node's stable identity.
///
/// It is never diffed as a regular property and never removed by the importer.
pub const ID_PROPERTY_KEY: &str = "#originalRef#";

/// One node of a specification tree.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeData {
    /// Stable identity used to match this node against live nodes
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<OriginalId>,
    /// Concept (type) used when the node has to be created
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub concept: Option<String>,
    /// Role of this node within its parent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<Role>,
    /// Ordered children across all roles
    #[serde(default)]
    pub children: Vec<NodeData>,
    /// Property values by role
    #[serde(default)]
    pub properties: BTreeMap<Role, String>,
    /// Reference targets by role, as stable identities
    #[serde(default)]
    pub references: BTreeMap<Role, OriginalId>,
}

impl NodeData {
    /// Create a node with the given identity.
    pub fn new(id: impl Into<OriginalId>) -> Self {
        Self {
            id: Some(id.into()),
            ..Self::default()
        }
    }

    /// Create a node without an identity.
    pub fn anonymous() -> Self {
        Self::default()
    }

    pub fn with_role(mut self, role: impl Into<Role>) -> Self {
        self.role = Some(role.into());
        self
    }

    pub fn with_concept(mut self, concept: impl Into<String>) -> Self {
        self.concept = Some(concept.into());
        self
    }

    pub fn with_property(mut self, role: impl Into<Role>, value: impl Into<String>) -> Self {
        self.properties.insert(role.into(), value.into());
        self
    }

    pub fn with_reference(mut self, role: impl Into<Role>, target: impl Into<OriginalId>) -> Self {
        self.references.insert(role.into(), target.into());
        self
    }

    pub fn with_child(mut self, child: NodeData) -> Self {
        self.children.push(child);
        self
    }

    /// The node's stable identity.
    ///
    /// Falls back to an identity embedded as the reserved property when `id`
    /// is absent.
    pub fn original_id(&self) -> Option<&str> {
        self.id
            .as_deref()
            .or_else(|| self.properties.get(ID_PROPERTY_KEY).map(String::as_str))
    }

    /// Children filled into a given role, in order.
    pub fn children_in_role<'a>(
        &'a self,
        role: Option<&'a str>,
    ) -> impl Iterator<Item = &'a NodeData> + 'a {
        self.children
            .iter()
            .filter(move |child| child.role.as_deref() == role)
    }

    /// Distinct child roles in order of first appearance.
    pub fn child_roles(&self) -> Vec<Option<&str>> {
        let mut roles: Vec<Option<&str>> = Vec::new();
        for child in &self.children {
            let role = child.role.as_deref();
            if !roles.contains(&role) {
                roles.push(role);
            }
        }
        roles
    }

    /// Total number of nodes in this subtree, including this one.
    pub fn node_count(&self) -> usize {
        1 + self.children.iter().map(NodeData::node_count).sum::<usize>()
    }

    /// Whether every node below this one carries an identity.
    pub fn descendants_have_ids(&self) -> bool {
        self.children
            .iter()
            .all(|child| child.original_id().is_some() && child.descendants_have_ids())
    }

    /// Parse a specification tree from JSON.
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(|e| Error::InvalidData(e.to_string()))
    }

    /// Serialize to JSON.
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string(self).map_err(|e| Error::InvalidData(e.to_string()))
    }

    /// Serialize to pretty JSON.
    pub fn to_json_pretty(&self) -> Result<String> {
        serde_json::to_string_pretty(self).map_err(|e| Error::InvalidData(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn original_id_prefers_explicit_id() {
        let node = NodeData::new("a").with_property(ID_PROPERTY_KEY, "b");
        assert_eq!(node.original_id(), Some("a"));

        let embedded = NodeData::anonymous().with_property(ID_PROPERTY_KEY, "b");
        assert_eq!(embedded.original_id(), Some("b"));

        assert_eq!(NodeData::anonymous().original_id(), None);
    }

    #[test]
    fn children_grouped_by_role() {
        let node = NodeData::new("root")
            .with_child(NodeData::new("a").with_role("items"))
            .with_child(NodeData::new("b").with_role("other"))
            .with_child(NodeData::new("c").with_role("items"))
            .with_child(NodeData::new("d"));

        assert_eq!(node.child_roles(), vec![Some("items"), Some("other"), None]);

        let items: Vec<_> = node
            .children_in_role(Some("items"))
            .filter_map(NodeData::original_id)
            .collect();
        assert_eq!(items, vec!["a", "c"]);
        assert_eq!(node.node_count(), 5);
    }

    #[test]
    fn descendants_have_ids() {
        let complete = NodeData::anonymous().with_child(NodeData::new("a"));
        assert!(complete.descendants_have_ids());

        let incomplete =
            NodeData::new("root").with_child(NodeData::new("a").with_child(NodeData::anonymous()));
        assert!(!incomplete.descendants_have_ids());
    }

    #[test]
    fn parse_wire_format_with_defaults() {
        let json = r#"{
            "id": "root",
            "children": [
                {"id": "a", "role": "items", "concept": "Item", "properties": {"name": "A"}},
                {"id": "b", "role": "items", "references": {"next": "a"}}
            ]
        }"#;

        let data = NodeData::from_json(json).unwrap();
        assert_eq!(data.id.as_deref(), Some("root"));
        assert!(data.properties.is_empty());
        assert_eq!(data.children.len(), 2);
        assert_eq!(data.children[0].concept.as_deref(), Some("Item"));
        assert_eq!(data.children[0].properties["name"], "A");
        assert_eq!(data.children[1].references["next"], "a");
        assert!(data.children[1].children.is_empty());
    }

    #[test]
    fn parse_rejects_malformed_json() {
        let err = NodeData::from_json("{\"children\": 3}").unwrap_err();
        assert!(matches!(err, Error::InvalidData(_)));
    }

    #[test]
    fn json_omits_absent_fields() {
        let json = NodeData::new("a").to_json().unwrap();
        assert_eq!(
            json,
            r#"{"id":"a","children":[],"properties":{},"references":{}}"#
        );
    }
}
