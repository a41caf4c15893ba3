//! Basket: the bundle of entity and edge sets that flows through rules

use crate::entity::{EntityCategory, EntityKey};
use crate::error::{Error, Result};
use crate::set::{EdgeSet, EntitySet};

/// One entity set per category and one edge set per ordered category pair.
///
/// Every member always exists, so two baskets can only disagree on the
/// identifier schema of their edge sets. Binary operations check that first
/// and leave both operands untouched on mismatch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Basket {
    nodes: EntitySet,
    groups: EntitySet,
    nodes_nodes: EdgeSet,
    nodes_groups: EdgeSet,
    groups_nodes: EdgeSet,
    groups_groups: EdgeSet,
}

impl Default for Basket {
    fn default() -> Self {
        Self::new()
    }
}

impl Basket {
    /// Empty basket with default edge schemas
    pub fn new() -> Self {
        use EntityCategory::{Group, Node};
        Self {
            nodes: EntitySet::new(Node),
            groups: EntitySet::new(Group),
            nodes_nodes: EdgeSet::for_pair(Node, Node),
            nodes_groups: EdgeSet::for_pair(Node, Group),
            groups_nodes: EdgeSet::for_pair(Group, Node),
            groups_groups: EdgeSet::for_pair(Group, Group),
        }
    }

    /// Seed the node set
    pub fn with_nodes<I>(mut self, nodes: I) -> Result<Self>
    where
        I: IntoIterator,
        I::Item: EntityKey,
    {
        self.nodes.set_entities(nodes)?;
        Ok(self)
    }

    /// Seed the group set
    pub fn with_groups<I>(mut self, groups: I) -> Result<Self>
    where
        I: IntoIterator,
        I::Item: EntityKey,
    {
        self.groups.set_entities(groups)?;
        Ok(self)
    }

    /// Replace the edge set for the pair `edges` is bound to
    pub fn with_edges(mut self, edges: EdgeSet) -> Self {
        let (source, target) = (edges.source_category(), edges.target_category());
        *self.edges_mut(source, target) = edges;
        self
    }

    pub fn entities(&self, category: EntityCategory) -> &EntitySet {
        match category {
            EntityCategory::Node => &self.nodes,
            EntityCategory::Group => &self.groups,
        }
    }

    pub fn entities_mut(&mut self, category: EntityCategory) -> &mut EntitySet {
        match category {
            EntityCategory::Node => &mut self.nodes,
            EntityCategory::Group => &mut self.groups,
        }
    }

    pub fn edges(&self, source: EntityCategory, target: EntityCategory) -> &EdgeSet {
        use EntityCategory::{Group, Node};
        match (source, target) {
            (Node, Node) => &self.nodes_nodes,
            (Node, Group) => &self.nodes_groups,
            (Group, Node) => &self.groups_nodes,
            (Group, Group) => &self.groups_groups,
        }
    }

    pub fn edges_mut(&mut self, source: EntityCategory, target: EntityCategory) -> &mut EdgeSet {
        use EntityCategory::{Group, Node};
        match (source, target) {
            (Node, Node) => &mut self.nodes_nodes,
            (Node, Group) => &mut self.nodes_groups,
            (Group, Node) => &mut self.groups_nodes,
            (Group, Group) => &mut self.groups_groups,
        }
    }

    pub fn nodes(&self) -> &EntitySet {
        &self.nodes
    }

    pub fn groups(&self) -> &EntitySet {
        &self.groups
    }

    /// Node-to-node link records
    pub fn links(&self) -> &EdgeSet {
        &self.nodes_nodes
    }

    fn edge_members(&self) -> [&EdgeSet; 4] {
        [
            &self.nodes_nodes,
            &self.nodes_groups,
            &self.groups_nodes,
            &self.groups_groups,
        ]
    }

    /// Total number of ids and edge records across all members
    pub fn len(&self) -> usize {
        self.nodes.len()
            + self.groups.len()
            + self.edge_members().iter().map(|e| e.len()).sum::<usize>()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn copy(&self, with_data: bool) -> Self {
        Self {
            nodes: self.nodes.copy(with_data),
            groups: self.groups.copy(with_data),
            nodes_nodes: self.nodes_nodes.copy(with_data),
            nodes_groups: self.nodes_groups.copy(with_data),
            groups_nodes: self.groups_nodes.copy(with_data),
            groups_groups: self.groups_groups.copy(with_data),
        }
    }

    /// Empty basket with the same member schemas
    pub fn template(&self) -> Self {
        self.copy(false)
    }

    /// Empty every member in place
    pub fn clear(&mut self) {
        self.nodes.clear();
        self.groups.clear();
        self.nodes_nodes.clear();
        self.nodes_groups.clear();
        self.groups_nodes.clear();
        self.groups_groups.clear();
    }

    /// Overwrite every member with a copy of `other`'s
    pub fn replace_with(&mut self, other: &Self) -> Result<()> {
        self.check_compatible(other)?;
        *self = other.clone();
        Ok(())
    }

    fn check_compatible(&self, other: &Self) -> Result<()> {
        for (mine, theirs) in self.edge_members().iter().zip(other.edge_members()) {
            if mine.identifiers() != theirs.identifiers() {
                return Err(Error::SchemaMismatch {
                    left: mine.schema(),
                    right: theirs.schema(),
                });
            }
        }
        Ok(())
    }

    /// Field-wise in-place union
    pub fn extend_from(&mut self, other: &Self) -> Result<()> {
        self.check_compatible(other)?;
        self.nodes.extend_from(&other.nodes)?;
        self.groups.extend_from(&other.groups)?;
        self.nodes_nodes.extend_from(&other.nodes_nodes)?;
        self.nodes_groups.extend_from(&other.nodes_groups)?;
        self.groups_nodes.extend_from(&other.groups_nodes)?;
        self.groups_groups.extend_from(&other.groups_groups)?;
        Ok(())
    }

    /// Field-wise in-place difference
    pub fn subtract(&mut self, other: &Self) -> Result<()> {
        self.check_compatible(other)?;
        self.nodes.subtract(&other.nodes)?;
        self.groups.subtract(&other.groups)?;
        self.nodes_nodes.subtract(&other.nodes_nodes)?;
        self.nodes_groups.subtract(&other.nodes_groups)?;
        self.groups_nodes.subtract(&other.groups_nodes)?;
        self.groups_groups.subtract(&other.groups_groups)?;
        Ok(())
    }

    pub fn union(&self, other: &Self) -> Result<Self> {
        let mut result = self.clone();
        result.extend_from(other)?;
        Ok(result)
    }

    pub fn difference(&self, other: &Self) -> Result<Self> {
        let mut result = self.clone();
        result.subtract(other)?;
        Ok(result)
    }

    pub fn equals(&self, other: &Self) -> Result<bool> {
        self.check_compatible(other)?;
        Ok(self == other)
    }
}

impl std::fmt::Display for Basket {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "nodes={} groups={} nodes_nodes={} nodes_groups={} groups_nodes={} groups_groups={}",
            self.nodes.len(),
            self.groups.len(),
            self.nodes_nodes.len(),
            self.nodes_groups.len(),
            self.groups_nodes.len(),
            self.groups_groups.len()
        )
    }
}
