//! Entity (node and group) types

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};

/// Primary key of an entity in the backing store
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntityId(pub i64);

impl From<i64> for EntityId {
    fn from(id: i64) -> Self {
        Self(id)
    }
}

impl std::fmt::Display for EntityId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The closed set of entity categories a set can be bound to
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntityCategory {
    Node,
    Group,
}

impl std::fmt::Display for EntityCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Node => write!(f, "node"),
            Self::Group => write!(f, "group"),
        }
    }
}

/// Provenance role of a node
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeKind {
    Data,
    Calculation,
    Workflow,
}

impl std::fmt::Display for NodeKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Data => write!(f, "data"),
            Self::Calculation => write!(f, "calculation"),
            Self::Workflow => write!(f, "workflow"),
        }
    }
}

/// A provenance node (data, calculation or workflow)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GraphNode {
    pub id: EntityId,
    pub kind: NodeKind,
    #[serde(default)]
    pub label: String,
}

impl GraphNode {
    pub fn new(id: impl Into<EntityId>, kind: NodeKind) -> Self {
        Self {
            id: id.into(),
            kind,
            label: String::new(),
        }
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = label.into();
        self
    }
}

/// A named collection of nodes
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GraphGroup {
    pub id: EntityId,
    pub label: String,
}

impl GraphGroup {
    pub fn new(id: impl Into<EntityId>, label: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            label: label.into(),
        }
    }
}

/// Anything that can be reduced to the key of an entity of a given category.
///
/// Raw ids are accepted for any category; domain objects only for their own.
pub trait EntityKey {
    fn entity_key(&self, category: EntityCategory) -> Result<EntityId>;
}

impl EntityKey for EntityId {
    fn entity_key(&self, _category: EntityCategory) -> Result<EntityId> {
        Ok(*self)
    }
}

impl EntityKey for i64 {
    fn entity_key(&self, _category: EntityCategory) -> Result<EntityId> {
        Ok(EntityId(*self))
    }
}

impl EntityKey for GraphNode {
    fn entity_key(&self, category: EntityCategory) -> Result<EntityId> {
        match category {
            EntityCategory::Node => Ok(self.id),
            other => Err(Error::InvalidInput(format!(
                "node {} is not an entity of category {}",
                self.id, other
            ))),
        }
    }
}

impl EntityKey for GraphGroup {
    fn entity_key(&self, category: EntityCategory) -> Result<EntityId> {
        match category {
            EntityCategory::Group => Ok(self.id),
            other => Err(Error::InvalidInput(format!(
                "group {} is not an entity of category {}",
                self.id, other
            ))),
        }
    }
}

impl<T: EntityKey + ?Sized> EntityKey for &T {
    fn entity_key(&self, category: EntityCategory) -> Result<EntityId> {
        (**self).entity_key(category)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_raw_ids_fit_any_category() {
        assert_eq!(5i64.entity_key(EntityCategory::Group).unwrap(), EntityId(5));
        assert_eq!(
            EntityId(9).entity_key(EntityCategory::Node).unwrap(),
            EntityId(9)
        );
    }

    #[test]
    fn test_domain_objects_check_category() {
        let node = GraphNode::new(1, NodeKind::Data).with_label("structure");
        let group = GraphGroup::new(2, "relaxations");

        assert_eq!(node.entity_key(EntityCategory::Node).unwrap(), EntityId(1));
        let result = node.entity_key(EntityCategory::Group);
        assert!(matches!(result, Err(Error::InvalidInput(_))));
        assert_eq!(
            group.entity_key(EntityCategory::Group).unwrap(),
            EntityId(2)
        );
        assert!(group.entity_key(EntityCategory::Node).is_err());
    }
}
