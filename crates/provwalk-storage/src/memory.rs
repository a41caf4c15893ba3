//! In-memory provenance graph backend
//!
//! Useful for tests, the CLI, and any graph small enough to load whole.

use crate::error::{StorageError, StorageResult};
use crate::snapshot::GraphSnapshot;
use async_trait::async_trait;
use provwalk_core::{
    Direction, EdgeFilter, EntityCategory, EntityId, EntityLookup, GraphGroup, GraphNode,
    HopRequest, HopRow, LinkType, QueryExecutor, Result,
};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::RwLock;

/// A directed provenance link between two nodes
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ProvenanceLink {
    pub input: EntityId,
    pub output: EntityId,
    pub link_type: LinkType,
    #[serde(default)]
    pub label: String,
}

impl ProvenanceLink {
    pub fn new(
        input: impl Into<EntityId>,
        output: impl Into<EntityId>,
        link_type: LinkType,
    ) -> Self {
        Self {
            input: input.into(),
            output: output.into(),
            link_type,
            label: String::new(),
        }
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = label.into();
        self
    }

    /// Value of a requested edge field
    fn field(&self, name: &str) -> StorageResult<String> {
        match name {
            "label" => Ok(self.label.clone()),
            "link_type" => Ok(self.link_type.as_str().to_string()),
            other => Err(StorageError::UnsupportedQuery(format!(
                "links have no field '{}'",
                other
            ))),
        }
    }
}

/// Membership of a node in a group
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Membership {
    pub group: EntityId,
    pub node: EntityId,
}

/// In-memory provenance graph
pub struct MemoryGraph {
    nodes: RwLock<BTreeMap<EntityId, GraphNode>>,
    groups: RwLock<BTreeMap<EntityId, GraphGroup>>,
    links: RwLock<BTreeSet<ProvenanceLink>>,
    memberships: RwLock<BTreeSet<Membership>>,
    hop_queries: AtomicUsize,
}

fn lock_error(e: impl std::fmt::Display) -> StorageError {
    StorageError::Database(format!("Lock error: {}", e))
}

impl MemoryGraph {
    pub fn new() -> Self {
        Self {
            nodes: RwLock::new(BTreeMap::new()),
            groups: RwLock::new(BTreeMap::new()),
            links: RwLock::new(BTreeSet::new()),
            memberships: RwLock::new(BTreeSet::new()),
            hop_queries: AtomicUsize::new(0),
        }
    }

    /// Build a graph from a snapshot, validating every link and membership
    pub fn from_snapshot(snapshot: GraphSnapshot) -> StorageResult<Self> {
        let graph = Self::new();
        for node in snapshot.nodes {
            graph.insert_node(node)?;
        }
        for group in snapshot.groups {
            graph.insert_group(group)?;
        }
        for link in snapshot.links {
            graph.insert_link(link)?;
        }
        for membership in snapshot.memberships {
            graph.add_to_group(membership.group, membership.node)?;
        }
        tracing::debug!(
            "Loaded graph with {} nodes and {} links",
            graph.node_count()?,
            graph.link_count()?
        );
        Ok(graph)
    }

    pub fn snapshot(&self) -> StorageResult<GraphSnapshot> {
        let nodes = self.nodes.read().map_err(lock_error)?;
        let groups = self.groups.read().map_err(lock_error)?;
        let links = self.links.read().map_err(lock_error)?;
        let memberships = self.memberships.read().map_err(lock_error)?;

        Ok(GraphSnapshot {
            nodes: nodes.values().cloned().collect(),
            groups: groups.values().cloned().collect(),
            links: links.iter().cloned().collect(),
            memberships: memberships.iter().copied().collect(),
            ..GraphSnapshot::default()
        })
    }

    pub fn insert_node(&self, node: GraphNode) -> StorageResult<()> {
        let mut nodes = self.nodes.write().map_err(lock_error)?;
        if nodes.contains_key(&node.id) {
            return Err(StorageError::DuplicateEntity(format!("node {}", node.id)));
        }
        nodes.insert(node.id, node);
        Ok(())
    }

    pub fn insert_group(&self, group: GraphGroup) -> StorageResult<()> {
        let mut groups = self.groups.write().map_err(lock_error)?;
        if groups.contains_key(&group.id) {
            return Err(StorageError::DuplicateEntity(format!("group {}", group.id)));
        }
        groups.insert(group.id, group);
        Ok(())
    }

    /// Insert a link; both endpoints must exist and match the link type's
    /// node kinds. Inserting the same link twice is a no-op.
    pub fn insert_link(&self, link: ProvenanceLink) -> StorageResult<()> {
        {
            let nodes = self.nodes.read().map_err(lock_error)?;
            let kind_of = |id: EntityId| {
                nodes
                    .get(&id)
                    .map(|node| node.kind)
                    .ok_or_else(|| StorageError::EntityNotFound(format!("node {}", id)))
            };

            let (input, output) = (kind_of(link.input)?, kind_of(link.output)?);
            if input != link.link_type.source_kind() || output != link.link_type.target_kind() {
                return Err(StorageError::InvalidLink(format!(
                    "{} link cannot connect {} {} to {} {}",
                    link.link_type, input, link.input, output, link.output
                )));
            }
        }

        self.links.write().map_err(lock_error)?.insert(link);
        Ok(())
    }

    pub fn add_to_group(
        &self,
        group: impl Into<EntityId>,
        node: impl Into<EntityId>,
    ) -> StorageResult<()> {
        let (group, node) = (group.into(), node.into());
        let groups = self.groups.read().map_err(lock_error)?;
        if !groups.contains_key(&group) {
            return Err(StorageError::EntityNotFound(format!("group {}", group)));
        }
        let nodes = self.nodes.read().map_err(lock_error)?;
        if !nodes.contains_key(&node) {
            return Err(StorageError::EntityNotFound(format!("node {}", node)));
        }

        self.memberships
            .write()
            .map_err(lock_error)?
            .insert(Membership { group, node });
        Ok(())
    }

    pub fn node(&self, id: EntityId) -> StorageResult<Option<GraphNode>> {
        Ok(self.nodes.read().map_err(lock_error)?.get(&id).cloned())
    }

    pub fn node_count(&self) -> StorageResult<usize> {
        Ok(self.nodes.read().map_err(lock_error)?.len())
    }

    pub fn link_count(&self) -> StorageResult<usize> {
        Ok(self.links.read().map_err(lock_error)?.len())
    }

    /// Number of one-hop queries answered so far
    pub fn hop_queries(&self) -> usize {
        self.hop_queries.load(Ordering::SeqCst)
    }

    fn link_rows(
        &self,
        link_types: &[LinkType],
        request: &HopRequest<'_>,
        sources: &BTreeSet<EntityId>,
    ) -> StorageResult<Vec<HopRow>> {
        let links = self.links.read().map_err(lock_error)?;
        let mut rows = Vec::new();

        for link in links.iter() {
            if !link_types.contains(&link.link_type) {
                continue;
            }
            let (from, to) = match request.direction {
                Direction::Forward => (link.input, link.output),
                Direction::Backward => (link.output, link.input),
            };
            if !sources.contains(&from) {
                continue;
            }

            rows.push(match request.edge_fields {
                Some(fields) => {
                    let extra = fields
                        .iter()
                        .map(|field| link.field(field))
                        .collect::<StorageResult<Vec<_>>>()?;
                    HopRow::edge(from, to, extra)
                }
                None => HopRow::target(to),
            });
        }

        Ok(rows)
    }

    fn membership_rows(
        &self,
        request: &HopRequest<'_>,
        sources: &BTreeSet<EntityId>,
    ) -> StorageResult<Vec<HopRow>> {
        if let Some(field) = request.edge_fields.and_then(|fields| fields.first()) {
            return Err(StorageError::UnsupportedQuery(format!(
                "memberships have no field '{}'",
                field
            )));
        }

        let from_group = match (request.source, request.target) {
            (EntityCategory::Group, EntityCategory::Node) => true,
            (EntityCategory::Node, EntityCategory::Group) => false,
            (source, target) => {
                return Err(StorageError::UnsupportedQuery(format!(
                    "no membership between {} and {}",
                    source, target
                )))
            }
        };

        let memberships = self.memberships.read().map_err(lock_error)?;
        Ok(memberships
            .iter()
            .filter_map(|m| {
                let (from, to) = if from_group {
                    (m.group, m.node)
                } else {
                    (m.node, m.group)
                };
                sources.contains(&from).then(|| {
                    if request.wants_edges() {
                        HopRow::edge(from, to, Vec::new())
                    } else {
                        HopRow::target(to)
                    }
                })
            })
            .collect())
    }
}

impl Default for MemoryGraph {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl QueryExecutor for MemoryGraph {
    async fn one_hop(&self, request: &HopRequest<'_>) -> Result<Vec<HopRow>> {
        self.hop_queries.fetch_add(1, Ordering::SeqCst);
        let sources: BTreeSet<EntityId> = request.sources.iter().copied().collect();

        let rows = match request.filter {
            EdgeFilter::Links(link_types) => {
                let (source, target) = (request.source, request.target);
                if source != EntityCategory::Node || target != EntityCategory::Node {
                    let err = StorageError::UnsupportedQuery(format!(
                        "links connect nodes, not {} and {}",
                        source, target
                    ));
                    return Err(err.into());
                }
                self.link_rows(link_types, request, &sources)?
            }
            EdgeFilter::Membership => self.membership_rows(request, &sources)?,
        };

        tracing::trace!(
            "one-hop query from {} ids: {} rows",
            sources.len(),
            rows.len()
        );
        Ok(rows)
    }
}

#[async_trait]
impl EntityLookup for MemoryGraph {
    async fn existing(
        &self,
        category: EntityCategory,
        ids: &[EntityId],
    ) -> Result<BTreeSet<EntityId>> {
        let existing = match category {
            EntityCategory::Node => {
                let nodes = self.nodes.read().map_err(lock_error)?;
                ids.iter()
                    .copied()
                    .filter(|id| nodes.contains_key(id))
                    .collect()
            }
            EntityCategory::Group => {
                let groups = self.groups.read().map_err(lock_error)?;
                ids.iter()
                    .copied()
                    .filter(|id| groups.contains_key(id))
                    .collect()
            }
        };
        Ok(existing)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use provwalk_core::{
        Basket, HopSpec, MaxIterations, NodeKind, Operation, UpdateRule, LINK_IDENTIFIERS,
    };
    use std::sync::Arc;

    fn sample() -> MemoryGraph {
        // d1 -input_calc-> c2 -create-> d3
        let graph = MemoryGraph::new();
        for (id, kind) in [
            (1i64, NodeKind::Data),
            (2, NodeKind::Calculation),
            (3, NodeKind::Data),
        ] {
            graph.insert_node(GraphNode::new(id, kind)).unwrap();
        }
        graph.insert_link(input_calc_link()).unwrap();
        let create = ProvenanceLink::new(2, 3, LinkType::Create);
        graph.insert_link(create.with_label("result")).unwrap();
        graph
    }

    fn input_calc_link() -> ProvenanceLink {
        let link = ProvenanceLink::new(1, 2, LinkType::InputCalc);
        link.with_label("x")
    }

    #[test]
    fn test_insert_link_validates_kinds() {
        let graph = sample();
        let err = graph
            .insert_link(ProvenanceLink::new(1, 3, LinkType::Create))
            .unwrap_err();
        assert!(matches!(err, StorageError::InvalidLink(_)));

        let err = graph
            .insert_link(ProvenanceLink::new(1, 99, LinkType::InputCalc))
            .unwrap_err();
        assert!(matches!(err, StorageError::EntityNotFound(_)));

        graph.insert_link(input_calc_link()).unwrap();
        assert_eq!(graph.link_count().unwrap(), 2);
    }

    #[test]
    fn test_duplicate_node_rejected() {
        let graph = sample();
        let err = graph
            .insert_node(GraphNode::new(1, NodeKind::Workflow))
            .unwrap_err();
        assert!(matches!(err, StorageError::DuplicateEntity(_)));
    }

    #[tokio::test]
    async fn test_one_hop_both_directions() {
        let graph = sample();
        let filter = EdgeFilter::Links(LinkType::ALL.to_vec());
        let fields: Vec<String> = LINK_IDENTIFIERS.iter().map(|f| f.to_string()).collect();

        let forward = graph
            .one_hop(&HopRequest {
                source: EntityCategory::Node,
                target: EntityCategory::Node,
                filter: &filter,
                direction: Direction::Forward,
                sources: &[EntityId(2)],
                edge_fields: Some(&fields),
            })
            .await
            .unwrap();
        let extra = vec!["result".to_string(), "create".to_string()];
        let expected = HopRow::edge(EntityId(2), EntityId(3), extra);
        assert_eq!(forward, vec![expected]);

        let backward = graph
            .one_hop(&HopRequest {
                source: EntityCategory::Node,
                target: EntityCategory::Node,
                filter: &filter,
                direction: Direction::Backward,
                sources: &[EntityId(2)],
                edge_fields: None,
            })
            .await
            .unwrap();
        assert_eq!(backward, vec![HopRow::target(EntityId(1))]);
        assert_eq!(graph.hop_queries(), 2);
    }

    #[tokio::test]
    async fn test_empty_sources_yield_nothing() {
        let graph = sample();
        let filter = EdgeFilter::Links(LinkType::ALL.to_vec());
        let rows = graph
            .one_hop(&HopRequest {
                source: EntityCategory::Node,
                target: EntityCategory::Node,
                filter: &filter,
                direction: Direction::Forward,
                sources: &[],
                edge_fields: None,
            })
            .await
            .unwrap();
        assert!(rows.is_empty());
    }

    #[tokio::test]
    async fn test_existing_per_category() {
        let graph = sample();
        graph.insert_group(GraphGroup::new(10, "inputs")).unwrap();

        let ids = [EntityId(1), EntityId(10), EntityId(4)];
        let nodes = graph.existing(EntityCategory::Node, &ids).await.unwrap();
        assert_eq!(nodes, BTreeSet::from([EntityId(1)]));

        let groups = graph.existing(EntityCategory::Group, &ids).await.unwrap();
        assert_eq!(groups, BTreeSet::from([EntityId(10)]));
    }

    #[tokio::test]
    async fn test_group_membership_rule() {
        let graph = Arc::new(sample());
        graph.insert_group(GraphGroup::new(10, "inputs")).unwrap();
        graph.add_to_group(10, 1).unwrap();
        graph.add_to_group(10, 3).unwrap();
        assert!(graph.add_to_group(11, 1).is_err());

        let mut members = UpdateRule::new(
            HopSpec::group_members(),
            graph.clone(),
            MaxIterations::Bounded(1),
            true,
        )
        .unwrap();
        let result = members
            .run(Basket::new().with_groups([10i64]).unwrap())
            .await
            .unwrap();

        let ids: Vec<i64> = result.nodes().keys().iter().map(|id| id.0).collect();
        assert_eq!(ids, vec![1, 3]);
        let memberships = result.edges(EntityCategory::Group, EntityCategory::Node);
        assert_eq!(memberships.len(), 2);
    }

    #[test]
    fn test_snapshot_roundtrip_preserves_graph() {
        let graph = sample();
        graph.insert_group(GraphGroup::new(10, "inputs")).unwrap();
        graph.add_to_group(10, 1).unwrap();

        let snapshot = graph.snapshot().unwrap();
        let restored = MemoryGraph::from_snapshot(snapshot.clone()).unwrap();
        assert_eq!(restored.snapshot().unwrap(), snapshot);

        let node = restored.node(EntityId(2)).unwrap().unwrap();
        assert_eq!(node.kind, NodeKind::Calculation);
    }
}
