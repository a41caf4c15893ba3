//! Boundary traits for the external graph store
//!
//! The engine never walks the graph itself. It asks a [`QueryExecutor`] for
//! one hop of neighbours from a batch of ids, and an [`EntityLookup`] which
//! starting ids exist.

use crate::entity::{EntityCategory, EntityId};
use crate::error::Result;
use crate::relation::{Direction, EdgeFilter};
use async_trait::async_trait;
use std::collections::BTreeSet;

/// One batch of a one-hop query
#[derive(Debug, Clone)]
pub struct HopRequest<'a> {
    pub source: EntityCategory,
    pub target: EntityCategory,
    pub filter: &'a EdgeFilter,
    pub direction: Direction,
    /// Ids to expand from; may be empty
    pub sources: &'a [EntityId],
    /// When set, rows must carry the source id and these extra fields
    pub edge_fields: Option<&'a [String]>,
}

impl HopRequest<'_> {
    pub fn wants_edges(&self) -> bool {
        self.edge_fields.is_some()
    }
}

/// A row returned by a one-hop query
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct HopRow {
    /// The entity reached
    pub target: EntityId,
    /// The entity it was reached from, when edges were requested
    pub source: Option<EntityId>,
    /// Values for the requested extra fields, in request order
    pub extra: Vec<String>,
}

impl HopRow {
    pub fn target(target: EntityId) -> Self {
        Self {
            target,
            source: None,
            extra: Vec::new(),
        }
    }

    pub fn edge(source: EntityId, target: EntityId, extra: Vec<String>) -> Self {
        Self {
            target,
            source: Some(source),
            extra,
        }
    }
}

/// Answers one-hop neighbour queries against the backing store
#[async_trait]
pub trait QueryExecutor: Send + Sync {
    /// Every edge matching `request.filter` from any id in `request.sources`
    /// to an entity of `request.target`, one row per edge.
    ///
    /// An empty `sources` slice must yield no rows.
    async fn one_hop(&self, request: &HopRequest<'_>) -> Result<Vec<HopRow>>;
}

/// Answers existence checks against the backing store
#[async_trait]
pub trait EntityLookup: Send + Sync {
    /// The subset of `ids` that currently exist as entities of `category`
    async fn existing(
        &self,
        category: EntityCategory,
        ids: &[EntityId],
    ) -> Result<BTreeSet<EntityId>>;
}
