//! Provwalk Core - Rule engine for provenance graph traversal
//!
//! This crate provides the typed collections, expansion rules and traversal
//! APIs. The graph itself lives behind the [`QueryExecutor`] and
//! [`EntityLookup`] traits.

pub mod basket;
pub mod config;
pub mod entity;
pub mod error;
pub mod executor;
pub mod limits;
pub mod relation;
pub mod rule;
pub mod ruleset;
pub mod sequence;
pub mod set;
pub mod traversal;

pub use basket::Basket;
pub use config::EngineConfig;
pub use entity::{EntityCategory, EntityId, EntityKey, GraphGroup, GraphNode, NodeKind};
pub use error::{Error, Result};
pub use executor::{EntityLookup, HopRequest, HopRow, QueryExecutor};
pub use relation::{Direction, EdgeFilter, HopSpec, LinkType, LINK_IDENTIFIERS};
pub use rule::{MaxIterations, Operation, QueryRule, ReplaceRule, UpdateRule};
pub use ruleset::{
    validate_traversal_rules, ResolvedRules, RuleToggles, TraversalRule, TraversalRuleset,
};
pub use sequence::{new_stash, RuleSaveWalkers, RuleSequence, RuleSetWalkers, Stash};
pub use set::{EdgeRecord, EdgeSet, EntitySet};
pub use traversal::{
    MissingCallback, NodesOutput, TraversalEngine, TraversalOutput, TraversalQuery,
};
