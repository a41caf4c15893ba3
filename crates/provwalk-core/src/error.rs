//! Error types for Provwalk Core

use crate::entity::{EntityCategory, EntityId};
use thiserror::Error;

/// Result type alias using Provwalk's Error
pub type Result<T> = std::result::Result<T, Error>;

/// Provwalk error types
#[derive(Error, Debug)]
pub enum Error {
    #[error("Category mismatch: expected {expected}, found {found}")]
    CategoryMismatch {
        expected: EntityCategory,
        found: EntityCategory,
    },

    #[error("Malformed edge: expected {expected} fields, found {found}")]
    MalformedEdge { expected: usize, found: usize },

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Edge schema mismatch: {left} vs {right}")]
    SchemaMismatch { left: String, right: String },

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Unrecognized graph traversal rules: {}", .0.join(", "))]
    UnknownRules(Vec<String>),

    #[error("Ids not in the database, prune them before this call: {}", format_ids(.0))]
    NotFound(Vec<EntityId>),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

fn format_ids(ids: &[EntityId]) -> String {
    ids.iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}
