//! Provwalk Storage - Reference graph backend for the rule engine
//!
//! This crate provides an in-memory provenance graph implementing the
//! engine's query traits, plus JSON snapshots to load it from disk.

pub mod error;
pub mod memory;
pub mod snapshot;

pub use error::{StorageError, StorageResult};
pub use memory::{Membership, MemoryGraph, ProvenanceLink};
pub use snapshot::{GraphSnapshot, SNAPSHOT_VERSION};
