//! JSON snapshots of a provenance graph

use crate::error::{StorageError, StorageResult};
use crate::memory::{Membership, ProvenanceLink};
use provwalk_core::{GraphGroup, GraphNode};
use serde::{Deserialize, Serialize};
use std::path::Path;

#[cfg(unix)]
use std::io::Write;
#[cfg(unix)]
use std::os::unix::fs::OpenOptionsExt;

/// Current snapshot format version
pub const SNAPSHOT_VERSION: u32 = 1;

/// Whole-graph snapshot, as read from and written to disk
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GraphSnapshot {
    #[serde(default = "default_version")]
    pub version: u32,
    #[serde(default)]
    pub nodes: Vec<GraphNode>,
    #[serde(default)]
    pub groups: Vec<GraphGroup>,
    #[serde(default)]
    pub links: Vec<ProvenanceLink>,
    #[serde(default)]
    pub memberships: Vec<Membership>,
}

fn default_version() -> u32 {
    SNAPSHOT_VERSION
}

impl Default for GraphSnapshot {
    fn default() -> Self {
        Self {
            version: SNAPSHOT_VERSION,
            nodes: Vec::new(),
            groups: Vec::new(),
            links: Vec::new(),
            memberships: Vec::new(),
        }
    }
}

impl GraphSnapshot {
    pub fn from_json(content: &str) -> StorageResult<Self> {
        let snapshot: Self = serde_json::from_str(content)?;
        if snapshot.version > SNAPSHOT_VERSION {
            return Err(StorageError::Snapshot(format!(
                "snapshot version {} is newer than supported version {}",
                snapshot.version, SNAPSHOT_VERSION
            )));
        }
        Ok(snapshot)
    }

    pub fn load(path: impl AsRef<Path>) -> StorageResult<Self> {
        let path = path.as_ref();
        tracing::info!("Loading graph snapshot from {:?}", path);
        let content = std::fs::read_to_string(path)?;
        Self::from_json(&content)
    }

    /// Write the snapshot as pretty JSON, owner read/write only on unix
    pub fn save(&self, path: impl AsRef<Path>) -> StorageResult<()> {
        let path = path.as_ref();
        let content = serde_json::to_string_pretty(self)?;

        #[cfg(unix)]
        {
            let mut file = std::fs::OpenOptions::new()
                .write(true)
                .create(true)
                .truncate(true)
                .mode(0o600)
                .open(path)?;
            file.write_all(content.as_bytes())?;
        }
        #[cfg(not(unix))]
        {
            std::fs::write(path, &content)?;
        }

        tracing::debug!(
            "Saved snapshot with {} nodes and {} links to {:?}",
            self.nodes.len(),
            self.links.len(),
            path
        );
        Ok(())
    }
}
