//! Engine configuration

use crate::error::Result;
use crate::limits::{validate_batch_size, DEFAULT_MAX_BATCH_SIZE};
use serde::{Deserialize, Serialize};

/// Settings shared by every rule a traversal builds
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Maximum number of ids sent to the backend in a single query
    #[serde(default = "default_max_batch_size")]
    pub max_batch_size: usize,
}

fn default_max_batch_size() -> usize {
    DEFAULT_MAX_BATCH_SIZE
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_batch_size: default_max_batch_size(),
        }
    }
}

impl EngineConfig {
    pub fn with_max_batch_size(mut self, size: usize) -> Self {
        self.max_batch_size = size;
        self
    }

    pub fn validate(&self) -> Result<()> {
        validate_batch_size(self.max_batch_size)
    }
}
