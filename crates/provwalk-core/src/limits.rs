//! Batch limits for queries issued against the backing store

use crate::error::{Error, Result};

/// Default number of ids sent in one query (SQLite's host parameter limit)
pub const DEFAULT_MAX_BATCH_SIZE: usize = 999;

/// Largest batch any backend is expected to accept (PostgreSQL bind limit)
pub const MAX_BATCH_SIZE_LIMIT: usize = 65_535;

/// Validate a configured batch size
pub fn validate_batch_size(size: usize) -> Result<()> {
    if size == 0 {
        return Err(Error::Configuration(
            "max_batch_size must be at least 1".to_string(),
        ));
    }
    if size > MAX_BATCH_SIZE_LIMIT {
        return Err(Error::Configuration(format!(
            "max_batch_size too large: {} (max {})",
            size, MAX_BATCH_SIZE_LIMIT
        )));
    }
    Ok(())
}

/// Split `items` into consecutive batches of at most `size` elements.
///
/// An empty input yields no batches.
pub fn batches<T>(items: &[T], size: usize) -> impl Iterator<Item = &[T]> {
    items.chunks(size.max(1))
}
