//! CLI command implementations

pub mod completions;
pub mod config;
pub mod rules;
pub mod traverse;
