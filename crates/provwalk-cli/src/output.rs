//! Output formatting utilities

use std::collections::{BTreeMap, BTreeSet};

use provwalk_core::{EdgeRecord, EntityId};
use serde::Serialize;

/// Output format
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Table,
    Json,
}

impl From<&str> for OutputFormat {
    fn from(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "json" => Self::Json,
            _ => Self::Table,
        }
    }
}

pub fn to_json<T: Serialize>(data: &T) -> anyhow::Result<String> {
    Ok(serde_json::to_string_pretty(data)?)
}

pub fn format_ids(ids: &BTreeSet<EntityId>) -> String {
    ids.iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// `input -[link_type]-> output`, with the label when there is one
pub fn format_link(record: &EdgeRecord) -> String {
    match record.extra.as_slice() {
        [label, link_type] if label.is_empty() => {
            format!("{} -[{}]-> {}", record.source, link_type, record.target)
        }
        [label, link_type] => format!(
            "{} -[{}]-> {} (label: {})",
            record.source, link_type, record.target, label
        ),
        _ => format!("{} -> {}", record.source, record.target),
    }
}

/// Plain-text rendering shared by the traversal commands
pub fn format_reachable(
    nodes: &BTreeSet<EntityId>,
    links: Option<&BTreeSet<EdgeRecord>>,
    rules: Option<&BTreeMap<String, bool>>,
) -> String {
    let mut out = String::new();
    out.push_str(&format!("Reached {} nodes\n", nodes.len()));
    if !nodes.is_empty() {
        out.push_str(&format!("  Nodes: {}\n", format_ids(nodes)));
    }

    if let Some(links) = links {
        if links.is_empty() {
            out.push_str("  (no links followed)\n");
        } else {
            out.push_str(&format!("  Links ({}):\n", links.len()));
            for record in links {
                out.push_str(&format!("    {}\n", format_link(record)));
            }
        }
    }

    if let Some(rules) = rules {
        out.push_str("  Rules:\n");
        for (name, follow) in rules {
            out.push_str(&format!("    {} = {}\n", name, follow));
        }
    }

    out
}
