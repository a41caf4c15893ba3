//! Traversal rulesets: named, optionally toggleable relation kinds
//!
//! A ruleset maps a rule name such as `create_backward` to the link type it
//! follows, the direction, whether it is followed by default, and whether
//! callers may override that default.

use crate::error::{Error, Result};
use crate::relation::{Direction, LinkType};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// One entry of a ruleset table
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TraversalRule {
    pub link: LinkType,
    pub direction: Direction,
    pub default: bool,
    pub toggleable: bool,
}

impl TraversalRule {
    pub fn name(&self) -> String {
        format!("{}_{}", self.link.as_str(), self.direction)
    }
}

/// Order in which rules are listed and resolved
const RULE_ORDER: [LinkType; 6] = [
    LinkType::InputCalc,
    LinkType::Create,
    LinkType::Return,
    LinkType::InputWork,
    LinkType::CallCalc,
    LinkType::CallWork,
];

/// (default, toggleable) for the forward and backward rule of each link,
/// in `RULE_ORDER`.
type RuleTable = [[(bool, bool); 2]; 6];

const DEFAULT_TABLE: RuleTable = [[(false, true); 2]; 6];

const DELETE_TABLE: RuleTable = [
    [(true, false), (false, false)], // input_calc
    [(true, false), (true, true)],   // create
    [(false, false), (true, true)],  // return
    [(true, false), (false, false)], // input_work
    [(true, false), (true, true)],   // call_calc
    [(true, false), (true, true)],   // call_work
];

const EXPORT_TABLE: RuleTable = [
    [(false, true), (true, false)], // input_calc
    [(true, true), (true, false)],  // create
    [(true, true), (false, true)],  // return
    [(false, true), (true, false)], // input_work
    [(true, true), (false, true)],  // call_calc
    [(true, true), (false, true)],  // call_work
];

/// The static rulesets the high-level APIs resolve against
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TraversalRuleset {
    /// Follow nothing unless asked; everything may be toggled
    Default,
    /// What must go when the starting nodes are deleted
    Delete,
    /// What must come along when the starting nodes are exported
    Export,
}

impl TraversalRuleset {
    fn table(&self) -> &'static RuleTable {
        match self {
            Self::Default => &DEFAULT_TABLE,
            Self::Delete => &DELETE_TABLE,
            Self::Export => &EXPORT_TABLE,
        }
    }

    /// Rules in resolution order
    pub fn rules(&self) -> Vec<TraversalRule> {
        RULE_ORDER
            .iter()
            .zip(self.table())
            .flat_map(|(&link, entries)| {
                [Direction::Forward, Direction::Backward]
                    .into_iter()
                    .zip(entries.iter())
                    .map(move |(direction, &(default, toggleable))| TraversalRule {
                        link,
                        direction,
                        default,
                        toggleable,
                    })
            })
            .collect()
    }
}

impl std::fmt::Display for TraversalRuleset {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Default => write!(f, "default"),
            Self::Delete => write!(f, "delete"),
            Self::Export => write!(f, "export"),
        }
    }
}

impl std::str::FromStr for TraversalRuleset {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "default" => Ok(Self::Default),
            "delete" => Ok(Self::Delete),
            "export" => Ok(Self::Export),
            other => Err(Error::InvalidInput(format!("unknown ruleset: {}", other))),
        }
    }
}

/// Caller overrides for toggleable rules, keyed by rule name.
///
/// Values are kept untyped so that a non-boolean override can be reported
/// instead of being silently coerced.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RuleToggles(BTreeMap<String, serde_json::Value>);

impl RuleToggles {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, name: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.insert(name, value);
        self
    }

    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<serde_json::Value>) {
        self.0.insert(name.into(), value.into());
    }

    /// Parse a `name=value` pair; the value is read as JSON when possible
    pub fn parse_pair(pair: &str) -> Result<(String, serde_json::Value)> {
        let (name, raw) = pair.split_once('=').ok_or_else(|| {
            Error::InvalidInput(format!("expected name=value, got '{}'", pair))
        })?;
        let raw = raw.trim();
        let value = serde_json::from_str(raw)
            .unwrap_or_else(|_| serde_json::Value::String(raw.to_string()));
        Ok((name.trim().to_string(), value))
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn get(&self, name: &str) -> Option<&serde_json::Value> {
        self.0.get(name)
    }
}

impl FromIterator<(String, serde_json::Value)> for RuleToggles {
    fn from_iter<I: IntoIterator<Item = (String, serde_json::Value)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// A ruleset resolved against caller toggles
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolvedRules {
    pub rules_applied: BTreeMap<String, bool>,
    pub forward: Vec<LinkType>,
    pub backward: Vec<LinkType>,
}

/// Resolve `ruleset` into forward and backward link lists.
///
/// Every toggle must name a rule of the ruleset, that rule must be
/// toggleable, and the value must be a boolean.
pub fn validate_traversal_rules(
    ruleset: TraversalRuleset,
    toggles: &RuleToggles,
) -> Result<ResolvedRules> {
    let mut rules_applied = BTreeMap::new();
    let mut forward = Vec::new();
    let mut backward = Vec::new();
    let mut unused: Vec<&String> = toggles.0.keys().collect();

    for rule in ruleset.rules() {
        let name = rule.name();
        let mut follow = rule.default;

        if let Some(value) = toggles.get(&name) {
            unused.retain(|key| **key != name);
            if !rule.toggleable {
                return Err(Error::Configuration(format!(
                    "input rule {} is not toggleable for ruleset {}",
                    name, ruleset
                )));
            }
            follow = value.as_bool().ok_or_else(|| {
                Error::Configuration(format!(
                    "the value of rule {} must be boolean, but it is: {}",
                    name, value
                ))
            })?;
        }

        if follow {
            match rule.direction {
                Direction::Forward => forward.push(rule.link),
                Direction::Backward => backward.push(rule.link),
            }
        }
        rules_applied.insert(name, follow);
    }

    if !unused.is_empty() {
        return Err(Error::UnknownRules(unused.into_iter().cloned().collect()));
    }

    Ok(ResolvedRules {
        rules_applied,
        forward,
        backward,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rule_names_and_order() {
        let names: Vec<String> = TraversalRuleset::Delete
            .rules()
            .iter()
            .map(TraversalRule::name)
            .collect();
        assert_eq!(names.len(), 12);
        assert_eq!(names[0], "input_calc_forward");
        assert_eq!(names[1], "input_calc_backward");
        assert_eq!(names[11], "call_work_backward");
    }

    #[test]
    fn test_delete_defaults() {
        let toggles = RuleToggles::new();
        let resolved = validate_traversal_rules(TraversalRuleset::Delete, &toggles).unwrap();
        assert_eq!(
            resolved.forward,
            vec![
                LinkType::InputCalc,
                LinkType::Create,
                LinkType::InputWork,
                LinkType::CallCalc,
                LinkType::CallWork
            ]
        );
        assert_eq!(
            resolved.backward,
            vec![
                LinkType::Create,
                LinkType::Return,
                LinkType::CallCalc,
                LinkType::CallWork
            ]
        );
        assert!(!resolved.rules_applied["return_forward"]);
    }

    #[test]
    fn test_default_ruleset_follows_nothing() {
        let toggles = RuleToggles::new();
        let resolved = validate_traversal_rules(TraversalRuleset::Default, &toggles).unwrap();
        assert!(resolved.forward.is_empty());
        assert!(resolved.backward.is_empty());
        assert!(resolved.rules_applied.values().all(|follow| !follow));
    }

    #[test]
    fn test_toggle_override() {
        let toggles = RuleToggles::new()
            .with("create_backward", false)
            .with("return_backward", false);
        let resolved = validate_traversal_rules(TraversalRuleset::Delete, &toggles).unwrap();
        assert!(!resolved.backward.contains(&LinkType::Create));
        assert!(!resolved.backward.contains(&LinkType::Return));
        assert!(!resolved.rules_applied["create_backward"]);
    }

    #[test]
    fn test_unknown_rule_is_reported() {
        let toggles = RuleToggles::new().with("foo", true);
        let err = validate_traversal_rules(TraversalRuleset::Export, &toggles).unwrap_err();
        assert!(matches!(err, Error::UnknownRules(_)));
        assert_eq!(err.to_string(), "Unrecognized graph traversal rules: foo");
    }

    #[test]
    fn test_fixed_rule_cannot_be_toggled() {
        let toggles = RuleToggles::new().with("input_calc_forward", false);
        let err = validate_traversal_rules(TraversalRuleset::Delete, &toggles).unwrap_err();
        assert!(matches!(err, Error::Configuration(_)));
        assert!(err.to_string().contains("not toggleable"));
    }

    #[test]
    fn test_non_boolean_toggle_rejected() {
        let toggles = RuleToggles::new().with("create_backward", "yes");
        let err = validate_traversal_rules(TraversalRuleset::Delete, &toggles).unwrap_err();
        assert!(err.to_string().contains("must be boolean"));
    }

    #[test]
    fn test_parse_pair() {
        assert_eq!(
            RuleToggles::parse_pair("create_backward=false").unwrap(),
            ("create_backward".to_string(), serde_json::Value::Bool(false))
        );
        assert_eq!(
            RuleToggles::parse_pair("x = maybe").unwrap().1,
            serde_json::Value::String("maybe".to_string())
        );
        assert!(RuleToggles::parse_pair("novalue").is_err());
    }

    #[test]
    fn test_ruleset_from_str() {
        assert_eq!(
            "Export".parse::<TraversalRuleset>().unwrap(),
            TraversalRuleset::Export
        );
        assert!("purge".parse::<TraversalRuleset>().is_err());
    }
}
