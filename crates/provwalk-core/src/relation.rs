//! Relation (edge) kinds and one-hop query descriptions

use crate::entity::{EntityCategory, NodeKind};
use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};

/// Extra identifiers carried by node-to-node link records
pub const LINK_IDENTIFIERS: [&str; 2] = ["label", "link_type"];

/// Directed provenance link kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LinkType {
    Create,
    Return,
    InputCalc,
    InputWork,
    CallCalc,
    CallWork,
}

impl LinkType {
    pub const ALL: [LinkType; 6] = [
        LinkType::Create,
        LinkType::Return,
        LinkType::InputCalc,
        LinkType::InputWork,
        LinkType::CallCalc,
        LinkType::CallWork,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Create => "create",
            Self::Return => "return",
            Self::InputCalc => "input_calc",
            Self::InputWork => "input_work",
            Self::CallCalc => "call_calc",
            Self::CallWork => "call_work",
        }
    }

    /// Kind of node a link of this type starts from
    pub fn source_kind(&self) -> NodeKind {
        match self {
            Self::Create => NodeKind::Calculation,
            Self::Return | Self::CallCalc | Self::CallWork => NodeKind::Workflow,
            Self::InputCalc | Self::InputWork => NodeKind::Data,
        }
    }

    /// Kind of node a link of this type points to
    pub fn target_kind(&self) -> NodeKind {
        match self {
            Self::Create | Self::Return => NodeKind::Data,
            Self::InputCalc | Self::CallCalc => NodeKind::Calculation,
            Self::InputWork | Self::CallWork => NodeKind::Workflow,
        }
    }
}

impl std::fmt::Display for LinkType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str().to_uppercase())
    }
}

impl std::str::FromStr for LinkType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let lowered = s.trim().to_lowercase();
        LinkType::ALL
            .into_iter()
            .find(|link| link.as_str() == lowered)
            .ok_or_else(|| Error::InvalidInput(format!("unknown link type: {}", s)))
    }
}

/// Direction in which a relation is followed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    /// From the link's source to its target
    Forward,
    /// From the link's target back to its source
    Backward,
}

impl std::fmt::Display for Direction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Forward => write!(f, "forward"),
            Self::Backward => write!(f, "backward"),
        }
    }
}

/// Which edges a one-hop query may follow
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EdgeFilter {
    /// Node-to-node provenance links of the listed types
    Links(Vec<LinkType>),
    /// Group membership
    Membership,
}

impl EdgeFilter {
    pub fn accepts(&self, link: LinkType) -> bool {
        match self {
            Self::Links(types) => types.contains(&link),
            Self::Membership => false,
        }
    }
}

/// A one-hop relation spec: source category, edge filter, target category.
///
/// `projections` must stay empty when a `HopSpec` is handed to a rule; the rule
/// attaches its own projections when it issues queries.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HopSpec {
    pub source: EntityCategory,
    pub target: EntityCategory,
    pub filter: EdgeFilter,
    pub direction: Direction,
    #[serde(default)]
    pub projections: Vec<String>,
}

impl HopSpec {
    /// Build a spec, checking the filter fits the categories it connects
    pub fn new(
        source: EntityCategory,
        filter: EdgeFilter,
        target: EntityCategory,
        direction: Direction,
    ) -> Result<Self> {
        let spec = Self {
            source,
            target,
            filter,
            direction,
            projections: Vec::new(),
        };
        spec.validate()?;
        Ok(spec)
    }

    /// Check the filter fits the categories and direction of the hop
    pub fn validate(&self) -> Result<()> {
        let (source, target) = (self.source, self.target);
        match (&self.filter, source, target) {
            (EdgeFilter::Links(_), EntityCategory::Node, EntityCategory::Node) => Ok(()),
            (EdgeFilter::Links(_), _, _) => Err(Error::Configuration(format!(
                "link filters connect nodes only, not {} to {}",
                source, target
            ))),
            (EdgeFilter::Membership, EntityCategory::Group, EntityCategory::Node) => {
                if self.direction != Direction::Forward {
                    return Err(Error::Configuration(
                        "group to node membership is followed forward".to_string(),
                    ));
                }
                Ok(())
            }
            (EdgeFilter::Membership, EntityCategory::Node, EntityCategory::Group) => {
                if self.direction != Direction::Backward {
                    return Err(Error::Configuration(
                        "node to group membership is followed backward".to_string(),
                    ));
                }
                Ok(())
            }
            (EdgeFilter::Membership, _, _) => Err(Error::Configuration(format!(
                "membership connects a group and a node, not {} to {}",
                source, target
            ))),
        }
    }

    /// Node-to-node hop over the given link types
    pub fn links(direction: Direction, link_types: Vec<LinkType>) -> Self {
        Self {
            source: EntityCategory::Node,
            target: EntityCategory::Node,
            filter: EdgeFilter::Links(link_types),
            direction,
            projections: Vec::new(),
        }
    }

    /// From groups to the nodes they contain
    pub fn group_members() -> Self {
        Self {
            source: EntityCategory::Group,
            target: EntityCategory::Node,
            filter: EdgeFilter::Membership,
            direction: Direction::Forward,
            projections: Vec::new(),
        }
    }

    /// From nodes to the groups that contain them
    pub fn node_groups() -> Self {
        Self {
            source: EntityCategory::Node,
            target: EntityCategory::Group,
            filter: EdgeFilter::Membership,
            direction: Direction::Backward,
            projections: Vec::new(),
        }
    }

    /// Request an extra result column
    pub fn project(mut self, field: impl Into<String>) -> Self {
        self.projections.push(field.into());
        self
    }
}
