//! Category-bound entity sets and directed edge sets

use crate::entity::{EntityCategory, EntityId, EntityKey};
use crate::error::{Error, Result};
use crate::relation::LINK_IDENTIFIERS;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// A homogeneous set of entity ids bound to one category
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntitySet {
    category: EntityCategory,
    keys: BTreeSet<EntityId>,
}

impl EntitySet {
    pub fn new(category: EntityCategory) -> Self {
        Self {
            category,
            keys: BTreeSet::new(),
        }
    }

    pub fn category(&self) -> EntityCategory {
        self.category
    }

    /// Replace the contents with the given ids or domain objects.
    ///
    /// Nothing is changed if any input fails to reduce to a key.
    pub fn set_entities<I>(&mut self, entities: I) -> Result<()>
    where
        I: IntoIterator,
        I::Item: EntityKey,
    {
        let keys = self.collect_keys(entities)?;
        self.keys = keys;
        Ok(())
    }

    /// Add ids or domain objects to the set
    pub fn add_entities<I>(&mut self, entities: I) -> Result<()>
    where
        I: IntoIterator,
        I::Item: EntityKey,
    {
        let keys = self.collect_keys(entities)?;
        self.keys.extend(keys);
        Ok(())
    }

    fn collect_keys<I>(&self, entities: I) -> Result<BTreeSet<EntityId>>
    where
        I: IntoIterator,
        I::Item: EntityKey,
    {
        entities
            .into_iter()
            .map(|entity| entity.entity_key(self.category))
            .collect()
    }

    /// Read-only view of the ids
    pub fn keys(&self) -> &BTreeSet<EntityId> {
        &self.keys
    }

    pub fn contains(&self, id: EntityId) -> bool {
        self.keys.contains(&id)
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    /// Copy the set; without data this is an empty set of the same category
    pub fn copy(&self, with_data: bool) -> Self {
        if with_data {
            self.clone()
        } else {
            Self::new(self.category)
        }
    }

    pub fn template(&self) -> Self {
        self.copy(false)
    }

    /// Remove every id in place
    pub fn clear(&mut self) {
        self.keys.clear();
    }

    fn check_compatible(&self, other: &Self) -> Result<()> {
        if self.category != other.category {
            return Err(Error::CategoryMismatch {
                expected: self.category,
                found: other.category,
            });
        }
        Ok(())
    }

    /// In-place union
    pub fn extend_from(&mut self, other: &Self) -> Result<()> {
        self.check_compatible(other)?;
        self.keys.extend(other.keys.iter().copied());
        Ok(())
    }

    /// In-place difference
    pub fn subtract(&mut self, other: &Self) -> Result<()> {
        self.check_compatible(other)?;
        self.keys.retain(|key| !other.keys.contains(key));
        Ok(())
    }

    pub fn union(&self, other: &Self) -> Result<Self> {
        let mut result = self.clone();
        result.extend_from(other)?;
        Ok(result)
    }

    pub fn difference(&self, other: &Self) -> Result<Self> {
        let mut result = self.clone();
        result.subtract(other)?;
        Ok(result)
    }

    /// Set equality; comparing sets of different categories is an error
    pub fn equals(&self, other: &Self) -> Result<bool> {
        self.check_compatible(other)?;
        Ok(self.keys == other.keys)
    }
}

/// A directed edge between two entities plus its discriminating fields
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct EdgeRecord {
    pub source: EntityId,
    pub target: EntityId,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub extra: Vec<String>,
}

impl EdgeRecord {
    pub fn new(source: impl Into<EntityId>, target: impl Into<EntityId>) -> Self {
        Self {
            source: source.into(),
            target: target.into(),
            extra: Vec::new(),
        }
    }

    pub fn with_extra(mut self, value: impl Into<String>) -> Self {
        self.extra.push(value.into());
        self
    }

    /// Number of fields in the record, source and target included
    pub fn arity(&self) -> usize {
        2 + self.extra.len()
    }
}

/// A set of directed edge records between two entity categories
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EdgeSet {
    source: EntityCategory,
    target: EntityCategory,
    identifiers: Vec<String>,
    records: BTreeSet<EdgeRecord>,
}

impl EdgeSet {
    pub fn new(source: EntityCategory, target: EntityCategory, identifiers: Vec<String>) -> Self {
        Self {
            source,
            target,
            identifiers,
            records: BTreeSet::new(),
        }
    }

    /// Edge set with the default identifier schema for a category pair.
    ///
    /// Node-to-node links carry their label and link type; membership
    /// edges carry nothing extra.
    pub fn for_pair(source: EntityCategory, target: EntityCategory) -> Self {
        let identifiers = match (source, target) {
            (EntityCategory::Node, EntityCategory::Node) => {
                LINK_IDENTIFIERS.iter().map(|s| s.to_string()).collect()
            }
            _ => Vec::new(),
        };
        Self::new(source, target, identifiers)
    }

    pub fn source_category(&self) -> EntityCategory {
        self.source
    }

    pub fn target_category(&self) -> EntityCategory {
        self.target
    }

    pub fn identifiers(&self) -> &[String] {
        &self.identifiers
    }

    /// Replace the contents, validating every record first
    pub fn set_entities<I>(&mut self, records: I) -> Result<()>
    where
        I: IntoIterator<Item = EdgeRecord>,
    {
        let records = self.validated(records)?;
        self.records = records;
        Ok(())
    }

    pub fn add_entities<I>(&mut self, records: I) -> Result<()>
    where
        I: IntoIterator<Item = EdgeRecord>,
    {
        let records = self.validated(records)?;
        self.records.extend(records);
        Ok(())
    }

    fn validated<I>(&self, records: I) -> Result<BTreeSet<EdgeRecord>>
    where
        I: IntoIterator<Item = EdgeRecord>,
    {
        let expected = 2 + self.identifiers.len();
        records
            .into_iter()
            .map(|record| {
                if record.arity() == expected {
                    Ok(record)
                } else {
                    Err(Error::MalformedEdge {
                        expected,
                        found: record.arity(),
                    })
                }
            })
            .collect()
    }

    pub fn keys(&self) -> &BTreeSet<EdgeRecord> {
        &self.records
    }

    pub fn contains(&self, record: &EdgeRecord) -> bool {
        self.records.contains(record)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn copy(&self, with_data: bool) -> Self {
        if with_data {
            self.clone()
        } else {
            Self::new(self.source, self.target, self.identifiers.clone())
        }
    }

    pub fn template(&self) -> Self {
        self.copy(false)
    }

    pub fn clear(&mut self) {
        self.records.clear();
    }

    /// Human-readable schema, e.g. `node->node [label, link_type]`
    pub fn schema(&self) -> String {
        format!(
            "{}->{} [{}]",
            self.source,
            self.target,
            self.identifiers.join(", ")
        )
    }

    fn check_compatible(&self, other: &Self) -> Result<()> {
        if self.source != other.source
            || self.target != other.target
            || self.identifiers != other.identifiers
        {
            return Err(Error::SchemaMismatch {
                left: self.schema(),
                right: other.schema(),
            });
        }
        Ok(())
    }

    pub fn extend_from(&mut self, other: &Self) -> Result<()> {
        self.check_compatible(other)?;
        self.records.extend(other.records.iter().cloned());
        Ok(())
    }

    pub fn subtract(&mut self, other: &Self) -> Result<()> {
        self.check_compatible(other)?;
        let other = &other.records;
        self.records.retain(|record| !other.contains(record));
        Ok(())
    }

    pub fn union(&self, other: &Self) -> Result<Self> {
        let mut result = self.clone();
        result.extend_from(other)?;
        Ok(result)
    }

    pub fn difference(&self, other: &Self) -> Result<Self> {
        let mut result = self.clone();
        result.subtract(other)?;
        Ok(result)
    }

    pub fn equals(&self, other: &Self) -> Result<bool> {
        self.check_compatible(other)?;
        Ok(self.records == other.records)
    }
}
