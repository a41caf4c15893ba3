//! High-level graph traversal built on the rule engine

use crate::basket::Basket;
use crate::config::EngineConfig;
use crate::entity::{EntityCategory, EntityId};
use crate::error::{Error, Result};
use crate::executor::{EntityLookup, QueryExecutor};
use crate::limits::batches;
use crate::relation::{Direction, HopSpec, LinkType};
use crate::rule::{MaxIterations, Operation, UpdateRule};
use crate::ruleset::{validate_traversal_rules, RuleToggles, TraversalRuleset};
use crate::sequence::{new_stash, RuleSaveWalkers, RuleSequence, RuleSetWalkers};
use crate::set::EdgeRecord;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

/// Invoked with the starting ids that do not exist, instead of failing
pub type MissingCallback<'a> = &'a mut (dyn FnMut(&BTreeSet<EntityId>) + Send);

/// Traversal query builder
#[derive(Debug, Clone, Default)]
pub struct TraversalQuery {
    /// Node ids to start from
    pub starting_ids: BTreeSet<EntityId>,

    /// Rounds of the forward/backward step
    pub max_iterations: MaxIterations,

    /// Also collect the links that were followed
    pub get_links: bool,

    /// Link types followed from source to target
    pub links_forward: Vec<LinkType>,

    /// Link types followed from target to source
    pub links_backward: Vec<LinkType>,
}

impl TraversalQuery {
    pub fn new<I>(starting_ids: I) -> Self
    where
        I: IntoIterator,
        I::Item: Into<EntityId>,
    {
        Self {
            starting_ids: starting_ids.into_iter().map(Into::into).collect(),
            ..Default::default()
        }
    }

    pub fn with_max_iterations(mut self, max_iterations: impl Into<MaxIterations>) -> Self {
        self.max_iterations = max_iterations.into();
        self
    }

    pub fn with_links(mut self, get_links: bool) -> Self {
        self.get_links = get_links;
        self
    }

    pub fn forward(mut self, links: Vec<LinkType>) -> Self {
        self.links_forward = links;
        self
    }

    pub fn backward(mut self, links: Vec<LinkType>) -> Self {
        self.links_backward = links;
        self
    }
}

/// Result of [`TraversalEngine::traverse_graph`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TraversalOutput {
    pub nodes: BTreeSet<EntityId>,

    /// Links followed, present only when requested
    pub links: Option<BTreeSet<EdgeRecord>>,

    pub iterations_done: u32,
}

impl TraversalOutput {
    fn empty(get_links: bool) -> Self {
        Self {
            nodes: BTreeSet::new(),
            links: get_links.then(BTreeSet::new),
            iterations_done: 0,
        }
    }
}

/// Result of the ruleset-driven traversals
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodesOutput {
    pub nodes: BTreeSet<EntityId>,
    pub links: Option<BTreeSet<EdgeRecord>>,
    pub rules: BTreeMap<String, bool>,
}

/// Drives traversals against a backend
pub struct TraversalEngine<B> {
    backend: Arc<B>,
    config: EngineConfig,
}

impl<B> TraversalEngine<B>
where
    B: QueryExecutor + EntityLookup + 'static,
{
    pub fn new(backend: Arc<B>) -> Self {
        Self {
            backend,
            config: EngineConfig::default(),
        }
    }

    pub fn with_config(mut self, config: EngineConfig) -> Result<Self> {
        config.validate()?;
        self.config = config;
        Ok(self)
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Expand `query.starting_ids` along the requested links until nothing
    /// new is reached or `query.max_iterations` rounds have run.
    ///
    /// Missing starting ids fail the call unless `missing_callback` is given,
    /// in which case it receives them and the traversal continues from the
    /// ids that exist.
    pub async fn traverse_graph(
        &self,
        query: &TraversalQuery,
        missing_callback: Option<MissingCallback<'_>>,
    ) -> Result<TraversalOutput> {
        tracing::debug!(
            "Executing traversal: start={}, max_iterations={}, forward={:?}, backward={:?}",
            query.starting_ids.len(),
            query.max_iterations,
            query.links_forward,
            query.links_backward
        );

        if query.starting_ids.is_empty() {
            return Ok(TraversalOutput::empty(query.get_links));
        }

        let existing = self.existing_nodes(&query.starting_ids).await?;
        let missing: BTreeSet<EntityId> =
            query.starting_ids.difference(&existing).copied().collect();
        if !missing.is_empty() {
            match missing_callback {
                Some(callback) => {
                    tracing::warn!("{} starting ids do not exist, skipping them", missing.len());
                    callback(&missing);
                }
                None => return Err(Error::NotFound(missing.into_iter().collect())),
            }
        }

        let basket = Basket::new().with_nodes(existing)?;
        let rules = self.build_rules(query, &basket)?;
        let mut sequence = RuleSequence::new(rules, query.max_iterations);
        let results = sequence.run(basket).await?;

        let output = TraversalOutput {
            nodes: results.nodes().keys().clone(),
            links: query.get_links.then(|| results.links().keys().clone()),
            iterations_done: sequence.iterations_done().unwrap_or(0),
        };

        tracing::info!(
            "Traversal reached {} nodes in {} rounds",
            output.nodes.len(),
            output.iterations_done
        );
        Ok(output)
    }

    /// The starting ids that exist, checked batch by batch
    async fn existing_nodes(&self, ids: &BTreeSet<EntityId>) -> Result<BTreeSet<EntityId>> {
        let ids: Vec<EntityId> = ids.iter().copied().collect();
        let mut existing = BTreeSet::new();
        for batch in batches(&ids, self.config.max_batch_size) {
            existing.extend(self.backend.existing(EntityCategory::Node, batch).await?);
        }
        Ok(existing)
    }

    /// When both directions are followed with a finite budget, the order of
    /// the two rules would change the result. Stashing the walkers before the
    /// forward rule and restoring them before the backward rule makes both
    /// start each round from the same frontier.
    fn build_rules(
        &self,
        query: &TraversalQuery,
        basket: &Basket,
    ) -> Result<Vec<Box<dyn Operation>>> {
        let executor: Arc<dyn QueryExecutor> = self.backend.clone();
        let both = !query.links_forward.is_empty() && !query.links_backward.is_empty();
        let stash = new_stash(basket);
        let mut rules: Vec<Box<dyn Operation>> = Vec::new();

        if both {
            rules.push(Box::new(RuleSaveWalkers::new(stash.clone())));
        }

        if !query.links_forward.is_empty() {
            let rule = self.one_hop_rule(
                Direction::Forward,
                &query.links_forward,
                executor.clone(),
                query.get_links,
            )?;
            rules.push(Box::new(rule));
        }

        if both {
            rules.push(Box::new(RuleSetWalkers::new(stash)));
        }

        if !query.links_backward.is_empty() {
            let rule = self.one_hop_rule(
                Direction::Backward,
                &query.links_backward,
                executor,
                query.get_links,
            )?;
            rules.push(Box::new(rule));
        }

        Ok(rules)
    }

    fn one_hop_rule(
        &self,
        direction: Direction,
        links: &[LinkType],
        executor: Arc<dyn QueryExecutor>,
        track_edges: bool,
    ) -> Result<UpdateRule> {
        let hop = HopSpec::links(direction, links.to_vec());
        let rule = UpdateRule::new(hop, executor, MaxIterations::Bounded(1), track_edges)?;
        rule.with_config(self.config.clone())
    }

    /// Everything that must be deleted together with `starting_ids`
    pub async fn get_nodes_delete(
        &self,
        starting_ids: &BTreeSet<EntityId>,
        get_links: bool,
        toggles: &RuleToggles,
        missing_callback: Option<MissingCallback<'_>>,
    ) -> Result<NodesOutput> {
        self.traverse_ruleset(
            TraversalRuleset::Delete,
            starting_ids,
            get_links,
            toggles,
            missing_callback,
        )
        .await
    }

    /// Everything that must be exported together with `starting_ids`
    pub async fn get_nodes_export(
        &self,
        starting_ids: &BTreeSet<EntityId>,
        get_links: bool,
        toggles: &RuleToggles,
    ) -> Result<NodesOutput> {
        self.traverse_ruleset(
            TraversalRuleset::Export,
            starting_ids,
            get_links,
            toggles,
            None,
        )
        .await
    }

    async fn traverse_ruleset(
        &self,
        ruleset: TraversalRuleset,
        starting_ids: &BTreeSet<EntityId>,
        get_links: bool,
        toggles: &RuleToggles,
        missing_callback: Option<MissingCallback<'_>>,
    ) -> Result<NodesOutput> {
        let resolved = validate_traversal_rules(ruleset, toggles)?;
        let query = TraversalQuery {
            starting_ids: starting_ids.clone(),
            max_iterations: MaxIterations::Unbounded,
            get_links,
            links_forward: resolved.forward,
            links_backward: resolved.backward,
        };
        let output = self.traverse_graph(&query, missing_callback).await?;

        Ok(NodesOutput {
            nodes: output.nodes,
            links: output.links,
            rules: resolved.rules_applied,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::executor::{HopRequest, HopRow};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Node table plus link table; counts existence checks
    #[derive(Default)]
    struct Store {
        nodes: BTreeSet<i64>,
        links: Vec<(i64, i64, LinkType)>,
        lookups: AtomicUsize,
    }

    #[async_trait]
    impl QueryExecutor for Store {
        async fn one_hop(&self, request: &HopRequest<'_>) -> Result<Vec<HopRow>> {
            Ok(self
                .links
                .iter()
                .filter(|(_, _, link)| request.filter.accepts(*link))
                .filter_map(|&(input, output, link)| {
                    let (from, to) = match request.direction {
                        Direction::Forward => (input, output),
                        Direction::Backward => (output, input),
                    };
                    request.sources.contains(&EntityId(from)).then(|| {
                        HopRow::edge(
                            EntityId(from),
                            EntityId(to),
                            vec![String::new(), link.as_str().to_string()],
                        )
                    })
                })
                .collect())
        }
    }

    #[async_trait]
    impl EntityLookup for Store {
        async fn existing(
            &self,
            _category: EntityCategory,
            ids: &[EntityId],
        ) -> Result<BTreeSet<EntityId>> {
            self.lookups.fetch_add(1, Ordering::SeqCst);
            Ok(ids
                .iter()
                .copied()
                .filter(|id| self.nodes.contains(&id.0))
                .collect())
        }
    }

    fn engine(nodes: &[i64], links: &[(i64, i64, LinkType)]) -> TraversalEngine<Store> {
        TraversalEngine::new(Arc::new(Store {
            nodes: nodes.iter().copied().collect(),
            links: links.to_vec(),
            ..Default::default()
        }))
    }

    fn ids(values: &[i64]) -> BTreeSet<EntityId> {
        values.iter().copied().map(EntityId).collect()
    }

    #[tokio::test]
    async fn test_empty_start_skips_backend() {
        let engine = engine(&[1], &[]);
        let query = TraversalQuery::new(Vec::<i64>::new()).with_links(true);
        let output = engine.traverse_graph(&query, None).await.unwrap();
        assert!(output.nodes.is_empty());
        assert_eq!(output.links, Some(BTreeSet::new()));
        assert_eq!(engine.backend.lookups.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_missing_ids_fail_without_callback() {
        let engine = engine(&[1], &[]);
        let err = engine
            .traverse_graph(&TraversalQuery::new([1i64, 5, 6]), None)
            .await
            .unwrap_err();
        match err {
            Error::NotFound(missing) => assert_eq!(missing, vec![EntityId(5), EntityId(6)]),
            other => panic!("unexpected error: {}", other),
        }
    }

    #[tokio::test]
    async fn test_missing_ids_reported_to_callback() {
        let engine = engine(&[1, 2], &[(1, 2, LinkType::Create)]);
        let mut reported = BTreeSet::new();
        let mut callback = |missing: &BTreeSet<EntityId>| reported.extend(missing.iter().copied());

        let query = TraversalQuery::new([1i64, 9]).forward(vec![LinkType::Create]);
        let output = engine
            .traverse_graph(&query, Some(&mut callback))
            .await
            .unwrap();

        assert_eq!(output.nodes, ids(&[1, 2]));
        assert_eq!(reported, ids(&[9]));
    }

    #[tokio::test]
    async fn test_existence_check_is_batched() {
        let nodes: Vec<i64> = (1..=10).collect();
        let engine = engine(&nodes, &[])
            .with_config(EngineConfig::default().with_max_batch_size(4))
            .unwrap();
        engine
            .traverse_graph(&TraversalQuery::new(nodes.clone()), None)
            .await
            .unwrap();
        assert_eq!(engine.backend.lookups.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_no_links_returns_start() {
        let engine = engine(&[1, 2], &[(1, 2, LinkType::Create)]);
        let output = engine
            .traverse_graph(&TraversalQuery::new([1i64]), None)
            .await
            .unwrap();
        assert_eq!(output.nodes, ids(&[1]));
        assert_eq!(output.links, None);
    }

    #[tokio::test]
    async fn test_bidirectional_rounds_are_order_free() {
        // 1 -> 2 <- 3 -> 4
        let engine = engine(
            &[1, 2, 3, 4],
            &[
                (1, 2, LinkType::InputCalc),
                (3, 2, LinkType::InputCalc),
                (3, 4, LinkType::InputCalc),
            ],
        );
        let query = TraversalQuery::new([1i64])
            .forward(vec![LinkType::InputCalc])
            .backward(vec![LinkType::InputCalc])
            .with_links(true);

        let one_round = engine
            .traverse_graph(&query.clone().with_max_iterations(1u32), None)
            .await
            .unwrap();
        assert_eq!(one_round.nodes, ids(&[1, 2]));

        let two_rounds = engine
            .traverse_graph(&query.clone().with_max_iterations(2u32), None)
            .await
            .unwrap();
        assert_eq!(two_rounds.nodes, ids(&[1, 2, 3]));

        let closure = engine.traverse_graph(&query, None).await.unwrap();
        assert_eq!(closure.nodes, ids(&[1, 2, 3, 4]));
        assert_eq!(closure.links.unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_delete_rejects_unknown_toggle() {
        let engine = engine(&[1], &[]);
        let toggles = RuleToggles::new().with("foo", true);
        let err = engine
            .get_nodes_delete(&ids(&[1]), false, &toggles, None)
            .await
            .unwrap_err();
        assert!(err.to_string().contains("foo"));
        assert_eq!(engine.backend.lookups.load(Ordering::SeqCst), 0);
    }
}
