//! Single-hop expansion rules
//!
//! Every rule implements [`Operation`]: it takes a [`Basket`] and returns a
//! new one. [`UpdateRule`] and [`ReplaceRule`] repeatedly ask the backend for
//! one hop of neighbours along a [`HopSpec`]; they differ in what they keep
//! between iterations and what they return.

use crate::basket::Basket;
use crate::config::EngineConfig;
use crate::entity::EntityId;
use crate::error::{Error, Result};
use crate::executor::{HopRequest, HopRow, QueryExecutor};
use crate::limits::batches;
use crate::relation::{Direction, HopSpec};
use crate::set::EdgeRecord;
use async_trait::async_trait;
use std::collections::BTreeSet;
use std::sync::Arc;

/// Iteration budget of an operation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MaxIterations {
    Bounded(u32),
    #[default]
    Unbounded,
}

impl MaxIterations {
    /// Whether another iteration may start after `done` have completed
    pub fn allows(&self, done: u32) -> bool {
        match self {
            Self::Bounded(max) => done < *max,
            Self::Unbounded => true,
        }
    }

    pub fn is_bounded(&self) -> bool {
        matches!(self, Self::Bounded(_))
    }
}

impl From<u32> for MaxIterations {
    fn from(max: u32) -> Self {
        Self::Bounded(max)
    }
}

impl std::fmt::Display for MaxIterations {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Bounded(max) => write!(f, "{}", max),
            Self::Unbounded => write!(f, "inf"),
        }
    }
}

impl std::str::FromStr for MaxIterations {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "inf" | "infinite" | "unbounded" => Ok(Self::Unbounded),
            other => match other.parse::<u32>() {
                Ok(max) => Ok(Self::Bounded(max)),
                Err(_) => Err(Error::Configuration(format!(
                    "max_iterations must be a non-negative integer or 'inf', got '{}'",
                    s
                ))),
            },
        }
    }
}

/// A step of the rule engine
#[async_trait]
pub trait Operation: Send {
    /// Short name used in logs
    fn name(&self) -> &'static str;

    fn max_iterations(&self) -> MaxIterations;

    fn track_edges(&self) -> bool;

    /// Iterations performed by the last `run`, `None` before the first
    fn iterations_done(&self) -> Option<u32>;

    /// Apply the operation to `operational_set`.
    ///
    /// The returned basket is owned by the caller; mutating it never affects
    /// the operation's internal state.
    async fn run(&mut self, operational_set: Basket) -> Result<Basket>;
}

/// State and query plumbing shared by [`UpdateRule`] and [`ReplaceRule`]
pub struct QueryRule {
    hop: HopSpec,
    executor: Arc<dyn QueryExecutor>,
    max_iterations: MaxIterations,
    track_edges: bool,
    config: EngineConfig,
    accumulator: Option<Basket>,
    iterations_done: Option<u32>,
}

impl QueryRule {
    fn new(
        hop: HopSpec,
        executor: Arc<dyn QueryExecutor>,
        max_iterations: MaxIterations,
        track_edges: bool,
    ) -> Result<Self> {
        hop.validate()?;
        if !hop.projections.is_empty() {
            return Err(Error::Configuration(format!(
                "hop spec must not carry projections, found: {}",
                hop.projections.join(", ")
            )));
        }

        Ok(Self {
            hop,
            executor,
            max_iterations,
            track_edges,
            config: EngineConfig::default(),
            accumulator: None,
            iterations_done: None,
        })
    }

    pub fn hop(&self) -> &HopSpec {
        &self.hop
    }

    fn set_config(&mut self, config: EngineConfig) -> Result<()> {
        config.validate()?;
        self.config = config;
        Ok(())
    }

    /// Attach a persistent accumulator kept across runs
    pub fn set_accumulator(&mut self, accumulator: Basket) {
        self.accumulator = Some(accumulator);
    }

    /// Empty the persistent accumulator, if one is attached
    pub fn empty_accumulator(&mut self) {
        if let Some(accumulator) = self.accumulator.as_mut() {
            accumulator.clear();
        }
    }

    pub fn accumulator(&self) -> Option<&Basket> {
        self.accumulator.as_ref()
    }

    /// Query one hop from every source-category id in `frontier`
    async fn load_results(&self, frontier: &Basket) -> Result<Basket> {
        let (source, target) = (self.hop.source, self.hop.target);
        let sources: Vec<EntityId> = frontier.entities(source).keys().iter().copied().collect();

        let mut results = frontier.template();
        let identifiers = results.edges(source, target).identifiers().to_vec();
        let edge_fields = self.track_edges.then_some(identifiers.as_slice());

        let mut rows: BTreeSet<HopRow> = BTreeSet::new();
        for batch in batches(&sources, self.config.max_batch_size) {
            let request = HopRequest {
                source,
                target,
                filter: &self.hop.filter,
                direction: self.hop.direction,
                sources: batch,
                edge_fields,
            };
            let batch_rows = self.executor.one_hop(&request).await?;
            tracing::trace!(
                "one-hop batch of {} {} ids returned {} rows",
                batch.len(),
                source,
                batch_rows.len()
            );
            rows.extend(batch_rows);
        }

        results
            .entities_mut(target)
            .add_entities(rows.iter().map(|row| row.target))?;

        if self.track_edges {
            let records = rows
                .into_iter()
                .map(|row| self.edge_record(row))
                .collect::<Result<Vec<_>>>()?;
            results.edges_mut(source, target).add_entities(records)?;
        }

        Ok(results)
    }

    /// Node links are recorded input first whichever way the hop walks them
    fn edge_record(&self, row: HopRow) -> Result<EdgeRecord> {
        let from = match row.source {
            Some(from) => from,
            None => return Err(Error::Storage("edge row without source id".to_string())),
        };
        let walks_backward_over_link =
            self.hop.direction == Direction::Backward && self.hop.source == self.hop.target;
        let (source, target) = if walks_backward_over_link {
            (row.target, from)
        } else {
            (from, row.target)
        };

        Ok(EdgeRecord {
            source,
            target,
            extra: row.extra,
        })
    }
}

/// Expands a basket until no unseen neighbour remains (or the budget runs out).
///
/// The next frontier is always `new_results - accumulator`, so an unbounded
/// run terminates on any finite graph, cycles included. Returns the
/// accumulator: the starting set plus everything reached.
pub struct UpdateRule {
    rule: QueryRule,
}

impl UpdateRule {
    pub fn new(
        hop: HopSpec,
        executor: Arc<dyn QueryExecutor>,
        max_iterations: MaxIterations,
        track_edges: bool,
    ) -> Result<Self> {
        Ok(Self {
            rule: QueryRule::new(hop, executor, max_iterations, track_edges)?,
        })
    }

    pub fn with_config(mut self, config: EngineConfig) -> Result<Self> {
        self.rule.set_config(config)?;
        Ok(self)
    }

    pub fn set_max_iterations(&mut self, max_iterations: MaxIterations) {
        self.rule.max_iterations = max_iterations;
    }

    pub fn set_accumulator(&mut self, accumulator: Basket) {
        self.rule.set_accumulator(accumulator);
    }

    pub fn empty_accumulator(&mut self) {
        self.rule.empty_accumulator();
    }

    pub fn query_rule(&self) -> &QueryRule {
        &self.rule
    }
}

#[async_trait]
impl Operation for UpdateRule {
    fn name(&self) -> &'static str {
        "update"
    }

    fn max_iterations(&self) -> MaxIterations {
        self.rule.max_iterations
    }

    fn track_edges(&self) -> bool {
        self.rule.track_edges
    }

    fn iterations_done(&self) -> Option<u32> {
        self.rule.iterations_done
    }

    async fn run(&mut self, operational_set: Basket) -> Result<Basket> {
        let source = self.rule.hop.source;
        let mut accumulator = match self.rule.accumulator.as_mut() {
            Some(persistent) => {
                persistent.extend_from(&operational_set)?;
                persistent.clone()
            }
            None => operational_set.clone(),
        };

        let mut frontier = operational_set;
        let mut done = 0;
        while !frontier.entities(source).is_empty() && self.rule.max_iterations.allows(done) {
            done += 1;
            let new_results = self.rule.load_results(&frontier).await?;
            frontier = new_results.difference(&accumulator)?;
            accumulator.extend_from(&new_results)?;
            tracing::debug!(
                "update rule iteration {}: {} new, accumulated {}",
                done,
                frontier.len(),
                accumulator.len()
            );
        }
        self.rule.iterations_done = Some(done);

        if let Some(persistent) = self.rule.accumulator.as_mut() {
            persistent.extend_from(&accumulator)?;
        }
        Ok(accumulator)
    }
}

/// Replaces the frontier with its neighbours at every iteration.
///
/// Nothing is deduplicated against history, so the budget must be finite.
/// Returns the frontier reached by the final iteration: exactly the entities
/// `max_iterations` hops away when every hop finds something.
pub struct ReplaceRule {
    rule: QueryRule,
}

impl ReplaceRule {
    pub fn new(
        hop: HopSpec,
        executor: Arc<dyn QueryExecutor>,
        max_iterations: MaxIterations,
        track_edges: bool,
    ) -> Result<Self> {
        Self::check_bounded(max_iterations)?;
        Ok(Self {
            rule: QueryRule::new(hop, executor, max_iterations, track_edges)?,
        })
    }

    fn check_bounded(max_iterations: MaxIterations) -> Result<()> {
        if !max_iterations.is_bounded() {
            return Err(Error::Configuration(
                "replace rules cannot have an unbounded number of iterations".to_string(),
            ));
        }
        Ok(())
    }

    pub fn with_config(mut self, config: EngineConfig) -> Result<Self> {
        self.rule.set_config(config)?;
        Ok(self)
    }

    pub fn set_max_iterations(&mut self, max_iterations: MaxIterations) -> Result<()> {
        Self::check_bounded(max_iterations)?;
        self.rule.max_iterations = max_iterations;
        Ok(())
    }

    pub fn set_accumulator(&mut self, accumulator: Basket) {
        self.rule.set_accumulator(accumulator);
    }

    pub fn empty_accumulator(&mut self) {
        self.rule.empty_accumulator();
    }

    pub fn query_rule(&self) -> &QueryRule {
        &self.rule
    }
}

#[async_trait]
impl Operation for ReplaceRule {
    fn name(&self) -> &'static str {
        "replace"
    }

    fn max_iterations(&self) -> MaxIterations {
        self.rule.max_iterations
    }

    fn track_edges(&self) -> bool {
        self.rule.track_edges
    }

    fn iterations_done(&self) -> Option<u32> {
        self.rule.iterations_done
    }

    async fn run(&mut self, operational_set: Basket) -> Result<Basket> {
        let source = self.rule.hop.source;
        if let Some(persistent) = self.rule.accumulator.as_mut() {
            persistent.extend_from(&operational_set)?;
        }

        let mut frontier = operational_set;
        let mut done = 0;
        while !frontier.entities(source).is_empty() && self.rule.max_iterations.allows(done) {
            done += 1;
            let new_results = self.rule.load_results(&frontier).await?;
            if let Some(persistent) = self.rule.accumulator.as_mut() {
                persistent.extend_from(&new_results)?;
            }
            frontier = new_results;
            tracing::debug!(
                "replace rule iteration {}: frontier {}",
                done,
                frontier.len()
            );
        }
        self.rule.iterations_done = Some(done);

        Ok(frontier)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::entity::{EntityCategory, EntityId};
    use crate::executor::HopRequest;
    use crate::relation::{EdgeFilter, LinkType};
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Minimal link table answering one-hop queries, counting calls
    #[derive(Default)]
    pub(crate) struct LinkTable {
        pub links: Vec<(i64, i64, LinkType)>,
        pub calls: AtomicUsize,
        pub largest_batch: AtomicUsize,
    }

    impl LinkTable {
        pub(crate) fn new(links: &[(i64, i64, LinkType)]) -> Arc<Self> {
            Arc::new(Self {
                links: links.to_vec(),
                ..Default::default()
            })
        }
    }

    #[async_trait]
    impl QueryExecutor for LinkTable {
        async fn one_hop(&self, request: &HopRequest<'_>) -> Result<Vec<HopRow>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.largest_batch
                .fetch_max(request.sources.len(), Ordering::SeqCst);

            let mut rows = Vec::new();
            for &(input, output, link) in &self.links {
                if !request.filter.accepts(link) {
                    continue;
                }
                let (from, to) = match request.direction {
                    Direction::Forward => (input, output),
                    Direction::Backward => (output, input),
                };
                if !request.sources.contains(&EntityId(from)) {
                    continue;
                }
                rows.push(match request.edge_fields {
                    Some(_) => HopRow::edge(
                        EntityId(from),
                        EntityId(to),
                        vec![String::new(), link.as_str().to_string()],
                    ),
                    None => HopRow::target(EntityId(to)),
                });
            }
            Ok(rows)
        }
    }

    fn ids(basket: &Basket) -> Vec<i64> {
        basket.nodes().keys().iter().map(|id| id.0).collect()
    }

    fn chain() -> Arc<LinkTable> {
        // 1 -> 2 -> 3 -> 4
        LinkTable::new(&[
            (1, 2, LinkType::InputCalc),
            (2, 3, LinkType::Create),
            (3, 4, LinkType::InputCalc),
        ])
    }

    fn forward_all() -> HopSpec {
        HopSpec::links(Direction::Forward, LinkType::ALL.to_vec())
    }

    fn start(id: i64) -> Basket {
        Basket::new().with_nodes([id]).unwrap()
    }

    fn update(table: &Arc<LinkTable>, max: MaxIterations) -> UpdateRule {
        let hop = forward_all();
        UpdateRule::new(hop, table.clone(), max, false).unwrap()
    }

    fn replace(max: u32, track_edges: bool) -> ReplaceRule {
        let (hop, max) = (forward_all(), MaxIterations::Bounded(max));
        ReplaceRule::new(hop, chain(), max, track_edges).unwrap()
    }

    #[test]
    fn test_max_iterations_parsing() {
        let unbounded: MaxIterations = "inf".parse().unwrap();
        assert_eq!(unbounded, MaxIterations::Unbounded);
        let bounded: MaxIterations = "3".parse().unwrap();
        assert_eq!(bounded, MaxIterations::Bounded(3));

        let negative = "-1".parse::<MaxIterations>();
        assert!(matches!(negative, Err(Error::Configuration(_))));
        assert!("many".parse::<MaxIterations>().is_err());
        assert!(!MaxIterations::Bounded(0).allows(0));
        assert!(MaxIterations::Unbounded.allows(u32::MAX));
    }

    #[test]
    fn test_replace_rule_rejects_unbounded() {
        let result = ReplaceRule::new(forward_all(), chain(), MaxIterations::Unbounded, false);
        assert!(matches!(result, Err(Error::Configuration(_))));

        let mut rule = replace(2, false);
        assert!(rule.set_max_iterations(MaxIterations::Unbounded).is_err());
        assert_eq!(rule.max_iterations(), MaxIterations::Bounded(2));
    }

    #[test]
    fn test_projections_rejected() {
        let hop = forward_all().project("label");
        let result = UpdateRule::new(hop, chain(), MaxIterations::Bounded(1), false);
        assert!(result.is_err());
    }

    #[test]
    fn test_hand_built_hop_rejected() {
        let hop = HopSpec {
            source: EntityCategory::Group,
            ..forward_all()
        };
        let result = UpdateRule::new(hop, chain(), MaxIterations::Bounded(1), false);
        assert!(matches!(result, Err(Error::Configuration(_))));

        let hop = HopSpec {
            direction: Direction::Backward,
            ..HopSpec::group_members()
        };
        let result = ReplaceRule::new(hop, chain(), MaxIterations::Bounded(1), false);
        assert!(matches!(result, Err(Error::Configuration(_))));
    }

    #[tokio::test]
    async fn test_update_rule_depth() {
        let executor = chain();

        for (depth, expected) in [(0, vec![1]), (1, vec![1, 2]), (2, vec![1, 2, 3])] {
            let mut rule = update(&executor, MaxIterations::Bounded(depth));
            let result = rule.run(start(1)).await.unwrap();
            assert_eq!(ids(&result), expected);
            assert_eq!(rule.iterations_done(), Some(depth));
        }
    }

    #[tokio::test]
    async fn test_update_rule_stops_at_fixpoint() {
        let mut rule = update(&chain(), MaxIterations::Unbounded);
        let result = rule.run(start(1)).await.unwrap();
        assert_eq!(ids(&result), vec![1, 2, 3, 4]);
        // three productive hops, then one that finds nothing new
        assert_eq!(rule.iterations_done(), Some(4));
    }

    #[tokio::test]
    async fn test_replace_rule_returns_last_frontier() {
        let mut rule = replace(2, false);
        let result = rule.run(start(1)).await.unwrap();
        assert_eq!(ids(&result), vec![3]);

        let mut rule = replace(0, false);
        let result = rule.run(start(1)).await.unwrap();
        assert_eq!(ids(&result), vec![1]);
    }

    #[tokio::test]
    async fn test_replace_rule_keeps_only_last_hop_edges() {
        let mut rule = replace(2, true);
        let result = rule.run(start(1)).await.unwrap();
        assert_eq!(ids(&result), vec![3]);
        assert_eq!(rule.iterations_done(), Some(2));

        // the 1 -> 2 edge of the first hop is dropped with its frontier
        let expected = EdgeRecord::new(2, 3).with_extra("").with_extra("create");
        assert_eq!(result.links().keys(), &BTreeSet::from([expected]));
    }

    #[tokio::test]
    async fn test_batches_respect_limit() {
        let links: Vec<(i64, i64, LinkType)> =
            (0..10).map(|i| (i, 100 + i, LinkType::Create)).collect();
        let executor = LinkTable::new(&links);
        let config = EngineConfig::default().with_max_batch_size(3);
        let mut rule = update(&executor, MaxIterations::Bounded(1))
            .with_config(config)
            .unwrap();

        let start = Basket::new().with_nodes(0i64..10).unwrap();
        let result = rule.run(start).await.unwrap();
        assert_eq!(result.nodes().len(), 20);
        assert_eq!(executor.calls.load(Ordering::SeqCst), 4);
        assert_eq!(executor.largest_batch.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_edges_recorded_in_link_orientation() {
        let hop = HopSpec::links(Direction::Backward, LinkType::ALL.to_vec());
        let max = MaxIterations::Bounded(1);
        let mut backward = UpdateRule::new(hop, chain(), max, true).unwrap();
        let result = backward.run(start(3)).await.unwrap();

        let expected = EdgeRecord::new(2, 3).with_extra("").with_extra("create");
        assert!(result.links().contains(&expected));
        assert_eq!(ids(&result), vec![2, 3]);
    }

    #[tokio::test]
    async fn test_returned_basket_is_detached() {
        let mut rule = update(&chain(), MaxIterations::Bounded(1));
        rule.set_accumulator(Basket::new());

        let mut first = rule.run(start(1)).await.unwrap();
        first.clear();

        let acc = rule.query_rule().accumulator().unwrap();
        assert_eq!(ids(acc), vec![1, 2]);

        // the persistent accumulator already holds 2, so only 3 is new
        let second = rule.run(start(2)).await.unwrap();
        assert_eq!(ids(&second), vec![1, 2, 3]);

        rule.empty_accumulator();
        assert!(rule.query_rule().accumulator().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_group_membership_hop_stops_after_one_iteration() {
        struct Members;

        #[async_trait]
        impl QueryExecutor for Members {
            async fn one_hop(&self, request: &HopRequest<'_>) -> Result<Vec<HopRow>> {
                assert_eq!(request.filter, &EdgeFilter::Membership);
                Ok(request
                    .sources
                    .iter()
                    .flat_map(|group| {
                        [group.0 * 10, group.0 * 10 + 1]
                            .into_iter()
                            .map(|node| HopRow::target(EntityId(node)))
                    })
                    .collect())
            }
        }

        let mut rule = UpdateRule::new(
            HopSpec::group_members(),
            Arc::new(Members),
            MaxIterations::Unbounded,
            false,
        )
        .unwrap();
        let groups = Basket::new().with_groups([1i64]).unwrap();
        let result = rule.run(groups).await.unwrap();

        assert_eq!(ids(&result), vec![10, 11]);
        assert_eq!(result.entities(EntityCategory::Group).len(), 1);
        assert_eq!(rule.iterations_done(), Some(1));
    }
}
