//! Rule composition: walker stashing and the fixed-point sequence driver

use crate::basket::Basket;
use crate::error::{Error, Result};
use crate::rule::{MaxIterations, Operation};
use async_trait::async_trait;
use std::sync::{Arc, Mutex, MutexGuard};

/// Caller-owned basket shared between [`RuleSaveWalkers`] and [`RuleSetWalkers`]
pub type Stash = Arc<Mutex<Basket>>;

/// Create an empty stash with the same member schemas as `basket`
pub fn new_stash(basket: &Basket) -> Stash {
    Arc::new(Mutex::new(basket.template()))
}

fn lock(stash: &Stash) -> Result<MutexGuard<'_, Basket>> {
    stash
        .lock()
        .map_err(|e| Error::Internal(format!("Lock error: {}", e)))
}

/// Saves the walkers it sees into the stash and passes them through unchanged
pub struct RuleSaveWalkers {
    stash: Stash,
    iterations_done: Option<u32>,
}

impl RuleSaveWalkers {
    pub fn new(stash: Stash) -> Self {
        Self {
            stash,
            iterations_done: None,
        }
    }
}

#[async_trait]
impl Operation for RuleSaveWalkers {
    fn name(&self) -> &'static str {
        "save_walkers"
    }

    fn max_iterations(&self) -> MaxIterations {
        MaxIterations::Bounded(1)
    }

    fn track_edges(&self) -> bool {
        false
    }

    fn iterations_done(&self) -> Option<u32> {
        self.iterations_done
    }

    async fn run(&mut self, operational_set: Basket) -> Result<Basket> {
        lock(&self.stash)?.replace_with(&operational_set)?;
        self.iterations_done = Some(1);
        Ok(operational_set)
    }
}

/// Replaces the walkers it sees with a copy of the stash
pub struct RuleSetWalkers {
    stash: Stash,
    iterations_done: Option<u32>,
}

impl RuleSetWalkers {
    pub fn new(stash: Stash) -> Self {
        Self {
            stash,
            iterations_done: None,
        }
    }
}

#[async_trait]
impl Operation for RuleSetWalkers {
    fn name(&self) -> &'static str {
        "set_walkers"
    }

    fn max_iterations(&self) -> MaxIterations {
        MaxIterations::Bounded(1)
    }

    fn track_edges(&self) -> bool {
        false
    }

    fn iterations_done(&self) -> Option<u32> {
        self.iterations_done
    }

    async fn run(&mut self, mut operational_set: Basket) -> Result<Basket> {
        let stash = lock(&self.stash)?;
        operational_set.replace_with(&stash)?;
        self.iterations_done = Some(1);
        Ok(operational_set)
    }
}

/// Runs a list of operations in order, round after round, until a round
/// produces nothing that was not already accumulated or the budget runs out.
///
/// Each operation sees the previous one's output. The result is the union of
/// every intermediate output (the visits), starting set included.
pub struct RuleSequence {
    rules: Vec<Box<dyn Operation>>,
    max_iterations: MaxIterations,
    accumulator: Option<Basket>,
    visits: Option<Basket>,
    iterations_done: Option<u32>,
}

impl RuleSequence {
    pub fn new(rules: Vec<Box<dyn Operation>>, max_iterations: MaxIterations) -> Self {
        Self {
            rules,
            max_iterations,
            accumulator: None,
            visits: None,
            iterations_done: None,
        }
    }

    pub fn rules(&self) -> &[Box<dyn Operation>] {
        &self.rules
    }

    pub fn set_max_iterations(&mut self, max_iterations: MaxIterations) {
        self.max_iterations = max_iterations;
    }

    /// Keep the accumulator across runs instead of starting afresh
    pub fn set_accumulator(&mut self, accumulator: Basket) {
        self.accumulator = Some(accumulator);
    }

    pub fn empty_accumulator(&mut self) {
        if let Some(accumulator) = self.accumulator.as_mut() {
            accumulator.clear();
        }
    }

    /// Keep the visits across runs instead of starting afresh
    pub fn set_visits(&mut self, visits: Basket) {
        self.visits = Some(visits);
    }

    pub fn empty_visits(&mut self) {
        if let Some(visits) = self.visits.as_mut() {
            visits.clear();
        }
    }

    pub fn accumulator(&self) -> Option<&Basket> {
        self.accumulator.as_ref()
    }

    pub fn visits(&self) -> Option<&Basket> {
        self.visits.as_ref()
    }
}

fn seeded(persistent: &mut Option<Basket>, operational_set: &Basket) -> Result<Basket> {
    match persistent.as_mut() {
        Some(basket) => {
            basket.extend_from(operational_set)?;
            Ok(basket.clone())
        }
        None => Ok(operational_set.clone()),
    }
}

#[async_trait]
impl Operation for RuleSequence {
    fn name(&self) -> &'static str {
        "sequence"
    }

    fn max_iterations(&self) -> MaxIterations {
        self.max_iterations
    }

    fn track_edges(&self) -> bool {
        self.rules.iter().any(|rule| rule.track_edges())
    }

    fn iterations_done(&self) -> Option<u32> {
        self.iterations_done
    }

    async fn run(&mut self, operational_set: Basket) -> Result<Basket> {
        let mut accumulator = seeded(&mut self.accumulator, &operational_set)?;
        let mut visits = seeded(&mut self.visits, &operational_set)?;

        let mut frontier = operational_set;
        let mut done = 0;
        while !frontier.is_empty() && self.max_iterations.allows(done) {
            done += 1;
            let mut round_results = frontier.template();
            for rule in self.rules.iter_mut() {
                frontier = rule.run(frontier).await?;
                round_results.extend_from(&frontier)?;
                visits.extend_from(&frontier)?;
            }
            frontier = round_results.difference(&accumulator)?;
            accumulator.extend_from(&round_results)?;
            tracing::debug!(
                "rule sequence round {}: {} new, visited {}",
                done,
                frontier.len(),
                visits.len()
            );
        }
        self.iterations_done = Some(done);

        if let Some(persistent) = self.accumulator.as_mut() {
            persistent.extend_from(&accumulator)?;
        }
        if let Some(persistent) = self.visits.as_mut() {
            persistent.extend_from(&visits)?;
        }
        Ok(visits)
    }
}
