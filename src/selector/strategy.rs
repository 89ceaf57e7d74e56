//! Server selection strategies
//!
//! Pure selection: given the candidate servers for one segment, return one of
//! them, or `None` when there is no candidate at all. Strategies never treat
//! an empty candidate set as an error.

use crate::server::QueryableServer;
use parking_lot::Mutex;
use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};
use std::collections::BTreeMap;
use std::sync::Arc;

/// Strategy for choosing one server among the candidates for a segment
pub trait ServerSelectorStrategy: Send + Sync {
    /// Choose one server, or `None` when `candidates` is empty.
    fn pick(&self, candidates: &[Arc<QueryableServer>]) -> Option<Arc<QueryableServer>>;
}

/// Uniformly random choice among the candidates
pub struct RandomServerSelectorStrategy {
    rng: Mutex<SmallRng>,
}

impl RandomServerSelectorStrategy {
    pub fn new() -> Self {
        Self {
            rng: Mutex::new(SmallRng::from_entropy()),
        }
    }

    /// Deterministic variant for tests.
    pub fn with_seed(seed: u64) -> Self {
        Self {
            rng: Mutex::new(SmallRng::seed_from_u64(seed)),
        }
    }
}

impl Default for RandomServerSelectorStrategy {
    fn default() -> Self {
        Self::new()
    }
}

impl ServerSelectorStrategy for RandomServerSelectorStrategy {
    fn pick(&self, candidates: &[Arc<QueryableServer>]) -> Option<Arc<QueryableServer>> {
        if candidates.is_empty() {
            return None;
        }
        let index = self.rng.lock().gen_range(0..candidates.len());
        Some(Arc::clone(&candidates[index]))
    }
}

/// Groups candidates by tier priority and picks from the highest-priority
/// non-empty group, delegating the choice within the group to an inner
/// strategy.
pub struct HighestPriorityTierSelectorStrategy {
    inner: Box<dyn ServerSelectorStrategy>,
}

impl HighestPriorityTierSelectorStrategy {
    pub fn new(inner: Box<dyn ServerSelectorStrategy>) -> Self {
        Self { inner }
    }
}

impl ServerSelectorStrategy for HighestPriorityTierSelectorStrategy {
    fn pick(&self, candidates: &[Arc<QueryableServer>]) -> Option<Arc<QueryableServer>> {
        let tiers = group_by_priority(candidates);
        let (_, group) = tiers.last_key_value()?;
        self.inner.pick(group)
    }
}

/// Same grouping as [`HighestPriorityTierSelectorStrategy`] with the lowest
/// priority winning, for brokers that prefer draining cold tiers first.
pub struct LowestPriorityTierSelectorStrategy {
    inner: Box<dyn ServerSelectorStrategy>,
}

impl LowestPriorityTierSelectorStrategy {
    pub fn new(inner: Box<dyn ServerSelectorStrategy>) -> Self {
        Self { inner }
    }
}

impl ServerSelectorStrategy for LowestPriorityTierSelectorStrategy {
    fn pick(&self, candidates: &[Arc<QueryableServer>]) -> Option<Arc<QueryableServer>> {
        let tiers = group_by_priority(candidates);
        let (_, group) = tiers.first_key_value()?;
        self.inner.pick(group)
    }
}

fn group_by_priority(
    candidates: &[Arc<QueryableServer>],
) -> BTreeMap<i32, Vec<Arc<QueryableServer>>> {
    let mut tiers: BTreeMap<i32, Vec<Arc<QueryableServer>>> = BTreeMap::new();
    for server in candidates {
        tiers
            .entry(server.priority())
            .or_default()
            .push(Arc::clone(server));
    }
    tiers
}
