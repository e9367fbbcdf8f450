//! Slow background self-improvement of the world state.
//!
//! Each cycle steps the configured world metrics with coupled, upward-biased
//! walks. Growth factors are computed from the state as it was before the
//! cycle, so rule order does not matter.

use crate::error::Result;
use crate::gate::{Condition, GateContext};
use crate::walker::{MetricWalker, WalkRule};
use ascension_data::{MetricId, Millis, WorldState};
use rand::Rng;
use serde::{Deserialize, Serialize};

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct ImprovementConfig {
    pub cadence_secs: u64,
    pub rules: Vec<WalkRule>,
    /// Joint threshold whose rising edge triggers subsystem integration.
    pub integration: Condition,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ImprovementOutcome {
    pub cycle: u64,
    /// `(metric, before, after)` for every rule.
    pub changes: Vec<(MetricId, f64, f64)>,
    /// The integration threshold was crossed during this cycle.
    pub integrate: bool,
}

#[derive(Debug, Clone)]
pub struct SelfImprovementLoop {
    cadence_ms: u64,
    rules: Vec<(MetricId, MetricWalker)>,
    integration: Condition,
    integration_held: bool,
    next_due: Option<Millis>,
    cycles: u64,
}

impl SelfImprovementLoop {
    pub fn new(config: &ImprovementConfig) -> Result<Self> {
        let rules = config
            .rules
            .iter()
            .map(|rule| Ok((rule.metric, MetricWalker::from_rule(rule)?)))
            .collect::<Result<Vec<_>>>()?;
        Ok(Self {
            cadence_ms: config.cadence_secs.max(1).saturating_mul(1_000),
            rules,
            integration: config.integration.clone(),
            integration_held: false,
            next_due: None,
            cycles: 0,
        })
    }

    #[must_use]
    pub fn cadence_ms(&self) -> u64 {
        self.cadence_ms
    }

    #[must_use]
    pub fn cycles(&self) -> u64 {
        self.cycles
    }

    /// Primes edge detection from a loaded world so an already-crossed
    /// threshold does not fire again after a restart.
    pub fn observe(&mut self, world: &WorldState) {
        self.integration_held = self.integration.holds(&GateContext::world(world));
    }

    /// Runs one cycle if due; the first call is always due.
    pub fn tick<R: Rng + ?Sized>(
        &mut self,
        now: Millis,
        world: &mut WorldState,
        rng: &mut R,
    ) -> Option<ImprovementOutcome> {
        if self.next_due.is_some_and(|due| now < due) {
            return None;
        }
        self.next_due = Some(now.saturating_add(self.cadence_ms));
        self.cycles += 1;

        let before = world.clone();
        let mut changes = Vec::with_capacity(self.rules.len());
        for (metric, walker) in &self.rules {
            let old = world.get(*metric);
            let scale = walker.growth_scale(&before);
            let new = world.set(*metric, walker.step(old, scale, rng));
            changes.push((*metric, old, new));
        }

        let holds = self.integration.holds(&GateContext::world(world));
        let integrate = holds && !self.integration_held;
        self.integration_held = holds;

        tracing::info!(cycle = self.cycles, integrate, "Self-improvement cycle");
        Some(ImprovementOutcome {
            cycle: self.cycles,
            changes,
            integrate,
        })
    }
}
