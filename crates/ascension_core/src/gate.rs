//! One-shot threshold gates.
//!
//! A [`Condition`] is a predicate over metrics and the current phase. A
//! [`ThresholdGate`] latches the first time its condition holds and never
//! un-latches; it has no reset.

use ascension_data::{MetricId, MetricSource, WorldState};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Condition {
    Always,
    /// Strictly greater than.
    Above { metric: MetricId, threshold: f64 },
    AtLeast { metric: MetricId, threshold: f64 },
    /// Strictly less than.
    Below { metric: MetricId, threshold: f64 },
    PhaseAtLeast { phase: u8 },
    All { conditions: Vec<Condition> },
    Any { conditions: Vec<Condition> },
}

/// What a condition is evaluated against: an immutable snapshot.
#[derive(Debug, Clone, Copy)]
pub struct GateContext<'a> {
    pub world: &'a WorldState,
    pub vitals: Option<&'a BTreeMap<MetricId, f64>>,
    /// Current phase number; `None` outside a phase controller.
    pub phase: Option<u8>,
}

impl<'a> GateContext<'a> {
    #[must_use]
    pub fn world(world: &'a WorldState) -> Self {
        Self {
            world,
            vitals: None,
            phase: None,
        }
    }

    #[must_use]
    pub fn at_phase(mut self, phase: Option<u8>) -> Self {
        self.phase = phase;
        self
    }
}

impl MetricSource for GateContext<'_> {
    fn metric(&self, id: MetricId) -> Option<f64> {
        self.vitals
            .and_then(|v| v.get(&id).copied())
            .or_else(|| self.world.metric(id))
    }
}

impl Condition {
    /// Metrics the context does not know make comparisons false.
    #[must_use]
    pub fn holds(&self, ctx: &GateContext<'_>) -> bool {
        match self {
            Condition::Always => true,
            Condition::Above { metric, threshold } => {
                ctx.metric(*metric).is_some_and(|v| v > *threshold)
            }
            Condition::AtLeast { metric, threshold } => {
                ctx.metric(*metric).is_some_and(|v| v >= *threshold)
            }
            Condition::Below { metric, threshold } => {
                ctx.metric(*metric).is_some_and(|v| v < *threshold)
            }
            Condition::PhaseAtLeast { phase } => ctx.phase.is_some_and(|p| p >= *phase),
            Condition::All { conditions } => conditions.iter().all(|c| c.holds(ctx)),
            Condition::Any { conditions } => conditions.iter().any(|c| c.holds(ctx)),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ThresholdGate {
    condition: Condition,
    latched: bool,
}

impl ThresholdGate {
    #[must_use]
    pub fn new(condition: Condition) -> Self {
        Self {
            condition,
            latched: false,
        }
    }

    #[must_use]
    pub fn condition(&self) -> &Condition {
        &self.condition
    }

    #[must_use]
    pub fn is_latched(&self) -> bool {
        self.latched
    }

    /// True if latched now or earlier.
    pub fn evaluate(&mut self, ctx: &GateContext<'_>) -> bool {
        if !self.latched && self.condition.holds(ctx) {
            self.latched = true;
        }
        self.latched
    }

    /// Like [`evaluate`](Self::evaluate) but reports whether this call did the latching.
    pub fn evaluate_edge(&mut self, ctx: &GateContext<'_>) -> bool {
        let was = self.latched;
        self.evaluate(ctx) && !was
    }

    /// Would `evaluate` return true, without latching.
    #[must_use]
    pub fn would_pass(&self, ctx: &GateContext<'_>) -> bool {
        self.latched || self.condition.holds(ctx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn secret() -> Condition {
        Condition::All {
            conditions: vec![
                Condition::PhaseAtLeast { phase: 3 },
                Condition::Above {
                    metric: MetricId::Consciousness,
                    threshold: 60.0,
                },
                Condition::Above {
                    metric: MetricId::QuantumCoherence,
                    threshold: 25.0,
                },
            ],
        }
    }

    #[test]
    fn test_joint_condition() {
        let world = WorldState::default();
        let mut vitals = BTreeMap::new();
        vitals.insert(MetricId::Consciousness, 61.0);
        vitals.insert(MetricId::QuantumCoherence, 26.0);
        let mut ctx = GateContext {
            world: &world,
            vitals: Some(&vitals),
            phase: Some(2),
        };
        assert!(!secret().holds(&ctx));
        ctx.phase = Some(3);
        assert!(secret().holds(&ctx));
    }

    #[test]
    fn test_latch_survives_metric_drop() {
        let world = WorldState::default();
        let mut vitals = BTreeMap::new();
        vitals.insert(MetricId::Consciousness, 90.0);
        vitals.insert(MetricId::QuantumCoherence, 90.0);
        let mut gate = ThresholdGate::new(secret());
        {
            let ctx = GateContext {
                world: &world,
                vitals: Some(&vitals),
                phase: Some(3),
            };
            assert!(gate.evaluate_edge(&ctx));
            assert!(!gate.evaluate_edge(&ctx));
        }
        vitals.insert(MetricId::Consciousness, 0.0);
        let ctx = GateContext {
            world: &world,
            vitals: Some(&vitals),
            phase: Some(1),
        };
        assert!(gate.evaluate(&ctx));
        assert!(gate.is_latched());
    }

    #[test]
    fn test_unknown_metric_is_false() {
        let world = WorldState::default();
        let ctx = GateContext::world(&world);
        let cond = Condition::Below {
            metric: MetricId::Entropy,
            threshold: 1e9,
        };
        assert!(!cond.holds(&ctx));
        assert!(!Condition::PhaseAtLeast { phase: 1 }.holds(&ctx));
        assert!(Condition::Any { conditions: vec![Condition::Always] }.holds(&ctx));
    }

    #[test]
    fn test_would_pass_does_not_latch() {
        let world = WorldState::default();
        let ctx = GateContext::world(&world);
        let gate = ThresholdGate::new(Condition::AtLeast {
            metric: MetricId::EvolutionLevel,
            threshold: 1.0,
        });
        assert!(gate.would_pass(&ctx));
        assert!(!gate.is_latched());
    }

    #[test]
    fn test_condition_from_toml() {
        let cond: Condition = toml::from_str(
            r#"
            kind = "all"
            conditions = [
                { kind = "phase_at_least", phase = 3 },
                { kind = "above", metric = "consciousness", threshold = 60.0 },
            ]
            "#,
        )
        .unwrap();
        assert!(matches!(cond, Condition::All { ref conditions } if conditions.len() == 2));
    }
}
