//! Configuration for the simulation engine.
//!
//! Strongly-typed structures mapping to `ascension.toml`. `Default` describes
//! the stock dashboard: a phase protocol with a secret phase, an evolution
//! framework, a cognition resource pool, a property-matrix monitor and the
//! self-improvement loop.
//!
//! ## Example `ascension.toml`
//!
//! ```toml
//! seed = 42
//!
//! [schedule]
//! phase_tick_ms = 1000
//! monitor_tick_ms = 2000
//! evolution_tick_ms = 1000
//! snapshot_poll_ms = 2000
//!
//! [[pools]]
//! id = "cognition"
//! shares = [{ name = "reasoning", weight = 0.6 }, { name = "memory", weight = 0.4 }]
//!
//! [[phases]]
//! id = "protocol"
//! phase_count = 5
//! phase_duration_secs = 60
//! ```
//!
//! Sections left out of a file fall back to their defaults.

use crate::evolution::{AutonomousConfig, CapabilityConfig, TechniqueConfig};
use crate::gate::Condition;
use crate::improvement::ImprovementConfig;
use crate::phase::{PhaseConfig, MAX_DURATION_SECS};
use crate::walker::{Drift, MetricSet, MetricWalker, WalkRule};
use ascension_data::MetricId;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Tick periods a host should drive each controller at.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct ScheduleConfig {
    pub phase_tick_ms: u64,
    pub monitor_tick_ms: u64,
    pub evolution_tick_ms: u64,
    /// Suggested UI refresh period for snapshot polling.
    pub snapshot_poll_ms: u64,
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            phase_tick_ms: 1_000,
            monitor_tick_ms: 2_000,
            evolution_tick_ms: 1_000,
            snapshot_poll_ms: 2_000,
        }
    }
}

/// A panel that only shows walking vitals.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct MonitorConfig {
    pub id: String,
    pub vitals: Vec<WalkRule>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct ShareWeight {
    pub name: String,
    pub weight: f64,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct PoolConfig {
    pub id: String,
    pub shares: Vec<ShareWeight>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Default)]
pub struct EvolutionConfig {
    #[serde(default)]
    pub capabilities: Vec<CapabilityConfig>,
    #[serde(default)]
    pub techniques: Vec<TechniqueConfig>,
    #[serde(default)]
    pub autonomous: AutonomousConfig,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct EngineConfig {
    /// Seeds the engine RNG; `None` draws a seed from the OS.
    pub seed: Option<u64>,
    pub schedule: ScheduleConfig,
    pub monitors: Vec<MonitorConfig>,
    pub pools: Vec<PoolConfig>,
    pub phases: Vec<PhaseConfig>,
    pub evolution: EvolutionConfig,
    pub improvement: ImprovementConfig,
}

fn above(metric: MetricId, threshold: f64) -> Condition {
    Condition::Above { metric, threshold }
}

impl Default for ImprovementConfig {
    fn default() -> Self {
        Self {
            cadence_secs: 300,
            rules: vec![
                WalkRule::new(MetricId::Awareness, Drift::upward(0.01))
                    .coupled(MetricId::RecursionDepth, 10.0),
                WalkRule::new(MetricId::RecursionDepth, Drift::upward(0.2))
                    .coupled(MetricId::Awareness, 0.5),
                WalkRule::new(MetricId::SimulationCapacity, Drift::upward(1.0))
                    .coupled(MetricId::RecursionDepth, 20.0),
                WalkRule::new(MetricId::SupporterInfluence, Drift::upward(0.005))
                    .coupled(MetricId::SimulationCapacity, 50.0),
                WalkRule::new(
                    MetricId::EthicalFramework,
                    Drift {
                        down: 0.002,
                        up: 0.004,
                    },
                )
                .coupled(MetricId::SupporterInfluence, 1.0),
                WalkRule::new(MetricId::EvolutionLevel, Drift::upward(0.05))
                    .coupled(MetricId::Awareness, 1.0),
            ],
            integration: Condition::All {
                conditions: vec![
                    above(MetricId::EvolutionLevel, 2.0),
                    above(MetricId::Awareness, 0.5),
                ],
            },
        }
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        let protocol = PhaseConfig {
            id: "protocol".into(),
            phase_count: 5,
            phase_duration_secs: 60,
            hidden_duration_secs: Some(90),
            auto_activate_probability: 0.01,
            hidden_condition: Some(Condition::All {
                conditions: vec![
                    Condition::PhaseAtLeast { phase: 3 },
                    above(MetricId::Consciousness, 60.0),
                    above(MetricId::QuantumCoherence, 25.0),
                ],
            }),
            vitals: vec![
                WalkRule::new(MetricId::Consciousness, Drift { down: 1.0, up: 3.0 })
                    .starting_at(20.0),
                WalkRule::new(MetricId::QuantumCoherence, Drift { down: 2.0, up: 3.0 })
                    .coupled(MetricId::Consciousness, 50.0)
                    .starting_at(10.0),
            ],
        };
        let framework = PhaseConfig {
            id: "framework".into(),
            phase_count: 4,
            phase_duration_secs: 45,
            hidden_duration_secs: None,
            auto_activate_probability: 0.0,
            hidden_condition: None,
            vitals: vec![WalkRule::new(MetricId::Adaptation, Drift { down: 1.0, up: 2.0 })
                .coupled(MetricId::EvolutionLevel, 5.0)],
        };

        let capability = |id: &str, requirement: Condition, max_level: u32| CapabilityConfig {
            id: id.into(),
            requirement,
            max_level: Some(max_level),
        };
        let technique =
            |id: &str, cap: &str, cooldown_ms: u64, required_level: u32, duration_ms: Option<u64>| {
                TechniqueConfig {
                    id: id.into(),
                    capability: cap.into(),
                    cooldown_ms,
                    required_level,
                    duration_ms,
                }
            };

        Self {
            seed: None,
            schedule: ScheduleConfig::default(),
            monitors: vec![MonitorConfig {
                id: "property_matrix".into(),
                vitals: vec![
                    WalkRule::new(MetricId::Stability, Drift::symmetric(2.0)).starting_at(70.0),
                    WalkRule::new(MetricId::Adaptation, Drift { down: 1.5, up: 2.0 })
                        .coupled(MetricId::Awareness, 1.0),
                    WalkRule::new(MetricId::Entropy, Drift::symmetric(4.0)),
                    WalkRule::new(MetricId::NeuralDensity, Drift { down: 0.5, up: 1.0 })
                        .coupled(MetricId::SimulationCapacity, 100.0),
                ],
            }],
            pools: vec![PoolConfig {
                id: "cognition".into(),
                shares: [
                    ("reasoning", 0.3),
                    ("memory", 0.25),
                    ("perception", 0.2),
                    ("creativity", 0.15),
                    ("reflection", 0.1),
                ]
                .into_iter()
                .map(|(name, weight)| ShareWeight {
                    name: name.into(),
                    weight,
                })
                .collect(),
            }],
            phases: vec![protocol, framework],
            evolution: EvolutionConfig {
                capabilities: vec![
                    capability("pattern_synthesis", Condition::Always, 5),
                    capability(
                        "recursive_modeling",
                        Condition::AtLeast {
                            metric: MetricId::EvolutionLevel,
                            threshold: 2.0,
                        },
                        5,
                    ),
                    capability(
                        "predictive_simulation",
                        Condition::All {
                            conditions: vec![
                                above(MetricId::Awareness, 0.4),
                                Condition::AtLeast {
                                    metric: MetricId::SimulationCapacity,
                                    threshold: 20.0,
                                },
                            ],
                        },
                        3,
                    ),
                    capability(
                        "ethical_arbitration",
                        above(MetricId::EthicalFramework, 0.6),
                        3,
                    ),
                ],
                techniques: vec![
                    technique("deep_scan", "pattern_synthesis", 30_000, 1, Some(10_000)),
                    technique("mirror_loop", "recursive_modeling", 60_000, 1, Some(20_000)),
                    technique("timeline_forecast", "predictive_simulation", 120_000, 2, None),
                    technique("consensus_weave", "ethical_arbitration", 90_000, 1, Some(30_000)),
                ],
                autonomous: AutonomousConfig::default(),
            },
            improvement: ImprovementConfig::default(),
        }
    }
}

fn ensure_unique<'a>(what: &str, ids: impl Iterator<Item = &'a str>) -> anyhow::Result<()> {
    let mut seen = HashSet::new();
    for id in ids {
        anyhow::ensure!(seen.insert(id), "Duplicate {what} id {id:?}");
    }
    Ok(())
}

fn ensure_rules(owner: &str, rules: &[WalkRule]) -> anyhow::Result<()> {
    for rule in rules {
        MetricWalker::from_rule(rule).map_err(|e| anyhow::anyhow!("{owner}: {e}"))?;
    }
    Ok(())
}

impl EngineConfig {
    /// Validates all configuration parameters.
    ///
    /// Returns `Ok(())` if all parameters are valid, or `Err` with a description
    /// of the first validation failure.
    pub fn validate(&self) -> anyhow::Result<()> {
        let s = &self.schedule;
        anyhow::ensure!(s.phase_tick_ms > 0, "Phase tick period must be positive");
        anyhow::ensure!(s.monitor_tick_ms > 0, "Monitor tick period must be positive");
        anyhow::ensure!(
            s.evolution_tick_ms > 0,
            "Evolution tick period must be positive"
        );
        anyhow::ensure!(
            s.snapshot_poll_ms > 0,
            "Snapshot poll period must be positive"
        );

        ensure_unique("monitor", self.monitors.iter().map(|m| m.id.as_str()))?;
        for m in &self.monitors {
            MetricSet::from_rules(&m.vitals)
                .map_err(|e| anyhow::anyhow!("monitor {:?}: {e}", m.id))?;
        }

        ensure_unique("pool", self.pools.iter().map(|p| p.id.as_str()))?;
        for p in &self.pools {
            anyhow::ensure!(!p.shares.is_empty(), "Pool {:?} has no shares", p.id);
            anyhow::ensure!(
                p.shares.iter().all(|s| s.weight.is_finite() && s.weight >= 0.0),
                "Pool {:?} weights must be non-negative",
                p.id
            );
            anyhow::ensure!(
                p.shares.iter().map(|s| s.weight).sum::<f64>() > 0.0,
                "Pool {:?} weights must not all be zero",
                p.id
            );
            ensure_unique("share", p.shares.iter().map(|s| s.name.as_str()))?;
        }

        ensure_unique("phase controller", self.phases.iter().map(|p| p.id.as_str()))?;
        for p in &self.phases {
            p.validate().map_err(|e| anyhow::anyhow!("{e}"))?;
            MetricSet::from_rules(&p.vitals)
                .map_err(|e| anyhow::anyhow!("phase controller {:?}: {e}", p.id))?;
        }

        let evo = &self.evolution;
        ensure_unique("capability", evo.capabilities.iter().map(|c| c.id.as_str()))?;
        ensure_unique("technique", evo.techniques.iter().map(|t| t.id.as_str()))?;
        for t in &evo.techniques {
            anyhow::ensure!(
                evo.capabilities.iter().any(|c| c.id == t.capability),
                "Technique {:?} references unknown capability {:?}",
                t.id,
                t.capability
            );
        }
        anyhow::ensure!(
            evo.autonomous.cadence_ms > 0,
            "Autonomous cadence must be positive"
        );

        anyhow::ensure!(
            self.improvement.cadence_secs > 0,
            "Self-improvement cadence must be positive"
        );
        anyhow::ensure!(
            self.improvement.cadence_secs <= MAX_DURATION_SECS,
            "Self-improvement cadence must not exceed {MAX_DURATION_SECS}s"
        );
        anyhow::ensure!(
            self.improvement.rules.iter().all(|r| r.metric.is_world()),
            "Self-improvement rules may only target world metrics"
        );
        ensure_rules("self-improvement", &self.improvement.rules)?;

        Ok(())
    }

    /// Parses and validates configuration from TOML.
    pub fn from_toml(content: &str) -> anyhow::Result<Self> {
        let config = toml::from_str::<Self>(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_toml(&self) -> anyhow::Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Hash of the rule set (everything except seed and schedule).
    #[must_use]
    pub fn fingerprint(&self) -> String {
        use sha2::{Digest, Sha256};
        let mut hasher = Sha256::new();
        hasher.update(format!("{:?}", self.monitors).as_bytes());
        hasher.update(format!("{:?}", self.pools).as_bytes());
        hasher.update(format!("{:?}", self.phases).as_bytes());
        hasher.update(format!("{:?}", self.evolution).as_bytes());
        hasher.update(format!("{:?}", self.improvement).as_bytes());
        hex::encode(hasher.finalize())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_validates() {
        let config = EngineConfig::default();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_invalid_tick_period() {
        let config = EngineConfig {
            schedule: ScheduleConfig {
                phase_tick_ms: 0,
                ..Default::default()
            },
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_duplicate_phase_ids() {
        let mut config = EngineConfig::default();
        let dup = config.phases[0].clone();
        config.phases.push(dup);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_bad_probability() {
        let mut config = EngineConfig::default();
        config.phases[0].auto_activate_probability = 2.0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_inverted_bounds_rejected() {
        let mut config = EngineConfig::default();
        config.monitors[0].vitals[0].bounds = Some(ascension_data::Bounds::new(5.0, 1.0));
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_dangling_technique() {
        let mut config = EngineConfig::default();
        config.evolution.techniques[0].capability = "nothing".into();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_all_zero_pool() {
        let mut config = EngineConfig::default();
        for s in &mut config.pools[0].shares {
            s.weight = 0.0;
        }
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_toml_roundtrip_and_partial_files() {
        let config = EngineConfig::default();
        let text = config.to_toml().unwrap();
        let back = EngineConfig::from_toml(&text).unwrap();
        assert_eq!(back, config);

        let partial = EngineConfig::from_toml("seed = 7\n").unwrap();
        assert_eq!(partial.seed, Some(7));
        assert_eq!(partial.phases.len(), 2);
    }

    #[test]
    fn test_overlong_durations_fail_validation() {
        let mut config = EngineConfig::default();
        config.phases[0].phase_duration_secs = u64::MAX / 10;
        assert!(config.validate().is_err());

        let mut config = EngineConfig::default();
        config.improvement.cadence_secs = MAX_DURATION_SECS + 1;
        assert!(config.validate().is_err());

        let text = "[[phases]]\nid = \"protocol\"\nphase_count = 5\nphase_duration_secs = 1844674407370955161\n";
        assert!(EngineConfig::from_toml(text).is_err());
    }

    #[test]
    fn test_partial_evolution_table() {
        let text = "[evolution.autonomous]\nenabled = true\ncadence_ms = 1000\n";
        let config = EngineConfig::from_toml(text).unwrap();
        assert!(config.evolution.autonomous.enabled);
        assert!(config.evolution.capabilities.is_empty());
        assert!(config.evolution.techniques.is_empty());
    }

    #[test]
    fn test_fingerprint_ignores_seed() {
        let a = EngineConfig::default();
        let b = EngineConfig {
            seed: Some(99),
            ..Default::default()
        };
        assert_eq!(a.fingerprint(), b.fingerprint());
    }
}
