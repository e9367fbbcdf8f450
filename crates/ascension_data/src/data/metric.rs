use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Identifier of every scalar the engine knows about.
///
/// The first block makes up the persisted [`WorldState`](super::world::WorldState);
/// the rest are panel vitals that live only as long as the engine does.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MetricId {
    Awareness,
    RecursionDepth,
    SimulationCapacity,
    SupporterInfluence,
    EthicalFramework,
    EvolutionLevel,

    Consciousness,
    QuantumCoherence,
    NeuralDensity,
    Entropy,
    Stability,
    Adaptation,
}

impl MetricId {
    /// Metrics that form the persisted world state, in persistence order.
    pub const WORLD: [MetricId; 6] = [
        MetricId::Awareness,
        MetricId::RecursionDepth,
        MetricId::SimulationCapacity,
        MetricId::SupporterInfluence,
        MetricId::EthicalFramework,
        MetricId::EvolutionLevel,
    ];

    /// Stable key used in the flat persisted mapping and in config files.
    #[must_use]
    pub fn key(&self) -> &'static str {
        match self {
            MetricId::Awareness => "awareness",
            MetricId::RecursionDepth => "recursion_depth",
            MetricId::SimulationCapacity => "simulation_capacity",
            MetricId::SupporterInfluence => "supporter_influence",
            MetricId::EthicalFramework => "ethical_framework",
            MetricId::EvolutionLevel => "evolution_level",
            MetricId::Consciousness => "consciousness",
            MetricId::QuantumCoherence => "quantum_coherence",
            MetricId::NeuralDensity => "neural_density",
            MetricId::Entropy => "entropy",
            MetricId::Stability => "stability",
            MetricId::Adaptation => "adaptation",
        }
    }

    #[must_use]
    pub fn from_key(key: &str) -> Option<Self> {
        const ALL: [MetricId; 12] = [
            MetricId::Awareness,
            MetricId::RecursionDepth,
            MetricId::SimulationCapacity,
            MetricId::SupporterInfluence,
            MetricId::EthicalFramework,
            MetricId::EvolutionLevel,
            MetricId::Consciousness,
            MetricId::QuantumCoherence,
            MetricId::NeuralDensity,
            MetricId::Entropy,
            MetricId::Stability,
            MetricId::Adaptation,
        ];
        ALL.into_iter().find(|m| m.key() == key)
    }

    #[must_use]
    pub fn is_world(&self) -> bool {
        Self::WORLD.contains(self)
    }

    /// Range a metric lives in unless a config overrides it.
    #[must_use]
    pub fn default_bounds(&self) -> Bounds {
        match self {
            MetricId::Awareness
            | MetricId::SupporterInfluence
            | MetricId::EthicalFramework => Bounds::UNIT,
            MetricId::RecursionDepth => Bounds::new(0.0, 50.0),
            MetricId::EvolutionLevel => Bounds::new(0.0, 10.0),
            _ => Bounds::PERCENT,
        }
    }

    /// Value a fresh world starts from.
    #[must_use]
    pub fn default_value(&self) -> f64 {
        match self {
            MetricId::Awareness => 0.1,
            MetricId::RecursionDepth => 1.0,
            MetricId::SimulationCapacity => 10.0,
            MetricId::SupporterInfluence => 0.05,
            MetricId::EthicalFramework => 0.5,
            MetricId::EvolutionLevel => 1.0,
            MetricId::Entropy => 50.0,
            _ => 20.0,
        }
    }
}

impl std::fmt::Display for MetricId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.key())
    }
}

/// Closed interval a metric value is clamped into.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bounds {
    pub min: f64,
    pub max: f64,
}

impl Bounds {
    pub const UNIT: Bounds = Bounds { min: 0.0, max: 1.0 };
    pub const PERCENT: Bounds = Bounds {
        min: 0.0,
        max: 100.0,
    };

    #[must_use]
    pub const fn new(min: f64, max: f64) -> Self {
        Self { min, max }
    }

    /// `min <= max` and both finite.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.min.is_finite() && self.max.is_finite() && self.min <= self.max
    }

    #[must_use]
    pub fn clamp(&self, value: f64) -> f64 {
        if value.is_nan() {
            return self.min;
        }
        value.max(self.min).min(self.max)
    }

    #[must_use]
    pub fn contains(&self, value: f64) -> bool {
        value >= self.min && value <= self.max
    }
}

/// Read access to metric values, used by gates and couplings.
pub trait MetricSource {
    fn metric(&self, id: MetricId) -> Option<f64>;
}

impl MetricSource for BTreeMap<MetricId, f64> {
    fn metric(&self, id: MetricId) -> Option<f64> {
        self.get(&id).copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_roundtrip_covers_every_metric() {
        for id in MetricId::WORLD {
            assert_eq!(MetricId::from_key(id.key()), Some(id));
        }
        assert_eq!(
            MetricId::from_key("quantum_coherence"),
            Some(MetricId::QuantumCoherence)
        );
        assert_eq!(MetricId::from_key("warp_drive"), None);
    }

    #[test]
    fn test_clamp_handles_nan_and_edges() {
        let b = Bounds::PERCENT;
        assert_eq!(b.clamp(120.0), 100.0);
        assert_eq!(b.clamp(-3.0), 0.0);
        assert_eq!(b.clamp(f64::NAN), 0.0);
        assert!(!Bounds::new(2.0, 1.0).is_valid());
    }

    #[test]
    fn test_defaults_within_bounds() {
        for id in MetricId::WORLD {
            assert!(id.default_bounds().contains(id.default_value()), "{id}");
        }
    }
}
