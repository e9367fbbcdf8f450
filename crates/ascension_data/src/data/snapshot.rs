use super::metric::MetricId;
use super::phase::PhaseSnapshot;
use super::world::WorldState;
use crate::Millis;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// One resource pool with its shares in declaration order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PoolSnapshot {
    pub id: String,
    pub shares: Vec<(String, f64)>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CapabilitySnapshot {
    pub id: String,
    pub level: u32,
    pub unlocked: bool,
    pub max_level: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TechniqueSnapshot {
    pub id: String,
    pub capability: String,
    pub active: bool,
    pub last_used: Option<Millis>,
    pub cooldown_ms: u64,
    pub required_level: u32,
    /// Milliseconds until the technique may be activated again; 0 when ready.
    pub ready_in_ms: u64,
}

/// Everything a presentation collaborator may read, taken at one instant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineSnapshot {
    pub taken_at: Millis,
    pub metrics: WorldState,
    pub monitors: BTreeMap<String, BTreeMap<MetricId, f64>>,
    pub pools: Vec<PoolSnapshot>,
    pub phases: Vec<PhaseSnapshot>,
    pub capabilities: Vec<CapabilitySnapshot>,
    pub techniques: Vec<TechniqueSnapshot>,
    pub autonomous: bool,
}

impl EngineSnapshot {
    #[must_use]
    pub fn phase(&self, id: &str) -> Option<&PhaseSnapshot> {
        self.phases.iter().find(|p| p.id == id)
    }

    #[must_use]
    pub fn pool(&self, id: &str) -> Option<&PoolSnapshot> {
        self.pools.iter().find(|p| p.id == id)
    }

    #[must_use]
    pub fn capability(&self, id: &str) -> Option<&CapabilitySnapshot> {
        self.capabilities.iter().find(|c| c.id == id)
    }

    #[must_use]
    pub fn technique(&self, id: &str) -> Option<&TechniqueSnapshot> {
        self.techniques.iter().find(|t| t.id == id)
    }
}
