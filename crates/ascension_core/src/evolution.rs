//! Capability unlocks and cooldown-gated techniques.
//!
//! Manual calls and the [`AutonomousDriver`] go through the same
//! [`EvolutionLedger`] operations; the driver only chooses which id to try.

use crate::cooldown::CooldownLedger;
use crate::error::{EngineError, Result};
use crate::gate::{Condition, GateContext, ThresholdGate};
use ascension_data::{CapabilitySnapshot, EngineEvent, Millis, TechniqueSnapshot};
use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct CapabilityConfig {
    pub id: String,
    pub requirement: Condition,
    #[serde(default)]
    pub max_level: Option<u32>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct TechniqueConfig {
    pub id: String,
    /// Owning capability.
    pub capability: String,
    pub cooldown_ms: u64,
    pub required_level: u32,
    /// Auto-deactivate after this long; `None` stays active until deactivated.
    #[serde(default)]
    pub duration_ms: Option<u64>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct AutonomousConfig {
    #[serde(default)]
    pub enabled: bool,
    pub cadence_ms: u64,
}

impl Default for AutonomousConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            cadence_ms: 15_000,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Capability {
    pub id: String,
    pub level: u32,
    pub unlocked: bool,
    pub max_level: Option<u32>,
    gate: ThresholdGate,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Technique {
    pub id: String,
    pub capability: String,
    pub active: bool,
    pub activated_at: Option<Millis>,
    pub cooldown_ms: u64,
    pub required_level: u32,
    pub duration_ms: Option<u64>,
}

#[derive(Debug, Clone, Default)]
pub struct EvolutionLedger {
    capabilities: BTreeMap<String, Capability>,
    techniques: BTreeMap<String, Technique>,
    cooldowns: CooldownLedger,
}

impl EvolutionLedger {
    pub fn new(capabilities: &[CapabilityConfig], techniques: &[TechniqueConfig]) -> Result<Self> {
        let mut ledger = Self::default();
        for c in capabilities {
            let cap = Capability {
                id: c.id.clone(),
                level: 0,
                unlocked: false,
                max_level: c.max_level,
                gate: ThresholdGate::new(c.requirement.clone()),
            };
            if ledger.capabilities.insert(c.id.clone(), cap).is_some() {
                return Err(EngineError::contract(format!(
                    "capability {:?} declared twice",
                    c.id
                )));
            }
        }
        for t in techniques {
            if !ledger.capabilities.contains_key(&t.capability) {
                return Err(EngineError::contract(format!(
                    "technique {:?} references unknown capability {:?}",
                    t.id, t.capability
                )));
            }
            ledger.cooldowns.register(t.id.clone(), t.cooldown_ms);
            let tech = Technique {
                id: t.id.clone(),
                capability: t.capability.clone(),
                active: false,
                activated_at: None,
                cooldown_ms: t.cooldown_ms,
                required_level: t.required_level,
                duration_ms: t.duration_ms,
            };
            if ledger.techniques.insert(t.id.clone(), tech).is_some() {
                return Err(EngineError::contract(format!(
                    "technique {:?} declared twice",
                    t.id
                )));
            }
        }
        Ok(ledger)
    }

    #[must_use]
    pub fn capability(&self, id: &str) -> Option<&Capability> {
        self.capabilities.get(id)
    }

    #[must_use]
    pub fn technique(&self, id: &str) -> Option<&Technique> {
        self.techniques.get(id)
    }

    /// Increments a capability's level if its requirement holds (or has held).
    ///
    /// Returns the new level. On failure nothing changes.
    pub fn unlock_capability(&mut self, id: &str, ctx: &GateContext<'_>) -> Result<u32> {
        let cap = self
            .capabilities
            .get_mut(id)
            .ok_or_else(|| EngineError::unknown("capability", id))?;
        if let Some(max) = cap.max_level {
            if cap.level >= max {
                return Err(EngineError::MaxLevelReached {
                    capability: id.to_string(),
                    level: cap.level,
                });
            }
        }
        if !cap.gate.evaluate(ctx) {
            return Err(EngineError::RequirementNotMet {
                capability: id.to_string(),
            });
        }
        cap.level += 1;
        cap.unlocked = true;
        tracing::info!(capability = id, level = cap.level, "Capability advanced");
        Ok(cap.level)
    }

    /// Activates a technique if its capability is high enough and it is off cooldown.
    ///
    /// The level check runs first, so a technique that has never been usable
    /// reports `CapabilityTooLow` rather than a cooldown.
    pub fn activate_technique(&mut self, id: &str, now: Millis) -> Result<()> {
        let tech = self
            .techniques
            .get(id)
            .ok_or_else(|| EngineError::unknown("technique", id))?;
        let level = self
            .capabilities
            .get(&tech.capability)
            .map_or(0, |c| c.level);
        if level < tech.required_level {
            return Err(EngineError::CapabilityTooLow {
                technique: id.to_string(),
                capability: tech.capability.clone(),
                level,
                required: tech.required_level,
            });
        }
        if !self.cooldowns.is_ready(id, now) {
            return Err(EngineError::OnCooldown {
                technique: id.to_string(),
                remaining_ms: self.cooldowns.remaining_ms(id, now),
            });
        }

        self.cooldowns.mark_used(id, now);
        if let Some(tech) = self.techniques.get_mut(id) {
            tech.active = true;
            tech.activated_at = Some(now);
        }
        tracing::info!(technique = id, "Technique activated");
        Ok(())
    }

    /// Turns a technique off. Returns whether it was active. The cooldown
    /// keeps running from the last activation.
    pub fn deactivate_technique(&mut self, id: &str) -> Result<bool> {
        let tech = self
            .techniques
            .get_mut(id)
            .ok_or_else(|| EngineError::unknown("technique", id))?;
        let was_active = tech.active;
        tech.active = false;
        if was_active {
            tracing::info!(technique = id, "Technique deactivated");
        }
        Ok(was_active)
    }

    /// Expires techniques whose duration has run out.
    pub fn tick(&mut self, now: Millis) -> Vec<EngineEvent> {
        let mut events = Vec::new();
        for tech in self.techniques.values_mut() {
            let (Some(duration), Some(at)) = (tech.duration_ms, tech.activated_at) else {
                continue;
            };
            if tech.active && now.saturating_sub(at) >= duration {
                tech.active = false;
                tracing::debug!(technique = %tech.id, "Technique expired");
                events.push(EngineEvent::TechniqueExpired {
                    id: tech.id.clone(),
                });
            }
        }
        events
    }

    /// Capabilities whose unlock would currently succeed.
    #[must_use]
    pub fn unlockable(&self, ctx: &GateContext<'_>) -> Vec<String> {
        self.capabilities
            .values()
            .filter(|c| c.max_level.map_or(true, |m| c.level < m))
            .filter(|c| c.gate.would_pass(ctx))
            .map(|c| c.id.clone())
            .collect()
    }

    /// Inactive techniques whose activation would currently succeed.
    #[must_use]
    pub fn activatable(&self, now: Millis) -> Vec<String> {
        self.techniques
            .values()
            .filter(|t| !t.active)
            .filter(|t| {
                self.capabilities
                    .get(&t.capability)
                    .is_some_and(|c| c.level >= t.required_level)
            })
            .filter(|t| self.cooldowns.is_ready(&t.id, now))
            .map(|t| t.id.clone())
            .collect()
    }

    #[must_use]
    pub fn capability_snapshots(&self) -> Vec<CapabilitySnapshot> {
        self.capabilities
            .values()
            .map(|c| CapabilitySnapshot {
                id: c.id.clone(),
                level: c.level,
                unlocked: c.unlocked,
                max_level: c.max_level,
            })
            .collect()
    }

    #[must_use]
    pub fn technique_snapshots(&self, now: Millis) -> Vec<TechniqueSnapshot> {
        self.techniques
            .values()
            .map(|t| TechniqueSnapshot {
                id: t.id.clone(),
                capability: t.capability.clone(),
                active: t.active,
                last_used: self.cooldowns.last_used(&t.id),
                cooldown_ms: t.cooldown_ms,
                required_level: t.required_level,
                ready_in_ms: self.cooldowns.remaining_ms(&t.id, now),
            })
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Action {
    Unlock(String),
    Activate(String),
}

/// Timer-driven caller of ledger operations, picking uniformly among the
/// actions that are currently eligible.
#[derive(Debug, Clone)]
pub struct AutonomousDriver {
    enabled: bool,
    cadence_ms: u64,
    next_due: Option<Millis>,
}

impl AutonomousDriver {
    #[must_use]
    pub fn new(config: &AutonomousConfig) -> Self {
        Self {
            enabled: config.enabled,
            cadence_ms: config.cadence_ms.max(1),
            next_due: None,
        }
    }

    #[must_use]
    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    #[must_use]
    pub fn cadence_ms(&self) -> u64 {
        self.cadence_ms
    }

    pub fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
        self.next_due = None;
    }

    /// Runs at most one action when due. Returns the events it caused.
    pub fn tick<R: Rng + ?Sized>(
        &mut self,
        ledger: &mut EvolutionLedger,
        ctx: &GateContext<'_>,
        now: Millis,
        rng: &mut R,
    ) -> Vec<EngineEvent> {
        if !self.enabled || self.next_due.is_some_and(|due| now < due) {
            return Vec::new();
        }
        self.next_due = Some(now.saturating_add(self.cadence_ms));

        let mut candidates: Vec<Action> = ledger
            .unlockable(ctx)
            .into_iter()
            .map(Action::Unlock)
            .collect();
        candidates.extend(ledger.activatable(now).into_iter().map(Action::Activate));

        let Some(action) = candidates.choose(rng).cloned() else {
            tracing::debug!("Autonomous evolution found nothing eligible");
            return Vec::new();
        };
        match action {
            Action::Unlock(id) => match ledger.unlock_capability(&id, ctx) {
                Ok(level) => vec![EngineEvent::CapabilityUnlocked {
                    id,
                    level,
                    autonomous: true,
                }],
                Err(e) => {
                    tracing::debug!(capability = %id, error = %e, "Autonomous unlock rejected");
                    Vec::new()
                }
            },
            Action::Activate(id) => match ledger.activate_technique(&id, now) {
                Ok(()) => vec![EngineEvent::TechniqueActivated {
                    id,
                    autonomous: true,
                }],
                Err(e) => {
                    tracing::debug!(technique = %id, error = %e, "Autonomous activation rejected");
                    Vec::new()
                }
            },
        }
    }
}
