use serde::{Deserialize, Serialize};

/// Coarse category of an [`EngineEvent`], used by notification collaborators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    PhaseActivated,
    PhaseAdvanced,
    HiddenPhaseEntered,
    SecretUnlocked,
    CycleCompleted,
    PhaseDeactivated,
    CapabilityUnlocked,
    TechniqueActivated,
    TechniqueExpired,
    WorldImproved,
    SubsystemsIntegrated,
}

/// One-way notification emitted by the engine. Delivery is best effort.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum EngineEvent {
    PhaseActivated { controller: String, automatic: bool },
    PhaseAdvanced { controller: String, from: u8, to: u8 },
    HiddenPhaseEntered { controller: String },
    SecretUnlocked { controller: String },
    CycleCompleted { controller: String, hidden: bool },
    PhaseDeactivated { controller: String },
    CapabilityUnlocked { id: String, level: u32, autonomous: bool },
    TechniqueActivated { id: String, autonomous: bool },
    TechniqueExpired { id: String },
    WorldImproved { cycle: u64 },
    SubsystemsIntegrated { evolution_level: f64, awareness: f64 },
}

impl EngineEvent {
    #[must_use]
    pub fn kind(&self) -> EventKind {
        match self {
            EngineEvent::PhaseActivated { .. } => EventKind::PhaseActivated,
            EngineEvent::PhaseAdvanced { .. } => EventKind::PhaseAdvanced,
            EngineEvent::HiddenPhaseEntered { .. } => EventKind::HiddenPhaseEntered,
            EngineEvent::SecretUnlocked { .. } => EventKind::SecretUnlocked,
            EngineEvent::CycleCompleted { .. } => EventKind::CycleCompleted,
            EngineEvent::PhaseDeactivated { .. } => EventKind::PhaseDeactivated,
            EngineEvent::CapabilityUnlocked { .. } => EventKind::CapabilityUnlocked,
            EngineEvent::TechniqueActivated { .. } => EventKind::TechniqueActivated,
            EngineEvent::TechniqueExpired { .. } => EventKind::TechniqueExpired,
            EngineEvent::WorldImproved { .. } => EventKind::WorldImproved,
            EngineEvent::SubsystemsIntegrated { .. } => EventKind::SubsystemsIntegrated,
        }
    }

    /// Rough importance in `[0, 1]`, used to pick a narration register.
    #[must_use]
    pub fn severity(&self) -> f32 {
        match self.kind() {
            EventKind::SecretUnlocked | EventKind::SubsystemsIntegrated => 0.95,
            EventKind::HiddenPhaseEntered => 0.9,
            EventKind::CapabilityUnlocked | EventKind::CycleCompleted => 0.6,
            EventKind::PhaseAdvanced | EventKind::TechniqueActivated => 0.5,
            _ => 0.2,
        }
    }
}
