use super::metric::MetricId;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Position of a phase controller in its timed progression.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "state", content = "phase", rename_all = "snake_case")]
pub enum PhaseState {
    #[default]
    Inactive,
    /// Ordinary phase, `1..=K`.
    Phase(u8),
    /// Extra terminal phase reachable only after the secret unlock latched.
    Hidden,
}

impl PhaseState {
    #[must_use]
    pub fn is_active(&self) -> bool {
        !matches!(self, PhaseState::Inactive)
    }

    /// Phase number as shown to users: inactive controllers sit at phase 1,
    /// the hidden phase is `K + 1`.
    #[must_use]
    pub fn number(&self, phase_count: u8) -> u8 {
        match self {
            PhaseState::Inactive => 1,
            PhaseState::Phase(n) => *n,
            PhaseState::Hidden => phase_count.saturating_add(1),
        }
    }
}

/// Read-only view of one phase controller.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PhaseSnapshot {
    pub id: String,
    pub state: PhaseState,
    pub phase: u8,
    pub phase_count: u8,
    pub active: bool,
    pub countdown_secs: f64,
    pub hidden_unlocked: bool,
    pub runs_completed: u64,
    pub vitals: BTreeMap<MetricId, f64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_phase_numbers() {
        assert_eq!(PhaseState::Inactive.number(5), 1);
        assert_eq!(PhaseState::Phase(3).number(5), 3);
        assert_eq!(PhaseState::Hidden.number(5), 6);
        assert!(!PhaseState::Inactive.is_active());
        assert!(PhaseState::Hidden.is_active());
    }

    #[test]
    fn test_state_serializes_tagged() {
        let json = serde_json::to_string(&PhaseState::Phase(2)).unwrap();
        assert_eq!(json, r#"{"state":"phase","phase":2}"#);
        let back: PhaseState = serde_json::from_str(r#"{"state":"hidden"}"#).unwrap();
        assert_eq!(back, PhaseState::Hidden);
    }
}
