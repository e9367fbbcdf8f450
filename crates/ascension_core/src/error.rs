//! Error taxonomy for engine operations.
//!
//! Gate failures (`InvalidShare`, `RequirementNotMet`, `OnCooldown`,
//! `CapabilityTooLow`, `MaxLevelReached`) are expected outcomes a UI renders
//! as "not ready". `ContractViolation` marks programmer error.

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum EngineError {
    /// A share outside `[0, 1]` was offered to an allocator.
    #[error("invalid share {value} for {share:?} in pool {pool:?}: must be within [0, 1]")]
    InvalidShare {
        pool: String,
        share: String,
        value: f64,
    },

    #[error("requirement for capability {capability:?} is not met")]
    RequirementNotMet { capability: String },

    #[error("capability {capability:?} is already at its maximum level {level}")]
    MaxLevelReached { capability: String, level: u32 },

    #[error("technique {technique:?} is cooling down for another {remaining_ms} ms")]
    OnCooldown {
        technique: String,
        remaining_ms: u64,
    },

    #[error("technique {technique:?} needs {capability:?} at level {required}, it is at {level}")]
    CapabilityTooLow {
        technique: String,
        capability: String,
        level: u32,
        required: u32,
    },

    #[error("unknown {kind} {id:?}")]
    UnknownEntity { kind: &'static str, id: String },

    #[error("contract violation: {0}")]
    ContractViolation(String),
}

/// Result type alias for engine operations.
pub type Result<T> = std::result::Result<T, EngineError>;

impl EngineError {
    #[must_use]
    pub fn unknown<S: Into<String>>(kind: &'static str, id: S) -> Self {
        Self::UnknownEntity {
            kind,
            id: id.into(),
        }
    }

    #[must_use]
    pub fn contract<S: Into<String>>(msg: S) -> Self {
        Self::ContractViolation(msg.into())
    }

    /// Everything except a contract violation is a normal outcome callers can show.
    #[must_use]
    pub fn is_recoverable(&self) -> bool {
        !matches!(self, Self::ContractViolation(_))
    }

    /// Short machine-readable name, stable across message wording changes.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::InvalidShare { .. } => "invalid_share",
            Self::RequirementNotMet { .. } => "requirement_not_met",
            Self::MaxLevelReached { .. } => "max_level_reached",
            Self::OnCooldown { .. } => "on_cooldown",
            Self::CapabilityTooLow { .. } => "capability_too_low",
            Self::UnknownEntity { .. } => "unknown_entity",
            Self::ContractViolation(_) => "contract_violation",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = EngineError::OnCooldown {
            technique: "deep_scan".into(),
            remaining_ms: 1500,
        };
        assert_eq!(
            err.to_string(),
            "technique \"deep_scan\" is cooling down for another 1500 ms"
        );
        assert_eq!(err.kind(), "on_cooldown");
    }

    #[test]
    fn test_only_contract_violations_are_unrecoverable() {
        assert!(EngineError::unknown("pool", "x").is_recoverable());
        assert!(!EngineError::contract("phase 9 of 3").is_recoverable());
    }
}
