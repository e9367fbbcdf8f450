//! Per-entity cooldown bookkeeping.

use ascension_data::Millis;
use std::collections::HashMap;

#[derive(Debug, Clone, Default)]
pub struct CooldownLedger {
    cooldowns: HashMap<String, u64>,
    last_used: HashMap<String, Millis>,
}

impl CooldownLedger {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers (or re-configures) an entity's cooldown.
    pub fn register(&mut self, name: impl Into<String>, cooldown_ms: u64) {
        self.cooldowns.insert(name.into(), cooldown_ms);
    }

    #[must_use]
    pub fn is_known(&self, name: &str) -> bool {
        self.cooldowns.contains_key(name)
    }

    /// Ready when never used, or when at least the cooldown has elapsed since last use.
    #[must_use]
    pub fn is_ready(&self, name: &str, now: Millis) -> bool {
        self.remaining_ms(name, now) == 0
    }

    /// Milliseconds until `name` is ready again. A clock that went backwards
    /// counts as no time elapsed.
    #[must_use]
    pub fn remaining_ms(&self, name: &str, now: Millis) -> u64 {
        let Some(last) = self.last_used.get(name) else {
            return 0;
        };
        let cooldown = self.cooldowns.get(name).copied().unwrap_or(0);
        let elapsed = now.saturating_sub(*last);
        cooldown.saturating_sub(elapsed)
    }

    /// Records a use. Unknown entities are ignored.
    pub fn mark_used(&mut self, name: &str, now: Millis) {
        if self.cooldowns.contains_key(name) {
            self.last_used.insert(name.to_string(), now);
        }
    }

    #[must_use]
    pub fn last_used(&self, name: &str) -> Option<Millis> {
        self.last_used.get(name).copied()
    }
}
