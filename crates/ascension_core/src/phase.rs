//! Timed phase progression.
//!
//! ```text
//! Inactive --activate--> Phase(1) --0s--> Phase(2) ... Phase(K)
//! Phase(K) --0s, secret latched--> Hidden --0s--> Inactive
//! Phase(K) --0s, not latched-----> Inactive
//! any      --deactivate----------> Inactive
//! ```
//!
//! While inactive, every tick is a Bernoulli trial with
//! `auto_activate_probability`; it is not a scheduled event and has no
//! latency guarantee. The secret latch is owned by the controller for its
//! whole lifetime and survives deactivation.

use crate::error::{EngineError, Result};
use crate::gate::{Condition, GateContext, ThresholdGate};
use crate::walker::{MetricSet, WalkRule};
use ascension_data::{EngineEvent, Millis, PhaseSnapshot, PhaseState, WorldState};
use rand::Rng;
use serde::{Deserialize, Serialize};

/// Longest configurable phase or cadence: one year.
pub const MAX_DURATION_SECS: u64 = 365 * 24 * 60 * 60;

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct PhaseConfig {
    pub id: String,
    /// K, the number of ordinary phases.
    pub phase_count: u8,
    pub phase_duration_secs: u64,
    /// Defaults to `phase_duration_secs`.
    #[serde(default)]
    pub hidden_duration_secs: Option<u64>,
    #[serde(default)]
    pub auto_activate_probability: f64,
    /// Without one the hidden phase is unreachable.
    #[serde(default)]
    pub hidden_condition: Option<Condition>,
    #[serde(default)]
    pub vitals: Vec<WalkRule>,
}

impl PhaseConfig {
    #[must_use]
    pub fn new(id: impl Into<String>, phase_count: u8, phase_duration_secs: u64) -> Self {
        Self {
            id: id.into(),
            phase_count,
            phase_duration_secs,
            hidden_duration_secs: None,
            auto_activate_probability: 0.0,
            hidden_condition: None,
            vitals: Vec::new(),
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.phase_count == 0 || self.phase_count == u8::MAX {
            return Err(EngineError::contract(format!(
                "controller {:?}: phase count {} out of range",
                self.id, self.phase_count
            )));
        }
        if self.phase_duration_secs == 0 || self.hidden_duration_secs == Some(0) {
            return Err(EngineError::contract(format!(
                "controller {:?}: phase durations must be positive",
                self.id
            )));
        }
        let longest = self
            .phase_duration_secs
            .max(self.hidden_duration_secs.unwrap_or(0));
        if longest > MAX_DURATION_SECS {
            return Err(EngineError::contract(format!(
                "controller {:?}: phase duration {longest}s exceeds {MAX_DURATION_SECS}s",
                self.id
            )));
        }
        if !(0.0..=1.0).contains(&self.auto_activate_probability) {
            return Err(EngineError::contract(format!(
                "controller {:?}: auto-activate probability {} outside [0, 1]",
                self.id, self.auto_activate_probability
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct PhaseController {
    config: PhaseConfig,
    state: PhaseState,
    countdown_ms: u64,
    last_tick: Option<Millis>,
    hidden_gate: Option<ThresholdGate>,
    vitals: MetricSet,
    runs_completed: u64,
    // Cleared on every activation.
    entered_hidden_this_run: bool,
}

impl PhaseController {
    pub fn new(config: PhaseConfig) -> Result<Self> {
        config.validate()?;
        let vitals = MetricSet::from_rules(&config.vitals)?;
        let hidden_gate = config.hidden_condition.clone().map(ThresholdGate::new);
        let countdown_ms = config.phase_duration_secs.saturating_mul(1_000);
        Ok(Self {
            config,
            state: PhaseState::Inactive,
            countdown_ms,
            last_tick: None,
            hidden_gate,
            vitals,
            runs_completed: 0,
            entered_hidden_this_run: false,
        })
    }

    #[must_use]
    pub fn id(&self) -> &str {
        &self.config.id
    }

    #[must_use]
    pub fn state(&self) -> PhaseState {
        self.state
    }

    #[must_use]
    pub fn is_active(&self) -> bool {
        self.state.is_active()
    }

    #[must_use]
    pub fn phase_number(&self) -> u8 {
        self.state.number(self.config.phase_count)
    }

    #[must_use]
    pub fn countdown_ms(&self) -> u64 {
        self.countdown_ms
    }

    #[must_use]
    pub fn hidden_unlocked(&self) -> bool {
        self.hidden_gate.as_ref().is_some_and(ThresholdGate::is_latched)
    }

    #[must_use]
    pub fn entered_hidden_this_run(&self) -> bool {
        self.entered_hidden_this_run
    }

    #[must_use]
    pub fn runs_completed(&self) -> u64 {
        self.runs_completed
    }

    #[must_use]
    pub fn vitals(&self) -> &MetricSet {
        &self.vitals
    }

    pub fn vitals_mut(&mut self) -> &mut MetricSet {
        &mut self.vitals
    }

    fn phase_ms(&self) -> u64 {
        self.config.phase_duration_secs.saturating_mul(1_000)
    }

    fn hidden_ms(&self) -> u64 {
        self.config
            .hidden_duration_secs
            .unwrap_or(self.config.phase_duration_secs)
            .saturating_mul(1_000)
    }

    /// Starts a run at phase 1. No-op while already active.
    pub fn activate(&mut self, now: Millis) -> Vec<EngineEvent> {
        self.start(now, false)
    }

    fn start(&mut self, now: Millis, automatic: bool) -> Vec<EngineEvent> {
        if self.is_active() {
            return Vec::new();
        }
        self.state = PhaseState::Phase(1);
        self.countdown_ms = self.phase_ms();
        self.last_tick = Some(now);
        self.entered_hidden_this_run = false;
        tracing::info!(controller = %self.config.id, automatic, "Phase protocol activated");
        vec![EngineEvent::PhaseActivated {
            controller: self.config.id.clone(),
            automatic,
        }]
    }

    /// Manual stop. Always legal; resets to phase 1 inactive. The secret
    /// latch is kept.
    pub fn deactivate(&mut self) -> Vec<EngineEvent> {
        let was_active = self.is_active();
        self.reset();
        if was_active {
            tracing::info!(controller = %self.config.id, "Phase protocol deactivated");
            vec![EngineEvent::PhaseDeactivated {
                controller: self.config.id.clone(),
            }]
        } else {
            Vec::new()
        }
    }

    fn reset(&mut self) {
        self.state = PhaseState::Inactive;
        self.countdown_ms = self.phase_ms();
        self.last_tick = None;
    }

    /// Moves straight to phase `n` (`K + 1` names the hidden phase and needs the latch).
    ///
    /// An out-of-range `n` is a contract violation: debug builds panic,
    /// release builds log and clamp into the legal range.
    pub fn jump_to(&mut self, n: u8, now: Millis) -> Vec<EngineEvent> {
        let k = self.config.phase_count;
        let max = if self.hidden_unlocked() { k + 1 } else { k };
        let legal = (1..=max).contains(&n);
        debug_assert!(
            legal,
            "contract violation: phase {n} outside 1..={max} for controller {:?}",
            self.config.id
        );
        if !legal {
            tracing::error!(controller = %self.config.id, phase = n, max, "Phase index out of range, clamping");
        }
        let n = n.clamp(1, max);

        let mut events = self.start(now, false);
        let from = self.phase_number();
        if n > k {
            self.state = PhaseState::Hidden;
            self.countdown_ms = self.hidden_ms();
            self.entered_hidden_this_run = true;
        } else {
            self.state = PhaseState::Phase(n);
            self.countdown_ms = self.phase_ms();
        }
        self.last_tick = Some(now);
        if from != n {
            events.push(EngineEvent::PhaseAdvanced {
                controller: self.config.id.clone(),
                from,
                to: n,
            });
        }
        events
    }

    /// Advances the controller to `now`.
    ///
    /// Inactive: one Bernoulli auto-activation trial. Active: vitals take one
    /// step biased by the phase number, the secret gate is evaluated, then
    /// elapsed time is consumed from the countdown, possibly crossing several
    /// phase boundaries if the host fell behind.
    pub fn tick<R: Rng + ?Sized>(
        &mut self,
        now: Millis,
        world: &WorldState,
        rng: &mut R,
    ) -> Vec<EngineEvent> {
        if !self.is_active() {
            let p = self.config.auto_activate_probability;
            if p > 0.0 && rng.gen_bool(p) {
                return self.start(now, true);
            }
            return Vec::new();
        }

        let mut events = Vec::new();
        let mut elapsed = now.saturating_sub(self.last_tick.unwrap_or(now));
        self.last_tick = Some(now);

        let phase = self.phase_number();
        self.vitals.step_all(f64::from(phase), world, rng);

        if let Some(gate) = self.hidden_gate.as_mut() {
            let vitals = self.vitals.values();
            let ctx = GateContext {
                world,
                vitals: Some(&vitals),
                phase: Some(phase),
            };
            if gate.evaluate_edge(&ctx) {
                tracing::info!(controller = %self.config.id, phase, "Secret unlock latched");
                events.push(EngineEvent::SecretUnlocked {
                    controller: self.config.id.clone(),
                });
            }
        }

        while self.is_active() && elapsed >= self.countdown_ms {
            elapsed -= self.countdown_ms;
            self.advance(&mut events);
        }
        if self.is_active() {
            self.countdown_ms -= elapsed;
        }
        events
    }

    fn advance(&mut self, events: &mut Vec<EngineEvent>) {
        let k = self.config.phase_count;
        match self.state {
            PhaseState::Phase(n) if n < k => {
                self.state = PhaseState::Phase(n + 1);
                self.countdown_ms = self.phase_ms();
                tracing::info!(controller = %self.config.id, from = n, to = n + 1, "Phase advanced");
                events.push(EngineEvent::PhaseAdvanced {
                    controller: self.config.id.clone(),
                    from: n,
                    to: n + 1,
                });
            }
            PhaseState::Phase(_) if self.hidden_unlocked() => {
                self.state = PhaseState::Hidden;
                self.countdown_ms = self.hidden_ms();
                self.entered_hidden_this_run = true;
                tracing::info!(controller = %self.config.id, "Hidden phase entered");
                events.push(EngineEvent::HiddenPhaseEntered {
                    controller: self.config.id.clone(),
                });
            }
            PhaseState::Phase(_) => self.finish_cycle(events, false),
            PhaseState::Hidden => self.finish_cycle(events, true),
            PhaseState::Inactive => {}
        }
    }

    fn finish_cycle(&mut self, events: &mut Vec<EngineEvent>, hidden: bool) {
        self.reset();
        self.runs_completed += 1;
        tracing::info!(controller = %self.config.id, hidden, runs = self.runs_completed, "Phase cycle completed");
        events.push(EngineEvent::CycleCompleted {
            controller: self.config.id.clone(),
            hidden,
        });
    }

    #[must_use]
    pub fn snapshot(&self) -> PhaseSnapshot {
        PhaseSnapshot {
            id: self.config.id.clone(),
            state: self.state,
            phase: self.phase_number(),
            phase_count: self.config.phase_count,
            active: self.is_active(),
            countdown_secs: self.countdown_ms as f64 / 1_000.0,
            hidden_unlocked: self.hidden_unlocked(),
            runs_completed: self.runs_completed,
            vitals: self.vitals.values(),
        }
    }
}
