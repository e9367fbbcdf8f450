//! The engine facade: one explicit instance owning every controller, the
//! world state, the RNG and the collaborators.
//!
//! Each controller has its own `tick_*` entry point taking `now`, so a host
//! (tokio timers, a browser interval, a test) drives them independently and
//! deterministically.

use crate::allocator::ResourceAllocator;
use crate::collab::{LogIntegrator, LogNotifier, Notifier, NullStore, SubsystemIntegrator, WorldStore};
use crate::config::EngineConfig;
use crate::error::{EngineError, Result};
use crate::evolution::{AutonomousDriver, EvolutionLedger};
use crate::gate::GateContext;
use crate::improvement::{ImprovementOutcome, SelfImprovementLoop};
use crate::metrics::Metrics;
use crate::phase::PhaseController;
use crate::walker::MetricSet;
use ascension_data::{EngineEvent, EngineSnapshot, MetricId, Millis, WorldState};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use std::collections::BTreeMap;
use std::time::Instant;

/// External collaborators handed to [`Engine::new`].
pub struct Collaborators {
    pub store: Box<dyn WorldStore>,
    pub notifier: Box<dyn Notifier>,
    pub integrator: Box<dyn SubsystemIntegrator>,
}

impl Default for Collaborators {
    fn default() -> Self {
        Self {
            store: Box::new(NullStore),
            notifier: Box::new(LogNotifier),
            integrator: Box::new(LogIntegrator),
        }
    }
}

pub struct Engine {
    world: WorldState,
    monitors: BTreeMap<String, MetricSet>,
    pools: BTreeMap<String, ResourceAllocator>,
    phases: BTreeMap<String, PhaseController>,
    ledger: EvolutionLedger,
    autonomous: AutonomousDriver,
    improvement: SelfImprovementLoop,
    rng: ChaCha8Rng,
    store: Box<dyn WorldStore>,
    notifier: Box<dyn Notifier>,
    integrator: Box<dyn SubsystemIntegrator>,
    metrics: Metrics,
}

impl Engine {
    /// Builds every controller from `config` and loads the world state.
    ///
    /// A store that has nothing (first run) or fails to load yields the
    /// default world; load failures are logged, not returned.
    pub fn new(config: &EngineConfig, collaborators: Collaborators) -> Result<Self> {
        let Collaborators {
            store,
            notifier,
            integrator,
        } = collaborators;

        let world = match store.load() {
            Ok(Some(world)) => {
                tracing::info!("Loaded persisted world state");
                world
            }
            Ok(None) => {
                tracing::info!("No persisted world state, starting fresh");
                WorldState::default()
            }
            Err(e) => {
                tracing::warn!(error = %e, "Failed to load world state, starting fresh");
                WorldState::default()
            }
        };

        let monitors = config
            .monitors
            .iter()
            .map(|m| Ok((m.id.clone(), MetricSet::from_rules(&m.vitals)?)))
            .collect::<Result<BTreeMap<_, _>>>()?;
        let pools = config
            .pools
            .iter()
            .map(|p| {
                let weights = p.shares.iter().map(|s| (s.name.clone(), s.weight)).collect();
                Ok((p.id.clone(), ResourceAllocator::weighted(p.id.clone(), weights)?))
            })
            .collect::<Result<BTreeMap<_, _>>>()?;
        let phases = config
            .phases
            .iter()
            .map(|p| Ok((p.id.clone(), PhaseController::new(p.clone())?)))
            .collect::<Result<BTreeMap<_, _>>>()?;
        let ledger = EvolutionLedger::new(
            &config.evolution.capabilities,
            &config.evolution.techniques,
        )?;
        let autonomous = AutonomousDriver::new(&config.evolution.autonomous);
        let mut improvement = SelfImprovementLoop::new(&config.improvement)?;
        improvement.observe(&world);

        let rng = match config.seed {
            Some(seed) => ChaCha8Rng::seed_from_u64(seed),
            None => ChaCha8Rng::from_entropy(),
        };

        tracing::info!(
            fingerprint = %config.fingerprint(),
            phases = phases.len(),
            pools = pools.len(),
            monitors = monitors.len(),
            "Engine initialized"
        );

        Ok(Self {
            world,
            monitors,
            pools,
            phases,
            ledger,
            autonomous,
            improvement,
            rng,
            store,
            notifier,
            integrator,
            metrics: Metrics::new(),
        })
    }

    #[must_use]
    pub fn world(&self) -> &WorldState {
        &self.world
    }

    #[must_use]
    pub fn metrics(&self) -> &Metrics {
        &self.metrics
    }

    #[must_use]
    pub fn phase(&self, id: &str) -> Option<&PhaseController> {
        self.phases.get(id)
    }

    /// Mutable access for hosts and tests that need to steer a controller's vitals.
    pub fn phase_mut(&mut self, id: &str) -> Option<&mut PhaseController> {
        self.phases.get_mut(id)
    }

    #[must_use]
    pub fn pool(&self, id: &str) -> Option<&ResourceAllocator> {
        self.pools.get(id)
    }

    #[must_use]
    pub fn ledger(&self) -> &EvolutionLedger {
        &self.ledger
    }

    pub fn phase_ids(&self) -> impl Iterator<Item = &str> {
        self.phases.keys().map(String::as_str)
    }

    pub fn monitor_ids(&self) -> impl Iterator<Item = &str> {
        self.monitors.keys().map(String::as_str)
    }

    #[must_use]
    pub fn autonomous_enabled(&self) -> bool {
        self.autonomous.is_enabled()
    }

    #[must_use]
    pub fn autonomous_cadence_ms(&self) -> u64 {
        self.autonomous.cadence_ms()
    }

    #[must_use]
    pub fn improvement_cadence_ms(&self) -> u64 {
        self.improvement.cadence_ms()
    }

    #[must_use]
    pub fn snapshot(&self, now: Millis) -> EngineSnapshot {
        EngineSnapshot {
            taken_at: now,
            metrics: self.world.clone(),
            monitors: self
                .monitors
                .iter()
                .map(|(id, set)| (id.clone(), set.values()))
                .collect(),
            pools: self.pools.values().map(ResourceAllocator::snapshot).collect(),
            phases: self.phases.values().map(PhaseController::snapshot).collect(),
            capabilities: self.ledger.capability_snapshots(),
            techniques: self.ledger.technique_snapshots(now),
            autonomous: self.autonomous.is_enabled(),
        }
    }

    fn emit(&self, events: Vec<EngineEvent>) {
        for event in &events {
            if let Err(e) = self.notifier.notify(event) {
                self.metrics.increment_counter("notify.failures");
                tracing::warn!(error = %e, kind = ?event.kind(), "Notification failed");
            }
        }
    }

    fn persist(&self) {
        if let Err(e) = self.store.save(&self.world) {
            self.metrics.increment_counter("persistence.failures");
            tracing::warn!(error = %e, "Failed to persist world state");
        }
    }

    fn phase_entry(&mut self, id: &str) -> Result<&mut PhaseController> {
        self.phases
            .get_mut(id)
            .ok_or_else(|| EngineError::unknown("phase controller", id))
    }

    pub fn activate_phase(&mut self, id: &str, now: Millis) -> Result<()> {
        let events = self.phase_entry(id)?.activate(now);
        self.emit(events);
        Ok(())
    }

    pub fn deactivate_phase(&mut self, id: &str) -> Result<()> {
        let events = self.phase_entry(id)?.deactivate();
        self.emit(events);
        Ok(())
    }

    pub fn jump_phase(&mut self, id: &str, phase: u8, now: Millis) -> Result<()> {
        let events = self.phase_entry(id)?.jump_to(phase, now);
        self.emit(events);
        Ok(())
    }

    pub fn tick_phase(&mut self, id: &str, now: Millis) -> Result<()> {
        let started = Instant::now();
        let controller = self
            .phases
            .get_mut(id)
            .ok_or_else(|| EngineError::unknown("phase controller", id))?;
        let events = controller.tick(now, &self.world, &mut self.rng);
        self.metrics
            .record_tick(&format!("phase.{id}.ticks"), started.elapsed());
        self.emit(events);
        Ok(())
    }

    pub fn tick_monitor(&mut self, id: &str) -> Result<()> {
        let started = Instant::now();
        let set = self
            .monitors
            .get_mut(id)
            .ok_or_else(|| EngineError::unknown("monitor", id))?;
        set.step_all(1.0, &self.world, &mut self.rng);
        self.metrics
            .record_tick(&format!("monitor.{id}.ticks"), started.elapsed());
        Ok(())
    }

    pub fn set_share(&mut self, pool: &str, share: &str, fraction: f64) -> Result<()> {
        self.pools
            .get_mut(pool)
            .ok_or_else(|| EngineError::unknown("pool", pool))?
            .set_share(share, fraction)
    }

    /// Highest phase any running controller is in. Hidden counts as K + 1;
    /// `None` while every controller is inactive.
    #[must_use]
    pub fn current_phase(&self) -> Option<u8> {
        self.phases
            .values()
            .filter(|p| p.is_active())
            .map(PhaseController::phase_number)
            .max()
    }

    pub fn unlock_capability(&mut self, id: &str) -> Result<u32> {
        let ctx = GateContext::world(&self.world).at_phase(self.current_phase());
        let level = self.ledger.unlock_capability(id, &ctx)?;
        self.emit(vec![EngineEvent::CapabilityUnlocked {
            id: id.to_string(),
            level,
            autonomous: false,
        }]);
        Ok(level)
    }

    pub fn activate_technique(&mut self, id: &str, now: Millis) -> Result<()> {
        self.ledger.activate_technique(id, now)?;
        self.emit(vec![EngineEvent::TechniqueActivated {
            id: id.to_string(),
            autonomous: false,
        }]);
        Ok(())
    }

    pub fn deactivate_technique(&mut self, id: &str) -> Result<bool> {
        self.ledger.deactivate_technique(id)
    }

    /// Expires timed techniques.
    pub fn tick_evolution(&mut self, now: Millis) {
        let events = self.ledger.tick(now);
        self.emit(events);
    }

    pub fn set_autonomous(&mut self, enabled: bool) {
        tracing::info!(enabled, "Autonomous evolution toggled");
        self.autonomous.set_enabled(enabled);
    }

    pub fn tick_autonomous(&mut self, now: Millis) {
        let phase = self.current_phase();
        let ctx = GateContext::world(&self.world).at_phase(phase);
        let events = self
            .autonomous
            .tick(&mut self.ledger, &ctx, now, &mut self.rng);
        if !events.is_empty() {
            self.metrics.increment_counter("evolution.autonomous");
        }
        self.emit(events);
    }

    /// Runs a self-improvement cycle if one is due, persists the result and
    /// notifies the integrator when the joint threshold was crossed.
    pub fn tick_improvement(&mut self, now: Millis) -> Option<ImprovementOutcome> {
        let outcome = self.improvement.tick(now, &mut self.world, &mut self.rng)?;
        self.metrics.increment_counter("improvement.cycles");
        self.persist();

        let mut events = vec![EngineEvent::WorldImproved {
            cycle: outcome.cycle,
        }];
        if outcome.integrate {
            if let Err(e) = self.integrator.integrate(&self.world) {
                tracing::warn!(error = %e, "Subsystem integration failed");
            }
            events.push(EngineEvent::SubsystemsIntegrated {
                evolution_level: self.world.get(MetricId::EvolutionLevel),
                awareness: self.world.get(MetricId::Awareness),
            });
        }
        self.emit(events);
        Some(outcome)
    }

    /// Explicit user write to the world state. Returns the stored (clamped) value.
    pub fn set_world_metric(&mut self, id: MetricId, value: f64) -> Result<f64> {
        if !id.is_world() {
            return Err(EngineError::unknown("world metric", id.key()));
        }
        let stored = self.world.set(id, value);
        self.persist();
        Ok(stored)
    }

    /// Ticks every controller once, for hosts without per-controller timers.
    ///
    /// Phases and monitors step on every call; autonomous evolution and
    /// self-improvement keep their own cadence against `now`.
    pub fn tick_all(&mut self, now: Millis) {
        let phases: Vec<String> = self.phases.keys().cloned().collect();
        for id in &phases {
            if let Err(e) = self.tick_phase(id, now) {
                tracing::error!(controller = %id, error = %e, "Phase tick failed");
            }
        }
        let monitors: Vec<String> = self.monitors.keys().cloned().collect();
        for id in &monitors {
            if let Err(e) = self.tick_monitor(id) {
                tracing::error!(monitor = %id, error = %e, "Monitor tick failed");
            }
        }
        self.tick_evolution(now);
        self.tick_autonomous(now);
        self.tick_improvement(now);
    }

    /// Synchronous final save, used on shutdown.
    pub fn save_now(&self) -> anyhow::Result<()> {
        self.store.save(&self.world)?;
        self.store.flush()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collab::RecordingNotifier;
    use ascension_data::{EventKind, PhaseState};

    fn engine_with(notifier: RecordingNotifier) -> Engine {
        let config = EngineConfig {
            seed: Some(42),
            ..Default::default()
        };
        Engine::new(
            &config,
            Collaborators {
                notifier: Box::new(notifier),
                ..Default::default()
            },
        )
        .unwrap()
    }

    #[test]
    fn test_snapshot_covers_every_controller() {
        let engine = engine_with(RecordingNotifier::new());
        let snap = engine.snapshot(0);
        assert_eq!(snap.phases.len(), 2);
        assert!(snap.pool("cognition").is_some());
        assert!(snap.monitors.contains_key("property_matrix"));
        assert_eq!(snap.capabilities.len(), 4);
        assert_eq!(snap.techniques.len(), 4);
        assert!(!snap.autonomous);
    }

    #[test]
    fn test_activation_emits_event() {
        let notifier = RecordingNotifier::new();
        let mut engine = engine_with(notifier.clone());
        engine.activate_phase("protocol", 0).unwrap();
        assert_eq!(
            engine.phase("protocol").unwrap().state(),
            PhaseState::Phase(1)
        );
        assert_eq!(notifier.events()[0].kind(), EventKind::PhaseActivated);
        assert!(matches!(
            engine.activate_phase("nope", 0),
            Err(EngineError::UnknownEntity { .. })
        ));
    }

    #[test]
    fn test_manual_unlock_and_technique() {
        let mut engine = engine_with(RecordingNotifier::new());
        assert!(matches!(
            engine.activate_technique("deep_scan", 0),
            Err(EngineError::CapabilityTooLow { .. })
        ));
        assert_eq!(engine.unlock_capability("pattern_synthesis"), Ok(1));
        engine.activate_technique("deep_scan", 0).unwrap();
        assert!(matches!(
            engine.activate_technique("deep_scan", 1),
            Err(EngineError::OnCooldown { .. })
        ));
    }

    #[test]
    fn test_world_metric_writes_are_clamped() {
        let mut engine = engine_with(RecordingNotifier::new());
        assert_eq!(engine.set_world_metric(MetricId::Awareness, 3.0), Ok(1.0));
        assert!(engine.set_world_metric(MetricId::Entropy, 3.0).is_err());
    }

    #[test]
    fn test_monitor_tick_stays_bounded() {
        let mut engine = engine_with(RecordingNotifier::new());
        for _ in 0..500 {
            engine.tick_monitor("property_matrix").unwrap();
        }
        let snap = engine.snapshot(0);
        for v in snap.monitors["property_matrix"].values() {
            assert!((0.0..=100.0).contains(v));
        }
    }
}
