//! Tokio host: one periodic task per running controller.
//!
//! Every control operation that stops a controller disarms its task before
//! touching engine state, so once the call returns that controller never
//! ticks again until it is re-armed.

use crate::clock::Clock;
use crate::config::ScheduleConfig;
use crate::engine::Engine;
use crate::error::Result;
use ascension_data::{EngineSnapshot, Millis};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

pub type SharedEngine = Arc<Mutex<Engine>>;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum TimerKey {
    Phase(String),
    Monitor(String),
    Evolution,
    Autonomous,
    Improvement,
}

struct Timer {
    handle: JoinHandle<()>,
    cancelled: Arc<AtomicBool>,
}

impl Timer {
    fn cancel(self) {
        self.cancelled.store(true, Ordering::SeqCst);
        self.handle.abort();
    }
}

pub struct Host {
    engine: SharedEngine,
    clock: Arc<dyn Clock>,
    schedule: ScheduleConfig,
    timers: Mutex<HashMap<TimerKey, Timer>>,
}

impl Host {
    pub fn new(engine: Engine, schedule: ScheduleConfig, clock: Arc<dyn Clock>) -> Self {
        Self {
            engine: Arc::new(Mutex::new(engine)),
            clock,
            schedule,
            timers: Mutex::new(HashMap::new()),
        }
    }

    #[must_use]
    pub fn engine(&self) -> SharedEngine {
        Arc::clone(&self.engine)
    }

    #[must_use]
    pub fn now(&self) -> Millis {
        self.clock.now_ms()
    }

    fn lock_engine(&self) -> MutexGuard<'_, Engine> {
        self.engine.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn lock_timers(&self) -> MutexGuard<'_, HashMap<TimerKey, Timer>> {
        self.timers.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Runs `f` against the engine with the current time.
    pub fn with_engine<T>(&self, f: impl FnOnce(&mut Engine, Millis) -> T) -> T {
        let now = self.now();
        let mut engine = self.lock_engine();
        f(&mut engine, now)
    }

    #[must_use]
    pub fn snapshot(&self) -> EngineSnapshot {
        self.with_engine(|engine, now| engine.snapshot(now))
    }

    #[must_use]
    pub fn is_armed(&self, key: &TimerKey) -> bool {
        self.lock_timers()
            .get(key)
            .is_some_and(|t| !t.handle.is_finished())
    }

    /// Arms every controller timer. Must be called from inside a tokio runtime.
    ///
    /// Phase timers run while their controller is inactive so that random
    /// auto-activation can happen.
    pub fn start(&self) {
        let (phases, monitors, autonomous, autonomous_ms, improvement_ms) = {
            let engine = self.lock_engine();
            (
                engine.phase_ids().map(str::to_string).collect::<Vec<_>>(),
                engine.monitor_ids().map(str::to_string).collect::<Vec<_>>(),
                engine.autonomous_enabled(),
                engine.autonomous_cadence_ms(),
                engine.improvement_cadence_ms(),
            )
        };
        for id in phases {
            self.arm(TimerKey::Phase(id), self.schedule.phase_tick_ms);
        }
        for id in monitors {
            self.arm(TimerKey::Monitor(id), self.schedule.monitor_tick_ms);
        }
        self.arm(TimerKey::Evolution, self.schedule.evolution_tick_ms);
        self.arm(TimerKey::Improvement, improvement_ms);
        if autonomous {
            self.arm(TimerKey::Autonomous, autonomous_ms);
        }
        tracing::info!(timers = self.lock_timers().len(), "Host started");
    }

    fn arm(&self, key: TimerKey, period_ms: u64) {
        let mut timers = self.lock_timers();
        if timers.get(&key).is_some_and(|t| !t.handle.is_finished()) {
            return;
        }
        let cancelled = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&cancelled);
        let engine = Arc::clone(&self.engine);
        let clock = Arc::clone(&self.clock);
        let task_key = key.clone();
        let handle = tokio::spawn(async move {
            let mut interval = tokio::time::interval(Duration::from_millis(period_ms.max(1)));
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                interval.tick().await;
                let stop = {
                    let mut engine = engine.lock().unwrap_or_else(PoisonError::into_inner);
                    // Checked under the engine lock; see `barrier`.
                    if flag.load(Ordering::SeqCst) {
                        true
                    } else {
                        fire(&mut engine, &task_key, clock.now_ms());
                        false
                    }
                };
                if stop {
                    break;
                }
            }
        });
        tracing::debug!(?key, period_ms, "Timer armed");
        timers.insert(key, Timer { handle, cancelled });
    }

    /// Waits out a tick that may be running right now. Cancelled tasks check
    /// their flag under the same lock, so none can tick after this.
    fn barrier(&self) {
        drop(self.lock_engine());
    }

    fn disarm(&self, key: &TimerKey) {
        let timer = self.lock_timers().remove(key);
        if let Some(timer) = timer {
            timer.cancel();
            self.barrier();
            tracing::debug!(?key, "Timer disarmed");
        }
    }

    pub fn activate_phase(&self, id: &str) -> Result<()> {
        self.with_engine(|engine, now| engine.activate_phase(id, now))?;
        self.arm(TimerKey::Phase(id.to_string()), self.schedule.phase_tick_ms);
        Ok(())
    }

    /// Stops the controller and its timer. It stays off (no auto-activation)
    /// until activated again.
    pub fn deactivate_phase(&self, id: &str) -> Result<()> {
        self.disarm(&TimerKey::Phase(id.to_string()));
        self.with_engine(|engine, _| engine.deactivate_phase(id))
    }

    pub fn jump_phase(&self, id: &str, phase: u8) -> Result<()> {
        self.with_engine(|engine, now| engine.jump_phase(id, phase, now))?;
        self.arm(TimerKey::Phase(id.to_string()), self.schedule.phase_tick_ms);
        Ok(())
    }

    pub fn set_autonomous(&self, enabled: bool) {
        if enabled {
            let cadence = self.with_engine(|engine, _| {
                engine.set_autonomous(true);
                engine.autonomous_cadence_ms()
            });
            self.arm(TimerKey::Autonomous, cadence);
        } else {
            self.disarm(&TimerKey::Autonomous);
            self.with_engine(|engine, _| engine.set_autonomous(false));
        }
    }

    /// Cancels every timer. No tick fires after this returns.
    pub fn stop(&self) {
        let timers: Vec<Timer> = self.lock_timers().drain().map(|(_, t)| t).collect();
        let count = timers.len();
        for timer in timers {
            timer.cancel();
        }
        self.barrier();
        tracing::info!(timers = count, "Host stopped");
    }

    /// Stops every timer, then saves the world synchronously.
    pub fn shutdown(&self) -> anyhow::Result<()> {
        self.stop();
        self.lock_engine().save_now()
    }
}

impl Drop for Host {
    fn drop(&mut self) {
        for (_, timer) in self.lock_timers().drain() {
            timer.cancel();
        }
    }
}

fn fire(engine: &mut Engine, key: &TimerKey, now: Millis) {
    let result = match key {
        TimerKey::Phase(id) => engine.tick_phase(id, now),
        TimerKey::Monitor(id) => engine.tick_monitor(id),
        TimerKey::Evolution => {
            engine.tick_evolution(now);
            Ok(())
        }
        TimerKey::Autonomous => {
            engine.tick_autonomous(now);
            Ok(())
        }
        TimerKey::Improvement => {
            engine.tick_improvement(now);
            Ok(())
        }
    };
    if let Err(e) = result {
        tracing::error!(?key, error = %e, "Timer tick failed");
    }
}
