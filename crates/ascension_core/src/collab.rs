//! Seams to the outside world: persistence, notification and subsystem
//! integration. The engine never depends on any of them succeeding.

use ascension_data::{EngineEvent, WorldState};
use std::sync::{Arc, Mutex};

/// Persistence for the world state.
///
/// `save` must not block on I/O completion; implementations that touch disk
/// hand the work to a writer (see `ascension_io::BackgroundStore`).
pub trait WorldStore: Send {
    /// `Ok(None)` means first run.
    fn load(&self) -> anyhow::Result<Option<WorldState>>;
    fn save(&self, state: &WorldState) -> anyhow::Result<()>;
    /// Blocks until earlier saves have been written. Called on shutdown.
    fn flush(&self) -> anyhow::Result<()> {
        Ok(())
    }
}

pub trait Notifier: Send + Sync {
    fn notify(&self, event: &EngineEvent) -> anyhow::Result<()>;
}

/// Receives the one-way "integrate subsystems" call.
pub trait SubsystemIntegrator: Send {
    fn integrate(&self, world: &WorldState) -> anyhow::Result<()>;
}

/// Store that remembers nothing.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullStore;

impl WorldStore for NullStore {
    fn load(&self) -> anyhow::Result<Option<WorldState>> {
        Ok(None)
    }

    fn save(&self, _state: &WorldState) -> anyhow::Result<()> {
        Ok(())
    }
}

/// Notifier that writes events to the log.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn notify(&self, event: &EngineEvent) -> anyhow::Result<()> {
        tracing::info!(kind = ?event.kind(), ?event, "Engine event");
        Ok(())
    }
}

/// Notifier that keeps every event in memory, for tests and embedders that poll.
#[derive(Debug, Default, Clone)]
pub struct RecordingNotifier {
    events: Arc<Mutex<Vec<EngineEvent>>>,
}

impl RecordingNotifier {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn events(&self) -> Vec<EngineEvent> {
        self.events
            .lock()
            .map(|e| e.clone())
            .unwrap_or_default()
    }

    pub fn take(&self) -> Vec<EngineEvent> {
        self.events
            .lock()
            .map(|mut e| std::mem::take(&mut *e))
            .unwrap_or_default()
    }
}

impl Notifier for RecordingNotifier {
    fn notify(&self, event: &EngineEvent) -> anyhow::Result<()> {
        self.events
            .lock()
            .map_err(|_| anyhow::anyhow!("event log poisoned"))?
            .push(event.clone());
        Ok(())
    }
}

/// Integrator that only logs.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogIntegrator;

impl SubsystemIntegrator for LogIntegrator {
    fn integrate(&self, world: &WorldState) -> anyhow::Result<()> {
        tracing::info!(?world, "Integrating subsystems");
        Ok(())
    }
}

impl<T: Notifier + ?Sized> Notifier for Arc<T> {
    fn notify(&self, event: &EngineEvent) -> anyhow::Result<()> {
        (**self).notify(event)
    }
}
