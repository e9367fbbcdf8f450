pub mod macros;

use ascension_lib::model::collab::{RecordingNotifier, SubsystemIntegrator, WorldStore};
use ascension_lib::model::config::EngineConfig;
use ascension_lib::model::persistence::MemoryStore;
use ascension_lib::model::state::WorldState;
use ascension_lib::model::{Collaborators, Engine};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

/// Integrator that counts calls and can be told to fail.
#[allow(dead_code)]
#[derive(Clone, Default)]
pub struct CountingIntegrator {
    pub calls: Arc<AtomicUsize>,
    pub fail: Arc<AtomicBool>,
}

#[allow(dead_code)]
impl CountingIntegrator {
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl SubsystemIntegrator for CountingIntegrator {
    fn integrate(&self, _world: &WorldState) -> anyhow::Result<()> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail.load(Ordering::SeqCst) {
            anyhow::bail!("integration endpoint unreachable");
        }
        Ok(())
    }
}

#[allow(dead_code)]
pub struct EngineBuilder {
    config: EngineConfig,
    store: Box<dyn WorldStore>,
    integrator: CountingIntegrator,
}

#[allow(dead_code)]
impl EngineBuilder {
    pub fn new() -> Self {
        Self {
            config: EngineConfig {
                seed: Some(42),
                ..Default::default()
            },
            store: Box::new(MemoryStore::new()),
            integrator: CountingIntegrator::default(),
        }
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.config.seed = Some(seed);
        self
    }

    pub fn with_config<F>(mut self, modifier: F) -> Self
    where
        F: FnOnce(&mut EngineConfig),
    {
        modifier(&mut self.config);
        self
    }

    pub fn with_store<S: WorldStore + 'static>(mut self, store: S) -> Self {
        self.store = Box::new(store);
        self
    }

    pub fn with_world(self, world: WorldState) -> Self {
        self.with_store(MemoryStore::with_state(world))
    }

    pub fn with_integrator(mut self, integrator: CountingIntegrator) -> Self {
        self.integrator = integrator;
        self
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn build(self) -> (Engine, RecordingNotifier) {
        let notifier = RecordingNotifier::new();
        let engine = Engine::new(
            &self.config,
            Collaborators {
                store: self.store,
                notifier: Box::new(notifier.clone()),
                integrator: Box::new(self.integrator),
            },
        )
        .expect("Failed to create engine in test builder");
        (engine, notifier)
    }
}
