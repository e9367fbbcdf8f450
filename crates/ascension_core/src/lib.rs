//! # Ascension Core
//!
//! The simulation engine behind Ascension: a set of independently ticking
//! controllers that evolve bounded metrics over time.
//!
//! This crate contains:
//! - Bounded random-walk metrics with multiplicative coupling
//! - Finite phase controllers with a gated hidden phase
//! - Normalized resource pools
//! - Capability/technique ledgers with cooldowns and an autonomous driver
//! - The background self-improvement loop
//! - The [`Engine`] facade and a tokio [`Host`] that schedules it
//!
//! ## Determinism
//!
//! Every tick takes `now` explicitly and all randomness flows through one
//! seeded `ChaCha8Rng`, so a fixed seed and tick sequence replays exactly.
//!
//! ## Example
//!
//! ```
//! use ascension_core::{Collaborators, Engine, EngineConfig};
//!
//! let config = EngineConfig { seed: Some(42), ..Default::default() };
//! let mut engine = Engine::new(&config, Collaborators::default()).unwrap();
//! engine.activate_phase("protocol", 0).unwrap();
//! engine.tick_phase("protocol", 60_000).unwrap();
//! assert_eq!(engine.snapshot(60_000).phase("protocol").unwrap().phase, 2);
//! ```

/// Proportional share pools
pub mod allocator;
pub mod clock;
/// Persistence, notification and integration seams
pub mod collab;
/// Engine configuration, validation and fingerprinting
pub mod config;
pub mod cooldown;
pub mod engine;
pub mod error;
/// Capabilities, techniques and autonomous evolution
pub mod evolution;
/// Threshold conditions and latching gates
pub mod gate;
pub mod improvement;
pub mod metrics;
/// Phase controllers
pub mod phase;
#[cfg(not(target_arch = "wasm32"))]
pub mod scheduler;
/// Bounded random walks
pub mod walker;

pub use allocator::ResourceAllocator;
pub use clock::{Clock, ManualClock, SystemClock};
#[cfg(not(target_arch = "wasm32"))]
pub use clock::TokioClock;
pub use collab::{Notifier, NullStore, RecordingNotifier, SubsystemIntegrator, WorldStore};
pub use config::EngineConfig;
pub use engine::{Collaborators, Engine};
pub use error::{EngineError, Result};
#[cfg(not(target_arch = "wasm32"))]
pub use scheduler::{Host, SharedEngine, TimerKey};
