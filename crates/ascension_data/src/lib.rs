//! Plain data model shared by the Ascension simulation core, its persistence
//! layer and its presentation collaborators.

pub mod data;

pub use data::event::{EngineEvent, EventKind};
pub use data::metric::{Bounds, MetricId, MetricSource};
pub use data::phase::{PhaseSnapshot, PhaseState};
pub use data::snapshot::{CapabilitySnapshot, EngineSnapshot, PoolSnapshot, TechniqueSnapshot};
pub use data::world::WorldState;

/// Milliseconds on the engine's timeline. Hosts decide the epoch.
pub type Millis = u64;
