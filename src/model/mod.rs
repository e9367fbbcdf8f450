pub use ascension_core::{Collaborators, Engine, EngineConfig, EngineError};
pub mod allocator {
    pub use ascension_core::allocator::*;
}
pub mod clock {
    pub use ascension_core::clock::*;
}
pub mod collab {
    pub use ascension_core::collab::*;
}
pub mod config {
    pub use ascension_core::config::*;
}
pub mod cooldown {
    pub use ascension_core::cooldown::*;
}
pub mod engine {
    pub use ascension_core::engine::*;
}
pub mod error {
    pub use ascension_core::error::*;
}
pub mod evolution {
    pub use ascension_core::evolution::*;
}
pub mod gate {
    pub use ascension_core::gate::*;
}
pub mod improvement {
    pub use ascension_core::improvement::*;
}
pub mod phase {
    pub use ascension_core::phase::*;
}
#[cfg(not(target_arch = "wasm32"))]
pub mod scheduler {
    pub use ascension_core::scheduler::*;
}
pub mod walker {
    pub use ascension_core::walker::*;
}
pub mod persistence {
    pub use ascension_io::*;
}
#[cfg(not(target_arch = "wasm32"))]
pub mod observer {
    pub use ascension_observer::*;
}

pub mod state {
    pub use ascension_data::*;
}
