//! Core data structures for the Ascension simulation.

pub mod event;
pub mod metric;
pub mod phase;
pub mod snapshot;
pub mod world;
