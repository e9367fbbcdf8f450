//! # Ascension IO
//!
//! Persistence layer for the Ascension engine.
//!
//! This crate provides:
//! - `IoError`, distinguishing malformed documents from file failures
//! - The flat, human-readable world-state codec
//! - `WorldStore` implementations: on-disk, in-memory and a non-blocking
//!   background writer

/// Error types and result aliases for I/O operations
pub mod error;
/// File and in-memory world stores
pub mod persistence;
/// The flat world-state codec
pub mod serialization;
/// Background writer that keeps saves off the tick path
pub mod storage;

pub use error::{IoError, Result};
pub use persistence::{FileStore, MemoryStore};
pub use serialization::{decode_world, encode_world};
pub use storage::BackgroundStore;
