//! Chunked editable terrain: procedural height fields, falloff brushes,
//! deferred collision rebuilds and compressed per-chunk persistence.

pub mod error;
pub mod terrain;
pub mod threading;

pub use error::{Result, TerrainError};
