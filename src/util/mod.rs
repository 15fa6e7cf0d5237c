//! Utility types and functions.
//!
//! - [`Error`] / [`Result`] - Error handling
//! - Math re-exports from glam and the numeric text conventions

mod error;
mod math;

pub use error::*;
pub use math::*;

/// Upper bound on speculative allocation for counts read from a stream.
/// Longer sequences grow as they are read so a corrupt count cannot
/// exhaust memory.
pub(crate) const MAX_PREALLOC: usize = 1 << 16;
