//! mg-core: shared types, errors, configuration, and the run event bus.
//!
//! This crate is the foundational dependency for the other mg-* crates and
//! the `mediaglyph` binary.

pub mod config;
pub mod error;
pub mod events;
pub mod media;

// Re-export the most commonly used items at the crate root.
pub use error::{Error, Result};
pub use media::*;
