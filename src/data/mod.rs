//! Synthetic observation generation for playback and tests.

pub mod synthetic;

pub use synthetic::*;
