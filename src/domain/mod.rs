//! Domain types used throughout the engine.
//!
//! This module defines:
//!
//! - stations, observations and the hypocentre (`types`)
//! - grid containers and the source search grid (`grid`)
//! - inversion configuration with defaults and validation (`config`)
//! - per-inversion result collections (`results`)

pub mod config;
pub mod grid;
pub mod results;
pub mod types;

pub use config::*;
pub use grid::*;
pub use results::*;
pub use types::*;
