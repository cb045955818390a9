//! `gfast-core` library crate.
//!
//! Geodetic earthquake source inversions run as grid searches:
//!
//! - magnitude from peak ground displacement (PGD)
//! - deviatoric centroid moment tensor over a depth grid (CMT)
//! - slip on both CMT nodal planes (finite fault)
//!
//! The binary (`gfast`) is a thin wrapper around this library so the engine is
//! testable without spawning processes.

pub mod app;
pub mod cli;
pub mod coords;
pub mod data;
pub mod domain;
pub mod error;
pub mod inversion;
pub mod io;
pub mod math;
pub mod models;
pub mod report;
