//! Input/output helpers.
//!
//! - configuration JSON (`config`)
//! - event JSON, station metadata and mask CSVs (`event`)
//! - result exports (JSON/CSV) (`export`)

pub mod config;
pub mod event;
pub mod export;

pub use config::*;
pub use event::*;
pub use export::*;
