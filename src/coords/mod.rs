//! Geographic coordinate projection.

pub mod utm;

pub use utm::*;
