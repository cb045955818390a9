//! Numerical building blocks: QR least squares and order statistics.

pub mod lstsq;
pub mod stats;

pub use lstsq::*;
pub use stats::*;
