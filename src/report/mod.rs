//! Reporting: residuals at the selected optima and formatted terminal output.

pub mod format;
pub mod residuals;

pub use format::*;
pub use residuals::*;
