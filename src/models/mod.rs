//! Forward models: the matrices that map source parameters to observations.
//!
//! - `pgd`: empirical magnitude scaling of peak ground displacement
//! - `cmt`: deviatoric point-source Green's functions
//! - `okada`: rectangular dislocation Green's functions
//! - `regularizer`: slip smoothing rows appended below the dislocation model

pub mod cmt;
pub mod okada;
pub mod pgd;
pub mod regularizer;

pub use okada::Receiver;
pub use pgd::PgdScaling;
